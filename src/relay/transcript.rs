//! # Transcript Accumulator
//!
//! Running assistant transcript for the current turn. Successive
//! `response.audio_transcript.delta` frames are concatenated into one
//! growing message instead of a trail of fragments; a turn boundary closes
//! the message and starts a fresh one.

/// Per-session transcript state: the growing text of the current turn plus
/// the completed turns before it.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    current: String,
    turns: Vec<String>,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transcript delta to the current turn.
    ///
    /// Contiguous deltas merge by concatenation; returns the merged text so
    /// far for this turn.
    pub fn append_delta(&mut self, delta: &str) -> &str {
        self.current.push_str(delta);
        &self.current
    }

    /// Close the current turn.
    ///
    /// Called when a non-delta frame intervenes (e.g. the end of assistant
    /// audio). An empty current turn is not recorded.
    pub fn end_turn(&mut self) {
        if !self.current.is_empty() {
            self.turns.push(std::mem::take(&mut self.current));
        }
    }

    /// Text accumulated for the in-progress turn.
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Completed turns, oldest first.
    pub fn turns(&self) -> &[String] {
        &self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_merge_into_one_message() {
        let mut acc = TranscriptAccumulator::new();
        acc.append_delta("Hel");
        let merged = acc.append_delta("lo");

        assert_eq!(merged, "Hello");
        assert_eq!(acc.current(), "Hello");
        // One growing message, not two fragments
        assert!(acc.turns().is_empty());
    }

    #[test]
    fn test_turn_boundary_starts_new_message() {
        let mut acc = TranscriptAccumulator::new();
        acc.append_delta("How are");
        acc.append_delta(" you?");
        acc.end_turn();

        acc.append_delta("I'm fine.");

        assert_eq!(acc.turns(), &["How are you?".to_string()]);
        assert_eq!(acc.current(), "I'm fine.");
    }

    #[test]
    fn test_empty_turn_not_recorded() {
        let mut acc = TranscriptAccumulator::new();
        acc.end_turn();
        acc.end_turn();
        assert!(acc.turns().is_empty());
    }
}
