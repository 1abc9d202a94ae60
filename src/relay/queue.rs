//! # Audio Frame Queue
//!
//! Ordered buffer of decoded PCM chunks awaiting playback. Assistant audio
//! arrives in deltas faster than it can be rendered; the queue decouples
//! arrival rate from playback rate while preserving FIFO order.
//!
//! ## Contract:
//! - `enqueue` appends to the tail and, if nothing is playing, starts the head
//! - a chunk is removed only after its playback completes or fails
//! - a failed chunk is logged and skipped; it never stalls the stream
//! - enqueueing never blocks on playback completion
//!
//! The queue is unbounded. The playback subsystem is an external
//! collaborator behind the [`PlaybackSink`] trait; in the deployed relay the
//! browser renders audio and the server-side sink completes immediately, but
//! an embedding with a local renderer plugs in the same way.

use std::collections::VecDeque;
use tracing::{debug, warn};

/// Result of handing a chunk to the playback subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Playback started; completion will be signaled later via
    /// `on_playback_complete` / `on_playback_failed`
    Started,
    /// Playback finished synchronously
    Completed,
    /// The chunk could not be decoded or rendered
    Failed,
}

/// External playback collaborator: accepts a raw PCM buffer and either plays
/// it asynchronously or reports an immediate outcome.
pub trait PlaybackSink {
    fn play(&mut self, chunk: &[u8]) -> PlaybackOutcome;
}

/// A sink for deployments where rendering happens elsewhere (the browser
/// client); every chunk completes as soon as it is handed over.
#[derive(Debug, Default)]
pub struct PassthroughPlayback;

impl PlaybackSink for PassthroughPlayback {
    fn play(&mut self, _chunk: &[u8]) -> PlaybackOutcome {
        PlaybackOutcome::Completed
    }
}

/// FIFO queue of raw PCM buffers, owned by one session's playback path.
#[derive(Debug, Default)]
pub struct AudioQueue {
    chunks: VecDeque<Vec<u8>>,
    playing: bool,
}

impl AudioQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks currently buffered, including the one playing.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether a chunk is currently being played.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Append a chunk and start playback of the head if idle.
    pub fn enqueue(&mut self, chunk: Vec<u8>, sink: &mut dyn PlaybackSink) {
        self.chunks.push_back(chunk);
        if !self.playing {
            self.advance(sink);
        }
    }

    /// Signal from the playback subsystem that the head chunk finished.
    ///
    /// Pops the head and starts the next chunk if present; with an empty
    /// queue the playback state becomes idle.
    pub fn on_playback_complete(&mut self, sink: &mut dyn PlaybackSink) {
        if !self.playing {
            return;
        }
        self.chunks.pop_front();
        self.playing = false;
        self.advance(sink);
    }

    /// Signal that the head chunk failed to decode or render.
    ///
    /// Treated exactly like completion after logging: the queue advances and
    /// the session continues.
    pub fn on_playback_failed(&mut self, sink: &mut dyn PlaybackSink) {
        warn!("Audio chunk playback failed, skipping");
        self.on_playback_complete(sink);
    }

    /// Drop all buffered audio (session teardown).
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.playing = false;
    }

    /// Start playing from the head, consuming synchronous outcomes until a
    /// chunk actually starts or the queue drains.
    fn advance(&mut self, sink: &mut dyn PlaybackSink) {
        while let Some(head) = self.chunks.front() {
            match sink.play(head) {
                PlaybackOutcome::Started => {
                    self.playing = true;
                    return;
                }
                PlaybackOutcome::Completed => {
                    self.chunks.pop_front();
                }
                PlaybackOutcome::Failed => {
                    warn!("Audio chunk rejected by playback sink, skipping");
                    self.chunks.pop_front();
                }
            }
        }
        self.playing = false;
        debug!("Audio queue drained, playback idle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every chunk handed to it and lets a test mark specific chunks
    /// as undecodable.
    struct MockPlayback {
        played: Vec<Vec<u8>>,
        reject: Vec<Vec<u8>>,
    }

    impl MockPlayback {
        fn new() -> Self {
            Self {
                played: Vec::new(),
                reject: Vec::new(),
            }
        }
    }

    impl PlaybackSink for MockPlayback {
        fn play(&mut self, chunk: &[u8]) -> PlaybackOutcome {
            if self.reject.iter().any(|r| r == chunk) {
                return PlaybackOutcome::Failed;
            }
            self.played.push(chunk.to_vec());
            PlaybackOutcome::Started
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = AudioQueue::new();
        let mut sink = MockPlayback::new();

        queue.enqueue(vec![1], &mut sink);
        queue.enqueue(vec![2], &mut sink);
        queue.enqueue(vec![3], &mut sink);

        // Head starts immediately, the rest wait for completion signals
        assert_eq!(sink.played, vec![vec![1]]);
        assert_eq!(queue.len(), 3);
        assert!(queue.is_playing());

        queue.on_playback_complete(&mut sink);
        queue.on_playback_complete(&mut sink);
        queue.on_playback_complete(&mut sink);

        assert_eq!(sink.played, vec![vec![1], vec![2], vec![3]]);
        assert!(!queue.is_playing());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_failed_chunk_is_skipped() {
        let mut queue = AudioQueue::new();
        let mut sink = MockPlayback::new();
        sink.reject.push(vec![0xBA, 0xD0]);

        queue.enqueue(vec![1], &mut sink);
        queue.enqueue(vec![0xBA, 0xD0], &mut sink);
        queue.enqueue(vec![3], &mut sink);

        // Completing chunk 1 skips the bad chunk and starts chunk 3
        queue.on_playback_complete(&mut sink);
        assert_eq!(sink.played, vec![vec![1], vec![3]]);
        assert!(queue.is_playing());

        queue.on_playback_complete(&mut sink);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_playback_failed_advances() {
        let mut queue = AudioQueue::new();
        let mut sink = MockPlayback::new();

        queue.enqueue(vec![1], &mut sink);
        queue.enqueue(vec![2], &mut sink);

        // Chunk 1 started, then the renderer reports a decode failure on it
        queue.on_playback_failed(&mut sink);
        assert_eq!(sink.played, vec![vec![1], vec![2]]);
        assert!(queue.is_playing());
    }

    #[test]
    fn test_idle_when_drained() {
        let mut queue = AudioQueue::new();
        let mut sink = MockPlayback::new();

        queue.enqueue(vec![1], &mut sink);
        queue.on_playback_complete(&mut sink);

        assert!(!queue.is_playing());
        // Spurious completion signal with an idle queue is a no-op
        queue.on_playback_complete(&mut sink);
        assert_eq!(sink.played.len(), 1);
    }

    #[test]
    fn test_passthrough_sink_drains_synchronously() {
        let mut queue = AudioQueue::new();
        let mut sink = PassthroughPlayback;

        queue.enqueue(vec![1], &mut sink);
        queue.enqueue(vec![2], &mut sink);

        assert!(queue.is_empty());
        assert!(!queue.is_playing());
    }
}
