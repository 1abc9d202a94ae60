//! # Upstream Connection
//!
//! Establishes and drives the outbound WebSocket connection to the realtime
//! AI endpoint on behalf of one relay session. Authentication uses the
//! server-held credential; the client never sees or supplies it.
//!
//! The connector runs as a plain tokio task and reports everything back to
//! the session actor through [`UpstreamEvent`] messages: connection success
//! (with a write channel), inbound frames, failure, and closure. Connection
//! establishment is bounded by the configured timeout so a hung upstream
//! surfaces as `UpstreamUnavailable` instead of a stuck session.

use crate::config::UpstreamConfig;
use actix::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Events delivered from the upstream task to the session actor.
#[derive(Message)]
#[rtype(result = "()")]
pub enum UpstreamEvent {
    /// Connection established; frames for the upstream go into this channel
    Connected(mpsc::UnboundedSender<String>),
    /// A text frame arrived from the upstream
    Frame(String),
    /// The connection could not be established
    Failed(String),
    /// The connection closed (after having been established)
    Closed,
}

/// Connect to the upstream and pump frames until either side closes.
///
/// All outcomes are reported through `events`; this function never panics
/// the session. Dropping the `Connected` sender closes the write half,
/// which in turn ends the connection.
pub async fn run(config: UpstreamConfig, api_key: String, events: Recipient<UpstreamEvent>) {
    let url = config.ws_url();

    let mut request = match url.clone().into_client_request() {
        Ok(req) => req,
        Err(e) => {
            events.do_send(UpstreamEvent::Failed(format!("invalid upstream URL: {}", e)));
            return;
        }
    };

    let auth_value = match HeaderValue::from_str(&format!("Bearer {}", api_key)) {
        Ok(v) => v,
        Err(e) => {
            events.do_send(UpstreamEvent::Failed(format!("invalid credential: {}", e)));
            return;
        }
    };
    request.headers_mut().insert(AUTHORIZATION, auth_value);
    request
        .headers_mut()
        .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

    let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
    let stream = match timeout(connect_timeout, connect_async(request)).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            events.do_send(UpstreamEvent::Failed(format!("connect failed: {}", e)));
            return;
        }
        Err(_) => {
            events.do_send(UpstreamEvent::Failed(format!(
                "connect timed out after {}s",
                config.connect_timeout_secs
            )));
            return;
        }
    };

    info!("Connected to upstream realtime API");
    let (mut write, mut read) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    events.do_send(UpstreamEvent::Connected(tx));

    // Writer task: consumes frames from the session until the sender drops,
    // then closes the upstream connection
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = write.send(Message::Text(frame)).await {
                warn!("Upstream write failed: {}", e);
                return;
            }
        }
        let _ = write.send(Message::Close(None)).await;
    });

    // Read loop: forwards upstream frames to the session actor
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                // If the session actor is gone this is a no-op; the loop ends
                // when the dropped write channel closes the connection
                events.do_send(UpstreamEvent::Frame(text));
            }
            Ok(Message::Close(reason)) => {
                debug!("Upstream closed the connection: {:?}", reason);
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Control frames handled by tungstenite
            }
            Ok(other) => {
                debug!("Ignoring non-text upstream frame: {:?}", other);
            }
            Err(e) => {
                warn!("Upstream read error: {}", e);
                break;
            }
        }
    }

    events.do_send(UpstreamEvent::Closed);
    writer.abort();
}
