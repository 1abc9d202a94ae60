//! # Relay Session WebSocket Handler
//!
//! Handles one client connection of the realtime voice relay. Clients
//! connect to `/ws/voice`; the server immediately dials the upstream
//! realtime AI endpoint with server-held credentials and relays frames in
//! both directions for the life of the session.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: client upgrades to WebSocket
//! 2. **Upstream dial**: relay connects upstream (or refuses the session
//!    with a single error frame if the credential is missing)
//! 3. **Handshake**: client `session.update` frames are buffered until the
//!    upstream signals readiness, then flushed in order
//! 4. **Relaying**: JSON frames flow through transparently; audio and
//!    transcript deltas additionally feed per-session state
//! 5. **Teardown**: either side closing closes both — no half-open sessions
//!
//! ## Actor Model:
//! Each connection is an independent Actix actor; all session state is owned
//! by that actor's context, so sessions never share mutable state.

use crate::error::RelayError;
use crate::relay::core::{Outbound, RelayCore, SessionState};
use crate::relay::queue::PassthroughPlayback;
use crate::relay::upstream::{self, UpstreamEvent};
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How often the server pings the client.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Idle bound before the connection is considered dead.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// WebSocket actor owning one client↔upstream relay pairing.
pub struct VoiceRelaySession {
    /// Unique session ID (logs and metrics only, never on the wire)
    session_id: String,

    /// Protocol state machine
    core: RelayCore,

    /// Write channel to the upstream connection, present once connected
    upstream_tx: Option<UnboundedSender<String>>,

    /// Playback collaborator; the browser renders audio, so chunks complete
    /// on hand-off
    playback: PassthroughPlayback,

    /// Shared application state for session metrics
    app_state: web::Data<AppState>,

    /// Last heartbeat response from the client
    last_heartbeat: Instant,
}

impl VoiceRelaySession {
    pub fn new(app_state: web::Data<AppState>) -> Self {
        let config = app_state.get_config();
        Self {
            session_id: Uuid::new_v4().to_string(),
            core: RelayCore::new(config.session),
            upstream_tx: None,
            playback: PassthroughPlayback,
            app_state,
            last_heartbeat: Instant::now(),
        }
    }

    /// Carry out the actions the state machine decided on.
    fn apply(&mut self, actions: Vec<Outbound>, ctx: &mut ws::WebsocketContext<Self>) {
        for action in actions {
            match action {
                Outbound::ToClient(frame) => ctx.text(frame),
                Outbound::ToUpstream(frame) => {
                    if let Some(tx) = &self.upstream_tx {
                        if tx.send(frame).is_err() {
                            warn!("Session {}: upstream writer gone", self.session_id);
                            let actions = self.core.on_upstream_closed();
                            self.apply(actions, ctx);
                            return;
                        }
                    } else {
                        debug!(
                            "Session {}: dropping frame, no upstream connection",
                            self.session_id
                        );
                    }
                }
                Outbound::Close => {
                    // Dropping the sender closes the upstream write half,
                    // which tears down the upstream connection
                    self.upstream_tx.take();
                    ctx.close(None);
                    ctx.stop();
                }
            }
        }
    }
}

impl Actor for VoiceRelaySession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("Session {}: client connected", self.session_id);
        self.app_state.session_started();

        // Heartbeat: ping every interval, stop if the client goes silent
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!("Session {}: heartbeat timeout, closing", act.session_id);
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });

        let config = self.app_state.get_config();

        // Fail closed: without a credential, refuse the session before any
        // network connection is attempted
        let Some(api_key) = config.upstream.api_key.clone() else {
            self.app_state.session_refused();
            let actions = self.core.on_upstream_unavailable(RelayError::UpstreamUnavailable(
                "OpenAI API key not configured".to_string(),
            ));
            self.apply(actions, ctx);
            return;
        };

        let events = ctx.address().recipient();
        let upstream_config = config.upstream;
        tokio::spawn(async move {
            upstream::run(upstream_config, api_key, events).await;
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // Teardown is idempotent; this covers abrupt client drops that never
        // produced a Close frame
        self.core.on_client_closed();
        self.upstream_tx.take();
        self.app_state.session_ended();
        info!("Session {}: stopped", self.session_id);
    }
}

/// Inbound frames and control messages from the client connection.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for VoiceRelaySession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                let actions = self.core.on_client_frame(&text);
                self.apply(actions, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                // The relay protocol is JSON frames only; audio travels base64
                // encoded inside them
                warn!("Session {}: unexpected binary frame", self.session_id);
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!("Session {}: client closed: {:?}", self.session_id, reason);
                let actions = self.core.on_client_closed();
                self.apply(actions, ctx);
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!("Session {}: unexpected continuation frame", self.session_id);
            }
            Ok(ws::Message::Nop) => {}
            Err(e) => {
                warn!("Session {}: protocol error: {}", self.session_id, e);
                let actions = self.core.on_client_closed();
                self.apply(actions, ctx);
            }
        }
    }
}

/// Events from the upstream connection task.
impl Handler<UpstreamEvent> for VoiceRelaySession {
    type Result = ();

    fn handle(&mut self, event: UpstreamEvent, ctx: &mut Self::Context) {
        match event {
            UpstreamEvent::Connected(tx) => {
                self.upstream_tx = Some(tx);
                let actions = self.core.on_upstream_connected();
                self.apply(actions, ctx);
            }
            UpstreamEvent::Frame(text) => {
                let actions = self.core.on_upstream_frame(&text, &mut self.playback);
                self.apply(actions, ctx);
            }
            UpstreamEvent::Failed(reason) => {
                self.app_state.session_refused();
                let actions = self
                    .core
                    .on_upstream_unavailable(RelayError::UpstreamUnavailable(reason));
                self.apply(actions, ctx);
            }
            UpstreamEvent::Closed => {
                if self.core.state() != SessionState::Closed {
                    info!("Session {}: upstream closed", self.session_id);
                }
                let actions = self.core.on_upstream_closed();
                self.apply(actions, ctx);
            }
        }
    }
}

/// WebSocket endpoint handler for `/ws/voice`.
///
/// Upgrades the HTTP request and hands the connection to a
/// [`VoiceRelaySession`] actor. Refuses the upgrade when the concurrent
/// session limit is reached.
pub async fn voice_relay(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    info!(
        "New relay connection request from: {:?}",
        req.connection_info().peer_addr()
    );

    let config = app_state.get_config();
    let active = app_state.get_metrics_snapshot().active_sessions as usize;
    if active >= config.performance.max_concurrent_sessions {
        warn!(
            "Refusing relay session: {} active, limit {}",
            active, config.performance.max_concurrent_sessions
        );
        return Ok(HttpResponse::ServiceUnavailable().json(json!({
            "error": {
                "type": "capacity",
                "message": "Maximum concurrent sessions reached"
            }
        })));
    }

    ws::start(VoiceRelaySession::new(app_state), &req, stream)
}
