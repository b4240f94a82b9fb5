//! WebSocket connection handlers.
//!
//! Each connection runs two tasks. The inbound task only reads: it enforces
//! the read deadline and frame size limit and returns when the peer goes
//! away. The outbound loop owns every write and multiplexes the change
//! poller, the probe timer and the inbound task's completion.

use super::liveness::{Liveness, LivenessState};
use super::session::{CloseReason, SessionId, StreamError, StreamSession};
use super::WsState;
use crate::poller::ChangePoller;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::stream::SplitStream;
use futures::{Sink, SinkExt, StreamExt};
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_tungstenite::tungstenite::error::{CapacityError, Error as TransportError};
use tracing::{debug, info, warn};

/// Frames beyond this are refused by the transport before being buffered.
/// Anything between the session limit and this is read, then rejected as a
/// protocol violation.
const TRANSPORT_LIMIT: usize = 64 * 1024;

/// Query key carrying the viewer's checkpoint.
const LAST_MOD_PARAM: &str = "lastMod";

/// First `lastMod` value in the query, if any. Repeated keys are not an
/// error; later values are ignored.
fn last_mod_param(params: &[(String, String)]) -> Option<&str> {
    params
        .iter()
        .find(|(key, _)| key == LAST_MOD_PARAM)
        .map(|(_, value)| value.as_str())
}

/// Handle WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<WsState>,
    Query(params): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let hard_limit = state.config.max_message_size.max(TRANSPORT_LIMIT);
    let last_mod = last_mod_param(&params).map(str::to_owned);
    debug!(last_mod = ?last_mod, "WebSocket upgrade request");

    ws.max_message_size(hard_limit)
        .max_frame_size(hard_limit)
        .on_upgrade(move |socket| handle_socket(socket, state, last_mod))
}

/// Run a stream session over an established WebSocket connection.
async fn handle_socket(socket: WebSocket, state: WsState, last_mod: Option<String>) {
    let mut session = StreamSession::connect(last_mod.as_deref());
    let session_id = session.id();
    let config = state.config;

    info!(
        session_id = %session_id,
        checkpoint = %session.checkpoint(),
        "Viewer connected"
    );

    let (mut sink, stream) = socket.split();
    let liveness = Liveness::new(&config);
    let mut probes = liveness.probe_interval();
    let mut poller = ChangePoller::new(state.file, config.poll_interval);
    let mut inbound = tokio::spawn(read_inbound(
        stream,
        liveness,
        config.max_message_size,
        session_id,
    ));

    session.activate();

    let reason = loop {
        tokio::select! {
            ended = &mut inbound => {
                break match ended {
                    Ok(Ok(())) => CloseReason::PeerClosed,
                    Ok(Err(e)) => CloseReason::Failed(e),
                    Err(e) => CloseReason::Failed(StreamError::InboundTask(e)),
                };
            }

            event = poller.next(session.checkpoint()) => {
                let Some(text) = session.on_change(event) else {
                    continue;
                };
                if let Err(e) = send_with_deadline(&mut sink, Message::Text(text), config.write_wait).await {
                    break CloseReason::Failed(e);
                }
                debug!(session_id = %session_id, checkpoint = %session.checkpoint(), "Pushed update");
            }

            _ = probes.tick() => {
                if let Err(e) = send_with_deadline(&mut sink, Message::Ping(Vec::new()), config.write_wait).await {
                    break CloseReason::Failed(e);
                }
                debug!(session_id = %session_id, "Sent liveness probe");
            }
        }
    };

    match &reason {
        CloseReason::PeerClosed => info!(session_id = %session_id, "Viewer closed the stream"),
        CloseReason::Failed(StreamError::Transport(e)) => {
            debug!(session_id = %session_id, "Stream transport failed: {}", e)
        }
        CloseReason::Failed(e) => warn!(session_id = %session_id, "Closing stream: {}", e),
    }
    session.close(reason);

    // Stops the reader if the writer side failed first; no-op otherwise.
    inbound.abort();
    let _ = timeout(config.write_wait, sink.close()).await;

    session.finish();
    info!(session_id = %session_id, "Viewer disconnected");
}

/// Write one message, giving up after `wait`.
async fn send_with_deadline<S>(sink: &mut S, msg: Message, wait: Duration) -> Result<(), StreamError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    match timeout(wait, sink.send(msg)).await {
        Ok(result) => result.map_err(StreamError::Transport),
        Err(_) => Err(StreamError::WriteTimeout(wait)),
    }
}

/// Read until the peer closes, the deadline lapses or a frame breaks the rules.
///
/// Returns `Ok(())` for an ordinary close. Never writes; probe answers to the
/// viewer's own pings are queued by the transport.
async fn read_inbound(
    mut stream: SplitStream<WebSocket>,
    mut liveness: Liveness,
    limit: usize,
    session_id: SessionId,
) -> Result<(), StreamError> {
    loop {
        let frame = match timeout_at(liveness.deadline(), stream.next()).await {
            Ok(frame) => frame,
            Err(_) => {
                let state: LivenessState = liveness.state_at(Instant::now());
                debug!(session_id = %session_id, ?state, "Read deadline passed");
                return Err(StreamError::LivenessTimeout(liveness.pong_wait()));
            }
        };

        let msg = match frame {
            None | Some(Ok(Message::Close(_))) => return Ok(()),
            Some(Ok(msg)) => msg,
            Some(Err(e)) => return Err(classify_read_error(e)),
        };

        let size = payload_len(&msg);
        if size > limit {
            return Err(StreamError::ProtocolViolation { size, limit });
        }
        let state = liveness.state_at(Instant::now());
        liveness.refresh();

        match msg {
            Message::Pong(_) => debug!(session_id = %session_id, ?state, "Received pong"),
            Message::Ping(_) => debug!(session_id = %session_id, "Received ping"),
            _ => debug!(session_id = %session_id, size, "Ignoring viewer message"),
        }
    }
}

/// Frames the transport refused for size are protocol violations like any
/// other oversized frame; everything else is a plain transport failure.
fn classify_read_error(error: axum::Error) -> StreamError {
    let inner = error.into_inner();
    if let Some(TransportError::Capacity(CapacityError::MessageTooLong { size, max_size })) =
        inner.downcast_ref::<TransportError>()
    {
        return StreamError::ProtocolViolation {
            size: *size,
            limit: *max_size,
        };
    }
    StreamError::Transport(axum::Error::new(inner))
}

fn payload_len(msg: &Message) -> usize {
    match msg {
        Message::Text(text) => text.len(),
        Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data.len(),
        Message::Close(_) => 0,
    }
}
