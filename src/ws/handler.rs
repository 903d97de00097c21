//! WebSocket upgrade handler for the guest peer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::session::{LinkEnds, PeerLink, LINK_CAPACITY};
use crate::http::routes::AppError;
use crate::util::rate_limit::PeerRateLimiter;
use crate::ws::protocol::{decode, encode, NetMsg};

/// WebSocket upgrade handler. Only one guest may be connected at a time.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let Some(slot) = GuestSlot::claim(&state.guest_connected) else {
        warn!("Rejecting second guest connection");
        return AppError::PeerAlreadyConnected.into_response();
    };

    info!("WebSocket upgrade for guest peer");
    ws.on_upgrade(move |socket| handle_socket(socket, state, slot))
}

/// Holds the single guest flag; released on drop
struct GuestSlot(Arc<AtomicBool>);

impl GuestSlot {
    fn claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for GuestSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, slot: GuestSlot) {
    let (link, ends) = PeerLink::channel(LINK_CAPACITY);

    if let Err(e) = state.session.attach(link).await {
        error!(error = %e, "Guest connected but the session is gone");
        return;
    }

    info!("Guest attached to session");
    run_link(socket, ends).await;
    info!("Guest connection closed");

    drop(slot);
}

/// Pump frames between the socket and the session until either side closes
async fn run_link(socket: WebSocket, ends: LinkEnds) {
    let LinkEnds {
        to_session,
        from_session,
    } = ends;
    let (ws_sink, mut ws_stream) = socket.split();

    let writer_handle = tokio::spawn(write_loop(ws_sink, from_session));

    let rate_limiter = PeerRateLimiter::new();

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!("Rate limited peer message");
                    continue;
                }

                match decode(&text) {
                    Ok(msg) => {
                        if to_session.send(msg).await.is_err() {
                            debug!("Session side of link closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Dropping undecodable peer message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!("Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!("Guest initiated close");
                break;
            }
            Err(e) => {
                error!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Dropping the inbound sender tells the session the peer is gone
    drop(to_session);
    writer_handle.abort();
}

async fn write_loop(
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut from_session: mpsc::Receiver<NetMsg>,
) {
    while let Some(msg) = from_session.recv().await {
        let text = match encode(&msg) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, kind = msg.kind(), "Failed to encode message");
                continue;
            }
        };
        if let Err(e) = ws_sink.send(Message::Text(text)).await {
            debug!(error = %e, "WebSocket send failed");
            break;
        }
    }
    let _ = ws_sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_slot_is_exclusive_until_dropped() {
        let flag = Arc::new(AtomicBool::new(false));
        let first = GuestSlot::claim(&flag);
        assert!(first.is_some());
        assert!(GuestSlot::claim(&flag).is_none());

        drop(first);
        assert!(!flag.load(Ordering::Acquire));
        assert!(GuestSlot::claim(&flag).is_some());
    }
}
