//! Guest-side connection to the host peer

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::game::session::{LinkEnds, PeerLink, SessionClosed, SessionHandle, LINK_CAPACITY};
use crate::util::rate_limit::PeerRateLimiter;
use crate::ws::protocol::{decode, encode};

/// Guest link errors
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("failed to connect to host: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Session(#[from] SessionClosed),
}

/// Connect to the host, attach the link to the session, and pump frames
/// until the host goes away. The session keeps running afterwards.
pub async fn connect_to_host(host_url: &str, session: &SessionHandle) -> Result<(), LinkError> {
    info!(host_url, "Connecting to host");
    let (stream, _response) = connect_async(host_url).await?;
    info!("Connected to host");

    let (link, ends) = PeerLink::channel(LINK_CAPACITY);
    session.attach(link).await?;

    let LinkEnds {
        to_session,
        mut from_session,
    } = ends;
    let (mut ws_sink, mut ws_stream) = stream.split();

    // Writer task: session -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = from_session.recv().await {
            let text = match encode(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, kind = msg.kind(), "Failed to encode message");
                    continue;
                }
            };
            if let Err(e) = ws_sink.send(Message::Text(text)).await {
                debug!(error = %e, "Send to host failed");
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    let rate_limiter = PeerRateLimiter::new();

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!("Rate limited host message");
                    continue;
                }
                match decode(&text) {
                    Ok(msg) => {
                        if to_session.send(msg).await.is_err() {
                            debug!("Session side of link closed");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Dropping undecodable host message"),
                }
            }
            Ok(Message::Close(_)) => {
                info!("Host closed the connection");
                break;
            }
            Ok(Message::Binary(_)) => warn!("Received binary message, ignoring"),
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    drop(to_session);
    writer_handle.abort();
    info!("Disconnected from host");
    Ok(())
}
