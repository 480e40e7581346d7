use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::event::EventId;
use crate::realtime::{RealtimeHub, Subscription};
use crate::router;

/// Wire messages on the realtime channel.
///
/// Client to server:
/// `{"type":"join","eventId":3}`
///
/// Server to client:
/// `{"type":"refresh"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WsMessage {
    Join {
        #[serde(rename = "eventId")]
        event_id: EventId,
    },
    Refresh,
}

pub async fn realtime(ws: WebSocketUpgrade, State(state): State<router::State>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// One loop per connection: forward refresh signals for the joined event,
/// and track join messages from the client. A join before the first one
/// arrives is required for the connection to receive anything; a later
/// join switches groups. Dropping the subscription on disconnect is what
/// removes the member from the hub.
async fn handle_socket(mut socket: WebSocket, hub: Arc<RealtimeHub>) {
    debug!("realtime connection established");

    let mut subscription: Option<Subscription> = None;

    loop {
        tokio::select! {
            signal = wait_for_refresh(&mut subscription) => {
                if signal.is_none() {
                    break;
                }
                let payload = match serde_json::to_string(&WsMessage::Refresh) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize refresh signal");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsMessage>(&text) {
                        Ok(WsMessage::Join { event_id }) => {
                            debug!(event_id, "client joined event group");
                            subscription = Some(hub.join(event_id));
                        }
                        Ok(other) => {
                            warn!(?other, "unexpected message from realtime client");
                        }
                        Err(e) => {
                            warn!(error = %e, "unparseable message from realtime client");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    // Ping/pong is answered by axum itself
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "realtime connection errored");
                        break;
                    }
                }
            }
        }
    }

    debug!("realtime connection closed");
}

async fn wait_for_refresh(
    subscription: &mut Option<Subscription>,
) -> Option<crate::realtime::Refresh> {
    match subscription.as_mut() {
        Some(subscription) => subscription.recv().await,
        // No group joined yet: park until the select loop is woken by the
        // socket side.
        None => std::future::pending().await,
    }
}
