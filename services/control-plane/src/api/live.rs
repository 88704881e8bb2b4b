//! Live channel (WebSocket).
//!
//! Every connection receives fleet-wide rebuild events. A connection may
//! also follow one container's log: `subscribe-logs` switches the followed
//! container, `unsubscribe-logs` stops following. Closing the socket drops
//! the subscription, which ends the upstream follow once nobody else is
//! watching that container.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use fleetdeck_events::{ClientCommand, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::logs::LogSubscription;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/live", get(connect))
}

async fn connect(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Next event of the followed log, or never if nothing is followed.
async fn next_log(subscription: &mut Option<LogSubscription>) -> ServerEvent {
    if let Some(active) = subscription {
        if let Some(event) = active.recv().await {
            return event;
        }
        *subscription = None;
    }
    std::future::pending().await
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut fleet_events = state.bus().subscribe();
    let mut logs: Option<LogSubscription> = None;

    info!("Observer connected");

    loop {
        let outgoing = tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match ClientCommand::from_json(text.as_str()) {
                            Ok(ClientCommand::SubscribeLogs { container_id }) => {
                                debug!(container_id = %container_id, "Observer subscribed to logs");
                                // Leave the previous topic before joining the next.
                                logs = None;
                                logs = Some(state.logs().subscribe(&container_id));
                            }
                            Ok(ClientCommand::UnsubscribeLogs) => {
                                if let Some(previous) = logs.take() {
                                    debug!(container_id = previous.container_id(), "Observer unsubscribed from logs");
                                }
                            }
                            Err(e) => warn!(error = %e, "Ignoring observer message"),
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(error = ?e, "WebSocket error");
                        break;
                    }
                }
            }
            event = fleet_events.recv() => {
                match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Observer lagged behind fleet events");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            event = next_log(&mut logs) => event,
        };

        let text = match outgoing.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, event = outgoing.name(), "Failed to encode event");
                continue;
            }
        };
        if let Err(e) = sender.send(Message::Text(text.into())).await {
            debug!(error = ?e, "Observer went away");
            break;
        }
    }

    info!("Observer disconnected");
}
