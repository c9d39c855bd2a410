//! WebSocket endpoint: one task pair per connection.
//!
//! The read loop parses client messages and hands them to the session; a
//! separate pump owns the socket sink and drains the connection's outbound
//! channel, so session handlers never await on a slow client.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::{Outbound, SessionHandle};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(session): State<SessionHandle>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, session))
}

async fn handle_socket(socket: WebSocket, session: SessionHandle) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let conn_id = session.connect(tx.clone()).await;

    let pump = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                Outbound::Text(json) => {
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Pong(payload) => {
                    if sink.send(Message::Pong(payload.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!("websocket error on {}: {}", conn_id, e);
                break;
            }
        };
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(parsed) => session.handle_message(&conn_id, parsed).await,
                Err(e) => {
                    tracing::debug!("unparseable message from {}: {}", conn_id, e);
                    session
                        .send(
                            &conn_id,
                            &ServerMessage::error("INVALID_INPUT", "Malformed message"),
                        )
                        .await;
                }
            },
            Message::Ping(payload) => {
                let _ = tx.send(Outbound::Pong(payload.to_vec()));
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    session.disconnect(&conn_id).await;
    pump.abort();
}
