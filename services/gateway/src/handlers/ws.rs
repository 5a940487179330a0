use crate::hub::{ConnectionError, Registration};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{
        State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use tokio::time::timeout;
use tracing::{debug, info};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Text frame when the payload is UTF-8, binary otherwise.
fn frame(payload: Bytes) -> Message {
    match Utf8Bytes::try_from(payload.clone()) {
        Ok(text) => Message::Text(text),
        Err(_) => Message::Binary(payload),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    serve_connection(sink, stream, state).await;
}

/// Run one order connection until the peer leaves, a write fails or times
/// out, or the hub disconnects it. Deregisters on every exit path.
async fn serve_connection<S, R, E>(mut sink: S, mut stream: R, state: AppState)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (conn, mut outbound) = state.hub.open(state.outbound_buffer);
    let registration = Registration::new(state.hub.clone(), conn.clone());
    let connection_id = registration.id();
    let write_timeout = state.hub.write_timeout();

    info!(connection_id, "order connection opened");

    // Single writer per socket: acks, rejections and broadcasts all funnel
    // through `outbound`, which keeps per-connection ordering.
    let mut writer = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            match timeout(write_timeout, sink.send(frame(payload))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(ConnectionError::Transport(e.to_string())),
                Err(_) => return Err(ConnectionError::Timeout(connection_id, write_timeout)),
            }
        }
        Ok(())
    });

    loop {
        tokio::select! {
            inbound = stream.next() => {
                let raw = match inbound {
                    Some(Ok(msg @ (Message::Text(_) | Message::Binary(_)))) => msg.into_data(),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(connection_id, error = %e, "read failed");
                        break;
                    }
                };

                if let Err(e) = state.pipeline.handle(&conn, &raw).await {
                    debug!(connection_id, error = %e, "connection unwritable");
                    break;
                }
            }
            result = &mut writer => {
                if let Ok(Err(e)) = result {
                    debug!(connection_id, error = %e, "write failed");
                }
                break;
            }
            _ = conn.closed() => {
                debug!(connection_id, "disconnected by hub");
                break;
            }
        }
    }

    drop(registration);
    conn.close();
    writer.abort();
    info!(connection_id, "order connection closed");
}
