use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use super::{ExecutionFeed, FeedError};

/// Execution feed delivered over a WebSocket stream.
///
/// Each text or binary frame is one event. Pings are answered by the
/// protocol layer while reading.
pub struct WsFeed {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsFeed {
    pub async fn connect(url: &str) -> Result<Self, FeedError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        info!(url, "connected to execution feed");
        Ok(Self { stream })
    }
}

#[async_trait]
impl ExecutionFeed for WsFeed {
    async fn next_event(&mut self) -> Result<Bytes, FeedError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Bytes::copy_from_slice(text.as_str().as_bytes()));
                }
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "execution feed sent close");
                    return Err(FeedError::Closed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(FeedError::Transport(e.to_string())),
                None => return Err(FeedError::Closed),
            }
        }
    }
}
