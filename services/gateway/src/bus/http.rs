use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

use super::{OrderPublisher, PublishError};

/// Publishes to an HTTP ingestion endpoint: `POST {base_url}/topics/{topic}`.
pub struct HttpPublisher {
    client: Client,
    base_url: String,
}

impl HttpPublisher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn topic_url(&self, topic: &str) -> String {
        format!("{}/topics/{}", self.base_url, topic)
    }
}

#[async_trait]
impl OrderPublisher for HttpPublisher {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError> {
        let res = self
            .client
            .post(self.topic_url(topic))
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        if !res.status().is_success() {
            return Err(PublishError::Rejected(res.status().as_u16()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, extract::Path, http::StatusCode, routing::post};
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_topic_url_trims_trailing_slash() {
        let publisher = HttpPublisher::new("http://bus:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(publisher.topic_url("orders.ingest"), "http://bus:9000/topics/orders.ingest");
    }

    #[tokio::test]
    async fn test_posts_payload_to_topic() {
        let seen = Arc::new(Mutex::new(Vec::<(String, Bytes)>::new()));
        let sink = seen.clone();
        let router = Router::new().route(
            "/topics/{topic}",
            post(move |Path(topic): Path<String>, body: Bytes| {
                let sink = sink.clone();
                async move {
                    sink.lock().await.push((topic, body));
                    StatusCode::ACCEPTED
                }
            }),
        );
        let base = serve(router).await;

        let publisher = HttpPublisher::new(base, Duration::from_secs(2)).unwrap();
        publisher
            .publish("orders.ingest", Bytes::from_static(b"{\"id\":\"1\"}"))
            .await
            .unwrap();

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "orders.ingest");
        assert_eq!(seen[0].1, Bytes::from_static(b"{\"id\":\"1\"}"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let router = Router::new().route(
            "/topics/{topic}",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = serve(router).await;

        let publisher = HttpPublisher::new(base, Duration::from_secs(2)).unwrap();
        let err = publisher
            .publish("orders.ingest", Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Rejected(503)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let publisher = HttpPublisher::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let err = publisher
            .publish("orders.ingest", Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Transport(_)));
    }
}
