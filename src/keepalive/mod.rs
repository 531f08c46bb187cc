//! Tiny HTTP server that answers pings so the hosting platform keeps the
//! process awake.

use axum::{http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

async fn home() -> &'static str {
    "Bot is alive!"
}

async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "success".to_string(),
            message: "Bot is running".to_string(),
        }),
    )
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
}

/// Bind `0.0.0.0:port` and serve in the background.
pub fn start_keepalive_server(port: u16) -> JoinHandle<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                info!(%addr, "keep-alive server listening");
                if let Err(e) = axum::serve(listener, app).await {
                    error!(error = %e, "keep-alive server error");
                }
            }
            Err(e) => {
                error!(%addr, error = %e, "failed to bind keep-alive server");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_home() {
        assert_eq!(home().await, "Bot is alive!");
    }

    #[tokio::test]
    async fn test_health_check() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["status"], "success");
    }

    #[tokio::test]
    async fn test_serves_over_tcp() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router()).await.unwrap();
        });

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("Bot is alive!"));
    }
}
