//! Request forwarding to the backend data plane
//!
//! On success the backend's response becomes the gateway's response
//! verbatim, whatever its status. Only transport-level failures (connect
//! errors, timeouts) surface as a [`ForwardError`].

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

use bucketgate_auth::FederatedUser;
use bucketgate_common::RequestId;

/// Transport-level forwarding failure
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("backend call timed out")]
    Timeout,
}

/// Trait for the data-plane forwarding collaborator
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Forward the original request to the backend on behalf of the user
    async fn forward(
        &self,
        request: Request,
        client_addr: SocketAddr,
        user: &FederatedUser,
        request_id: RequestId,
    ) -> Result<Response, ForwardError>;
}

/// Forwarder over a plain HTTP client
pub struct HttpForwarder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpForwarder {
    /// Create a forwarder targeting the given backend endpoint
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        request: Request,
        client_addr: SocketAddr,
        user: &FederatedUser,
        request_id: RequestId,
    ) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", http::uri::PathAndQuery::as_str);
        let url = format!("{}{}", self.endpoint, path_and_query);

        debug!(%request_id, user = %user.user_name, method = %parts.method, url = %url,
            "forwarding request to backend");

        // Bodies are streamed through, never buffered; object payloads can
        // be arbitrarily large.
        let mut outbound = self
            .client
            .request(parts.method, &url)
            .header("x-forwarded-for", client_addr.ip().to_string())
            .body(reqwest::Body::wrap_stream(body.into_data_stream()));
        for (name, value) in &parts.headers {
            // The client sets its own host and length framing
            if name == http::header::HOST || name == http::header::CONTENT_LENGTH {
                continue;
            }
            outbound = outbound.header(name, value);
        }

        let backend_response = outbound.send().await.map_err(|e| {
            if e.is_timeout() {
                ForwardError::Timeout
            } else {
                ForwardError::Transport(e.to_string())
            }
        })?;

        let mut builder = Response::builder().status(backend_response.status());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(backend_response.headers().clone());
        }

        builder
            .body(Body::from_stream(backend_response.bytes_stream()))
            .map_err(|e| ForwardError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};
    use axum::Router;
    use tokio::net::TcpListener;

    use bucketgate_auth::Credential;

    /// Backend double that echoes the request body back
    async fn echo(request: Request) -> Response {
        let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .unwrap();
        Response::builder()
            .status(StatusCode::OK)
            .header("x-backend", "echo")
            .body(Body::from(bytes))
            .unwrap()
    }

    #[tokio::test]
    async fn test_streams_body_to_backend_and_response_back() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().fallback(echo))
                .await
                .unwrap();
        });

        let forwarder =
            HttpForwarder::new(format!("http://{addr}"), Duration::from_secs(5)).unwrap();
        let payload = vec![b'x'; 4 * 1024 * 1024];
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/okBucket/big-object")
            .body(Body::from(payload.clone()))
            .unwrap();
        let user = FederatedUser::new("alice", Credential::new("A1", "S1"));

        let response = forwarder
            .forward(request, "10.1.2.3:9000".parse().unwrap(), &user, RequestId::new())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-backend"], "echo");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.len(), payload.len());
    }
}
