pub mod http;
pub mod router;

use bytes::BytesMut;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use self::http::{find_headers_end, HttpError, HttpRequest, HttpResponse};
use crate::config::Environment;
use crate::error::Result;
use crate::security::{build_content_security_policy, create_csp_nonce, security_headers, CSP_NONCE_HEADER};
use crate::state::AppState;
use crate::telemetry::context::correlation_id_or_new;
use crate::telemetry::{run_with_request_id, CORRELATION_ID_HEADER};

const MAX_HEADER_BYTES: usize = 16 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Binds the configured address and serves until `shutdown` resolves.
pub async fn serve(state: Arc<AppState>, shutdown: impl Future<Output = ()>) -> Result<()> {
    let listener = TcpListener::bind(&state.config.bind_addr).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    serve_listener(listener, state, shutdown).await
}

pub async fn serve_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        log::warn!("Accept failed: {}", e);
                        continue;
                    }
                };
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, state).await {
                        log::debug!("Connection closed with error: {}", e);
                    }
                });
            }
            _ = &mut shutdown => {
                log::info!("Shutting down server");
                return Ok(());
            }
        }
    }
}

enum ReadOutcome {
    Request(HttpRequest),
    Rejected(HttpResponse),
    Closed,
}

async fn read_request(stream: &mut TcpStream, max_body: usize) -> std::io::Result<ReadOutcome> {
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(ReadOutcome::Closed);
        }

        match HttpRequest::parse(&buf, max_body) {
            Ok(request) => return Ok(ReadOutcome::Request(request)),
            Err(HttpError::Incomplete) => {
                if find_headers_end(&buf).is_none() && buf.len() > MAX_HEADER_BYTES {
                    return Ok(ReadOutcome::Rejected(HttpResponse::error(
                        400,
                        "Request headers too large",
                    )));
                }
            }
            Err(HttpError::PayloadTooLarge) => {
                return Ok(ReadOutcome::Rejected(HttpResponse::error(
                    413,
                    "Request body too large",
                )))
            }
            Err(e) => {
                log::debug!("Rejected request: {}", e);
                return Ok(ReadOutcome::Rejected(HttpResponse::error(400, "Bad request")));
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: Arc<AppState>,
) -> std::io::Result<()> {
    let outcome = match tokio::time::timeout(
        READ_TIMEOUT,
        read_request(&mut stream, state.config.max_body_bytes),
    )
    .await
    {
        Ok(outcome) => outcome?,
        Err(_) => return Ok(()),
    };

    let environment = state.config.environment;
    let response = match outcome {
        ReadOutcome::Request(request) => {
            let correlation_id = correlation_id_or_new(request.headers.get(CORRELATION_ID_HEADER));
            let response = run_with_request_id(correlation_id.clone(), async {
                let response = router::route(&state, &request, Some(peer.ip())).await;
                log::info!("{} {} -> {}", request.method, request.path, response.status);
                response
            })
            .await;
            finalize(response, environment, &correlation_id)
        }
        ReadOutcome::Rejected(response) => {
            finalize(response, environment, &correlation_id_or_new(None))
        }
        ReadOutcome::Closed => return Ok(()),
    };

    stream.write_all(&response.build()).await?;
    stream.shutdown().await
}

/// Security headers, a fresh CSP with its nonce, and the correlation id.
pub fn finalize(response: HttpResponse, environment: Environment, correlation_id: &str) -> HttpResponse {
    let mut response = response.with_header(CORRELATION_ID_HEADER, correlation_id);
    for (name, value) in security_headers(environment) {
        response = response.with_header(name, value);
    }

    let nonce = create_csp_nonce();
    match build_content_security_policy(&nonce, !environment.is_production()) {
        Ok(policy) => response
            .with_header("Content-Security-Policy", &policy)
            .with_header(CSP_NONCE_HEADER, &nonce),
        Err(e) => {
            log::error!("Failed to build CSP: {}", e);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_adds_security_and_correlation_headers() {
        let response = finalize(HttpResponse::new(200), Environment::Production, "req-42");
        assert_eq!(response.header(CORRELATION_ID_HEADER), Some("req-42"));
        let nonce = response.header(CSP_NONCE_HEADER).unwrap().to_string();
        assert!(response
            .header("Content-Security-Policy")
            .unwrap()
            .contains(&format!("'nonce-{}'", nonce)));
        assert!(response.header("Strict-Transport-Security").is_some());
    }

    #[test]
    fn development_has_no_hsts() {
        let response = finalize(HttpResponse::new(200), Environment::Development, "req-1");
        assert!(response.header("Strict-Transport-Security").is_none());
    }
}
