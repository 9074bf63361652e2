use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::server::http::{HttpError, HttpRequest, HttpResponse};

pub type Recorded = Arc<Mutex<Vec<HttpRequest>>>;

/// Serves `responses` in order, one per connection, recording every request.
/// Once the list runs out each further request gets a 500.
pub async fn canned_upstream(responses: Vec<(u16, Value)>) -> (String, Recorded) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let seen = recorded.clone();

    tokio::spawn(async move {
        let mut responses = responses.into_iter();
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut buf = Vec::new();
            let request = loop {
                let mut chunk = [0u8; 4096];
                let n = match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => break None,
                    Ok(n) => n,
                };
                buf.extend_from_slice(&chunk[..n]);
                match HttpRequest::parse(&buf, usize::MAX) {
                    Ok(req) => break Some(req),
                    Err(HttpError::Incomplete) => continue,
                    Err(_) => break None,
                }
            };
            let Some(request) = request else { continue };
            seen.lock().push(request);

            let (status, body) = responses
                .next()
                .unwrap_or((500, serde_json::json!({ "message": "no canned response" })));
            let _ = stream
                .write_all(&HttpResponse::json(status, &body).build())
                .await;
            let _ = stream.shutdown().await;
        }
    });

    (base_url, recorded)
}

pub fn body_json(request: &HttpRequest) -> Value {
    serde_json::from_slice(&request.body).unwrap()
}
