use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

/// Span attributes. Values must already be hashed or otherwise PII-free.
pub type SpanAttributes = Vec<(&'static str, String)>;

fn render(attributes: &SpanAttributes) -> String {
    attributes
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Times `fut` and logs its outcome under `name`/`op`.
pub async fn with_span<T, E, F>(
    name: &'static str,
    op: &'static str,
    attributes: SpanAttributes,
    fut: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let started = Instant::now();
    log::debug!("span start {} op={} {}", name, op, render(&attributes));

    let result = fut.await;
    let elapsed_ms = started.elapsed().as_millis();

    match &result {
        Ok(_) => log::debug!(
            "span finish {} op={} status=ok elapsed_ms={} {}",
            name,
            op,
            elapsed_ms,
            render(&attributes)
        ),
        Err(e) => log::warn!(
            "span finish {} op={} status=error elapsed_ms={} error={}",
            name,
            op,
            elapsed_ms,
            super::redact::redact_string(&e.to_string())
        ),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_result_through() {
        let ok: Result<u8, String> =
            with_span("test.ok", "test", vec![("k", "v".to_string())], async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u8, String> =
            with_span("test.err", "test", Vec::new(), async { Err("boom".to_string()) }).await;
        assert_eq!(err, Err("boom".to_string()));
    }
}
