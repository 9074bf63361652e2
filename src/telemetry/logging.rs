use chrono::SecondsFormat;
use env_logger::Env;
use std::io::Write;

use super::context::current_request_id;
use crate::config::Environment;

/// Initialize logging. `RUST_LOG` wins over `default_level`.
///
/// Production writes one JSON object per line; everything else gets a
/// human-readable line. Both carry the current request id when there is one.
pub fn init(default_level: &str, environment: Environment) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default_level));

    if environment.is_production() {
        builder.format(|buf, record| {
            let mut line = serde_json::json!({
                "timestamp": chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                "level": record.level().as_str().to_ascii_lowercase(),
                "message": record.args().to_string(),
            });
            if let Some(id) = current_request_id() {
                line["request_id"] = serde_json::Value::String(id);
            }
            writeln!(buf, "{}", line)
        });
    } else {
        builder.format(|buf, record| {
            let request_id = current_request_id().unwrap_or_else(|| "-".to_string());
            writeln!(
                buf,
                "{} {:<5} [{}] {}",
                chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                record.level(),
                request_id,
                record.args()
            )
        });
    }

    // A second init (tests, embedding) is harmless.
    let _ = builder.try_init();
}
