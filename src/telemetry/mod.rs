pub mod context;
pub mod logging;
pub mod redact;
pub mod span;

pub use context::{current_request_id, run_with_request_id, CORRELATION_ID_HEADER};
pub use redact::{fields, redact_pii};
pub use span::{with_span, SpanAttributes};
