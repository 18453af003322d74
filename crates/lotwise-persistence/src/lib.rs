//! Audit trail persistence for lotwise.
//!
//! Suggestion snapshots and execution results are appended to daily
//! JSON Lines files (`audit_YYYY-MM-DD.jsonl`):
//! - Each line is a complete JSON object
//! - Partial file corruption only affects individual lines
//! - Files are opened in append mode and never rewritten

pub mod error;
pub mod record;
pub mod sink;
pub mod writer;

pub use error::{PersistenceError, PersistenceResult};
pub use record::{AuditRecord, ExecutionRecord, SuggestionSnapshot};
pub use sink::{AuditSink, NullAuditSink, SharedAuditSink};
pub use writer::JsonLinesAuditWriter;

#[cfg(any(test, feature = "mock"))]
pub use sink::MockAuditSink;
