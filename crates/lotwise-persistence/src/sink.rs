//! Audit sink trait.

use std::sync::Arc;

use crate::error::PersistenceResult;
use crate::record::AuditRecord;

/// Destination for audit records.
///
/// Writes are synchronous and expected to be short; callers log and
/// continue on failure rather than failing the business operation.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord) -> PersistenceResult<()>;

    /// Push buffered records to durable storage.
    fn flush(&self) -> PersistenceResult<()>;
}

/// Arc wrapper for AuditSink trait objects.
pub type SharedAuditSink = Arc<dyn AuditSink>;

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: AuditRecord) -> PersistenceResult<()> {
        Ok(())
    }

    fn flush(&self) -> PersistenceResult<()> {
        Ok(())
    }
}
