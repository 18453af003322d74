//! JSON Lines audit writer with daily rotation.
//!
//! Records are buffered and flushed once the buffer fills or `flush` is
//! called. The file is chosen from each record's `recorded_at` date, so a
//! buffer spanning midnight lands in two files.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;
use crate::record::AuditRecord;
use crate::sink::AuditSink;

/// Active writer state for one daily file.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

struct WriterState {
    buffer: Vec<AuditRecord>,
    active_writer: Option<ActiveWriter>,
}

/// Append-only JSON Lines writer for audit records.
pub struct JsonLinesAuditWriter {
    base_dir: PathBuf,
    max_buffer_size: usize,
    state: Mutex<WriterState>,
}

impl JsonLinesAuditWriter {
    /// Create a writer rooted at `base_dir`, creating the directory.
    pub fn new(base_dir: impl AsRef<Path>, max_buffer_size: usize) -> PersistenceResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;

        let max_buffer_size = max_buffer_size.max(1);
        Ok(Self {
            base_dir,
            max_buffer_size,
            state: Mutex::new(WriterState {
                buffer: Vec::with_capacity(max_buffer_size),
                active_writer: None,
            }),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the file for `date` (`YYYY-MM-DD`).
    pub fn file_for(&self, date: &str) -> PathBuf {
        self.base_dir.join(format!("audit_{date}.jsonl"))
    }

    /// Flush pending records and close the active file.
    pub fn close(&self) -> PersistenceResult<()> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state)?;
        Self::close_active_writer(&mut state.active_writer);
        Ok(())
    }

    fn close_active_writer(active_writer: &mut Option<ActiveWriter>) {
        if let Some(mut active) = active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush audit writer on close");
            }
            info!(
                date = %active.date,
                records = active.records_written,
                "Closed audit writer"
            );
        }
    }

    fn open_writer(&self, date: &str) -> PersistenceResult<ActiveWriter> {
        let filename = self.file_for(date);
        info!(filename = %filename.display(), "Opening audit writer (append mode)");

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)?;

        Ok(ActiveWriter {
            writer: BufWriter::new(file),
            date: date.to_string(),
            records_written: 0,
        })
    }

    /// Write buffered records in order.
    ///
    /// Records handed to the file leave the buffer; on error the rest stay
    /// buffered for the next flush.
    fn flush_locked(&self, state: &mut WriterState) -> PersistenceResult<()> {
        if state.buffer.is_empty() {
            return Ok(());
        }

        let mut written = 0;
        let outcome = self.write_buffered(state, &mut written);
        state.buffer.drain(..written);

        if let Err(e) = outcome {
            warn!(
                ?e,
                written,
                pending = state.buffer.len(),
                "Audit flush failed, keeping unwritten records"
            );
            return Err(e);
        }

        debug!(records = written, "Flushed audit records");
        Ok(())
    }

    fn write_buffered(&self, state: &mut WriterState, written: &mut usize) -> PersistenceResult<()> {
        let WriterState {
            buffer,
            active_writer,
        } = state;

        for record in buffer.iter() {
            let date = record.recorded_at().format("%Y-%m-%d").to_string();

            let needs_rotation = active_writer
                .as_ref()
                .map(|w| w.date != date)
                .unwrap_or(true);
            if needs_rotation {
                Self::close_active_writer(active_writer);
                *active_writer = Some(self.open_writer(&date)?);
            }

            if let Some(active) = active_writer.as_mut() {
                let json = serde_json::to_string(record)?;
                writeln!(active.writer, "{json}")?;
                active.records_written += 1;
            }
            *written += 1;
        }

        if let Some(active) = active_writer.as_mut() {
            active.writer.flush()?;
        }
        Ok(())
    }
}

impl AuditSink for JsonLinesAuditWriter {
    fn record(&self, record: AuditRecord) -> PersistenceResult<()> {
        let mut state = self.state.lock();
        state.buffer.push(record);
        if state.buffer.len() >= self.max_buffer_size {
            self.flush_locked(&mut state)?;
        }
        Ok(())
    }

    fn flush(&self) -> PersistenceResult<()> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state)
    }
}

impl Drop for JsonLinesAuditWriter {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Err(e) = self.flush_locked(&mut state) {
            warn!(?e, "Failed to flush audit buffer on drop");
        }
        Self::close_active_writer(&mut state.active_writer);
    }
}
