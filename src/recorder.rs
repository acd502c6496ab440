use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::drivers::PersistError;

pub const CSV_HEADER: &str =
    "Time(s),CH1_Vol(V),CH2_Vol(V),CH1_Weight(N),CH2_Hydraulic_Pressure(kPa)";

/// One persisted line: raw and scaled values for both channels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PersistedRow {
    pub elapsed: f64,
    pub raw: [f64; 2],
    pub scaled: [f64; 2],
}

/// Append-only row sink driven by the display loop.
pub trait Persister {
    /// Truncates `path`, writes the header and makes it the current destination.
    fn begin(&mut self, path: &Path) -> Result<(), PersistError>;
    fn append(&mut self, row: &PersistedRow) -> Result<(), PersistError>;
    /// Flushes and closes the current destination, if any.
    fn end(&mut self);
}

/// Write cursor of the currently open destination.
#[derive(Clone, Debug, PartialEq)]
pub struct PersistenceSession {
    pub path: PathBuf,
    pub last_written_time: Option<f64>,
}

impl PersistenceSession {
    pub fn new(path: PathBuf) -> Self {
        Self { path, last_written_time: None }
    }

    /// True when `elapsed` has not been written yet in this session.
    pub fn is_new(&self, elapsed: f64) -> bool {
        self.last_written_time != Some(elapsed)
    }
}

pub struct CsvRecorder {
    writer: Option<(PathBuf, BufWriter<File>)>,
}

impl CsvRecorder {
    pub fn new() -> Self {
        Self { writer: None }
    }

    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }
}

impl Default for CsvRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Persister for CsvRecorder {
    fn begin(&mut self, path: &Path) -> Result<(), PersistError> {
        // 先收尾旧文件，保证切换前写入的数据完整落盘
        self.end();
        let file = File::create(path).map_err(|source| PersistError::Create {
            path: path.to_owned(),
            source,
        })?;
        let mut w = BufWriter::new(file);
        writeln!(w, "{CSV_HEADER}")
            .and_then(|_| w.flush())
            .map_err(|source| PersistError::Write { path: path.to_owned(), source })?;
        log::info!("recording started: {}", path.display());
        self.writer = Some((path.to_owned(), w));
        Ok(())
    }

    fn append(&mut self, row: &PersistedRow) -> Result<(), PersistError> {
        let (path, w) = self.writer.as_mut().ok_or(PersistError::NoSession)?;
        // 每行立即 flush，断电时最多丢一行
        writeln!(
            w,
            "{},{},{},{},{}",
            row.elapsed, row.raw[0], row.raw[1], row.scaled[0], row.scaled[1]
        )
        .and_then(|_| w.flush())
        .map_err(|source| PersistError::Write { path: path.clone(), source })
    }

    fn end(&mut self) {
        if let Some((path, mut w)) = self.writer.take() {
            if let Err(e) = w.flush() {
                log::error!("failed to flush {}: {e}", path.display());
            }
            log::info!("recording saved: {}", path.display());
        }
    }
}

impl Drop for CsvRecorder {
    fn drop(&mut self) {
        self.end();
    }
}
