//! Append-only output of tracking samples
//!
//! One text line per valid sample:
//!
//! ```text
//! HH:MM:SS.fff <device id hex> <CONTEXT> <x> <y> <z>
//! ```
//!
//! with positions at six decimals, framed by session start and end markers.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use alt_tracking::Vector3;
use chrono::{NaiveDateTime, NaiveTime};
use parking_lot::Mutex;

use crate::context::EnvironmentContext;
use crate::device::DeviceId;

/// One accepted pose sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    pub timestamp: NaiveTime,
    pub device_id: DeviceId,
    pub context: EnvironmentContext,
    pub position: Vector3,
}

impl fmt::Display for SampleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:.6} {:.6} {:.6}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.device_id,
            self.context.label(),
            self.position.x,
            self.position.y,
            self.position.z
        )
    }
}

/// Line framing a collection session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMarker {
    Started(NaiveDateTime),
    Ended(NaiveDateTime),
}

impl fmt::Display for SessionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (verb, at) = match self {
            SessionMarker::Started(at) => ("started", at),
            SessionMarker::Ended(at) => ("ended", at),
        };
        write!(f, "=== Session {} at {} ===", verb, at.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Destination of sample records
pub trait OutputSink: Send {
    fn write_record(&mut self, record: &SampleRecord) -> io::Result<()>;

    fn write_marker(&mut self, marker: SessionMarker) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Flush and release the destination. Later writes fail.
    fn close(&mut self) -> io::Result<()>;

    /// Where records go, for status reports
    fn describe(&self) -> String;
}

/// Appends records to a text file
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Open `path` for appending, creating it if missing
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!("Opened output file {}", path.display());
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "output file is closed"))
    }

    fn write_line(&mut self, line: &dyn fmt::Display) -> io::Result<()> {
        writeln!(self.writer()?, "{}", line)
    }
}

impl OutputSink for FileSink {
    fn write_record(&mut self, record: &SampleRecord) -> io::Result<()> {
        self.write_line(record)
    }

    fn write_marker(&mut self, marker: SessionMarker) -> io::Result<()> {
        self.write_line(&marker)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to flush {}: {}", self.path.display(), e);
        }
    }
}

/// Keeps lines in memory
///
/// Clones share the same buffer, so a test can hand one clone to a
/// session and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Lines that are sample records (markers excluded)
    pub fn records(&self) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|line| !line.starts_with("==="))
            .cloned()
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    fn push(&self, line: String) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink is closed"));
        }
        self.lines.lock().push(line);
        Ok(())
    }
}

impl OutputSink for MemorySink {
    fn write_record(&mut self, record: &SampleRecord) -> io::Result<()> {
        self.push(record.to_string())
    }

    fn write_marker(&mut self, marker: SessionMarker) -> io::Result<()> {
        self.push(marker.to_string())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        *self.closed.lock() = true;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
