//! Stream processors that consume units without producing any.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::processor::{Ports, Process};
use crate::prelude::*;
use crate::unit::{DataUnit, UnitKind};

/// Base sink with no behavior of its own. Processing it is an error.
#[derive(Debug, Clone, Copy)]
pub struct DataSink {
    input_kind: UnitKind,
}

impl DataSink {
    #[must_use]
    pub fn of(input_kind: UnitKind) -> Self {
        DataSink { input_kind }
    }
}

impl Process for DataSink {
    fn input_kind(&self) -> UnitKind {
        self.input_kind
    }

    fn output_kind(&self) -> UnitKind {
        UnitKind::Nothing
    }

    fn process(&mut self, _ports: &Ports) -> Result<()> {
        Err(Error::NotImplemented("DataSink"))
    }
}

/// Formats a unit as a single output line, without the trailing newline.
pub type Formatter = Box<dyn Fn(&DataUnit) -> String + Send>;

/// Writes one line per unit to a [Write].
///
/// Lines use the unit's `Display` unless a formatter is set. The writer is flushed after each
/// call to `process` and when the sink is dropped.
pub struct WriterSink<W: Write + Send> {
    writer: W,
    formatter: Option<Formatter>,
    written: usize,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink {
            writer,
            formatter: None,
            written: 0,
        }
    }

    #[must_use]
    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&DataUnit) -> String + Send + 'static,
    {
        self.formatter = Some(Box::new(formatter));
        self
    }

    /// Number of units written so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }
}

impl WriterSink<std::io::Stdout> {
    /// Sink printing each unit to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        WriterSink::new(std::io::stdout())
    }
}

impl<W: Write + Send> Process for WriterSink<W> {
    fn output_kind(&self) -> UnitKind {
        UnitKind::Nothing
    }

    fn process(&mut self, ports: &Ports) -> Result<()> {
        let units = ports.drain();
        if units.is_empty() {
            return Ok(());
        }
        for unit in &units {
            match self.formatter {
                Some(ref fmt) => writeln!(self.writer, "{}", fmt(unit))?,
                None => writeln!(self.writer, "{unit}")?,
            }
        }
        self.written += units.len();
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Drop for WriterSink<W> {
    fn drop(&mut self) {
        if let Err(err) = self.writer.flush() {
            warn!("failed to flush sink writer: {err}");
        }
    }
}

/// [WriterSink] that writes to a file.
pub type FileWriter = WriterSink<BufWriter<File>>;

impl FileWriter {
    /// Create, or truncate, the file at `path`. The file stays open until the sink is dropped.
    ///
    /// # Errors
    /// If the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("writing units to {path:?}");
        let file = File::create(path)?;
        Ok(WriterSink::new(BufWriter::new(file)))
    }
}

/// Shared buffer of units accumulated by a [Collector].
pub type Collected = Arc<Mutex<Vec<DataUnit>>>;

/// Accumulates every unit it receives in a shared buffer.
#[derive(Debug)]
pub struct Collector {
    input_kind: UnitKind,
    units: Collected,
}

impl Collector {
    /// Create a collector accepting `input_kind` along with a handle to what it collects.
    #[must_use]
    pub fn new(input_kind: UnitKind) -> (Self, Collected) {
        let units = Collected::default();
        let collector = Collector {
            input_kind,
            units: Arc::clone(&units),
        };
        (collector, units)
    }
}

impl Process for Collector {
    fn input_kind(&self) -> UnitKind {
        self.input_kind
    }

    fn output_kind(&self) -> UnitKind {
        UnitKind::Nothing
    }

    fn process(&mut self, ports: &Ports) -> Result<()> {
        let units = ports.drain();
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(units);
        Ok(())
    }
}
