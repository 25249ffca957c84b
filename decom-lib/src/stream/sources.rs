//! Stream processors that produce units without consuming any.
use std::iter::Peekable;

use chrono::{TimeDelta, TimeZone, Utc};
use tracing::{trace, warn};
use typed_builder::TypedBuilder;

use super::processor::{Ports, Process};
use crate::prelude::*;
use crate::unit::{DataUnit, Frame, Timestamp, UnitKind};

/// Base source with no behavior of its own. Processing it is an error.
#[derive(Debug, Clone, Copy)]
pub struct DataSource {
    output_kind: UnitKind,
}

impl DataSource {
    #[must_use]
    pub fn of(output_kind: UnitKind) -> Self {
        DataSource { output_kind }
    }
}

impl Process for DataSource {
    fn input_kind(&self) -> UnitKind {
        UnitKind::Nothing
    }

    fn output_kind(&self) -> UnitKind {
        self.output_kind
    }

    fn process(&mut self, _ports: &Ports) -> Result<()> {
        Err(Error::NotImplemented("DataSource"))
    }
}

/// Byte pattern used to fill generated frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fill {
    /// Every byte of every frame has this value.
    Constant(u8),
    /// Each frame is filled with the next value, wrapping around at the end.
    Cycle(Vec<u8>),
}

impl Default for Fill {
    fn default() -> Self {
        Fill::Constant(1)
    }
}

fn default_start_time() -> Timestamp {
    Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Generates synthetic frames.
///
/// Each call to `process` emits `num_frames` frames of `frame_size` bytes. Sequence numbers
/// start at 0 and continue across calls. Capture time is
/// `start_time + sequence * timestep`; processing time is the time of generation.
///
/// The source is exhausted after emitting sequence `u32::MAX`, or when the capture time is
/// no longer representable, and emits nothing further.
///
/// ```
/// use decom::{Fill, FrameSource};
///
/// let source = FrameSource::builder()
///     .frame_size(8)
///     .num_frames(4)
///     .fill(Fill::Cycle(vec![0, 1, 2, 3]))
///     .build();
/// ```
#[derive(Debug, TypedBuilder)]
pub struct FrameSource {
    frame_size: usize,
    num_frames: usize,
    /// Capture time of the frame with sequence 0. Defaults to 2010-01-01T00:00:00Z.
    #[builder(default = default_start_time())]
    start_time: Timestamp,
    /// Capture time between consecutive sequence numbers.
    #[builder(default = TimeDelta::seconds(1))]
    timestep: TimeDelta,
    #[builder(default)]
    fill: Fill,
    #[builder(default, setter(skip))]
    sequence: u32,
    #[builder(default, setter(skip))]
    exhausted: bool,
}

impl FrameSource {
    fn fill_value(&self) -> u8 {
        match self.fill {
            Fill::Constant(value) => value,
            Fill::Cycle(ref values) if values.is_empty() => 0,
            Fill::Cycle(ref values) => values[self.sequence as usize % values.len()],
        }
    }

    fn capture_time(&self) -> Option<Timestamp> {
        let step = self.timestep.num_microseconds()?;
        let offset = step.checked_mul(i64::from(self.sequence))?;
        self.start_time
            .checked_add_signed(TimeDelta::microseconds(offset))
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.exhausted {
            return None;
        }
        let frame = Frame::new(
            self.sequence,
            self.capture_time()?,
            Utc::now(),
            vec![self.fill_value(); self.frame_size],
        );
        match self.sequence.checked_add(1) {
            Some(next) => self.sequence = next,
            None => self.exhausted = true,
        }
        Some(frame)
    }

    /// True once the source can produce no more frames.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl Process for FrameSource {
    fn input_kind(&self) -> UnitKind {
        UnitKind::Nothing
    }

    fn output_kind(&self) -> UnitKind {
        UnitKind::Frame
    }

    fn process(&mut self, ports: &Ports) -> Result<()> {
        if self.exhausted {
            return Ok(());
        }
        trace!(first = self.sequence, count = self.num_frames, "generating frames");
        for _ in 0..self.num_frames {
            let Some(frame) = self.next_frame() else {
                warn!(sequence = self.sequence, "frame source exhausted");
                self.exhausted = true;
                break;
            };
            ports.output(frame)?;
        }
        Ok(())
    }
}

/// Emits units drawn from an iterator, at most `batch` per call to `process`.
pub struct IterSource<I: Iterator<Item = DataUnit>> {
    units: Peekable<I>,
    output_kind: UnitKind,
    batch: usize,
}

impl<I: Iterator<Item = DataUnit>> IterSource<I> {
    /// Create a source emitting every unit of `units` on the first call to `process`.
    pub fn new<T>(units: T, output_kind: UnitKind) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        IterSource {
            units: units.into_iter().peekable(),
            output_kind,
            batch: usize::MAX,
        }
    }

    /// Limit the number of units emitted per call. A batch of 0 is treated as 1.
    #[must_use]
    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }
}

impl<I> Process for IterSource<I>
where
    I: Iterator<Item = DataUnit> + Send,
{
    fn input_kind(&self) -> UnitKind {
        UnitKind::Nothing
    }

    fn output_kind(&self) -> UnitKind {
        self.output_kind
    }

    fn process(&mut self, ports: &Ports) -> Result<()> {
        for unit in self.units.by_ref().take(self.batch) {
            ports.output(unit)?;
        }
        Ok(())
    }

    fn has_pending(&mut self) -> bool {
        self.units.peek().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Collector, StreamProcessor};

    fn collect<P: Process + 'static>(source: P, passes: usize) -> Vec<DataUnit> {
        let src = StreamProcessor::new(source);
        let (collector, units) = Collector::new(UnitKind::Any);
        let sink = StreamProcessor::new(collector);
        src.bind_output_to(&sink).unwrap();
        for _ in 0..passes {
            src.process().unwrap();
            sink.process().unwrap();
        }
        let units = units.lock().unwrap();
        units.clone()
    }

    #[test]
    fn test_data_source_not_implemented() {
        let node = StreamProcessor::new(DataSource::of(UnitKind::Frame));
        assert!(matches!(node.process(), Err(Error::NotImplemented(_))));
        assert_eq!(node.input_kind(), UnitKind::Nothing);
    }

    #[test]
    fn test_frame_source_ones() {
        let source = FrameSource::builder().frame_size(4).num_frames(3).build();

        let units = collect(source, 2);

        assert_eq!(units.len(), 6);
        let seqs: Vec<u32> = units.iter().map(DataUnit::sequence).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4, 5]);
        for unit in &units {
            assert_eq!(unit.kind(), UnitKind::Frame);
            assert_eq!(unit.data(), &[1, 1, 1, 1]);
        }
        assert_eq!(
            units[5].capture_time(),
            default_start_time() + TimeDelta::seconds(5)
        );
    }

    #[test]
    fn test_frame_source_cycle() {
        let source = FrameSource::builder()
            .frame_size(2)
            .num_frames(5)
            .timestep(TimeDelta::milliseconds(500))
            .fill(Fill::Cycle(vec![7, 8, 9]))
            .build();

        let units = collect(source, 1);

        let fills: Vec<u8> = units.iter().map(|u| u.data()[0]).collect();
        assert_eq!(fills, vec![7, 8, 9, 7, 8]);
        assert_eq!(
            units[4].capture_time(),
            default_start_time() + TimeDelta::seconds(2)
        );
    }

    #[test]
    fn test_frame_source_stops_at_last_sequence() {
        let mut source = FrameSource::builder().frame_size(1).num_frames(4).build();
        source.sequence = u32::MAX - 1;

        let units = collect(source, 2);

        let seqs: Vec<u32> = units.iter().map(DataUnit::sequence).collect();
        assert_eq!(seqs, vec![u32::MAX - 1, u32::MAX]);
        assert_eq!(
            units[1].capture_time(),
            default_start_time() + TimeDelta::seconds(i64::from(u32::MAX))
        );
    }

    #[test]
    fn test_frame_source_time_overflow() {
        let mut source = FrameSource::builder()
            .frame_size(1)
            .num_frames(3)
            .timestep(TimeDelta::days(365 * 100_000))
            .build();
        source.sequence = 2000;
        let node = StreamProcessor::new(source);
        let (collector, units) = Collector::new(UnitKind::Any);
        let sink = StreamProcessor::new(collector);
        node.bind_output_to(&sink).unwrap();

        node.process().unwrap();
        sink.process().unwrap();
        assert!(units.lock().unwrap().is_empty());
    }

    #[test]
    fn test_iter_source_batches() {
        let t = Utc::now();
        let frames = (0..5).map(move |i| DataUnit::from(Frame::new(i, t, t, vec![])));
        let mut source = IterSource::new(frames, UnitKind::Frame).with_batch(2);
        assert!(source.has_pending());

        let units = collect(source, 2);
        assert_eq!(units.len(), 4);
    }
}
