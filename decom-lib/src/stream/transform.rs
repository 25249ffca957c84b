use super::processor::{Ports, Process};
use crate::prelude::*;
use crate::unit::{DataUnit, UnitKind};

/// Passes every unit through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct NoOp {
    kind: UnitKind,
}

impl NoOp {
    /// Pass-through accepting and producing `kind`.
    #[must_use]
    pub fn of(kind: UnitKind) -> Self {
        NoOp { kind }
    }
}

impl Default for NoOp {
    fn default() -> Self {
        NoOp::of(UnitKind::Any)
    }
}

impl Process for NoOp {
    fn input_kind(&self) -> UnitKind {
        self.kind
    }

    fn output_kind(&self) -> UnitKind {
        self.kind
    }

    fn process(&mut self, ports: &Ports) -> Result<()> {
        for unit in ports.drain() {
            ports.output(unit)?;
        }
        Ok(())
    }
}

/// Passes only the units for which a predicate returns true.
pub struct Filter<F> {
    kind: UnitKind,
    predicate: F,
}

impl<F> Filter<F>
where
    F: FnMut(&DataUnit) -> bool + Send,
{
    pub fn new(kind: UnitKind, predicate: F) -> Self {
        Filter { kind, predicate }
    }
}

impl<F> Process for Filter<F>
where
    F: FnMut(&DataUnit) -> bool + Send,
{
    fn input_kind(&self) -> UnitKind {
        self.kind
    }

    fn output_kind(&self) -> UnitKind {
        self.kind
    }

    fn process(&mut self, ports: &Ports) -> Result<()> {
        for unit in ports.drain() {
            if (self.predicate)(&unit) {
                ports.output(unit)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::stream::{compose, Collector, StreamProcessor};
    use crate::unit::Frame;

    #[test]
    fn test_filter() {
        let filter = StreamProcessor::new(Filter::new(UnitKind::Frame, |u| u.sequence() % 2 == 0));
        let (collector, units) = Collector::new(UnitKind::Frame);
        let pipeline = compose(&filter, &StreamProcessor::new(collector)).unwrap();

        let t = Utc::now();
        pipeline
            .add_all((0..6).map(|i| Frame::new(i, t, t, vec![])))
            .unwrap();
        pipeline.process().unwrap();

        let seqs: Vec<u32> = units.lock().unwrap().iter().map(DataUnit::sequence).collect();
        assert_eq!(seqs, vec![0, 2, 4]);
    }

    #[test]
    fn test_noop_preserves_order() {
        let (collector, units) = Collector::new(UnitKind::Any);
        let pipeline = StreamProcessor::new(NoOp::default())
            .then(&StreamProcessor::new(collector))
            .unwrap();

        let t = Utc::now();
        for i in [5, 3, 9] {
            pipeline.add(Frame::new(i, t, t, vec![])).unwrap();
        }
        pipeline.process().unwrap();

        let seqs: Vec<u32> = units.lock().unwrap().iter().map(DataUnit::sequence).collect();
        assert_eq!(seqs, vec![5, 3, 9]);
    }
}
