//! Frame to subframe decommutation.
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::prelude::*;
use crate::stream::{Ports, Process};
use crate::unit::{DataUnit, Frame, SubFrame, UnitKind};

/// Options controlling subframe identification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecomOpts {
    /// Pattern expected at the start of every frame. Empty disables the check.
    pub sync: Vec<u8>,
    /// Number of frames in one synchronization cycle.
    pub cycle_length: u32,
    /// Optional cycle position to subframe id table. Positions not in the table use the
    /// position as the id.
    pub mapping: Option<HashMap<u32, u32>>,
}

impl DecomOpts {
    #[must_use]
    pub fn new(cycle_length: u32) -> Self {
        DecomOpts {
            sync: Vec::default(),
            cycle_length: cycle_length.max(1),
            mapping: None,
        }
    }

    #[must_use]
    pub fn with_sync(mut self, sync: &[u8]) -> Self {
        self.sync = sync.to_vec();
        self
    }

    /// Set the sync pattern from a hex string such as `"0xFAF320"` or `"fa f3 20"`.
    ///
    /// # Errors
    /// [Error::InvalidSync] if `sync` is not valid hex.
    pub fn with_sync_hex(self, sync: &str) -> Result<Self> {
        let cleaned: String = sync
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let sync = hex::decode(&cleaned).map_err(|e| Error::InvalidSync(format!("{sync}: {e}")))?;
        Ok(self.with_sync(&sync))
    }

    #[must_use]
    pub fn with_mapping(mut self, mapping: HashMap<u32, u32>) -> Self {
        self.mapping = Some(mapping);
        self
    }
}

/// Produces the subframes contained in a frame.
///
/// This is the extension point for decommutation schemes that emit more, or fewer, than one
/// subframe per frame. Implementations see frames in the order they were queued.
pub trait Extract: Send {
    fn extract(&mut self, frame: Frame) -> Vec<SubFrame>;
}

/// Emits exactly one subframe per frame, identified by its position in the sync cycle.
///
/// The cycle position advances by the difference in sequence numbers between consecutive
/// frames, so dropped frames do not shift the ids of the frames that follow them.
#[derive(Debug, Clone)]
pub struct CyclicCounter {
    opts: DecomOpts,
    position: u32,
    last_sequence: Option<u32>,
    frames: u64,
    sync_misses: u64,
}

impl CyclicCounter {
    #[must_use]
    pub fn new(opts: DecomOpts) -> Self {
        CyclicCounter {
            opts,
            position: 0,
            last_sequence: None,
            frames: 0,
            sync_misses: 0,
        }
    }

    /// Number of frames seen that did not start with the sync pattern.
    #[must_use]
    pub fn sync_misses(&self) -> u64 {
        self.sync_misses
    }

    fn advance(&mut self, sequence: u32) -> u32 {
        let cycle = u64::from(self.opts.cycle_length.max(1));
        if let Some(last) = self.last_sequence {
            let delta = u64::from(sequence.wrapping_sub(last));
            // Remainder is less than cycle, which fits in u32
            self.position = ((u64::from(self.position) + delta) % cycle) as u32;
        }
        self.last_sequence = Some(sequence);
        self.position
    }

    fn subframe_id(&self, position: u32) -> u32 {
        self.opts
            .mapping
            .as_ref()
            .and_then(|m| m.get(&position).copied())
            .unwrap_or(position)
    }
}

impl Extract for CyclicCounter {
    fn extract(&mut self, frame: Frame) -> Vec<SubFrame> {
        self.frames += 1;
        if !frame.data.starts_with(&self.opts.sync) {
            self.sync_misses += 1;
            debug!(
                sequence = frame.sequence,
                misses = self.sync_misses,
                "frame does not start with sync pattern"
            );
        }
        let position = self.advance(frame.sequence);
        let id = self.subframe_id(position);
        trace!(sequence = frame.sequence, position, id, "subframe");
        vec![SubFrame::new(frame, id)]
    }
}

/// Stream processor converting frames into subframes.
///
/// Input [Frame], output [SubFrame]. A subframe received as input is treated as its frame
/// and assigned a new id.
pub struct Decommutator {
    extractor: Box<dyn Extract>,
}

impl Decommutator {
    /// Decommutator using a [CyclicCounter] configured by `opts`.
    #[must_use]
    pub fn new(opts: DecomOpts) -> Self {
        Self::with_extractor(CyclicCounter::new(opts))
    }

    /// Decommutator using a custom extraction scheme.
    pub fn with_extractor<E: Extract + 'static>(extractor: E) -> Self {
        Decommutator {
            extractor: Box::new(extractor),
        }
    }
}

impl Default for Decommutator {
    fn default() -> Self {
        Self::new(DecomOpts::new(1))
    }
}

impl Process for Decommutator {
    fn input_kind(&self) -> UnitKind {
        UnitKind::Frame
    }

    fn output_kind(&self) -> UnitKind {
        UnitKind::SubFrame
    }

    fn process(&mut self, ports: &Ports) -> Result<()> {
        for unit in ports.drain() {
            let frame = match unit {
                DataUnit::Frame(frame) => frame,
                DataUnit::SubFrame(sf) => sf.frame,
                other => {
                    return Err(Error::TypeMismatch {
                        expected: UnitKind::Frame,
                        actual: other.kind(),
                    })
                }
            };
            for subframe in self.extractor.extract(frame) {
                ports.output(subframe)?;
            }
        }
        Ok(())
    }
}
