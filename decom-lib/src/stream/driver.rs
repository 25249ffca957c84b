use tracing::{debug, warn};

use super::processor::Node;
use crate::prelude::*;

/// Runs a processing graph until it has nothing left to do.
///
/// Each pass calls `process` once on the root node. The driver stops when every stage is
/// idle or after `max_passes`, whichever comes first.
#[derive(Debug, Clone)]
pub struct Driver {
    root: Node,
    max_passes: usize,
}

impl Driver {
    pub const DEFAULT_MAX_PASSES: usize = 1024;

    #[must_use]
    pub fn new(root: Node) -> Self {
        Driver {
            root,
            max_passes: Self::DEFAULT_MAX_PASSES,
        }
    }

    #[must_use]
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Process the root node until idle, returning the number of passes made.
    ///
    /// At least one pass is always made so sources without pending state get to run.
    ///
    /// # Errors
    /// The first error returned by any stage.
    pub fn run(&self) -> Result<usize> {
        let mut passes = 0;
        while passes < self.max_passes.max(1) {
            self.root.process()?;
            passes += 1;
            if self.root.is_idle() {
                debug!(passes, "graph idle");
                return Ok(passes);
            }
        }
        warn!(
            passes,
            pending = self.root.pending(),
            "stopped at pass limit before graph was idle"
        );
        Ok(passes)
    }
}
