//! Typed dataflow graph of stream processors.
//!
//! A [StreamProcessor] owns an input queue and weak bindings to the input queues of the
//! processors downstream of it. Calling [StreamProcessor::process] handles whatever is
//! queued at that moment and pushes results downstream; nothing runs in the background.
//! Use a [Driver] to keep processing until the graph is idle.
//!
//! Every processor declares the [UnitKind](crate::UnitKind) it accepts and the kind it
//! produces. Bindings and queue operations that don't line up fail with
//! [Error::TypeMismatch](crate::Error::TypeMismatch).
//!
//! ```
//! use decom::{Collector, Driver, FrameSource, NoOp, StreamProcessor, UnitKind};
//!
//! let (collector, units) = Collector::new(UnitKind::Frame);
//! let source = StreamProcessor::new(FrameSource::builder().frame_size(4).num_frames(3).build());
//! let pipeline = source
//!     .then(&StreamProcessor::new(NoOp::of(UnitKind::Frame))).unwrap()
//!     .then(&StreamProcessor::new(collector)).unwrap();
//!
//! let passes = Driver::new(pipeline).run().unwrap();
//! assert_eq!(passes, 1);
//! assert_eq!(units.lock().unwrap().len(), 3);
//! ```
mod compose;
mod driver;
mod processor;
mod registry;
mod sinks;
mod sources;
mod transform;

pub use compose::compose;
pub use driver::Driver;
pub use processor::{drain, Name, Node, Ports, Process, Queue, StreamProcessor};
pub use registry::get_stream_processor;
pub use sinks::{Collected, Collector, DataSink, FileWriter, Formatter, WriterSink};
pub use sources::{DataSource, Fill, FrameSource, IterSource};
pub use transform::{Filter, NoOp};
