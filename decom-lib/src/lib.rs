#![doc = include_str!("../README.md")]

mod error;
mod prelude {
    pub use crate::error::{Error, Result};
}

pub mod codec;
pub mod decom;
pub mod labelfile;
pub mod measurand;
pub mod stream;
pub mod unit;

pub use codec::{Codec, CodecRegistry, Value};
pub use decom::{CyclicCounter, DecomOpts, Decommutator, Extract};
pub use error::{Error, Result};
pub use labelfile::LabelFile;
pub use measurand::{Component, Measurand, MeasurandExtractor};
pub use stream::{
    compose, get_stream_processor, Collector, DataSink, DataSource, Driver, FileWriter, Fill,
    Filter, FrameSource, IterSource, NoOp, Process, StreamProcessor, WriterSink,
};
pub use unit::{DataUnit, Frame, Measurement, Packet, SubFrame, UnitKind};
