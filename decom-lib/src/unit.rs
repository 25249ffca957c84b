//! Data units moved between stream processors.
//!
//! Every unit carries a sequence number assigned by the producing node, a capture time, a
//! processing time and its raw bytes. [`UnitKind`] is the capability tag used to type-check
//! queues and bindings.
use std::fmt::Display;

use chrono::{DateTime, Utc};
use derive_more::From;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::codec::Value;
use crate::prelude::*;

/// Nanosecond resolution UTC timestamp.
pub type Timestamp = DateTime<Utc>;

/// Capability tag declared by a processor for its input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnitKind {
    /// Any data unit.
    Any,
    Frame,
    SubFrame,
    Packet,
    Measurement,
    /// No port; sources declare this as input and sinks as output.
    Nothing,
}

impl UnitKind {
    /// Returns true if a unit, or a port, of kind `other` may be used where `self` is declared.
    ///
    /// | declared    | accepts                 |
    /// |-------------|-------------------------|
    /// | Any         | everything but Nothing  |
    /// | Frame       | Frame, SubFrame         |
    /// | SubFrame    | SubFrame                |
    /// | Packet      | Packet                  |
    /// | Measurement | Measurement             |
    /// | Nothing     | nothing                 |
    #[must_use]
    pub fn accepts(self, other: UnitKind) -> bool {
        use UnitKind::{Any, Frame, Nothing, SubFrame};
        match (self, other) {
            (Nothing, _) | (_, Nothing) => false,
            (Any, _) | (Frame, SubFrame) => true,
            (declared, other) => declared == other,
        }
    }
}

impl Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UnitKind::Any => "DataUnit",
            UnitKind::Frame => "Frame",
            UnitKind::SubFrame => "SubFrame",
            UnitKind::Packet => "Packet",
            UnitKind::Measurement => "Measurement",
            UnitKind::Nothing => "nothing",
        };
        f.write_str(name)
    }
}

/// Unit of synchronized input.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    pub sequence: u32,
    pub c_time: Timestamp,
    pub p_time: Timestamp,
    #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
    pub data: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn new(sequence: u32, c_time: Timestamp, p_time: Timestamp, data: Vec<u8>) -> Self {
        Frame {
            sequence,
            c_time,
            p_time,
            data,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A [Frame] tagged with its position in a synchronization cycle.
///
/// Only produced by a [Decommutator](crate::Decommutator).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubFrame {
    pub frame: Frame,
    pub subframe_id: u32,
}

impl SubFrame {
    #[must_use]
    pub fn new(frame: Frame, subframe_id: u32) -> Self {
        SubFrame { frame, subframe_id }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Packet {
    pub sequence: u32,
    pub c_time: Timestamp,
    pub p_time: Timestamp,
    pub packet_id: u32,
    /// Number of bytes of packet data. Zero means not known.
    pub packet_data_length: u32,
    #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
    pub data: Vec<u8>,
}

impl Packet {
    /// Construct a packet.
    ///
    /// # Errors
    /// [Error::PacketLength] if `packet_data_length` is non-zero and does not match the
    /// length of `data`.
    pub fn new(
        sequence: u32,
        c_time: Timestamp,
        p_time: Timestamp,
        packet_id: u32,
        packet_data_length: u32,
        data: Vec<u8>,
    ) -> Result<Self> {
        if packet_data_length != 0 && packet_data_length as usize != data.len() {
            return Err(Error::PacketLength {
                declared: packet_data_length,
                actual: data.len(),
            });
        }
        Ok(Packet {
            sequence,
            c_time,
            p_time,
            packet_id,
            packet_data_length,
            data,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A decoded parameter value taken from a [SubFrame].
///
/// `data` holds the raw word bytes the value was decoded from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Measurement {
    pub sequence: u32,
    pub c_time: Timestamp,
    pub p_time: Timestamp,
    pub subframe_id: u32,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
    pub data: Vec<u8>,
    pub value: Value,
}

/// Any unit that may flow through a stream processor queue.
#[derive(Debug, Clone, PartialEq, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(tag = "type"))]
pub enum DataUnit {
    Frame(Frame),
    SubFrame(SubFrame),
    Packet(Packet),
    Measurement(Measurement),
}

impl DataUnit {
    #[must_use]
    pub fn kind(&self) -> UnitKind {
        match self {
            DataUnit::Frame(_) => UnitKind::Frame,
            DataUnit::SubFrame(_) => UnitKind::SubFrame,
            DataUnit::Packet(_) => UnitKind::Packet,
            DataUnit::Measurement(_) => UnitKind::Measurement,
        }
    }

    #[must_use]
    pub fn sequence(&self) -> u32 {
        match self {
            DataUnit::Frame(f) => f.sequence,
            DataUnit::SubFrame(sf) => sf.frame.sequence,
            DataUnit::Packet(p) => p.sequence,
            DataUnit::Measurement(m) => m.sequence,
        }
    }

    #[must_use]
    pub fn capture_time(&self) -> Timestamp {
        match self {
            DataUnit::Frame(f) => f.c_time,
            DataUnit::SubFrame(sf) => sf.frame.c_time,
            DataUnit::Packet(p) => p.c_time,
            DataUnit::Measurement(m) => m.c_time,
        }
    }

    #[must_use]
    pub fn process_time(&self) -> Timestamp {
        match self {
            DataUnit::Frame(f) => f.p_time,
            DataUnit::SubFrame(sf) => sf.frame.p_time,
            DataUnit::Packet(p) => p.p_time,
            DataUnit::Measurement(m) => m.p_time,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        match self {
            DataUnit::Frame(f) => &f.data,
            DataUnit::SubFrame(sf) => &sf.frame.data,
            DataUnit::Packet(p) => &p.data,
            DataUnit::Measurement(m) => &m.data,
        }
    }

    /// Number of data bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }
}

impl Display for DataUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{{sequence: {}, c_time: {:?}, ",
            self.kind(),
            self.sequence(),
            self.capture_time()
        )?;
        match self {
            DataUnit::SubFrame(sf) => write!(f, "subframe_id: {}, ", sf.subframe_id)?,
            DataUnit::Packet(p) => write!(
                f,
                "packet_id: {}, packet_data_length: {}, ",
                p.packet_id, p.packet_data_length
            )?,
            DataUnit::Measurement(m) => write!(
                f,
                "subframe_id: {}, name: {}, value: {}, ",
                m.subframe_id, m.name, m.value
            )?,
            DataUnit::Frame(_) => (),
        }
        write!(f, "data:[len={}]}}", self.len())
    }
}
