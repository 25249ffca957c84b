use crate::unit::UnitKind;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A unit, or a binding, does not satisfy a declared capability.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: UnitKind,
        actual: UnitKind,
    },

    #[error("\"{0}\" is not a valid interpretation specification")]
    UnknownCodec(String),

    #[error("{codec} expects a word with size {expected} but was provided a word with size {actual}")]
    InvalidWordSize {
        codec: String,
        expected: u32,
        actual: u32,
    },

    #[error("word size of {0} bits is not supported")]
    UnsupportedWordSize(u32),

    /// An abstract source or sink was processed without a concrete implementation.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("invalid stream processor name \"{0}\"")]
    InvalidName(String),

    #[error("mask {mask:#x} selects bits outside a {size} bit word")]
    InvalidMask { mask: u64, size: u32 },

    #[error("Not enough bytes")]
    NotEnoughData { actual: usize, minimum: usize },

    #[error("packet data length {declared} does not match data length {actual}")]
    PacketLength { declared: u32, actual: usize },

    #[error("invalid sync pattern: {0}")]
    InvalidSync(String),

    #[error("label file error: {0}")]
    LabelFile(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
