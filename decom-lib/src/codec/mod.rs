//! Word interpretation.
//!
//! A [CodecRegistry] maps an interpretation spec, e.g., `2c` or `1750a32`, to a [Codec]
//! that validates the declared word size and dispatches to a decode kernel.
//!
//! | spec | width | value |
//! |---|---|---|
//! | `u` | any | unsigned |
//! | `1c` | any | one's complement |
//! | `2c` | any | two's complement |
//! | `ieee16`, `ieee32`, `ieee64` | 16, 32, 64 | IEEE-754 |
//! | `1750a32`, `1750a48` | 32, 48 | MIL-STD-1750A |
//! | `ti32`, `ti40` | 32, 40 | TI TMS320 |
//! | `ibm32`, `ibm64` | 32, 64 | IBM System/370 |
//! | `dec32`, `dec64`, `dec64g` | 32, 64, 64 | DEC F, D and G floating |
//!
//! `dec64` is D-floating (8 bit exponent), the usual VAX double, and `dec64g` is
//! G-floating (11 bit exponent). Use `dec64g` for data described as G-floating.
pub mod kernels;

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::prelude::*;

/// Largest supported word size in bits.
pub const MAX_WORD_BITS: u32 = 64;

/// A decoded word.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum Value {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl Value {
    /// Value as `f64`. Integers beyond 2^53 lose precision.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Unsigned(v) => v as f64,
            Value::Signed(v) => v as f64,
            Value::Float(v) => v,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Signed(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Decode function signature. Receives the raw word bytes, most significant byte first, and
/// the declared word size in bits.
pub type DecodeFn = dyn Fn(&[u8], u32) -> Value + Send + Sync;

/// Floating point kernel contract used by the legacy formats.
pub type Kernel = fn(&[u8], u32) -> f64;

/// A word decoder and the word size it requires.
#[derive(Clone)]
pub struct Codec {
    width: Option<u32>,
    decode: Arc<DecodeFn>,
}

impl Codec {
    /// Create a codec requiring words of exactly `width` bits, or any size if `None`.
    pub fn new<F>(width: Option<u32>, decode: F) -> Self
    where
        F: Fn(&[u8], u32) -> Value + Send + Sync + 'static,
    {
        Codec {
            width,
            decode: Arc::new(decode),
        }
    }

    /// Codec accepting any word size.
    pub fn any_width<F>(decode: F) -> Self
    where
        F: Fn(&[u8], u32) -> Value + Send + Sync + 'static,
    {
        Self::new(None, decode)
    }

    /// Codec for a fixed width floating point [Kernel].
    #[must_use]
    pub fn kernel(width: u32, kernel: Kernel) -> Self {
        Self::new(Some(width), move |word, bits| Value::Float(kernel(word, bits)))
    }

    /// Required word size, or `None` if any size is accepted.
    #[must_use]
    pub fn width(&self) -> Option<u32> {
        self.width
    }
}

impl Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec").field("width", &self.width).finish()
    }
}

/// Lookup table of interpretation specs to [Codec]s.
///
/// Keys are case-insensitive and unique; registering an existing key replaces the codec.
///
/// # Example
/// ```
/// use decom::codec::{CodecRegistry, Value};
///
/// let codecs = CodecRegistry::standard();
/// assert_eq!(codecs.decode("2C", &[0xff, 0xfb], 16).unwrap(), Value::Signed(-5));
/// assert_eq!(codecs.decode("ieee32", &[0x3f, 0x80, 0, 0], 32).unwrap(), Value::Float(1.0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Codec>,
}

impl CodecRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all the standard interpretations.
    #[must_use]
    pub fn standard() -> Self {
        let mut reg = Self::new();
        reg.register("u", Codec::any_width(kernels::unsigned))
            .register("1c", Codec::any_width(kernels::ones_complement))
            .register("2c", Codec::any_width(kernels::twos_complement))
            .register("ieee16", Codec::kernel(16, kernels::ieee16))
            .register("ieee32", Codec::kernel(32, kernels::ieee32))
            .register("ieee64", Codec::kernel(64, kernels::ieee64))
            .register("1750a32", Codec::kernel(32, kernels::milstd1750a32))
            .register("1750a48", Codec::kernel(48, kernels::milstd1750a48))
            .register("ti32", Codec::kernel(32, kernels::ti32))
            .register("ti40", Codec::kernel(40, kernels::ti40))
            .register("ibm32", Codec::kernel(32, kernels::ibm32))
            .register("ibm64", Codec::kernel(64, kernels::ibm64))
            .register("dec32", Codec::kernel(32, kernels::dec32))
            .register("dec64", Codec::kernel(64, kernels::dec64))
            .register("dec64g", Codec::kernel(64, kernels::dec64g));
        reg
    }

    /// Register `codec` under the lowercased `key`, replacing any existing codec.
    pub fn register(&mut self, key: &str, codec: Codec) -> &mut Self {
        let key = key.to_lowercase();
        if self.codecs.insert(key.clone(), codec).is_some() {
            trace!(key = %key, "replaced codec");
        }
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Codec> {
        self.codecs.get(&key.to_lowercase())
    }

    /// All registered keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Decode a single word.
    ///
    /// `word` holds the raw word bytes, most significant first; only the low `bits` bits are
    /// used.
    ///
    /// # Errors
    /// * [Error::UnknownCodec] if `key` is not registered
    /// * [Error::InvalidWordSize] if the codec requires a different word size than `bits`
    /// * [Error::UnsupportedWordSize] if `bits`, or the length of `word`, exceeds 64 bits
    /// * [Error::NotEnoughData] if `word` has too few bytes to hold `bits`
    pub fn decode(&self, key: &str, word: &[u8], bits: u32) -> Result<Value> {
        let Some(codec) = self.get(key) else {
            return Err(Error::UnknownCodec(key.to_string()));
        };
        if let Some(expected) = codec.width {
            if bits != expected {
                return Err(Error::InvalidWordSize {
                    codec: key.to_lowercase(),
                    expected,
                    actual: bits,
                });
            }
        }
        if bits > MAX_WORD_BITS {
            return Err(Error::UnsupportedWordSize(bits));
        }
        if word.len() > 8 {
            return Err(Error::UnsupportedWordSize((word.len() * 8) as u32));
        }
        let minimum = bits.div_ceil(8) as usize;
        if word.len() < minimum {
            return Err(Error::NotEnoughData {
                actual: word.len(),
                minimum,
            });
        }

        Ok((codec.decode)(word, bits))
    }

    /// Decode every word, stopping at the first failure.
    ///
    /// # Errors
    /// The first error encountered, see [Self::decode].
    pub fn decode_all<'a, I>(&self, key: &str, words: I, bits: u32) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        words
            .into_iter()
            .map(|word| self.decode(key, word, bits))
            .collect()
    }

    /// Decode every word, returning a result per word rather than stopping on failure.
    pub fn decode_best_effort<'a, I>(&self, key: &str, words: I, bits: u32) -> Vec<Result<Value>>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        words
            .into_iter()
            .map(|word| self.decode(key, word, bits))
            .collect()
    }
}

static GLOBAL: OnceLock<RwLock<CodecRegistry>> = OnceLock::new();

/// The process-wide registry, initialized with [CodecRegistry::standard] on first access.
pub fn global() -> &'static RwLock<CodecRegistry> {
    GLOBAL.get_or_init(|| RwLock::new(CodecRegistry::standard()))
}

/// Register a codec with the process-wide registry.
pub fn register(key: &str, codec: Codec) {
    global()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(key, codec);
}

/// Decode a word using the process-wide registry. See [CodecRegistry::decode].
///
/// # Errors
/// See [CodecRegistry::decode].
pub fn decode(key: &str, word: &[u8], bits: u32) -> Result<Value> {
    global()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .decode(key, word, bits)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_standard_keys() {
        let reg = CodecRegistry::standard();
        assert_eq!(
            reg.keys(),
            vec![
                "1750a32", "1750a48", "1c", "2c", "dec32", "dec64", "dec64g", "ibm32", "ibm64",
                "ieee16", "ieee32", "ieee64", "ti32", "ti40", "u"
            ]
        );
    }

    #[test_case("u", None)]
    #[test_case("1C", None)]
    #[test_case("ieee16", Some(16))]
    #[test_case("1750A48", Some(48))]
    #[test_case("ti40", Some(40))]
    #[test_case("DEC64G", Some(64))]
    fn test_widths(key: &str, width: Option<u32>) {
        let reg = CodecRegistry::standard();
        assert_eq!(reg.get(key).unwrap().width(), width);
    }

    #[test]
    fn test_dec64_is_d_floating() {
        let reg = CodecRegistry::standard();
        let word = [0x40, 0x80, 0, 0, 0, 0, 0, 0];
        assert_eq!(reg.decode("dec64", &word, 64).unwrap(), Value::Float(1.0));
        assert_eq!(reg.decode("dec64g", &word, 64).unwrap(), Value::Float(128.0));
        assert_eq!(
            reg.decode("dec64g", &[0x40, 0x10, 0, 0, 0, 0, 0, 0], 64).unwrap(),
            Value::Float(1.0)
        );
    }

    #[test]
    fn test_unknown_codec() {
        let zult = CodecRegistry::standard().decode("nope", &[0], 8);
        assert!(
            matches!(zult, Err(Error::UnknownCodec(ref key)) if key == "nope"),
            "got {zult:?}"
        );
    }

    #[test]
    fn test_invalid_word_size() {
        let zult = CodecRegistry::standard().decode("ieee32", &[0, 0], 16);
        assert!(
            matches!(
                zult,
                Err(Error::InvalidWordSize {
                    expected: 32,
                    actual: 16,
                    ..
                })
            ),
            "got {zult:?}"
        );
    }

    #[test]
    fn test_word_too_short() {
        let zult = CodecRegistry::standard().decode("u", &[0], 12);
        assert!(
            matches!(
                zult,
                Err(Error::NotEnoughData {
                    actual: 1,
                    minimum: 2
                })
            ),
            "got {zult:?}"
        );
    }

    #[test]
    fn test_word_too_long() {
        let reg = CodecRegistry::standard();
        assert!(matches!(
            reg.decode("u", &[0u8; 9], 64),
            Err(Error::UnsupportedWordSize(72))
        ));
        assert!(matches!(
            reg.decode("u", &[0u8; 8], 65),
            Err(Error::UnsupportedWordSize(65))
        ));
    }

    #[test]
    fn test_register_overwrites_case_insensitive() {
        let mut reg = CodecRegistry::standard();
        reg.register("U", Codec::any_width(|_, _| Value::Unsigned(42)));

        assert_eq!(reg.decode("u", &[1], 8).unwrap(), Value::Unsigned(42));
        assert_eq!(reg.keys().iter().filter(|k| **k == "u").count(), 1);
    }

    #[test]
    fn test_decode_all_stops_at_first_failure() {
        let reg = CodecRegistry::standard();
        let words: Vec<&[u8]> = vec![&[0x00, 0x01], &[0x02], &[0x00, 0x03]];

        let zult = reg.decode_all("u", words.iter().copied(), 16);
        assert!(matches!(zult, Err(Error::NotEnoughData { .. })), "got {zult:?}");

        let zults = reg.decode_best_effort("u", words.iter().copied(), 16);
        assert_eq!(zults.len(), 3);
        assert_eq!(*zults[0].as_ref().unwrap(), Value::Unsigned(1));
        assert!(zults[1].is_err());
        assert_eq!(*zults[2].as_ref().unwrap(), Value::Unsigned(3));
    }

    #[test]
    fn test_global_decode() {
        assert_eq!(
            decode("ibm32", &[0x41, 0x10, 0x00, 0x00], 32).unwrap(),
            Value::Float(1.0)
        );
        register("test-answer", Codec::any_width(|_, _| Value::Signed(-42)));
        assert_eq!(decode("TEST-ANSWER", &[], 0).unwrap(), Value::Signed(-42));
    }
}
