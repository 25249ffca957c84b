//! Measurands: named values extracted from subframes.
//!
//! A [Measurand] is built from one or more [Component]s, each selecting bits from a word of
//! the subframe data. The selected bits are concatenated, most significant component first,
//! into a raw word that is decoded with the measurand's interpretation spec.
use std::sync::{Arc, PoisonError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::codec::{self, kernels, CodecRegistry, MAX_WORD_BITS};
use crate::prelude::*;
use crate::stream::{Ports, Process};
use crate::unit::{DataUnit, Measurement, SubFrame, UnitKind};

const fn default_size() -> u32 {
    8
}

fn default_interp() -> String {
    "u".to_string()
}

/// Bits taken from a single word.
///
/// Words are numbered from 0 and are `size` bits wide, so word `n` starts at bit
/// `n * size` of the subframe data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Component {
    pub word: u32,
    /// Bits of the word to keep. The masked bits are shifted down to bit 0. `None` keeps
    /// the whole word.
    #[cfg_attr(feature = "serde", serde(default))]
    pub mask: Option<u64>,
    #[cfg_attr(feature = "serde", serde(default = "default_size"))]
    pub size: u32,
}

impl Component {
    #[must_use]
    pub fn new(word: u32) -> Self {
        Component {
            word,
            mask: None,
            size: default_size(),
        }
    }

    #[must_use]
    pub fn with_mask(mut self, mask: u64) -> Self {
        self.mask = Some(mask);
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Number of bits this component contributes.
    #[must_use]
    pub fn bits(&self) -> u32 {
        match self.mask {
            Some(mask) => mask.count_ones(),
            None => self.size,
        }
    }

    /// Read the masked bits of this component from `data`.
    ///
    /// The bits selected by the mask are packed together, most significant first, and
    /// right aligned, so the result is exactly [Self::bits] wide.
    ///
    /// # Errors
    /// * [Error::UnsupportedWordSize] if the word size is 0 or greater than 64
    /// * [Error::InvalidMask] if the mask selects bits outside the word
    /// * [Error::NotEnoughData] if `data` does not contain the whole word
    pub fn read(&self, data: &[u8]) -> Result<u64> {
        if self.size == 0 || self.size > MAX_WORD_BITS {
            return Err(Error::UnsupportedWordSize(self.size));
        }
        if let Some(mask) = self.mask {
            if mask & !kernels::mask(self.size) != 0 {
                return Err(Error::InvalidMask {
                    mask,
                    size: self.size,
                });
            }
        }
        let start = u64::from(self.word) * u64::from(self.size);
        let word = read_bits(data, start, self.size)?;
        Ok(match self.mask {
            None => word,
            Some(mask) => extract_bits(word, mask),
        })
    }
}

/// Gather the bits of `value` selected by `mask` into the low bits of the result.
fn extract_bits(value: u64, mask: u64) -> u64 {
    let mut zult = 0u64;
    for bit in (0..64u32).rev().filter(|b| mask & (1u64 << b) != 0) {
        zult = (zult << 1) | ((value >> bit) & 1);
    }
    zult
}

/// Read `nbits` bits starting at bit `start`, most significant bit first.
fn read_bits(data: &[u8], start: u64, nbits: u32) -> Result<u64> {
    let end = start + u64::from(nbits);
    let minimum = end.div_ceil(8) as usize;
    if data.len() < minimum {
        return Err(Error::NotEnoughData {
            actual: data.len(),
            minimum,
        });
    }
    let mut value = 0u64;
    for bit in start..end {
        let byte = data[(bit / 8) as usize];
        let set = (byte >> (7 - (bit % 8))) & 1;
        value = (value << 1) | u64::from(set);
    }
    Ok(value)
}

/// A named value made of one or more components.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Measurand {
    pub name: String,
    pub components: Vec<Component>,
    /// Interpretation spec used to decode the raw word, e.g., `u` or `ieee32`.
    #[cfg_attr(feature = "serde", serde(default = "default_interp"))]
    pub interp: String,
    /// Only extract from subframes with this id. `None` extracts from every subframe.
    #[cfg_attr(feature = "serde", serde(default))]
    pub subframe: Option<u32>,
}

impl Measurand {
    #[must_use]
    pub fn new(name: &str, components: Vec<Component>) -> Self {
        Measurand {
            name: name.to_string(),
            components,
            interp: default_interp(),
            subframe: None,
        }
    }

    #[must_use]
    pub fn with_interp(mut self, interp: &str) -> Self {
        self.interp = interp.to_string();
        self
    }

    #[must_use]
    pub fn with_subframe(mut self, subframe: u32) -> Self {
        self.subframe = Some(subframe);
        self
    }

    /// Total number of bits in the raw word.
    #[must_use]
    pub fn bits(&self) -> u32 {
        self.components.iter().map(Component::bits).sum()
    }

    #[must_use]
    pub fn applies_to(&self, subframe: &SubFrame) -> bool {
        self.subframe.map_or(true, |id| id == subframe.subframe_id)
    }

    /// Assemble the raw word from `data`, returning the word bytes, most significant first,
    /// and its size in bits.
    ///
    /// # Errors
    /// * [Error::UnsupportedWordSize] if the word would exceed 64 bits
    /// * [Error::NotEnoughData] if a component is past the end of `data`
    pub fn raw_word(&self, data: &[u8]) -> Result<(Vec<u8>, u32)> {
        let bits = self.bits();
        if bits > MAX_WORD_BITS {
            return Err(Error::UnsupportedWordSize(bits));
        }
        let mut value = 0u64;
        for comp in &self.components {
            let width = comp.bits();
            let part = comp.read(data)?;
            value = if width >= 64 {
                part
            } else {
                (value << width) | part
            };
        }
        let nbytes = bits.div_ceil(8) as usize;
        Ok((value.to_be_bytes()[8 - nbytes..].to_vec(), bits))
    }

    /// Extract and decode this measurand from `subframe`.
    ///
    /// # Errors
    /// Any error from [Self::raw_word] or [CodecRegistry::decode].
    pub fn extract(&self, subframe: &SubFrame, codecs: &CodecRegistry) -> Result<Measurement> {
        let (data, bits) = self.raw_word(&subframe.frame.data)?;
        let value = codecs.decode(&self.interp, &data, bits)?;
        trace!(name = %self.name, %value, "extracted");
        Ok(Measurement {
            sequence: subframe.frame.sequence,
            c_time: subframe.frame.c_time,
            p_time: subframe.frame.p_time,
            subframe_id: subframe.subframe_id,
            name: self.name.clone(),
            data,
            value,
        })
    }
}

/// Stream processor producing a [Measurement] for each measurand in each subframe.
///
/// Input [SubFrame], output [Measurement]. Measurements for a subframe are emitted in
/// measurand order. Decoding uses a snapshot of the process-wide codec registry, taken when
/// the extractor is created, unless a registry is provided.
///
/// By default the first extraction failure aborts processing. Measurements for subframes
/// before the failing one have already been output; the failing subframe and any after it
/// in the same batch are dropped. In best-effort mode failures are logged and the
/// measurement is skipped.
pub struct MeasurandExtractor {
    measurands: Vec<Measurand>,
    codecs: Arc<CodecRegistry>,
    best_effort: bool,
    failures: u64,
}

impl MeasurandExtractor {
    #[must_use]
    pub fn new(measurands: Vec<Measurand>) -> Self {
        MeasurandExtractor {
            measurands,
            codecs: Arc::new(
                codec::global()
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone(),
            ),
            best_effort: false,
            failures: 0,
        }
    }

    #[must_use]
    pub fn with_registry(mut self, codecs: Arc<CodecRegistry>) -> Self {
        self.codecs = codecs;
        self
    }

    #[must_use]
    pub fn with_best_effort(mut self, best_effort: bool) -> Self {
        self.best_effort = best_effort;
        self
    }

    fn extract_all(&mut self, subframe: &SubFrame, codecs: &CodecRegistry) -> Result<Vec<Measurement>> {
        let mut measurements = Vec::with_capacity(self.measurands.len());
        for measurand in self.measurands.iter().filter(|m| m.applies_to(subframe)) {
            match measurand.extract(subframe, codecs) {
                Ok(m) => measurements.push(m),
                Err(err) if self.best_effort => {
                    self.failures += 1;
                    debug!(
                        name = %measurand.name,
                        sequence = subframe.frame.sequence,
                        failures = self.failures,
                        "skipping measurement: {err}"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(measurements)
    }
}

impl Process for MeasurandExtractor {
    fn input_kind(&self) -> UnitKind {
        UnitKind::SubFrame
    }

    fn output_kind(&self) -> UnitKind {
        UnitKind::Measurement
    }

    fn process(&mut self, ports: &Ports) -> Result<()> {
        let units = ports.drain();
        if units.is_empty() {
            return Ok(());
        }
        let codecs = Arc::clone(&self.codecs);
        for unit in units {
            let DataUnit::SubFrame(subframe) = unit else {
                return Err(Error::TypeMismatch {
                    expected: UnitKind::SubFrame,
                    actual: unit.kind(),
                });
            };
            for measurement in self.extract_all(&subframe, &codecs)? {
                ports.output(measurement)?;
            }
        }
        Ok(())
    }
}
