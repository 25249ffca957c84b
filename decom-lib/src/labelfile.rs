//! Label files describing recorded telemetry.
//!
//! A label file is a list of sections. A section starts with its label at the beginning of
//! a line followed by whitespace separated `KEY=value` pairs. Lines starting with whitespace
//! continue the previous section. `COMMENT` and `COMMENTS` sections hold free text instead
//! of pairs.
//!
//! ```text
//! VOLUME    CLASSIFICATION=U NUMBER=12 CREATION=031522 BYTE=MSBF
//! EVENT     VEHICLE=SAT1 DATE=220315 ORBIT=1234
//!           TYPE=PASS
//! SIGNAL    DESIGNATOR=S1 FREQUENCY=2287.5MHZ UPTIME=120000 DOWNTIME=121500
//! COMMENTS  recorded at the north site
//! ```
//!
//! Labels and keys are case-insensitive. Values are kept as written.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::prelude::*;

/// Key/value pairs of one section, keys lowercased.
pub type Fields = BTreeMap<String, String>;

/// Sections of a label file before typed conversion, keyed by lowercased label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLabel {
    pub sections: BTreeMap<String, Fields>,
    pub comments: Option<String>,
    /// Column where the first section's values start.
    pub indent: Option<usize>,
}

impl RawLabel {
    /// Split `text` into sections.
    ///
    /// # Errors
    /// [Error::LabelFile] if a continuation line appears before any section, or a pair is
    /// missing its `=`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut raw = RawLabel::default();
        let mut current: Option<String> = None;

        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let rest = if line.starts_with(char::is_whitespace) {
                line
            } else {
                let (label, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
                let label = match label.to_lowercase().as_str() {
                    "comment" | "comments" => "comments".to_string(),
                    other => other.to_string(),
                };
                if raw.indent.is_none() {
                    let value = rest.trim_start();
                    raw.indent = Some(line.len() - value.len());
                }
                if label == "comments" {
                    raw.comments = Some(String::new());
                } else {
                    raw.sections.insert(label.clone(), Fields::new());
                }
                trace!(lineno, label = %label, "section");
                current = Some(label);
                rest
            };

            match current.as_deref() {
                None => {
                    return Err(Error::LabelFile(format!(
                        "line {}: continuation before any section",
                        lineno + 1
                    )))
                }
                Some("comments") => {
                    let text = rest.trim();
                    let comments = raw.comments.get_or_insert_with(String::new);
                    if !comments.is_empty() && !text.is_empty() {
                        comments.push(' ');
                    }
                    comments.push_str(text);
                }
                Some(label) => {
                    let fields = raw.sections.entry(label.to_string()).or_default();
                    parse_pairs(rest, fields)
                        .map_err(|e| Error::LabelFile(format!("line {}: {e}", lineno + 1)))?;
                }
            }
        }
        Ok(raw)
    }
}

fn parse_pairs(text: &str, fields: &mut Fields) -> std::result::Result<(), String> {
    for pair in text.split_whitespace() {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(format!("expected KEY=value, got {pair:?}"));
        };
        fields.insert(key.to_lowercase(), value.to_string());
    }
    Ok(())
}

fn century(yy: u32) -> i32 {
    // yy is at most 99
    let yy = yy as i32;
    if yy < 70 {
        2000 + yy
    } else {
        1900 + yy
    }
}

fn two_digits(s: &str, idx: usize) -> Result<u32> {
    s.get(idx..idx + 2)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|d| d.parse().ok())
        .ok_or_else(|| Error::LabelFile(format!("invalid digits in {s:?}")))
}

fn date(s: &str, yy: u32, mm: u32, dd: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(century(yy), mm, dd)
        .ok_or_else(|| Error::LabelFile(format!("invalid date {s:?}")))
}

/// Parse a `MMDDYY` date. Two digit years less than 70 are in the 2000s.
///
/// # Errors
/// [Error::LabelFile] if `s` is not a valid date.
pub fn parse_mmddyy(s: &str) -> Result<NaiveDate> {
    date(s, two_digits(s, 4)?, two_digits(s, 0)?, two_digits(s, 2)?)
}

/// Parse a `YYMMDD` date. Two digit years less than 70 are in the 2000s.
///
/// # Errors
/// [Error::LabelFile] if `s` is not a valid date.
pub fn parse_yymmdd(s: &str) -> Result<NaiveDate> {
    date(s, two_digits(s, 0)?, two_digits(s, 2)?, two_digits(s, 4)?)
}

/// Parse a `HHMMSS` time of day.
///
/// # Errors
/// [Error::LabelFile] if `s` is not a valid time.
pub fn parse_hhmmss(s: &str) -> Result<NaiveTime> {
    NaiveTime::from_hms_opt(two_digits(s, 0)?, two_digits(s, 2)?, two_digits(s, 4)?)
        .ok_or_else(|| Error::LabelFile(format!("invalid time {s:?}")))
}

/// Parse the leading number of a frequency such as `2287.5MHz`. Units are not converted.
///
/// # Errors
/// [Error::LabelFile] if `s` does not start with a number.
pub fn parse_frequency(s: &str) -> Result<f64> {
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    s[..end]
        .parse()
        .map_err(|_| Error::LabelFile(format!("invalid frequency {s:?}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ByteOrder {
    /// Most significant byte first
    Msbf,
    /// Least significant byte first
    Lsbf,
}

impl FromStr for ByteOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "MSBF" => Ok(ByteOrder::Msbf),
            "LSBF" => Ok(ByteOrder::Lsbf),
            _ => Err(Error::LabelFile(format!("invalid byte order {s:?}"))),
        }
    }
}

struct Reader<'a> {
    section: &'a str,
    fields: &'a Fields,
}

impl Reader<'_> {
    fn string(&self, key: &str) -> Option<String> {
        self.fields.get(key).cloned()
    }

    fn with<T>(&self, key: &str, parse: impl Fn(&str) -> Result<T>) -> Result<Option<T>> {
        self.fields
            .get(key)
            .map(|v| {
                parse(v).map_err(|e| {
                    let msg = match e {
                        Error::LabelFile(msg) => msg,
                        other => other.to_string(),
                    };
                    Error::LabelFile(format!("{}.{key}: {msg}", self.section))
                })
            })
            .transpose()
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        self.with(key, |v| {
            v.parse()
                .map_err(|_| Error::LabelFile(format!("invalid value {v:?}")))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Volume {
    pub classification: Option<String>,
    pub number: Option<i64>,
    pub creation: Option<NaiveDate>,
    pub byte: Option<ByteOrder>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct File {
    pub classification: Option<String>,
    pub number: Option<i64>,
    pub creation: Option<NaiveDate>,
    pub block: Option<i64>,
    pub rbpl: Option<i64>,
    pub rbrp: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    pub vehicle: Option<String>,
    pub date: Option<NaiveDate>,
    pub sput: Option<String>,
    pub orbit: Option<i64>,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Signal {
    pub designator: Option<String>,
    pub frequency: Option<f64>,
    pub uptime: Option<NaiveTime>,
    pub downtime: Option<NaiveTime>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Input {
    pub collector: Option<String>,
    pub analog: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Selector {
    pub number: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Processor {
    pub name: Option<String>,
    pub version: Option<String>,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: Option<String>,
    pub channels: Option<i64>,
    pub nominal: Option<i64>,
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Record {
    pub word: Option<i64>,
    pub rrln: Option<i64>,
    pub rrpl: Option<i64>,
    pub rdpl: Option<i64>,
    pub rdrc: Option<i64>,
    pub rdid: Option<i64>,
    pub rdes: Option<i64>,
    pub rdst: Option<i64>,
    pub rdin: Option<i64>,
    pub auxiliary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Output {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: Option<String>,
}

/// A parsed label file.
///
/// Sections not present in the file are `None`. Sections with unrecognized labels are kept
/// untyped in `other`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabelFile {
    pub path: Option<PathBuf>,
    /// Column where values start, taken from the first section.
    pub indent: Option<usize>,
    pub volume: Option<Volume>,
    pub file: Option<File>,
    pub event: Option<Event>,
    pub signal: Option<Signal>,
    pub input: Option<Input>,
    pub selector: Option<Selector>,
    pub processor: Option<Processor>,
    pub record: Option<Record>,
    pub output: Option<Output>,
    pub comments: Option<String>,
    pub other: BTreeMap<String, Fields>,
}

impl LabelFile {
    /// Parse label file text.
    ///
    /// # Errors
    /// [Error::LabelFile] if the text is malformed or a known field has an invalid value.
    pub fn parse(text: &str) -> Result<Self> {
        let raw = RawLabel::parse(text)?;
        let mut lf = LabelFile {
            indent: raw.indent,
            comments: raw.comments,
            ..Default::default()
        };

        for (label, fields) in raw.sections {
            let r = Reader {
                section: &label,
                fields: &fields,
            };
            match label.as_str() {
                "volume" => {
                    lf.volume = Some(Volume {
                        classification: r.string("classification"),
                        number: r.parsed("number")?,
                        creation: r.with("creation", parse_mmddyy)?,
                        byte: r.parsed("byte")?,
                    });
                }
                "file" => {
                    lf.file = Some(File {
                        classification: r.string("classification"),
                        number: r.parsed("number")?,
                        creation: r.with("creation", parse_mmddyy)?,
                        block: r.parsed("block")?,
                        rbpl: r.parsed("rbpl")?,
                        rbrp: r.parsed("rbrp")?,
                    });
                }
                "event" => {
                    lf.event = Some(Event {
                        vehicle: r.string("vehicle"),
                        date: r.with("date", parse_yymmdd)?,
                        sput: r.string("sput"),
                        orbit: r.parsed("orbit")?,
                        kind: r.string("type"),
                    });
                }
                "signal" => {
                    lf.signal = Some(Signal {
                        designator: r.string("designator"),
                        frequency: r.with("frequency", parse_frequency)?,
                        uptime: r.with("uptime", parse_hhmmss)?,
                        downtime: r.with("downtime", parse_hhmmss)?,
                    });
                }
                "input" => {
                    lf.input = Some(Input {
                        collector: r.string("collector"),
                        analog: r.string("analog"),
                    });
                }
                "selector" => {
                    lf.selector = Some(Selector {
                        number: r.parsed("number")?,
                    });
                }
                "processor" => {
                    lf.processor = Some(Processor {
                        name: r.string("name"),
                        version: r.string("version"),
                        kind: r.string("type"),
                        channels: r.parsed("channels")?,
                        nominal: r.parsed("nominal")?,
                        rate: r.parsed("rate")?,
                    });
                }
                "record" => {
                    lf.record = Some(Record {
                        word: r.parsed("word")?,
                        rrln: r.parsed("rrln")?,
                        rrpl: r.parsed("rrpl")?,
                        rdpl: r.parsed("rdpl")?,
                        rdrc: r.parsed("rdrc")?,
                        rdid: r.parsed("rdid")?,
                        rdes: r.parsed("rdes")?,
                        rdst: r.parsed("rdst")?,
                        rdin: r.parsed("rdin")?,
                        auxiliary: r.string("auxiliary"),
                    });
                }
                "output" => {
                    lf.output = Some(Output {
                        kind: r.string("type"),
                    });
                }
                _ => {
                    debug!("keeping unrecognized label file section {label:?}");
                    lf.other.insert(label, fields);
                }
            }
        }
        Ok(lf)
    }

    /// Read and parse the label file at `path`.
    ///
    /// # Errors
    /// [Error::Io] if the file cannot be read, otherwise see [Self::parse].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut lf = Self::parse(&text)?;
        lf.path = Some(path.to_path_buf());
        Ok(lf)
    }
}
