use std::io::{stdout, Write};

use anyhow::{Context, Result};
use decom::codec::{self, Value};
use serde::Serialize;
use tracing::debug;

use crate::Format;

#[derive(Debug, Clone, Serialize)]
struct Interp {
    interp: String,
    word: String,
    bits: u32,
    value: Value,
}

fn parse_word(word: &str) -> Result<Vec<u8>> {
    let word = word.trim_start_matches("0x").trim_start_matches("0X");
    // allow an odd number of digits, e.g., 0xfff for a 12 bit word
    let padded = if word.len() % 2 == 1 {
        format!("0{word}")
    } else {
        word.to_string()
    };
    hex::decode(&padded).with_context(|| format!("invalid hex word {word:?}"))
}

pub fn interp(interp: &str, word: &str, bits: Option<u32>, format: &Format) -> Result<()> {
    let bytes = parse_word(word)?;
    let bits = bits.unwrap_or((bytes.len() * 8) as u32);
    debug!("decoding {} bytes as {bits} bit {interp}", bytes.len());

    let value = codec::decode(interp, &bytes, bits)?;
    let zult = Interp {
        interp: interp.to_lowercase(),
        word: hex::encode(&bytes),
        bits,
        value,
    };

    let mut out = stdout();
    match format {
        Format::Json => serde_json::to_writer_pretty(&mut out, &zult).context("serializing to json")?,
        Format::Text => write!(out, "{}", zult.value).context("writing to stdout")?,
    }
    writeln!(out).context("writing to stdout")
}

#[derive(Debug, Clone, Serialize)]
struct CodecInfo {
    key: String,
    width: Option<u32>,
}

pub fn codecs(format: &Format) -> Result<()> {
    let infos: Vec<CodecInfo> = {
        let registry = codec::global()
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        registry
            .keys()
            .into_iter()
            .map(|key| CodecInfo {
                key: key.to_string(),
                width: registry.get(key).and_then(decom::Codec::width),
            })
            .collect()
    };

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &infos).context("serializing to json")?;
            println!();
            Ok(())
        }
        Format::Text => {
            let text = crate::render(CODECS_TEMPLATE, &infos)?;
            stdout()
                .write_all(text.as_bytes())
                .context("writing to stdout")
        }
    }
}

const CODECS_TEMPLATE: &str = r"{{ #each this }}{{ lpad 8 key }}  {{ #if width }}{{ width }} bits{{ else }}any{{ /if }}
{{ /each }}";
