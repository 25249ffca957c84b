mod interp;
mod label;
mod run;

use std::io::stderr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use handlebars::handlebars_helper;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decommutate generated frames.
    ///
    /// Frames are generated, assigned subframe ids and optionally decoded into
    /// measurements, then written one unit per line.
    Run {
        /// Size of each generated frame in bytes.
        #[arg(short = 's', long, default_value_t = 128)]
        frame_size: usize,

        /// Number of frames generated per batch.
        #[arg(short, long, default_value_t = 16)]
        num_frames: usize,

        /// Number of batches to generate and process.
        #[arg(short, long, default_value_t = 1)]
        batches: usize,

        /// Frame fill values. One value fills every frame; several values are used
        /// for consecutive frames in turn.
        #[arg(long, value_delimiter = ',', value_name = "csv")]
        fill: Vec<u8>,

        /// Sync pattern, as hex, expected at the start of each frame.
        #[arg(long, value_name = "hex")]
        sync: Option<String>,

        /// Number of frames in a subframe cycle.
        #[arg(short, long, default_value_t = 1)]
        cycle_length: u32,

        /// JSON file containing a list of measurands to extract from each subframe.
        #[arg(short, long, value_name = "path")]
        measurands: Option<PathBuf>,

        /// Skip measurements that fail to decode rather than stopping.
        #[arg(long, action)]
        best_effort: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: Format,

        /// Delete output file if it already exists
        #[arg(long, action)]
        clobber: bool,

        /// Output file path. Defaults to stdout.
        #[arg(short, long, value_name = "path")]
        output: Option<PathBuf>,
    },
    /// Decode a single word.
    Interp {
        /// Interpretation, e.g., u, 2c, ieee32, 1750a48.
        interp: String,

        /// Word as hex, most significant byte first.
        word: String,

        /// Word size in bits. Defaults to the number of bits in the word.
        #[arg(short, long)]
        bits: Option<u32>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: Format,
    },
    /// List the available interpretations.
    Codecs {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: Format,
    },
    /// Show the contents of a label file.
    Label {
        /// Input label file
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: Format,
    },
}

/// Render `data` with a handlebars template. Templates may use `lpad <width> <value>`.
pub fn render<T: Serialize>(template: &str, data: &T) -> Result<String> {
    handlebars_helper!(left_pad: |num: u64, v: Json| {
        let v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => String::new(),
            _ => v.to_string()
        };
        let width = usize::try_from(num).unwrap_or(usize::MAX).max(v.len());
        format!("{v:>width$}")
    });
    let mut hb = handlebars::Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_template_string("t", template)
        .context("compiling template")?;

    hb.render("t", data).context("rendering text")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("DECOM_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Run {
            frame_size,
            num_frames,
            batches,
            fill,
            sync,
            cycle_length,
            measurands,
            best_effort,
            format,
            clobber,
            output,
        } => {
            if let Some(output) = output {
                if !clobber && output.exists() {
                    bail!("{output:?} exists; use --clobber");
                }
            }
            run::run(&run::RunOpts {
                frame_size: *frame_size,
                num_frames: *num_frames,
                batches: *batches,
                fill: fill.clone(),
                sync: sync.clone(),
                cycle_length: *cycle_length,
                measurands: measurands.clone(),
                best_effort: *best_effort,
                format: format.clone(),
                output: output.clone(),
            })
        }
        Commands::Interp {
            interp,
            word,
            bits,
            format,
        } => interp::interp(interp, word, *bits, format),
        Commands::Codecs { format } => interp::codecs(format),
        Commands::Label { input, format } => label::label(input, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lpad() {
        let data = serde_json::json!({"key": "u", "n": null});
        assert_eq!(render("[{{ lpad 4 key }}]", &data).unwrap(), "[   u]");
        assert_eq!(render("[{{ lpad 0 key }}]", &data).unwrap(), "[u]");
        assert_eq!(render("[{{ lpad 2 n }}]", &data).unwrap(), "[  ]");
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "decom", "run", "-s", "64", "--fill", "1,2,3", "--sync", "faf320", "-c", "4",
        ])
        .unwrap();
        let Commands::Run {
            frame_size,
            fill,
            cycle_length,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(frame_size, 64);
        assert_eq!(fill, vec![1, 2, 3]);
        assert_eq!(cycle_length, 4);
    }

    #[test]
    fn test_run_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("units.json");
        run::run(&run::RunOpts {
            frame_size: 8,
            num_frames: 3,
            batches: 2,
            fill: vec![],
            sync: None,
            cycle_length: 2,
            measurands: None,
            best_effort: false,
            format: Format::Json,
            output: Some(output.clone()),
        })
        .unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[5]["type"], "SubFrame");
        assert_eq!(lines[5]["subframe_id"], 1);
    }
}
