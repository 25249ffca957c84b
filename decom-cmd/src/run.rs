use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use decom::{
    DataUnit, DecomOpts, Decommutator, Driver, FileWriter, Fill, FrameSource, Measurand,
    MeasurandExtractor, StreamProcessor, WriterSink,
};
use tracing::{debug, info};

use crate::Format;

pub struct RunOpts {
    pub frame_size: usize,
    pub num_frames: usize,
    pub batches: usize,
    pub fill: Vec<u8>,
    pub sync: Option<String>,
    pub cycle_length: u32,
    pub measurands: Option<PathBuf>,
    pub best_effort: bool,
    pub format: Format,
    pub output: Option<PathBuf>,
}

fn load_measurands(path: &Path) -> Result<Vec<Measurand>> {
    let file = File::open(path).with_context(|| format!("opening measurands {path:?}"))?;
    let measurands: Vec<Measurand> =
        serde_json::from_reader(file).with_context(|| format!("parsing measurands {path:?}"))?;
    debug!("loaded {} measurands from {path:?}", measurands.len());
    Ok(measurands)
}

fn formatter(format: &Format) -> impl Fn(&DataUnit) -> String + Send + 'static {
    let format = format.clone();
    move |unit: &DataUnit| match format {
        Format::Text => unit.to_string(),
        // units have no non-string map keys so serialization does not fail
        Format::Json => serde_json::to_string(unit).unwrap_or_default(),
    }
}

pub fn run(opts: &RunOpts) -> Result<()> {
    if opts.frame_size == 0 {
        bail!("frame size must be greater than 0");
    }
    let fill = match opts.fill.as_slice() {
        [] => Fill::default(),
        [value] => Fill::Constant(*value),
        values => Fill::Cycle(values.to_vec()),
    };
    let source = FrameSource::builder()
        .frame_size(opts.frame_size)
        .num_frames(opts.num_frames)
        .fill(fill)
        .build();

    let mut decom_opts = DecomOpts::new(opts.cycle_length);
    if let Some(ref sync) = opts.sync {
        decom_opts = decom_opts.with_sync_hex(sync)?;
    }

    let mut pipeline = StreamProcessor::new(source)
        .then(&StreamProcessor::new(Decommutator::new(decom_opts)))?;
    if let Some(ref path) = opts.measurands {
        let extractor =
            MeasurandExtractor::new(load_measurands(path)?).with_best_effort(opts.best_effort);
        pipeline = pipeline.then(&StreamProcessor::new(extractor))?;
    }

    let sink = match opts.output {
        Some(ref path) => {
            let writer = FileWriter::create(path)
                .with_context(|| format!("failed to create output {path:?}"))?;
            info!("writing to {path:?}");
            StreamProcessor::new(writer.with_formatter(formatter(&opts.format)))
        }
        None => StreamProcessor::new(WriterSink::stdout().with_formatter(formatter(&opts.format))),
    };
    let pipeline = pipeline.then(&sink)?;

    let driver = Driver::new(pipeline);
    let mut passes = 0;
    for _ in 0..opts.batches {
        passes += driver.run().context("running pipeline")?;
    }
    info!(
        "processed {} frames in {passes} passes",
        opts.num_frames * opts.batches
    );
    Ok(())
}
