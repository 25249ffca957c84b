use std::io::{stdout, Write};
use std::path::Path;

use anyhow::{Context, Result};
use decom::LabelFile;

use crate::Format;

pub fn label(path: &Path, format: &Format) -> Result<()> {
    let lf = LabelFile::from_file(path).with_context(|| format!("reading label file {path:?}"))?;

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &lf).context("serializing to json")?;
            println!();
            Ok(())
        }
        Format::Text => {
            let text = crate::render(LABEL_TEMPLATE, &lf)?;
            stdout()
                .write_all(text.as_bytes())
                .context("writing to stdout")
        }
    }
}

const LABEL_TEMPLATE: &str = r"{{ path }}
===============================================================================================
{{ #if volume }}Volume:    number={{ volume.number }} creation={{ volume.creation }} byte={{ volume.byte }}
{{ /if }}{{ #if event }}Event:     vehicle={{ event.vehicle }} date={{ event.date }} orbit={{ event.orbit }} type={{ event.type }}
{{ /if }}{{ #if signal }}Signal:    {{ signal.designator }} {{ signal.frequency }} {{ signal.uptime }} - {{ signal.downtime }}
{{ /if }}{{ #if processor }}Processor: {{ processor.name }} {{ processor.version }} channels={{ processor.channels }} rate={{ processor.rate }}
{{ /if }}{{ #if record }}Record:    word={{ record.word }} rrln={{ record.rrln }}
{{ /if }}{{ #each other }}{{ @key }}: {{ #each this }}{{ @key }}={{ this }} {{ /each }}
{{ /each }}{{ #if comments }}
{{ comments }}
{{ /if }}";
