//! Incident output sinks.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::config::schema::IncidentFormat;
use crate::incidents::types::Incident;

/// Destination for recorded incidents. Called with the recorder lock held,
/// so writes from different services never interleave.
pub trait IncidentSink: Send {
    fn write(&mut self, incident: &Incident) -> io::Result<()>;
}

/// Render one incident as a single line, newline included.
pub fn format_line(incident: &Incident, format: IncidentFormat) -> io::Result<String> {
    let mut line = match format {
        IncidentFormat::Json => serde_json::to_string(incident)?,
        IncidentFormat::Text => incident.to_text_line(),
    };
    line.push('\n');
    Ok(line)
}

/// Append-only incident log file.
pub struct FileSink {
    writer: BufWriter<File>,
    format: IncidentFormat,
}

impl FileSink {
    pub fn open(path: &Path, format: IncidentFormat) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            format,
        })
    }
}

impl IncidentSink for FileSink {
    fn write(&mut self, incident: &Incident) -> io::Result<()> {
        // The whole line is rendered before anything touches the file.
        let line = format_line(incident, self.format)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()
    }
}
