use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::BatterySample;
use crate::ports::TelemetrySink;
use crate::SinkError;

/// Append-only JSON-lines file, one sample per line.
///
/// Lives at `<dir>/<node>.jsonl`. The latest sample is cached so `voltage`
/// requests never touch the disk.
#[derive(Debug)]
pub struct JsonLinesTelemetrySink {
    path: PathBuf,
    file: File,
    latest: Option<BatterySample>,
}

impl JsonLinesTelemetrySink {
    /// Open (creating `dir` and the file if needed) the log for `node`.
    ///
    /// An existing log is scanned for its last readable sample.
    pub fn open(dir: impl AsRef<Path>, node: &str) -> Result<Self, SinkError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{node}.jsonl"));

        let latest = if path.exists() {
            last_sample(&path)?
        } else {
            None
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), resumed = latest.is_some(), "Opened telemetry log");

        Ok(Self { path, file, latest })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn last_sample(path: &Path) -> Result<Option<BatterySample>, SinkError> {
    let reader = BufReader::new(File::open(path)?);
    let mut latest = None;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<BatterySample>(&line) {
            Ok(sample) => latest = Some(sample),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable telemetry line"),
        }
    }
    Ok(latest)
}

impl TelemetrySink for JsonLinesTelemetrySink {
    fn append(&mut self, sample: &BatterySample) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(sample)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        self.latest = Some(sample.clone());
        Ok(())
    }

    fn latest(&self) -> Option<BatterySample> {
        self.latest.clone()
    }
}
