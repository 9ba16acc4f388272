use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    config::{SchedulingConfig, SimConfig},
};

/// The global model's accuracy at some point of the simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub clock: f64,
    pub accuracy: f64,
}

/// The append-only record of one `(clock, accuracy)` point per completed round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricLog {
    points: Vec<MetricPoint>,
}

impl MetricLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clock: f64, accuracy: f64) {
        self.points.push(MetricPoint { clock, accuracy });
    }

    pub fn points(&self) -> &[MetricPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&MetricPoint> {
        self.points.last()
    }

    /// Writes one `(clock, accuracy)` tuple per line.
    pub fn write_text<W: Write>(&self, mut out: W) -> Result<()> {
        for MetricPoint { clock, accuracy } in &self.points {
            writeln!(out, "({clock}, {accuracy})")?;
        }

        Ok(())
    }
}

/// Where a run's `MetricLog` ends up once it terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSink {
    dir: PathBuf,
    stem: String,
}

impl MetricSink {
    /// Creates a new `MetricSink`.
    ///
    /// # Arguments
    /// * `dir` - The output directory, created if missing.
    /// * `stem` - The name both files share, without extension.
    ///
    /// # Returns
    /// A new `MetricSink` instance.
    pub fn new<P: Into<PathBuf>, S: Into<String>>(dir: P, stem: S) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    /// Creates the sink for `config`, its file names encode the parameters of the run.
    pub fn for_config(config: &SimConfig) -> Self {
        let scheduling = match config.scheduling {
            SchedulingConfig::Synchronous => "sync",
            SchedulingConfig::SemiAsynchronous => "semi_async",
        };

        let stem = format!(
            "{scheduling}_acc_fed_{}_{}_dp_{}_epsilon_{}_{}",
            config.model.name(),
            config.rounds,
            config.privacy.mechanism.name(),
            config.privacy.epsilon,
            config.participation,
        );

        Self::new(&config.output.dir, stem)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn json_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.stem))
    }

    pub fn text_path(&self) -> PathBuf {
        self.dir.join(format!("{}.txt", self.stem))
    }

    /// Persists `log` as a JSON array and as a text file.
    ///
    /// # Returns
    /// An io or serialization error if any file can't be written.
    pub fn flush(&self, log: &MetricLog) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let mut json = BufWriter::new(File::create(self.json_path())?);
        serde_json::to_writer_pretty(&mut json, log)?;
        json.flush()?;

        let mut text = BufWriter::new(File::create(self.text_path())?);
        log.write_text(&mut text)?;
        text.flush()?;

        info!(points = log.len(); "metrics written to {}", self.dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> MetricLog {
        let mut log = MetricLog::new();
        log.push(3.0, 41.5);
        log.push(5.5, 60.25);
        log
    }

    #[test]
    fn text_format_is_one_tuple_per_line() {
        let mut buf = Vec::new();
        sample_log().write_text(&mut buf).unwrap();

        assert_eq!(String::from_utf8(buf).unwrap(), "(3, 41.5)\n(5.5, 60.25)\n");
    }

    #[test]
    fn json_is_an_array_of_points() {
        let json = serde_json::to_value(sample_log()).unwrap();

        assert_eq!(
            json,
            serde_json::json!([
                { "clock": 3.0, "accuracy": 41.5 },
                { "clock": 5.5, "accuracy": 60.25 }
            ])
        );
    }

    #[test]
    fn flush_writes_both_files() {
        let dir = std::env::temp_dir().join(format!("fedsa-metrics-{}", std::process::id()));
        let sink = MetricSink::new(&dir, "run");

        sink.flush(&sample_log()).unwrap();

        let json = fs::read_to_string(sink.json_path()).unwrap();
        let parsed: MetricLog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample_log());
        assert!(fs::read_to_string(sink.text_path()).unwrap().starts_with("(3, 41.5)"));

        fs::remove_dir_all(dir).unwrap();
    }
}
