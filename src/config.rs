use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Result, SimErr};

/// The complete description of a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub clients: usize,
    /// The fraction of clients taking part in each round, in `(0, 1]`.
    pub participation: f64,
    pub rounds: usize,
    /// Seeds every random decision of the run, drawn from the OS if missing.
    #[serde(default)]
    pub seed: Option<u64>,
    pub scheduling: SchedulingConfig,
    pub latency: LatencyConfig,
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub privacy: PrivacyConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingConfig {
    Synchronous,
    SemiAsynchronous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyConfig {
    Fixed {
        times: Vec<f64>,
    },
    Uniform {
        low: f64,
        high: f64,
        #[serde(default)]
        jitter: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(flatten)]
    pub source: DatasetSource,
    #[serde(default)]
    pub partition: PartitionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetSource {
    Synthetic {
        samples: usize,
        features: usize,
        classes: usize,
        #[serde(default = "default_spread")]
        spread: f32,
        #[serde(default = "default_test_fraction")]
        test_fraction: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionConfig {
    #[default]
    Iid,
    NonIid { shards_per_client: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelConfig {
    Logistic,
    Mlp {
        hidden: usize,
        #[serde(default)]
        activation: ActivationConfig,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationConfig {
    #[default]
    Relu,
    Sigmoid,
}

impl ModelConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Logistic => "logistic",
            Self::Mlp { .. } => "mlp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_local_epochs")]
    pub local_epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    pub learning_rate: f32,
    #[serde(default = "default_lr_decay")]
    pub lr_decay: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrivacyConfig {
    /// The total epsilon for the whole run.
    pub epsilon: f64,
    #[serde(default = "default_delta")]
    pub delta: f64,
    #[serde(default = "default_clip")]
    pub clip: f32,
    pub mechanism: MechanismConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MechanismConfig {
    NoDp,
    Gaussian,
    Laplace,
}

impl MechanismConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoDp => "no_dp",
            Self::Gaussian => "gaussian",
            Self::Laplace => "laplace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationConfig {
    #[default]
    Uniform,
    StalenessDiscounted { exponent: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            deadline_ms: None,
            on_failure: FailurePolicy::default(),
        }
    }
}

/// What to do with a round when one of its clients fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The whole run stops with the client's error.
    #[default]
    Abort,
    /// The client is left out of the round's aggregation.
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_spread() -> f32 {
    1.0
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_local_epochs() -> usize {
    5
}

fn default_batch_size() -> usize {
    10
}

fn default_lr_decay() -> f32 {
    0.995
}

fn default_delta() -> f64 {
    1e-5
}

fn default_clip() -> f32 {
    10.0
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, NonZeroUsize::get)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("log")
}

impl SimConfig {
    /// Loads a `SimConfig` from a JSON file.
    ///
    /// # Returns
    /// The parsed config, not yet validated, or the io or parsing error.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Rejects every configuration mistake before anything runs.
    ///
    /// # Returns
    /// An `InvalidConfig` error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SimErr::InvalidConfig(msg));

        if self.clients == 0 {
            return invalid("there must be at least one client".into());
        }

        if !(self.participation > 0. && self.participation <= 1.) {
            return invalid(format!(
                "participation must be in (0, 1], got {}",
                self.participation
            ));
        }

        if self.rounds == 0 {
            return invalid("rounds must be positive".into());
        }

        match &self.latency {
            LatencyConfig::Fixed { times } if times.len() != self.clients => {
                return invalid(format!(
                    "expected {} fixed prepare times, got {}",
                    self.clients,
                    times.len()
                ));
            }
            LatencyConfig::Fixed { times } if times.iter().any(|t| !(*t >= 0.)) => {
                return invalid("fixed prepare times can't be negative".into());
            }
            LatencyConfig::Uniform { low, high, jitter } if !(*low >= 0. && low <= high) || *jitter < 0. => {
                return invalid(format!(
                    "uniform latency needs 0 <= low <= high and a non negative jitter, got {low}, {high} and {jitter}"
                ));
            }
            _ => {}
        }

        let DatasetSource::Synthetic {
            samples,
            features,
            classes,
            spread,
            test_fraction,
        } = self.dataset.source;

        if features == 0 || classes < 2 || !(spread > 0.) {
            return invalid(format!(
                "synthetic dataset needs features, at least two classes and a positive spread, got {features}, {classes} and {spread}"
            ));
        }

        if !(test_fraction > 0. && test_fraction < 1.) {
            return invalid(format!("test fraction must be in (0, 1), got {test_fraction}"));
        }

        let test = (samples as f64 * test_fraction).round() as usize;
        let train = samples - test;
        let slots = match self.dataset.partition {
            PartitionConfig::Iid => self.clients,
            PartitionConfig::NonIid { shards_per_client } => {
                if shards_per_client == 0 {
                    return invalid("shards per client must be positive".into());
                }
                self.clients * shards_per_client
            }
        };

        if test == 0 || train < slots {
            return invalid(format!(
                "{train} training samples can't be split in {slots} non empty shards"
            ));
        }

        if let ModelConfig::Mlp { hidden: 0, .. } = self.model {
            return invalid("the mlp's hidden layer can't be empty".into());
        }

        let training = &self.training;
        if training.local_epochs == 0 || training.batch_size == 0 {
            return invalid("local epochs and batch size must be positive".into());
        }

        if !(training.learning_rate > 0.) || !(training.lr_decay > 0.) {
            return invalid(format!(
                "learning rate and decay must be positive, got {} and {}",
                training.learning_rate, training.lr_decay
            ));
        }

        let privacy = &self.privacy;
        if !(privacy.epsilon > 0.) {
            return invalid(format!("epsilon must be positive, got {}", privacy.epsilon));
        }

        if privacy.mechanism != MechanismConfig::NoDp && !(privacy.clip > 0.) {
            return invalid(format!("clip must be positive, got {}", privacy.clip));
        }

        if privacy.mechanism == MechanismConfig::Gaussian
            && !(privacy.delta > 0. && privacy.delta < 1.)
        {
            return invalid(format!("delta must be in (0, 1), got {}", privacy.delta));
        }

        if let AggregationConfig::StalenessDiscounted { exponent } = self.aggregation {
            if !(exponent >= 0.) {
                return invalid(format!("staleness exponent can't be negative, got {exponent}"));
            }
        }

        if self.dispatch.workers == 0 {
            return invalid("there must be at least one dispatch worker".into());
        }

        if self.dispatch.deadline_ms == Some(0) {
            return invalid("the dispatch deadline must be positive".into());
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "clients": 10,
        "participation": 0.3,
        "rounds": 5,
        "seed": 42,
        "scheduling": "semi_asynchronous",
        "latency": { "fixed": { "times": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10] } },
        "dataset": {
            "synthetic": { "samples": 300, "features": 4, "classes": 3, "spread": 0.5, "test_fraction": 0.2 },
            "partition": { "non_iid": { "shards_per_client": 2 } }
        },
        "model": { "mlp": { "hidden": 8, "activation": "sigmoid" } },
        "training": { "local_epochs": 2, "batch_size": 8, "learning_rate": 0.1, "lr_decay": 0.99 },
        "privacy": { "epsilon": 20.0, "delta": 1e-5, "clip": 5.0, "mechanism": "gaussian" },
        "aggregation": { "staleness_discounted": { "exponent": 0.5 } },
        "dispatch": { "workers": 2, "deadline_ms": 10000, "on_failure": "drop" },
        "output": { "dir": "target/test-log" }
    }"#;

    #[test]
    fn parses_every_section() {
        let config = SimConfig::from_json(SAMPLE).unwrap();

        assert_eq!(config.scheduling, SchedulingConfig::SemiAsynchronous);
        assert_eq!(config.latency, LatencyConfig::Fixed {
            times: (1..=10).map(f64::from).collect()
        });
        assert_eq!(
            config.dataset.partition,
            PartitionConfig::NonIid { shards_per_client: 2 }
        );
        assert_eq!(
            config.model,
            ModelConfig::Mlp {
                hidden: 8,
                activation: ActivationConfig::Sigmoid
            }
        );
        assert_eq!(config.privacy.mechanism, MechanismConfig::Gaussian);
        assert_eq!(
            config.aggregation,
            AggregationConfig::StalenessDiscounted { exponent: 0.5 }
        );
        assert_eq!(config.dispatch.on_failure, FailurePolicy::Drop);
        assert_eq!(config.seed, Some(42));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fills_defaults() {
        let config = SimConfig::from_json(
            r#"{
                "clients": 4,
                "participation": 0.5,
                "rounds": 3,
                "scheduling": "synchronous",
                "latency": { "uniform": { "low": 1.0, "high": 2.0 } },
                "dataset": { "synthetic": { "samples": 100, "features": 2, "classes": 2 } },
                "model": "logistic",
                "training": { "learning_rate": 0.05 },
                "privacy": { "epsilon": 1.0, "mechanism": "laplace" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.seed, None);
        assert_eq!(config.dataset.partition, PartitionConfig::Iid);
        assert_eq!(config.aggregation, AggregationConfig::Uniform);
        assert_eq!(config.dispatch.on_failure, FailurePolicy::Abort);
        assert_eq!(config.training.local_epochs, 5);
        assert_eq!(config.output.dir, PathBuf::from("log"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_configuration_mistakes() {
        let base = SimConfig::from_json(SAMPLE).unwrap();
        let check = |edit: fn(&mut SimConfig)| {
            let mut config = base.clone();
            edit(&mut config);
            assert!(
                matches!(config.validate(), Err(SimErr::InvalidConfig(_))),
                "{config:?} should be invalid"
            );
        };

        check(|c| c.clients = 0);
        check(|c| c.participation = 0.);
        check(|c| c.participation = 1.5);
        check(|c| c.rounds = 0);
        check(|c| c.privacy.epsilon = 0.);
        check(|c| c.privacy.delta = 1.);
        check(|c| c.privacy.clip = 0.);
        check(|c| c.latency = LatencyConfig::Fixed { times: vec![1.; 3] });
        check(|c| {
            c.latency = LatencyConfig::Uniform {
                low: 3.,
                high: 1.,
                jitter: 0.,
            }
        });
        check(|c| c.training.batch_size = 0);
        check(|c| c.dispatch.workers = 0);
        check(|c| {
            c.model = ModelConfig::Mlp {
                hidden: 0,
                activation: ActivationConfig::Relu,
            }
        });
        check(|c| c.dataset.partition = PartitionConfig::NonIid { shards_per_client: 100 });
    }
}
