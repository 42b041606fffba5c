use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Disease model parameters.
    pub model: ModelConfig,
    /// Initial condition parameters.
    pub init: InitConfig,
    /// Run parameters.
    pub output: OutputConfig,
}

/// Disease model parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Probability of an exposure per round.
    pub infection_rate: f64,
    /// Probability of death per round once past the recovery threshold.
    pub death_rate: f64,
    /// Probability of gaining immunity per round once past the recovery threshold.
    pub immunity_rate: f64,
    /// Number of infected rounds after which the outcome is resolved.
    pub recovery_threshold_days: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            infection_rate: 0.1,
            death_rate: 0.45,
            immunity_rate: 0.1,
            recovery_threshold_days: 10,
        }
    }
}

/// Initial condition parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InitConfig {
    /// Number of humans (must be a perfect square).
    pub n_humans: usize,
    /// Number of vectors.
    pub n_vectors: usize,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            n_humans: 400,
            n_vectors: 100,
        }
    }
}

/// Run parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Number of rounds per run.
    pub n_rounds: usize,
    /// Delay between consecutive rounds in milliseconds.
    pub interval_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            interval_ms: 0,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded. Missing sections and fields take their
    /// default values. Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Check every parameter against its allowed range.
    pub fn validate(&self) -> Result<()> {
        self.model.validate().context("invalid model parameters")?;
        self.init.validate().context("invalid initial condition")?;
        self.output.validate().context("invalid output parameters")?;
        Ok(())
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.infection_rate, 0.0..=1.0).context("invalid infection rate")?;
        check_num(self.death_rate, 0.0..=1.0).context("invalid death rate")?;
        check_num(self.immunity_rate, 0.0..=1.0).context("invalid immunity rate")?;
        check_num(self.recovery_threshold_days, 0..=10_000)
            .context("invalid recovery threshold")?;
        Ok(())
    }
}

impl InitConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.n_humans, 1..=1_000_000).context("invalid number of humans")?;
        check_square(self.n_humans).context("invalid number of humans")?;
        check_num(self.n_vectors, 0..=100_000).context("invalid number of vectors")?;
        Ok(())
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.n_rounds, 1..=1_000_000).context("invalid number of rounds")?;
        check_num(self.interval_ms, 0..=60_000).context("invalid round interval")?;
        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    // NaN fails `contains` as well.
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

/// Side length of the square grid holding `num` agents.
pub fn grid_side(num: usize) -> Option<usize> {
    let side = (num as f64).sqrt().round() as usize;
    (side * side == num).then_some(side)
}

fn check_square(num: usize) -> Result<()> {
    if grid_side(num).is_none() {
        bail!("number must be a perfect square, but is {num}");
    }
    Ok(())
}
