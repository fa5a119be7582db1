//! Engine and MaxSAT solver configuration.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WlError};
use crate::neighbourhood::SetOrMultiset;

/// Which pruning strategy runs after every refinement iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruningStrategy {
    #[default]
    None,
    /// Collapse colours with identical corpus columns, keeping the first.
    Greedy,
    /// Drop colours seen in at most 1% of the corpus.
    Frequency,
    Maxsat,
    /// Union of the `Maxsat` and `Frequency` decisions.
    MaxsatAndFrequency,
}

impl PruningStrategy {
    pub fn name(self) -> &'static str {
        match self {
            PruningStrategy::None => "none",
            PruningStrategy::Greedy => "greedy",
            PruningStrategy::Frequency => "frequency",
            PruningStrategy::Maxsat => "maxsat",
            PruningStrategy::MaxsatAndFrequency => "maxsat_and_frequency",
        }
    }
}

impl fmt::Display for PruningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PruningStrategy {
    type Err = WlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(PruningStrategy::None),
            "greedy" => Ok(PruningStrategy::Greedy),
            "frequency" => Ok(PruningStrategy::Frequency),
            "maxsat" => Ok(PruningStrategy::Maxsat),
            "maxsat_and_frequency" => Ok(PruningStrategy::MaxsatAndFrequency),
            other => Err(WlError::config(format!(
                "unknown pruning strategy '{other}', expected one of: none, greedy, frequency, maxsat, maxsat_and_frequency"
            ))),
        }
    }
}

/// How the external MaxSAT solver is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxSatConfig {
    pub executable: PathBuf,
    /// Directory for the WCNF and output files. Defaults to the system temp dir.
    pub work_dir: Option<PathBuf>,
    /// Kill the solver after this many milliseconds. `None` waits forever.
    pub timeout_ms: Option<u64>,
}

impl Default for MaxSatConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("uwrmaxsat"),
            work_dir: None,
            timeout_ms: None,
        }
    }
}

impl MaxSatConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Immutable engine configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WlConfig {
    pub iterations: usize,
    pub pruning: PruningStrategy,
    pub hash: SetOrMultiset,
    /// Hide progress bars.
    pub quiet: bool,
    pub maxsat: MaxSatConfig,
}

impl Default for WlConfig {
    fn default() -> Self {
        Self {
            iterations: 2,
            pruning: PruningStrategy::None,
            hash: SetOrMultiset::Set,
            quiet: false,
            maxsat: MaxSatConfig::default(),
        }
    }
}

impl WlConfig {
    pub fn new(iterations: usize, pruning: PruningStrategy, hash: SetOrMultiset) -> Self {
        Self {
            iterations,
            pruning,
            hash,
            ..Self::default()
        }
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: WlConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.maxsat.executable.as_os_str().is_empty() {
            return Err(WlError::config("MaxSAT solver executable must not be empty"));
        }
        Ok(())
    }
}
