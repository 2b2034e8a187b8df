//! Scheduler configuration.
//!
//! Settings are layered: built-in defaults, then a TOML file, then whatever
//! the caller overrides (the CLI flags). Durations are written as jiff
//! durations, either friendly (`"90s"`, `"1h 30m"`) or ISO 8601 (`"PT5M"`).

use std::path::{Path, PathBuf};

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

use crate::error::{LeaseError, Result};

const APP_PREFIX: &str = "lease";

/// Complete scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite database file. Defaults to `$XDG_DATA_HOME/lease/lease.db`
    pub database_path: Option<PathBuf>,

    /// Root of the batch inbox (`pending/`, `imported/`, `failed/`).
    /// Defaults to `$XDG_DATA_HOME/lease/inbox`
    pub inbox_dir: Option<PathBuf>,

    /// Shortest job worth persisting or starting
    #[serde(with = "duration_str")]
    pub minimum_duration: SignedDuration,

    /// Longest job handed to the provisioner in one piece
    #[serde(with = "duration_str")]
    pub maximum_duration: SignedDuration,

    /// Delay of the upstream allocation source, subtracted from "now"
    #[serde(with = "duration_str")]
    pub time_lag: SignedDuration,

    /// Period of the due-job monitor
    #[serde(with = "duration_str")]
    pub poll_interval: SignedDuration,

    /// Period of the plan importer
    #[serde(with = "duration_str")]
    pub import_interval: SignedDuration,

    /// How long shutdown waits for in-flight plans to unwind
    #[serde(with = "duration_str")]
    pub shutdown_grace: SignedDuration,

    pub provisioner: ProvisionerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            inbox_dir: None,
            minimum_duration: SignedDuration::from_mins(5),
            maximum_duration: SignedDuration::from_hours(1),
            time_lag: SignedDuration::from_mins(1),
            poll_interval: SignedDuration::from_mins(1),
            import_interval: SignedDuration::from_hours(1),
            shutdown_grace: SignedDuration::from_secs(30),
            provisioner: ProvisionerConfig::default(),
        }
    }
}

/// Which provisioning backend runs the jobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionerKind {
    /// Waits out the job's budget without renting anything
    #[default]
    Simulated,
    /// Runs a local program per rented unit
    Process,
}

/// Settings for the provisioning backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionerConfig {
    pub kind: ProvisionerKind,

    /// Program started for each unit (process backend only)
    pub program: Option<PathBuf>,

    /// Extra arguments placed before the workload argument
    pub args: Vec<String>,

    /// Compute classes this backend may rent; empty accepts any
    pub compute_classes: Vec<String>,

    /// Workload image requested for every job
    pub image: String,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            kind: ProvisionerKind::Simulated,
            program: None,
            args: Vec::new(),
            compute_classes: Vec::new(),
            image: "alpine:latest".to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration file at `path`, or the XDG default location
    /// if `path` is `None` and that file exists, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => xdg::BaseDirectories::with_prefix(APP_PREFIX).find_config_file("config.toml"),
        };

        let config = match path {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| LeaseError::file_system(&path, e))?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document, filling unspecified fields with defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| LeaseError::configuration(e.to_string()))
    }

    /// Checks the relationships between settings.
    pub fn validate(&self) -> Result<()> {
        if !self.minimum_duration.is_positive() {
            return Err(LeaseError::invalid_input(
                "minimum_duration",
                "must be greater than zero",
            ));
        }
        if self.maximum_duration < self.minimum_duration {
            return Err(LeaseError::invalid_input(
                "maximum_duration",
                format!(
                    "{:#} is shorter than minimum_duration {:#}",
                    self.maximum_duration, self.minimum_duration
                ),
            ));
        }
        if self.time_lag.is_negative() {
            return Err(LeaseError::invalid_input("time_lag", "must not be negative"));
        }
        for (field, value) in [
            ("poll_interval", self.poll_interval),
            ("import_interval", self.import_interval),
        ] {
            if !value.is_positive() {
                return Err(LeaseError::invalid_input(field, "must be greater than zero"));
            }
        }
        if self.shutdown_grace.is_negative() {
            return Err(LeaseError::invalid_input(
                "shutdown_grace",
                "must not be negative",
            ));
        }
        if self.provisioner.kind == ProvisionerKind::Process && self.provisioner.program.is_none()
        {
            return Err(LeaseError::invalid_input(
                "provisioner.program",
                "required when provisioner.kind = \"process\"",
            ));
        }
        Ok(())
    }

    /// Resolved database path.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => place_data_file("lease.db"),
        }
    }

    /// Resolved inbox root.
    pub fn inbox_dir(&self) -> Result<PathBuf> {
        match &self.inbox_dir {
            Some(path) => Ok(path.clone()),
            None => place_data_file("inbox"),
        }
    }

    /// Slicing bounds derived from this configuration.
    pub fn slice_limits(&self) -> SliceLimits {
        SliceLimits {
            minimum: self.minimum_duration,
            maximum: self.maximum_duration,
        }
    }
}

/// Bounds applied when cutting a window into jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceLimits {
    pub minimum: SignedDuration,
    pub maximum: SignedDuration,
}

fn place_data_file(name: &str) -> Result<PathBuf> {
    xdg::BaseDirectories::with_prefix(APP_PREFIX)
        .place_data_file(name)
        .map_err(|e| LeaseError::XdgDirectory(e.to_string()))
}

/// Serde adapter reading durations from their string forms.
mod duration_str {
    use jiff::SignedDuration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &SignedDuration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{value:#}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SignedDuration, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.trim()
            .parse::<SignedDuration>()
            .map_err(serde::de::Error::custom)
    }
}
