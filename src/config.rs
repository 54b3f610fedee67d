//! Planner configuration.
//!
//! [`PlannerConfig`] is plain data with serde support so it can be kept next to
//! other job settings as JSON:
//!
//! ```
//! use ironjet::PlannerConfig;
//!
//! let cfg = PlannerConfig::from_json_str(r#"{ "enable_peek": false }"#).unwrap();
//! assert!(!cfg.enable_peek);
//! assert_eq!(cfg.hash_join_collector_parallelism, 1);
//! ```

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Knobs that change how stages are expanded, never what they compute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    /// Local parallelism of each hash-join collector vertex.
    pub hash_join_collector_parallelism: usize,
    /// Applied to vertices whose processor states no preference.
    pub default_local_parallelism: Option<usize>,
    /// When `false`, peek stages are compiled away without logging.
    pub enable_peek: bool,
    /// Run [`Dag::validate`](crate::dag::Dag::validate) on every compiled DAG.
    pub validate_dag: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            hash_join_collector_parallelism: 1,
            default_local_parallelism: None,
            enable_peek: true,
            validate_dag: true,
        }
    }
}

impl PlannerConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Malformed JSON, unknown fields, or values rejected by [`Self::validate`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json).context("parsing planner config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON file.
    ///
    /// # Errors
    ///
    /// I/O failures plus everything [`Self::from_json_str`] rejects.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading planner config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// # Errors
    ///
    /// Zero parallelism values.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.hash_join_collector_parallelism > 0,
            "hash_join_collector_parallelism must be positive"
        );
        ensure!(
            self.default_local_parallelism != Some(0),
            "default_local_parallelism must be positive when set"
        );
        Ok(())
    }
}
