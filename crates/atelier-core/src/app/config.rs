//! AtelierConfig - TOML 設定
//!
//! すべてのセクションに `#[serde(default)]` を付けているので、書いたキーだけが上書きされます。
//! ファイルが無ければデフォルト値。読み込み後は必ず `validate()` を通します。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::action::Rgba;
use crate::planner::PlannerConfig;
use crate::registry::RetryPolicy;
use crate::workflow::{PhaseThresholds, RegressionPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Surface created when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub background: Rgba,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            background: Rgba::WHITE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtelierConfig {
    pub canvas: CanvasConfig,
    pub planner: PlannerConfig,
    pub phases: PhaseThresholds,
    pub regression: RegressionPolicy,
    pub retry: RetryPolicy,

    /// Execution history records kept by the state tracker.
    pub history_capacity: usize,
    /// Checkpoints kept before the oldest is evicted.
    pub max_checkpoints: usize,
    /// Snapshot the canvas whenever the phase advances or regresses on its own.
    pub checkpoint_on_phase_change: bool,
    /// Snapshot the canvas before the first iteration.
    pub initial_checkpoint: bool,
    /// Upper bound for any single canvas / perception call.
    pub collaborator_timeout_ms: u64,
    /// Iterations `run_batch` may spend over the orchestrator's lifetime. `None` is unbounded.
    pub max_session_iterations: Option<u64>,
}

impl Default for AtelierConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasConfig::default(),
            planner: PlannerConfig::default(),
            phases: PhaseThresholds::default(),
            regression: RegressionPolicy::default(),
            retry: RetryPolicy::default(),
            history_capacity: 100,
            max_checkpoints: 10,
            checkpoint_on_phase_change: true,
            initial_checkpoint: true,
            collaborator_timeout_ms: 30_000,
            max_session_iterations: None,
        }
    }
}

fn check_unit(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}

impl AtelierConfig {
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Invalid("canvas width and height must be > 0".into()));
        }
        check_unit("planner.proportion_threshold", self.planner.proportion_threshold)?;
        check_unit("planner.symmetry_threshold", self.planner.symmetry_threshold)?;
        check_unit(
            "planner.severity_medium_threshold",
            self.planner.severity_medium_threshold,
        )?;
        if self.planner.stroke_points < 2 {
            return Err(ConfigError::Invalid("planner.stroke_points must be >= 2".into()));
        }
        if !(self.planner.min_improvement.is_finite() && self.planner.min_improvement > 0.0) {
            return Err(ConfigError::Invalid("planner.min_improvement must be > 0".into()));
        }
        check_unit("phases.sketch", self.phases.sketch)?;
        check_unit("phases.refinement", self.phases.refinement)?;
        check_unit("phases.stylization", self.phases.stylization)?;
        check_unit("phases.rendering", self.phases.rendering)?;
        check_unit("regression.below", self.regression.below)?;
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid("history_capacity must be > 0".into()));
        }
        if self.max_checkpoints == 0 {
            return Err(ConfigError::Invalid("max_checkpoints must be > 0".into()));
        }
        if self.collaborator_timeout_ms == 0 {
            return Err(ConfigError::Invalid("collaborator_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AtelierConfig::default()`.
pub fn load_config(path: &Path) -> Result<AtelierConfig, ConfigError> {
    if !path.exists() {
        let cfg = AtelierConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: AtelierConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AtelierConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("atelier.toml");
        fs::write(
            &path,
            r#"
max_checkpoints = 4

[phases]
sketch = 0.8

[retry]
max_retries = 5
"#,
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_checkpoints, 4);
        assert_eq!(cfg.phases.sketch, 0.8);
        assert_eq!(cfg.phases.rendering, PhaseThresholds::default().rendering);
        assert_eq!(cfg.retry.max_retries, 5);
        assert!(cfg.retry.critical_partial_bonus);
        assert_eq!(cfg.planner, PlannerConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("atelier.toml");
        fs::write(&path, "[planner]\nproportion_threshold = 1.5\n").expect("write");

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("proportion_threshold")));
    }

    #[test]
    fn broken_toml_is_a_parse_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("atelier.toml");
        fs::write(&path, "max_checkpoints = [").expect("write");

        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }
}
