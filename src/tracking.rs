//! Experiment-tracking observers for the training loop.
//!
//! Whether tracking is available is decided once, when a
//! [`TrackingCapability`] is resolved, and the matching observer is handed
//! to the trainer. Without tracking the trainer gets a [`NoopObserver`] that
//! answers the same events.

use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{MaterializeError, Result};

pub const TRACKING_URI_ENV: &str = "MLFLOW_TRACKING_URI";
pub const METRICS_FILE: &str = "metrics.jsonl";
const LOG_PREFIX: &str = "MLflow:";

/// Snapshot of the trainer passed to every event.
#[derive(Debug, Clone, Default)]
pub struct TrainerState {
    pub run_id: Option<String>,
    pub epoch: usize,
    pub metrics: BTreeMap<String, f64>,
}

/// Whether the training loop keeps going after an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochAction {
    Continue,
    Stop,
}

/// Callbacks fired by the training loop.
pub trait TrainingObserver {
    fn on_train_start(&mut self, state: &TrainerState) -> Result<()>;

    fn on_fit_epoch_end(&mut self, state: &TrainerState) -> Result<()>;

    fn on_train_epoch_end(&mut self, state: &TrainerState) -> EpochAction;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TrainingObserver for NoopObserver {
    fn on_train_start(&mut self, _state: &TrainerState) -> Result<()> {
        Ok(())
    }

    fn on_fit_epoch_end(&mut self, _state: &TrainerState) -> Result<()> {
        Ok(())
    }

    fn on_train_epoch_end(&mut self, _state: &TrainerState) -> EpochAction {
        EpochAction::Continue
    }
}

/// Tracking settings, resolved once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingCapability {
    Unavailable,
    Available {
        tracking_uri: PathBuf,
        halt_after_epoch: bool,
    },
}

impl TrackingCapability {
    /// Resolve the capability; the URI comes from `MLFLOW_TRACKING_URI`,
    /// falling back to `<runs_dir>/mlflow`.
    pub fn resolve(available: bool, runs_dir: &Path) -> Self {
        if !available {
            return TrackingCapability::Unavailable;
        }
        let tracking_uri = env::var_os(TRACKING_URI_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| runs_dir.join("mlflow"));
        Self::with_uri(tracking_uri)
    }

    /// Tracking is available only when `MLFLOW_TRACKING_URI` is set.
    pub fn from_env(runs_dir: &Path) -> Self {
        Self::resolve(env::var_os(TRACKING_URI_ENV).is_some(), runs_dir)
    }

    pub fn with_uri(tracking_uri: impl Into<PathBuf>) -> Self {
        TrackingCapability::Available {
            tracking_uri: tracking_uri.into(),
            halt_after_epoch: false,
        }
    }

    /// Stop training after the first epoch, once its metrics are recorded.
    pub fn halting_after_epoch(self) -> Self {
        match self {
            TrackingCapability::Available { tracking_uri, .. } => TrackingCapability::Available {
                tracking_uri,
                halt_after_epoch: true,
            },
            TrackingCapability::Unavailable => TrackingCapability::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, TrackingCapability::Available { .. })
    }

    pub fn observer(&self) -> Box<dyn TrainingObserver> {
        match self {
            TrackingCapability::Unavailable => Box::new(NoopObserver),
            TrackingCapability::Available {
                tracking_uri,
                halt_after_epoch,
            } => Box::new(TrackingObserver::new(tracking_uri.clone(), *halt_after_epoch)),
        }
    }
}

/// Records per-epoch metrics as JSON lines under the tracking URI.
#[derive(Debug, Clone)]
pub struct TrackingObserver {
    tracking_uri: PathBuf,
    halt_after_epoch: bool,
}

#[derive(Serialize)]
struct MetricsRecord<'a> {
    run_id: Option<&'a str>,
    step: usize,
    metrics: BTreeMap<String, f64>,
}

impl TrackingObserver {
    pub fn new(tracking_uri: PathBuf, halt_after_epoch: bool) -> Self {
        Self {
            tracking_uri,
            halt_after_epoch,
        }
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.tracking_uri.join(METRICS_FILE)
    }

    fn absolute_uri(&self) -> PathBuf {
        if self.tracking_uri.is_absolute() {
            self.tracking_uri.clone()
        } else {
            env::current_dir()
                .map(|cwd| cwd.join(&self.tracking_uri))
                .unwrap_or_else(|_| self.tracking_uri.clone())
        }
    }
}

/// Strip parentheses from a metric name, e.g. `metrics/mAP50(B)` -> `metrics/mAP50B`.
pub fn sanitize_metric_key(key: &str) -> String {
    key.chars().filter(|c| *c != '(' && *c != ')').collect()
}

impl TrainingObserver for TrackingObserver {
    fn on_train_start(&mut self, state: &TrainerState) -> Result<()> {
        let run_id = state.run_id.as_deref().unwrap_or("No active run");
        info!("{} Run ID: {}", LOG_PREFIX, run_id);
        info!(
            "{} tracking uri saved at: {}",
            LOG_PREFIX,
            self.absolute_uri().display()
        );
        Ok(())
    }

    fn on_fit_epoch_end(&mut self, state: &TrainerState) -> Result<()> {
        fs::create_dir_all(&self.tracking_uri).map_err(MaterializeError::io(&self.tracking_uri))?;

        let record = MetricsRecord {
            run_id: state.run_id.as_deref(),
            step: state.epoch,
            metrics: state
                .metrics
                .iter()
                .map(|(key, value)| (sanitize_metric_key(key), *value))
                .collect(),
        };

        let path = self.metrics_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(MaterializeError::io(&path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &record).map_err(|source| MaterializeError::Json {
            path: path.clone(),
            source,
        })?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(MaterializeError::io(&path))
    }

    fn on_train_epoch_end(&mut self, state: &TrainerState) -> EpochAction {
        if self.halt_after_epoch {
            info!("{} Training stopped voluntarily after epoch {}", LOG_PREFIX, state.epoch);
            EpochAction::Stop
        } else {
            EpochAction::Continue
        }
    }
}
