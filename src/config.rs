use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::heuristic::HeuristicConfig;

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_MODEL_PATH: &str = "models/yolo11n.onnx";
const DEFAULT_COMMAND: &str = "python3";
const DEFAULT_COMMAND_ARGS: &[&str] = &["detector.py"];
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

#[derive(Debug, Deserialize, Default)]
struct ScanConfigFile {
    confidence_threshold: Option<f32>,
    primary: Option<PrimaryConfigFile>,
    heuristic: Option<HeuristicConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct PrimaryConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    command: Option<PathBuf>,
    args: Option<Vec<String>>,
    timeout_secs: Option<u64>,
    input_size: Option<u32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct HeuristicConfigFile {
    min_color_area: Option<u32>,
    min_edge_area: Option<u32>,
    blur_sigma: Option<f32>,
    canny_low: Option<f32>,
    canny_high: Option<f32>,
}

/// Which primary detector the pipeline runs first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    None,
    Stub,
    Subprocess,
    Tract,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "none" | "" => Ok(BackendKind::None),
            "stub" => Ok(BackendKind::Stub),
            "subprocess" => Ok(BackendKind::Subprocess),
            "tract" => Ok(BackendKind::Tract),
            other => Err(anyhow!(
                "unknown primary backend '{}'; expected none, stub, subprocess or tract",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub confidence_threshold: f32,
    pub primary: PrimarySettings,
    pub heuristic: HeuristicConfig,
}

#[derive(Debug, Clone)]
pub struct PrimarySettings {
    pub backend: BackendKind,
    pub model_path: PathBuf,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub input_size: u32,
    pub iou_threshold: f32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            primary: PrimarySettings::default(),
            heuristic: HeuristicConfig::default(),
        }
    }
}

impl Default for PrimarySettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::None,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            command: PathBuf::from(DEFAULT_COMMAND),
            args: DEFAULT_COMMAND_ARGS.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            input_size: DEFAULT_INPUT_SIZE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

impl ScanConfig {
    /// Load from `STATION_SCAN_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("STATION_SCAN_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit config file (if any), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScanConfigFile) -> Result<Self> {
        let defaults = PrimarySettings::default();
        let primary = file.primary.unwrap_or_default();
        let backend = match primary.backend.as_deref() {
            Some(name) => name.parse()?,
            None => defaults.backend,
        };
        let primary = PrimarySettings {
            backend,
            model_path: primary.model_path.unwrap_or(defaults.model_path),
            command: primary.command.unwrap_or(defaults.command),
            args: primary.args.unwrap_or(defaults.args),
            timeout: primary
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            input_size: primary.input_size.unwrap_or(defaults.input_size),
            iou_threshold: primary.iou_threshold.unwrap_or(defaults.iou_threshold),
        };

        let heuristic_defaults = HeuristicConfig::default();
        let heuristic = file.heuristic.unwrap_or_default();
        let heuristic = HeuristicConfig {
            min_color_area: heuristic
                .min_color_area
                .unwrap_or(heuristic_defaults.min_color_area),
            min_edge_area: heuristic
                .min_edge_area
                .unwrap_or(heuristic_defaults.min_edge_area),
            blur_sigma: heuristic.blur_sigma.unwrap_or(heuristic_defaults.blur_sigma),
            canny_low: heuristic.canny_low.unwrap_or(heuristic_defaults.canny_low),
            canny_high: heuristic.canny_high.unwrap_or(heuristic_defaults.canny_high),
        };

        Ok(Self {
            confidence_threshold: file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            primary,
            heuristic,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(conf) = std::env::var("STATION_SCAN_CONF") {
            self.confidence_threshold = conf
                .trim()
                .parse()
                .map_err(|_| anyhow!("STATION_SCAN_CONF must be a number between 0 and 1"))?;
        }
        if let Ok(backend) = std::env::var("STATION_SCAN_BACKEND") {
            if !backend.trim().is_empty() {
                self.primary.backend = backend.parse()?;
            }
        }
        if let Ok(model) = std::env::var("STATION_SCAN_MODEL") {
            if !model.trim().is_empty() {
                self.primary.model_path = PathBuf::from(model);
            }
        }
        if let Ok(command) = std::env::var("STATION_SCAN_COMMAND") {
            let mut parts = split_command(&command).into_iter();
            if let Some(program) = parts.next() {
                self.primary.command = PathBuf::from(program);
                self.primary.args = parts.collect();
            }
        }
        if let Ok(timeout) = std::env::var("STATION_SCAN_TIMEOUT_SECS") {
            let seconds: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("STATION_SCAN_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.primary.timeout = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within [0, 1]"));
        }
        if self.primary.timeout.is_zero() {
            return Err(anyhow!("primary timeout must be greater than zero"));
        }
        if self.primary.input_size == 0 {
            return Err(anyhow!("primary input_size must be greater than zero"));
        }
        if !(self.primary.iou_threshold > 0.0 && self.primary.iou_threshold <= 1.0) {
            return Err(anyhow!("primary iou_threshold must be within (0, 1]"));
        }
        self.heuristic.validate()
    }
}

fn read_config_file(path: &Path) -> Result<ScanConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(|part| part.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_case_insensitively() {
        assert_eq!("Tract".parse::<BackendKind>().unwrap(), BackendKind::Tract);
        assert_eq!(" none ".parse::<BackendKind>().unwrap(), BackendKind::None);
        assert!("onnxruntime".parse::<BackendKind>().is_err());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = ScanConfig::from_file(ScanConfigFile::default()).unwrap();
        assert_eq!(cfg.confidence_threshold, 0.25);
        assert_eq!(cfg.primary.backend, BackendKind::None);
        assert_eq!(cfg.primary.timeout, Duration::from_secs(30));
        assert_eq!(cfg.heuristic, HeuristicConfig::default());
        cfg.validate().unwrap();
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let cfg = ScanConfig {
            confidence_threshold: 1.5,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
