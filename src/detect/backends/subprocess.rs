//! Out-of-process primary detector.
//!
//! Runs an external detector program once per image:
//!
//! ```text
//! <program> [args..] --image <path> --output <json> --conf <threshold> [--model <path>]
//! ```
//!
//! The program writes its raw boxes (pixel corners) to the output file:
//!
//! ```text
//! {"detections": [{"x1": 10, "y1": 20, "x2": 90, "y2": 140,
//!                  "confidence": 0.81, "class_id": 28, "class_name": "suitcase"}],
//!  "names": {"28": "suitcase"}}
//! ```
//!
//! The call is bounded by a timeout; an expired child is killed and the call fails.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::detect::backend::{DetectorBackend, PrimaryInput};
use crate::detect::result::{RawBox, RawDetection, RawDetections};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Configuration for an external detector program.
#[derive(Clone, Debug)]
pub struct SubprocessConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub model_path: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python3"),
            args: vec!["detector.py".to_string()],
            model_path: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OutputFile {
    #[serde(default)]
    detections: Vec<OutputDetection>,
    #[serde(default)]
    names: HashMap<i64, String>,
}

#[derive(Debug, Deserialize)]
struct OutputDetection {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
    #[serde(default)]
    class_id: Option<i64>,
    #[serde(default)]
    class_name: Option<String>,
}

pub struct SubprocessBackend {
    config: SubprocessConfig,
}

impl SubprocessBackend {
    pub fn new(config: SubprocessConfig) -> Self {
        Self { config }
    }

    fn run(&self, image: &Path, output: &Path, threshold: f32) -> Result<()> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .arg("--image")
            .arg(image)
            .arg("--output")
            .arg(output)
            .arg("--conf")
            .arg(threshold.to_string());
        if let Some(model) = &self.config.model_path {
            command.arg("--model").arg(model);
        }
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| {
                format!(
                    "failed to spawn detector {}",
                    self.config.program.display()
                )
            })?;

        let started = Instant::now();
        let status: ExitStatus = loop {
            if let Some(status) = child.try_wait().context("failed to poll detector")? {
                break status;
            }
            if started.elapsed() >= self.config.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(anyhow!(
                    "detector timed out after {:?}",
                    self.config.timeout
                ));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(anyhow!("detector exited with {}", status));
        }
        Ok(())
    }
}

impl DetectorBackend for SubprocessBackend {
    fn name(&self) -> &'static str {
        "yolo-subprocess"
    }

    fn model_name(&self) -> Option<String> {
        self.config
            .model_path
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    fn detect(&mut self, input: &PrimaryInput<'_>, threshold: f32) -> Result<RawDetections> {
        // removed on drop, whichever way this call returns
        let output = scratch_output_file()?;
        let parsed = self
            .run(input.path, output.path(), threshold)
            .and_then(|()| read_output(output.path()))?;

        let detections = parsed
            .detections
            .into_iter()
            .filter(|det| det.confidence >= threshold)
            .map(|det| RawDetection {
                bbox: RawBox::Pixels {
                    x1: det.x1,
                    y1: det.y1,
                    x2: det.x2,
                    y2: det.y2,
                },
                confidence: det.confidence,
                class_id: det.class_id,
                class_name: det.class_name,
            })
            .collect();
        Ok(RawDetections::new(detections).with_names(parsed.names))
    }
}

fn scratch_output_file() -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix("station_scan_")
        .suffix(".json")
        .tempfile()
        .context("failed to create detector output file")
}

fn read_output(path: &Path) -> Result<OutputFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("detector wrote no output at {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid detector output in {}", path.display()))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str, timeout: Duration) -> SubprocessBackend {
        SubprocessBackend::new(SubprocessConfig {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string(), "detector".to_string()],
            model_path: Some(PathBuf::from("models/yolo11n.pt")),
            timeout,
        })
    }

    const WRITE_OUTPUT: &str = r#"
        while [ $# -gt 0 ]; do
            if [ "$1" = "--output" ]; then out="$2"; fi
            shift
        done
        printf '%s' '{"detections":[{"x1":10,"y1":20,"x2":90,"y2":140,"confidence":0.81,"class_id":28},{"x1":0,"y1":0,"x2":5,"y2":5,"confidence":0.1,"class_id":39}],"names":{"28":"suitcase"}}' > "$out"
    "#;

    #[test]
    fn parses_detector_output() {
        let mut backend = shell(WRITE_OUTPUT, Duration::from_secs(10));
        assert_eq!(backend.model_name().as_deref(), Some("yolo11n.pt"));
        let image = image::RgbImage::new(200, 200);
        let input = PrimaryInput::new(Path::new("frame.png"), &image);

        let raw = backend.detect(&input, 0.25).unwrap();
        assert_eq!(raw.detections.len(), 1);
        assert_eq!(raw.detections[0].class_id, Some(28));
        assert_eq!(raw.class_label(&raw.detections[0]), "suitcase");
    }

    #[test]
    fn failing_exit_status_is_an_error() {
        let mut backend = shell("exit 3", Duration::from_secs(10));
        let image = image::RgbImage::new(4, 4);
        let input = PrimaryInput::new(Path::new("frame.png"), &image);
        assert!(backend.detect(&input, 0.25).is_err());
    }

    #[test]
    fn slow_detector_times_out() {
        let mut backend = shell("sleep 5", Duration::from_millis(200));
        let image = image::RgbImage::new(4, 4);
        let input = PrimaryInput::new(Path::new("frame.png"), &image);
        let started = Instant::now();
        let err = backend.detect(&input, 0.25).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    fn recording(side_file: &Path, tail: &str) -> String {
        format!(
            r#"
            while [ $# -gt 0 ]; do
                if [ "$1" = "--output" ]; then out="$2"; fi
                shift
            done
            printf '%s' "$out" > '{}'
            {}
            "#,
            side_file.display(),
            tail
        )
    }

    #[test]
    fn output_file_is_removed_after_each_call() {
        let dir = tempfile::TempDir::new().unwrap();
        let side_file = dir.path().join("seen");
        let image = image::RgbImage::new(4, 4);
        let input = PrimaryInput::new(Path::new("frame.png"), &image);

        let ok = recording(&side_file, r#"printf '%s' '{"detections":[]}' > "$out""#);
        let mut backend = shell(&ok, Duration::from_secs(10));
        assert!(backend.detect(&input, 0.25).unwrap().is_empty());
        let used = std::fs::read_to_string(&side_file).unwrap();
        assert!(used.ends_with(".json"));
        assert!(!Path::new(&used).exists());

        let mut backend = shell(&recording(&side_file, "exit 3"), Duration::from_secs(10));
        assert!(backend.detect(&input, 0.25).is_err());
        let used = std::fs::read_to_string(&side_file).unwrap();
        assert!(!Path::new(&used).exists());
    }

    #[test]
    fn missing_program_is_an_error() {
        let mut backend = SubprocessBackend::new(SubprocessConfig {
            program: PathBuf::from("/nonexistent/detector-binary"),
            args: Vec::new(),
            model_path: None,
            timeout: Duration::from_secs(1),
        });
        let image = image::RgbImage::new(4, 4);
        let input = PrimaryInput::new(Path::new("frame.png"), &image);
        assert!(backend.detect(&input, 0.25).is_err());
    }
}
