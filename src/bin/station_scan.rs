//! station_scan - detect safety equipment in station imagery
//!
//! Resolves each image through the tiered pipeline (primary detector, remap,
//! heuristics, synthetic fallback) and emits one JSON envelope per image.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use station_scan::ui::{Ui, UiMode};
use station_scan::{DetectionResult, ResolutionPipeline, ScanConfig};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image files to scan.
    #[arg(value_name = "IMAGE")]
    images: Vec<PathBuf>,
    /// Scan every .jpg/.jpeg/.png file in this directory.
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,
    /// JSON config file (overrides STATION_SCAN_CONFIG).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Minimum confidence in [0, 1].
    #[arg(long)]
    conf: Option<f32>,
    /// Primary detector (none|stub|subprocess|tract).
    #[arg(long)]
    backend: Option<String>,
    /// Primary model path.
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,
    /// Output file (single image) or directory; stdout when omitted.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Worker threads.
    #[arg(long, default_value_t = 1)]
    jobs: usize,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let images = collect_images(&args)?;
    if images.is_empty() {
        return Err(anyhow!("no images given; pass image paths or --dir"));
    }
    if args.jobs == 0 {
        return Err(anyhow!("jobs must be >= 1"));
    }

    let config = load_config(&args)?;
    let pipeline = ResolutionPipeline::from_config(&config);
    if let Err(err) = pipeline.registry().warm_up() {
        log::warn!("primary detector warm-up failed: {:#}", err);
    }

    let ui = Ui::new(UiMode::parse(Some(&args.ui)), std::io::stderr().is_terminal());
    let results = scan_all(&pipeline, &images, args.jobs, &ui);

    let mut unreadable = 0usize;
    for (path, result) in images.iter().zip(&results) {
        if !result.success {
            unreadable += 1;
        }
        emit(path, result, args.output.as_deref(), images.len())?;
        print_summary(path, result);
    }

    if unreadable > 0 {
        return Err(anyhow!("{} image(s) could not be read", unreadable));
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<ScanConfig> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::load_from(Some(path.as_path()))?,
        None => ScanConfig::load()?,
    };
    if let Some(conf) = args.conf {
        if !(0.0..=1.0).contains(&conf) {
            return Err(anyhow!("--conf must be within [0, 1]"));
        }
        config.confidence_threshold = conf;
    }
    if let Some(backend) = &args.backend {
        config.primary.backend = backend.parse()?;
    }
    if let Some(model) = &args.model {
        config.primary.model_path = model.clone();
    }
    Ok(config)
}

fn collect_images(args: &Args) -> Result<Vec<PathBuf>> {
    let mut images = args.images.clone();
    if let Some(dir) = &args.dir {
        let mut found = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
            let path = entry?.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false);
            if matches && path.is_file() {
                found.push(path);
            }
        }
        found.sort();
        images.extend(found);
    }
    Ok(images)
}

/// Each worker pulls the next unclaimed image; results keep input order.
fn scan_all(
    pipeline: &ResolutionPipeline,
    images: &[PathBuf],
    jobs: usize,
    ui: &Ui,
) -> Vec<DetectionResult> {
    let batch = ui.batch(images.len());
    let next = AtomicUsize::new(0);
    let slots: Vec<Mutex<Option<DetectionResult>>> =
        images.iter().map(|_| Mutex::new(None)).collect();

    std::thread::scope(|scope| {
        for _ in 0..jobs.min(images.len()) {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(path) = images.get(index) else {
                    break;
                };
                let result = pipeline.detect(path);
                batch.image_done(&display_name(path), &result.method, result.count);
                if let Ok(mut slot) = slots[index].lock() {
                    *slot = Some(result);
                }
            });
        }
    });

    slots
        .into_iter()
        .map(|slot| {
            slot.into_inner()
                .ok()
                .flatten()
                .unwrap_or_else(|| DetectionResult::failure("scan worker did not finish"))
        })
        .collect()
}

fn emit(path: &Path, result: &DetectionResult, output: Option<&Path>, total: usize) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    let Some(output) = output else {
        println!("{json}");
        return Ok(());
    };

    let target = if total == 1 && !output.is_dir() && output.extension().is_some() {
        output.to_path_buf()
    } else {
        fs::create_dir_all(output)
            .with_context(|| format!("failed to create {}", output.display()))?;
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        output.join(format!("detection_{}.json", stem))
    };
    fs::write(&target, json).with_context(|| format!("failed to write {}", target.display()))?;
    log::info!("wrote {}", target.display());
    Ok(())
}

fn print_summary(path: &Path, result: &DetectionResult) {
    if !result.success {
        eprintln!(
            "{}: failed: {}",
            display_name(path),
            result.error.as_deref().unwrap_or("unknown error")
        );
        return;
    }
    let model = result
        .model
        .as_deref()
        .map(|model| format!(" ({model})"))
        .unwrap_or_default();
    eprintln!(
        "{}: {} detection(s) via {}{}",
        display_name(path),
        result.count,
        result.method,
        model
    );
    for det in &result.detections {
        eprintln!(
            "  - {} {:.0}% [{}] {}{}",
            det.label.display_name(),
            det.confidence * 100.0,
            det.color,
            det.context,
            if det.forced { " (placeholder)" } else { "" }
        );
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
