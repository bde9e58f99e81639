//! Station Scan
//!
//! Detects three safety-critical object categories (toolbox, fire extinguisher,
//! oxygen tank) in still images of a space-station interior.
//!
//! # Architecture
//!
//! Every image is resolved by a tiered pipeline that always produces a result:
//!
//! 1. **Primary detector**: a general-purpose object detector (tract ONNX model
//!    or an external detector process). Its vocabulary is remapped onto the
//!    three target categories; anything that does not map is dropped.
//! 2. **Heuristics**: color-band and edge-shape analysis, used when the primary
//!    detector is missing, fails, or yields nothing that maps.
//! 3. **Synthetic fallback**: a fixed placeholder set, one per category, flagged
//!    as forced.
//!
//! Only an unreadable image makes a result unsuccessful.
//!
//! # Module Structure
//!
//! - `category`, `mapping`, `annotate`: target vocabulary, remapping, display metadata
//! - `detect`: primary detector backends, registry, and the result envelope
//! - `heuristic`: model-free color and edge passes
//! - `synthetic`: deterministic placeholder detections
//! - `ingest`: image loading
//! - `pipeline`: the resolution state machine
//! - `config`, `ui`: runtime configuration and terminal feedback

pub mod annotate;
pub mod category;
pub mod config;
pub mod detect;
pub mod heuristic;
pub mod ingest;
pub mod mapping;
pub mod pipeline;
pub mod synthetic;
pub mod ui;

pub use annotate::{annotate, annotate_label, Annotation};
pub use category::TargetCategory;
pub use config::{BackendKind, PrimarySettings, ScanConfig};
pub use detect::{
    BackendRegistry, BoundingBox, Detection, DetectionResult, DetectorBackend, Origin,
    PrimaryInput, RawBox, RawDetection, RawDetections,
};
pub use heuristic::{HeuristicConfig, HeuristicDetector};
pub use ingest::{FileImageSource, ImageSource, ImageUnreadable};
pub use mapping::{CategoryMapping, Mapped, MatchRule};
pub use pipeline::{Resolution, ResolutionPipeline, Stage, StageOutcome};
pub use synthetic::synthetic_detections;
