mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{DetectorBackend, PrimaryInput};
pub use backends::{StubBackend, SubprocessBackend, SubprocessConfig};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::BackendRegistry;
pub use result::{
    BoundingBox, Detection, DetectionResult, Origin, RawBox, RawDetection, RawDetections,
};
