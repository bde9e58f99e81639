pub mod stub;
pub mod subprocess;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubBackend;
pub use subprocess::{SubprocessBackend, SubprocessConfig};

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
