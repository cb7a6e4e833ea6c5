#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Marker detection collaborators.
pub mod detector;

/// Error types for the marker module.
pub mod error;

/// Canonical pose resolution across several markers.
pub mod fusion;

/// Per-frame marker observations.
pub mod observation;

pub use detector::{MarkerDetector, RecordedMarkerDetector};
pub use error::MarkerError;
pub use fusion::{CanonicalPose, PoseFusion};
pub use observation::{MarkerId, MarkerObservation};
