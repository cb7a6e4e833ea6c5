#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Camera calibration files.
///
/// Read OpenCV-style intrinsics and distortion coefficients stored as JSON.
pub mod calibration;

/// Error types for I/O operations.
pub mod error;

/// High-level image reading and writing functions.
pub mod functional;

/// Frame sources feeding the reconstruction loop.
///
/// See [`source::open_frame_source`] to pick a source from a path.
pub mod source;

/// Scoped wall-clock timing.
pub mod trace;
