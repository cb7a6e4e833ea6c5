#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// color transformations module.
pub mod color;

/// image filtering module.
pub mod filter;

/// binary morphology on masks.
pub mod morphology;

/// module containing parallization utilities.
pub mod parallel;

/// foreground segmentation strategies producing silhouette masks.
pub mod segmentation;

/// operations to threshold images.
pub mod threshold;
