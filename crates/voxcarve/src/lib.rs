#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Frame-by-frame reconstruction and mesh export.
pub mod pipeline;

#[doc(inline)]
pub use voxcarve_3d as v3d;

#[doc(inline)]
pub use voxcarve_image as image;

#[doc(inline)]
pub use voxcarve_imgproc as imgproc;

#[doc(inline)]
pub use voxcarve_io as io;

#[doc(inline)]
pub use voxcarve_marker as marker;
