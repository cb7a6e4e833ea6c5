#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// image representation for computer vision purposes.
pub mod image;

/// color frames with an explicit channel order.
pub mod color_spaces;

/// Error types for the image module.
pub mod error;

pub use crate::color_spaces::{ChannelOrder, ColorImage};
pub use crate::error::ImageError;
pub use crate::image::{Image, ImageSize};
