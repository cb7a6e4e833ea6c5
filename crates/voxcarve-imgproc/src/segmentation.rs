//! Foreground segmentation.
//!
//! Every strategy turns a color frame into a same-size single channel mask where
//! non-zero pixels belong to the object being carved.

use voxcarve_image::{ColorImage, Image, ImageError, ImageSize};

use crate::{
    color, filter,
    morphology::{self, Kernel, MorphShape, MorphologyError},
    threshold,
};

/// Errors produced by segmentation strategies.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SegmentationError {
    /// The frame does not have the size of the reference frame.
    #[error("Frame size {frame} does not match the reference size {reference}")]
    SizeMismatch {
        /// Size of the incoming frame.
        frame: ImageSize,
        /// Size the strategy was configured with.
        reference: ImageSize,
    },

    /// A filter size was zero or even.
    #[error("Filter size {0} must be odd and non-zero")]
    InvalidFilterSize(usize),

    /// Image buffer error.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Morphology error.
    #[error(transparent)]
    Morphology(#[from] MorphologyError),
}

/// A foreground segmentation strategy.
pub trait Segmentation {
    /// Segment a frame, returning the foreground mask (255 = object, 0 = background).
    fn update(&mut self, frame: &ColorImage) -> Result<&Image<u8, 1>, SegmentationError>;
}

fn check_filter_size(size: usize) -> Result<usize, SegmentationError> {
    if size == 0 || size % 2 == 0 {
        return Err(SegmentationError::InvalidFilterSize(size));
    }
    Ok(size)
}

/// Backdrop colors with predefined HSV ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaKey {
    /// Green screen.
    Green,
    /// Blue screen.
    Blue,
    /// White, unsaturated backdrop.
    White,
}

impl ChromaKey {
    /// Inclusive HSV bounds of the backdrop, H in [0, 180), S and V in [0, 255].
    pub fn bounds(&self) -> ([u8; 3], [u8; 3]) {
        match self {
            ChromaKey::Green => ([50, 120, 180], [70, 255, 255]),
            ChromaKey::Blue => ([90, 80, 100], [130, 255, 255]),
            ChromaKey::White => ([0, 0, 180], [255, 25, 255]),
        }
    }
}

/// Segments the object by removing a uniformly colored backdrop.
///
/// The frame is converted to HSV and blurred, pixels inside the backdrop range are
/// rejected and the remaining mask is closed with an elliptical element.
#[derive(Debug, Clone)]
pub struct ChromaKeySegmentation {
    lower: [u8; 3],
    upper: [u8; 3],
    blur_size: usize,
    close_size: usize,
    mask: Image<u8, 1>,
}

impl ChromaKeySegmentation {
    /// Create a segmentation removing pixels whose HSV value lies in `[lower, upper]`.
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self {
            lower,
            upper,
            blur_size: 11,
            close_size: 11,
            mask: Image::default(),
        }
    }

    /// Create a segmentation for one of the predefined backdrops.
    pub fn from_key(key: ChromaKey) -> Self {
        let (lower, upper) = key.bounds();
        Self::new(lower, upper)
    }

    /// Green screen preset.
    pub fn green() -> Self {
        Self::from_key(ChromaKey::Green)
    }

    /// Blue screen preset.
    pub fn blue() -> Self {
        Self::from_key(ChromaKey::Blue)
    }

    /// White backdrop preset.
    pub fn white() -> Self {
        Self::from_key(ChromaKey::White)
    }

    /// Set the size of the gaussian blur applied to the HSV frame.
    pub fn with_blur_size(mut self, size: usize) -> Result<Self, SegmentationError> {
        self.blur_size = check_filter_size(size)?;
        Ok(self)
    }

    /// Set the size of the elliptical element used to close the mask.
    pub fn with_close_size(mut self, size: usize) -> Result<Self, SegmentationError> {
        self.close_size = check_filter_size(size)?;
        Ok(self)
    }
}

impl Segmentation for ChromaKeySegmentation {
    fn update(&mut self, frame: &ColorImage) -> Result<&Image<u8, 1>, SegmentationError> {
        let rgb = frame.to_rgb()?;

        let mut hsv = Image::<u8, 3>::from_size_val(rgb.size(), 0)?;
        color::hsv_from_rgb_u8(&rgb, &mut hsv)?;

        let mut blurred = Image::<u8, 3>::from_size_val(rgb.size(), 0)?;
        filter::gaussian_blur_u8(
            &hsv,
            &mut blurred,
            (self.blur_size, self.blur_size),
            (0.0, 0.0),
        )?;

        let mut backdrop = Image::<u8, 1>::from_size_val(rgb.size(), 0)?;
        threshold::in_range(&blurred, &mut backdrop, &self.lower, &self.upper)?;
        threshold::bitwise_not(&mut backdrop);

        let kernel = Kernel::new(MorphShape::Ellipse, (self.close_size, self.close_size))?;
        let mut mask = Image::<u8, 1>::from_size_val(rgb.size(), 0)?;
        morphology::close(&backdrop, &mut mask, &kernel)?;

        self.mask = mask;
        Ok(&self.mask)
    }
}

/// Segments the object by differencing each frame against an empty "clean plate" shot.
#[derive(Debug, Clone)]
pub struct CleanPlateSegmentation {
    plate: Image<u8, 3>,
    blur_size: usize,
    threshold: f32,
    mask: Image<u8, 1>,
}

impl CleanPlateSegmentation {
    /// Create a segmentation against the given background frame.
    pub fn new(plate: &ColorImage) -> Result<Self, SegmentationError> {
        Ok(Self {
            plate: plate.to_rgb()?,
            blur_size: 121,
            threshold: 35.0,
            mask: Image::default(),
        })
    }

    /// Set the size of the gaussian blur applied to the difference image.
    pub fn with_blur_size(mut self, size: usize) -> Result<Self, SegmentationError> {
        self.blur_size = check_filter_size(size)?;
        Ok(self)
    }

    /// Set the gray level above which a difference counts as foreground.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Segmentation for CleanPlateSegmentation {
    fn update(&mut self, frame: &ColorImage) -> Result<&Image<u8, 1>, SegmentationError> {
        if frame.size() != self.plate.size() {
            return Err(SegmentationError::SizeMismatch {
                frame: frame.size(),
                reference: self.plate.size(),
            });
        }

        let rgb = frame.to_rgb()?;
        let mut diff = Image::<u8, 3>::from_size_val(rgb.size(), 0)?;
        color::abs_diff(&rgb, &self.plate, &mut diff)?;

        let mut gray = Image::<f32, 1>::from_size_val(rgb.size(), 0.0)?;
        color::gray_from_rgb(&diff.cast::<f32>()?, &mut gray)?;

        let mut blurred = Image::<f32, 1>::from_size_val(rgb.size(), 0.0)?;
        filter::gaussian_blur(
            &gray,
            &mut blurred,
            (self.blur_size, self.blur_size),
            (0.0, 0.0),
        )?;

        let mut mask = Image::<u8, 1>::from_size_val(rgb.size(), 0)?;
        threshold::threshold_binary(&blurred, &mut mask, self.threshold, 255u8)?;

        self.mask = mask;
        Ok(&self.mask)
    }
}
