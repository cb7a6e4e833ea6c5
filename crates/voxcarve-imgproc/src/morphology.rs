use rayon::prelude::*;
use voxcarve_image::{Image, ImageError};

/// Errors related to morphological operations.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MorphologyError {
    /// The kernel must have odd, non-zero dimensions.
    #[error("Kernel size ({0}x{1}) must be odd and non-zero")]
    InvalidKernelSize(usize, usize),

    /// Image size or allocation error.
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Shape of a structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphShape {
    /// Every element active.
    Rect,
    /// Ellipse inscribed in the kernel rectangle.
    Ellipse,
    /// Center row and center column.
    Cross,
}

/// A binary structuring element anchored at its center.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    rows: usize,
    cols: usize,
    data: Vec<bool>,
}

impl Kernel {
    /// Create a structuring element of the given shape and size `(rows, cols)`.
    pub fn new(shape: MorphShape, ksize: (usize, usize)) -> Result<Self, MorphologyError> {
        let (rows, cols) = ksize;
        if rows == 0 || cols == 0 || rows % 2 == 0 || cols % 2 == 0 {
            return Err(MorphologyError::InvalidKernelSize(rows, cols));
        }

        let cy = rows / 2;
        let cx = cols / 2;
        let mut data = vec![false; rows * cols];
        for r in 0..rows {
            for c in 0..cols {
                data[r * cols + c] = match shape {
                    MorphShape::Rect => true,
                    MorphShape::Cross => r == cy || c == cx,
                    MorphShape::Ellipse => {
                        let dy = (r as f64 - cy as f64) / (rows as f64 / 2.0);
                        let dx = (c as f64 - cx as f64) / (cols as f64 / 2.0);
                        dx * dx + dy * dy <= 1.0
                    }
                };
            }
        }

        Ok(Self { rows, cols, data })
    }

    /// Offsets `(dy, dx)` of the active elements relative to the anchor.
    fn offsets(&self) -> Vec<(isize, isize)> {
        let cy = (self.rows / 2) as isize;
        let cx = (self.cols / 2) as isize;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, active)| **active)
            .map(|(idx, _)| {
                (
                    (idx / self.cols) as isize - cy,
                    (idx % self.cols) as isize - cx,
                )
            })
            .collect()
    }
}

/// Rank filter over the active kernel elements; out of bounds pixels are ignored.
fn rank_filter(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    kernel: &Kernel,
    init: u8,
    pick: fn(u8, u8) -> u8,
) -> Result<(), MorphologyError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        )
        .into());
    }

    let cols = src.cols() as isize;
    let rows = src.rows() as isize;
    if cols == 0 || rows == 0 {
        return Ok(());
    }

    let offsets = kernel.offsets();
    let src_data = src.as_slice();

    dst.as_slice_mut()
        .par_chunks_exact_mut(cols as usize)
        .enumerate()
        .for_each(|(y, dst_row)| {
            for (x, out) in dst_row.iter_mut().enumerate() {
                let mut acc = init;
                for &(dy, dx) in offsets.iter() {
                    let yy = y as isize + dy;
                    let xx = x as isize + dx;
                    if yy < 0 || yy >= rows || xx < 0 || xx >= cols {
                        continue;
                    }
                    acc = pick(acc, src_data[(yy * cols + xx) as usize]);
                }
                *out = acc;
            }
        });

    Ok(())
}

/// Dilate a single channel image with the given structuring element.
pub fn dilate(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    kernel: &Kernel,
) -> Result<(), MorphologyError> {
    rank_filter(src, dst, kernel, u8::MIN, u8::max)
}

/// Erode a single channel image with the given structuring element.
pub fn erode(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    kernel: &Kernel,
) -> Result<(), MorphologyError> {
    rank_filter(src, dst, kernel, u8::MAX, u8::min)
}

/// Morphological closing: dilation followed by erosion.
///
/// Closing fills holes and gaps in a mask that are smaller than the structuring element.
pub fn close(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    kernel: &Kernel,
) -> Result<(), MorphologyError> {
    let mut dilated = Image::<u8, 1>::from_size_val(src.size(), 0)?;
    dilate(src, &mut dilated, kernel)?;
    erode(&dilated, dst, kernel)
}
