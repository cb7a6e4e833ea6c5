use rayon::prelude::*;
use voxcarve_image::{Image, ImageError};

/// Create a normalized 1D gaussian kernel.
///
/// # Arguments
///
/// * `kernel_size` - The number of taps; a size of zero is treated as one.
/// * `sigma` - The standard deviation. Values `<= 0` derive it from the kernel size the
///   way OpenCV does: `0.3 * ((kernel_size - 1) * 0.5 - 1) + 0.8`.
///
/// # Returns
///
/// A vector of the kernel taps summing to one.
pub fn gaussian_kernel_1d(kernel_size: usize, sigma: f32) -> Vec<f32> {
    let kernel_size = kernel_size.max(1);
    let mean = (kernel_size - 1) as f32 / 2.0;

    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * (mean - 1.0) + 0.8
    };
    let sigma_sq = sigma * sigma;

    let mut kernel = (0..kernel_size)
        .map(|i| {
            let x = i as f32 - mean;
            (-(x * x) / (2.0 * sigma_sq)).exp()
        })
        .collect::<Vec<_>>();

    let norm = kernel.iter().sum::<f32>();
    kernel.iter_mut().for_each(|k| *k /= norm);
    kernel
}

/// Apply a separable filter to an image.
///
/// The horizontal pass runs first into a temporary buffer, followed by the vertical pass.
/// Out of bounds taps replicate the nearest border pixel.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_x` - The horizontal kernel.
/// * `kernel_y` - The vertical kernel.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn separable_filter<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    kernel_x: &[f32],
    kernel_y: &[f32],
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let cols = src.cols();
    let rows = src.rows();
    if cols == 0 || rows == 0 {
        return Ok(());
    }

    let half_x = (kernel_x.len() / 2) as isize;
    let half_y = (kernel_y.len() / 2) as isize;
    let stride = cols * C;

    let mut temp = vec![0.0f32; src.as_slice().len()];

    // horizontal pass
    temp.par_chunks_exact_mut(stride)
        .zip(src.as_slice().par_chunks_exact(stride))
        .for_each(|(temp_row, src_row)| {
            for x in 0..cols {
                for c in 0..C {
                    let mut acc = 0.0;
                    for (k, w) in kernel_x.iter().enumerate() {
                        let xx = (x as isize + k as isize - half_x).clamp(0, cols as isize - 1);
                        acc += w * src_row[xx as usize * C + c];
                    }
                    temp_row[x * C + c] = acc;
                }
            }
        });

    // vertical pass
    dst.as_slice_mut()
        .par_chunks_exact_mut(stride)
        .enumerate()
        .for_each(|(y, dst_row)| {
            dst_row.iter_mut().for_each(|v| *v = 0.0);
            for (k, w) in kernel_y.iter().enumerate() {
                let yy = (y as isize + k as isize - half_y).clamp(0, rows as isize - 1);
                let temp_row = &temp[yy as usize * stride..(yy as usize + 1) * stride];
                dst_row
                    .iter_mut()
                    .zip(temp_row.iter())
                    .for_each(|(d, t)| *d += w * t);
            }
        });

    Ok(())
}

/// Blur an image using a gaussian blur filter
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_size` - The size of the kernel (kernel_x, kernel_y).
/// * `sigma` - The sigma of the gaussian kernel; `<= 0` derives it from the kernel size.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn gaussian_blur<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    kernel_size: (usize, usize),
    sigma: (f32, f32),
) -> Result<(), ImageError> {
    let kernel_x = gaussian_kernel_1d(kernel_size.0, sigma.0);
    let kernel_y = gaussian_kernel_1d(kernel_size.1, sigma.1);
    separable_filter(src, dst, &kernel_x, &kernel_y)?;
    Ok(())
}

/// Round to the nearest integer and saturate to `[0, 255]`.
#[inline]
pub(crate) fn saturate_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Blur an 8-bit image using a gaussian blur filter.
///
/// The filter runs in floating point; results are rounded and saturated back to 8 bits so
/// that a constant 255 region stays exactly 255.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn gaussian_blur_u8<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel_size: (usize, usize),
    sigma: (f32, f32),
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let src_f32 = src.cast::<f32>()?;
    let mut blurred = Image::<f32, C>::from_size_val(src.size(), 0.0)?;
    gaussian_blur(&src_f32, &mut blurred, kernel_size, sigma)?;

    dst.as_slice_mut()
        .par_iter_mut()
        .zip(blurred.as_slice().par_iter())
        .for_each(|(d, v)| *d = saturate_u8(*v));

    Ok(())
}
