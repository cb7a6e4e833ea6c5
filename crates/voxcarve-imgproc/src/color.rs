use crate::{filter, parallel};
use voxcarve_image::{Image, ImageError};

/// Define the RGB weights for the grayscale conversion.
const RW: f32 = 0.299;
const GW: f32 = 0.587;
const BW: f32 = 0.114;

/// Convert an RGB image to an HSV image.
///
/// The output follows the 8-bit OpenCV convention so that hue thresholds written
/// for it can be reused directly.
///
/// # Arguments
///
/// * `src` - The input RGB image with values in [0, 255].
/// * `dst` - The output HSV image.
///
/// # Returns
///
/// The HSV image with the following channels:
///
/// * H: The hue channel in the range [0, 180) (half degrees).
/// * S: The saturation channel in the range [0, 255].
/// * V: The value channel in the range [0, 255].
///
/// Precondition: the input and output images must have the same size.
///
/// # Example
///
/// ```
/// use voxcarve_image::{Image, ImageSize};
/// use voxcarve_imgproc::color::hsv_from_rgb;
///
/// let image = Image::<f32, 3>::new(
///     ImageSize {
///        width: 1,
///        height: 1,
///     },
///     vec![0.0, 255.0, 0.0],
/// )
/// .unwrap();
///
/// let mut hsv = Image::<f32, 3>::from_size_val(image.size(), 0.0).unwrap();
///
/// hsv_from_rgb(&image, &mut hsv).unwrap();
///
/// assert_eq!(hsv.as_slice(), &[60.0, 255.0, 255.0]);
/// ```
pub fn hsv_from_rgb(src: &Image<f32, 3>, dst: &mut Image<f32, 3>) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        let [h, s, v] = hsv_pixel(src_pixel[0], src_pixel[1], src_pixel[2]);
        dst_pixel[0] = h;
        dst_pixel[1] = s;
        dst_pixel[2] = v;
    });

    Ok(())
}

/// Convert an 8-bit RGB image to an 8-bit HSV image.
///
/// Same channel layout as [`hsv_from_rgb`], rounded and saturated to `u8` the way
/// OpenCV stores 8-bit HSV frames.
///
/// Precondition: the input and output images must have the same size.
pub fn hsv_from_rgb_u8(src: &Image<u8, 3>, dst: &mut Image<u8, 3>) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        let hsv = hsv_pixel(
            src_pixel[0] as f32,
            src_pixel[1] as f32,
            src_pixel[2] as f32,
        );
        // hue 179.5 and above wraps back to red
        dst_pixel[0] = filter::saturate_u8(hsv[0]) % 180;
        dst_pixel[1] = filter::saturate_u8(hsv[1]);
        dst_pixel[2] = filter::saturate_u8(hsv[2]);
    });

    Ok(())
}

fn hsv_pixel(r: f32, g: f32, b: f32) -> [f32; 3] {
    let r = r / 255.;
    let g = g / 255.;
    let b = b / 255.;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * (((b - r) / delta) + 2.0)
    } else {
        60.0 * (((r - g) / delta) + 4.0)
    };

    // wrap to [0, 360)
    let h = if h < 0.0 { h + 360.0 } else { h };

    let s = if max == 0.0 {
        0.0
    } else {
        (delta / max) * 255.0
    };

    [h / 2.0, s, max * 255.0]
}

/// Convert an RGB image to grayscale using the formula:
///
/// Y = 0.299 * R + 0.587 * G + 0.114 * B
///
/// Precondition: the input and output images must have the same size.
pub fn gray_from_rgb(src: &Image<f32, 3>, dst: &mut Image<f32, 1>) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        dst_pixel[0] = RW * src_pixel[0] + GW * src_pixel[1] + BW * src_pixel[2];
    });

    Ok(())
}

/// Compute the per-channel absolute difference of two 8-bit images.
///
/// # Arguments
///
/// * `src1` - The first image.
/// * `src2` - The second image.
/// * `dst` - The output image with `|src1 - src2|` per element.
///
/// Precondition: all three images must have the same size.
pub fn abs_diff<const C: usize>(
    src1: &Image<u8, C>,
    src2: &Image<u8, C>,
    dst: &mut Image<u8, C>,
) -> Result<(), ImageError> {
    if src1.size() != src2.size() {
        return Err(ImageError::InvalidImageSize(
            src1.cols(),
            src1.rows(),
            src2.cols(),
            src2.rows(),
        ));
    }
    if src1.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src1.cols(),
            src1.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows_two(src1, src2, dst, |a, b, d| {
        for ((d, &a), &b) in d.iter_mut().zip(a).zip(b) {
            *d = a.abs_diff(b);
        }
    });

    Ok(())
}
