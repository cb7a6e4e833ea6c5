use num_traits::Zero;
use std::cmp::PartialOrd;

use voxcarve_image::{Image, ImageError};

use crate::parallel;

/// Apply a binary threshold to an image.
///
/// The destination element type may differ from the source, which lets a float
/// response be turned straight into an 8-bit mask.
///
/// # Arguments
///
/// * `src` - The input image of an arbitrary number of channels and type.
/// * `dst` - The output image with the same number of channels.
/// * `threshold` - The threshold value. Must be the same type as the input image.
/// * `max_value` - The value written when the input value is greater than the threshold.
///
/// # Examples
///
/// ```
/// use voxcarve_image::{Image, ImageSize};
/// use voxcarve_imgproc::threshold::threshold_binary;
///
/// let data = vec![100u8, 200, 50, 150, 200, 250];
/// let image = Image::<_, 1>::new(ImageSize { width: 2, height: 3 }, data).unwrap();
///
/// let mut thresholded = Image::<u8, 1>::from_size_val(image.size(), 0).unwrap();
///
/// threshold_binary(&image, &mut thresholded, 100, 255).unwrap();
/// assert_eq!(thresholded.as_slice(), &[0, 255, 0, 255, 255, 255]);
/// ```
pub fn threshold_binary<T, U, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<U, C>,
    threshold: T,
    max_value: U,
) -> Result<(), ImageError>
where
    T: Copy + Send + Sync + PartialOrd,
    U: Copy + Send + Sync + Zero,
{
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows_val(src, dst, |src_pixel, dst_pixel| {
        *dst_pixel = if *src_pixel > threshold {
            max_value
        } else {
            U::zero()
        };
    });

    Ok(())
}

/// Check which pixels of an image fall within per-channel bounds.
///
/// # Arguments
///
/// * `src` - The input image of an arbitrary number of channels and type.
/// * `dst` - The output mask, 255 where every channel lies in `[lower, upper]`, 0 otherwise.
/// * `lower_bound` - The inclusive lower bound of each channel.
/// * `upper_bound` - The inclusive upper bound of each channel.
///
/// # Examples
///
/// ```
/// use voxcarve_image::{Image, ImageSize};
/// use voxcarve_imgproc::threshold::in_range;
///
/// let data = vec![100u8, 200, 50, 150, 200, 250];
///
/// let image = Image::<u8, 3>::new(
///    ImageSize {
///       width: 2,
///       height: 1,
///    },
///    data,
/// )
/// .unwrap();
///
/// let mut thresholded = Image::<u8, 1>::from_size_val(image.size(), 0).unwrap();
///
/// in_range(&image, &mut thresholded, &[100, 150, 0], &[200, 200, 200]).unwrap();
/// assert_eq!(thresholded.as_slice(), &[255, 0]);
/// ```
pub fn in_range<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<u8, 1>,
    lower_bound: &[T; C],
    upper_bound: &[T; C],
) -> Result<(), ImageError>
where
    T: Clone + Send + Sync + PartialOrd,
{
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        let is_in_range = src_pixel
            .iter()
            .zip(lower_bound.iter().zip(upper_bound.iter()))
            .all(|(v, (lower, upper))| v >= lower && v <= upper);
        dst_pixel[0] = if is_in_range { 255 } else { 0 };
    });

    Ok(())
}

/// Invert an 8-bit image in place (`255 - v`).
pub fn bitwise_not<const C: usize>(img: &mut Image<u8, C>) {
    parallel::par_for_each_row(img, |_, row| {
        row.iter_mut().for_each(|v| *v = !*v);
    });
}

#[cfg(test)]
mod tests {
    use voxcarve_image::{Image, ImageError, ImageSize};

    #[test]
    fn threshold_binary_float_to_mask() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::new([4, 1].into(), vec![0.0, 35.0, 35.5, 200.0])?;
        let mut mask = Image::<u8, 1>::from_size_val(image.size(), 7)?;
        super::threshold_binary(&image, &mut mask, 35.0, 255)?;
        assert_eq!(mask.as_slice(), &[0, 0, 255, 255]);
        Ok(())
    }

    #[test]
    fn in_range_bounds_are_inclusive() -> Result<(), ImageError> {
        let image = Image::<f32, 3>::new(
            ImageSize {
                width: 3,
                height: 1,
            },
            vec![50.0, 120.0, 180.0, 70.0, 255.0, 255.0, 71.0, 200.0, 200.0],
        )?;
        let mut mask = Image::<u8, 1>::from_size_val(image.size(), 0)?;
        super::in_range(&image, &mut mask, &[50.0, 120.0, 180.0], &[70.0, 255.0, 255.0])?;
        assert_eq!(mask.as_slice(), &[255, 255, 0]);
        Ok(())
    }

    #[test]
    fn bitwise_not() -> Result<(), ImageError> {
        let mut image = Image::<u8, 1>::new([3, 1].into(), vec![0, 255, 10])?;
        super::bitwise_not(&mut image);
        assert_eq!(image.as_slice(), &[255, 0, 245]);
        Ok(())
    }

    #[test]
    fn size_mismatch_is_an_error() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::from_size_val([2, 2].into(), 0)?;
        let mut mask = Image::<u8, 1>::from_size_val([3, 2].into(), 0)?;
        assert!(super::threshold_binary(&image, &mut mask, 1, 255).is_err());
        Ok(())
    }
}
