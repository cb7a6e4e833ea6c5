use std::path::Path;

use voxcarve_image::{ColorImage, Image, ImageSize};

use crate::error::IoError;

const SUPPORTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Whether the path has one of the image extensions the frame sources accept.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// Reads an RGB8 image from the given file path.
///
/// PNG and JPEG files are accepted. Grayscale and RGBA images are converted to RGB.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// A color image in RGB channel order.
pub fn read_image_rgb8(file_path: impl AsRef<Path>) -> Result<ColorImage, IoError> {
    let file_path = file_path.as_ref().to_owned();

    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path));
    }

    if !is_supported_image(&file_path) {
        return Err(IoError::InvalidFileExtension(file_path));
    }

    let img = image::open(&file_path)?.into_rgb8();
    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };

    let image = Image::new(size, img.into_raw())?;

    Ok(ColorImage::from_rgb(image))
}

/// Writes a color image to a PNG file.
///
/// The pixels are written in RGB order whatever the native order of the image.
pub fn write_image_png_rgb8(
    file_path: impl AsRef<Path>,
    image: &ColorImage,
) -> Result<(), IoError> {
    let rgb = image.to_rgb()?;
    image::save_buffer_with_format(
        file_path,
        rgb.as_slice(),
        rgb.width() as u32,
        rgb.height() as u32,
        image::ColorType::Rgb8,
        image::ImageFormat::Png,
    )?;
    Ok(())
}

/// Writes a single channel mask to a PNG file.
pub fn write_image_png_mono8(
    file_path: impl AsRef<Path>,
    image: &Image<u8, 1>,
) -> Result<(), IoError> {
    image::save_buffer_with_format(
        file_path,
        image.as_slice(),
        image.width() as u32,
        image.height() as u32,
        image::ColorType::L8,
        image::ImageFormat::Png,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxcarve_image::ChannelOrder;

    #[test]
    fn read_write_png_rgb8() -> Result<(), IoError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("frame.png");

        let image = Image::<u8, 3>::new([2, 1].into(), vec![1, 2, 3, 4, 5, 6])?;
        write_image_png_rgb8(&path, &ColorImage::from_bgr(image))?;

        let read = read_image_rgb8(&path)?;
        assert_eq!(read.order(), ChannelOrder::Rgb);
        assert_eq!(read.size(), [2, 1].into());
        assert_eq!(read.as_slice(), &[3, 2, 1, 6, 5, 4]);

        Ok(())
    }

    #[test]
    fn read_gray_png_as_rgb() -> Result<(), IoError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mask.png");

        let mask = Image::<u8, 1>::new([2, 1].into(), vec![0, 255])?;
        write_image_png_mono8(&path, &mask)?;

        let read = read_image_rgb8(&path)?;
        assert_eq!(read.rgb(1, 0), Some([255, 255, 255]));

        Ok(())
    }

    #[test]
    fn read_invalid_paths() -> Result<(), IoError> {
        let dir = tempfile::tempdir()?;

        let missing = dir.path().join("missing.png");
        assert!(matches!(
            read_image_rgb8(&missing),
            Err(IoError::FileDoesNotExist(_))
        ));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "not an image")?;
        assert!(matches!(
            read_image_rgb8(&text),
            Err(IoError::InvalidFileExtension(_))
        ));

        Ok(())
    }
}
