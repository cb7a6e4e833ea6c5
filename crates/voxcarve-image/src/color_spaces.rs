use crate::{
    error::ImageError,
    image::{Image, ImageSize},
};
use std::ops::Deref;

/// The memory order of the three channels of an 8-bit color image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    /// Red, green, blue.
    #[default]
    Rgb,
    /// Blue, green, red.
    Bgr,
}

/// An 8-bit, three channel color image that remembers its native channel order.
///
/// Decoders and capture devices disagree on whether pixels come as RGB or BGR; this
/// wrapper lets consumers read colors in a single canonical RGB order.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorImage {
    image: Image<u8, 3>,
    order: ChannelOrder,
}

impl ColorImage {
    /// Wrap an image whose pixels are stored in the given channel order.
    pub fn new(image: Image<u8, 3>, order: ChannelOrder) -> Self {
        Self { image, order }
    }

    /// Wrap an image whose pixels are stored in RGB order.
    pub fn from_rgb(image: Image<u8, 3>) -> Self {
        Self::new(image, ChannelOrder::Rgb)
    }

    /// Wrap an image whose pixels are stored in BGR order.
    pub fn from_bgr(image: Image<u8, 3>) -> Self {
        Self::new(image, ChannelOrder::Bgr)
    }

    /// Create a color image filled with a single RGB color.
    pub fn from_size_rgb(size: ImageSize, rgb: [u8; 3]) -> Result<Self, ImageError> {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(size.width * size.height * 3)
            .collect();
        Ok(Self::from_rgb(Image::new(size, data)?))
    }

    /// The native channel order of the underlying buffer.
    #[inline]
    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Read the pixel at `(x, y)` as `[red, green, blue]`, whatever the native order.
    #[inline]
    pub fn rgb(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        let px = self.image.pixel(x, y)?;
        Some(match self.order {
            ChannelOrder::Rgb => [px[0], px[1], px[2]],
            ChannelOrder::Bgr => [px[2], px[1], px[0]],
        })
    }

    /// Return a copy of the image converted to RGB channel order.
    pub fn to_rgb(&self) -> Result<Image<u8, 3>, ImageError> {
        match self.order {
            ChannelOrder::Rgb => Ok(self.image.clone()),
            ChannelOrder::Bgr => {
                let data = self
                    .image
                    .as_slice()
                    .chunks_exact(3)
                    .flat_map(|px| [px[2], px[1], px[0]])
                    .collect();
                Image::new(self.image.size(), data)
            }
        }
    }
}

impl Deref for ColorImage {
    type Target = Image<u8, 3>;
    fn deref(&self) -> &Self::Target {
        &self.image
    }
}

impl AsRef<Image<u8, 3>> for ColorImage {
    fn as_ref(&self) -> &Image<u8, 3> {
        &self.image
    }
}
