use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use shared::NormalizeOptions;
use std::borrow::Cow;
use std::io::Cursor;

const PREVIEW_QUALITY: u8 = 85;
/// Longest side of the preview JPEG; JPEG itself caps sides at 65535.
pub const PREVIEW_MAX_SIDE: u32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Image input is empty")]
    Empty,
    #[error("Unrecognized image format")]
    UnknownFormat,
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

/// Upright RGB bitmap ready for the classifier.
///
/// Only [`normalize`] builds one, so holding a value means the EXIF orientation
/// has already been applied and the pixels are 3-channel.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pixels: RgbImage,
}

impl NormalizedImage {
    #[cfg(test)]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[cfg(test)]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Downscaled copy bounded by [`PREVIEW_MAX_SIDE`], aspect ratio kept.
    fn preview_pixels(&self) -> Cow<'_, RgbImage> {
        let (width, height) = self.pixels.dimensions();
        let longest = width.max(height);
        if longest <= PREVIEW_MAX_SIDE {
            return Cow::Borrowed(&self.pixels);
        }
        let scale = |side: u32| {
            ((u64::from(side) * u64::from(PREVIEW_MAX_SIDE)) / u64::from(longest)).max(1) as u32
        };
        Cow::Owned(imageops::thumbnail(&self.pixels, scale(width), scale(height)))
    }

    pub fn to_jpeg(&self) -> Result<Vec<u8>, DecodeError> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, PREVIEW_QUALITY);
        self.preview_pixels().write_with_encoder(encoder)?;
        Ok(buffer)
    }

    pub fn to_data_url(&self) -> Result<String, DecodeError> {
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(self.to_jpeg()?)))
    }

    #[cfg(test)]
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }
}

pub fn normalize(bytes: &[u8], options: &NormalizeOptions) -> Result<NormalizedImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    if reader.format().is_none() {
        return Err(DecodeError::UnknownFormat);
    }

    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);

    let mut pixels = image.into_rgb8();

    // Stretches to a square; aspect ratio is not kept.
    if options.resize_enabled {
        let side = options.target_size;
        pixels = imageops::resize(&pixels, side, side, FilterType::CatmullRom);
    }

    log::debug!(
        "Normalized image to {}x{} (orientation {:?})",
        pixels.width(),
        pixels.height(),
        orientation
    );

    Ok(NormalizedImage { pixels })
}
