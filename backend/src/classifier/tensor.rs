use crate::config::{ClassifierConfig, ResizeMethod};
use crate::normalizer::NormalizedImage;
use image::{RgbImage, imageops};
use ndarray::Array4;
use std::borrow::Cow;

/// Lays the image out as `[1, 3, side, side]`, scaled to [0,1] and standardized per channel.
pub fn image_to_array(image: &NormalizedImage, config: &ClassifierConfig) -> Array4<f32> {
    let rgb = fit_to_input(image.pixels(), config);

    let side = config.input_size as usize;
    Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        let value = rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
        (value - config.mean[c]) / config.std[c]
    })
}

fn fit_to_input<'a>(pixels: &'a RgbImage, config: &ClassifierConfig) -> Cow<'a, RgbImage> {
    let side = config.input_size;
    let (width, height) = pixels.dimensions();
    if width == side && height == side {
        return Cow::Borrowed(pixels);
    }

    let filter = config.resize_filter.into();
    match config.resize_method {
        ResizeMethod::Squish => Cow::Owned(imageops::resize(pixels, side, side, filter)),
        ResizeMethod::Crop => {
            let crop = width.min(height);
            let square =
                imageops::crop_imm(pixels, (width - crop) / 2, (height - crop) / 2, crop, crop)
                    .to_image();
            Cow::Owned(imageops::resize(&square, side, side, filter))
        }
    }
}
