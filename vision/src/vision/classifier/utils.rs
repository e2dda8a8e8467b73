use opencv::{core::Size, prelude::*};

use super::TensorConfig;
use crate::{
    error::Result,
    preprocess::{resize_to, to_bgr},
    vision::roi::region::Region,
};

/// Crops `region` out of `frame`, resizes it to the tensor size and flattens it
/// channel interleaved (BGR per pixel, row major) into the configured value range.
pub fn pack_tensor(frame: &Mat, region: &Region, config: &TensorConfig) -> Result<Vec<f32>> {
    let size = frame.size()?;
    let region = region.clamped_or_full(size.width, size.height);

    let cropped = Mat::roi(frame, region.to_rect())?.try_clone()?;
    let resized = resize_to(&cropped, Size::new(config.width, config.height))?;
    let bgr = to_bgr(&resized)?;

    let scale = (config.scale_max - config.scale_min) / 255.0;
    let tensor = bgr
        .data_bytes()?
        .iter()
        .map(|c| config.scale_min + scale * *c as f32)
        .collect();

    Ok(tensor)
}
