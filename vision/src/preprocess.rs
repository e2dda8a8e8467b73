use opencv::{
    core::{Mat, MatTraitConst, Size, CV_8UC1, CV_8UC3},
    imgproc::{cvt_color_def, resize, COLOR_BGR2GRAY, COLOR_GRAY2BGR, INTER_CUBIC},
};

use crate::error::{Error, Result};

pub fn to_grey(img: &Mat) -> Result<Mat> {
    let mut img_grey = Mat::default();
    match img.typ() {
        CV_8UC1 => {
            img_grey = img.try_clone()?;
        }
        CV_8UC3 => {
            cvt_color_def(img, &mut img_grey, COLOR_BGR2GRAY)?;
        }
        typ => {
            return Err(Error::InvalidInput(format!("image of unknown colour type {typ}")));
        }
    }

    Ok(img_grey)
}

pub fn to_bgr(img: &Mat) -> Result<Mat> {
    let mut img_bgr = Mat::default();
    match img.typ() {
        CV_8UC3 => {
            img_bgr = img.try_clone()?;
        }
        CV_8UC1 => {
            cvt_color_def(img, &mut img_bgr, COLOR_GRAY2BGR)?;
        }
        typ => {
            return Err(Error::InvalidInput(format!("image of unknown colour type {typ}")));
        }
    }

    Ok(img_bgr)
}

/// Cubic resize, skipped when the image already has the requested size.
pub fn resize_to(img: &Mat, size: Size) -> Result<Mat> {
    if img.size()? == size {
        return Ok(img.try_clone()?);
    }

    let mut resized = Mat::default();
    resize(img, &mut resized, size, 0.0, 0.0, INTER_CUBIC)?;

    Ok(resized)
}
