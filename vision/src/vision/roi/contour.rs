use opencv::{
    core::{add_weighted, convert_scale_abs, Mat, Point, Vector, BORDER_DEFAULT, CV_16S},
    imgproc::{
        approx_poly_dp, bounding_rect, canny_def, contour_area, find_contours_def, gaussian_blur_def, sobel,
        CHAIN_APPROX_SIMPLE, RETR_EXTERNAL,
    },
};
use serde::{Deserialize, Serialize};

use super::region::Region;
use crate::{error::Result, preprocess::to_grey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourParams {
    pub canny_low: f64,
    pub canny_high: f64,
    pub poly_epsilon: f64,
    /// Contours enclosing this many pixels or fewer are ignored.
    pub min_area: f64,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self {
            canny_low: 100.0,
            canny_high: 200.0,
            poly_epsilon: 3.0,
            min_area: 10.0,
        }
    }
}

/// Bounding box of every significant edge contour in `img`, in `img` coordinates.
///
/// Returns `None` when the image is too dark or too flat to yield a contour.
pub fn find_bounds(img: &Mat, params: &ContourParams) -> Result<Option<Region>> {
    let img_grey = to_grey(img)?;

    let mut img_blur = Mat::default();
    gaussian_blur_def(&img_grey, &mut img_blur, (3, 3).into(), 0.0)?;

    // Sobel gradient magnitude approximation
    let mut grad_x = Mat::default();
    sobel(&img_blur, &mut grad_x, CV_16S, 1, 0, 3, 1.0, 0.0, BORDER_DEFAULT)?;
    let mut grad_y = Mat::default();
    sobel(&img_blur, &mut grad_y, CV_16S, 0, 1, 3, 1.0, 0.0, BORDER_DEFAULT)?;
    let mut abs_grad_x = Mat::default();
    convert_scale_abs(&grad_x, &mut abs_grad_x, 1.0, 0.0)?;
    let mut abs_grad_y = Mat::default();
    convert_scale_abs(&grad_y, &mut abs_grad_y, 1.0, 0.0)?;
    let mut gradient = Mat::default();
    add_weighted(&abs_grad_x, 0.5, &abs_grad_y, 0.5, 0.0, &mut gradient, -1)?;

    let mut edges = Mat::default();
    canny_def(&gradient, &mut edges, params.canny_low, params.canny_high)?;

    let mut contours: Vector<Vector<Point>> = Vector::new();
    find_contours_def(&edges, &mut contours, RETR_EXTERNAL, CHAIN_APPROX_SIMPLE)?;

    let mut bounds: Option<Region> = None;
    for contour in contours.iter() {
        let mut poly: Vector<Point> = Vector::new();
        approx_poly_dp(&contour, &mut poly, params.poly_epsilon, true)?;
        if poly.len() < 2 || contour_area(&poly, false)? <= params.min_area {
            continue;
        }

        let area = Region::from_rect(bounding_rect(&poly)?);
        bounds = Some(match bounds {
            Some(b) => b.union(&area),
            None => area,
        });
    }

    if bounds.is_none() {
        log::debug!("No significant contours among {} candidates", contours.len());
    }

    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use opencv::{
        core::{Rect, Scalar, CV_8UC3},
        imgproc::{rectangle, LINE_8},
    };

    use super::*;

    #[test]
    fn black_frame_has_no_contours() {
        let frame = Mat::new_rows_cols_with_default(60, 80, CV_8UC3, Scalar::all(0.0)).unwrap();
        assert_eq!(find_bounds(&frame, &ContourParams::default()).unwrap(), None);
    }

    #[test]
    fn bright_block_is_bounded() {
        let mut frame = Mat::new_rows_cols_with_default(60, 80, CV_8UC3, Scalar::all(0.0)).unwrap();
        rectangle(&mut frame, Rect::new(20, 15, 30, 25), Scalar::all(255.0), -1, LINE_8, 0).unwrap();

        let bounds = find_bounds(&frame, &ContourParams::default()).unwrap().unwrap();
        assert!(bounds.min.x <= 20 && bounds.min.y <= 15, "{bounds:?}");
        assert!(bounds.max.x >= 50 && bounds.max.y >= 40, "{bounds:?}");
        assert!(bounds.width() < 80 && bounds.height() < 60, "{bounds:?}");
    }
}
