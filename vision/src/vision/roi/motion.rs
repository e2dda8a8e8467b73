use nalgebra::{DMatrix, Vector2};
use opencv::{
    core::{Mat, Scalar, Vec3b, CV_8UC3},
    imgproc::{cvt_color_def, COLOR_HSV2BGR},
    prelude::*,
    video::calc_optical_flow_farneback,
};
use serde::{Deserialize, Serialize};

use crate::{error::Result, utils::flow_to_dmatrix};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowParams {
    pub pyr_scale: f64,
    pub levels: i32,
    pub winsize: i32,
    pub iterations: i32,
    pub poly_n: i32,
    pub poly_sigma: f64,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 3,
            winsize: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.2,
        }
    }
}

/// Dense per-pixel motion, `x` is the direction in degrees and `y` the magnitude.
pub struct MotionField {
    field: DMatrix<Vector2<f32>>,
}

impl MotionField {
    /// Farneback flow between two greyscale frames of the same size.
    pub fn compute(prev_grey: &Mat, cur_grey: &Mat, params: &FlowParams) -> Result<Self> {
        let mut flow = Mat::default();
        calc_optical_flow_farneback(
            prev_grey,
            cur_grey,
            &mut flow,
            params.pyr_scale,
            params.levels,
            params.winsize,
            params.iterations,
            params.poly_n,
            params.poly_sigma,
            0,
        )?;

        Ok(Self {
            field: flow_to_dmatrix(&flow)?,
        })
    }

    pub fn from_field(field: DMatrix<Vector2<f32>>) -> Self {
        Self { field }
    }

    pub fn field(&self) -> &DMatrix<Vector2<f32>> {
        &self.field
    }

    pub fn max_magnitude(&self) -> f32 {
        self.field.iter().fold(0.0, |m, v| m.max(v.y))
    }

    /// Visualises the field as an HSV image: hue is half the angle, saturation is full and
    /// value is the min-max normalised magnitude.
    pub fn render_hsv(&self) -> Result<Mat> {
        let (min, max) = self
            .field
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v.y), hi.max(v.y)));
        let range = if max > min { max - min } else { 1.0 };

        let mut hsv = Mat::new_rows_cols_with_default(
            self.field.nrows() as i32,
            self.field.ncols() as i32,
            CV_8UC3,
            Scalar::all(0.0),
        )?;
        for r in 0..self.field.nrows() {
            for c in 0..self.field.ncols() {
                let v = self.field[(r, c)];
                let hue = (v.x / 2.0).round().clamp(0.0, 180.0) as u8;
                let value = ((v.y - min) / range * 255.0).round().clamp(0.0, 255.0) as u8;
                *hsv.at_2d_mut::<Vec3b>(r as i32, c as i32)? = Vec3b::from([hue, 255, value]);
            }
        }

        Ok(hsv)
    }

    pub fn render_bgr(hsv: &Mat) -> Result<Mat> {
        let mut bgr = Mat::default();
        cvt_color_def(hsv, &mut bgr, COLOR_HSV2BGR)?;

        Ok(bgr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::colored_mat_to_dmatrix;

    #[test]
    fn rendering_maps_angle_to_hue_and_magnitude_to_value() {
        let field = DMatrix::from_row_slice(
            1,
            3,
            &[Vector2::new(0.0, 0.0), Vector2::new(90.0, 1.0), Vector2::new(300.0, 2.0)],
        );
        let hsv = MotionField::from_field(field).render_hsv().unwrap();
        let pixels = colored_mat_to_dmatrix(&hsv).unwrap();

        assert_eq!(pixels[(0, 0)].as_slice(), &[0, 255, 0]);
        assert_eq!(pixels[(0, 1)].as_slice(), &[45, 255, 128]);
        assert_eq!(pixels[(0, 2)].as_slice(), &[150, 255, 255]);
    }

    #[test]
    fn still_frames_have_no_motion() {
        let frame = Mat::new_rows_cols_with_default(60, 80, opencv::core::CV_8UC1, Scalar::all(90.0)).unwrap();
        let motion = MotionField::compute(&frame, &frame, &FlowParams::default()).unwrap();

        assert_eq!(motion.field().shape(), (60, 80));
        assert!(motion.max_magnitude() < 1e-3);
    }
}
