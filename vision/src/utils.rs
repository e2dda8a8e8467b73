use nalgebra::{DMatrix, Vector2, Vector3};
use opencv::{
    core::{Vec2f, Vec3b},
    prelude::*,
};

use crate::{error::Result, vision::roi::region::Region};

/// Pushes each corner outwards by a fraction `p` of its own coordinate and snaps the
/// result back into `[0, width] x [0, height]`.
///
/// A start coordinate outside the frame snaps to 0, an end coordinate outside the frame
/// (or before its start) snaps to the far edge, so the output always satisfies
/// `0 <= x1 <= x2 <= width` and `0 <= y1 <= y2 <= height`.
pub fn expand_r(x1: i32, y1: i32, x2: i32, y2: i32, p: f32, width: i32, height: i32) -> Region {
    let mut a = (x1 as f32 - x1 as f32 * p) as i32;
    let mut b = (y1 as f32 - y1 as f32 * p) as i32;
    let mut c = (x2 as f32 + x2 as f32 * p) as i32;
    let mut d = (y2 as f32 + y2 as f32 * p) as i32;

    if a < 0 || a > width {
        a = 0;
    }
    if b < 0 || b > height {
        b = 0;
    }
    if c < 0 || c > width || c < a {
        c = width;
    }
    if d < 0 || d > height || d < b {
        d = height;
    }

    Region::from_corners(a, b, c, d)
}

/// Scales values by their largest magnitude. An all-zero input is divided by 1.
pub fn normalise(values: &[f32]) -> Vec<f32> {
    let max = values.iter().fold(0.0_f32, |m, v| m.max(v.abs()));
    let denominator = if max == 0.0 {
        log::debug!("Normalising an all-zero vector, using a denominator of 1");
        1.0
    } else {
        max
    };

    values.iter().map(|v| v / denominator).collect()
}

/// `sum(p * log2(1 / p))` over the samples. Samples are not required to sum to one.
pub fn entropy(values: &[f32]) -> f32 {
    values
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| p * (1.0 / p).log2())
        .sum()
}

/// Index of the first largest value, 0 for an empty slice.
pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| if *v > best.1 { (i, *v) } else { best })
        .0
}

pub fn mean_and_std(values: impl ExactSizeIterator<Item = f32> + Clone) -> (f32, f32) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.clone().sum::<f32>() / n as f32;
    let variance = values.map(|v| (v - mean) * (v - mean)).sum::<f32>() / n as f32;

    (mean, variance.sqrt())
}

/// Copies an 8-bit three channel image into a matrix of per-pixel channel triples.
pub fn colored_mat_to_dmatrix(mat: &Mat) -> Result<DMatrix<Vector3<u8>>> {
    let mut res = DMatrix::from_element(mat.rows() as usize, mat.cols() as usize, Vector3::new(0, 0, 0));

    for r in 0..mat.rows() {
        for c in 0..mat.cols() {
            let pixel = mat.at_2d::<Vec3b>(r, c)?;
            res[(r as usize, c as usize)] = Vector3::new(pixel[0], pixel[1], pixel[2]);
        }
    }

    Ok(res)
}

/// Converts a two channel float flow field into polar form, `x` holding the angle in
/// degrees (`[0, 360)`) and `y` the magnitude.
pub fn flow_to_dmatrix(flow: &Mat) -> Result<DMatrix<Vector2<f32>>> {
    let mut res = DMatrix::from_element(flow.rows() as usize, flow.cols() as usize, Vector2::new(0.0, 0.0));

    for r in 0..flow.rows() {
        for c in 0..flow.cols() {
            let v = flow.at_2d::<Vec2f>(r, c)?;
            let (dx, dy) = (v[0], v[1]);
            let angle = dy.atan2(dx).to_degrees().rem_euclid(360.0);
            res[(r as usize, c as usize)] = Vector2::new(angle, dx.hypot(dy));
        }
    }

    Ok(res)
}
