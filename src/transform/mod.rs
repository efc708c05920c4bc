use std::f32::consts::TAU;

use ndarray::{Array2, ArrayView3, Axis};

use crate::config::Interpolation;
use crate::{SomError, SomResult};

/// Shape of the rotation/flip bank generated per input image.
#[derive(Debug, Clone, Copy)]
pub struct BankParams {
    pub rotations: usize,
    pub flip: bool,
    pub neuron_dim: usize,
    pub interpolation: Interpolation,
}

impl BankParams {
    pub fn num_entries(&self) -> usize {
        if self.flip {
            2 * self.rotations
        } else {
            self.rotations
        }
    }
}

/// Central crop without resampling, the exact path for angle zero.
pub fn crop(src: &[f32], height: usize, width: usize, dim: usize, dest: &mut [f32]) {
    let m_h = (height - dim) / 2;
    let m_w = (width - dim) / 2;
    for y in 0..dim {
        for x in 0..dim {
            dest[y * dim + x] = src[(y + m_h) * width + (x + m_w)];
        }
    }
}

/// Rotate by `alpha` around the image centre and crop to `dim` x `dim`.
///
/// Source coordinates are nudged by +0.1 before truncation; pixels whose
/// source falls outside the input are set to 0.
pub fn rotate_and_crop_nearest(
    src: &[f32],
    height: usize,
    width: usize,
    dim: usize,
    dest: &mut [f32],
    alpha: f32,
) {
    let cos_a = alpha.cos();
    let sin_a = alpha.sin();

    let x0 = (width as f32 - 1.0) * 0.5;
    let y0 = (height as f32 - 1.0) * 0.5;
    let m_w = ((width - dim) / 2) as f32;
    let m_h = ((height - dim) / 2) as f32;

    for y2 in 0..dim {
        for x2 in 0..dim {
            let xs = x2 as f32 + m_w - x0;
            let ys = y2 as f32 + m_h - y0;
            let x1 = xs * cos_a + ys * sin_a + x0 + 0.1;
            if x1 < 0.0 || x1 >= width as f32 {
                dest[y2 * dim + x2] = 0.0;
                continue;
            }
            let y1 = ys * cos_a - xs * sin_a + y0 + 0.1;
            if y1 < 0.0 || y1 >= height as f32 {
                dest[y2 * dim + x2] = 0.0;
                continue;
            }
            dest[y2 * dim + x2] = src[y1 as usize * width + x1 as usize];
        }
    }
}

/// Bilinear variant of [`rotate_and_crop_nearest`].
///
/// A destination pixel whose 2x2 sample support leaves the input is set
/// to 0; with a crop margin of at least sqrt(2)/2 * dim the guard never
/// fires.
pub fn rotate_and_crop_bilinear(
    src: &[f32],
    height: usize,
    width: usize,
    dim: usize,
    dest: &mut [f32],
    alpha: f32,
) {
    let cos_a = alpha.cos();
    let sin_a = alpha.sin();

    let x0 = (width as f32 - 1.0) * 0.5;
    let y0 = (height as f32 - 1.0) * 0.5;
    let m_w = ((width - dim) / 2) as f32;
    let m_h = ((height - dim) / 2) as f32;

    for y2 in 0..dim {
        for x2 in 0..dim {
            let xs = x2 as f32 + m_w - x0;
            let ys = y2 as f32 + m_h - y0;
            let x1 = xs * cos_a + ys * sin_a + x0;
            let y1 = ys * cos_a - xs * sin_a + y0;
            if x1 < 0.0 || x1 >= (width - 1) as f32 || y1 < 0.0 || y1 >= (height - 1) as f32 {
                dest[y2 * dim + x2] = 0.0;
                continue;
            }
            let ix = x1 as usize;
            let iy = y1 as usize;
            let rx = x1 - ix as f32;
            let ry = y1 - iy as f32;
            let cx = 1.0 - rx;
            let cy = 1.0 - ry;
            dest[y2 * dim + x2] = cx * cy * src[iy * width + ix]
                + ry * cx * src[(iy + 1) * width + ix]
                + rx * cy * src[iy * width + ix + 1]
                + rx * ry * src[(iy + 1) * width + ix + 1];
        }
    }
}

/// Exact quarter turn, the pure index permutation matching the resampling
/// convention at alpha = pi/2.
pub fn rotate_quarter(src: &[f32], dim: usize, dest: &mut [f32]) {
    for y in 0..dim {
        for x in 0..dim {
            dest[y * dim + x] = src[(dim - 1 - x) * dim + y];
        }
    }
}

/// Mirror over the horizontal centerline, a pure row reversal.
pub fn flip_rows(src: &[f32], dim: usize, dest: &mut [f32]) {
    for y in 0..dim {
        let flipped = (dim - 1 - y) * dim;
        dest[flipped..flipped + dim].copy_from_slice(&src[y * dim..y * dim + dim]);
    }
}

/// Fill `bank` with the oriented crops of `input`.
///
/// `input` is (channels, height, width) with height == width >= neuron_dim.
/// Rows 0..R hold the rotations at angles 2*pi*k/R; when flipping is on,
/// rows R..2R hold the row-reversed copies of rows 0..R. Every row stores
/// its channels contiguously in the neuron layout.
#[tracing::instrument(skip(input, bank), name = "generate_bank")]
pub fn generate_bank(
    input: ArrayView3<'_, f32>,
    params: &BankParams,
    bank: &mut Array2<f32>,
) -> SomResult<()> {
    let (channels, height, width) = input.dim();
    let dim = params.neuron_dim;
    if height != width {
        return Err(SomError::DimensionMismatch {
            field: "image width",
            expected: height as i64,
            found: width as i64,
        });
    }
    if height < dim {
        return Err(SomError::DimensionMismatch {
            field: "image height",
            expected: dim as i64,
            found: height as i64,
        });
    }
    let neuron_size = dim * dim;
    let stride = channels * neuron_size;
    if bank.dim() != (params.num_entries(), stride) {
        return Err(SomError::InvariantViolation(format!(
            "bank buffer is {:?}, step needs ({}, {})",
            bank.dim(),
            params.num_entries(),
            stride
        )));
    }

    let src = input
        .as_slice()
        .ok_or_else(|| SomError::InvariantViolation("input image is not contiguous".into()))?;

    // With a rotation count divisible by 4 only the first quadrant is
    // resampled; the other three quadrants are exact quarter turns of it.
    let quadrant = params.rotations % 4 == 0;
    let base = if quadrant {
        params.rotations / 4
    } else {
        params.rotations
    };

    for k in 0..base {
        let alpha = TAU * k as f32 / params.rotations as f32;
        let mut row = bank.row_mut(k);
        let row = row.as_slice_mut().expect("bank row is contiguous");
        for c in 0..channels {
            let channel = &src[c * height * width..(c + 1) * height * width];
            let dest = &mut row[c * neuron_size..(c + 1) * neuron_size];
            if k == 0 {
                crop(channel, height, width, dim, dest);
            } else {
                match params.interpolation {
                    Interpolation::NearestNeighbor => {
                        rotate_and_crop_nearest(channel, height, width, dim, dest, alpha)
                    }
                    Interpolation::Bilinear => {
                        rotate_and_crop_bilinear(channel, height, width, dim, dest, alpha)
                    }
                }
            }
        }
    }

    if quadrant {
        for q in 1..4 {
            for k in 0..base {
                let dest_index = q * base + k;
                let (left, mut right) = bank.view_mut().split_at(Axis(0), dest_index);
                let src_row = left.row((q - 1) * base + k);
                let src_row = src_row.as_slice().expect("bank row is contiguous");
                let mut dest_row = right.row_mut(0);
                let dest_row = dest_row.as_slice_mut().expect("bank row is contiguous");
                for c in 0..channels {
                    rotate_quarter(
                        &src_row[c * neuron_size..(c + 1) * neuron_size],
                        dim,
                        &mut dest_row[c * neuron_size..(c + 1) * neuron_size],
                    );
                }
            }
        }
    }

    if params.flip {
        let (upright, mut flipped) = bank.view_mut().split_at(Axis(0), params.rotations);
        for (src_row, mut dest_row) in upright.axis_iter(Axis(0)).zip(flipped.axis_iter_mut(Axis(0)))
        {
            let src_row = src_row.as_slice().expect("bank row is contiguous");
            let dest_row = dest_row.as_slice_mut().expect("bank row is contiguous");
            for c in 0..channels {
                flip_rows(
                    &src_row[c * neuron_size..(c + 1) * neuron_size],
                    dim,
                    &mut dest_row[c * neuron_size..(c + 1) * neuron_size],
                );
            }
        }
    }

    Ok(())
}
