//! Interpolate-4 / Interpolate-11 reference kernels.
//!
//! Resampling is separable: each interpolated axis is processed in turn
//! with a per-output-index list of `(input index, weight)` taps.

use ndarray::{ArrayD, Axis, IxDyn, Zip};
use npuc_ir::{CoordinateTransformMode, InterpolateAttrs, InterpolateMode, NearestMode, ShapeCalcMode};

/// Epsilon added before flooring `dim * scale` in scales mode.
pub const SCALES_EPSILON: f32 = 1.0e-5;

/// Resolved per-axis parameters of one Interpolate invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisPlan {
    pub axis: usize,
    pub out_len: usize,
    pub scale: f32,
}

/// Compute output extents and scales for each interpolated axis.
///
/// `sizes` (sizes mode) or `scales` (scales mode) hold one entry per axis
/// in `axes`; `padded` is the input shape after padding.
pub fn plan_axes(
    attrs: &InterpolateAttrs,
    padded: &[usize],
    axes: &[usize],
    sizes: Option<&[i64]>,
    scales: Option<&[f32]>,
) -> Result<Vec<AxisPlan>, String> {
    axes.iter()
        .enumerate()
        .map(|(i, &axis)| {
            let in_len = *padded
                .get(axis)
                .ok_or_else(|| format!("axis {axis} out of range for rank {}", padded.len()))?;
            match attrs.shape_calculation_mode {
                ShapeCalcMode::Scales => {
                    let scale = *scales
                        .and_then(|s| s.get(i))
                        .ok_or_else(|| format!("missing scale for axis {axis}"))?;
                    if scale.is_nan() || scale <= 0.0 {
                        return Err(format!("scale {scale} for axis {axis} must be positive"));
                    }
                    let out_len = (in_len as f32 * scale + SCALES_EPSILON).floor() as usize;
                    Ok(AxisPlan {
                        axis,
                        out_len,
                        scale,
                    })
                }
                ShapeCalcMode::Sizes => {
                    let size = *sizes
                        .and_then(|s| s.get(i))
                        .ok_or_else(|| format!("missing size for axis {axis}"))?;
                    if size < 0 {
                        return Err(format!("size {size} for axis {axis} is negative"));
                    }
                    let scale = if in_len == 0 {
                        1.0
                    } else {
                        size as f32 / in_len as f32
                    };
                    Ok(AxisPlan {
                        axis,
                        out_len: size as usize,
                        scale,
                    })
                }
            }
        })
        .collect()
}

/// Run Interpolate on `data` with already-resolved axis plans.
pub fn interpolate(
    data: &ArrayD<f32>,
    attrs: &InterpolateAttrs,
    plans: &[AxisPlan],
) -> Result<ArrayD<f32>, String> {
    if attrs.is_pillow() {
        return Err(format!("mode '{}' is not implemented", attrs.mode));
    }
    if attrs.antialias {
        return Err("antialias is not implemented".into());
    }

    let mut current = pad(data, &attrs.pads_begin, &attrs.pads_end)?;
    for plan in plans {
        let in_len = current.shape()[plan.axis];
        if in_len == 0 {
            return Err(format!("axis {} has zero extent", plan.axis));
        }
        let taps: Vec<Vec<(usize, f32)>> = (0..plan.out_len)
            .map(|x| taps_for(attrs, x, plan.scale, in_len, plan.out_len))
            .collect();
        current = resample_axis(&current, plan.axis, &taps);
    }
    Ok(current)
}

fn pad(data: &ArrayD<f32>, begin: &[usize], end: &[usize]) -> Result<ArrayD<f32>, String> {
    if begin.iter().chain(end).all(|&p| p == 0) {
        return Ok(data.clone());
    }
    let rank = data.ndim();
    let at = |v: &[usize], i: usize| v.get(i).copied().unwrap_or(0);
    if begin.len() > rank || end.len() > rank {
        return Err(format!("pads longer than rank {rank}"));
    }
    let shape: Vec<usize> = (0..rank)
        .map(|i| data.shape()[i] + at(begin, i) + at(end, i))
        .collect();
    let mut out = ArrayD::<f32>::zeros(IxDyn(&shape));
    for (idx, &v) in data.indexed_iter() {
        let target: Vec<usize> = (0..rank).map(|i| idx[i] + at(begin, i)).collect();
        out[IxDyn(&target)] = v;
    }
    Ok(out)
}

fn resample_axis(input: &ArrayD<f32>, axis: usize, taps: &[Vec<(usize, f32)>]) -> ArrayD<f32> {
    let mut shape = input.shape().to_vec();
    shape[axis] = taps.len();
    let mut out = ArrayD::<f32>::zeros(IxDyn(&shape));
    Zip::from(out.lanes_mut(Axis(axis)))
        .and(input.lanes(Axis(axis)))
        .for_each(|mut o, i| {
            for (x, t) in taps.iter().enumerate() {
                o[x] = t.iter().map(|&(idx, w)| i[idx] * w).sum();
            }
        });
    out
}

/// Map output coordinate `x` back into input space.
fn source_coordinate(
    mode: CoordinateTransformMode,
    x: usize,
    scale: f32,
    in_len: usize,
    out_len: usize,
) -> f32 {
    let x = x as f32;
    match mode {
        CoordinateTransformMode::HalfPixel => (x + 0.5) / scale - 0.5,
        CoordinateTransformMode::PytorchHalfPixel => {
            if out_len > 1 {
                (x + 0.5) / scale - 0.5
            } else {
                0.0
            }
        }
        CoordinateTransformMode::Asymmetric => x / scale,
        CoordinateTransformMode::TfHalfPixelForNn => (x + 0.5) / scale,
        CoordinateTransformMode::AlignCorners => {
            if out_len == 1 {
                0.0
            } else {
                x * (in_len as f32 - 1.0) / (out_len as f32 - 1.0)
            }
        }
    }
}

fn nearest_index(mode: NearestMode, coord: f32, downsample: bool) -> i64 {
    let rounded = match mode {
        NearestMode::RoundPreferFloor => {
            if coord == coord.floor() + 0.5 {
                coord.floor()
            } else {
                coord.round()
            }
        }
        NearestMode::RoundPreferCeil => coord.round(),
        NearestMode::Floor => coord.floor(),
        NearestMode::Ceil => coord.ceil(),
        NearestMode::Simple => {
            if downsample {
                coord.ceil()
            } else {
                coord.floor()
            }
        }
    };
    rounded as i64
}

fn clamp_index(i: i64, len: usize) -> usize {
    i.clamp(0, len as i64 - 1) as usize
}

fn cubic_weights(t: f32, a: f32) -> [f32; 4] {
    let w0 = ((a * (t + 1.0) - 5.0 * a) * (t + 1.0) + 8.0 * a) * (t + 1.0) - 4.0 * a;
    let w1 = ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0;
    let u = 1.0 - t;
    let w2 = ((a + 2.0) * u - (a + 3.0)) * u * u + 1.0;
    let v = 2.0 - t;
    let w3 = ((a * v - 5.0 * a) * v + 8.0 * a) * v - 4.0 * a;
    [w0, w1, w2, w3]
}

fn taps_for(
    attrs: &InterpolateAttrs,
    x: usize,
    scale: f32,
    in_len: usize,
    out_len: usize,
) -> Vec<(usize, f32)> {
    let coord = source_coordinate(
        attrs.coordinate_transformation_mode,
        x,
        scale,
        in_len,
        out_len,
    );
    match attrs.mode {
        InterpolateMode::Nearest => {
            let i = nearest_index(attrs.nearest_mode, coord, scale < 1.0);
            vec![(clamp_index(i, in_len), 1.0)]
        }
        InterpolateMode::Linear | InterpolateMode::LinearOnnx => {
            let c = coord.clamp(0.0, in_len as f32 - 1.0);
            let i0 = c.floor() as usize;
            let i1 = (i0 + 1).min(in_len - 1);
            let t = c - i0 as f32;
            vec![(i0, 1.0 - t), (i1, t)]
        }
        InterpolateMode::Cubic => {
            let base = coord.floor();
            let w = cubic_weights(coord - base, attrs.cube_coeff as f32);
            (0..4)
                .map(|k| (clamp_index(base as i64 - 1 + k as i64, in_len), w[k]))
                .collect()
        }
        InterpolateMode::BilinearPillow | InterpolateMode::BicubicPillow => {
            unreachable!("pillow modes rejected before planning")
        }
    }
}
