//! Operator kinds and their attributes.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::types::Scalar;

/// Literal payload of a `Constant` node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "element_type", content = "values", rename_all = "lowercase")]
pub enum ConstantData {
    F32(Vec<f32>),
    I64(Vec<i64>),
}

impl ConstantData {
    /// Number of scalar values.
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type of the payload.
    pub fn scalar(&self) -> Scalar {
        match self {
            Self::F32(_) => Scalar::F32,
            Self::I64(_) => Scalar::I64,
        }
    }
}

/// Interpolation kernel.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolateMode {
    #[default]
    Nearest,
    Linear,
    LinearOnnx,
    Cubic,
    /// Opset 11 only.
    BilinearPillow,
    /// Opset 11 only.
    BicubicPillow,
}

/// How the output spatial extents are derived.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeCalcMode {
    #[default]
    Sizes,
    Scales,
}

/// Mapping from an output coordinate to an input coordinate.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateTransformMode {
    #[default]
    HalfPixel,
    PytorchHalfPixel,
    Asymmetric,
    TfHalfPixelForNn,
    AlignCorners,
}

/// Rounding applied by the `nearest` kernel.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NearestMode {
    #[default]
    RoundPreferFloor,
    RoundPreferCeil,
    Floor,
    Ceil,
    Simple,
}

macro_rules! attr_names {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Attribute value as written in OpenVINO IR.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

attr_names!(InterpolateMode {
    Nearest => "nearest",
    Linear => "linear",
    LinearOnnx => "linear_onnx",
    Cubic => "cubic",
    BilinearPillow => "bilinear_pillow",
    BicubicPillow => "bicubic_pillow",
});

attr_names!(ShapeCalcMode {
    Sizes => "sizes",
    Scales => "scales",
});

attr_names!(CoordinateTransformMode {
    HalfPixel => "half_pixel",
    PytorchHalfPixel => "pytorch_half_pixel",
    Asymmetric => "asymmetric",
    TfHalfPixelForNn => "tf_half_pixel_for_nn",
    AlignCorners => "align_corners",
});

attr_names!(NearestMode {
    RoundPreferFloor => "round_prefer_floor",
    RoundPreferCeil => "round_prefer_ceil",
    Floor => "floor",
    Ceil => "ceil",
    Simple => "simple",
});

/// Attributes shared by Interpolate-4 and Interpolate-11.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolateAttrs {
    pub mode: InterpolateMode,
    pub shape_calculation_mode: ShapeCalcMode,
    pub coordinate_transformation_mode: CoordinateTransformMode,
    pub nearest_mode: NearestMode,
    pub antialias: bool,
    pub pads_begin: Vec<usize>,
    pub pads_end: Vec<usize>,
    pub cube_coeff: f64,
}

impl Default for InterpolateAttrs {
    fn default() -> Self {
        Self {
            mode: InterpolateMode::Nearest,
            shape_calculation_mode: ShapeCalcMode::Sizes,
            coordinate_transformation_mode: CoordinateTransformMode::HalfPixel,
            nearest_mode: NearestMode::RoundPreferFloor,
            antialias: false,
            pads_begin: Vec::new(),
            pads_end: Vec::new(),
            cube_coeff: -0.75,
        }
    }
}

impl InterpolateAttrs {
    /// Pillow kernels only exist in opset 11.
    pub fn is_pillow(&self) -> bool {
        matches!(
            self.mode,
            InterpolateMode::BilinearPillow | InterpolateMode::BicubicPillow
        )
    }
}

/// The operation a graph node performs.
///
/// The set is closed: every operator the adapter can route or rewrite is a
/// variant here, and anything else arrives as [`OpKind::Custom`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "attrs")]
pub enum OpKind {
    /// Compile-time literal.
    Constant(ConstantData),
    /// Runtime shape of its input as a 1-D `i64` tensor.
    ShapeOf,
    /// Gather along the axis given by the third input.
    Gather { batch_dims: i64 },
    /// Element type conversion.
    Convert { destination: Scalar },
    Add,
    Multiply,
    Divide,
    /// Remainder with the sign of the divisor.
    FloorMod,
    Floor,
    Relu,
    /// Spatial resize.
    Interpolate(InterpolateAttrs),
    /// Any operator the adapter does not model.
    Custom { op_type: String },
}

impl OpKind {
    /// Returns the OpenVINO layer type string.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Constant(_) => "Constant",
            Self::ShapeOf => "ShapeOf",
            Self::Gather { .. } => "Gather",
            Self::Convert { .. } => "Convert",
            Self::Add => "Add",
            Self::Multiply => "Multiply",
            Self::Divide => "Divide",
            Self::FloorMod => "FloorMod",
            Self::Floor => "Floor",
            Self::Relu => "Relu",
            Self::Interpolate(_) => "Interpolate",
            Self::Custom { op_type } => op_type,
        }
    }

    /// Accepted number of inputs for this operator at `version`.
    ///
    /// `None` means the arity is not checked (custom operators).
    pub fn arity(&self, version: u32) -> Option<RangeInclusive<usize>> {
        Some(match self {
            Self::Constant(_) => 0..=0,
            Self::ShapeOf | Self::Convert { .. } | Self::Floor | Self::Relu => 1..=1,
            Self::Add | Self::Multiply | Self::Divide | Self::FloorMod => 2..=2,
            Self::Gather { .. } => 3..=3,
            Self::Interpolate(_) if version >= 11 => 2..=3,
            Self::Interpolate(_) if version >= 4 => 3..=4,
            Self::Interpolate(_) => 2..=2,
            Self::Custom { .. } => return None,
        })
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        assert_eq!(OpKind::ShapeOf.type_name(), "ShapeOf");
        assert_eq!(
            OpKind::Interpolate(InterpolateAttrs::default()).type_name(),
            "Interpolate"
        );
        assert_eq!(
            OpKind::Custom {
                op_type: "NMSRotated".into()
            }
            .type_name(),
            "NMSRotated"
        );
    }

    #[test]
    fn interpolate_arity_depends_on_version() {
        let op = OpKind::Interpolate(InterpolateAttrs::default());
        assert_eq!(op.arity(11), Some(2..=3));
        assert_eq!(op.arity(4), Some(3..=4));
        assert_eq!(op.arity(1), Some(2..=2));
        assert_eq!(
            OpKind::Custom {
                op_type: "X".into()
            }
            .arity(1),
            None
        );
    }

    #[test]
    fn attr_strings_match_ir_names() {
        assert_eq!(InterpolateMode::LinearOnnx.as_str(), "linear_onnx");
        assert_eq!(
            CoordinateTransformMode::TfHalfPixelForNn.as_str(),
            "tf_half_pixel_for_nn"
        );
        assert_eq!(NearestMode::RoundPreferCeil.to_string(), "round_prefer_ceil");
        assert_eq!(ShapeCalcMode::Scales.to_string(), "scales");
    }

    #[test]
    fn interpolate_attrs_json_defaults() {
        let attrs: InterpolateAttrs =
            serde_json::from_str(r#"{"mode": "bilinear_pillow"}"#).unwrap();
        assert!(attrs.is_pillow());
        assert_eq!(attrs.cube_coeff, -0.75);
        assert_eq!(
            attrs.coordinate_transformation_mode,
            CoordinateTransformMode::HalfPixel
        );
    }

    #[test]
    fn op_kind_json_is_adjacently_tagged() {
        let op: OpKind =
            serde_json::from_str(r#"{"type": "Convert", "attrs": {"destination": "f32"}}"#)
                .unwrap();
        assert_eq!(
            op,
            OpKind::Convert {
                destination: Scalar::F32
            }
        );
        let op: OpKind = serde_json::from_str(r#"{"type": "ShapeOf"}"#).unwrap();
        assert_eq!(op, OpKind::ShapeOf);
    }
}
