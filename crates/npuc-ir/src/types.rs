//! Element types and tensor shapes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Width of a scalar type in bytes.
pub type Bytes = u8;

/// The kind of a scalar type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ScalarKind {
    /// Boolean.
    Bool,
    /// Signed integer.
    Sint,
    /// Unsigned integer.
    Uint,
    /// Floating point.
    Float,
}

/// A tensor element type: kind + byte width.
///
/// Serialized with its OpenVINO element type name (`f32`, `i64`, ...).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scalar {
    pub kind: ScalarKind,
    pub width: Bytes,
}

impl Scalar {
    pub const BOOL: Self = Self {
        kind: ScalarKind::Bool,
        width: 1,
    };
    pub const I32: Self = Self {
        kind: ScalarKind::Sint,
        width: 4,
    };
    pub const I64: Self = Self {
        kind: ScalarKind::Sint,
        width: 8,
    };
    pub const U8: Self = Self {
        kind: ScalarKind::Uint,
        width: 1,
    };
    pub const F16: Self = Self {
        kind: ScalarKind::Float,
        width: 2,
    };
    pub const F32: Self = Self {
        kind: ScalarKind::Float,
        width: 4,
    };

    /// Returns `true` for floating-point element types.
    pub fn is_float(self) -> bool {
        self.kind == ScalarKind::Float
    }

    /// Returns `true` for signed or unsigned integer element types.
    pub fn is_integer(self) -> bool {
        matches!(self.kind, ScalarKind::Sint | ScalarKind::Uint)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScalarKind::Bool => write!(f, "boolean"),
            ScalarKind::Sint => write!(f, "i{}", self.width * 8),
            ScalarKind::Uint => write!(f, "u{}", self.width * 8),
            ScalarKind::Float => write!(f, "f{}", self.width * 8),
        }
    }
}

impl FromStr for Scalar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boolean" => Ok(Self::BOOL),
            "i32" => Ok(Self::I32),
            "i64" => Ok(Self::I64),
            "u8" => Ok(Self::U8),
            "f16" => Ok(Self::F16),
            "f32" => Ok(Self::F32),
            other => Err(format!("unknown element type '{other}'")),
        }
    }
}

impl TryFrom<String> for Scalar {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        value.to_string()
    }
}

/// A single tensor dimension.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    /// Statically known extent.
    Fixed(u32),
    /// Extent known only at runtime, optionally named.
    Dynamic(Option<String>),
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Dynamic(Some(name)) => f.write_str(name),
            Self::Dynamic(None) => f.write_str("?"),
        }
    }
}

/// Shape of a tensor edge.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TensorShape {
    pub dims: Vec<Dimension>,
}

impl TensorShape {
    /// A fully static shape.
    pub fn fixed(dims: &[u32]) -> Self {
        Self {
            dims: dims.iter().map(|&d| Dimension::Fixed(d)).collect(),
        }
    }

    /// A shape of the given rank whose every dimension is dynamic.
    pub fn all_dynamic(rank: usize) -> Self {
        Self {
            dims: vec![Dimension::Dynamic(None); rank],
        }
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// The concrete extents, or `None` if any dimension is dynamic.
    pub fn fixed_dims(&self) -> Option<Vec<u32>> {
        self.dims
            .iter()
            .map(|d| match d {
                Dimension::Fixed(n) => Some(*n),
                Dimension::Dynamic(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{d}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_constants() {
        assert_eq!(Scalar::F32.kind, ScalarKind::Float);
        assert_eq!(Scalar::F32.width, 4);
        assert_eq!(Scalar::I64.width, 8);
        assert_eq!(Scalar::BOOL.width, 1);
        assert!(Scalar::F16.is_float());
        assert!(Scalar::I32.is_integer());
        assert!(!Scalar::BOOL.is_integer());
    }

    #[test]
    fn scalar_names_parse_back() {
        for s in [
            Scalar::BOOL,
            Scalar::I32,
            Scalar::I64,
            Scalar::U8,
            Scalar::F16,
            Scalar::F32,
        ] {
            assert_eq!(s.to_string().parse::<Scalar>().unwrap(), s);
        }
        assert!("f8e4m3".parse::<Scalar>().is_err());
    }

    #[test]
    fn shape_helpers() {
        let s = TensorShape::fixed(&[1, 3, 224, 224]);
        assert_eq!(s.rank(), 4);
        assert_eq!(s.fixed_dims(), Some(vec![1, 3, 224, 224]));
        assert_eq!(s.to_string(), "[1,3,224,224]");

        let d = TensorShape::all_dynamic(2);
        assert_eq!(d.fixed_dims(), None);
        assert_eq!(d.to_string(), "[?,?]");
    }

    #[test]
    fn shape_json_mixes_fixed_and_dynamic() {
        let s: TensorShape = serde_json::from_str(r#"[1, "batch", null]"#).unwrap();
        assert_eq!(s.dims[0], Dimension::Fixed(1));
        assert_eq!(s.dims[1], Dimension::Dynamic(Some("batch".into())));
        assert_eq!(s.dims[2], Dimension::Dynamic(None));
    }
}
