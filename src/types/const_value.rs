//! Compile-time constant values.
//!
//! A [`ConstValue`] is the result of folding a constant expression: a
//! scalar, a vector, or a column-major matrix of homogeneous scalar
//! elements, or the error value that absorbs every failed fold. Operations
//! are element-wise with GLSL broadcasting (scalar against vector/matrix)
//! and scalar promotion along the implicit-conversion lattice.

use super::{arithmetic_type, error_type, scalar_type, ScalarKind, TypeId, ValueDim};
use serde::Serialize;

/// One scalar component of a constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ScalarElem {
    Bool(bool),
    Int(i32),
    Uint(u32),
    Float(f32),
    Double(f64),
}

impl ScalarElem {
    pub fn kind(self) -> ScalarKind {
        match self {
            ScalarElem::Bool(_) => ScalarKind::Bool,
            ScalarElem::Int(_) => ScalarKind::Int,
            ScalarElem::Uint(_) => ScalarKind::Uint,
            ScalarElem::Float(_) => ScalarKind::Float,
            ScalarElem::Double(_) => ScalarKind::Double,
        }
    }

    /// Cast along GLSL scalar-conversion rules. Any of the five base kinds
    /// casts to any other (explicit constructor semantics); the implicit
    /// lattice is enforced by the type checker, not here.
    pub fn cast(self, to: ScalarKind) -> Option<ScalarElem> {
        let as_f64 = match self {
            ScalarElem::Bool(v) => v as u8 as f64,
            ScalarElem::Int(v) => v as f64,
            ScalarElem::Uint(v) => v as f64,
            ScalarElem::Float(v) => v as f64,
            ScalarElem::Double(v) => v,
        };
        Some(match to {
            ScalarKind::Bool => ScalarElem::Bool(as_f64 != 0.0),
            ScalarKind::Int => ScalarElem::Int(match self {
                ScalarElem::Uint(v) => v as i32,
                ScalarElem::Bool(v) => v as i32,
                ScalarElem::Int(v) => v,
                ScalarElem::Float(v) => v as i32,
                ScalarElem::Double(v) => v as i32,
            }),
            ScalarKind::Uint => ScalarElem::Uint(match self {
                ScalarElem::Int(v) => v as u32,
                ScalarElem::Bool(v) => v as u32,
                ScalarElem::Uint(v) => v,
                ScalarElem::Float(v) => v as u32,
                ScalarElem::Double(v) => v as u32,
            }),
            ScalarKind::Float => ScalarElem::Float(as_f64 as f32),
            ScalarKind::Double => ScalarElem::Double(as_f64),
            _ => return None,
        })
    }
}

/// A folded constant: error, scalar, vector, or column-major matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConstValue {
    Error,
    Scalar(ScalarElem),
    Vector(Vec<ScalarElem>),
    Matrix { cols: u8, rows: u8, elems: Vec<ScalarElem> },
}

impl Default for ConstValue {
    fn default() -> Self {
        ConstValue::Error
    }
}

impl ConstValue {
    pub fn from_bool(v: bool) -> Self {
        ConstValue::Scalar(ScalarElem::Bool(v))
    }
    pub fn from_int(v: i32) -> Self {
        ConstValue::Scalar(ScalarElem::Int(v))
    }
    pub fn from_uint(v: u32) -> Self {
        ConstValue::Scalar(ScalarElem::Uint(v))
    }
    pub fn from_float(v: f32) -> Self {
        ConstValue::Scalar(ScalarElem::Float(v))
    }
    pub fn from_double(v: f64) -> Self {
        ConstValue::Scalar(ScalarElem::Double(v))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ConstValue::Error)
    }
    pub fn is_scalar(&self) -> bool {
        matches!(self, ConstValue::Scalar(_))
    }
    pub fn is_vector(&self) -> bool {
        matches!(self, ConstValue::Vector(_))
    }
    pub fn is_matrix(&self) -> bool {
        matches!(self, ConstValue::Matrix { .. })
    }

    pub fn is_scalar_bool(&self) -> bool {
        matches!(self, ConstValue::Scalar(ScalarElem::Bool(_)))
    }
    pub fn is_scalar_int(&self) -> bool {
        matches!(self, ConstValue::Scalar(ScalarElem::Int(_)))
    }

    pub fn get_bool_value(&self) -> Option<bool> {
        match self {
            ConstValue::Scalar(ScalarElem::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_int_value(&self) -> Option<i32> {
        match self {
            ConstValue::Scalar(ScalarElem::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_uint_value(&self) -> Option<u32> {
        match self {
            ConstValue::Scalar(ScalarElem::Uint(v)) => Some(*v),
            _ => None,
        }
    }

    /// Array-size helper: int or uint constants as usize.
    pub fn get_index_value(&self) -> Option<usize> {
        match self {
            ConstValue::Scalar(ScalarElem::Int(v)) if *v >= 0 => Some(*v as usize),
            ConstValue::Scalar(ScalarElem::Uint(v)) => Some(*v as usize),
            _ => None,
        }
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            ConstValue::Error => None,
            ConstValue::Scalar(e) => Some(e.kind()),
            ConstValue::Vector(elems) => elems.first().map(|e| e.kind()),
            ConstValue::Matrix { elems, .. } => elems.first().map(|e| e.kind()),
        }
    }

    /// The canonical type of this value. Error values have the error type.
    pub fn type_id(&self) -> TypeId {
        match self {
            ConstValue::Error => error_type(),
            ConstValue::Scalar(e) => scalar_type(e.kind()),
            ConstValue::Vector(elems) => {
                let kind = match elems.first() {
                    Some(e) => e.kind(),
                    None => return error_type(),
                };
                arithmetic_type(kind, ValueDim { rows: 1, cols: elems.len() as u8 })
            }
            ConstValue::Matrix { cols, rows, elems } => {
                let kind = match elems.first() {
                    Some(e) => e.kind(),
                    None => return error_type(),
                };
                arithmetic_type(kind, ValueDim { rows: *rows, cols: *cols })
            }
        }
    }

    fn elems(&self) -> &[ScalarElem] {
        match self {
            ConstValue::Error => &[],
            ConstValue::Scalar(e) => std::slice::from_ref(e),
            ConstValue::Vector(elems) => elems,
            ConstValue::Matrix { elems, .. } => elems,
        }
    }

    /// Indexing: vector components and matrix columns.
    pub fn element(&self, index: usize) -> ConstValue {
        match self {
            ConstValue::Vector(elems) => {
                elems.get(index).map(|&e| ConstValue::Scalar(e)).unwrap_or(ConstValue::Error)
            }
            ConstValue::Matrix { cols, rows, elems } => {
                if index < *cols as usize {
                    let rows = *rows as usize;
                    ConstValue::Vector(elems[index * rows..(index + 1) * rows].to_vec())
                } else {
                    ConstValue::Error
                }
            }
            _ => ConstValue::Error,
        }
    }

    /// `.length()` of a vector (component count) or matrix (column count).
    pub fn length(&self) -> ConstValue {
        match self {
            ConstValue::Vector(elems) => ConstValue::from_int(elems.len() as i32),
            ConstValue::Matrix { cols, .. } => ConstValue::from_int(*cols as i32),
            _ => ConstValue::Error,
        }
    }

    /// Component selection; indices are 0-based positions in `{x,y,z,w}`.
    pub fn swizzle(&self, indices: &[u8]) -> ConstValue {
        let components = match self {
            ConstValue::Scalar(e) => std::slice::from_ref(e),
            ConstValue::Vector(elems) => elems.as_slice(),
            _ => return ConstValue::Error,
        };
        let mut out = Vec::with_capacity(indices.len());
        for &i in indices {
            match components.get(i as usize) {
                Some(&e) => out.push(e),
                None => return ConstValue::Error,
            }
        }
        match out.len() {
            1 => ConstValue::Scalar(out[0]),
            2..=4 => ConstValue::Vector(out),
            _ => ConstValue::Error,
        }
    }

    /// Element-wise cast to another scalar kind, keeping the shape.
    pub fn cast_scalar(&self, to: ScalarKind) -> ConstValue {
        self.map(|e| e.cast(to))
    }

    fn map(&self, f: impl Fn(ScalarElem) -> Option<ScalarElem>) -> ConstValue {
        let apply = |elems: &[ScalarElem]| -> Option<Vec<ScalarElem>> {
            elems.iter().map(|&e| f(e)).collect()
        };
        match self {
            ConstValue::Error => ConstValue::Error,
            ConstValue::Scalar(e) => f(*e).map(ConstValue::Scalar).unwrap_or(ConstValue::Error),
            ConstValue::Vector(elems) => {
                apply(elems).map(ConstValue::Vector).unwrap_or(ConstValue::Error)
            }
            ConstValue::Matrix { cols, rows, elems } => apply(elems)
                .map(|elems| ConstValue::Matrix { cols: *cols, rows: *rows, elems })
                .unwrap_or(ConstValue::Error),
        }
    }

    fn shape(&self) -> Option<(u8, u8)> {
        match self {
            ConstValue::Error => None,
            ConstValue::Scalar(_) => Some((1, 1)),
            ConstValue::Vector(elems) => Some((1, elems.len() as u8)),
            ConstValue::Matrix { cols, rows, .. } => Some((*rows, *cols)),
        }
    }

    fn with_shape(shape: (u8, u8), elems: Vec<ScalarElem>) -> ConstValue {
        match shape {
            (1, 1) => ConstValue::Scalar(elems[0]),
            (1, _) => ConstValue::Vector(elems),
            (rows, cols) => ConstValue::Matrix { cols, rows, elems },
        }
    }

    /// Element-wise combine with broadcasting and promotion to the common
    /// scalar kind. Scalars broadcast against vectors and matrices;
    /// otherwise shapes must match exactly.
    fn zip(&self, rhs: &ConstValue, f: impl Fn(ScalarElem, ScalarElem) -> Option<ScalarElem>) -> ConstValue {
        let (Some(lhs_shape), Some(rhs_shape)) = (self.shape(), rhs.shape()) else {
            return ConstValue::Error;
        };
        let (Some(lhs_kind), Some(rhs_kind)) = (self.scalar_kind(), rhs.scalar_kind()) else {
            return ConstValue::Error;
        };
        let Some(common) = common_kind(lhs_kind, rhs_kind) else {
            return ConstValue::Error;
        };
        let lhs = self.cast_scalar(common);
        let rhs = rhs.cast_scalar(common);
        if lhs.is_error() || rhs.is_error() {
            return ConstValue::Error;
        }

        let out_shape = if lhs_shape == (1, 1) { rhs_shape } else { lhs_shape };
        if lhs_shape != (1, 1) && rhs_shape != (1, 1) && lhs_shape != rhs_shape {
            return ConstValue::Error;
        }

        let count = out_shape.0 as usize * out_shape.1 as usize;
        let pick = |v: &ConstValue, i: usize| -> ScalarElem {
            let elems = v.elems();
            if elems.len() == 1 {
                elems[0]
            } else {
                elems[i]
            }
        };
        let mut elems = Vec::with_capacity(count);
        for i in 0..count {
            match f(pick(&lhs, i), pick(&rhs, i)) {
                Some(e) => elems.push(e),
                None => return ConstValue::Error,
            }
        }
        ConstValue::with_shape(out_shape, elems)
    }

    //
    // Unary element-wise operations
    //

    pub fn elemwise_negate(&self) -> ConstValue {
        self.map(|e| match e {
            ScalarElem::Int(v) => Some(ScalarElem::Int(v.wrapping_neg())),
            ScalarElem::Uint(v) => Some(ScalarElem::Uint(v.wrapping_neg())),
            ScalarElem::Float(v) => Some(ScalarElem::Float(-v)),
            ScalarElem::Double(v) => Some(ScalarElem::Double(-v)),
            ScalarElem::Bool(_) => None,
        })
    }

    pub fn elemwise_bit_not(&self) -> ConstValue {
        self.map(|e| match e {
            ScalarElem::Int(v) => Some(ScalarElem::Int(!v)),
            ScalarElem::Uint(v) => Some(ScalarElem::Uint(!v)),
            _ => None,
        })
    }

    pub fn elemwise_logical_not(&self) -> ConstValue {
        self.map(|e| match e {
            ScalarElem::Bool(v) => Some(ScalarElem::Bool(!v)),
            _ => None,
        })
    }

    //
    // Binary element-wise operations
    //

    pub fn elemwise_plus(&self, rhs: &ConstValue) -> ConstValue {
        self.zip(rhs, |a, b| arith(a, b, |x, y| x.wrapping_add(y), |x, y| x.wrapping_add(y), |x, y| x + y, |x, y| x + y))
    }

    pub fn elemwise_minus(&self, rhs: &ConstValue) -> ConstValue {
        self.zip(rhs, |a, b| arith(a, b, |x, y| x.wrapping_sub(y), |x, y| x.wrapping_sub(y), |x, y| x - y, |x, y| x - y))
    }

    /// Component-wise product. Linear-algebra matrix products are not
    /// folded; the checker keeps such expressions non-constant.
    pub fn elemwise_mul(&self, rhs: &ConstValue) -> ConstValue {
        self.zip(rhs, |a, b| arith(a, b, |x, y| x.wrapping_mul(y), |x, y| x.wrapping_mul(y), |x, y| x * y, |x, y| x * y))
    }

    pub fn elemwise_div(&self, rhs: &ConstValue) -> ConstValue {
        self.zip(rhs, |a, b| match (a, b) {
            (ScalarElem::Int(x), ScalarElem::Int(y)) => {
                if y == 0 { None } else { Some(ScalarElem::Int(x.wrapping_div(y))) }
            }
            (ScalarElem::Uint(x), ScalarElem::Uint(y)) => {
                if y == 0 { None } else { Some(ScalarElem::Uint(x / y)) }
            }
            (ScalarElem::Float(x), ScalarElem::Float(y)) => Some(ScalarElem::Float(x / y)),
            (ScalarElem::Double(x), ScalarElem::Double(y)) => Some(ScalarElem::Double(x / y)),
            _ => None,
        })
    }

    pub fn elemwise_mod(&self, rhs: &ConstValue) -> ConstValue {
        self.zip(rhs, |a, b| match (a, b) {
            (ScalarElem::Int(x), ScalarElem::Int(y)) => {
                if y == 0 { None } else { Some(ScalarElem::Int(x.wrapping_rem(y))) }
            }
            (ScalarElem::Uint(x), ScalarElem::Uint(y)) => {
                if y == 0 { None } else { Some(ScalarElem::Uint(x % y)) }
            }
            _ => None,
        })
    }

    /// Aggregate equality: true only when both sides agree everywhere.
    pub fn elemwise_equals(&self, rhs: &ConstValue) -> ConstValue {
        match self.compare_all(rhs) {
            Some(equal) => ConstValue::from_bool(equal),
            None => ConstValue::Error,
        }
    }

    pub fn elemwise_not_equals(&self, rhs: &ConstValue) -> ConstValue {
        match self.compare_all(rhs) {
            Some(equal) => ConstValue::from_bool(!equal),
            None => ConstValue::Error,
        }
    }

    fn compare_all(&self, rhs: &ConstValue) -> Option<bool> {
        if self.is_error() || rhs.is_error() {
            return None;
        }
        let result = self.zip(rhs, |a, b| {
            let eq = match (a, b) {
                (ScalarElem::Bool(x), ScalarElem::Bool(y)) => x == y,
                (ScalarElem::Int(x), ScalarElem::Int(y)) => x == y,
                (ScalarElem::Uint(x), ScalarElem::Uint(y)) => x == y,
                (ScalarElem::Float(x), ScalarElem::Float(y)) => x == y,
                (ScalarElem::Double(x), ScalarElem::Double(y)) => x == y,
                _ => return None,
            };
            Some(ScalarElem::Bool(eq))
        });
        match result {
            ConstValue::Error => None,
            other => Some(other.elems().iter().all(|e| matches!(e, ScalarElem::Bool(true)))),
        }
    }

    pub fn elemwise_less_than(&self, rhs: &ConstValue) -> ConstValue {
        self.relational(rhs, |o| o == std::cmp::Ordering::Less)
    }

    pub fn elemwise_less_than_eq(&self, rhs: &ConstValue) -> ConstValue {
        self.relational(rhs, |o| o != std::cmp::Ordering::Greater)
    }

    pub fn elemwise_greater_than(&self, rhs: &ConstValue) -> ConstValue {
        self.relational(rhs, |o| o == std::cmp::Ordering::Greater)
    }

    pub fn elemwise_greater_than_eq(&self, rhs: &ConstValue) -> ConstValue {
        self.relational(rhs, |o| o != std::cmp::Ordering::Less)
    }

    /// Ordering comparisons apply to scalars only.
    fn relational(&self, rhs: &ConstValue, accept: impl Fn(std::cmp::Ordering) -> bool) -> ConstValue {
        if !self.is_scalar() || !rhs.is_scalar() {
            return ConstValue::Error;
        }
        self.zip(rhs, |a, b| {
            let ordering = match (a, b) {
                (ScalarElem::Int(x), ScalarElem::Int(y)) => x.cmp(&y),
                (ScalarElem::Uint(x), ScalarElem::Uint(y)) => x.cmp(&y),
                (ScalarElem::Float(x), ScalarElem::Float(y)) => x.partial_cmp(&y)?,
                (ScalarElem::Double(x), ScalarElem::Double(y)) => x.partial_cmp(&y)?,
                _ => return None,
            };
            Some(ScalarElem::Bool(accept(ordering)))
        })
    }

    pub fn elemwise_bit_and(&self, rhs: &ConstValue) -> ConstValue {
        self.bitwise(rhs, |x, y| x & y, |x, y| x & y)
    }

    pub fn elemwise_bit_or(&self, rhs: &ConstValue) -> ConstValue {
        self.bitwise(rhs, |x, y| x | y, |x, y| x | y)
    }

    pub fn elemwise_bit_xor(&self, rhs: &ConstValue) -> ConstValue {
        self.bitwise(rhs, |x, y| x ^ y, |x, y| x ^ y)
    }

    fn bitwise(
        &self,
        rhs: &ConstValue,
        f_int: impl Fn(i32, i32) -> i32,
        f_uint: impl Fn(u32, u32) -> u32,
    ) -> ConstValue {
        self.zip(rhs, |a, b| match (a, b) {
            (ScalarElem::Int(x), ScalarElem::Int(y)) => Some(ScalarElem::Int(f_int(x, y))),
            (ScalarElem::Uint(x), ScalarElem::Uint(y)) => Some(ScalarElem::Uint(f_uint(x, y))),
            _ => None,
        })
    }

    pub fn elemwise_shift_left(&self, rhs: &ConstValue) -> ConstValue {
        self.zip(rhs, |a, b| {
            let by = match b {
                ScalarElem::Int(v) => v as u32,
                ScalarElem::Uint(v) => v,
                _ => return None,
            };
            match a {
                ScalarElem::Int(v) => Some(ScalarElem::Int(v.wrapping_shl(by))),
                ScalarElem::Uint(v) => Some(ScalarElem::Uint(v.wrapping_shl(by))),
                _ => None,
            }
        })
    }

    pub fn elemwise_shift_right(&self, rhs: &ConstValue) -> ConstValue {
        self.zip(rhs, |a, b| {
            let by = match b {
                ScalarElem::Int(v) => v as u32,
                ScalarElem::Uint(v) => v,
                _ => return None,
            };
            match a {
                ScalarElem::Int(v) => Some(ScalarElem::Int(v.wrapping_shr(by))),
                ScalarElem::Uint(v) => Some(ScalarElem::Uint(v.wrapping_shr(by))),
                _ => None,
            }
        })
    }

    pub fn elemwise_logical_and(&self, rhs: &ConstValue) -> ConstValue {
        self.logical(rhs, |x, y| x && y)
    }

    pub fn elemwise_logical_or(&self, rhs: &ConstValue) -> ConstValue {
        self.logical(rhs, |x, y| x || y)
    }

    pub fn elemwise_logical_xor(&self, rhs: &ConstValue) -> ConstValue {
        self.logical(rhs, |x, y| x != y)
    }

    fn logical(&self, rhs: &ConstValue, f: impl Fn(bool, bool) -> bool) -> ConstValue {
        self.zip(rhs, |a, b| match (a, b) {
            (ScalarElem::Bool(x), ScalarElem::Bool(y)) => Some(ScalarElem::Bool(f(x, y))),
            _ => None,
        })
    }

    //
    // Builtin math functions (element-wise)
    //

    /// Float-family functions cast integral inputs to float first, matching
    /// the implicit conversion applied at the call.
    fn float_unary(&self, f32_op: impl Fn(f32) -> f32, f64_op: impl Fn(f64) -> f64) -> ConstValue {
        let promoted = match self.scalar_kind() {
            Some(ScalarKind::Float) | Some(ScalarKind::Double) => self.clone(),
            Some(ScalarKind::Bool) => return ConstValue::Error,
            Some(_) => self.cast_scalar(ScalarKind::Float),
            None => return ConstValue::Error,
        };
        promoted.map(|e| match e {
            ScalarElem::Float(v) => Some(ScalarElem::Float(f32_op(v))),
            ScalarElem::Double(v) => Some(ScalarElem::Double(f64_op(v))),
            _ => None,
        })
    }

    pub fn elemwise_radians(&self) -> ConstValue {
        self.float_unary(|v| v.to_radians(), |v| v.to_radians())
    }
    pub fn elemwise_degrees(&self) -> ConstValue {
        self.float_unary(|v| v.to_degrees(), |v| v.to_degrees())
    }
    pub fn elemwise_sin(&self) -> ConstValue {
        self.float_unary(f32::sin, f64::sin)
    }
    pub fn elemwise_cos(&self) -> ConstValue {
        self.float_unary(f32::cos, f64::cos)
    }
    pub fn elemwise_asin(&self) -> ConstValue {
        self.float_unary(f32::asin, f64::asin)
    }
    pub fn elemwise_acos(&self) -> ConstValue {
        self.float_unary(f32::acos, f64::acos)
    }
    pub fn elemwise_exp(&self) -> ConstValue {
        self.float_unary(f32::exp, f64::exp)
    }
    pub fn elemwise_log(&self) -> ConstValue {
        self.float_unary(f32::ln, f64::ln)
    }
    pub fn elemwise_exp2(&self) -> ConstValue {
        self.float_unary(f32::exp2, f64::exp2)
    }
    pub fn elemwise_log2(&self) -> ConstValue {
        self.float_unary(f32::log2, f64::log2)
    }
    pub fn elemwise_sqrt(&self) -> ConstValue {
        self.float_unary(f32::sqrt, f64::sqrt)
    }
    pub fn elemwise_inverse_sqrt(&self) -> ConstValue {
        self.float_unary(|v| v.sqrt().recip(), |v| v.sqrt().recip())
    }
    pub fn elemwise_floor(&self) -> ConstValue {
        self.float_unary(f32::floor, f64::floor)
    }
    pub fn elemwise_trunc(&self) -> ConstValue {
        self.float_unary(f32::trunc, f64::trunc)
    }
    pub fn elemwise_round(&self) -> ConstValue {
        self.float_unary(f32::round, f64::round)
    }
    pub fn elemwise_ceil(&self) -> ConstValue {
        self.float_unary(f32::ceil, f64::ceil)
    }

    pub fn elemwise_abs(&self) -> ConstValue {
        self.map(|e| match e {
            ScalarElem::Int(v) => Some(ScalarElem::Int(v.wrapping_abs())),
            ScalarElem::Uint(v) => Some(ScalarElem::Uint(v)),
            ScalarElem::Float(v) => Some(ScalarElem::Float(v.abs())),
            ScalarElem::Double(v) => Some(ScalarElem::Double(v.abs())),
            ScalarElem::Bool(_) => None,
        })
    }

    pub fn elemwise_sign(&self) -> ConstValue {
        self.map(|e| match e {
            ScalarElem::Int(v) => Some(ScalarElem::Int(v.signum())),
            ScalarElem::Uint(v) => Some(ScalarElem::Uint((v != 0) as u32)),
            ScalarElem::Float(v) => Some(ScalarElem::Float(if v == 0.0 { 0.0 } else { v.signum() })),
            ScalarElem::Double(v) => Some(ScalarElem::Double(if v == 0.0 { 0.0 } else { v.signum() })),
            ScalarElem::Bool(_) => None,
        })
    }

    pub fn elemwise_min(&self, rhs: &ConstValue) -> ConstValue {
        self.zip(rhs, |a, b| match (a, b) {
            (ScalarElem::Int(x), ScalarElem::Int(y)) => Some(ScalarElem::Int(x.min(y))),
            (ScalarElem::Uint(x), ScalarElem::Uint(y)) => Some(ScalarElem::Uint(x.min(y))),
            (ScalarElem::Float(x), ScalarElem::Float(y)) => Some(ScalarElem::Float(x.min(y))),
            (ScalarElem::Double(x), ScalarElem::Double(y)) => Some(ScalarElem::Double(x.min(y))),
            _ => None,
        })
    }

    pub fn elemwise_max(&self, rhs: &ConstValue) -> ConstValue {
        self.zip(rhs, |a, b| match (a, b) {
            (ScalarElem::Int(x), ScalarElem::Int(y)) => Some(ScalarElem::Int(x.max(y))),
            (ScalarElem::Uint(x), ScalarElem::Uint(y)) => Some(ScalarElem::Uint(x.max(y))),
            (ScalarElem::Float(x), ScalarElem::Float(y)) => Some(ScalarElem::Float(x.max(y))),
            (ScalarElem::Double(x), ScalarElem::Double(y)) => Some(ScalarElem::Double(x.max(y))),
            _ => None,
        })
    }

    pub fn elemwise_pow(&self, rhs: &ConstValue) -> ConstValue {
        let lhs = match self.scalar_kind() {
            Some(kind) if kind.is_integral() => self.cast_scalar(ScalarKind::Float),
            _ => self.clone(),
        };
        let rhs = match rhs.scalar_kind() {
            Some(kind) if kind.is_integral() => rhs.cast_scalar(ScalarKind::Float),
            _ => rhs.clone(),
        };
        lhs.zip(&rhs, |a, b| match (a, b) {
            (ScalarElem::Float(x), ScalarElem::Float(y)) => Some(ScalarElem::Float(x.powf(y))),
            (ScalarElem::Double(x), ScalarElem::Double(y)) => Some(ScalarElem::Double(x.powf(y))),
            _ => None,
        })
    }

    pub fn elemwise_clamp(&self, lo: &ConstValue, hi: &ConstValue) -> ConstValue {
        self.elemwise_max(lo).elemwise_min(hi)
    }

    //
    // Constructor folding
    //

    /// `float(x)` and friends: a single argument narrowed to one scalar.
    pub fn construct_scalar(arg: &ConstValue, kind: ScalarKind) -> ConstValue {
        let first = match arg {
            ConstValue::Scalar(e) => Some(*e),
            ConstValue::Vector(elems) => elems.first().copied(),
            ConstValue::Matrix { elems, .. } => elems.first().copied(),
            ConstValue::Error => None,
        };
        match first.and_then(|e| e.cast(kind)) {
            Some(e) => ConstValue::Scalar(e),
            None => ConstValue::Error,
        }
    }

    /// Single-argument vector constructor: scalar broadcast, or prefix of a
    /// longer vector.
    pub fn construct_vector(arg: &ConstValue, kind: ScalarKind, size: usize) -> ConstValue {
        let casted = arg.cast_scalar(kind);
        match casted {
            ConstValue::Scalar(e) => ConstValue::Vector(vec![e; size]),
            ConstValue::Vector(elems) if elems.len() >= size => {
                ConstValue::Vector(elems[..size].to_vec())
            }
            _ => ConstValue::Error,
        }
    }

    /// Multi-argument vector constructor: components flatten in order and
    /// must fill the vector exactly.
    pub fn compose_vector(args: &[ConstValue], kind: ScalarKind, size: usize) -> ConstValue {
        let mut out = Vec::with_capacity(size);
        for arg in args {
            if arg.is_error() || arg.is_matrix() {
                return ConstValue::Error;
            }
            for &e in arg.elems() {
                match e.cast(kind) {
                    Some(e) => out.push(e),
                    None => return ConstValue::Error,
                }
            }
        }
        if out.len() == size {
            ConstValue::Vector(out)
        } else {
            ConstValue::Error
        }
    }

    /// Single-argument matrix constructor: a scalar fills the diagonal; a
    /// matrix resizes with identity padding.
    pub fn construct_matrix(arg: &ConstValue, kind: ScalarKind, cols: usize, rows: usize) -> ConstValue {
        let zero = ScalarElem::Float(0.0).cast(kind).expect("matrix kinds are castable");
        let one = ScalarElem::Float(1.0).cast(kind).expect("matrix kinds are castable");
        match arg.cast_scalar(kind) {
            ConstValue::Scalar(diag) => {
                let mut elems = vec![zero; cols * rows];
                for i in 0..cols.min(rows) {
                    elems[i * rows + i] = diag;
                }
                ConstValue::Matrix { cols: cols as u8, rows: rows as u8, elems }
            }
            ConstValue::Matrix { cols: src_cols, rows: src_rows, elems: src } => {
                let mut elems = vec![zero; cols * rows];
                for i in 0..cols.min(rows) {
                    elems[i * rows + i] = one;
                }
                for c in 0..cols.min(src_cols as usize) {
                    for r in 0..rows.min(src_rows as usize) {
                        elems[c * rows + r] = src[c * src_rows as usize + r];
                    }
                }
                ConstValue::Matrix { cols: cols as u8, rows: rows as u8, elems }
            }
            _ => ConstValue::Error,
        }
    }

    /// Multi-argument matrix constructor: scalars and vectors flatten in
    /// column-major order and must fill the matrix exactly.
    pub fn compose_matrix(args: &[ConstValue], kind: ScalarKind, cols: usize, rows: usize) -> ConstValue {
        let mut out = Vec::with_capacity(cols * rows);
        for arg in args {
            if arg.is_error() || arg.is_matrix() {
                return ConstValue::Error;
            }
            for &e in arg.elems() {
                match e.cast(kind) {
                    Some(e) => out.push(e),
                    None => return ConstValue::Error,
                }
            }
        }
        if out.len() == cols * rows {
            ConstValue::Matrix { cols: cols as u8, rows: rows as u8, elems: out }
        } else {
            ConstValue::Error
        }
    }
}

/// Join of two scalar kinds on the promotion lattice.
fn common_kind(a: ScalarKind, b: ScalarKind) -> Option<ScalarKind> {
    if a == b {
        return Some(a);
    }
    let ra = a.promotion_rank()?;
    let rb = b.promotion_rank()?;
    Some(if ra >= rb { a } else { b })
}

fn arith(
    a: ScalarElem,
    b: ScalarElem,
    f_int: impl Fn(i32, i32) -> i32,
    f_uint: impl Fn(u32, u32) -> u32,
    f_float: impl Fn(f32, f32) -> f32,
    f_double: impl Fn(f64, f64) -> f64,
) -> Option<ScalarElem> {
    match (a, b) {
        (ScalarElem::Int(x), ScalarElem::Int(y)) => Some(ScalarElem::Int(f_int(x, y))),
        (ScalarElem::Uint(x), ScalarElem::Uint(y)) => Some(ScalarElem::Uint(f_uint(x, y))),
        (ScalarElem::Float(x), ScalarElem::Float(y)) => Some(ScalarElem::Float(f_float(x, y))),
        (ScalarElem::Double(x), ScalarElem::Double(y)) => Some(ScalarElem::Double(f_double(x, y))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::vector_type;

    #[test]
    fn scalar_arithmetic_promotes() {
        let a = ConstValue::from_int(3);
        let b = ConstValue::from_float(1.5);
        assert_eq!(a.elemwise_plus(&b), ConstValue::from_float(4.5));
        assert_eq!(a.elemwise_mul(&a), ConstValue::from_int(9));
    }

    #[test]
    fn scalar_broadcasts_against_vector() {
        let v = ConstValue::Vector(vec![ScalarElem::Int(1), ScalarElem::Int(2), ScalarElem::Int(3)]);
        let s = ConstValue::from_int(10);
        let sum = v.elemwise_plus(&s);
        assert_eq!(
            sum,
            ConstValue::Vector(vec![ScalarElem::Int(11), ScalarElem::Int(12), ScalarElem::Int(13)])
        );
        let reversed = s.elemwise_minus(&v);
        assert_eq!(
            reversed,
            ConstValue::Vector(vec![ScalarElem::Int(9), ScalarElem::Int(8), ScalarElem::Int(7)])
        );
    }

    #[test]
    fn mismatched_shapes_are_error() {
        let v2 = ConstValue::Vector(vec![ScalarElem::Int(1), ScalarElem::Int(2)]);
        let v3 = ConstValue::Vector(vec![ScalarElem::Int(1), ScalarElem::Int(2), ScalarElem::Int(3)]);
        assert!(v2.elemwise_plus(&v3).is_error());
    }

    #[test]
    fn division_by_zero_folds_to_error() {
        assert!(ConstValue::from_int(1).elemwise_div(&ConstValue::from_int(0)).is_error());
        assert!(!ConstValue::from_float(1.0).elemwise_div(&ConstValue::from_float(0.0)).is_error());
    }

    #[test]
    fn comparisons_yield_bool() {
        let a = ConstValue::from_int(2);
        let b = ConstValue::from_int(5);
        assert_eq!(a.elemwise_less_than(&b), ConstValue::from_bool(true));
        assert_eq!(a.elemwise_equals(&b), ConstValue::from_bool(false));
        assert_eq!(a.elemwise_not_equals(&b), ConstValue::from_bool(true));
    }

    #[test]
    fn vector_equality_is_aggregate() {
        let v1 = ConstValue::Vector(vec![ScalarElem::Int(1), ScalarElem::Int(2)]);
        let v2 = ConstValue::Vector(vec![ScalarElem::Int(1), ScalarElem::Int(3)]);
        assert_eq!(v1.elemwise_equals(&v1), ConstValue::from_bool(true));
        assert_eq!(v1.elemwise_equals(&v2), ConstValue::from_bool(false));
    }

    #[test]
    fn swizzle_selection() {
        let v = ConstValue::Vector(vec![
            ScalarElem::Float(1.0),
            ScalarElem::Float(2.0),
            ScalarElem::Float(3.0),
        ]);
        assert_eq!(
            v.swizzle(&[0, 1]),
            ConstValue::Vector(vec![ScalarElem::Float(1.0), ScalarElem::Float(2.0)])
        );
        assert_eq!(v.swizzle(&[2]), ConstValue::from_float(3.0));
        assert!(v.swizzle(&[3]).is_error());
    }

    #[test]
    fn math_functions_cast_integral_inputs() {
        assert_eq!(ConstValue::from_int(0).elemwise_sin(), ConstValue::from_float(0.0));
        assert_eq!(ConstValue::from_float(4.0).elemwise_sqrt(), ConstValue::from_float(2.0));
        assert_eq!(ConstValue::from_int(2).elemwise_pow(&ConstValue::from_int(10)), ConstValue::from_float(1024.0));
        assert!(ConstValue::from_bool(true).elemwise_sin().is_error());
    }

    #[test]
    fn min_max_clamp_stay_integral() {
        let x = ConstValue::from_int(7);
        assert_eq!(x.elemwise_clamp(&ConstValue::from_int(0), &ConstValue::from_int(5)), ConstValue::from_int(5));
        assert_eq!(x.elemwise_min(&ConstValue::from_int(3)), ConstValue::from_int(3));
    }

    #[test]
    fn vector_constructors() {
        let splat = ConstValue::construct_vector(&ConstValue::from_float(1.0), ScalarKind::Float, 3);
        assert_eq!(splat.type_id(), vector_type(ScalarKind::Float, 3));

        let composed = ConstValue::compose_vector(
            &[ConstValue::from_int(1), ConstValue::from_int(2), ConstValue::from_int(3)],
            ScalarKind::Float,
            3,
        );
        assert_eq!(
            composed,
            ConstValue::Vector(vec![ScalarElem::Float(1.0), ScalarElem::Float(2.0), ScalarElem::Float(3.0)])
        );

        let wrong_count = ConstValue::compose_vector(
            &[ConstValue::from_int(1), ConstValue::from_int(2)],
            ScalarKind::Float,
            3,
        );
        assert!(wrong_count.is_error());
    }

    #[test]
    fn matrix_scalar_constructor_fills_diagonal() {
        let m = ConstValue::construct_matrix(&ConstValue::from_float(2.0), ScalarKind::Float, 2, 2);
        assert_eq!(
            m,
            ConstValue::Matrix {
                cols: 2,
                rows: 2,
                elems: vec![
                    ScalarElem::Float(2.0),
                    ScalarElem::Float(0.0),
                    ScalarElem::Float(0.0),
                    ScalarElem::Float(2.0),
                ],
            }
        );
        assert_eq!(m.element(1), ConstValue::Vector(vec![ScalarElem::Float(0.0), ScalarElem::Float(2.0)]));
        assert_eq!(m.length(), ConstValue::from_int(2));
    }

    #[test]
    fn type_id_agrees_with_shape() {
        let v = ConstValue::Vector(vec![ScalarElem::Float(0.0); 4]);
        assert_eq!(v.type_id(), vector_type(ScalarKind::Float, 4));
        assert_eq!(ConstValue::Error.type_id(), error_type());
    }
}
