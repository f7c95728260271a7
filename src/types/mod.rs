//! Canonical type descriptors and the interning context.
//!
//! Every type in a compilation is a [`TypeId`]; id equality is type identity.
//! Builtin types (error, void, scalars, vectors, matrices, samplers) occupy
//! a fixed prefix of the id space that is identical in every context, so a
//! `vec3` minted while compiling the preamble is the same id as a `vec3` in
//! any later invocation. Array and struct types are interned per
//! [`TypeContext`], which can layer over the shared preamble context.

pub mod const_value;

pub use const_value::{ConstValue, ScalarElem};

use crate::ast::NodeId;
use crate::tokenizer::TokenKind;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Scalar component kinds. The base language covers the first five; the
/// rest are extension widths that participate in literals but not in
/// implicit promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScalarKind {
    Bool,
    Int,
    Uint,
    Float,
    Double,
    Int8,
    Int16,
    Int64,
    Uint8,
    Uint16,
    Uint64,
    Float16,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 12] = [
        ScalarKind::Bool,
        ScalarKind::Int,
        ScalarKind::Uint,
        ScalarKind::Float,
        ScalarKind::Double,
        ScalarKind::Int8,
        ScalarKind::Int16,
        ScalarKind::Int64,
        ScalarKind::Uint8,
        ScalarKind::Uint16,
        ScalarKind::Uint64,
        ScalarKind::Float16,
    ];

    /// Kinds that have vector forms in the base language.
    const VECTOR_KINDS: [ScalarKind; 5] = [
        ScalarKind::Bool,
        ScalarKind::Int,
        ScalarKind::Uint,
        ScalarKind::Float,
        ScalarKind::Double,
    ];

    /// Kinds that have matrix forms.
    const MATRIX_KINDS: [ScalarKind; 2] = [ScalarKind::Float, ScalarKind::Double];

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            ScalarKind::Int
                | ScalarKind::Uint
                | ScalarKind::Int8
                | ScalarKind::Int16
                | ScalarKind::Int64
                | ScalarKind::Uint8
                | ScalarKind::Uint16
                | ScalarKind::Uint64
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, ScalarKind::Float | ScalarKind::Double | ScalarKind::Float16)
    }

    /// Position on the implicit-promotion lattice
    /// bool < int < uint < float < double. Extension kinds do not take part
    /// in promotion and have no rank.
    pub fn promotion_rank(self) -> Option<u8> {
        match self {
            ScalarKind::Bool => Some(0),
            ScalarKind::Int => Some(1),
            ScalarKind::Uint => Some(2),
            ScalarKind::Float => Some(3),
            ScalarKind::Double => Some(4),
            _ => None,
        }
    }

    pub fn glsl_name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Uint => "uint",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Int8 => "int8_t",
            ScalarKind::Int16 => "int16_t",
            ScalarKind::Int64 => "int64_t",
            ScalarKind::Uint8 => "uint8_t",
            ScalarKind::Uint16 => "uint16_t",
            ScalarKind::Uint64 => "uint64_t",
            ScalarKind::Float16 => "float16_t",
        }
    }

    fn vector_kind_index(self) -> Option<u32> {
        Self::VECTOR_KINDS.iter().position(|&k| k == self).map(|i| i as u32)
    }

    fn matrix_kind_index(self) -> Option<u32> {
        Self::MATRIX_KINDS.iter().position(|&k| k == self).map(|i| i as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SamplingDim {
    One,
    Two,
    Three,
    Rect,
    Cube,
    Buffer,
}

impl SamplingDim {
    const ALL: [SamplingDim; 6] = [
        SamplingDim::One,
        SamplingDim::Two,
        SamplingDim::Three,
        SamplingDim::Rect,
        SamplingDim::Cube,
        SamplingDim::Buffer,
    ];
}

/// Identity handle for a canonical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TypeId(u32);

/// Row/column shape of an arithmetic value; scalars are 1x1 and vectors a
/// single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueDim {
    pub rows: u8,
    pub cols: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructMemberType {
    pub name: String,
    pub ty: TypeId,
    /// Declaring member declaration and declarator index within it.
    pub decl: NodeId,
    pub declarator_index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub name: String,
    /// The declaring AST node (struct decl or interface block decl).
    pub decl: NodeId,
    pub members: Vec<StructMemberType>,
    pub is_block: bool,
}

impl StructType {
    pub fn find_member(&self, name: &str) -> Option<(usize, &StructMemberType)> {
        self.members.iter().enumerate().find(|(_, m)| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// Bottom type; all failed resolutions produce it.
    Error,
    Void,
    Scalar(ScalarKind),
    Vector { scalar: ScalarKind, size: u8 },
    /// `cols` columns of `rows`-sized column vectors, GLSL matCxR.
    Matrix { scalar: ScalarKind, cols: u8, rows: u8 },
    Sampler(SamplingDim),
    /// `element` is never itself an array; nested array types fold their
    /// dimensions into one `dim_sizes` list. A size of 0 is an
    /// unsized/error-sized dimension.
    Array { element: TypeId, dim_sizes: Vec<usize> },
    Struct(StructType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub kind: TypeKind,
    /// Display name, e.g. `vec3`, `float[4]`, `struct Light`.
    pub name: String,
    /// Cached transitively: true if a sampler hides anywhere inside.
    pub contains_opaque: bool,
}

impl Type {
    pub fn is_error(&self) -> bool {
        matches!(self.kind, TypeKind::Error)
    }
    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }
    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar(_))
    }
    pub fn is_vector(&self) -> bool {
        matches!(self.kind, TypeKind::Vector { .. })
    }
    pub fn is_matrix(&self) -> bool {
        matches!(self.kind, TypeKind::Matrix { .. })
    }
    pub fn is_sampler(&self) -> bool {
        matches!(self.kind, TypeKind::Sampler(_))
    }
    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }
    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeKind::Struct(_))
    }

    /// Scalars, vectors and matrices support per-component arithmetic.
    pub fn is_arithmetic(&self) -> bool {
        self.is_scalar() || self.is_vector() || self.is_matrix()
    }

    pub fn is_integral(&self) -> bool {
        match self.kind {
            TypeKind::Scalar(kind) => kind.is_integral(),
            TypeKind::Vector { scalar, .. } => scalar.is_integral(),
            _ => false,
        }
    }

    pub fn is_scalar_bool(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar(ScalarKind::Bool))
    }

    pub fn is_scalar_int(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar(ScalarKind::Int))
    }

    /// The underlying scalar kind of an arithmetic type.
    pub fn element_scalar_kind(&self) -> Option<ScalarKind> {
        match self.kind {
            TypeKind::Scalar(kind) => Some(kind),
            TypeKind::Vector { scalar, .. } => Some(scalar),
            TypeKind::Matrix { scalar, .. } => Some(scalar),
            _ => None,
        }
    }

    /// The number of underlying scalars of an arithmetic type.
    pub fn element_scalar_count(&self) -> Option<usize> {
        match self.kind {
            TypeKind::Scalar(_) => Some(1),
            TypeKind::Vector { size, .. } => Some(size as usize),
            TypeKind::Matrix { cols, rows, .. } => Some(cols as usize * rows as usize),
            _ => None,
        }
    }

    pub fn dimension(&self) -> ValueDim {
        match self.kind {
            TypeKind::Vector { size, .. } => ValueDim { rows: 1, cols: size },
            TypeKind::Matrix { cols, rows, .. } => ValueDim { rows, cols },
            _ => ValueDim { rows: 1, cols: 1 },
        }
    }

    pub fn struct_desc(&self) -> Option<&StructType> {
        match &self.kind {
            TypeKind::Struct(desc) => Some(desc),
            _ => None,
        }
    }
}

// Fixed id-space layout of the builtin prefix. The constructors below and
// `builtin_types()` must agree on this order.
const ID_ERROR: u32 = 0;
const ID_VOID: u32 = 1;
const SCALAR_BASE: u32 = 2;
const VECTOR_BASE: u32 = SCALAR_BASE + ScalarKind::ALL.len() as u32;
const MATRIX_BASE: u32 = VECTOR_BASE + 5 * 3;
const SAMPLER_BASE: u32 = MATRIX_BASE + 2 * 9;
const BUILTIN_COUNT: u32 = SAMPLER_BASE + 6;

static BUILTIN_TYPES: Lazy<Vec<Type>> = Lazy::new(build_builtin_types);

fn build_builtin_types() -> Vec<Type> {
    let mut types = Vec::with_capacity(BUILTIN_COUNT as usize);
    types.push(Type { kind: TypeKind::Error, name: "<error>".into(), contains_opaque: false });
    types.push(Type { kind: TypeKind::Void, name: "void".into(), contains_opaque: false });
    for kind in ScalarKind::ALL {
        types.push(Type {
            kind: TypeKind::Scalar(kind),
            name: kind.glsl_name().into(),
            contains_opaque: false,
        });
    }
    for kind in ScalarKind::VECTOR_KINDS {
        for size in 2u8..=4 {
            types.push(Type {
                kind: TypeKind::Vector { scalar: kind, size },
                name: vector_name(kind, size),
                contains_opaque: false,
            });
        }
    }
    for kind in ScalarKind::MATRIX_KINDS {
        for cols in 2u8..=4 {
            for rows in 2u8..=4 {
                let prefix = if kind == ScalarKind::Double { "dmat" } else { "mat" };
                types.push(Type {
                    kind: TypeKind::Matrix { scalar: kind, cols, rows },
                    name: format!("{prefix}{cols}x{rows}"),
                    contains_opaque: false,
                });
            }
        }
    }
    for dim in SamplingDim::ALL {
        let name = match dim {
            SamplingDim::One => "sampler1D",
            SamplingDim::Two => "sampler2D",
            SamplingDim::Three => "sampler3D",
            SamplingDim::Rect => "sampler2DRect",
            SamplingDim::Cube => "samplerCube",
            SamplingDim::Buffer => "samplerBuffer",
        };
        types.push(Type { kind: TypeKind::Sampler(dim), name: name.into(), contains_opaque: true });
    }
    debug_assert_eq!(types.len(), BUILTIN_COUNT as usize);
    types
}

fn vector_name(kind: ScalarKind, size: u8) -> String {
    let prefix = match kind {
        ScalarKind::Bool => "bvec",
        ScalarKind::Int => "ivec",
        ScalarKind::Uint => "uvec",
        ScalarKind::Double => "dvec",
        _ => "vec",
    };
    format!("{prefix}{size}")
}

/// The globally unique error type.
pub fn error_type() -> TypeId {
    TypeId(ID_ERROR)
}

pub fn void_type() -> TypeId {
    TypeId(ID_VOID)
}

pub fn scalar_type(kind: ScalarKind) -> TypeId {
    let index = ScalarKind::ALL.iter().position(|&k| k == kind).expect("kind is in ALL");
    TypeId(SCALAR_BASE + index as u32)
}

/// The vector type, or the error type when GLSL has no such vector.
pub fn vector_type(kind: ScalarKind, size: usize) -> TypeId {
    match (kind.vector_kind_index(), size) {
        (Some(k), 2..=4) => TypeId(VECTOR_BASE + k * 3 + (size as u32 - 2)),
        _ => error_type(),
    }
}

/// The matrix type, or the error type when GLSL has no such matrix.
pub fn matrix_type(kind: ScalarKind, cols: usize, rows: usize) -> TypeId {
    match (kind.matrix_kind_index(), cols, rows) {
        (Some(k), 2..=4, 2..=4) => {
            TypeId(MATRIX_BASE + k * 9 + (cols as u32 - 2) * 3 + (rows as u32 - 2))
        }
        _ => error_type(),
    }
}

pub fn sampler_type(dim: SamplingDim) -> TypeId {
    let index = SamplingDim::ALL.iter().position(|&d| d == dim).expect("dim is in ALL");
    TypeId(SAMPLER_BASE + index as u32)
}

/// The arithmetic type of `kind` with the given shape, or the error type.
pub fn arithmetic_type(kind: ScalarKind, dim: ValueDim) -> TypeId {
    match (dim.rows, dim.cols) {
        (1, 1) => scalar_type(kind),
        (1, cols) => vector_type(kind, cols as usize),
        (rows, cols) => matrix_type(kind, cols as usize, rows as usize),
    }
}

/// Maps a builtin type keyword to its type. `None` for non-type tokens.
pub fn builtin_type_from_token(kind: TokenKind) -> Option<TypeId> {
    use TokenKind::*;
    Some(match kind {
        KwVoid => void_type(),
        KwBool => scalar_type(ScalarKind::Bool),
        KwInt => scalar_type(ScalarKind::Int),
        KwUint => scalar_type(ScalarKind::Uint),
        KwFloat => scalar_type(ScalarKind::Float),
        KwDouble => scalar_type(ScalarKind::Double),
        KwVec2 => vector_type(ScalarKind::Float, 2),
        KwVec3 => vector_type(ScalarKind::Float, 3),
        KwVec4 => vector_type(ScalarKind::Float, 4),
        KwBvec2 => vector_type(ScalarKind::Bool, 2),
        KwBvec3 => vector_type(ScalarKind::Bool, 3),
        KwBvec4 => vector_type(ScalarKind::Bool, 4),
        KwIvec2 => vector_type(ScalarKind::Int, 2),
        KwIvec3 => vector_type(ScalarKind::Int, 3),
        KwIvec4 => vector_type(ScalarKind::Int, 4),
        KwUvec2 => vector_type(ScalarKind::Uint, 2),
        KwUvec3 => vector_type(ScalarKind::Uint, 3),
        KwUvec4 => vector_type(ScalarKind::Uint, 4),
        KwDvec2 => vector_type(ScalarKind::Double, 2),
        KwDvec3 => vector_type(ScalarKind::Double, 3),
        KwDvec4 => vector_type(ScalarKind::Double, 4),
        KwMat2 | KwMat2x2 => matrix_type(ScalarKind::Float, 2, 2),
        KwMat2x3 => matrix_type(ScalarKind::Float, 2, 3),
        KwMat2x4 => matrix_type(ScalarKind::Float, 2, 4),
        KwMat3x2 => matrix_type(ScalarKind::Float, 3, 2),
        KwMat3 | KwMat3x3 => matrix_type(ScalarKind::Float, 3, 3),
        KwMat3x4 => matrix_type(ScalarKind::Float, 3, 4),
        KwMat4x2 => matrix_type(ScalarKind::Float, 4, 2),
        KwMat4x3 => matrix_type(ScalarKind::Float, 4, 3),
        KwMat4 | KwMat4x4 => matrix_type(ScalarKind::Float, 4, 4),
        KwDmat2 => matrix_type(ScalarKind::Double, 2, 2),
        KwDmat3 => matrix_type(ScalarKind::Double, 3, 3),
        KwDmat4 => matrix_type(ScalarKind::Double, 4, 4),
        KwSampler1D | KwSampler1DArray => sampler_type(SamplingDim::One),
        KwSampler2D | KwSampler2DArray | KwSampler2DShadow => sampler_type(SamplingDim::Two),
        KwSampler3D => sampler_type(SamplingDim::Three),
        KwSampler2DRect => sampler_type(SamplingDim::Rect),
        KwSamplerCube | KwSamplerCubeShadow => sampler_type(SamplingDim::Cube),
        KwSamplerBuffer => sampler_type(SamplingDim::Buffer),
        _ => return None,
    })
}

/// True for keywords that name a builtin type.
pub fn is_type_keyword(kind: TokenKind) -> bool {
    builtin_type_from_token(kind).is_some()
}

/// Interns array and struct types; resolves every id to its descriptor.
#[derive(Debug, Default)]
pub struct TypeContext {
    base: Option<Arc<TypeContext>>,
    base_len: u32,
    types: Vec<Type>,
    array_lookup: HashMap<(TypeId, Vec<usize>), TypeId>,
}

impl TypeContext {
    pub fn new() -> Self {
        TypeContext {
            base: None,
            base_len: BUILTIN_COUNT,
            types: Vec::new(),
            array_lookup: HashMap::new(),
        }
    }

    pub fn layered(base: Arc<TypeContext>) -> Self {
        let base_len = base.total_len();
        TypeContext { base: Some(base), base_len, types: Vec::new(), array_lookup: HashMap::new() }
    }

    fn total_len(&self) -> u32 {
        self.base_len + self.types.len() as u32
    }

    pub fn get(&self, id: TypeId) -> &Type {
        if id.0 < BUILTIN_COUNT {
            return &BUILTIN_TYPES[id.0 as usize];
        }
        if id.0 < self.base_len {
            return self
                .base
                .as_ref()
                .expect("non-builtin id below base length without a base context")
                .get(id);
        }
        &self.types[(id.0 - self.base_len) as usize]
    }

    fn find_cached_array(&self, key: &(TypeId, Vec<usize>)) -> Option<TypeId> {
        if let Some(&id) = self.array_lookup.get(key) {
            return Some(id);
        }
        self.base.as_ref().and_then(|base| base.find_cached_array(key))
    }

    /// Intern the array type of `element` with the given dimensions. If the
    /// element is itself an array, its dimensions fold into the front of the
    /// new dimension list, so the element of an array type is never an
    /// array.
    pub fn get_array_type(&mut self, element: TypeId, dim_sizes: &[usize]) -> TypeId {
        if dim_sizes.is_empty() {
            return element;
        }

        let (real_element, real_dims) = match &self.get(element).kind {
            TypeKind::Array { element: inner, dim_sizes: inner_dims } => {
                let mut dims = inner_dims.clone();
                dims.extend_from_slice(dim_sizes);
                (*inner, dims)
            }
            _ => (element, dim_sizes.to_vec()),
        };
        debug_assert!(!self.get(real_element).is_array());

        let key = (real_element, real_dims);
        if let Some(id) = self.find_cached_array(&key) {
            return id;
        }

        let (real_element, real_dims) = key.clone();
        let mut name = self.get(real_element).name.clone();
        for &dim in &real_dims {
            if dim != 0 {
                name.push_str(&format!("[{dim}]"));
            } else {
                name.push_str("[]");
            }
        }
        let contains_opaque = self.get(real_element).contains_opaque;
        let id = TypeId(self.total_len());
        self.types.push(Type {
            kind: TypeKind::Array { element: real_element, dim_sizes: real_dims },
            name,
            contains_opaque,
        });
        self.array_lookup.insert(key, id);
        id
    }

    /// Create the unique type for a struct or interface block declaration.
    pub fn create_struct_type(&mut self, desc: StructType) -> TypeId {
        let contains_opaque = desc.members.iter().any(|m| self.get(m.ty).contains_opaque);
        let prefix = if desc.is_block { "block" } else { "struct" };
        let name = if desc.name.is_empty() {
            format!("{prefix} <anonymous>")
        } else {
            format!("{prefix} {}", desc.name)
        };
        let id = TypeId(self.total_len());
        self.types.push(Type { kind: TypeKind::Struct(desc), name, contains_opaque });
        id
    }

    /// Element type when indexing: arrays peel one dimension, vectors yield
    /// their scalar, matrices yield a column vector.
    pub fn index_element_type(&mut self, base: TypeId) -> TypeId {
        match &self.get(base).kind {
            TypeKind::Array { element, dim_sizes } => {
                let element = *element;
                let rest = dim_sizes[1..].to_vec();
                self.get_array_type(element, &rest)
            }
            TypeKind::Vector { scalar, .. } => scalar_type(*scalar),
            TypeKind::Matrix { scalar, rows, .. } => vector_type(*scalar, *rows as usize),
            _ => error_type(),
        }
    }

    /// True if `from` is implicitly convertible to `to`: identical types,
    /// scalar promotion along the base lattice, or element-wise promotion
    /// for same-shape vectors and matrices.
    pub fn is_convertible_to(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        let from_ty = self.get(from);
        let to_ty = self.get(to);
        match (&from_ty.kind, &to_ty.kind) {
            (TypeKind::Scalar(a), TypeKind::Scalar(b)) => scalar_kind_convertible(*a, *b),
            (
                TypeKind::Vector { scalar: a, size: n },
                TypeKind::Vector { scalar: b, size: m },
            ) => n == m && scalar_kind_convertible(*a, *b),
            (
                TypeKind::Matrix { scalar: a, cols: c1, rows: r1 },
                TypeKind::Matrix { scalar: b, cols: c2, rows: r2 },
            ) => c1 == c2 && r1 == r2 && scalar_kind_convertible(*a, *b),
            _ => false,
        }
    }

    /// True if converting `from` to `lhs_to` is strictly better than
    /// converting it to `rhs_to`: exact match wins, then the shorter
    /// promotion distance on the lattice.
    pub fn has_better_conversion(&self, from: TypeId, lhs_to: TypeId, rhs_to: TypeId) -> bool {
        if lhs_to == rhs_to {
            return false;
        }
        if from == lhs_to {
            return true;
        }
        if from == rhs_to {
            return false;
        }
        let distance = |to: TypeId| -> Option<u8> {
            let from_kind = self.get(from).element_scalar_kind()?;
            let to_kind = self.get(to).element_scalar_kind()?;
            let from_rank = from_kind.promotion_rank()?;
            let to_rank = to_kind.promotion_rank()?;
            to_rank.checked_sub(from_rank)
        };
        match (distance(lhs_to), distance(rhs_to)) {
            (Some(lhs), Some(rhs)) => lhs < rhs,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

fn scalar_kind_convertible(from: ScalarKind, to: ScalarKind) -> bool {
    if from == to {
        return true;
    }
    match (from.promotion_rank(), to.promotion_rank()) {
        (Some(from_rank), Some(to_rank)) => from_rank <= to_rank,
        // Extension kinds convert only to themselves.
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_interning_identity() {
        for kind in [ScalarKind::Bool, ScalarKind::Int, ScalarKind::Uint, ScalarKind::Float] {
            for size in 2..=4 {
                assert_eq!(vector_type(kind, size), vector_type(kind, size));
            }
        }
        assert_ne!(vector_type(ScalarKind::Float, 3), vector_type(ScalarKind::Float, 4));
        assert_ne!(vector_type(ScalarKind::Float, 3), vector_type(ScalarKind::Int, 3));
    }

    #[test]
    fn builtin_prefix_is_consistent() {
        let ctx = TypeContext::new();
        assert!(ctx.get(error_type()).is_error());
        assert!(ctx.get(void_type()).is_void());
        assert_eq!(ctx.get(vector_type(ScalarKind::Float, 3)).name, "vec3");
        assert_eq!(ctx.get(matrix_type(ScalarKind::Float, 2, 3)).name, "mat2x3");
        assert_eq!(ctx.get(scalar_type(ScalarKind::Double)).name, "double");
    }

    #[test]
    fn nonexistent_builtin_shapes_are_error() {
        assert!(vector_type(ScalarKind::Int8, 3) == error_type());
        assert!(matrix_type(ScalarKind::Int, 3, 3) == error_type());
        assert!(vector_type(ScalarKind::Float, 5) == error_type());
    }

    #[test]
    fn array_type_interning_and_folding() {
        let mut ctx = TypeContext::new();
        let float = scalar_type(ScalarKind::Float);

        let a = ctx.get_array_type(float, &[2, 3]);
        let b = ctx.get_array_type(float, &[2, 3]);
        assert_eq!(a, b);

        // Folding: array-of-array flattens its dimension lists.
        let inner = ctx.get_array_type(float, &[2]);
        let nested = ctx.get_array_type(inner, &[3]);
        let flat = ctx.get_array_type(float, &[2, 3]);
        assert_eq!(nested, flat);

        // Idempotence over two-step folding.
        let ab = ctx.get_array_type(float, &[4, 5]);
        let abcd = ctx.get_array_type(ab, &[6, 7]);
        assert_eq!(abcd, ctx.get_array_type(float, &[4, 5, 6, 7]));

        match &ctx.get(nested).kind {
            TypeKind::Array { element, dim_sizes } => {
                assert_eq!(*element, float);
                assert_eq!(dim_sizes, &[2, 3]);
            }
            other => panic!("expected array type, got {other:?}"),
        }
    }

    #[test]
    fn layered_context_resolves_base_types() {
        let mut base = TypeContext::new();
        let float = scalar_type(ScalarKind::Float);
        let arr = base.get_array_type(float, &[4]);
        let base = Arc::new(base);

        let mut layered = TypeContext::layered(base);
        assert_eq!(layered.get_array_type(float, &[4]), arr);
        assert!(layered.get(arr).is_array());
        assert_eq!(layered.get(arr).name, "float[4]");
    }

    #[test]
    fn conversion_lattice() {
        let ctx = TypeContext::new();
        let b = scalar_type(ScalarKind::Bool);
        let i = scalar_type(ScalarKind::Int);
        let u = scalar_type(ScalarKind::Uint);
        let f = scalar_type(ScalarKind::Float);
        let d = scalar_type(ScalarKind::Double);

        assert!(ctx.is_convertible_to(b, i));
        assert!(ctx.is_convertible_to(i, u));
        assert!(ctx.is_convertible_to(i, f));
        assert!(ctx.is_convertible_to(u, d));
        assert!(!ctx.is_convertible_to(f, i));
        assert!(!ctx.is_convertible_to(d, f));

        let vec3 = vector_type(ScalarKind::Float, 3);
        let ivec3 = vector_type(ScalarKind::Int, 3);
        let ivec2 = vector_type(ScalarKind::Int, 2);
        assert!(ctx.is_convertible_to(ivec3, vec3));
        assert!(!ctx.is_convertible_to(vec3, ivec3));
        assert!(!ctx.is_convertible_to(ivec2, vec3));
    }

    #[test]
    fn better_conversion_prefers_exact_then_shorter() {
        let ctx = TypeContext::new();
        let i = scalar_type(ScalarKind::Int);
        let u = scalar_type(ScalarKind::Uint);
        let f = scalar_type(ScalarKind::Float);

        // int -> int beats int -> float.
        assert!(ctx.has_better_conversion(i, i, f));
        assert!(!ctx.has_better_conversion(i, f, i));
        // int -> uint beats int -> float (shorter climb).
        assert!(ctx.has_better_conversion(i, u, f));
    }

    #[test]
    fn opaque_flag_propagates_into_aggregates() {
        let mut ctx = TypeContext::new();
        let sampler = sampler_type(SamplingDim::Two);
        let arr = ctx.get_array_type(sampler, &[2]);
        assert!(ctx.get(arr).contains_opaque);

        let desc = StructType {
            name: "Material".into(),
            decl: NodeId::PLACEHOLDER,
            members: vec![StructMemberType {
                name: "tex".into(),
                ty: sampler,
                decl: NodeId::PLACEHOLDER,
                declarator_index: 0,
            }],
            is_block: false,
        };
        let id = ctx.create_struct_type(desc);
        assert!(ctx.get(id).contains_opaque);
    }
}
