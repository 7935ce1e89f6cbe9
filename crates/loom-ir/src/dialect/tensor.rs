//! Tensor type: immutable, value-semantic arrays.
//!
//! A tensor type carries its element type as the single type parameter and
//! its shape as a `shape` attribute (list of extents). `DYNAMIC` marks an
//! extent that is not known at compile time; bufferization refuses such
//! tensors.

use smallvec::SmallVec;

use crate::context::IrContext;
use crate::refs::TypeRef;
use crate::symbol::Symbol;
use crate::symbols;
use crate::types::{Attribute, TypeDataBuilder};

symbols! {
    ATTR_SHAPE => "shape",
}

/// Marker for a dimension whose extent is unknown at compile time.
pub const DYNAMIC: u64 = u64::MAX;

/// Intern the tensor type with the given element type and shape.
pub fn tensor(ctx: &mut IrContext, element: TypeRef, shape: &[u64]) -> TypeRef {
    let dims = Attribute::List(shape.iter().map(|&d| Attribute::IntBits(d)).collect());
    ctx.types.intern(
        TypeDataBuilder::new(Symbol::new("tensor"), Symbol::new("tensor"))
            .param(element)
            .attr(ATTR_SHAPE(), dims)
            .build(),
    )
}

pub fn is_tensor(ctx: &IrContext, ty: TypeRef) -> bool {
    ctx.types
        .is_dialect(ty, Symbol::new("tensor"), Symbol::new("tensor"))
}

/// Element type of a tensor, or `None` for non-tensor types.
pub fn element_type(ctx: &IrContext, ty: TypeRef) -> Option<TypeRef> {
    if !is_tensor(ctx, ty) {
        return None;
    }
    ctx.types.get(ty).params.first().copied()
}

/// Shape of a tensor, or `None` for non-tensor types.
pub fn dims(ctx: &IrContext, ty: TypeRef) -> Option<SmallVec<[u64; 4]>> {
    if !is_tensor(ctx, ty) {
        return None;
    }
    decode_shape(ctx.types.get(ty).attrs.get(&ATTR_SHAPE())?)
}

/// Whether a tensor's shape is fully known at compile time.
///
/// Non-tensor types have no shape and report `false`.
pub fn has_static_shape(ctx: &IrContext, ty: TypeRef) -> bool {
    match dims(ctx, ty) {
        Some(shape) => shape.iter().all(|&d| d != DYNAMIC),
        None => false,
    }
}

pub(crate) fn decode_shape(attr: &Attribute) -> Option<SmallVec<[u64; 4]>> {
    let Attribute::List(items) = attr else {
        return None;
    };
    items
        .iter()
        .map(|item| match item {
            Attribute::IntBits(d) => Some(*d),
            _ => None,
        })
        .collect()
}
