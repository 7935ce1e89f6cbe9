//! Mem dialect: mutable buffers, allocation, and copies.
//!
//! `mem.buffer` pairs the same element-type/shape data as `tensor`, but
//! with read/write semantics: results are written through the buffer
//! instead of being produced as values.

use smallvec::SmallVec;

use crate::context::{IrContext, OperationDataBuilder};
use crate::dialect::tensor;
use crate::ops::{ConversionError, DialectOp, expect_kind};
use crate::refs::{OpRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, Location, TypeDataBuilder};

/// Intern the buffer type with the given element type and shape.
pub fn buffer(ctx: &mut IrContext, element: TypeRef, shape: &[u64]) -> TypeRef {
    let dims = Attribute::List(shape.iter().map(|&d| Attribute::IntBits(d)).collect());
    ctx.types.intern(
        TypeDataBuilder::new(Symbol::new("mem"), Symbol::new("buffer"))
            .param(element)
            .attr(tensor::ATTR_SHAPE(), dims)
            .build(),
    )
}

pub fn is_buffer(ctx: &IrContext, ty: TypeRef) -> bool {
    ctx.types
        .is_dialect(ty, Symbol::new("mem"), Symbol::new("buffer"))
}

/// Element type of a buffer, or `None` for non-buffer types.
pub fn element_type(ctx: &IrContext, ty: TypeRef) -> Option<TypeRef> {
    if !is_buffer(ctx, ty) {
        return None;
    }
    ctx.types.get(ty).params.first().copied()
}

/// Shape of a buffer, or `None` for non-buffer types.
pub fn dims(ctx: &IrContext, ty: TypeRef) -> Option<SmallVec<[u64; 4]>> {
    if !is_buffer(ctx, ty) {
        return None;
    }
    tensor::decode_shape(ctx.types.get(ty).attrs.get(&tensor::ATTR_SHAPE())?)
}

/// The buffer type matching a tensor type (same element type, same shape).
///
/// Returns `None` for non-tensor inputs.
pub fn buffer_of(ctx: &mut IrContext, tensor_ty: TypeRef) -> Option<TypeRef> {
    let element = tensor::element_type(ctx, tensor_ty)?;
    let shape = tensor::dims(ctx, tensor_ty)?;
    Some(buffer(ctx, element, &shape))
}

/// `mem.alloc`: allocate a buffer.
#[derive(Clone, Copy, Debug)]
pub struct Alloc(OpRef);

impl DialectOp for Alloc {
    const DIALECT_NAME: &'static str = "mem";
    const OP_NAME: &'static str = "alloc";

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        expect_kind::<Self>(ctx, op)?;
        Ok(Alloc(op))
    }

    fn op_ref(&self) -> OpRef {
        self.0
    }
}

impl Alloc {
    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

pub fn alloc(ctx: &mut IrContext, location: Location, buffer_ty: TypeRef) -> Alloc {
    let data = OperationDataBuilder::new(location, Symbol::new("mem"), Symbol::new("alloc"))
        .result(buffer_ty)
        .build(ctx);
    Alloc(ctx.create_op(data))
}

/// `mem.copy`: copy the contents of `src` into `dst`.
#[derive(Clone, Copy, Debug)]
pub struct Copy(OpRef);

impl DialectOp for Copy {
    const DIALECT_NAME: &'static str = "mem";
    const OP_NAME: &'static str = "copy";

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        expect_kind::<Self>(ctx, op)?;
        Ok(Copy(op))
    }

    fn op_ref(&self) -> OpRef {
        self.0
    }
}

impl Copy {
    pub fn src(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn dst(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }
}

pub fn copy(ctx: &mut IrContext, location: Location, src: ValueRef, dst: ValueRef) -> Copy {
    let data = OperationDataBuilder::new(location, Symbol::new("mem"), Symbol::new("copy"))
        .operand(src)
        .operand(dst)
        .build(ctx);
    Copy(ctx.create_op(data))
}
