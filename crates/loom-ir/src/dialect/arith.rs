//! Arith dialect: scalar arithmetic.
//!
//! Only the operations kernel bodies actually need; the dialect is
//! unconditionally legal under bufferization.

use crate::context::{IrContext, OperationDataBuilder};
use crate::ops::{ConversionError, DialectOp, expect_kind};
use crate::refs::{OpRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::symbols;
use crate::types::{Attribute, Location};

symbols! {
    ATTR_VALUE => "value",
}

macro_rules! unary_result_accessor {
    ($ty:ident) => {
        impl $ty {
            pub fn result(&self, ctx: &IrContext) -> ValueRef {
                ctx.op_result(self.0, 0)
            }
        }
    };
}

/// `arith.const`: scalar constant with a `value` attribute.
#[derive(Clone, Copy, Debug)]
pub struct Const(OpRef);

impl DialectOp for Const {
    const DIALECT_NAME: &'static str = "arith";
    const OP_NAME: &'static str = "const";

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        expect_kind::<Self>(ctx, op)?;
        if !ctx.op(op).attributes.contains_key(&ATTR_VALUE()) {
            return Err(ConversionError::MissingAttribute("value"));
        }
        Ok(Const(op))
    }

    fn op_ref(&self) -> OpRef {
        self.0
    }
}

unary_result_accessor!(Const);

impl Const {
    pub fn value(&self, ctx: &IrContext) -> Attribute {
        ctx.op_attr(self.0, ATTR_VALUE())
            .cloned()
            .unwrap_or_else(|| panic!("arith.const: missing value attribute"))
    }
}

pub fn r#const(ctx: &mut IrContext, location: Location, ty: TypeRef, value: Attribute) -> Const {
    let data = OperationDataBuilder::new(location, Symbol::new("arith"), Symbol::new("const"))
        .result(ty)
        .attr(ATTR_VALUE(), value)
        .build(ctx);
    Const(ctx.create_op(data))
}

/// `arith.add`: scalar addition.
#[derive(Clone, Copy, Debug)]
pub struct Add(OpRef);

impl DialectOp for Add {
    const DIALECT_NAME: &'static str = "arith";
    const OP_NAME: &'static str = "add";

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        expect_kind::<Self>(ctx, op)?;
        Ok(Add(op))
    }

    fn op_ref(&self) -> OpRef {
        self.0
    }
}

unary_result_accessor!(Add);

pub fn add(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    ty: TypeRef,
) -> Add {
    let data = OperationDataBuilder::new(location, Symbol::new("arith"), Symbol::new("add"))
        .operand(lhs)
        .operand(rhs)
        .result(ty)
        .build(ctx);
    Add(ctx.create_op(data))
}

/// `arith.mul`: scalar multiplication.
#[derive(Clone, Copy, Debug)]
pub struct Mul(OpRef);

impl DialectOp for Mul {
    const DIALECT_NAME: &'static str = "arith";
    const OP_NAME: &'static str = "mul";

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        expect_kind::<Self>(ctx, op)?;
        Ok(Mul(op))
    }

    fn op_ref(&self) -> OpRef {
        self.0
    }
}

unary_result_accessor!(Mul);

pub fn mul(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    ty: TypeRef,
) -> Mul {
    let data = OperationDataBuilder::new(location, Symbol::new("arith"), Symbol::new("mul"))
        .operand(lhs)
        .operand(rhs)
        .result(ty)
        .build(ctx);
    Mul(ctx.create_op(data))
}
