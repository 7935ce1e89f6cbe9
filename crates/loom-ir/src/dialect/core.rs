//! Core dialect: the top-level module container and scalar types.

use crate::context::{BlockData, IrContext, OperationDataBuilder, RegionData};
use crate::ops::{ConversionError, DialectOp, expect_kind};
use crate::refs::{OpRef, TypeRef};
use crate::symbol::Symbol;
use crate::symbols;
use crate::types::{Attribute, Location, TypeDataBuilder};

symbols! {
    ATTR_SYM_NAME => "sym_name",
}

fn scalar(ctx: &mut IrContext, name: &'static str) -> TypeRef {
    ctx.types
        .intern(TypeDataBuilder::new(Symbol::new("core"), Symbol::new(name)).build())
}

pub fn f32(ctx: &mut IrContext) -> TypeRef {
    scalar(ctx, "f32")
}

pub fn f64(ctx: &mut IrContext) -> TypeRef {
    scalar(ctx, "f64")
}

pub fn i32(ctx: &mut IrContext) -> TypeRef {
    scalar(ctx, "i32")
}

pub fn i64(ctx: &mut IrContext) -> TypeRef {
    scalar(ctx, "i64")
}

/// `core.module`: named top-level container holding one region.
#[derive(Clone, Copy, Debug)]
pub struct ModuleOp(OpRef);

impl DialectOp for ModuleOp {
    const DIALECT_NAME: &'static str = "core";
    const OP_NAME: &'static str = "module";

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        expect_kind::<Self>(ctx, op)?;
        let data = ctx.op(op);
        if data.regions.is_empty() {
            return Err(ConversionError::MissingRegion);
        }
        if !data.attributes.contains_key(&ATTR_SYM_NAME()) {
            return Err(ConversionError::MissingAttribute("sym_name"));
        }
        Ok(ModuleOp(op))
    }

    fn op_ref(&self) -> OpRef {
        self.0
    }
}

impl ModuleOp {
    pub fn sym_name(&self, ctx: &IrContext) -> Symbol {
        match ctx.op_attr(self.0, ATTR_SYM_NAME()) {
            Some(Attribute::Symbol(s)) => *s,
            _ => panic!("core.module: expected Symbol attribute for sym_name"),
        }
    }

    pub fn body(&self, ctx: &IrContext) -> crate::refs::RegionRef {
        ctx.op(self.0).regions[0]
    }
}

/// Create an empty `core.module` with a single-block body region.
pub fn module(ctx: &mut IrContext, location: Location, sym_name: Symbol) -> ModuleOp {
    let block = ctx.create_block(BlockData::with_args(location, vec![]));
    let region = ctx.create_region(RegionData::single(location, block));
    let data = OperationDataBuilder::new(location, Symbol::new("core"), Symbol::new("module"))
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(sym_name))
        .region(region)
        .build(ctx);
    ModuleOp(ctx.create_op(data))
}
