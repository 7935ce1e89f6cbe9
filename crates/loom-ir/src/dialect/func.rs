//! Func dialect: functions and returns.
//!
//! A `func.func` operation carries its signature as a `func.fn` type in the
//! `type` attribute. The `func.fn` type stores result types first and then
//! parameter types in its type parameter list, with a `results` count
//! attribute separating the two; this keeps multi-result signatures in one
//! interned type.

use crate::context::{IrContext, OperationDataBuilder};
use crate::ops::{ConversionError, DialectOp, expect_kind};
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::symbols;
use crate::types::{Attribute, Location, TypeDataBuilder};

symbols! {
    ATTR_SYM_NAME => "sym_name",
    ATTR_TYPE => "type",
    ATTR_RESULTS => "results",
}

/// Intern a `func.fn` signature type.
pub fn fn_type(ctx: &mut IrContext, params: &[TypeRef], results: &[TypeRef]) -> TypeRef {
    ctx.types.intern(
        TypeDataBuilder::new(Symbol::new("func"), Symbol::new("fn"))
            .params(results.iter().copied())
            .params(params.iter().copied())
            .attr(ATTR_RESULTS(), Attribute::IntBits(results.len() as u64))
            .build(),
    )
}

/// Split a `func.fn` type into `(params, results)`.
///
/// Returns `None` if the type is not a `func.fn` or is malformed.
pub fn fn_signature(ctx: &IrContext, ty: TypeRef) -> Option<(Vec<TypeRef>, Vec<TypeRef>)> {
    if !ctx.types.is_dialect(ty, Symbol::new("func"), Symbol::new("fn")) {
        return None;
    }
    let data = ctx.types.get(ty);
    let num_results = match data.attrs.get(&ATTR_RESULTS())? {
        Attribute::IntBits(n) => *n as usize,
        _ => return None,
    };
    if num_results > data.params.len() {
        return None;
    }
    let results = data.params[..num_results].to_vec();
    let params = data.params[num_results..].to_vec();
    Some((params, results))
}

/// `func.func`: named function with one body region.
#[derive(Clone, Copy, Debug)]
pub struct Func(OpRef);

impl DialectOp for Func {
    const DIALECT_NAME: &'static str = "func";
    const OP_NAME: &'static str = "func";

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        expect_kind::<Self>(ctx, op)?;
        let data = ctx.op(op);
        if !data.attributes.contains_key(&ATTR_SYM_NAME()) {
            return Err(ConversionError::MissingAttribute("sym_name"));
        }
        if !data.attributes.contains_key(&ATTR_TYPE()) {
            return Err(ConversionError::MissingAttribute("type"));
        }
        if data.regions.is_empty() {
            return Err(ConversionError::MissingRegion);
        }
        Ok(Func(op))
    }

    fn op_ref(&self) -> OpRef {
        self.0
    }
}

impl Func {
    pub fn sym_name(&self, ctx: &IrContext) -> Symbol {
        match ctx.op_attr(self.0, ATTR_SYM_NAME()) {
            Some(Attribute::Symbol(s)) => *s,
            _ => panic!("func.func: expected Symbol attribute for sym_name"),
        }
    }

    pub fn r#type(&self, ctx: &IrContext) -> TypeRef {
        match ctx.op_attr(self.0, ATTR_TYPE()) {
            Some(Attribute::Type(ty)) => *ty,
            _ => panic!("func.func: expected Type attribute for type"),
        }
    }

    pub fn body(&self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn entry_block(&self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.region(self.body(ctx)).blocks.first().copied()
    }
}

pub fn func(
    ctx: &mut IrContext,
    location: Location,
    sym_name: Symbol,
    ty: TypeRef,
    body: RegionRef,
) -> Func {
    let data = OperationDataBuilder::new(location, Symbol::new("func"), Symbol::new("func"))
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(sym_name))
        .attr(ATTR_TYPE(), Attribute::Type(ty))
        .region(body)
        .build(ctx);
    Func(ctx.create_op(data))
}

/// `func.return`: function exit, returning zero or more values.
#[derive(Clone, Copy, Debug)]
pub struct Return(OpRef);

impl DialectOp for Return {
    const DIALECT_NAME: &'static str = "func";
    const OP_NAME: &'static str = "return";

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        expect_kind::<Self>(ctx, op)?;
        Ok(Return(op))
    }

    fn op_ref(&self) -> OpRef {
        self.0
    }
}

impl Return {
    pub fn values<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        ctx.op_operands(self.0)
    }
}

pub fn r#return(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Return {
    let data = OperationDataBuilder::new(location, Symbol::new("func"), Symbol::new("return"))
        .operands(values)
        .build(ctx);
    Return(ctx.create_op(data))
}
