//! Kernel dialect: iterator-based generic computations.
//!
//! `kernel.generic` describes a computation over an iteration space. Its
//! single body block binds, in order, one scalar per input operand followed
//! by one scalar per output operand; `kernel.yield` terminates the body and
//! produces the output scalars for the current iteration point.
//!
//! In tensor form the outputs are declared as results; after bufferization
//! the op has no results and the outputs are trailing buffer operands.

use crate::context::{IrContext, OperationDataBuilder};
use crate::ops::{ConversionError, DialectOp, expect_kind};
use crate::refs::{OpRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::symbols;
use crate::types::{Attribute, Location};

symbols! {
    ATTR_INPUTS => "inputs",
    ATTR_OUTPUTS => "outputs",
    ATTR_INDEXING_MAPS => "indexing_maps",
    ATTR_ITERATOR_KINDS => "iterator_kinds",
    ATTR_DOC => "doc",
}

/// `kernel.generic`: the generic computation operation.
#[derive(Clone, Copy, Debug)]
pub struct Generic(OpRef);

impl DialectOp for Generic {
    const DIALECT_NAME: &'static str = "kernel";
    const OP_NAME: &'static str = "generic";

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        expect_kind::<Self>(ctx, op)?;
        let data = ctx.op(op);
        if !data.attributes.contains_key(&ATTR_INPUTS()) {
            return Err(ConversionError::MissingAttribute("inputs"));
        }
        if !data.attributes.contains_key(&ATTR_OUTPUTS()) {
            return Err(ConversionError::MissingAttribute("outputs"));
        }
        if data.regions.is_empty() {
            return Err(ConversionError::MissingRegion);
        }
        Ok(Generic(op))
    }

    fn op_ref(&self) -> OpRef {
        self.0
    }
}

impl Generic {
    /// Number of input operands.
    pub fn inputs(&self, ctx: &IrContext) -> u64 {
        match ctx.op_attr(self.0, ATTR_INPUTS()) {
            Some(Attribute::IntBits(n)) => *n,
            _ => panic!("kernel.generic: expected IntBits attribute for inputs"),
        }
    }

    /// Number of outputs (declared results in tensor form, trailing buffer
    /// operands in buffer form).
    pub fn outputs(&self, ctx: &IrContext) -> u64 {
        match ctx.op_attr(self.0, ATTR_OUTPUTS()) {
            Some(Attribute::IntBits(n)) => *n,
            _ => panic!("kernel.generic: expected IntBits attribute for outputs"),
        }
    }

    pub fn body(&self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }
}

/// Create a `kernel.generic` in tensor form: `inputs` operands and one
/// declared tensor result per output.
#[allow(clippy::too_many_arguments)]
pub fn generic(
    ctx: &mut IrContext,
    location: Location,
    operands: impl IntoIterator<Item = ValueRef>,
    results: impl IntoIterator<Item = TypeRef>,
    indexing_maps: Attribute,
    iterator_kinds: Attribute,
    body: RegionRef,
) -> Generic {
    let operands: Vec<ValueRef> = operands.into_iter().collect();
    let results: Vec<TypeRef> = results.into_iter().collect();
    let inputs = operands.len() as u64;
    let outputs = results.len() as u64;
    let data = OperationDataBuilder::new(location, Symbol::new("kernel"), Symbol::new("generic"))
        .operands(operands)
        .results(results)
        .attr(ATTR_INPUTS(), Attribute::IntBits(inputs))
        .attr(ATTR_OUTPUTS(), Attribute::IntBits(outputs))
        .attr(ATTR_INDEXING_MAPS(), indexing_maps)
        .attr(ATTR_ITERATOR_KINDS(), iterator_kinds)
        .region(body)
        .build(ctx);
    Generic(ctx.create_op(data))
}

/// `kernel.yield`: body terminator producing the output scalars.
#[derive(Clone, Copy, Debug)]
pub struct Yield(OpRef);

impl DialectOp for Yield {
    const DIALECT_NAME: &'static str = "kernel";
    const OP_NAME: &'static str = "yield";

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        expect_kind::<Self>(ctx, op)?;
        Ok(Yield(op))
    }

    fn op_ref(&self) -> OpRef {
        self.0
    }
}

impl Yield {
    pub fn values<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        ctx.op_operands(self.0)
    }
}

pub fn r#yield(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Yield {
    let data = OperationDataBuilder::new(location, Symbol::new("kernel"), Symbol::new("yield"))
        .operands(values)
        .build(ctx);
    Yield(ctx.create_op(data))
}

/// An `indexing_maps` attribute where every operand uses the identity map.
pub fn identity_maps(count: usize) -> Attribute {
    Attribute::List(vec![Attribute::Symbol(Symbol::new("identity")); count])
}

/// An `iterator_kinds` attribute with the given number of parallel dims.
pub fn parallel_iterators(rank: usize) -> Attribute {
    Attribute::List(vec![Attribute::Symbol(Symbol::new("parallel")); rank])
}
