//! Operation cloning with explicit value mapping.
//!
//! Cloning a region's operations into a new block requires rebinding every
//! reference to an old value (block argument or earlier result) to its new
//! counterpart. The mapping table is explicit: it is populated as new
//! instances are created and consulted for every cloned operand. Values
//! with no entry (defined outside the cloned scope) pass through unchanged.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::context::{BlockData, IrContext, OperationDataBuilder, RegionData};
use crate::refs::{BlockRef, OpRef, RegionRef, ValueRef};

/// Mapping table from old values to their clones.
#[derive(Default)]
pub struct ValueMapping {
    map: HashMap<ValueRef, ValueRef>,
}

impl ValueMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `old` is replaced by `new` in the cloned scope.
    pub fn map(&mut self, old: ValueRef, new: ValueRef) {
        self.map.insert(old, new);
    }

    /// Look up a value, falling back to identity for unmapped values.
    pub fn lookup(&self, v: ValueRef) -> ValueRef {
        self.map.get(&v).copied().unwrap_or(v)
    }
}

/// Clone one operation, rebinding operands through `mapping` and recording
/// the new result values in it.
///
/// Nested regions are cloned recursively. The clone is detached; the caller
/// attaches it to a block.
pub fn clone_op(ctx: &mut IrContext, op: OpRef, mapping: &mut ValueMapping) -> OpRef {
    let data = ctx.op(op);
    let location = data.location;
    let dialect = data.dialect;
    let name = data.name;
    let attributes = data.attributes.clone();
    let successors = data.successors.clone();
    let regions: Vec<RegionRef> = data.regions.to_vec();

    let operands: Vec<ValueRef> = ctx
        .op_operands(op)
        .iter()
        .map(|&v| mapping.lookup(v))
        .collect();
    let result_types = ctx.op_result_types(op).to_vec();

    let cloned_regions: Vec<RegionRef> = regions
        .iter()
        .map(|&r| clone_region(ctx, r, mapping))
        .collect();

    let mut builder = OperationDataBuilder::new(location, dialect, name)
        .operands(operands)
        .results(result_types)
        .attrs(attributes);
    for r in cloned_regions {
        builder = builder.region(r);
    }
    for b in successors {
        builder = builder.successor(b);
    }
    let data = builder.build(ctx);
    let new_op = ctx.create_op(data);

    let old_results = ctx.op_results(op).to_vec();
    let new_results = ctx.op_results(new_op).to_vec();
    for (old, new) in old_results.into_iter().zip(new_results) {
        mapping.map(old, new);
    }

    new_op
}

/// Clone a region: every block with its arguments, every operation in
/// original relative order.
pub fn clone_region(
    ctx: &mut IrContext,
    region: RegionRef,
    mapping: &mut ValueMapping,
) -> RegionRef {
    let blocks: Vec<BlockRef> = ctx.region(region).blocks.to_vec();
    let location = ctx.region(region).location;

    // Create all blocks first so block args are mapped before any operand
    // referencing them is cloned.
    let mut new_blocks = Vec::with_capacity(blocks.len());
    for &b in &blocks {
        let args = ctx.block(b).args.clone();
        let block_loc = ctx.block(b).location;
        let new_b = ctx.create_block(BlockData::with_args(block_loc, args));
        let arg_count = ctx.block_args(b).len();
        for i in 0..arg_count {
            let old_arg = ctx.block_arg(b, i as u32);
            let new_arg = ctx.block_arg(new_b, i as u32);
            mapping.map(old_arg, new_arg);
        }
        new_blocks.push(new_b);
    }

    for (&old_b, &new_b) in blocks.iter().zip(new_blocks.iter()) {
        let ops: Vec<OpRef> = ctx.block(old_b).ops.to_vec();
        for o in ops {
            let cloned = clone_op(ctx, o, mapping);
            ctx.push_op(new_b, cloned);
        }
    }

    let mut region_data = RegionData {
        location,
        blocks: SmallVec::new(),
        parent_op: None,
    };
    region_data.blocks.extend(new_blocks);
    ctx.create_region(region_data)
}
