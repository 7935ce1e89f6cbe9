//! IrContext: arena-based mutable IR storage.
//!
//! All IR entities (operations, values, blocks, regions) are stored in
//! `PrimaryMap`s owned by `IrContext`. Entity lists (operands, results)
//! use `EntityList + ListPool` for compact 4-byte per-field storage.
//! Use-chains are maintained by every mutation primitive, which makes
//! RAUW (replace all uses with) the workhorse of the rewrite framework.

use std::collections::BTreeMap;

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::*;

// ============================================================================
// Use-chain
// ============================================================================

/// A single use of a value: which operation uses it, at which operand index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: OpRef,
    pub operand_index: u32,
}

// ============================================================================
// Entity data types
// ============================================================================

/// Data for a single operation in the arena.
pub struct OperationData {
    pub location: Location,
    pub dialect: Symbol,
    pub name: Symbol,
    pub operands: EntityList<ValueRef>,
    pub results: EntityList<TypeRef>,
    pub attributes: BTreeMap<Symbol, Attribute>,
    pub regions: SmallVec<[RegionRef; 4]>,
    pub successors: SmallVec<[BlockRef; 4]>,
    pub parent_block: Option<BlockRef>,
}

/// Data for a single SSA value.
pub struct ValueData {
    pub def: ValueDef,
    pub ty: TypeRef,
}

/// Data for a block argument (type + optional attributes).
#[derive(Clone, Debug)]
pub struct BlockArgData {
    pub ty: TypeRef,
    pub attrs: BTreeMap<Symbol, Attribute>,
}

impl BlockArgData {
    pub fn of(ty: TypeRef) -> Self {
        Self {
            ty,
            attrs: BTreeMap::new(),
        }
    }
}

/// Data for a basic block.
pub struct BlockData {
    pub location: Location,
    pub args: Vec<BlockArgData>,
    pub ops: SmallVec<[OpRef; 4]>,
    pub parent_region: Option<RegionRef>,
}

impl BlockData {
    /// An empty, detached block with the given argument types.
    pub fn with_args(location: Location, args: Vec<BlockArgData>) -> Self {
        Self {
            location,
            args,
            ops: SmallVec::new(),
            parent_region: None,
        }
    }
}

/// Data for a region (list of blocks).
pub struct RegionData {
    pub location: Location,
    pub blocks: SmallVec<[BlockRef; 4]>,
    pub parent_op: Option<OpRef>,
}

impl RegionData {
    /// A detached region holding one block.
    pub fn single(location: Location, block: BlockRef) -> Self {
        Self {
            location,
            blocks: smallvec::smallvec![block],
            parent_op: None,
        }
    }
}

// ============================================================================
// IrContext
// ============================================================================

/// Arena-based mutable IR context.
///
/// Owns all IR entities and provides methods for creating, querying,
/// and mutating them. Use-chains are automatically maintained.
pub struct IrContext {
    ops: PrimaryMap<OpRef, OperationData>,
    values: PrimaryMap<ValueRef, ValueData>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    regions: PrimaryMap<RegionRef, RegionData>,

    /// Use-chain: for each value, the list of operations that use it.
    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,

    /// Type and path interners.
    pub types: TypeInterner,
    pub paths: PathInterner,

    /// Backing pools for EntityList storage.
    value_pool: ListPool<ValueRef>,
    type_pool: ListPool<TypeRef>,

    /// Mapping from operation to its result ValueRefs.
    result_values: SecondaryMap<OpRef, EntityList<ValueRef>>,
    /// Mapping from block to its argument ValueRefs.
    block_arg_values: SecondaryMap<BlockRef, EntityList<ValueRef>>,
}

impl IrContext {
    /// Create a new empty IR context.
    pub fn new() -> Self {
        Self {
            ops: PrimaryMap::new(),
            values: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            regions: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            types: TypeInterner::new(),
            paths: PathInterner::new(),
            value_pool: ListPool::new(),
            type_pool: ListPool::new(),
            result_values: SecondaryMap::new(),
            block_arg_values: SecondaryMap::new(),
        }
    }

    // ========================================================================
    // Operation
    // ========================================================================

    /// Create a new operation and allocate result values for it.
    ///
    /// The operation's operands are registered in the use-chain.
    /// The operation must not have a `parent_block` set — use `push_op` to
    /// attach it to a block after creation.
    ///
    /// # Panics
    ///
    /// Panics if `data.parent_block` is `Some`, or if any region in
    /// `data.regions` already belongs to another operation.
    pub fn create_op(&mut self, data: OperationData) -> OpRef {
        assert!(
            data.parent_block.is_none(),
            "create_op: operation must not have parent_block set; \
             use push_op to attach to a block after creation",
        );

        let operand_slice: SmallVec<[ValueRef; 8]> =
            data.operands.as_slice(&self.value_pool).into();

        let result_types: SmallVec<[TypeRef; 4]> = data.results.as_slice(&self.type_pool).into();

        let regions: SmallVec<[RegionRef; 4]> = data.regions.clone();

        let op = self.ops.push(data);

        // Back-link owned regions to this operation
        for &r in &regions {
            if let Some(existing) = self.regions[r].parent_op {
                panic!(
                    "create_op: region {r} already belongs to operation {existing}; \
                     cannot reassign to {op}",
                );
            }
            self.regions[r].parent_op = Some(op);
        }

        // Register operand uses
        for (idx, &val) in operand_slice.iter().enumerate() {
            self.uses[val].push(Use {
                user: op,
                operand_index: idx as u32,
            });
        }

        // Allocate result values
        let mut result_value_list = EntityList::new();
        for (idx, &ty) in result_types.iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::OpResult(op, idx as u32),
                ty,
            });
            result_value_list.push(v, &mut self.value_pool);
        }
        self.result_values[op] = result_value_list;

        op
    }

    /// Get immutable reference to operation data.
    pub fn op(&self, op: OpRef) -> &OperationData {
        &self.ops[op]
    }

    /// Get mutable reference to operation data.
    ///
    /// **Warning**: Modifying operands directly will desync the use-chain.
    /// Prefer `replace_all_uses` or re-creating the operation.
    pub fn op_mut(&mut self, op: OpRef) -> &mut OperationData {
        &mut self.ops[op]
    }

    /// Get the operands of an operation as a slice.
    pub fn op_operands(&self, op: OpRef) -> &[ValueRef] {
        self.ops[op].operands.as_slice(&self.value_pool)
    }

    /// Get the result types of an operation as a slice.
    pub fn op_result_types(&self, op: OpRef) -> &[TypeRef] {
        self.ops[op].results.as_slice(&self.type_pool)
    }

    /// Get the i-th result value of an operation.
    pub fn op_result(&self, op: OpRef, index: u32) -> ValueRef {
        self.result_values[op].as_slice(&self.value_pool)[index as usize]
    }

    /// Get all result values of an operation.
    pub fn op_results(&self, op: OpRef) -> &[ValueRef] {
        self.result_values[op].as_slice(&self.value_pool)
    }

    /// Get an attribute of an operation by name.
    pub fn op_attr(&self, op: OpRef, key: Symbol) -> Option<&Attribute> {
        self.ops[op].attributes.get(&key)
    }

    /// Remove an operation, clearing its use-chain entries.
    ///
    /// Does NOT remove it from its parent block. Use `detach_op` first.
    ///
    /// # Panics
    ///
    /// Panics if the operation is still attached to a block, or if any
    /// result value of the operation still has uses, as that would leave
    /// dangling references.
    pub fn remove_op(&mut self, op: OpRef) {
        assert!(
            self.ops[op].parent_block.is_none(),
            "remove_op: operation {op} is still attached to block {:?}; \
             call detach_op first",
            self.ops[op].parent_block.unwrap(),
        );

        let results: SmallVec<[ValueRef; 4]> =
            self.result_values[op].as_slice(&self.value_pool).into();
        for &val in &results {
            assert!(
                self.uses[val].is_empty(),
                "remove_op: result value {val} still has {} use(s); \
                 replace all uses before removing the operation",
                self.uses[val].len()
            );
        }

        let operands: SmallVec<[ValueRef; 8]> =
            self.ops[op].operands.as_slice(&self.value_pool).into();
        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].retain(|u| !(u.user == op && u.operand_index == idx as u32));
        }
    }

    // ========================================================================
    // Value
    // ========================================================================

    /// Get immutable reference to value data.
    pub fn value(&self, v: ValueRef) -> &ValueData {
        &self.values[v]
    }

    /// Get the type of a value.
    pub fn value_ty(&self, v: ValueRef) -> TypeRef {
        self.values[v].ty
    }

    /// Get the definition of a value.
    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v].def
    }

    // ========================================================================
    // Block
    // ========================================================================

    /// Create a new block and allocate argument values for it.
    pub fn create_block(&mut self, data: BlockData) -> BlockRef {
        let arg_types: Vec<TypeRef> = data.args.iter().map(|a| a.ty).collect();
        let block = self.blocks.push(data);

        let mut arg_value_list = EntityList::new();
        for (idx, ty) in arg_types.into_iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::BlockArg(block, idx as u32),
                ty,
            });
            arg_value_list.push(v, &mut self.value_pool);
        }
        self.block_arg_values[block] = arg_value_list;

        block
    }

    /// Get immutable reference to block data.
    pub fn block(&self, b: BlockRef) -> &BlockData {
        &self.blocks[b]
    }

    /// Get mutable reference to block data.
    pub fn block_mut(&mut self, b: BlockRef) -> &mut BlockData {
        &mut self.blocks[b]
    }

    /// Get the i-th block argument value.
    pub fn block_arg(&self, b: BlockRef, index: u32) -> ValueRef {
        self.block_arg_values[b].as_slice(&self.value_pool)[index as usize]
    }

    /// Get all block argument values.
    pub fn block_args(&self, b: BlockRef) -> &[ValueRef] {
        self.block_arg_values[b].as_slice(&self.value_pool)
    }

    /// Append a new argument to an existing block, returning its value.
    ///
    /// Used by signature conversion to add trailing parameters.
    pub fn add_block_arg(&mut self, block: BlockRef, arg: BlockArgData) -> ValueRef {
        let ty = arg.ty;
        let index = self.blocks[block].args.len() as u32;
        self.blocks[block].args.push(arg);
        let v = self.values.push(ValueData {
            def: ValueDef::BlockArg(block, index),
            ty,
        });
        self.block_arg_values[block].push(v, &mut self.value_pool);
        v
    }

    /// Change the type of an existing block argument in place.
    ///
    /// The argument's value keeps its identity (all uses stay valid); only
    /// its type changes.
    pub fn set_block_arg_type(&mut self, block: BlockRef, index: u32, ty: TypeRef) {
        self.blocks[block].args[index as usize].ty = ty;
        let v = self.block_arg_values[block].as_slice(&self.value_pool)[index as usize];
        self.values[v].ty = ty;
    }

    /// Append an operation to the end of a block.
    ///
    /// # Panics
    ///
    /// Panics if the operation already belongs to a block.
    pub fn push_op(&mut self, block: BlockRef, op: OpRef) {
        assert!(
            self.ops[op].parent_block.is_none(),
            "push_op: operation {op} already belongs to block {:?}; \
             remove it from the old block first",
            self.ops[op].parent_block.unwrap(),
        );
        self.ops[op].parent_block = Some(block);
        self.blocks[block].ops.push(op);
    }

    /// Insert an operation before `before` in the given block.
    ///
    /// # Panics
    ///
    /// Panics if the operation already belongs to a block, or if `before`
    /// is not found in the block.
    pub fn insert_op_before(&mut self, block: BlockRef, before: OpRef, op: OpRef) {
        assert!(
            self.ops[op].parent_block.is_none(),
            "insert_op_before: operation {op} already belongs to block {:?}; \
             remove it from the old block first",
            self.ops[op].parent_block.unwrap(),
        );
        let ops = &mut self.blocks[block].ops;
        let pos = ops
            .iter()
            .position(|&o| o == before)
            .expect("insert_op_before: `before` op not found in block");
        ops.insert(pos, op);
        self.ops[op].parent_block = Some(block);
    }

    /// Detach an operation from its parent block, if it has one.
    ///
    /// Does not destroy the operation.
    pub fn detach_op(&mut self, op: OpRef) {
        if let Some(block) = self.ops[op].parent_block {
            self.blocks[block].ops.retain(|o| *o != op);
            self.ops[op].parent_block = None;
        }
    }

    // ========================================================================
    // Region
    // ========================================================================

    /// Create a new region.
    ///
    /// # Panics
    ///
    /// Panics if any block in `data.blocks` already belongs to another region.
    pub fn create_region(&mut self, data: RegionData) -> RegionRef {
        let region = self.regions.push(data);

        let blocks: SmallVec<[BlockRef; 4]> = self.regions[region].blocks.clone();
        for &b in &blocks {
            if let Some(existing) = self.blocks[b].parent_region {
                panic!(
                    "create_region: block {b} already belongs to region {existing}; \
                     cannot reassign to {region}",
                );
            }
            self.blocks[b].parent_region = Some(region);
        }

        region
    }

    /// Get immutable reference to region data.
    pub fn region(&self, r: RegionRef) -> &RegionData {
        &self.regions[r]
    }

    /// Get mutable reference to region data.
    pub fn region_mut(&mut self, r: RegionRef) -> &mut RegionData {
        &mut self.regions[r]
    }

    /// Detach a region from its owning operation, so a replacement
    /// operation can take it over.
    pub fn detach_region(&mut self, r: RegionRef) {
        self.regions[r].parent_op = None;
    }

    // ========================================================================
    // Use-chain
    // ========================================================================

    /// Get all uses of a value.
    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }

    /// Check if a value has any uses.
    pub fn has_uses(&self, v: ValueRef) -> bool {
        !self.uses[v].is_empty()
    }

    // ========================================================================
    // RAUW (Replace All Uses With)
    // ========================================================================

    /// Replace all uses of `old` with `new` in all operations.
    ///
    /// Updates both operand lists and the use-chain.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) {
        if old == new {
            return;
        }
        let old_uses = std::mem::take(&mut self.uses[old]);

        for u in &old_uses {
            let operands = &mut self.ops[u.user].operands;
            let slice = operands.as_mut_slice(&mut self.value_pool);
            debug_assert_eq!(slice[u.operand_index as usize], old);
            slice[u.operand_index as usize] = new;

            self.uses[new].push(Use {
                user: u.user,
                operand_index: u.operand_index,
            });
        }
    }
}

impl Default for IrContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Builder for OperationData
// ============================================================================

/// Builder for constructing `OperationData` with pool-backed lists.
///
/// Collects operands and result types into `Vec`s, then packs them
/// into `EntityList`s on `build()`.
pub struct OperationDataBuilder {
    location: Location,
    dialect: Symbol,
    name: Symbol,
    operands: Vec<ValueRef>,
    results: Vec<TypeRef>,
    attributes: BTreeMap<Symbol, Attribute>,
    regions: SmallVec<[RegionRef; 4]>,
    successors: SmallVec<[BlockRef; 4]>,
}

impl OperationDataBuilder {
    pub fn new(location: Location, dialect: Symbol, name: Symbol) -> Self {
        Self {
            location,
            dialect,
            name,
            operands: Vec::new(),
            results: Vec::new(),
            attributes: BTreeMap::new(),
            regions: SmallVec::new(),
            successors: SmallVec::new(),
        }
    }

    pub fn operand(mut self, v: ValueRef) -> Self {
        self.operands.push(v);
        self
    }

    pub fn operands(mut self, vs: impl IntoIterator<Item = ValueRef>) -> Self {
        self.operands.extend(vs);
        self
    }

    pub fn result(mut self, ty: TypeRef) -> Self {
        self.results.push(ty);
        self
    }

    pub fn results(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.results.extend(tys);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: Attribute) -> Self {
        self.attributes.insert(key.into(), val);
        self
    }

    pub fn attrs(mut self, attrs: BTreeMap<Symbol, Attribute>) -> Self {
        self.attributes.extend(attrs);
        self
    }

    pub fn region(mut self, r: RegionRef) -> Self {
        self.regions.push(r);
        self
    }

    pub fn successor(mut self, b: BlockRef) -> Self {
        self.successors.push(b);
        self
    }

    /// Build the `OperationData`, packing vecs into `EntityList`s using
    /// the context's pools.
    pub fn build(self, ctx: &mut IrContext) -> OperationData {
        let mut operands = EntityList::new();
        for v in self.operands {
            operands.push(v, &mut ctx.value_pool);
        }
        let mut results = EntityList::new();
        for ty in self.results {
            results.push(ty, &mut ctx.type_pool);
        }
        OperationData {
            location: self.location,
            dialect: self.dialect,
            name: self.name,
            operands,
            results,
            attributes: self.attributes,
            regions: self.regions,
            successors: self.successors,
            parent_block: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Span;

    fn test_location(ctx: &mut IrContext) -> Location {
        let path = ctx.paths.intern("file:///test.loom".to_owned());
        Location::new(path, Span::new(0, 0))
    }

    fn f32_type(ctx: &mut IrContext) -> TypeRef {
        ctx.types
            .intern(TypeDataBuilder::new(Symbol::new("core"), Symbol::new("f32")).build())
    }

    #[test]
    fn create_op_and_read_back() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let f32_ty = f32_type(&mut ctx);

        let data = OperationDataBuilder::new(loc, Symbol::new("arith"), Symbol::new("const"))
            .result(f32_ty)
            .attr("value", Attribute::FloatBits(2.0f64.to_bits()))
            .build(&mut ctx);

        let op = ctx.create_op(data);

        assert_eq!(ctx.op(op).dialect, Symbol::new("arith"));
        assert_eq!(ctx.op(op).name, Symbol::new("const"));
        assert_eq!(ctx.op_result_types(op), &[f32_ty]);
        assert_eq!(
            ctx.op_attr(op, Symbol::new("value")),
            Some(&Attribute::FloatBits(2.0f64.to_bits()))
        );
    }

    #[test]
    fn op_result_values() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let f32_ty = f32_type(&mut ctx);

        let data = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("multi"))
            .result(f32_ty)
            .result(f32_ty)
            .build(&mut ctx);

        let op = ctx.create_op(data);

        let results = ctx.op_results(op);
        assert_eq!(results.len(), 2);

        let r0 = ctx.op_result(op, 0);
        let r1 = ctx.op_result(op, 1);
        assert_ne!(r0, r1);

        assert_eq!(ctx.value_ty(r0), f32_ty);
        assert_eq!(ctx.value_def(r0), ValueDef::OpResult(op, 0));
        assert_eq!(ctx.value_def(r1), ValueDef::OpResult(op, 1));
    }

    #[test]
    fn block_args() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let f32_ty = f32_type(&mut ctx);

        let block = ctx.create_block(BlockData::with_args(
            loc,
            vec![BlockArgData::of(f32_ty), BlockArgData::of(f32_ty)],
        ));

        let args = ctx.block_args(block);
        assert_eq!(args.len(), 2);

        let a0 = ctx.block_arg(block, 0);
        let a1 = ctx.block_arg(block, 1);
        assert_ne!(a0, a1);

        assert_eq!(ctx.value_ty(a0), f32_ty);
        assert_eq!(ctx.value_def(a0), ValueDef::BlockArg(block, 0));
        assert_eq!(ctx.value_def(a1), ValueDef::BlockArg(block, 1));
    }

    #[test]
    fn add_block_arg_appends() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let f32_ty = f32_type(&mut ctx);

        let block = ctx.create_block(BlockData::with_args(loc, vec![BlockArgData::of(f32_ty)]));
        assert_eq!(ctx.block_args(block).len(), 1);

        let v = ctx.add_block_arg(block, BlockArgData::of(f32_ty));
        assert_eq!(ctx.block_args(block).len(), 2);
        assert_eq!(ctx.block_args(block)[1], v);
        assert_eq!(ctx.value_def(v), ValueDef::BlockArg(block, 1));
        assert_eq!(ctx.value_ty(v), f32_ty);
    }

    #[test]
    fn set_block_arg_type_keeps_identity() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let f32_ty = f32_type(&mut ctx);
        let i32_ty = ctx
            .types
            .intern(TypeDataBuilder::new(Symbol::new("core"), Symbol::new("i32")).build());

        let block = ctx.create_block(BlockData::with_args(loc, vec![BlockArgData::of(f32_ty)]));
        let arg = ctx.block_arg(block, 0);

        // An op using the argument before the retype
        let data = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("use"))
            .operand(arg)
            .build(&mut ctx);
        let user = ctx.create_op(data);

        ctx.set_block_arg_type(block, 0, i32_ty);

        assert_eq!(ctx.value_ty(arg), i32_ty);
        assert_eq!(ctx.block(block).args[0].ty, i32_ty);
        // The use still refers to the same value
        assert_eq!(ctx.op_operands(user), &[arg]);
        assert_eq!(ctx.uses(arg).len(), 1);
    }

    #[test]
    fn use_chain_tracking() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let f32_ty = f32_type(&mut ctx);

        let data1 = OperationDataBuilder::new(loc, Symbol::new("arith"), Symbol::new("const"))
            .result(f32_ty)
            .build(&mut ctx);
        let op1 = ctx.create_op(data1);
        let v1 = ctx.op_result(op1, 0);

        assert!(!ctx.has_uses(v1));

        let data2 = OperationDataBuilder::new(loc, Symbol::new("arith"), Symbol::new("add"))
            .operand(v1)
            .operand(v1)
            .result(f32_ty)
            .build(&mut ctx);
        let op2 = ctx.create_op(data2);

        let uses = ctx.uses(v1);
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].user, op2);
        assert_eq!(uses[0].operand_index, 0);
        assert_eq!(uses[1].operand_index, 1);
    }

    #[test]
    fn rauw() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let f32_ty = f32_type(&mut ctx);

        let data1 = OperationDataBuilder::new(loc, Symbol::new("arith"), Symbol::new("const"))
            .result(f32_ty)
            .build(&mut ctx);
        let op1 = ctx.create_op(data1);
        let v_old = ctx.op_result(op1, 0);

        let data2 = OperationDataBuilder::new(loc, Symbol::new("arith"), Symbol::new("const"))
            .result(f32_ty)
            .build(&mut ctx);
        let op2 = ctx.create_op(data2);
        let v_new = ctx.op_result(op2, 0);

        let data3 = OperationDataBuilder::new(loc, Symbol::new("arith"), Symbol::new("add"))
            .operand(v_old)
            .operand(v_old)
            .result(f32_ty)
            .build(&mut ctx);
        let op3 = ctx.create_op(data3);

        assert_eq!(ctx.uses(v_old).len(), 2);
        assert!(!ctx.has_uses(v_new));

        ctx.replace_all_uses(v_old, v_new);

        assert!(!ctx.has_uses(v_old));
        assert_eq!(ctx.uses(v_new).len(), 2);

        let operands = ctx.op_operands(op3);
        assert_eq!(operands[0], v_new);
        assert_eq!(operands[1], v_new);
    }

    #[test]
    fn parent_tracking_and_detach() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let f32_ty = f32_type(&mut ctx);

        let block = ctx.create_block(BlockData::with_args(loc, vec![]));

        let data = OperationDataBuilder::new(loc, Symbol::new("arith"), Symbol::new("const"))
            .result(f32_ty)
            .build(&mut ctx);
        let op = ctx.create_op(data);

        assert_eq!(ctx.op(op).parent_block, None);

        ctx.push_op(block, op);
        assert_eq!(ctx.op(op).parent_block, Some(block));
        assert_eq!(ctx.block(block).ops.as_slice(), &[op]);

        let region = ctx.create_region(RegionData::single(loc, block));
        assert_eq!(ctx.block(block).parent_region, Some(region));
        assert_eq!(ctx.region(region).parent_op, None);

        ctx.detach_op(op);
        assert!(ctx.block(block).ops.is_empty());
        assert_eq!(ctx.op(op).parent_block, None);
    }

    #[test]
    fn insert_op_before() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let f32_ty = f32_type(&mut ctx);

        let block = ctx.create_block(BlockData::with_args(loc, vec![]));

        let mk_op = |ctx: &mut IrContext, name: &'static str| {
            let data = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new(name))
                .result(f32_ty)
                .build(ctx);
            ctx.create_op(data)
        };

        let op_a = mk_op(&mut ctx, "a");
        let op_c = mk_op(&mut ctx, "c");
        ctx.push_op(block, op_a);
        ctx.push_op(block, op_c);

        let op_b = mk_op(&mut ctx, "b");
        ctx.insert_op_before(block, op_c, op_b);

        assert_eq!(ctx.block(block).ops.as_slice(), &[op_a, op_b, op_c]);
        assert_eq!(ctx.op(op_b).parent_block, Some(block));
    }

    #[test]
    fn detach_region_allows_reattach() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);

        let block = ctx.create_block(BlockData::with_args(loc, vec![]));
        let region = ctx.create_region(RegionData::single(loc, block));

        let data1 = OperationDataBuilder::new(loc, Symbol::new("func"), Symbol::new("func"))
            .region(region)
            .build(&mut ctx);
        let op1 = ctx.create_op(data1);
        assert_eq!(ctx.region(region).parent_op, Some(op1));

        ctx.detach_region(region);
        assert_eq!(ctx.region(region).parent_op, None);

        let data2 = OperationDataBuilder::new(loc, Symbol::new("func"), Symbol::new("func"))
            .region(region)
            .build(&mut ctx);
        let op2 = ctx.create_op(data2);
        assert_eq!(ctx.region(region).parent_op, Some(op2));
    }

    #[test]
    #[should_panic(expected = "still has")]
    fn remove_op_panics_when_result_has_uses() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let f32_ty = f32_type(&mut ctx);

        let data1 = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("a"))
            .result(f32_ty)
            .build(&mut ctx);
        let op1 = ctx.create_op(data1);
        let v1 = ctx.op_result(op1, 0);

        let data2 = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("b"))
            .operand(v1)
            .result(f32_ty)
            .build(&mut ctx);
        let _op2 = ctx.create_op(data2);

        ctx.remove_op(op1);
    }

    #[test]
    #[should_panic(expected = "already belongs to operation")]
    fn create_op_panics_when_region_already_owned() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);

        let block = ctx.create_block(BlockData::with_args(loc, vec![]));
        let region = ctx.create_region(RegionData::single(loc, block));

        let data1 = OperationDataBuilder::new(loc, Symbol::new("func"), Symbol::new("func"))
            .region(region)
            .build(&mut ctx);
        let _op1 = ctx.create_op(data1);

        let data2 = OperationDataBuilder::new(loc, Symbol::new("func"), Symbol::new("func"))
            .region(region)
            .build(&mut ctx);
        ctx.create_op(data2);
    }
}
