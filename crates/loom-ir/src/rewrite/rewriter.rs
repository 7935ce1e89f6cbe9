//! PatternRewriter: transactional mutation accumulation.
//!
//! Patterns record mutations here; the `PatternApplicator` applies them as
//! one logical unit only after the pattern reports a match. A declined
//! match leaves nothing observable attached to the IR.
//!
//! The rewriter carries an optional insertion cursor. By default, inserted
//! operations land immediately before the matched operation; while a cursor
//! is held (`with_cursor`), they land at the cursor's point instead. The
//! cursor is acquired scope-wise: the previous cursor is saved on entry and
//! restored on every exit path of the scope, including early decline.

use crate::context::IrContext;
use crate::refs::{BlockRef, OpRef, ValueRef};
use crate::rewrite::type_converter::TypeConverter;

/// A point in the program where operations can be inserted: within `block`,
/// immediately before `before` (or at the end of the block if `None`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertPoint {
    pub block: BlockRef,
    pub before: Option<OpRef>,
}

impl InsertPoint {
    /// Insertion point immediately before an operation already in a block.
    pub fn before(block: BlockRef, op: OpRef) -> Self {
        Self {
            block,
            before: Some(op),
        }
    }

    /// Insertion point at the start of a block.
    pub fn block_start(ctx: &IrContext, block: BlockRef) -> Self {
        Self {
            block,
            before: ctx.block(block).ops.first().copied(),
        }
    }
}

/// Accumulated mutations from a pattern rewrite.
pub(crate) struct Mutations {
    /// Operations to insert at explicit points, in order.
    pub(crate) placed_ops: Vec<(InsertPoint, OpRef)>,
    /// Operations to insert before the matched op's position.
    pub(crate) prefix_ops: Vec<OpRef>,
    /// The replacement operation (if any); results map 1:1 by index.
    pub(crate) replacement: Option<OpRef>,
    /// If set, the matched op is erased and its results mapped to these values.
    pub(crate) erase_values: Option<Vec<ValueRef>>,
}

/// Rewriter interface for patterns.
///
/// There is no operand remapping: operands are read directly from the
/// context, and value replacements are done via `IrContext::replace_all_uses`
/// when the mutations are applied.
pub struct PatternRewriter<'a> {
    type_converter: &'a TypeConverter,
    cursor: Option<InsertPoint>,
    placed_ops: Vec<(InsertPoint, OpRef)>,
    prefix_ops: Vec<OpRef>,
    replacement: Option<OpRef>,
    erase_values: Option<Vec<ValueRef>>,
}

impl<'a> PatternRewriter<'a> {
    /// Create a new empty rewriter with a reference to the type converter.
    pub(crate) fn new(type_converter: &'a TypeConverter) -> Self {
        Self {
            type_converter,
            cursor: None,
            placed_ops: Vec::new(),
            prefix_ops: Vec::new(),
            replacement: None,
            erase_values: None,
        }
    }

    /// Get a reference to the type converter.
    pub fn type_converter(&self) -> &TypeConverter {
        self.type_converter
    }

    // === Mutations ===

    /// Insert an operation at the current insertion point: at the held
    /// cursor if one is active, otherwise immediately before the matched
    /// operation.
    ///
    /// The op must already be created via `ctx.create_op()` but not yet
    /// attached to a block. Multiple calls accumulate operations in order.
    pub fn insert_op(&mut self, op: OpRef) {
        match self.cursor {
            Some(point) => self.placed_ops.push((point, op)),
            None => self.prefix_ops.push(op),
        }
    }

    /// Run `f` with the insertion cursor at `point`.
    ///
    /// The previous cursor is remembered and restored when `f` returns,
    /// whichever way it returns.
    pub fn with_cursor<R>(&mut self, point: InsertPoint, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.cursor.replace(point);
        let result = f(self);
        self.cursor = saved;
        result
    }

    /// Replace the matched operation with a new one.
    ///
    /// The applicator will RAUW old results → new results (1:1 by index),
    /// then remove the old op from its block and insert the new one in its
    /// place.
    pub fn replace_op(&mut self, new_op: OpRef) {
        debug_assert!(
            self.replacement.is_none() && self.erase_values.is_none(),
            "replace_op called after replace_op or erase_op"
        );
        self.replacement = Some(new_op);
    }

    /// Erase the matched operation, mapping its results to the given values.
    ///
    /// The replacement values must match the original result count.
    /// The applicator will RAUW each old result to the corresponding value.
    pub fn erase_op(&mut self, replacement_values: Vec<ValueRef>) {
        debug_assert!(
            self.replacement.is_none() && self.erase_values.is_none(),
            "erase_op called after replace_op or erase_op"
        );
        self.erase_values = Some(replacement_values);
    }

    // === Query ===

    /// Check if any mutation was recorded.
    pub(crate) fn has_mutations(&self) -> bool {
        !self.placed_ops.is_empty()
            || !self.prefix_ops.is_empty()
            || self.replacement.is_some()
            || self.erase_values.is_some()
    }

    /// Consume the rewriter and return accumulated mutations.
    pub(crate) fn take_mutations(self) -> Mutations {
        Mutations {
            placed_ops: self.placed_ops,
            prefix_ops: self.prefix_ops,
            replacement: self.replacement,
            erase_values: self.erase_values,
        }
    }
}

/// Apply mutations to the IR context.
///
/// Called by the applicator after a pattern returns `true`. Returns the
/// replacement operation if the matched op was replaced, so callers can
/// keep tracking a rewritten root.
pub(crate) fn apply_mutations(
    ctx: &mut IrContext,
    original_op: OpRef,
    mutations: Mutations,
) -> Option<OpRef> {
    let parent_block = ctx.op(original_op).parent_block;

    // 1. Insert ops at their explicit points (allocation placement).
    for (point, op) in &mutations.placed_ops {
        match point.before {
            Some(before) => ctx.insert_op_before(point.block, before, *op),
            None => ctx.push_op(point.block, *op),
        }
    }

    // 2. Insert prefix ops before the original op.
    if let Some(block) = parent_block {
        for prefix_op in &mutations.prefix_ops {
            ctx.insert_op_before(block, original_op, *prefix_op);
        }
    }

    // 3. Handle replacement or erasure.
    if let Some(new_op) = mutations.replacement {
        let old_results: Vec<ValueRef> = ctx.op_results(original_op).to_vec();
        let new_results: Vec<ValueRef> = ctx.op_results(new_op).to_vec();
        debug_assert_eq!(
            old_results.len(),
            new_results.len(),
            "replace_op: result count mismatch ({} vs {})",
            old_results.len(),
            new_results.len()
        );
        for (old_v, new_v) in old_results.iter().zip(new_results.iter()) {
            ctx.replace_all_uses(*old_v, *new_v);
        }

        // Remove old from block, insert new in its place.
        if let Some(block) = parent_block {
            let ops = ctx.block(block).ops.to_vec();
            let pos = ops.iter().position(|&o| o == original_op);
            ctx.detach_op(original_op);
            if let Some(pos) = pos {
                let ops_after = ctx.block(block).ops.to_vec();
                if pos < ops_after.len() {
                    ctx.insert_op_before(block, ops_after[pos], new_op);
                } else {
                    ctx.push_op(block, new_op);
                }
            } else {
                ctx.push_op(block, new_op);
            }
        }

        ctx.remove_op(original_op);
        Some(new_op)
    } else if let Some(erase_values) = mutations.erase_values {
        let old_results: Vec<ValueRef> = ctx.op_results(original_op).to_vec();
        debug_assert_eq!(
            old_results.len(),
            erase_values.len(),
            "erase_op: replacement value count mismatch ({} vs {})",
            old_results.len(),
            erase_values.len()
        );
        for (old_v, new_v) in old_results.iter().zip(erase_values.iter()) {
            ctx.replace_all_uses(*old_v, *new_v);
        }

        ctx.detach_op(original_op);
        ctx.remove_op(original_op);
        None
    } else {
        None
    }
}
