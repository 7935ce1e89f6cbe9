//! PatternApplicator: fixpoint pattern application and full conversion.
//!
//! Visitor-based fixpoint iteration that applies rewrite patterns to a root
//! operation and everything nested inside it. Uses snapshots of block
//! operations and checks `parent_block` validity to skip deleted ops.
//!
//! The root operation itself is also matched (after its regions), so
//! patterns that rewrite the enclosing function — signature conversion —
//! run in the same fixpoint as patterns on the body. When the root is
//! replaced, iteration continues on the replacement.

use super::conversion_target::{ConversionTarget, IllegalOp};
use super::pattern::RewritePattern;
use super::rewriter::{self, PatternRewriter};
use super::type_converter::TypeConverter;
use crate::context::IrContext;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Result of applying rewrite patterns.
#[derive(Debug)]
pub struct ApplyResult {
    /// Number of fixpoint iterations performed.
    pub iterations: usize,
    /// Total number of pattern matches (mutations applied).
    pub total_changes: usize,
    /// Whether the fixpoint was reached (no changes in last iteration).
    pub reached_fixpoint: bool,
}

/// Applies rewrite patterns using visitor-based fixpoint iteration.
pub struct PatternApplicator {
    patterns: Vec<Box<dyn RewritePattern>>,
    max_iterations: usize,
    type_converter: TypeConverter,
}

impl PatternApplicator {
    /// Create a new applicator with the given type converter.
    pub fn new(type_converter: TypeConverter) -> Self {
        Self {
            patterns: Vec::new(),
            max_iterations: 10,
            type_converter,
        }
    }

    /// Add a rewrite pattern.
    pub fn add_pattern(mut self, pattern: impl RewritePattern + 'static) -> Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    /// Set maximum fixpoint iterations.
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Get a reference to the type converter.
    pub fn type_converter(&self) -> &TypeConverter {
        &self.type_converter
    }

    /// Full conversion: apply patterns until fixpoint, then verify that no
    /// illegal operation remains in the (possibly replaced) root.
    ///
    /// Returns the final root and iteration statistics, or the residual
    /// illegal operations.
    pub fn convert(
        &self,
        ctx: &mut IrContext,
        root: OpRef,
        target: &ConversionTarget,
    ) -> Result<(OpRef, ApplyResult), Vec<IllegalOp>> {
        let (root, result) = self.apply_partial(ctx, root);
        let illegal = target.verify(ctx, root);
        if illegal.is_empty() {
            Ok((root, result))
        } else {
            Err(illegal)
        }
    }

    /// Apply patterns without verification.
    ///
    /// Returns the (possibly replaced) root and iteration statistics.
    pub fn apply_partial(&self, ctx: &mut IrContext, root: OpRef) -> (OpRef, ApplyResult) {
        let mut total_changes = 0;
        let mut iterations = 0;
        let mut root = root;

        for _ in 0..self.max_iterations {
            iterations += 1;
            let (changes, new_root) = self.run_one_iteration(ctx, root);
            root = new_root;
            total_changes += changes;
            if changes == 0 {
                return (
                    root,
                    ApplyResult {
                        iterations,
                        total_changes,
                        reached_fixpoint: true,
                    },
                );
            }
        }

        (
            root,
            ApplyResult {
                iterations,
                total_changes,
                reached_fixpoint: false,
            },
        )
    }

    /// Run a single iteration: visit the root's regions, then the root.
    fn run_one_iteration(&self, ctx: &mut IrContext, root: OpRef) -> (usize, OpRef) {
        let mut changes = 0;

        let regions: Vec<RegionRef> = ctx.op(root).regions.to_vec();
        for region in regions {
            changes += self.visit_region(ctx, region);
        }

        let mut new_root = root;
        if let Some(replacement) = self.try_patterns(ctx, root, &mut changes) {
            new_root = replacement;
        }

        (changes, new_root)
    }

    fn visit_region(&self, ctx: &mut IrContext, region: RegionRef) -> usize {
        let mut changes = 0;
        let blocks: Vec<BlockRef> = ctx.region(region).blocks.to_vec();
        for block in blocks {
            changes += self.visit_block(ctx, block);
        }
        changes
    }

    fn visit_block(&self, ctx: &mut IrContext, block: BlockRef) -> usize {
        let mut changes = 0;

        // Snapshot the ops in this block
        let ops: Vec<OpRef> = ctx.block(block).ops.to_vec();

        for op in ops {
            // Skip ops that have been removed from their block
            if ctx.op(op).parent_block != Some(block) {
                continue;
            }

            // First, recurse into nested regions
            let regions: Vec<RegionRef> = ctx.op(op).regions.to_vec();
            for region in regions {
                changes += self.visit_region(ctx, region);
            }

            // Skip ops that were removed during nested processing
            if ctx.op(op).parent_block != Some(block) {
                continue;
            }

            self.try_patterns(ctx, op, &mut changes);
        }

        changes
    }

    /// Try each pattern on `op`; apply the first match.
    ///
    /// Returns the replacement op if the match replaced `op`.
    fn try_patterns(&self, ctx: &mut IrContext, op: OpRef, changes: &mut usize) -> Option<OpRef> {
        for pattern in &self.patterns {
            let mut rw = PatternRewriter::new(&self.type_converter);
            let matched = pattern.match_and_rewrite(ctx, op, &mut rw);
            if matched && rw.has_mutations() {
                let mutations = rw.take_mutations();
                let replacement = rewriter::apply_mutations(ctx, op, mutations);
                *changes += 1;
                // Only apply one pattern per op per iteration
                return replacement;
            }
        }
        None
    }
}
