//! Rewrite infrastructure.
//!
//! In-place mutation + RAUW-based rewriting: patterns record mutations into
//! a `PatternRewriter`, and the `PatternApplicator` commits them atomically
//! per match while iterating to a fixed point against a `ConversionTarget`.

pub mod applicator;
pub mod cloning;
pub mod conversion_target;
pub mod pattern;
pub mod rewriter;
pub mod type_converter;

pub use applicator::{ApplyResult, PatternApplicator};
pub use cloning::{ValueMapping, clone_op};
pub use conversion_target::{ConversionTarget, IllegalOp, LegalityCheck};
pub use pattern::RewritePattern;
pub use rewriter::{InsertPoint, PatternRewriter};
pub use type_converter::TypeConverter;

use crate::context::IrContext;
use crate::dialect::core::ModuleOp;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Thin wrapper around an `OpRef` pointing to a `core.module` operation.
///
/// Provides convenience methods for accessing the module body and its
/// top-level operations.
#[derive(Clone, Copy, Debug)]
pub struct Module(pub OpRef);

impl Module {
    /// Create a `Module` wrapper, verifying it points to a `core.module` op.
    pub fn new(ctx: &IrContext, op: OpRef) -> Option<Self> {
        ModuleOp::from_op(ctx, op).ok().map(|m| Module(m.op_ref()))
    }

    /// Get the underlying `OpRef`.
    pub fn op(self) -> OpRef {
        self.0
    }

    /// Get the module's body region.
    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    /// Get the first block of the module body.
    pub fn first_block(self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.region(self.body(ctx)).blocks.first().copied()
    }

    /// Get all top-level operations in the module's first block.
    pub fn ops(self, ctx: &IrContext) -> Vec<OpRef> {
        match self.first_block(ctx) {
            Some(block) => ctx.block(block).ops.to_vec(),
            None => vec![],
        }
    }

    /// Get the module name (from the `sym_name` attribute).
    pub fn name(self, ctx: &IrContext) -> Option<crate::symbol::Symbol> {
        ModuleOp::from_op(ctx, self.0).ok().map(|m| m.sym_name(ctx))
    }
}
