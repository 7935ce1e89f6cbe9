//! Value integrity and use-chain validation.
//!
//! The IR uses a mutable `IrContext` with explicit use-chains, so a buggy
//! rewrite can leave two kinds of damage:
//!
//! 1. **Scope violations**: an operand referencing a value that is not
//!    defined above its use — a stale value from a removed operation, or a
//!    definition that no longer dominates the use.
//! 2. **Use-chain inconsistencies**: the stored use-chain no longer matches
//!    the actual operands of live operations.
//!
//! `validate_op` walks a root operation (typically a function or module)
//! and reports both.

use std::collections::HashSet;
use std::fmt;

use crate::context::IrContext;
use crate::refs::{BlockRef, OpRef, RegionRef, ValueRef};

/// Describes an operand whose definition does not precede its use.
pub struct ScopeViolation {
    /// Full name of the consuming operation (e.g., "kernel.generic").
    pub consumer_op: String,
    /// Index of the offending operand within the consuming operation.
    pub operand_index: usize,
    /// Human-readable description of the value.
    pub value_description: String,
}

impl fmt::Display for ScopeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operand #{} of {} references {} before its definition",
            self.operand_index, self.consumer_op, self.value_description,
        )
    }
}

impl fmt::Debug for ScopeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Describes a use-chain inconsistency.
pub struct UseChainError {
    pub message: String,
}

impl fmt::Display for UseChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for UseChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Result of validation.
pub struct ValidationResult {
    pub scope_violations: Vec<ScopeViolation>,
    pub use_chain_errors: Vec<UseChainError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.scope_violations.is_empty() && self.use_chain_errors.is_empty()
    }
}

/// Validate everything nested in `root`.
pub fn validate_op(ctx: &IrContext, root: OpRef) -> ValidationResult {
    let mut result = ValidationResult {
        scope_violations: Vec::new(),
        use_chain_errors: Vec::new(),
    };

    // Values defined outside the root (e.g. operands the root itself
    // consumes) are considered visible.
    let mut visible: HashSet<ValueRef> = ctx.op_operands(root).iter().copied().collect();
    for &region in &ctx.op(root).regions {
        check_region(ctx, region, &visible, &mut result);
    }
    visible.extend(ctx.op_results(root).iter().copied());

    check_use_chains(ctx, root, &mut result);

    result
}

/// Check def-before-use in a region. Nested regions see the values visible
/// at their enclosing operation.
fn check_region(
    ctx: &IrContext,
    region: RegionRef,
    outer_visible: &HashSet<ValueRef>,
    result: &mut ValidationResult,
) {
    for &block in &ctx.region(region).blocks {
        check_block(ctx, block, outer_visible, result);
    }
}

fn check_block(
    ctx: &IrContext,
    block: BlockRef,
    outer_visible: &HashSet<ValueRef>,
    result: &mut ValidationResult,
) {
    let mut visible = outer_visible.clone();
    visible.extend(ctx.block_args(block).iter().copied());

    for &op in &ctx.block(block).ops {
        for (idx, &operand) in ctx.op_operands(op).iter().enumerate() {
            if !visible.contains(&operand) {
                let data = ctx.op(op);
                result.scope_violations.push(ScopeViolation {
                    consumer_op: format!("{}.{}", data.dialect, data.name),
                    operand_index: idx,
                    value_description: format!("{} ({})", operand, ctx.value_def(operand)),
                });
            }
        }
        for &region in &ctx.op(op).regions {
            check_region(ctx, region, &visible, result);
        }
        visible.extend(ctx.op_results(op).iter().copied());
    }
}

/// Check that every operand of every live op is registered in its value's
/// use-chain, and that registered uses point back at real operand slots.
fn check_use_chains(ctx: &IrContext, root: OpRef, result: &mut ValidationResult) {
    let mut live_ops: Vec<OpRef> = Vec::new();
    collect_ops(ctx, root, &mut live_ops);

    for &op in &live_ops {
        for (idx, &operand) in ctx.op_operands(op).iter().enumerate() {
            let registered = ctx
                .uses(operand)
                .iter()
                .any(|u| u.user == op && u.operand_index == idx as u32);
            if !registered {
                let data = ctx.op(op);
                result.use_chain_errors.push(UseChainError {
                    message: format!(
                        "operand #{} of {}.{} ({}) is not registered in the use-chain of {}",
                        idx, data.dialect, data.name, op, operand,
                    ),
                });
            }
        }

        for &value in ctx.op_results(op) {
            for u in ctx.uses(value) {
                let operands = ctx.op_operands(u.user);
                let slot = operands.get(u.operand_index as usize);
                if slot != Some(&value) {
                    result.use_chain_errors.push(UseChainError {
                        message: format!(
                            "use-chain of {} names {} operand #{}, which does not hold it",
                            value, u.user, u.operand_index,
                        ),
                    });
                }
            }
        }
    }
}

fn collect_ops(ctx: &IrContext, root: OpRef, out: &mut Vec<OpRef>) {
    out.push(root);
    for &region in &ctx.op(root).regions {
        for &block in &ctx.region(region).blocks {
            for &op in &ctx.block(block).ops {
                collect_ops(ctx, op, out);
            }
        }
    }
}
