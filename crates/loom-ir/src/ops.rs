//! Dialect operation utilities.
//!
//! Provides the `DialectOp` trait implemented by the typed wrappers in
//! `dialect::*`. Wrappers are thin `OpRef` newtypes that validate the
//! operation's kind (and required attributes/regions) on construction.

use crate::context::IrContext;
use crate::refs::OpRef;
use crate::symbol::Symbol;

/// Error when converting an operation to a dialect-specific wrapper type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// Operation name doesn't match expected dialect.operation.
    WrongOperation {
        expected: &'static str,
        actual: String,
    },
    /// Missing required attribute.
    MissingAttribute(&'static str),
    /// Attribute has wrong type.
    WrongAttributeType(&'static str),
    /// Missing region.
    MissingRegion,
}

/// Trait for dialect operation wrappers.
pub trait DialectOp: Sized + Copy {
    const DIALECT_NAME: &'static str;
    const OP_NAME: &'static str;

    /// Try to wrap an operation as this dialect op type.
    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError>;

    /// Get the underlying operation.
    fn op_ref(&self) -> OpRef;

    /// Check if an operation has this wrapper's dialect and name.
    fn matches(ctx: &IrContext, op: OpRef) -> bool {
        let data = ctx.op(op);
        data.dialect == Symbol::new(Self::DIALECT_NAME) && data.name == Symbol::new(Self::OP_NAME)
    }
}

/// Check the (dialect, name) pair of an op, producing the standard error.
pub(crate) fn expect_kind<T: DialectOp>(
    ctx: &IrContext,
    op: OpRef,
) -> Result<(), ConversionError> {
    if T::matches(ctx, op) {
        Ok(())
    } else {
        let data = ctx.op(op);
        Err(ConversionError::WrongOperation {
            expected: T::OP_NAME,
            actual: format!("{}.{}", data.dialect, data.name),
        })
    }
}
