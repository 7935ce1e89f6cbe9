//! Loom IR crate.
//!
//! A small multi-level dialect IR for tensor kernel computations, with an
//! arena-based mutable representation, a dialect-conversion rewrite
//! framework, and the tensor-to-buffer lowering pass built on top of it.

// === IR infrastructure ===
pub mod context;
pub mod location;
pub mod ops;
pub mod printer;
pub mod refs;
pub mod symbol;
pub mod types;
pub mod validation;
pub mod walk;

// === Dialect modules ===
pub mod dialect;

// === Rewrite framework and passes ===
pub mod rewrite;
pub mod transforms;

pub use context::{
    BlockArgData, BlockData, IrContext, OperationData, OperationDataBuilder, RegionData, Use,
    ValueData,
};
pub use location::{Span, Spanned};
pub use ops::{ConversionError, DialectOp};
pub use refs::{BlockRef, OpRef, PathRef, RegionRef, TypeRef, ValueDef, ValueRef};
pub use rewrite::Module;
pub use symbol::Symbol;
pub use types::{Attribute, Location, PathInterner, TypeData, TypeDataBuilder, TypeInterner};
pub use walk::WalkAction;

// Re-export smallvec for use by dependents constructing IR data directly.
pub use smallvec;
