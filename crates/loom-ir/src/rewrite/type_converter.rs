//! Type converter for dialect conversion.

use crate::context::IrContext;
use crate::refs::TypeRef;

/// Type conversion function signature.
///
/// Conversions take the context mutably because producing the converted
/// type usually means interning a new one.
type ConversionFn = dyn Fn(&mut IrContext, TypeRef) -> Option<TypeRef>;

/// Maps types during dialect conversion.
///
/// Holds a collection of conversion functions tried in order; the first
/// one that returns `Some` wins.
pub struct TypeConverter {
    conversions: Vec<Box<ConversionFn>>,
}

impl TypeConverter {
    /// Create a new empty type converter.
    pub fn new() -> Self {
        Self {
            conversions: Vec::new(),
        }
    }

    /// Add a type conversion function.
    pub fn add_conversion(
        &mut self,
        f: impl Fn(&mut IrContext, TypeRef) -> Option<TypeRef> + 'static,
    ) {
        self.conversions.push(Box::new(f));
    }

    /// Convert a type, trying each conversion function in order.
    ///
    /// Returns `None` if no conversion applies (type is already legal).
    pub fn convert_type(&self, ctx: &mut IrContext, ty: TypeRef) -> Option<TypeRef> {
        for conv in &self.conversions {
            if let Some(converted) = conv(ctx, ty) {
                return Some(converted);
            }
        }
        None
    }

    /// Convert a type, returning the original if no conversion applies.
    pub fn convert_type_or_identity(&self, ctx: &mut IrContext, ty: TypeRef) -> TypeRef {
        self.convert_type(ctx, ty).unwrap_or(ty)
    }
}

impl Default for TypeConverter {
    fn default() -> Self {
        Self::new()
    }
}
