//! Convert tensor-valued kernel computations to buffer form.
//!
//! Rewrites every function so that `kernel.generic` operations stop
//! producing tensor results and instead write through explicitly allocated
//! `mem.buffer` operands. Function signatures lose their tensor results and
//! gain one trailing output-buffer parameter per result; returns copy into
//! those parameters and return nothing.
//!
//! ```text
//! func.func @id(%arg: tensor<4xf32>) -> tensor<4xf32> {
//!   %r = kernel.generic %arg {...} : tensor<4xf32> { ... }
//!   func.return %r
//! }
//! ```
//! becomes:
//! ```text
//! func.func @id(%arg: buffer<4xf32>, %out: buffer<4xf32>) {
//!   %b = mem.alloc : buffer<4xf32>
//!   kernel.generic %arg, %b {...} { ... }
//!   mem.copy %b, %out
//!   func.return
//! }
//! ```
//!
//! Allocation placement is delegated to `AllocationPlacer`; moving the
//! allocations to better points and inserting the matching deallocations
//! are separate downstream passes.

use derive_more::{Display, Error};

use crate::context::{BlockArgData, BlockData, IrContext, OperationDataBuilder, RegionData};
use crate::dialect::{func, kernel, mem, tensor};
use crate::ops::DialectOp;
use crate::refs::{OpRef, TypeRef, ValueDef, ValueRef};
use crate::rewrite::{
    ConversionTarget, InsertPoint, LegalityCheck, Module, PatternApplicator, PatternRewriter,
    RewritePattern, TypeConverter, ValueMapping, clone_op,
};
use crate::symbol::Symbol;
use crate::types::Attribute;

// ============================================================================
// Type and legality oracle
// ============================================================================

/// A type is converted once it is no longer tensor-valued.
pub fn is_converted_type(ctx: &IrContext, ty: TypeRef) -> bool {
    !tensor::is_tensor(ctx, ty)
}

/// An operation is converted once every operand and result type is.
pub fn is_converted_op(ctx: &IrContext, op: OpRef) -> bool {
    ctx.op_operands(op)
        .iter()
        .all(|&v| is_converted_type(ctx, ctx.value_ty(v)))
        && ctx
            .op_result_types(op)
            .iter()
            .all(|&ty| is_converted_type(ctx, ty))
}

/// The tensor-to-buffer type mapping shared by every pattern.
pub fn buffer_type_converter() -> TypeConverter {
    let mut converter = TypeConverter::new();
    converter.add_conversion(mem::buffer_of);
    converter
}

/// A signature is legal once every parameter is converted and no declared
/// result is a tensor or a buffer.
fn signature_legal(ctx: &IrContext, fn_ty: TypeRef) -> bool {
    match func::fn_signature(ctx, fn_ty) {
        Some((params, results)) => {
            params.iter().all(|&ty| is_converted_type(ctx, ty))
                && results
                    .iter()
                    .all(|&ty| is_converted_type(ctx, ty) && !mem::is_buffer(ctx, ty))
        }
        None => false,
    }
}

// ============================================================================
// Allocation placement
// ============================================================================

/// Per-function oracle answering where the allocation materializing a value
/// must be inserted so that it dominates every use of that value.
///
/// Placement here is the naive dominating point (immediately before the
/// value's definition); hoisting allocations to better points is a
/// downstream pass.
pub struct AllocationPlacer {
    func: OpRef,
}

impl AllocationPlacer {
    pub fn new(func: OpRef) -> Self {
        Self { func }
    }

    /// Compute the allocation point for `value`.
    pub fn alloc_point(&self, ctx: &IrContext, value: ValueRef) -> InsertPoint {
        match ctx.value_def(value) {
            ValueDef::OpResult(op, _) => match ctx.op(op).parent_block {
                Some(block) => InsertPoint::before(block, op),
                None => self.entry_point(ctx),
            },
            ValueDef::BlockArg(block, _) => InsertPoint::block_start(ctx, block),
        }
    }

    fn entry_point(&self, ctx: &IrContext) -> InsertPoint {
        let body = ctx.op(self.func).regions[0];
        let entry = ctx.region(body).blocks[0];
        InsertPoint::block_start(ctx, entry)
    }
}

// ============================================================================
// Patterns
// ============================================================================

/// Rewrites a tensor-form `kernel.generic` into buffer form: one `mem.alloc`
/// per result at the placer's chosen point, the allocated buffers appended
/// as trailing operands, and the body extended with one scalar parameter
/// per output.
pub struct BufferizeGenericPattern {
    placer: AllocationPlacer,
}

impl BufferizeGenericPattern {
    pub fn new(placer: AllocationPlacer) -> Self {
        Self { placer }
    }
}

impl RewritePattern for BufferizeGenericPattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter<'_>,
    ) -> bool {
        let Ok(generic) = kernel::Generic::from_op(ctx, op) else {
            return false;
        };
        let result_types: Vec<TypeRef> = ctx.op_result_types(op).to_vec();
        if result_types.is_empty()
            || !result_types.iter().all(|&ty| tensor::is_tensor(ctx, ty))
        {
            return false;
        }

        // Every result shape must be static, and checked before anything is
        // emitted so a decline leaves no trace.
        if result_types
            .iter()
            .any(|&ty| !tensor::has_static_shape(ctx, ty))
        {
            tracing::debug!(
                op = %op,
                "bufferize: dynamic result shape unsupported, leaving kernel.generic unconverted"
            );
            return false;
        }
        let mut element_types = Vec::with_capacity(result_types.len());
        for &ty in &result_types {
            let Some(element) = tensor::element_type(ctx, ty) else {
                return false;
            };
            element_types.push(element);
        }
        let old_body = generic.body(ctx);
        let Some(&old_block) = ctx.region(old_body).blocks.first() else {
            return false;
        };

        let loc = ctx.op(op).location;
        let operands: Vec<ValueRef> = ctx.op_operands(op).to_vec();

        // One allocation per result, emitted at the placer's point under a
        // scoped cursor; the buffer doubles as trailing operand and result
        // replacement.
        let mut new_operands = operands.clone();
        let mut out_buffers = Vec::with_capacity(result_types.len());
        for (index, &result_ty) in result_types.iter().enumerate() {
            let Some(buffer_ty) = rewriter.type_converter().convert_type(ctx, result_ty) else {
                return false;
            };
            let result_value = ctx.op_result(op, index as u32);
            let point = self.placer.alloc_point(ctx, result_value);
            let alloc = mem::alloc(ctx, loc, buffer_ty);
            rewriter.with_cursor(point, |rw| rw.insert_op(alloc.op_ref()));
            let buffer = alloc.result(ctx);
            new_operands.push(buffer);
            out_buffers.push(buffer);
        }

        // Rebuild the body block: original parameters unchanged, one scalar
        // parameter appended per output, operations cloned in order through
        // an explicit value mapping.
        let block_loc = ctx.block(old_block).location;
        let mut body_args = ctx.block(old_block).args.clone();
        body_args.extend(element_types.iter().map(|&ty| BlockArgData::of(ty)));
        let new_block = ctx.create_block(BlockData::with_args(block_loc, body_args));

        let mut mapping = ValueMapping::new();
        let old_arg_count = ctx.block_args(old_block).len();
        for i in 0..old_arg_count {
            mapping.map(
                ctx.block_arg(old_block, i as u32),
                ctx.block_arg(new_block, i as u32),
            );
        }
        let body_ops: Vec<OpRef> = ctx.block(old_block).ops.to_vec();
        for body_op in body_ops {
            let cloned = clone_op(ctx, body_op, &mut mapping);
            ctx.push_op(new_block, cloned);
        }
        let new_body = ctx.create_region(RegionData::single(block_loc, new_block));

        // The buffer-form op declares no results; outputs are written in
        // place. All other attributes carry over unchanged.
        let mut attrs = ctx.op(op).attributes.clone();
        attrs.insert(
            kernel::ATTR_INPUTS(),
            Attribute::IntBits(operands.len() as u64),
        );
        attrs.insert(
            kernel::ATTR_OUTPUTS(),
            Attribute::IntBits(result_types.len() as u64),
        );
        let data =
            OperationDataBuilder::new(loc, Symbol::new("kernel"), Symbol::new("generic"))
                .operands(new_operands)
                .attrs(attrs)
                .region(new_body)
                .build(ctx);
        let new_op = ctx.create_op(data);

        rewriter.insert_op(new_op);
        rewriter.erase_op(out_buffers);
        true
    }

    fn name(&self) -> &'static str {
        "BufferizeGenericPattern"
    }
}

/// Rewrites a `func.return` whose pending operands have become buffers:
/// each is copied into the function's corresponding trailing output-buffer
/// argument and dropped from the return. Converted scalar operands keep
/// being returned by value.
///
/// Declines until the producers are bufferized and the enclosing signature
/// carries the trailing output arguments; fixpoint iteration supplies the
/// ordering.
pub struct BufferizeReturnPattern;

impl RewritePattern for BufferizeReturnPattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter<'_>,
    ) -> bool {
        let Ok(ret) = func::Return::from_op(ctx, op) else {
            return false;
        };
        let operands: Vec<ValueRef> = ret.values(ctx).to_vec();

        if operands
            .iter()
            .any(|&v| tensor::is_tensor(ctx, ctx.value_ty(v)))
        {
            return false;
        }
        let outgoing: Vec<ValueRef> = operands
            .iter()
            .copied()
            .filter(|&v| mem::is_buffer(ctx, ctx.value_ty(v)))
            .collect();
        if outgoing.is_empty() {
            return false;
        }

        // The enclosing function's declared results must already be free of
        // tensors (signature conversion has run), which makes its trailing
        // arguments the output buffers.
        let Some(function) = enclosing_function(ctx, op) else {
            return false;
        };
        let Some((_, results)) = func::fn_signature(ctx, function.r#type(ctx)) else {
            return false;
        };
        if results.iter().any(|&ty| tensor::is_tensor(ctx, ty)) {
            return false;
        }
        let Some(entry) = function.entry_block(ctx) else {
            return false;
        };
        let entry_args = ctx.block_args(entry).to_vec();
        if entry_args.len() < outgoing.len() {
            return false;
        }
        let out_args = &entry_args[entry_args.len() - outgoing.len()..];
        if out_args
            .iter()
            .any(|&arg| !mem::is_buffer(ctx, ctx.value_ty(arg)))
        {
            return false;
        }

        let loc = ctx.op(op).location;
        for (&src, &dst) in outgoing.iter().zip(out_args.iter()) {
            let copy = mem::copy(ctx, loc, src, dst);
            rewriter.insert_op(copy.op_ref());
        }

        let kept: Vec<ValueRef> = operands
            .iter()
            .copied()
            .filter(|&v| !mem::is_buffer(ctx, ctx.value_ty(v)))
            .collect();
        let new_ret = func::r#return(ctx, loc, kept);
        rewriter.replace_op(new_ret.op_ref());
        true
    }

    fn name(&self) -> &'static str {
        "BufferizeReturnPattern"
    }
}

fn enclosing_function(ctx: &IrContext, op: OpRef) -> Option<func::Func> {
    let block = ctx.op(op).parent_block?;
    let region = ctx.block(block).parent_region?;
    let parent = ctx.region(region).parent_op?;
    func::Func::from_op(ctx, parent).ok()
}

/// Rewrites a `func.func` signature: tensor parameters become buffers, each
/// tensor result becomes one trailing buffer parameter, and the declared
/// result list keeps only the non-tensor results. Entry block argument
/// types are updated in place.
pub struct BufferizeSignaturePattern;

impl RewritePattern for BufferizeSignaturePattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter<'_>,
    ) -> bool {
        let Ok(function) = func::Func::from_op(ctx, op) else {
            return false;
        };
        let fn_ty = function.r#type(ctx);
        let Some((params, results)) = func::fn_signature(ctx, fn_ty) else {
            return false;
        };
        let has_tensor_param = params.iter().any(|&ty| tensor::is_tensor(ctx, ty));
        let has_tensor_result = results.iter().any(|&ty| tensor::is_tensor(ctx, ty));
        if !has_tensor_param && !has_tensor_result {
            return false;
        }
        let Some(entry) = function.entry_block(ctx) else {
            return false;
        };

        let converter = rewriter.type_converter();
        let new_params: Vec<TypeRef> = params
            .iter()
            .map(|&ty| converter.convert_type_or_identity(ctx, ty))
            .collect();

        let mut kept_results = Vec::new();
        let mut out_params = Vec::new();
        for &ty in &results {
            if tensor::is_tensor(ctx, ty) {
                let Some(buffer_ty) = converter.convert_type(ctx, ty) else {
                    return false;
                };
                out_params.push(buffer_ty);
            } else {
                kept_results.push(ty);
            }
        }

        // Retype existing entry arguments in place (value identity is
        // preserved, so body uses stay valid), then append the trailing
        // output arguments.
        for (i, &ty) in new_params.iter().enumerate() {
            if i < ctx.block_args(entry).len() && ctx.block(entry).args[i].ty != ty {
                ctx.set_block_arg_type(entry, i as u32, ty);
            }
        }
        for &ty in &out_params {
            ctx.add_block_arg(entry, BlockArgData::of(ty));
        }

        let mut full_params = new_params;
        full_params.extend(out_params);
        let new_fn_ty = func::fn_type(ctx, &full_params, &kept_results);

        let body = function.body(ctx);
        ctx.detach_region(body);
        let loc = ctx.op(op).location;
        let name = function.sym_name(ctx);
        let new_func = func::func(ctx, loc, name, new_fn_ty, body);
        rewriter.replace_op(new_func.op_ref());
        true
    }

    fn name(&self) -> &'static str {
        "BufferizeSignaturePattern"
    }
}

// ============================================================================
// Driver
// ============================================================================

pub type BufferizeResult<T> = Result<T, BufferizeError>;

#[derive(Debug, Display, Error)]
pub enum BufferizeError {
    /// Rejected up front: lowering such a function would produce a void
    /// signature that still returns the scalar results by value.
    #[display("cannot lower @{function}: result list mixes tensor and scalar types")]
    MixedResults { function: String },

    /// Full conversion left unconverted instances behind (e.g. a kernel
    /// with a dynamically shaped result).
    #[display("conversion of @{function} left {count} illegal operation(s), first: {first}")]
    ResidualIllegal {
        function: String,
        count: usize,
        first: String,
    },
}

/// Legality rules shared by every function conversion.
fn conversion_target() -> ConversionTarget {
    let mut target = ConversionTarget::new();
    target.add_legal_dialect("core");
    target.add_legal_dialect("arith");
    target.add_legal_dialect("mem");

    // Kernel ops are illegal while any operand or result is tensor-valued,
    // decided per instance.
    target.add_dynamic_check(|ctx, op| {
        (ctx.op(op).dialect == Symbol::new("kernel")).then(|| {
            if is_converted_op(ctx, op) {
                LegalityCheck::Legal
            } else {
                LegalityCheck::Illegal
            }
        })
    });

    // Returns must not carry tensors, nor return memory by value.
    target.add_dynamic_check(|ctx, op| {
        func::Return::matches(ctx, op).then(|| {
            let ok = ctx.op_operands(op).iter().all(|&v| {
                let ty = ctx.value_ty(v);
                is_converted_type(ctx, ty) && !mem::is_buffer(ctx, ty)
            });
            if ok {
                LegalityCheck::Legal
            } else {
                LegalityCheck::Illegal
            }
        })
    });

    // Functions are legal only with a fully converted signature.
    target.add_dynamic_check(|ctx, op| {
        func::Func::from_op(ctx, op).ok().map(|f| {
            if signature_legal(ctx, f.r#type(ctx)) {
                LegalityCheck::Legal
            } else {
                LegalityCheck::Illegal
            }
        })
    });

    target
}

/// Convert every function in `module` from tensor form to buffer form.
///
/// Fails on the first function whose conversion does not reach a fully
/// legal state; the module is left as the failed conversion left it, so
/// callers should treat the error as fatal for the whole program.
pub fn bufferize_module(ctx: &mut IrContext, module: Module) -> BufferizeResult<()> {
    let mut funcs: Vec<OpRef> = Vec::new();
    let _ = crate::walk::walk_typed::<func::Func, ()>(ctx, module.body(ctx), &mut |f| {
        funcs.push(f.op_ref());
        std::ops::ControlFlow::Continue(crate::walk::WalkAction::Skip)
    });
    for f in funcs {
        bufferize_function(ctx, f)?;
    }
    Ok(())
}

/// Run full conversion over one function.
pub fn bufferize_function(ctx: &mut IrContext, func_op: OpRef) -> BufferizeResult<()> {
    let Ok(function) = func::Func::from_op(ctx, func_op) else {
        return Ok(());
    };
    let name = function.sym_name(ctx).to_string();

    reject_mixed_results(ctx, function, &name)?;

    tracing::debug!(function = %name, "bufferize: running full conversion");

    let target = conversion_target();
    let applicator = PatternApplicator::new(buffer_type_converter())
        .add_pattern(BufferizeGenericPattern::new(AllocationPlacer::new(func_op)))
        .add_pattern(BufferizeReturnPattern)
        .add_pattern(BufferizeSignaturePattern);

    match applicator.convert(ctx, func_op, &target) {
        Ok((_, result)) => {
            tracing::debug!(
                function = %name,
                iterations = result.iterations,
                changes = result.total_changes,
                "bufferize: conversion complete"
            );
            Ok(())
        }
        Err(illegal) => Err(BufferizeError::ResidualIllegal {
            function: name,
            count: illegal.len(),
            first: illegal[0].to_string(),
        }),
    }
}

/// Functions whose result list mixes tensor and scalar types cannot be
/// lowered into a consistent program; reject them before any rewriting.
fn reject_mixed_results(
    ctx: &IrContext,
    function: func::Func,
    name: &str,
) -> BufferizeResult<()> {
    let Some((_, results)) = func::fn_signature(ctx, function.r#type(ctx)) else {
        return Ok(());
    };
    let tensors = results
        .iter()
        .filter(|&&ty| tensor::is_tensor(ctx, ty))
        .count();
    if tensors > 0 && tensors < results.len() {
        return Err(BufferizeError::MixedResults {
            function: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{arith, core};
    use crate::location::Span;
    use crate::printer::print_module;
    use crate::types::Location;
    use crate::validation::validate_op;
    use insta::assert_snapshot;

    fn test_ctx() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("test.loom".to_owned());
        let loc = Location::new(path, Span::new(0, 0));
        (ctx, loc)
    }

    fn empty_module(ctx: &mut IrContext, loc: Location) -> Module {
        let module_op = core::module(ctx, loc, Symbol::new("m"));
        Module::new(ctx, module_op.op_ref()).unwrap()
    }

    fn add_to_module(ctx: &mut IrContext, module: Module, op: OpRef) {
        let block = module.first_block(ctx).unwrap();
        ctx.push_op(block, op);
    }

    /// Build a kernel body block binding one scalar per entry in
    /// `input_elems`, yielding the scalars picked by `yielded` indices.
    fn kernel_body(
        ctx: &mut IrContext,
        loc: Location,
        input_elems: &[TypeRef],
        yielded: &[usize],
    ) -> crate::refs::RegionRef {
        let args = input_elems
            .iter()
            .map(|&ty| BlockArgData::of(ty))
            .collect();
        let block = ctx.create_block(BlockData::with_args(loc, args));
        let values: Vec<ValueRef> = yielded
            .iter()
            .map(|&i| ctx.block_arg(block, i as u32))
            .collect();
        let y = kernel::r#yield(ctx, loc, values);
        ctx.push_op(block, y.op_ref());
        ctx.create_region(RegionData::single(loc, block))
    }

    /// func @<name>(tensor...) -> tensor... with one identity kernel per
    /// result, returning the kernel results.
    fn identity_kernel_func(
        ctx: &mut IrContext,
        loc: Location,
        name: &'static str,
        shape: &[u64],
    ) -> OpRef {
        let f32_ty = core::f32(ctx);
        let tensor_ty = tensor::tensor(ctx, f32_ty, shape);

        let entry =
            ctx.create_block(BlockData::with_args(loc, vec![BlockArgData::of(tensor_ty)]));
        let arg = ctx.block_arg(entry, 0);

        let body = kernel_body(ctx, loc, &[f32_ty], &[0]);
        let g = kernel::generic(
            ctx,
            loc,
            [arg],
            [tensor_ty],
            kernel::identity_maps(2),
            kernel::parallel_iterators(shape.len()),
            body,
        );
        ctx.push_op(entry, g.op_ref());
        let ret_value = ctx.op_result(g.op_ref(), 0);
        let ret = func::r#return(ctx, loc, [ret_value]);
        ctx.push_op(entry, ret.op_ref());

        let fn_region = ctx.create_region(RegionData::single(loc, entry));
        let fn_ty = func::fn_type(ctx, &[tensor_ty], &[tensor_ty]);
        func::func(ctx, loc, Symbol::new(name), fn_ty, fn_region).op_ref()
    }

    #[test]
    fn converted_types_and_ops() {
        let (mut ctx, loc) = test_ctx();
        let f32_ty = core::f32(&mut ctx);
        let tensor_ty = tensor::tensor(&mut ctx, f32_ty, &[4]);
        let buffer_ty = mem::buffer(&mut ctx, f32_ty, &[4]);

        assert!(is_converted_type(&ctx, f32_ty));
        assert!(is_converted_type(&ctx, buffer_ty));
        assert!(!is_converted_type(&ctx, tensor_ty));

        let block =
            ctx.create_block(BlockData::with_args(loc, vec![BlockArgData::of(tensor_ty)]));
        let arg = ctx.block_arg(block, 0);
        let body = kernel_body(&mut ctx, loc, &[f32_ty], &[0]);
        let g = kernel::generic(
            &mut ctx,
            loc,
            [arg],
            [tensor_ty],
            kernel::identity_maps(2),
            kernel::parallel_iterators(1),
            body,
        );
        assert!(!is_converted_op(&ctx, g.op_ref()));

        let a = mem::alloc(&mut ctx, loc, buffer_ty);
        assert!(is_converted_op(&ctx, a.op_ref()));
    }

    #[test]
    fn placer_points_dominate_the_definition() {
        let (mut ctx, loc) = test_ctx();
        let func_op = identity_kernel_func(&mut ctx, loc, "placed", &[4]);
        let function = func::Func::from_op(&ctx, func_op).unwrap();
        let entry = function.entry_block(&ctx).unwrap();
        let generic_op = ctx.block(entry).ops[0];

        let placer = AllocationPlacer::new(func_op);

        // Op result: immediately before the defining op.
        let result = ctx.op_result(generic_op, 0);
        let point = placer.alloc_point(&ctx, result);
        assert_eq!(point, InsertPoint::before(entry, generic_op));

        // Block argument: at the start of the defining block.
        let arg = ctx.block_arg(entry, 0);
        let point = placer.alloc_point(&ctx, arg);
        assert_eq!(point.block, entry);
        assert_eq!(point.before, Some(generic_op));
    }

    #[test]
    fn copies_input_kernel_to_output_buffer() {
        let (mut ctx, loc) = test_ctx();
        let module = empty_module(&mut ctx, loc);
        let func_op = identity_kernel_func(&mut ctx, loc, "id", &[4]);
        add_to_module(&mut ctx, module, func_op);

        bufferize_module(&mut ctx, module).expect("conversion should succeed");

        let ops = module.ops(&ctx);
        assert_eq!(ops.len(), 1);
        let function = func::Func::from_op(&ctx, ops[0]).unwrap();

        // Signature: two buffer parameters (input, output), zero results.
        let (params, results) = func::fn_signature(&ctx, function.r#type(&ctx)).unwrap();
        assert_eq!(params.len(), 2);
        assert!(results.is_empty());
        assert!(params.iter().all(|&ty| mem::is_buffer(&ctx, ty)));

        let entry = function.entry_block(&ctx).unwrap();
        let body_ops = ctx.block(entry).ops.to_vec();
        let kinds: Vec<String> = body_ops
            .iter()
            .map(|&op| format!("{}.{}", ctx.op(op).dialect, ctx.op(op).name))
            .collect();
        assert_eq!(
            kinds,
            vec!["mem.alloc", "kernel.generic", "mem.copy", "func.return"]
        );

        // Generic: input operand then allocated buffer, no results, body
        // block with one extra scalar parameter.
        let generic = kernel::Generic::from_op(&ctx, body_ops[1]).unwrap();
        let alloc = mem::Alloc::from_op(&ctx, body_ops[0]).unwrap();
        assert_eq!(
            ctx.op_operands(generic.op_ref()),
            &[ctx.block_arg(entry, 0), alloc.result(&ctx)]
        );
        assert!(ctx.op_result_types(generic.op_ref()).is_empty());
        assert_eq!(generic.inputs(&ctx), 1);
        assert_eq!(generic.outputs(&ctx), 1);
        let body_block = ctx.region(generic.body(&ctx)).blocks[0];
        assert_eq!(ctx.block_args(body_block).len(), 2);

        // The copy writes the computed buffer into the output argument.
        let copy = mem::Copy::from_op(&ctx, body_ops[2]).unwrap();
        assert_eq!(copy.src(&ctx), alloc.result(&ctx));
        assert_eq!(copy.dst(&ctx), ctx.block_arg(entry, 1));

        // The exit returns no value.
        let ret = func::Return::from_op(&ctx, body_ops[3]).unwrap();
        assert!(ret.values(&ctx).is_empty());

        let check = validate_op(&ctx, ops[0]);
        assert!(check.is_ok(), "{:?}", check.scope_violations);
    }

    #[test]
    fn converted_module_prints_in_buffer_form() {
        let (mut ctx, loc) = test_ctx();
        let module = empty_module(&mut ctx, loc);
        let func_op = identity_kernel_func(&mut ctx, loc, "id", &[4]);
        add_to_module(&mut ctx, module, func_op);

        bufferize_module(&mut ctx, module).expect("conversion should succeed");

        assert_snapshot!(print_module(&ctx, module), @r"
        core.module @m {
          func.func @id(%0: buffer<4xf32>, %1: buffer<4xf32>) {
            %2 = mem.alloc : buffer<4xf32>
            kernel.generic %0, %2 {indexing_maps = [@identity, @identity], inputs = 1, iterator_kinds = [@parallel], outputs = 1} {
              ^bb0(%3: f32, %4: f32):
                kernel.yield %3
            }
            mem.copy %2, %1
            func.return
          }
        }
        ");
    }

    #[test]
    fn scalar_function_left_unchanged() {
        let (mut ctx, loc) = test_ctx();
        let module = empty_module(&mut ctx, loc);
        let f32_ty = core::f32(&mut ctx);

        let entry = ctx.create_block(BlockData::with_args(
            loc,
            vec![BlockArgData::of(f32_ty), BlockArgData::of(f32_ty)],
        ));
        let a = ctx.block_arg(entry, 0);
        let b = ctx.block_arg(entry, 1);
        let sum = arith::add(&mut ctx, loc, a, b, f32_ty);
        ctx.push_op(entry, sum.op_ref());
        let product = arith::mul(&mut ctx, loc, a, b, f32_ty);
        ctx.push_op(entry, product.op_ref());
        let returned = [sum.result(&ctx), product.result(&ctx)];
        let ret = func::r#return(&mut ctx, loc, returned);
        ctx.push_op(entry, ret.op_ref());

        let body = ctx.create_region(RegionData::single(loc, entry));
        let fn_ty = func::fn_type(&mut ctx, &[f32_ty, f32_ty], &[f32_ty, f32_ty]);
        let func_op = func::func(&mut ctx, loc, Symbol::new("both"), fn_ty, body).op_ref();
        add_to_module(&mut ctx, module, func_op);

        bufferize_module(&mut ctx, module).expect("conversion should succeed");

        // No pattern fired: same operation, same signature, same return.
        let ops = module.ops(&ctx);
        assert_eq!(ops, vec![func_op]);
        let function = func::Func::from_op(&ctx, func_op).unwrap();
        assert_eq!(function.r#type(&ctx), fn_ty);
        let ret_op = *ctx.block(entry).ops.last().unwrap();
        assert_eq!(ctx.op_operands(ret_op).len(), 2);
    }

    #[test]
    fn dynamic_shapes_fail_conversion() {
        let (mut ctx, loc) = test_ctx();
        let module = empty_module(&mut ctx, loc);
        let func_op = identity_kernel_func(&mut ctx, loc, "dyn", &[tensor::DYNAMIC]);
        add_to_module(&mut ctx, module, func_op);

        let err = bufferize_module(&mut ctx, module)
            .expect_err("dynamic result shapes must fail the pass");
        match err {
            BufferizeError::ResidualIllegal {
                function, first, ..
            } => {
                assert_eq!(function, "dyn");
                assert!(first.starts_with("kernel.generic"), "{first}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mixed_result_signature_is_rejected_up_front() {
        let (mut ctx, loc) = test_ctx();
        let module = empty_module(&mut ctx, loc);
        let f32_ty = core::f32(&mut ctx);
        let tensor_ty = tensor::tensor(&mut ctx, f32_ty, &[4]);

        let entry =
            ctx.create_block(BlockData::with_args(loc, vec![BlockArgData::of(tensor_ty)]));
        let body = ctx.create_region(RegionData::single(loc, entry));
        let fn_ty = func::fn_type(&mut ctx, &[tensor_ty], &[f32_ty, tensor_ty]);
        let func_op = func::func(&mut ctx, loc, Symbol::new("mixed"), fn_ty, body).op_ref();
        add_to_module(&mut ctx, module, func_op);

        let err = bufferize_module(&mut ctx, module).expect_err("mixed results must be rejected");
        match err {
            BufferizeError::MixedResults { function } => assert_eq!(function, "mixed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn multi_result_kernel_preserves_arity_and_order() {
        let (mut ctx, loc) = test_ctx();
        let module = empty_module(&mut ctx, loc);
        let f32_ty = core::f32(&mut ctx);
        let t4 = tensor::tensor(&mut ctx, f32_ty, &[4]);
        let t8 = tensor::tensor(&mut ctx, f32_ty, &[8]);

        let entry = ctx.create_block(BlockData::with_args(
            loc,
            vec![BlockArgData::of(t4), BlockArgData::of(t8)],
        ));
        let a = ctx.block_arg(entry, 0);
        let b = ctx.block_arg(entry, 1);

        let body = kernel_body(&mut ctx, loc, &[f32_ty, f32_ty], &[0, 1]);
        let g = kernel::generic(
            &mut ctx,
            loc,
            [a, b],
            [t4, t8],
            kernel::identity_maps(4),
            kernel::parallel_iterators(1),
            body,
        );
        ctx.push_op(entry, g.op_ref());
        let r0 = ctx.op_result(g.op_ref(), 0);
        let r1 = ctx.op_result(g.op_ref(), 1);
        let ret = func::r#return(&mut ctx, loc, [r0, r1]);
        ctx.push_op(entry, ret.op_ref());

        let fn_region = ctx.create_region(RegionData::single(loc, entry));
        let fn_ty = func::fn_type(&mut ctx, &[t4, t8], &[t4, t8]);
        let func_op = func::func(&mut ctx, loc, Symbol::new("pair"), fn_ty, fn_region).op_ref();
        add_to_module(&mut ctx, module, func_op);

        bufferize_module(&mut ctx, module).expect("conversion should succeed");

        let ops = module.ops(&ctx);
        let function = func::Func::from_op(&ctx, ops[0]).unwrap();
        let entry = function.entry_block(&ctx).unwrap();
        let body_ops = ctx.block(entry).ops.to_vec();

        // alloc(4), alloc(8), generic, copy, copy, return
        let generic_op = body_ops
            .iter()
            .copied()
            .find(|&op| kernel::Generic::matches(&ctx, op))
            .unwrap();
        let generic = kernel::Generic::from_op(&ctx, generic_op).unwrap();
        let operands = ctx.op_operands(generic_op).to_vec();

        // k + m operands, zero results.
        assert_eq!(operands.len(), 4);
        assert!(ctx.op_result_types(generic_op).is_empty());
        assert_eq!(generic.inputs(&ctx), 2);
        assert_eq!(generic.outputs(&ctx), 2);

        // Buffers appended in result order: shape [4] then shape [8].
        let buf0 = ctx.value_ty(operands[2]);
        let buf1 = ctx.value_ty(operands[3]);
        assert_eq!(mem::dims(&ctx, buf0).unwrap().as_slice(), &[4]);
        assert_eq!(mem::dims(&ctx, buf1).unwrap().as_slice(), &[8]);

        // Body block: original two scalars plus one per output.
        let body_block = ctx.region(generic.body(&ctx)).blocks[0];
        assert_eq!(ctx.block_args(body_block).len(), 4);

        // Copies write into the trailing output arguments in order.
        let entry_args = ctx.block_args(entry).to_vec();
        assert_eq!(entry_args.len(), 4);
        let copies: Vec<mem::Copy> = body_ops
            .iter()
            .copied()
            .filter_map(|op| mem::Copy::from_op(&ctx, op).ok())
            .collect();
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].src(&ctx), operands[2]);
        assert_eq!(copies[0].dst(&ctx), entry_args[2]);
        assert_eq!(copies[1].src(&ctx), operands[3]);
        assert_eq!(copies[1].dst(&ctx), entry_args[3]);

        let check = validate_op(&ctx, ops[0]);
        assert!(check.is_ok(), "{:?}", check.scope_violations);
    }

    #[test]
    fn chained_kernels_reach_fixpoint() {
        let (mut ctx, loc) = test_ctx();
        let module = empty_module(&mut ctx, loc);
        let f32_ty = core::f32(&mut ctx);
        let tensor_ty = tensor::tensor(&mut ctx, f32_ty, &[4]);

        let entry =
            ctx.create_block(BlockData::with_args(loc, vec![BlockArgData::of(tensor_ty)]));
        let arg = ctx.block_arg(entry, 0);

        let body1 = kernel_body(&mut ctx, loc, &[f32_ty], &[0]);
        let g1 = kernel::generic(
            &mut ctx,
            loc,
            [arg],
            [tensor_ty],
            kernel::identity_maps(2),
            kernel::parallel_iterators(1),
            body1,
        );
        ctx.push_op(entry, g1.op_ref());
        let mid = ctx.op_result(g1.op_ref(), 0);

        let body2 = kernel_body(&mut ctx, loc, &[f32_ty], &[0]);
        let g2 = kernel::generic(
            &mut ctx,
            loc,
            [mid],
            [tensor_ty],
            kernel::identity_maps(2),
            kernel::parallel_iterators(1),
            body2,
        );
        ctx.push_op(entry, g2.op_ref());
        let out = ctx.op_result(g2.op_ref(), 0);
        let ret = func::r#return(&mut ctx, loc, [out]);
        ctx.push_op(entry, ret.op_ref());

        let fn_region = ctx.create_region(RegionData::single(loc, entry));
        let fn_ty = func::fn_type(&mut ctx, &[tensor_ty], &[tensor_ty]);
        let func_op = func::func(&mut ctx, loc, Symbol::new("chain"), fn_ty, fn_region).op_ref();
        add_to_module(&mut ctx, module, func_op);

        bufferize_module(&mut ctx, module).expect("conversion should succeed");

        let ops = module.ops(&ctx);
        let function = func::Func::from_op(&ctx, ops[0]).unwrap();
        let entry = function.entry_block(&ctx).unwrap();
        let kinds: Vec<String> = ctx
            .block(entry)
            .ops
            .iter()
            .map(|&op| format!("{}.{}", ctx.op(op).dialect, ctx.op(op).name))
            .collect();
        assert_eq!(
            kinds,
            vec![
                "mem.alloc",
                "kernel.generic",
                "mem.alloc",
                "kernel.generic",
                "mem.copy",
                "func.return"
            ]
        );

        // The second kernel consumes the first kernel's buffer.
        let body_ops = ctx.block(entry).ops.to_vec();
        let first_buffer = ctx.op_result(body_ops[0], 0);
        let second_generic = ctx.op_operands(body_ops[3]).to_vec();
        assert_eq!(second_generic[0], first_buffer);

        let check = validate_op(&ctx, ops[0]);
        assert!(check.is_ok(), "{:?}", check.scope_violations);
        assert!(check.use_chain_errors.is_empty(), "{:?}", check.use_chain_errors);
    }

    #[test]
    fn forwarded_parameter_is_copied_out() {
        let (mut ctx, loc) = test_ctx();
        let module = empty_module(&mut ctx, loc);
        let f32_ty = core::f32(&mut ctx);
        let tensor_ty = tensor::tensor(&mut ctx, f32_ty, &[4]);

        let entry =
            ctx.create_block(BlockData::with_args(loc, vec![BlockArgData::of(tensor_ty)]));
        let arg = ctx.block_arg(entry, 0);
        let ret = func::r#return(&mut ctx, loc, [arg]);
        ctx.push_op(entry, ret.op_ref());

        let body = ctx.create_region(RegionData::single(loc, entry));
        let fn_ty = func::fn_type(&mut ctx, &[tensor_ty], &[tensor_ty]);
        let func_op = func::func(&mut ctx, loc, Symbol::new("fwd"), fn_ty, body).op_ref();
        add_to_module(&mut ctx, module, func_op);

        bufferize_module(&mut ctx, module).expect("conversion should succeed");

        let ops = module.ops(&ctx);
        let function = func::Func::from_op(&ctx, ops[0]).unwrap();
        let (params, results) = func::fn_signature(&ctx, function.r#type(&ctx)).unwrap();
        assert_eq!(params.len(), 2);
        assert!(results.is_empty());

        let entry = function.entry_block(&ctx).unwrap();
        let body_ops = ctx.block(entry).ops.to_vec();
        assert_eq!(body_ops.len(), 2);
        let copy = mem::Copy::from_op(&ctx, body_ops[0]).unwrap();
        assert_eq!(copy.src(&ctx), ctx.block_arg(entry, 0));
        assert_eq!(copy.dst(&ctx), ctx.block_arg(entry, 1));
        let ret = func::Return::from_op(&ctx, body_ops[1]).unwrap();
        assert!(ret.values(&ctx).is_empty());
    }

    #[test]
    fn multiple_functions_convert_independently() {
        let (mut ctx, loc) = test_ctx();
        let module = empty_module(&mut ctx, loc);
        let f1 = identity_kernel_func(&mut ctx, loc, "one", &[2]);
        let f2 = identity_kernel_func(&mut ctx, loc, "two", &[16]);
        add_to_module(&mut ctx, module, f1);
        add_to_module(&mut ctx, module, f2);

        bufferize_module(&mut ctx, module).expect("conversion should succeed");

        for op in module.ops(&ctx) {
            let function = func::Func::from_op(&ctx, op).unwrap();
            let (params, results) = func::fn_signature(&ctx, function.r#type(&ctx)).unwrap();
            assert_eq!(params.len(), 2);
            assert!(results.is_empty());
            let check = validate_op(&ctx, op);
            assert!(check.is_ok());
        }
    }
}
