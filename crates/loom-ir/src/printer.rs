//! Text format printer for the IR.
//!
//! Prints IR in a compact, deterministic form:
//!
//! ```text
//! core.module @m {
//!   func.func @id(%0: tensor<4xf32>) -> tensor<4xf32> {
//!     %1 = kernel.generic %0 {inputs = 1, outputs = 1} : tensor<4xf32> {
//!       ^bb0(%2: f32):
//!         kernel.yield %2
//!     }
//!     func.return %1
//!   }
//! }
//! ```
//!
//! Value numbers are assigned in definition order during printing, and
//! attributes are sorted by name, so the same program always prints the
//! same text regardless of interner state.

use std::collections::HashMap;
use std::fmt::Write;

use crate::context::IrContext;
use crate::dialect::{core, func, mem, tensor};
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, TypeRef, ValueRef};
use crate::rewrite::Module;
use crate::symbol::Symbol;
use crate::types::Attribute;

/// Print a whole module.
pub fn print_module(ctx: &IrContext, module: Module) -> String {
    print_op(ctx, module.op())
}

/// Print one operation (and everything nested in it).
pub fn print_op(ctx: &IrContext, op: OpRef) -> String {
    let mut printer = Printer::new(ctx);
    printer.print_op(op, 0);
    printer.out.trim_end().to_string()
}

struct Printer<'a> {
    ctx: &'a IrContext,
    out: String,
    value_names: HashMap<ValueRef, String>,
    next_value: usize,
    next_block: usize,
}

impl<'a> Printer<'a> {
    fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            out: String::new(),
            value_names: HashMap::new(),
            next_value: 0,
            next_block: 0,
        }
    }

    fn assign_value_name(&mut self, v: ValueRef) -> String {
        let name = format!("%{}", self.next_value);
        self.next_value += 1;
        self.value_names.insert(v, name.clone());
        name
    }

    fn value_name(&self, v: ValueRef) -> String {
        self.value_names
            .get(&v)
            .cloned()
            .unwrap_or_else(|| "%?".to_string())
    }

    fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push_str("  ");
        }
    }

    fn print_op(&mut self, op: OpRef, level: usize) {
        if core::ModuleOp::matches(self.ctx, op) {
            self.print_module_op(op, level);
            return;
        }
        if func::Func::matches(self.ctx, op) {
            self.print_func_op(op, level);
            return;
        }
        self.print_plain_op(op, level);
    }

    fn print_module_op(&mut self, op: OpRef, level: usize) {
        let module = Module(op);
        self.indent(level);
        match module.name(self.ctx) {
            Some(name) => {
                let _ = writeln!(self.out, "core.module @{} {{", name);
            }
            None => {
                let _ = writeln!(self.out, "core.module {{");
            }
        }
        for inner in module.ops(self.ctx) {
            self.print_op(inner, level + 1);
        }
        self.indent(level);
        self.out.push_str("}\n");
    }

    fn print_func_op(&mut self, op: OpRef, level: usize) {
        let Ok(f) = func::Func::from_op(self.ctx, op) else {
            self.print_plain_op(op, level);
            return;
        };
        let name = f.sym_name(self.ctx);
        let signature = func::fn_signature(self.ctx, f.r#type(self.ctx));

        self.indent(level);
        let _ = write!(self.out, "func.func @{}(", name);
        if let Some(entry) = f.entry_block(self.ctx) {
            let args = self.ctx.block_args(entry).to_vec();
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                let arg_name = self.assign_value_name(*arg);
                let ty = print_type(self.ctx, self.ctx.value_ty(*arg));
                let _ = write!(self.out, "{}: {}", arg_name, ty);
            }
        }
        self.out.push(')');

        if let Some((_, results)) = signature {
            match results.as_slice() {
                [] => {}
                [single] => {
                    let _ = write!(self.out, " -> {}", print_type(self.ctx, *single));
                }
                many => {
                    let tys: Vec<String> =
                        many.iter().map(|&t| print_type(self.ctx, t)).collect();
                    let _ = write!(self.out, " -> ({})", tys.join(", "));
                }
            }
        }
        self.out.push_str(" {\n");

        let body = f.body(self.ctx);
        let blocks = self.ctx.region(body).blocks.to_vec();
        for (i, block) in blocks.iter().enumerate() {
            if i == 0 {
                // Entry block args were printed in the header.
                for inner in self.ctx.block(*block).ops.to_vec() {
                    self.print_op(inner, level + 1);
                }
            } else {
                self.print_block(*block, level + 1);
            }
        }

        self.indent(level);
        self.out.push_str("}\n");
    }

    fn print_plain_op(&mut self, op: OpRef, level: usize) {
        self.indent(level);

        // Results
        let results = self.ctx.op_results(op).to_vec();
        if !results.is_empty() {
            let names: Vec<String> = results
                .iter()
                .map(|&v| self.assign_value_name(v))
                .collect();
            let _ = write!(self.out, "{} = ", names.join(", "));
        }

        // Name
        let data = self.ctx.op(op);
        let _ = write!(self.out, "{}.{}", data.dialect, data.name);

        // Operands
        let operands = self.ctx.op_operands(op).to_vec();
        if !operands.is_empty() {
            let names: Vec<String> = operands.iter().map(|&v| self.value_name(v)).collect();
            let _ = write!(self.out, " {}", names.join(", "));
        }

        // Attributes, sorted by name for deterministic output.
        let mut attrs: Vec<(String, Attribute)> = self
            .ctx
            .op(op)
            .attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        attrs.sort_by(|a, b| a.0.cmp(&b.0));
        if !attrs.is_empty() {
            let parts: Vec<String> = attrs
                .iter()
                .map(|(k, v)| format!("{} = {}", k, print_attr(self.ctx, v)))
                .collect();
            let _ = write!(self.out, " {{{}}}", parts.join(", "));
        }

        // Result types
        let result_types = self.ctx.op_result_types(op).to_vec();
        if !result_types.is_empty() {
            let tys: Vec<String> = result_types
                .iter()
                .map(|&t| print_type(self.ctx, t))
                .collect();
            let _ = write!(self.out, " : {}", tys.join(", "));
        }

        // Regions
        let regions = self.ctx.op(op).regions.to_vec();
        if regions.is_empty() {
            self.out.push('\n');
        } else {
            self.out.push_str(" {\n");
            for region in regions {
                for block in self.ctx.region(region).blocks.to_vec() {
                    self.print_block(block, level + 1);
                }
            }
            self.indent(level);
            self.out.push_str("}\n");
        }
    }

    fn print_block(&mut self, block: BlockRef, level: usize) {
        let label = format!("^bb{}", self.next_block);
        self.next_block += 1;

        self.indent(level);
        let args = self.ctx.block_args(block).to_vec();
        let _ = write!(self.out, "{}(", label);
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            let name = self.assign_value_name(*arg);
            let ty = print_type(self.ctx, self.ctx.value_ty(*arg));
            let _ = write!(self.out, "{}: {}", name, ty);
        }
        self.out.push_str("):\n");

        for op in self.ctx.block(block).ops.to_vec() {
            self.print_op(op, level + 1);
        }
    }
}

/// Print a type in its shorthand form.
pub fn print_type(ctx: &IrContext, ty: TypeRef) -> String {
    if tensor::is_tensor(ctx, ty) {
        return print_shaped(ctx, "tensor", tensor::dims(ctx, ty), tensor::element_type(ctx, ty));
    }
    if mem::is_buffer(ctx, ty) {
        return print_shaped(ctx, "buffer", mem::dims(ctx, ty), mem::element_type(ctx, ty));
    }
    let data = ctx.types.get(ty);
    if data.dialect == Symbol::new("func") && data.name == Symbol::new("fn") {
        if let Some((params, results)) = func::fn_signature(ctx, ty) {
            let params: Vec<String> = params.iter().map(|&t| print_type(ctx, t)).collect();
            let results: Vec<String> = results.iter().map(|&t| print_type(ctx, t)).collect();
            return format!("({}) -> ({})", params.join(", "), results.join(", "));
        }
    }
    if data.dialect == Symbol::new("core") {
        return data.name.to_string();
    }
    format!("{}.{}", data.dialect, data.name)
}

fn print_shaped(
    ctx: &IrContext,
    keyword: &str,
    dims: Option<smallvec::SmallVec<[u64; 4]>>,
    element: Option<TypeRef>,
) -> String {
    let mut out = format!("{}<", keyword);
    if let Some(dims) = dims {
        for d in dims {
            if d == tensor::DYNAMIC {
                out.push('?');
            } else {
                let _ = write!(out, "{}", d);
            }
            out.push('x');
        }
    }
    match element {
        Some(e) => out.push_str(&print_type(ctx, e)),
        None => out.push('?'),
    }
    out.push('>');
    out
}

fn print_attr(ctx: &IrContext, attr: &Attribute) -> String {
    match attr {
        Attribute::Bool(b) => b.to_string(),
        Attribute::IntBits(v) => v.to_string(),
        Attribute::FloatBits(bits) => format!("{}", f64::from_bits(*bits)),
        Attribute::String(s) => format!("{:?}", s),
        Attribute::Symbol(s) => format!("@{}", s),
        Attribute::Type(ty) => print_type(ctx, *ty),
        Attribute::List(items) => {
            let parts: Vec<String> = items.iter().map(|a| print_attr(ctx, a)).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}
