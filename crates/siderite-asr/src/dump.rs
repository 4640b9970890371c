//! Deterministic tree rendering.
//!
//! One line per symbol, children indented, bindings in insertion order.
//! Tests snapshot this; keep the format boring.

use std::fmt::Write;

use crate::arena::{Asr, SymbolId};
use crate::symbol::{Access, Intent, Presence, Storage, Symbol};
use crate::ty::{StringLength, Ty};

pub fn dump(asr: &Asr, root: SymbolId) -> String {
    let mut out = String::new();
    dump_symbol(asr, root, None, 0, &mut out);
    out
}

fn dump_symbol(asr: &Asr, id: SymbolId, key: Option<&str>, depth: usize, out: &mut String) {
    let sym = asr.symbol(id);
    indent(depth, out);
    line(asr, sym, key, out);
    out.push('\n');

    if let Some(table) = sym.symtab() {
        for (name, child) in asr.table(table).iter() {
            dump_symbol(asr, child, Some(name), depth + 1, out);
        }
    }
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn line(asr: &Asr, sym: &Symbol, key: Option<&str>, out: &mut String) {
    match sym {
        Symbol::TranslationUnit(_) => {
            out.push_str("translation_unit");
        }
        Symbol::Program(p) => {
            let _ = write!(out, "program {}", p.name);
            deps(&p.dependencies, out);
        }
        Symbol::Module(m) => {
            let _ = write!(out, "module {}", m.name);
            if let Some(parent) = &m.parent_module {
                let _ = write!(out, " extends {parent}");
            }
            if m.has_submodules {
                out.push_str(" [has-submodules]");
            }
            deps(&m.dependencies, out);
        }
        Symbol::Function(f) => {
            let _ = write!(out, "function {}", f.name);
            out.push('(');
            for (i, arg) in f.args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                match arg {
                    crate::expr::Expr::Var { sym, .. } => {
                        let name = asr.symbol(*sym).name().unwrap_or("?");
                        out.push_str(name);
                    }
                    _ => out.push('?'),
                }
            }
            out.push(')');
            if let Some(ret) = &f.signature.return_type {
                let _ = write!(out, " -> {}", render_ty(asr, ret));
            }
            if f.access == Access::Private {
                out.push_str(" [private]");
            }
            deps(&f.dependencies, out);
        }
        Symbol::Variable(v) => {
            let _ = write!(out, "variable {}: {}", v.name, render_ty(asr, &v.ty));
            let mut tags = Vec::new();
            match v.intent {
                Intent::In => tags.push("intent(in)".to_string()),
                Intent::Out => tags.push("intent(out)".to_string()),
                Intent::InOut => tags.push("intent(inout)".to_string()),
                Intent::ReturnVar => tags.push("return".to_string()),
                Intent::Local => {}
            }
            match v.storage {
                Storage::Parameter => tags.push("parameter".to_string()),
                Storage::Save => tags.push("save".to_string()),
                Storage::Default => {}
            }
            if v.presence == Presence::Optional {
                tags.push("optional".to_string());
            }
            if v.access == Access::Private {
                tags.push("private".to_string());
            }
            if !tags.is_empty() {
                let _ = write!(out, " [{}]", tags.join(", "));
            }
            deps(&v.dependencies, out);
        }
        Symbol::Struct(s) => {
            let _ = write!(out, "struct {}", s.name);
            if let Some(parent) = s.parent {
                let name = asr.symbol(parent).name().unwrap_or("?");
                let _ = write!(out, " extends {name}");
            }
            if s.is_abstract {
                out.push_str(" [abstract]");
            }
            deps(&s.dependencies, out);
        }
        Symbol::Enum(e) => {
            let _ = write!(out, "enum {}", e.name);
        }
        Symbol::Union(u) => {
            let _ = write!(out, "union {}", u.name);
        }
        Symbol::GenericProcedure(g) => {
            let _ = write!(out, "generic {} -> [{}]", g.name, proc_names(asr, &g.procs));
        }
        Symbol::CustomOperator(c) => {
            let _ = write!(out, "operator {} -> [{}]", c.name, proc_names(asr, &c.procs));
        }
        Symbol::StructMethod(m) => {
            let _ = write!(out, "method {} => {}", m.name, m.proc_name);
            if m.is_deferred {
                out.push_str(" [deferred]");
            }
            if m.nopass {
                out.push_str(" [nopass]");
            }
        }
        Symbol::External(e) => {
            let _ = write!(out, "external {} => {}::{}", e.name, e.module_name, e.original_name);
            if e.target.is_none() {
                out.push_str(" [unresolved]");
            }
        }
        Symbol::Block(b) => {
            let _ = write!(out, "block {}", b.name);
        }
        Symbol::Requirement(r) => {
            let _ = write!(out, "requirement {}({})", r.name, r.params.join(", "));
        }
        Symbol::Template(t) => {
            let _ = write!(out, "template {}({})", t.name, t.params.join(", "));
        }
    }

    // A binding whose key differs from the symbol name is worth seeing.
    if let (Some(key), Some(name)) = (key, sym.name())
        && key != name
    {
        let _ = write!(out, " (as {key})");
    }
}

fn deps(dependencies: &[String], out: &mut String) {
    if !dependencies.is_empty() {
        let _ = write!(out, " [deps: {}]", dependencies.join(", "));
    }
}

fn proc_names(asr: &Asr, procs: &[SymbolId]) -> String {
    procs
        .iter()
        .map(|p| asr.symbol(*p).name().unwrap_or("?").to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a type the way a declaration would spell it.
pub fn render_ty(asr: &Asr, ty: &Ty) -> String {
    match ty {
        Ty::Integer { kind } => format!("integer({kind})"),
        Ty::Real { kind } => format!("real({kind})"),
        Ty::Complex { kind } => format!("complex({kind})"),
        Ty::Logical { kind } => format!("logical({kind})"),
        Ty::Character { len, .. } => match len {
            StringLength::Expression(e) => {
                match crate::const_eval::eval_int(asr, e) {
                    Some(n) => format!("character({n})"),
                    None => "character(len=?)".to_string(),
                }
            }
            StringLength::Assumed => "character(*)".to_string(),
            StringLength::Deferred => "character(:)".to_string(),
            StringLength::Implicit => "character(implicit)".to_string(),
        },
        Ty::Array { elem, dims, .. } => {
            format!("{}[rank {}]", render_ty(asr, elem), dims.len())
        }
        Ty::Pointer { elem } => format!("pointer({})", render_ty(asr, elem)),
        Ty::Allocatable { elem } => format!("allocatable({})", render_ty(asr, elem)),
        Ty::StructType { decl, .. } => {
            format!("type({})", asr.symbol(*decl).name().unwrap_or("?"))
        }
        Ty::EnumType { decl } => {
            format!("enum({})", asr.symbol(*decl).name().unwrap_or("?"))
        }
        Ty::UnionType { decl } => {
            format!("union({})", asr.symbol(*decl).name().unwrap_or("?"))
        }
        Ty::FunctionType(sig) => {
            let args = sig
                .arg_types
                .iter()
                .map(|t| render_ty(asr, t))
                .collect::<Vec<_>>()
                .join(", ");
            match &sig.return_type {
                Some(ret) => format!("procedure(({args}) -> {})", render_ty(asr, ret)),
                None => format!("procedure(({args}))"),
            }
        }
        Ty::TypeParameter { name } => format!("tparam({name})"),
    }
}
