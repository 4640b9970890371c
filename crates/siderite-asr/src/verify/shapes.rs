//! Type-shape rules.

use siderite_core::Span;

use crate::arena::Asr;
use crate::const_eval;
use crate::ty::{StringLength, Ty};

use super::error::{VerifyError, VerifyErrorKind};

type VResult = Result<(), VerifyError>;

fn err(span: Span, message: impl Into<String>) -> VerifyError {
    VerifyError::new(VerifyErrorKind::TypeShape, span, message)
}

/// Check a declared type. `Implicit` string lengths are rejected here; they
/// exist only on cast results, which are not declarations.
pub fn check_declared_ty(asr: &Asr, ty: &Ty, span: Span) -> VResult {
    match ty {
        Ty::Pointer { elem } => {
            if elem.is_allocatable() {
                return Err(err(span, "pointer of allocatable is not a type"));
            }
            if elem.is_pointer() {
                return Err(err(span, "pointer of pointer is not a type"));
            }
            if let Ty::Array { dims, .. } = &**elem {
                if dims.iter().any(|d| !d.is_deferred()) {
                    return Err(err(span, "array pointer requires a deferred shape"));
                }
            }
            check_declared_ty(asr, elem, span)
        }
        Ty::Allocatable { elem } => {
            if elem.is_pointer() {
                return Err(err(span, "allocatable of pointer is not a type"));
            }
            if elem.is_allocatable() {
                return Err(err(span, "allocatable of allocatable is not a type"));
            }
            if let Ty::Array { dims, .. } = &**elem {
                if dims.iter().any(|d| d.length.is_some()) {
                    return Err(err(
                        span,
                        "allocatable array dimensions cannot carry lengths",
                    ));
                }
            }
            check_declared_ty(asr, elem, span)
        }
        Ty::Array { elem, dims, .. } => {
            if dims.is_empty() {
                return Err(err(span, "array rank must be at least 1"));
            }
            if elem.is_array() {
                return Err(err(span, "array of array is not a type"));
            }
            if elem.is_allocatable() {
                return Err(err(span, "array cannot wrap an allocatable element"));
            }
            if elem.is_pointer() {
                return Err(err(span, "array cannot wrap a pointer element"));
            }
            check_declared_ty(asr, elem, span)
        }
        Ty::Character { len, .. } => {
            if matches!(len, StringLength::Implicit) {
                return Err(err(
                    span,
                    "implicit string length outside a string-physical cast",
                ));
            }
            Ok(())
        }
        Ty::FunctionType(sig) => {
            for arg in &sig.arg_types {
                check_declared_ty(asr, arg, span)?;
            }
            if let Some(ret) = &sig.return_type {
                check_declared_ty(asr, ret, span)?;
            }
            Ok(())
        }
        Ty::Integer { .. }
        | Ty::Real { .. }
        | Ty::Complex { .. }
        | Ty::Logical { .. }
        | Ty::StructType { .. }
        | Ty::EnumType { .. }
        | Ty::UnionType { .. }
        | Ty::TypeParameter { .. } => Ok(()),
    }
}

/// The C-binding character rule: a non-local character entity crossing a C
/// boundary must be a scalar string of length 1 with an expression length.
pub fn check_c_char(asr: &Asr, ty: &Ty, span: Span) -> VResult {
    let Ty::Character { len, .. } = ty else {
        return Ok(());
    };
    match len {
        StringLength::Expression(e) if const_eval::eval_int(asr, e) == Some(1) => Ok(()),
        StringLength::Expression(_) => Err(err(
            span,
            "bind(c) character entity must have length 1",
        )),
        _ => Err(err(
            span,
            "bind(c) character entity must have an expression length",
        )),
    }
}

/// A struct alignment must fold to a positive power of two.
pub fn check_alignment(asr: &Asr, expr: &crate::expr::Expr, span: Span) -> VResult {
    match const_eval::eval_int(asr, expr) {
        Some(v) if const_eval::is_power_of_two(v) => Ok(()),
        Some(v) => Err(err(span, format!("alignment {v} is not a power of two"))),
        None => Err(err(span, "alignment is not a constant")),
    }
}
