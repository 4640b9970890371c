//! The constant folding declaration resolution needs: array bounds, string
//! lengths, kind and alignment constants. Anything this cannot fold is
//! simply not a declaration-phase constant.

use crate::arena::Asr;
use crate::expr::{BinOp, Expr};
use crate::symbol::Symbol;

/// Fold an expression to an integer, reading through variables with known
/// values. Returns `None` for anything non-constant, and on overflow or
/// division by zero.
pub fn eval_int(asr: &Asr, expr: &Expr) -> Option<i64> {
    match expr {
        Expr::IntConstant { value, .. } => Some(*value),
        Expr::BinaryOp {
            op, left, right, ..
        } => {
            let l = eval_int(asr, left)?;
            let r = eval_int(asr, right)?;
            match op {
                BinOp::Add => l.checked_add(r),
                BinOp::Sub => l.checked_sub(r),
                BinOp::Mul => l.checked_mul(r),
                BinOp::Div => {
                    if r == 0 {
                        None
                    } else {
                        l.checked_div(r)
                    }
                }
                _ => None,
            }
        }
        Expr::Var { sym, .. } => {
            let sym = asr.get_past_external(*sym);
            match asr.symbol(sym) {
                Symbol::Variable(v) => {
                    let known = v.value.as_ref().or(v.init.as_ref())?;
                    eval_int(asr, known)
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Fold to a logical value.
pub fn eval_logical(asr: &Asr, expr: &Expr) -> Option<bool> {
    match expr {
        Expr::LogicalConstant { value, .. } => Some(*value),
        Expr::BinaryOp {
            op, left, right, ..
        } => {
            let l = eval_int(asr, left)?;
            let r = eval_int(asr, right)?;
            match op {
                BinOp::Eq => Some(l == r),
                BinOp::NotEq => Some(l != r),
                BinOp::Lt => Some(l < r),
                BinOp::LtE => Some(l <= r),
                BinOp::Gt => Some(l > r),
                BinOp::GtE => Some(l >= r),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Whether a folded value is a positive power of two.
pub fn is_power_of_two(value: i64) -> bool {
    value > 0 && (value & (value - 1)) == 0
}
