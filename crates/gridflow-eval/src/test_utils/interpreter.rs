#![cfg(test)]

//! Reference interpreter for engine tests: arithmetic, comparison,
//! concatenation and a handful of functions.

use std::cell::Cell;
use std::cmp::Ordering;

use gridflow_common::{
    AbsoluteCellRange, Ast, BinaryOp, CellError, CellValue, ErrorType, SimpleCellAddress, UnaryOp,
};

use crate::traits::{EvaluationContext, Interpreter};

/// Counts every top-level evaluation so tests can assert what was recomputed.
#[derive(Debug, Default)]
pub struct TestInterpreter {
    calls: Cell<usize>,
}

impl TestInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn reset(&self) {
        self.calls.set(0);
    }
}

impl Interpreter for TestInterpreter {
    fn evaluate(
        &self,
        ast: &Ast,
        address: SimpleCellAddress,
        ctx: &mut dyn EvaluationContext,
    ) -> CellValue {
        self.calls.set(self.calls.get() + 1);
        eval(ast, address, ctx)
    }
}

fn err(kind: ErrorType) -> CellValue {
    CellValue::error(kind)
}

fn eval(ast: &Ast, at: SimpleCellAddress, ctx: &mut dyn EvaluationContext) -> CellValue {
    match ast {
        Ast::Number(n) => CellValue::Number(*n),
        Ast::Text(s) => CellValue::Text(s.clone()),
        Ast::Boolean(b) => CellValue::Boolean(*b),
        Ast::Error(e) => CellValue::Error(e.clone()),
        Ast::CellReference(reference) => match reference.to_simple(at) {
            Some(address) => ctx.cell_value(address),
            None => err(ErrorType::Ref),
        },
        Ast::CellRange { .. } | Ast::ColumnRange { .. } | Ast::RowRange { .. } => {
            match ast.resolve_range(at) {
                Some(range) => CellValue::Array(ctx.range_values(&range)),
                None => err(ErrorType::Ref),
            }
        }
        Ast::Unary { op, operand } => {
            let n = match eval(operand, at, ctx).coerce_number() {
                Ok(n) => n,
                Err(e) => return CellValue::Error(e),
            };
            CellValue::Number(match op {
                UnaryOp::Minus => -n,
                UnaryOp::Plus => n,
                UnaryOp::Percent => n / 100.0,
            })
        }
        Ast::Binary { op, left, right } => {
            let l = eval(left, at, ctx);
            if l.is_error() {
                return l;
            }
            let r = eval(right, at, ctx);
            if r.is_error() {
                return r;
            }
            binary(*op, &l, &r)
        }
        Ast::Function { name, args } => call(name, args, at, ctx),
        Ast::Array(rows) => CellValue::Array(
            rows.iter()
                .map(|row| row.iter().map(|node| eval(node, at, ctx)).collect())
                .collect(),
        ),
    }
}

fn binary(op: BinaryOp, l: &CellValue, r: &CellValue) -> CellValue {
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => {
            let (a, b) = match (l.coerce_number(), r.coerce_number()) {
                (Ok(a), Ok(b)) => (a, b),
                (Err(e), _) | (_, Err(e)) => return CellValue::Error(e),
            };
            let n = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div if b == 0.0 => return err(ErrorType::DivByZero),
                BinaryOp::Div => a / b,
                _ => a.powf(b),
            };
            if n.is_finite() {
                CellValue::Number(n)
            } else {
                err(ErrorType::Num)
            }
        }
        BinaryOp::Concat => CellValue::Text(to_text(l) + &to_text(r)),
        _ => {
            let ord = compare(l, r);
            CellValue::Boolean(match op {
                BinaryOp::Eq => ord == Ordering::Equal,
                BinaryOp::Ne => ord != Ordering::Equal,
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            })
        }
    }
}

fn to_text(v: &CellValue) -> String {
    match v {
        CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        CellValue::Number(n) => n.to_string(),
        CellValue::Text(s) => s.clone(),
        CellValue::Boolean(true) => "TRUE".into(),
        CellValue::Boolean(false) => "FALSE".into(),
        CellValue::Error(e) => e.kind.to_string(),
        CellValue::Array(_) | CellValue::Empty => String::new(),
    }
}

/// Blanks compare as zero, empty text or FALSE depending on the other side.
fn compare(l: &CellValue, r: &CellValue) -> Ordering {
    let blank_like = |other: &CellValue| match other {
        CellValue::Text(_) => CellValue::Text(String::new()),
        CellValue::Boolean(_) => CellValue::Boolean(false),
        _ => CellValue::Number(0.0),
    };
    let l = if *l == CellValue::Empty { blank_like(r) } else { l.clone() };
    let r = if *r == CellValue::Empty { blank_like(&l) } else { r.clone() };
    crate::engine::eval::compare_values(&l, &r)
}

fn range_arg(arg: &Ast, at: SimpleCellAddress) -> Option<Result<AbsoluteCellRange, CellValue>> {
    match arg {
        Ast::CellRange { .. } | Ast::ColumnRange { .. } | Ast::RowRange { .. } => {
            Some(arg.resolve_range(at).ok_or_else(|| err(ErrorType::Ref)))
        }
        _ => None,
    }
}

/// Numbers of every argument, ranges flattened; the first error wins.
fn numbers(
    args: &[Ast],
    at: SimpleCellAddress,
    ctx: &mut dyn EvaluationContext,
) -> Result<Vec<f64>, CellValue> {
    let mut out = Vec::new();
    for arg in args {
        let value = match range_arg(arg, at) {
            Some(range) => CellValue::Array(ctx.range_values(&range?)),
            None => eval(arg, at, ctx),
        };
        match value {
            CellValue::Array(rows) => {
                for v in rows.into_iter().flatten() {
                    match v {
                        CellValue::Number(n) => out.push(n),
                        CellValue::Error(e) => return Err(CellValue::Error(e)),
                        _ => {}
                    }
                }
            }
            CellValue::Error(e) => return Err(CellValue::Error(e)),
            scalar => out.push(scalar.coerce_number().map_err(CellValue::Error)?),
        }
    }
    Ok(out)
}

fn sum_range(range: &AbsoluteCellRange, ctx: &mut dyn EvaluationContext) -> CellValue {
    if let Some(cached) = ctx.cached_range_value(range, "SUM") {
        return cached;
    }
    let mut total = 0.0;
    let mut result = None;
    for v in ctx.range_values(range).into_iter().flatten() {
        match v {
            CellValue::Number(n) => total += n,
            CellValue::Error(e) => {
                result = Some(CellValue::Error(e));
                break;
            }
            _ => {}
        }
    }
    let result = result.unwrap_or(CellValue::Number(total));
    ctx.store_range_value(range, "SUM", result.clone());
    result
}

fn call(name: &str, args: &[Ast], at: SimpleCellAddress, ctx: &mut dyn EvaluationContext) -> CellValue {
    match name {
        "SUM" => {
            let mut total = 0.0;
            for arg in args {
                let part = match range_arg(arg, at) {
                    Some(Ok(range)) => sum_range(&range, ctx),
                    Some(Err(e)) => e,
                    None => match numbers(std::slice::from_ref(arg), at, ctx) {
                        Ok(ns) => CellValue::Number(ns.iter().sum()),
                        Err(e) => e,
                    },
                };
                match part {
                    CellValue::Number(n) => total += n,
                    other => return other,
                }
            }
            CellValue::Number(total)
        }
        "AVERAGE" => match numbers(args, at, ctx) {
            Ok(ns) if ns.is_empty() => err(ErrorType::DivByZero),
            Ok(ns) => CellValue::Number(ns.iter().sum::<f64>() / ns.len() as f64),
            Err(e) => e,
        },
        "IF" => {
            let Some(condition) = args.first() else {
                return err(ErrorType::Value);
            };
            let condition = eval(condition, at, ctx);
            if condition.is_error() {
                return condition;
            }
            let branch = if condition.is_truthy() { args.get(1) } else { args.get(2) };
            match branch {
                Some(node) => eval(node, at, ctx),
                None => CellValue::Boolean(false),
            }
        }
        "COUNTBLANK" => match args.first().and_then(|a| range_arg(a, at)) {
            Some(Ok(range)) => {
                let values = ctx.range_values(&range);
                let blanks = values.iter().flatten().filter(|v| **v == CellValue::Empty).count();
                CellValue::Number(blanks as f64)
            }
            Some(Err(e)) => e,
            None => err(ErrorType::Value),
        },
        "TRANSPOSE" => {
            let Some(arg) = args.first() else {
                return err(ErrorType::Value);
            };
            match eval(arg, at, ctx) {
                CellValue::Array(rows) => {
                    let width = rows.first().map_or(0, Vec::len);
                    CellValue::Array(
                        (0..width)
                            .map(|c| rows.iter().map(|row| row[c].clone()).collect())
                            .collect(),
                    )
                }
                scalar => scalar,
            }
        }
        _ => CellValue::Error(CellError::new(ErrorType::Name).with_message(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DependencyGraph, GraphContext};
    use crate::test_utils::cell;

    #[test]
    fn arithmetic_and_errors() {
        let mut graph = DependencyGraph::new();
        let mut ctx = GraphContext::new(&mut graph);
        let at = cell("A1");
        let div = Ast::binary(BinaryOp::Div, Ast::Number(1.0), Ast::Number(0.0));
        assert_eq!(eval(&div, at, &mut ctx).error_kind(), Some(ErrorType::DivByZero));
        let cat = Ast::binary(BinaryOp::Concat, Ast::Text("n=".into()), Ast::Number(2.0));
        assert_eq!(eval(&cat, at, &mut ctx), CellValue::from("n=2"));
        let eq = Ast::binary(BinaryOp::Eq, Ast::Text("A".into()), Ast::Text("a".into()));
        assert_eq!(eval(&eq, at, &mut ctx), CellValue::Boolean(true));
    }

    #[test]
    fn counts_each_top_level_call_once() {
        let mut graph = DependencyGraph::new();
        let mut ctx = GraphContext::new(&mut graph);
        let interpreter = TestInterpreter::new();
        let nested = Ast::function("IF", vec![Ast::Boolean(true), Ast::Number(1.0)]);
        interpreter.evaluate(&nested, cell("A1"), &mut ctx);
        assert_eq!(interpreter.calls(), 1);
    }
}
