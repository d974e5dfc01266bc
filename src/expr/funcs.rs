//! funcs.rs
//! The fixed overload table for operators and named functions. A call site is
//! bound to the first entry whose name, arity and parameter patterns accept the
//! static argument types; `Any` on either side is a wildcard.

use super::error::ExprError;
use super::types::ExprType;
use crate::value::Value;

type Apply = fn(&[Value]) -> Result<Value, ExprError>;

pub struct ExprFunc {
    pub name: &'static str,
    /// Operators print infix (or prefix for unary) when described.
    pub op: bool,
    /// One slice of acceptable types per positional parameter.
    pub params: &'static [&'static [ExprType]],
    pub returns: ExprType,
    apply: Apply,
}

impl ExprFunc {
    #[inline(always)]
    pub fn arity(&self) -> usize { self.params.len() }

    pub fn matches(&self, args: &[ExprType]) -> bool {
        if args.len() != self.params.len() {
            return false;
        }
        args.iter().zip(self.params.iter()).all(|(actual, accepted)| {
            *actual == ExprType::Any || accepted.iter().any(|p| *p == ExprType::Any || p == actual)
        })
    }

    pub fn apply(&self, args: &[Value]) -> Result<Value, ExprError> {
        (self.apply)(args)
    }

    /// `name(number|text,number)` style signature, used in error messages.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|types| types.iter().map(|t| t.name()).collect::<Vec<_>>().join("|"))
            .collect();
        format!("{}({})", self.name, params.join(","))
    }
}

impl std::fmt::Debug for ExprFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.signature())
    }
}

impl PartialEq for ExprFunc {
    fn eq(&self, other: &Self) -> bool { std::ptr::eq(self, other) }
}

// --- Argument helpers ---

/// Numeric view of an operand. The empty reference reads as zero so that a
/// member chain through an unset link does not poison arithmetic.
fn num(v: &Value) -> Result<f64, ExprError> {
    match v {
        Value::Number(n) => Ok(*n),
        Value::Entity(None) => Ok(0.0),
        other => Err(ExprError::Eval(format!("expected a number, got {} \"{}\"", other.type_of(), other))),
    }
}

fn truth(v: &Value) -> Result<bool, ExprError> {
    match v {
        Value::Bool(b) => Ok(*b),
        other => Err(ExprError::Eval(format!("expected true-false, got {} \"{}\"", other.type_of(), other))),
    }
}

fn unary(args: &[Value], f: fn(f64) -> f64) -> Result<Value, ExprError> {
    Ok(Value::Number(f(num(&args[0])?)))
}

fn binary(args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value, ExprError> {
    Ok(Value::Number(f(num(&args[0])?, num(&args[1])?)))
}

fn compare(args: &[Value], f: fn(f64, f64) -> bool) -> Result<Value, ExprError> {
    Ok(Value::Bool(f(num(&args[0])?, num(&args[1])?)))
}

fn add(args: &[Value]) -> Result<Value, ExprError> {
    match (&args[0], &args[1]) {
        (Value::Text(a), b) => Ok(Value::Text(format!("{}{}", a, b))),
        (a, Value::Text(b)) => Ok(Value::Text(format!("{}{}", a, b))),
        _ => binary(args, |a, b| a + b),
    }
}

fn sum(args: &[Value]) -> Result<Value, ExprError> {
    let mut total = 0.0;
    for item in args[0].elements() {
        total += num(&item)?;
    }
    Ok(Value::Number(total))
}

fn count(args: &[Value]) -> Result<Value, ExprError> {
    Ok(Value::Number(args[0].list_len().unwrap_or(1) as f64))
}

fn text(args: &[Value]) -> Result<Value, ExprError> {
    Ok(Value::Text(args[0].to_string()))
}

/// False only for the empty reference.
fn exists(args: &[Value]) -> Result<Value, ExprError> {
    Ok(Value::Bool(!matches!(args[0], Value::Entity(None))))
}

// --- Table ---

use ExprType::{Any, EntityList, Number, NumberList, Text, TextList, TrueFalse, TrueFalseList};

const N: &[ExprType] = &[Number];
const NT: &[ExprType] = &[Number, Text];
const TF: &[ExprType] = &[TrueFalse];
const ANY: &[ExprType] = &[Any];
const LISTS: &[ExprType] = &[NumberList, TextList, TrueFalseList, EntityList];

static FUNCS: &[ExprFunc] = &[
    ExprFunc { name: "+", op: true, params: &[N, N], returns: Number, apply: add },
    ExprFunc { name: "+", op: true, params: &[NT, NT], returns: Text, apply: add },
    ExprFunc { name: "-", op: true, params: &[N, N], returns: Number, apply: |a| binary(a, |x, y| x - y) },
    ExprFunc { name: "-", op: true, params: &[N], returns: Number, apply: |a| unary(a, |x| -x) },
    ExprFunc { name: "*", op: true, params: &[N, N], returns: Number, apply: |a| binary(a, |x, y| x * y) },
    ExprFunc { name: "/", op: true, params: &[N, N], returns: Number, apply: |a| binary(a, |x, y| x / y) },
    ExprFunc { name: "<", op: true, params: &[N, N], returns: TrueFalse, apply: |a| compare(a, |x, y| x < y) },
    ExprFunc { name: "<=", op: true, params: &[N, N], returns: TrueFalse, apply: |a| compare(a, |x, y| x <= y) },
    ExprFunc { name: ">", op: true, params: &[N, N], returns: TrueFalse, apply: |a| compare(a, |x, y| x > y) },
    ExprFunc { name: ">=", op: true, params: &[N, N], returns: TrueFalse, apply: |a| compare(a, |x, y| x >= y) },
    ExprFunc { name: "==", op: true, params: &[ANY, ANY], returns: TrueFalse, apply: |a| Ok(Value::Bool(a[0] == a[1])) },
    ExprFunc { name: "!=", op: true, params: &[ANY, ANY], returns: TrueFalse, apply: |a| Ok(Value::Bool(a[0] != a[1])) },
    ExprFunc { name: "&&", op: true, params: &[TF, TF], returns: TrueFalse, apply: |a| Ok(Value::Bool(truth(&a[0])? && truth(&a[1])?)) },
    ExprFunc { name: "||", op: true, params: &[TF, TF], returns: TrueFalse, apply: |a| Ok(Value::Bool(truth(&a[0])? || truth(&a[1])?)) },
    ExprFunc { name: "!", op: true, params: &[TF], returns: TrueFalse, apply: |a| Ok(Value::Bool(!truth(&a[0])?)) },
    ExprFunc { name: "floor", op: false, params: &[N], returns: Number, apply: |a| unary(a, f64::floor) },
    ExprFunc { name: "ceil", op: false, params: &[N], returns: Number, apply: |a| unary(a, f64::ceil) },
    ExprFunc { name: "round", op: false, params: &[N], returns: Number, apply: |a| unary(a, f64::round) },
    ExprFunc { name: "abs", op: false, params: &[N], returns: Number, apply: |a| unary(a, f64::abs) },
    ExprFunc { name: "min", op: false, params: &[N, N], returns: Number, apply: |a| binary(a, f64::min) },
    ExprFunc { name: "max", op: false, params: &[N, N], returns: Number, apply: |a| binary(a, f64::max) },
    ExprFunc { name: "sum", op: false, params: &[&[NumberList]], returns: Number, apply: sum },
    ExprFunc { name: "count", op: false, params: &[LISTS], returns: Number, apply: count },
    ExprFunc { name: "text", op: false, params: &[ANY], returns: Text, apply: text },
    ExprFunc { name: "exists", op: false, params: &[ANY], returns: TrueFalse, apply: exists },
];

pub fn is_known(name: &str) -> bool {
    FUNCS.iter().any(|f| f.name == name)
}

/// First overload of `name` accepting `args`.
pub fn find(name: &str, args: &[ExprType]) -> Option<&'static ExprFunc> {
    FUNCS.iter().find(|f| f.name == name && f.matches(args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("+", vec![Number, Number], Number)]
    #[case("+", vec![Number, Text], Text)]
    #[case("+", vec![Text, Text], Text)]
    #[case("+", vec![Any, Number], Number)]
    #[case("+", vec![Any, Text], Text)]
    #[case("-", vec![Number], Number)]
    #[case("sum", vec![Any], Number)]
    #[case("count", vec![EntityList], Number)]
    #[case("==", vec![Text, Number], TrueFalse)]
    fn test_overload_resolution(#[case] name: &str, #[case] args: Vec<ExprType>, #[case] returns: ExprType) {
        let func = find(name, &args).unwrap();
        assert_eq!(func.returns, returns);
    }

    #[rstest]
    #[case("-", vec![Text, Number])]
    #[case("sum", vec![Number])]
    #[case("floor", vec![Number, Number])]
    #[case("&&", vec![Number, TrueFalse])]
    fn test_no_overload(#[case] name: &str, #[case] args: Vec<ExprType>) {
        assert!(find(name, &args).is_none());
    }

    #[test]
    fn test_add_concatenates_text() {
        let plus = find("+", &[Number, Text]).unwrap();
        let out = plus.apply(&[Value::Number(14.7), Value::from(" and roll 2d8")]).unwrap();
        assert_eq!(out, Value::from("14.7 and roll 2d8"));
    }

    #[test]
    fn test_sum_and_count() {
        let total = find("sum", &[NumberList]).unwrap();
        assert_eq!(total.apply(&[Value::NumberList(vec![1.0, 2.0, 3.0])]).unwrap(), Value::Number(6.0));
        let n = find("count", &[TextList]).unwrap();
        assert_eq!(n.apply(&[Value::from(vec!["a", "b"])]).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_exists() {
        let exists = find("exists", &[ExprType::Entity]).unwrap();
        assert_eq!(exists.apply(&[Value::Entity(None)]).unwrap(), Value::Bool(false));
        assert_eq!(exists.apply(&[Value::Number(0.0)]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_runtime_type_error() {
        let floor = find("floor", &[Any]).unwrap();
        assert!(matches!(floor.apply(&[Value::from("x")]), Err(ExprError::Eval(_))));
        assert_eq!(floor.signature(), "floor(number)");
    }
}
