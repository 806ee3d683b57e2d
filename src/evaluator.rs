use std::collections::HashMap;

use crate::environment::{builtin_function, BuiltinFunction, Environment, Function};
use crate::error::EvalError;
use crate::parser::{
    Arguments, BinaryOperator, BooleanOperator, CompareOperator, Expression, Name, UnaryOperator,
};
use crate::value::Value;

pub(crate) type EvalResult = Result<Value, EvalError>;

/// Walks the tree, one value per node, resolving names through the
/// environment.
pub(crate) fn evaluate(expression: &Expression, environment: &Environment) -> EvalResult {
    match expression {
        Expression::Literal(value, _) => Ok(value.clone()),
        Expression::Name(name) => {
            environment
                .lookup_name(&name.name)
                .ok_or_else(|| EvalError::Name {
                    message: format!("Name '{}' is not defined", name.name),
                    location: name.span.start,
                })
        }
        Expression::UnaryOperation(op, operand, _) => {
            let value = evaluate(operand, environment)?;
            apply_unary(*op, &value)
        }
        Expression::BinaryOperation(op, operands, _) => {
            let left = evaluate(&operands.0, environment)?;
            let right = evaluate(&operands.1, environment)?;
            apply_binary(*op, &left, &right)
        }
        Expression::BooleanOperation(op, operands, _) => {
            evaluate_boolean(*op, operands, environment)
        }
        Expression::Comparison(left, pairs, _) => {
            // Running-result reduction: each operator applies against the
            // value of the previous step and every comparator is evaluated.
            let mut result = evaluate(left, environment)?;
            for (op, comparator) in pairs {
                let right = evaluate(comparator, environment)?;
                result = Value::Bool(apply_compare(*op, &result, &right)?);
            }
            Ok(result)
        }
        Expression::Ternary(test, body, orelse, _) => {
            // the untaken branch is never evaluated
            if evaluate(test, environment)?.is_truthy() {
                evaluate(body, environment)
            } else {
                evaluate(orelse, environment)
            }
        }
        Expression::Call(callee, arguments, _) => evaluate_call(callee, arguments, environment),
        // The grammar only produces Starred inside call arguments, where the
        // call rule rejects it; reaching one here means parser and evaluator
        // disagree, and nothing may silently evaluate.
        Expression::Starred(_, span) => Err(EvalError::Syntax {
            message: "Node Starred not allowed".to_string(),
            location: span.start,
        }),
    }
}

/// Short-circuits left to right and returns the deciding operand itself:
/// `1 or 2` is `1`, `1 and 2 and 3` is `3`.
fn evaluate_boolean(
    op: BooleanOperator,
    operands: &[Expression],
    environment: &Environment,
) -> EvalResult {
    let mut value = Value::None;
    for operand in operands {
        value = evaluate(operand, environment)?;
        let decided = match op {
            BooleanOperator::And => !value.is_truthy(),
            BooleanOperator::Or => value.is_truthy(),
        };
        if decided {
            return Ok(value);
        }
    }
    Ok(value)
}

enum Callee<'a> {
    User(&'a Function),
    Builtin(BuiltinFunction),
}

fn evaluate_call(callee: &Name, arguments: &Arguments, environment: &Environment) -> EvalResult {
    // the callee resolves first: caller functions, then built-ins
    let target = if let Some(function) = environment.function(&callee.name) {
        Callee::User(function)
    } else if let Some(builtin) = builtin_function(&callee.name) {
        Callee::Builtin(builtin)
    } else {
        return Err(EvalError::Name {
            message: format!("Function '{}' is not defined", callee.name),
            location: callee.span.start,
        });
    };
    // star arguments are rejected before anything is evaluated or invoked,
    // even if the callee would have accepted the call
    for argument in &arguments.positional {
        if let Expression::Starred(_, span) = argument {
            return Err(EvalError::Syntax {
                message: "Star arguments are not supported".to_string(),
                location: span.start,
            });
        }
    }
    let mut positional = Vec::with_capacity(arguments.positional.len());
    for argument in &arguments.positional {
        positional.push(evaluate(argument, environment)?);
    }
    let mut keyword = HashMap::new();
    for (name, argument) in &arguments.keyword {
        // later duplicate keys overwrite earlier ones
        keyword.insert(name.name.clone(), evaluate(argument, environment)?);
    }
    let result = match target {
        Callee::User(function) => function(&positional, &keyword),
        Callee::Builtin(builtin) => builtin(&positional, &keyword),
    };
    result.map_err(EvalError::from)
}

fn apply_unary(op: UnaryOperator, operand: &Value) -> EvalResult {
    match op {
        UnaryOperator::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOperator::Invert => match operand.as_int() {
            Some(n) => Ok(Value::Int(!n)),
            None => Err(bad_unary_operand(op, operand)),
        },
        UnaryOperator::UAdd => match operand {
            Value::Float(x) => Ok(Value::Float(*x)),
            _ => match operand.as_int() {
                Some(n) => Ok(Value::Int(n)),
                None => Err(bad_unary_operand(op, operand)),
            },
        },
        UnaryOperator::USub => match operand {
            Value::Float(x) => Ok(Value::Float(-x)),
            _ => match operand.as_int() {
                Some(n) => n.checked_neg().map(Value::Int).ok_or_else(integer_overflow),
                None => Err(bad_unary_operand(op, operand)),
            },
        },
    }
}

fn apply_binary(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult {
    use BinaryOperator::*;
    match op {
        Add | Sub | Mult | Mod | Pow | FloorDiv => arithmetic(op, left, right),
        Div => true_division(left, right),
        LShift | RShift | BitOr | BitXor | BitAnd => bitwise(op, left, right),
    }
}

fn arithmetic(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult {
    use BinaryOperator::*;
    // sequence forms of + and *
    match (op, left, right) {
        (Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{a}{b}"))),
        (Add, Value::List(a), Value::List(b)) => {
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            return Ok(Value::List(items));
        }
        (Mult, Value::Str(s), other) | (Mult, other, Value::Str(s)) => {
            if let Some(count) = other.as_int() {
                return Ok(Value::Str(s.repeat(count.max(0) as usize)));
            }
        }
        (Mult, Value::List(items), other) | (Mult, other, Value::List(items)) => {
            if let Some(count) = other.as_int() {
                let mut repeated = Vec::new();
                for _ in 0..count.max(0) {
                    repeated.extend(items.iter().cloned());
                }
                return Ok(Value::List(repeated));
            }
        }
        _ => {}
    }
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        return integer_arithmetic(op, a, b);
    }
    if let (Some(a), Some(b)) = (left.as_float(), right.as_float()) {
        return float_arithmetic(op, a, b);
    }
    Err(unsupported_operands(op, left, right))
}

fn integer_arithmetic(op: BinaryOperator, a: i64, b: i64) -> EvalResult {
    use BinaryOperator::*;
    let result = match op {
        Add => a.checked_add(b),
        Sub => a.checked_sub(b),
        Mult => a.checked_mul(b),
        // modulo takes the sign of the right operand, consistent with
        // floor division
        Mod => {
            if b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            // checked_rem only fails for MIN % -1, which is 0
            let r = a.checked_rem(b).unwrap_or(0);
            Some(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        // quotient truncates toward negative infinity
        FloorDiv => {
            if b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            a.checked_div(b).map(|q| {
                let r = a % b;
                if r != 0 && (r < 0) != (b < 0) {
                    q - 1
                } else {
                    q
                }
            })
        }
        Pow => return integer_pow(a, b),
        _ => unreachable!(),
    };
    result.map(Value::Int).ok_or_else(integer_overflow)
}

fn integer_pow(base: i64, exponent: i64) -> EvalResult {
    // a negative exponent promotes to float, as Python's ** does
    if exponent < 0 {
        if base == 0 {
            return Err(zero_division("0 cannot be raised to a negative power"));
        }
        return Ok(Value::Float((base as f64).powf(exponent as f64)));
    }
    let exponent = u32::try_from(exponent).map_err(|_| integer_overflow())?;
    base.checked_pow(exponent)
        .map(Value::Int)
        .ok_or_else(integer_overflow)
}

fn float_arithmetic(op: BinaryOperator, a: f64, b: f64) -> EvalResult {
    use BinaryOperator::*;
    let result = match op {
        Add => a + b,
        Sub => a - b,
        Mult => a * b,
        Mod => {
            if b == 0.0 {
                return Err(zero_division("float modulo"));
            }
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        FloorDiv => {
            if b == 0.0 {
                return Err(zero_division("float floor division"));
            }
            (a / b).floor()
        }
        Pow => a.powf(b),
        _ => unreachable!(),
    };
    Ok(Value::Float(result))
}

/// True division always yields a float, even for two exact integers.
fn true_division(left: &Value, right: &Value) -> EvalResult {
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => {
            if b == 0.0 {
                Err(zero_division("division by zero"))
            } else {
                Ok(Value::Float(a / b))
            }
        }
        _ => Err(unsupported_operands(BinaryOperator::Div, left, right)),
    }
}

fn bitwise(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult {
    use BinaryOperator::*;
    let (a, b) = match (left.as_int(), right.as_int()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(unsupported_operands(op, left, right)),
    };
    match op {
        BitOr => Ok(Value::Int(a | b)),
        BitXor => Ok(Value::Int(a ^ b)),
        BitAnd => Ok(Value::Int(a & b)),
        LShift => {
            if b < 0 {
                return Err(EvalError::raise("ValueError", "negative shift count"));
            }
            if b >= 64 {
                return Err(integer_overflow());
            }
            let result = a << b;
            if result >> b != a {
                return Err(integer_overflow());
            }
            Ok(Value::Int(result))
        }
        RShift => {
            if b < 0 {
                return Err(EvalError::raise("ValueError", "negative shift count"));
            }
            if b >= 64 {
                Ok(Value::Int(if a < 0 { -1 } else { 0 }))
            } else {
                Ok(Value::Int(a >> b))
            }
        }
        _ => unreachable!(),
    }
}

fn apply_compare(op: CompareOperator, left: &Value, right: &Value) -> Result<bool, EvalError> {
    use CompareOperator::*;
    match op {
        Eq => Ok(left == right),
        NotEq => Ok(left != right),
        Lt | LtE | Gt | GtE => ordering(op, left, right),
        Is => Ok(left.is_identical(right)),
        IsNot => Ok(!left.is_identical(right)),
        In => membership(left, right),
        NotIn => membership(left, right).map(|found| !found),
    }
}

fn ordering(op: CompareOperator, left: &Value, right: &Value) -> Result<bool, EvalError> {
    use std::cmp::Ordering;
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(EvalError::raise(
                    "TypeError",
                    format!(
                        "'{}' not supported between instances of '{}' and '{}'",
                        op.symbol(),
                        left.type_name(),
                        right.type_name()
                    ),
                ))
            }
        },
    };
    // NaN makes every ordering operator false
    Ok(match ordering {
        Some(Ordering::Less) => matches!(op, CompareOperator::Lt | CompareOperator::LtE),
        Some(Ordering::Equal) => matches!(op, CompareOperator::LtE | CompareOperator::GtE),
        Some(Ordering::Greater) => matches!(op, CompareOperator::Gt | CompareOperator::GtE),
        None => false,
    })
}

fn membership(needle: &Value, haystack: &Value) -> Result<bool, EvalError> {
    match haystack {
        Value::List(items) => Ok(items.iter().any(|item| item == needle)),
        Value::Str(text) => match needle {
            Value::Str(part) => Ok(text.contains(part.as_str())),
            _ => Err(EvalError::raise(
                "TypeError",
                format!(
                    "'in <string>' requires string as left operand, not {}",
                    needle.type_name()
                ),
            )),
        },
        _ => Err(EvalError::raise(
            "TypeError",
            format!(
                "argument of type '{}' is not iterable",
                haystack.type_name()
            ),
        )),
    }
}

fn bad_unary_operand(op: UnaryOperator, operand: &Value) -> EvalError {
    EvalError::raise(
        "TypeError",
        format!(
            "bad operand type for unary {}: '{}'",
            op.symbol(),
            operand.type_name()
        ),
    )
}

fn unsupported_operands(op: BinaryOperator, left: &Value, right: &Value) -> EvalError {
    EvalError::raise(
        "TypeError",
        format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ),
    )
}

fn zero_division(message: &str) -> EvalError {
    EvalError::raise("ZeroDivisionError", message)
}

fn integer_overflow() -> EvalError {
    EvalError::raise("OverflowError", "integer result too large")
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::BinaryOperator as Op;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    fn float(x: f64) -> Value {
        Value::Float(x)
    }

    fn kind(error: EvalError) -> String {
        match error {
            EvalError::Call { kind, .. } => kind,
            other => panic!("expected a call-kind failure, got {other:?}"),
        }
    }

    #[test]
    fn true_division_always_yields_float() {
        assert_eq!(apply_binary(Op::Div, &int(1), &int(2)), Ok(float(0.5)));
        let result = apply_binary(Op::Div, &int(4), &int(2)).unwrap();
        assert!(matches!(result, Value::Float(x) if x == 2.0));
    }

    #[test]
    fn floor_division_truncates_toward_negative_infinity() {
        assert_eq!(apply_binary(Op::FloorDiv, &int(7), &int(2)), Ok(int(3)));
        assert_eq!(apply_binary(Op::FloorDiv, &int(-7), &int(2)), Ok(int(-4)));
        assert_eq!(apply_binary(Op::FloorDiv, &int(7), &int(-2)), Ok(int(-4)));
        let result = apply_binary(Op::FloorDiv, &float(-7.0), &int(2)).unwrap();
        assert!(matches!(result, Value::Float(x) if x == -4.0));
    }

    #[test]
    fn modulo_takes_the_sign_of_the_right_operand() {
        assert_eq!(apply_binary(Op::Mod, &int(3), &int(2)), Ok(int(1)));
        assert_eq!(apply_binary(Op::Mod, &int(-7), &int(3)), Ok(int(2)));
        assert_eq!(apply_binary(Op::Mod, &int(7), &int(-3)), Ok(int(-2)));
        let result = apply_binary(Op::Mod, &float(-7.5), &int(2)).unwrap();
        assert!(matches!(result, Value::Float(x) if x == 0.5));
    }

    #[test]
    fn power_promotes_on_negative_exponents() {
        assert_eq!(apply_binary(Op::Pow, &int(3), &int(2)), Ok(int(9)));
        assert_eq!(apply_binary(Op::Pow, &int(2), &int(-1)), Ok(float(0.5)));
        let error = apply_binary(Op::Pow, &int(0), &int(-1)).unwrap_err();
        assert_eq!(kind(error), "ZeroDivisionError");
    }

    #[test]
    fn integer_overflow_is_a_failure_not_a_panic() {
        let error = apply_binary(Op::Add, &int(i64::MAX), &int(1)).unwrap_err();
        assert_eq!(kind(error), "OverflowError");
        let error = apply_binary(Op::Mult, &int(i64::MAX), &int(2)).unwrap_err();
        assert_eq!(kind(error), "OverflowError");
        let error = apply_binary(Op::LShift, &int(1), &int(64)).unwrap_err();
        assert_eq!(kind(error), "OverflowError");
        let error = apply_binary(Op::FloorDiv, &int(i64::MIN), &int(-1)).unwrap_err();
        assert_eq!(kind(error), "OverflowError");
    }

    #[test]
    fn division_by_zero_is_reported() {
        let error = apply_binary(Op::Div, &int(1), &int(0)).unwrap_err();
        assert_eq!(kind(error), "ZeroDivisionError");
        let error = apply_binary(Op::Mod, &int(1), &int(0)).unwrap_err();
        assert_eq!(kind(error), "ZeroDivisionError");
    }

    #[test]
    fn shifts_require_integers() {
        assert_eq!(apply_binary(Op::LShift, &int(1), &int(2)), Ok(int(4)));
        assert_eq!(apply_binary(Op::RShift, &int(0b100), &int(2)), Ok(int(1)));
        assert_eq!(apply_binary(Op::RShift, &int(-3), &int(1)), Ok(int(-2)));
        let error = apply_binary(Op::LShift, &Value::from("x"), &int(1)).unwrap_err();
        assert_eq!(kind(error), "TypeError");
        let error = apply_binary(Op::LShift, &int(1), &float(2.0)).unwrap_err();
        assert_eq!(kind(error), "TypeError");
        let error = apply_binary(Op::LShift, &int(1), &int(-1)).unwrap_err();
        assert_eq!(kind(error), "ValueError");
    }

    #[test]
    fn booleans_participate_in_arithmetic() {
        assert_eq!(apply_binary(Op::Add, &Value::Bool(true), &int(1)), Ok(int(2)));
        assert_eq!(apply_binary(Op::LShift, &Value::Bool(true), &int(1)), Ok(int(2)));
    }

    #[test]
    fn sequence_operators() {
        assert_eq!(
            apply_binary(Op::Add, &Value::from("ab"), &Value::from("cd")),
            Ok(Value::from("abcd"))
        );
        assert_eq!(
            apply_binary(Op::Mult, &Value::from("ab"), &int(2)),
            Ok(Value::from("abab"))
        );
        assert_eq!(
            apply_binary(Op::Mult, &Value::from("ab"), &int(-1)),
            Ok(Value::from(""))
        );
        let list = Value::from(vec![int(1)]);
        assert_eq!(
            apply_binary(Op::Add, &list, &Value::from(vec![int(2)])),
            Ok(Value::from(vec![int(1), int(2)]))
        );
        let error = apply_binary(Op::Add, &Value::from("a"), &int(1)).unwrap_err();
        assert_eq!(kind(error), "TypeError");
    }

    #[test]
    fn unary_operators() {
        assert_eq!(apply_unary(UnaryOperator::Invert, &int(0b011)), Ok(int(-4)));
        assert_eq!(apply_unary(UnaryOperator::USub, &int(2)), Ok(int(-2)));
        assert_eq!(apply_unary(UnaryOperator::UAdd, &float(1.5)), Ok(float(1.5)));
        assert_eq!(
            apply_unary(UnaryOperator::Not, &Value::from("")),
            Ok(Value::Bool(true))
        );
        let error = apply_unary(UnaryOperator::Invert, &Value::from("x")).unwrap_err();
        assert_eq!(kind(error), "TypeError");
    }

    #[test]
    fn comparisons() {
        assert_eq!(apply_compare(CompareOperator::LtE, &int(3), &int(3)), Ok(true));
        assert_eq!(apply_compare(CompareOperator::Gt, &int(3), &int(3)), Ok(false));
        assert_eq!(
            apply_compare(CompareOperator::Eq, &int(1), &float(1.0)),
            Ok(true)
        );
        assert_eq!(
            apply_compare(CompareOperator::Is, &int(1), &float(1.0)),
            Ok(false)
        );
        assert_eq!(
            apply_compare(CompareOperator::Lt, &Value::from("a"), &Value::from("b")),
            Ok(true)
        );
        let error =
            apply_compare(CompareOperator::Lt, &Value::from("a"), &int(1)).unwrap_err();
        assert_eq!(kind(error), "TypeError");
    }

    #[test]
    fn nan_ordering_is_always_false() {
        let nan = float(f64::NAN);
        assert_eq!(apply_compare(CompareOperator::Lt, &nan, &int(1)), Ok(false));
        assert_eq!(apply_compare(CompareOperator::GtE, &nan, &int(1)), Ok(false));
        assert_eq!(apply_compare(CompareOperator::Eq, &nan, &nan), Ok(false));
    }

    #[test]
    fn membership_in_lists_and_strings() {
        let data = Value::from(vec![int(1), int(2), int(3)]);
        assert_eq!(apply_compare(CompareOperator::In, &int(0), &data), Ok(false));
        assert_eq!(
            apply_compare(CompareOperator::NotIn, &int(0), &data),
            Ok(true)
        );
        assert_eq!(apply_compare(CompareOperator::In, &int(2), &data), Ok(true));
        assert_eq!(
            apply_compare(CompareOperator::In, &Value::from("ab"), &Value::from("cabd")),
            Ok(true)
        );
        let error = apply_compare(CompareOperator::In, &int(1), &int(2)).unwrap_err();
        assert_eq!(kind(error), "TypeError");
    }
}
