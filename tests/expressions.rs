use std::collections::HashMap;

use expression::{CallError, ErrorKind, ExpressionParser, Function, Value};

fn eval(input: &str) -> Value {
    ExpressionParser::default()
        .parse(input)
        .unwrap_or_else(|error| panic!("\"{input}\" failed: {error}"))
}

fn assert_int(input: &str, expected: i64) {
    match eval(input) {
        Value::Int(n) => assert_eq!(n, expected, "for \"{input}\""),
        other => panic!("\"{input}\" evaluated to {other:?}, expected the int {expected}"),
    }
}

fn assert_float(input: &str, expected: f64) {
    match eval(input) {
        Value::Float(x) => assert_eq!(x, expected, "for \"{input}\""),
        other => panic!("\"{input}\" evaluated to {other:?}, expected the float {expected}"),
    }
}

fn assert_bool(input: &str, expected: bool) {
    match eval(input) {
        Value::Bool(b) => assert_eq!(b, expected, "for \"{input}\""),
        other => panic!("\"{input}\" evaluated to {other:?}, expected the bool {expected}"),
    }
}

fn data_variables() -> HashMap<String, Value> {
    HashMap::from([(
        "data".to_string(),
        Value::from(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
    )])
}

fn x2() -> Function {
    Box::new(|args: &[Value], kwargs: &HashMap<String, Value>| {
        if !kwargs.is_empty() {
            return Err(CallError::new("TypeError", "x2() takes no keyword arguments"));
        }
        match args {
            [Value::Int(n)] => Ok(Value::Int(n * 2)),
            [Value::Float(x)] => Ok(Value::Float(x * 2.0)),
            [other] => Err(CallError::new(
                "TypeError",
                format!("x2() argument must be a number, not '{other:?}'"),
            )),
            _ => Err(CallError::new(
                "TypeError",
                format!(
                    "x2() takes 1 positional argument but {} were given",
                    args.len()
                ),
            )),
        }
    })
}

#[test]
fn arithmetic_operators() {
    assert_int("1+2", 3);
    assert_int("2-1", 1);
    assert_float("2*2.5", 5.0);
    assert_int("3%2", 1);
    assert_int("3**2", 9);
    assert_int("7//2", 3);
    assert_float("7.0//2", 3.0);
}

#[test]
fn true_division_always_returns_a_float() {
    assert_float("1/2", 0.5);
    assert_float("4/2", 2.0);
}

#[test]
fn bitwise_operators() {
    assert_int("1<<2", 4);
    assert_int("0b100>>2", 1);
    assert_int("~0b011", -4);
    assert_int("0b101 | 0b010", 7);
    assert_int("0b110 ^ 0b011", 5);
    assert_int("0b110 & 0b011", 2);
}

#[test]
fn conditional_expressions() {
    assert_int("0 if True else 1", 0);
    assert_float("0.5 if 1 > 2 else 1.5", 1.5);
}

#[test]
fn conditional_branches_are_lazy() {
    // the untaken branch would raise a NameError if it were evaluated
    assert_int("1 if True else undefined", 1);
    assert_int("undefined if False else 2", 2);
}

#[test]
fn boolean_operators_return_the_deciding_operand() {
    assert_int("1 and 2 and 3", 3);
    assert_int("1 or 2 or 3", 1);
    assert_int("0 and undefined", 0);
    assert_int("1 or undefined", 1);
    match eval("1 and None") {
        Value::None => {}
        other => panic!("expected None, got {other:?}"),
    }
}

#[test]
fn comparisons() {
    assert_bool("3 <= 3", true);
    assert_bool("3 > 3", false);
    assert_bool("1 == 1.0", true);
    assert_bool("1 != 2", true);
    assert_bool("'a' < 'b'", true);
    assert_bool("None is None", true);
    assert_bool("True is 1", false);
    assert_bool("1 is not 1.0", true);
}

#[test]
fn chained_comparison_uses_the_running_result() {
    assert_bool("1 < 2 < 3", true);
    // the second operator compares against the boolean produced by the
    // first, so this holds even though 4 < 2 does not
    assert_bool("3 < 4 < 2", true);
    assert_bool("2 < 1 < 0", false);
}

#[test]
fn membership() {
    let parser = ExpressionParser::new(data_variables(), HashMap::new()).unwrap();
    match parser.parse("0 in data").unwrap() {
        Value::Bool(b) => assert!(!b),
        other => panic!("expected a bool, got {other:?}"),
    }
    match parser.parse("0 not in data").unwrap() {
        Value::Bool(b) => assert!(b),
        other => panic!("expected a bool, got {other:?}"),
    }
    assert_eq!(parser.parse("2 in data").unwrap(), Value::Bool(true));
    assert_bool("'ab' in 'cabd'", true);
    assert_bool("'x' not in 'cabd'", true);
}

#[test]
fn constants_resolve_without_an_environment() {
    assert_eq!(eval("None"), Value::None);
    assert_bool("True", true);
    assert_bool("False", false);
}

#[test]
fn constant_shadowing_fails_at_construction() {
    let variables = HashMap::from([("True".to_string(), Value::Int(42))]);
    let error = ExpressionParser::new(variables, HashMap::new()).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Name);
    assert!(error.message().contains("True"), "got: {}", error.message());
}

#[test]
fn undefined_names_raise_name_errors() {
    let error = ExpressionParser::default().parse("test").unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Name);
    assert_eq!(error.message(), "Name 'test' is not defined");
    assert_eq!(error.location().line, 1);
    assert_eq!(error.location().column, 0);
}

#[test]
fn undefined_functions_raise_name_errors() {
    let error = ExpressionParser::default().parse("missing(1)").unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Name);
    assert_eq!(error.message(), "Function 'missing' is not defined");
}

#[test]
fn injected_functions_are_called() {
    let functions = HashMap::from([("x2".to_string(), x2())]);
    let parser = ExpressionParser::new(HashMap::new(), functions).unwrap();
    assert_eq!(parser.parse("x2(4)").unwrap(), Value::Int(8));
    assert_eq!(parser.parse("x2(2.5)").unwrap(), Value::Float(5.0));
    assert_eq!(parser.parse("x2(x2(1))").unwrap(), Value::Int(4));
}

#[test]
fn star_arguments_are_rejected_before_the_call() {
    let functions = HashMap::from([("x2".to_string(), x2())]);
    let parser = ExpressionParser::new(data_variables(), functions).unwrap();
    let error = parser.parse("x2(1, *data)").unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Syntax);
    assert_eq!(error.message(), "Star arguments are not supported");
}

#[test]
fn callee_failures_are_normalized_with_their_kind_name() {
    let functions = HashMap::from([("x2".to_string(), x2())]);
    let parser = ExpressionParser::new(HashMap::new(), functions).unwrap();
    let error = parser.parse("x2(1, 2)").unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Syntax);
    assert!(
        error.message().starts_with("TypeError: "),
        "got: {}",
        error.message()
    );
    assert_eq!(error.location().line, 1);
    assert_eq!(error.location().column, 0);
}

#[test]
fn duplicate_keyword_arguments_overwrite() {
    let pick: Function = Box::new(|_args, kwargs| {
        kwargs
            .get("a")
            .cloned()
            .ok_or_else(|| CallError::new("KeyError", "'a'"))
    });
    let functions = HashMap::from([("pick".to_string(), pick)]);
    let parser = ExpressionParser::new(HashMap::new(), functions).unwrap();
    assert_eq!(parser.parse("pick(a=1, a=2)").unwrap(), Value::Int(2));
}

#[test]
fn builtin_coercion_functions() {
    assert_int("int('12')", 12);
    assert_int("int(2.8)", 2);
    assert_float("float(1)", 1.0);
    assert_bool("bool(0)", false);
    assert_bool("bool('x')", true);
    let error = ExpressionParser::default().parse("int('a')").unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Syntax);
    assert!(
        error.message().starts_with("ValueError: "),
        "got: {}",
        error.message()
    );
}

#[test]
fn injected_functions_shadow_builtins() {
    let always_one: Function = Box::new(|_args, _kwargs| Ok(Value::Int(1)));
    let functions = HashMap::from([("int".to_string(), always_one)]);
    let parser = ExpressionParser::new(HashMap::new(), functions).unwrap();
    assert_eq!(parser.parse("int('12')").unwrap(), Value::Int(1));
}

#[test]
fn disallowed_constructs_are_rejected() {
    for (input, node) in [
        ("lambda x: x", "Lambda"),
        ("while True: pass", "While"),
        ("x = 1", "Assign"),
        ("a.b", "Attribute"),
    ] {
        let error = ExpressionParser::default().parse(input).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Syntax);
        assert_eq!(error.message(), format!("Node {node} not allowed"));
    }
}

#[test]
fn expression_count_violations() {
    let error = ExpressionParser::default().parse("").unwrap_err();
    assert_eq!(error.message(), "Exactly one expression must be provided");
    assert_eq!((error.location().line, error.location().column), (1, 0));
    let error = ExpressionParser::default().parse("1\n2").unwrap_err();
    assert_eq!(error.message(), "Exactly one expression must be provided");
    assert_eq!((error.location().line, error.location().column), (2, 0));
}

#[test]
fn errors_carry_the_source_label_and_text() {
    let error = ExpressionParser::default()
        .parse_named("1 +", "rules.cfg")
        .unwrap_err();
    assert_eq!(error.source_label(), Some("rules.cfg"));
    assert_eq!(error.source_text(), Some("1 +"));
    let rendered = error.to_string();
    assert!(rendered.contains("File \"rules.cfg\""), "got: {rendered}");
    assert!(rendered.contains("SyntaxError"), "got: {rendered}");
}

#[test]
fn evaluation_is_idempotent() {
    let variables = HashMap::from([("x".to_string(), Value::Int(10))]);
    let parser = ExpressionParser::new(variables, HashMap::new()).unwrap();
    let first = parser.parse("1 + 2 * x").unwrap();
    let second = parser.parse("1 + 2 * x").unwrap();
    assert_eq!(first, second);
    assert_eq!(first, Value::Int(21));
}

#[test]
fn failures_do_not_corrupt_the_environment() {
    let parser = ExpressionParser::new(data_variables(), HashMap::new()).unwrap();
    assert!(parser.parse("test").is_err());
    assert!(parser.parse("1 +").is_err());
    assert_eq!(parser.parse("2 in data").unwrap(), Value::Bool(true));
}

#[test]
fn rendered_values_match_the_interpreter_output() {
    assert_eq!(eval("1/2").to_string(), "0.5");
    assert_eq!(eval("4/2").to_string(), "2.0");
    assert_eq!(eval("None").to_string(), "None");
    assert_eq!(eval("1 == 1").to_string(), "True");
    assert_eq!(eval("'a' + 'b'").to_string(), "ab");
}
