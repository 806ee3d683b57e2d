use std::cell::{Cell, RefCell};

use super::ast::*;
use super::combinators::*;
use super::locations::{Locatable, Location};
use super::tokenizer::{Token, TokenType as TT};
use crate::error::Error;
use crate::value::Value;

/// Parses a token stream into exactly one expression.
///
/// Anything else (an empty stream, a second expression, residual tokens, a
/// construct outside the expression grammar) is a syntax error carrying the
/// offending token's position.
pub(crate) fn parse_expression(tokens: &[Token]) -> Result<Expression, Error> {
    let furthest = Cell::new(0);
    let errors = RefCell::new(Vec::new());
    let state = ParserState::new(&furthest, &errors);
    let input = ParserInput::new(tokens, state);

    if matches!(tokens.first(), None | Some(Token { typ: TT::ENDMARKER, .. })) {
        return Err(Error::syntax(
            "Exactly one expression must be provided",
            Location::start_of_input(),
        ));
    }

    match expression.parse(input) {
        ParseResult::Ok((parsed, rest)) => {
            let (rest, separated) = skip_separators(rest);
            match rest.first() {
                None | Some(Token { typ: TT::ENDMARKER, .. }) => Ok(parsed),
                Some(offending) => {
                    if separated {
                        if let ParseResult::Ok(_) = expression.parse(rest) {
                            return Err(Error::syntax(
                                "Exactly one expression must be provided",
                                offending.span.start,
                            ));
                        }
                    }
                    Err(reported_or(&errors, rejection(offending, true)))
                }
            }
        }
        ParseResult::Err => {
            let index = furthest.get().min(tokens.len().saturating_sub(1));
            Err(reported_or(&errors, rejection(&tokens[index], false)))
        }
    }
}

/// Consumes NEWLINE and ';' tokens; reports whether any were present, since
/// only a separated trailing expression counts as a second statement.
fn skip_separators(input: ParserInput) -> (ParserInput, bool) {
    match zero_or_more(tok(TT::NEWLINE).or(tok(TT::SEMI))).parse(input) {
        ParseResult::Ok((separators, rest)) => (rest, !separators.is_empty()),
        ParseResult::Err => (input, false),
    }
}

fn reported_or(errors: &RefCell<Vec<Error>>, fallback: Error) -> Error {
    errors.borrow_mut().drain(..).next().unwrap_or(fallback)
}

/// The catch-all half of the sandbox: a failure on a token that names a
/// construct outside the grammar rejects that construct by name, everything
/// else is plain invalid syntax.
fn rejection(token: &Token, after_expression: bool) -> Error {
    match disallowed_node(token, after_expression) {
        Some(node) => Error::syntax(format!("Node {node} not allowed"), token.span.start),
        None => Error::syntax("invalid syntax", token.span.start),
    }
}

fn disallowed_node(token: &Token, after_expression: bool) -> Option<&'static str> {
    match token.typ {
        TT::KEYWORD => match token.lexeme.as_str() {
            "lambda" => Some("Lambda"),
            "await" => Some("Await"),
            "yield" => Some("Yield"),
            "assert" => Some("Assert"),
            "del" => Some("Delete"),
            "pass" => Some("Pass"),
            "break" => Some("Break"),
            "continue" => Some("Continue"),
            "return" => Some("Return"),
            "raise" => Some("Raise"),
            "global" => Some("Global"),
            "nonlocal" => Some("Nonlocal"),
            "import" | "from" => Some("Import"),
            "for" => Some("For"),
            "while" => Some("While"),
            "def" => Some("FunctionDef"),
            "class" => Some("ClassDef"),
            "with" => Some("With"),
            "try" | "finally" => Some("Try"),
            "except" => Some("ExceptHandler"),
            "async" => Some("AsyncFunctionDef"),
            "if" if !after_expression => Some("If"),
            _ => None,
        },
        TT::EQUAL => Some("Assign"),
        TT::PLUSEQUAL
        | TT::MINEQUAL
        | TT::STAREQUAL
        | TT::SLASHEQUAL
        | TT::DOUBLESLASHEQUAL
        | TT::PERCENTEQUAL
        | TT::AMPEREQUAL
        | TT::VBAREQUAL
        | TT::CIRCUMFLEXEQUAL
        | TT::LEFTSHIFTEQUAL
        | TT::RIGHTSHIFTEQUAL
        | TT::DOUBLESTAREQUAL
        | TT::ATEQUAL => Some("AugAssign"),
        TT::COLONEQUAL => Some("NamedExpr"),
        TT::DOT => Some("Attribute"),
        TT::LSQB => Some(if after_expression { "Subscript" } else { "List" }),
        TT::LBRACE => Some("Dict"),
        TT::ELLIPSIS => Some("Ellipsis"),
        TT::STAR if !after_expression => Some("Starred"),
        _ => None,
    }
}

// expression:
//     | disjunction 'if' disjunction 'else' expression
//     | disjunction
fn expression(input: ParserInput) -> ParseResult<Expression> {
    pair(
        disjunction,
        pair(
            right(token(TT::KEYWORD, "if"), disjunction),
            right(token(TT::KEYWORD, "else"), expression),
        ),
    )
    .map(|(body, (test, orelse))| {
        let span = body.span().till(&orelse);
        Expression::Ternary(Box::new(test), Box::new(body), Box::new(orelse), span)
    })
    .or(disjunction)
    .parse(input)
}

fn boolean_operation(op: BooleanOperator, first: Expression, rest: Vec<Expression>) -> Expression {
    let span = match rest.last() {
        Some(last) => first.span().till(last),
        None => first.span(),
    };
    let mut operands = vec![first];
    operands.extend(rest);
    Expression::BooleanOperation(op, operands, span)
}

// disjunction:
//     | conjunction ('or' conjunction)+
//     | conjunction
fn disjunction(input: ParserInput) -> ParseResult<Expression> {
    pair(
        conjunction,
        one_or_more(right(token(TT::KEYWORD, "or"), conjunction)),
    )
    .map(|(first, rest)| boolean_operation(BooleanOperator::Or, first, rest))
    .or(conjunction)
    .parse(input)
}

// conjunction:
//     | inversion ('and' inversion)+
//     | inversion
fn conjunction(input: ParserInput) -> ParseResult<Expression> {
    pair(
        inversion,
        one_or_more(right(token(TT::KEYWORD, "and"), inversion)),
    )
    .map(|(first, rest)| boolean_operation(BooleanOperator::And, first, rest))
    .or(inversion)
    .parse(input)
}

// inversion:
//     | 'not' inversion
//     | comparison
fn inversion(input: ParserInput) -> ParseResult<Expression> {
    pair(token(TT::KEYWORD, "not"), inversion)
        .map(|(keyword, operand)| {
            let span = keyword.span.till(&operand);
            Expression::UnaryOperation(UnaryOperator::Not, Box::new(operand), span)
        })
        .or(comparison)
        .parse(input)
}

// comparison:
//     | bitwise_or compare_op_bitwise_or_pair+
//     | bitwise_or
fn comparison(input: ParserInput) -> ParseResult<Expression> {
    pair(bitwise_or, one_or_more(compare_op_bitwise_or_pair))
        .map(|(left, pairs)| {
            let span = match pairs.last() {
                Some((_, last)) => left.span().till(last),
                None => left.span(),
            };
            Expression::Comparison(Box::new(left), pairs, span)
        })
        .or(bitwise_or)
        .parse(input)
}

// compare_op_bitwise_or_pair:
//     | eq_bitwise_or
//     | noteq_bitwise_or
//     | lte_bitwise_or
//     | lt_bitwise_or
//     | gte_bitwise_or
//     | gt_bitwise_or
//     | notin_bitwise_or
//     | in_bitwise_or
//     | isnot_bitwise_or
//     | is_bitwise_or
fn compare_op_bitwise_or_pair(input: ParserInput) -> ParseResult<(CompareOperator, Expression)> {
    eq_bitwise_or
        .or(noteq_bitwise_or)
        .or(lte_bitwise_or)
        .or(lt_bitwise_or)
        .or(gte_bitwise_or)
        .or(gt_bitwise_or)
        .or(notin_bitwise_or)
        .or(in_bitwise_or)
        .or(isnot_bitwise_or)
        .or(is_bitwise_or)
        .parse(input)
}

// eq_bitwise_or: '==' bitwise_or
fn eq_bitwise_or(input: ParserInput) -> ParseResult<(CompareOperator, Expression)> {
    right(tok(TT::EQEQUAL), bitwise_or)
        .map(|e| (CompareOperator::Eq, e))
        .parse(input)
}

// noteq_bitwise_or: '!=' bitwise_or
fn noteq_bitwise_or(input: ParserInput) -> ParseResult<(CompareOperator, Expression)> {
    right(tok(TT::NOTEQUAL), bitwise_or)
        .map(|e| (CompareOperator::NotEq, e))
        .parse(input)
}

// lte_bitwise_or: '<=' bitwise_or
fn lte_bitwise_or(input: ParserInput) -> ParseResult<(CompareOperator, Expression)> {
    right(tok(TT::LESSEQUAL), bitwise_or)
        .map(|e| (CompareOperator::LtE, e))
        .parse(input)
}

// lt_bitwise_or: '<' bitwise_or
fn lt_bitwise_or(input: ParserInput) -> ParseResult<(CompareOperator, Expression)> {
    right(tok(TT::LESS), bitwise_or)
        .map(|e| (CompareOperator::Lt, e))
        .parse(input)
}

// gte_bitwise_or: '>=' bitwise_or
fn gte_bitwise_or(input: ParserInput) -> ParseResult<(CompareOperator, Expression)> {
    right(tok(TT::GREATEREQUAL), bitwise_or)
        .map(|e| (CompareOperator::GtE, e))
        .parse(input)
}

// gt_bitwise_or: '>' bitwise_or
fn gt_bitwise_or(input: ParserInput) -> ParseResult<(CompareOperator, Expression)> {
    right(tok(TT::GREATER), bitwise_or)
        .map(|e| (CompareOperator::Gt, e))
        .parse(input)
}

// notin_bitwise_or: 'not' 'in' bitwise_or
fn notin_bitwise_or(input: ParserInput) -> ParseResult<(CompareOperator, Expression)> {
    right(
        pair(token(TT::KEYWORD, "not"), token(TT::KEYWORD, "in")),
        bitwise_or,
    )
    .map(|e| (CompareOperator::NotIn, e))
    .parse(input)
}

// in_bitwise_or: 'in' bitwise_or
fn in_bitwise_or(input: ParserInput) -> ParseResult<(CompareOperator, Expression)> {
    right(token(TT::KEYWORD, "in"), bitwise_or)
        .map(|e| (CompareOperator::In, e))
        .parse(input)
}

// isnot_bitwise_or: 'is' 'not' bitwise_or
fn isnot_bitwise_or(input: ParserInput) -> ParseResult<(CompareOperator, Expression)> {
    right(
        pair(token(TT::KEYWORD, "is"), token(TT::KEYWORD, "not")),
        bitwise_or,
    )
    .map(|e| (CompareOperator::IsNot, e))
    .parse(input)
}

// is_bitwise_or: 'is' bitwise_or
fn is_bitwise_or(input: ParserInput) -> ParseResult<(CompareOperator, Expression)> {
    right(token(TT::KEYWORD, "is"), bitwise_or)
        .map(|e| (CompareOperator::Is, e))
        .parse(input)
}

fn fold_binary(first: Expression, rest: Vec<(BinaryOperator, Expression)>) -> Expression {
    rest.into_iter().fold(first, |left, (op, right)| {
        let span = left.span().till(&right);
        Expression::BinaryOperation(op, Box::new((left, right)), span)
    })
}

// bitwise_or: bitwise_xor ('|' bitwise_xor)*
fn bitwise_or(input: ParserInput) -> ParseResult<Expression> {
    pair(
        bitwise_xor,
        zero_or_more(pair(tok(TT::VBAR).map(BinaryOperator::from), bitwise_xor)),
    )
    .map(|(first, rest)| fold_binary(first, rest))
    .parse(input)
}

// bitwise_xor: bitwise_and ('^' bitwise_and)*
fn bitwise_xor(input: ParserInput) -> ParseResult<Expression> {
    pair(
        bitwise_and,
        zero_or_more(pair(
            tok(TT::CIRCUMFLEX).map(BinaryOperator::from),
            bitwise_and,
        )),
    )
    .map(|(first, rest)| fold_binary(first, rest))
    .parse(input)
}

// bitwise_and: shift_expr ('&' shift_expr)*
fn bitwise_and(input: ParserInput) -> ParseResult<Expression> {
    pair(
        shift_expr,
        zero_or_more(pair(tok(TT::AMPER).map(BinaryOperator::from), shift_expr)),
    )
    .map(|(first, rest)| fold_binary(first, rest))
    .parse(input)
}

// shift_expr: sum (('<<' | '>>') sum)*
fn shift_expr(input: ParserInput) -> ParseResult<Expression> {
    pair(
        sum,
        zero_or_more(pair(
            tok(TT::LEFTSHIFT)
                .or(tok(TT::RIGHTSHIFT))
                .map(BinaryOperator::from),
            sum,
        )),
    )
    .map(|(first, rest)| fold_binary(first, rest))
    .parse(input)
}

// sum: term (('+' | '-') term)*
fn sum(input: ParserInput) -> ParseResult<Expression> {
    pair(
        term,
        zero_or_more(pair(
            tok(TT::PLUS).or(tok(TT::MINUS)).map(BinaryOperator::from),
            term,
        )),
    )
    .map(|(first, rest)| fold_binary(first, rest))
    .parse(input)
}

// term: factor (('*' | '/' | '//' | '%') factor)*
fn term(input: ParserInput) -> ParseResult<Expression> {
    pair(
        factor,
        zero_or_more(pair(
            tok(TT::STAR)
                .or(tok(TT::SLASH))
                .or(tok(TT::DOUBLESLASH))
                .or(tok(TT::PERCENT))
                .map(BinaryOperator::from),
            factor,
        )),
    )
    .map(|(first, rest)| fold_binary(first, rest))
    .parse(input)
}

// factor:
//     | '+' factor
//     | '-' factor
//     | '~' factor
//     | power
fn factor(input: ParserInput) -> ParseResult<Expression> {
    power
        .or(
            pair(tok(TT::PLUS).or(tok(TT::MINUS)).or(tok(TT::TILDE)), factor).map(
                |(token, operand)| {
                    let span = token.span.till(&operand);
                    Expression::UnaryOperation(token.into(), Box::new(operand), span)
                },
            ),
        )
        .parse(input)
}

// power:
//     | primary '**' factor
//     | primary
fn power(input: ParserInput) -> ParseResult<Expression> {
    pair(primary, right(tok(TT::DOUBLESTAR), factor))
        .map(|(base, exponent)| {
            let span = base.span().till(&exponent);
            Expression::BinaryOperation(BinaryOperator::Pow, Box::new((base, exponent)), span)
        })
        .or(primary)
        .parse(input)
}

// primary:
//     | NAME '(' [arguments] ')'
//     | atom
fn primary(input: ParserInput) -> ParseResult<Expression> {
    call.or(atom).parse(input)
}

// call: NAME '(' [arguments] ')'
fn call(input: ParserInput) -> ParseResult<Expression> {
    pair(
        name,
        pair(tok(TT::LPAR), pair(maybe(arguments), tok(TT::RPAR))),
    )
    .map(|(callee, (_, (args, rpar)))| {
        let span = callee.span.till(&rpar);
        Expression::Call(callee, args.unwrap_or_else(Arguments::empty), span)
    })
    .parse(input)
}

fn name(input: ParserInput) -> ParseResult<Name> {
    tok(TT::NAME).map(Name::from).parse(input)
}

// atom:
//     | NAME
//     | 'True'
//     | 'False'
//     | 'None'
//     | STRING
//     | NUMBER
//     | group
fn atom(input: ParserInput) -> ParseResult<Expression> {
    name.map(Expression::Name)
        .or(token(TT::KEYWORD, "True").map(|t| Expression::Literal(Value::Bool(true), t.span)))
        .or(token(TT::KEYWORD, "False").map(|t| Expression::Literal(Value::Bool(false), t.span)))
        .or(token(TT::KEYWORD, "None").map(|t| Expression::Literal(Value::None, t.span)))
        .or(string)
        .or(number)
        .or(group)
        .parse(input)
}

fn string(input: ParserInput) -> ParseResult<Expression> {
    tok(TT::STRING)
        .map(|token| {
            let span = token.span;
            Expression::Literal(Value::Str(token.lexeme), span)
        })
        .parse(input)
}

// NUMBER conversion can fail on an out-of-range integer literal; the
// failure keeps the token's position instead of surfacing as bare
// "invalid syntax".
fn number(input: ParserInput) -> ParseResult<Expression> {
    match tok(TT::NUMBER).parse(input) {
        ParseResult::Ok((token, rest)) => match literal_value(&token.lexeme) {
            Some(value) => ParseResult::Ok((Expression::Literal(value, token.span), rest)),
            None => {
                rest.report(Error::syntax(
                    format!("integer literal too large: {}", token.lexeme),
                    token.span.start,
                ));
                ParseResult::Err
            }
        },
        ParseResult::Err => ParseResult::Err,
    }
}

// group: '(' expression ')'
fn group(input: ParserInput) -> ParseResult<Expression> {
    right(tok(TT::LPAR), left(expression, tok(TT::RPAR))).parse(input)
}

enum Argument {
    Positional(Expression),
    Keyword(Name, Expression),
}

// argument:
//     | NAME '=' expression
//     | '*' expression
//     | expression
fn argument(input: ParserInput) -> ParseResult<Argument> {
    pair(left(name, tok(TT::EQUAL)), expression)
        .map(|(keyword, value)| Argument::Keyword(keyword, value))
        .or(pair(tok(TT::STAR), expression).map(|(star, operand)| {
            let span = star.span.till(&operand);
            Argument::Positional(Expression::Starred(Box::new(operand), span))
        }))
        .or(expression.map(Argument::Positional))
        .parse(input)
}

// arguments: ','.argument+ [',']
fn arguments(input: ParserInput) -> ParseResult<Arguments> {
    match left(sep_by(argument, TT::COMMA), maybe(tok(TT::COMMA))).parse(input) {
        ParseResult::Ok((parsed, rest)) => {
            let mut arguments = Arguments::empty();
            for argument in parsed {
                match argument {
                    Argument::Positional(value) => {
                        if !arguments.keyword.is_empty() {
                            rest.report(Error::syntax(
                                "positional argument follows keyword argument",
                                value.span().start,
                            ));
                            return ParseResult::Err;
                        }
                        arguments.positional.push(value);
                    }
                    Argument::Keyword(keyword, value) => arguments.keyword.push((keyword, value)),
                }
            }
            ParseResult::Ok((arguments, rest))
        }
        ParseResult::Err => ParseResult::Err,
    }
}
