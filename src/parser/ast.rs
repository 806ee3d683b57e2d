use super::locations::Span;
use super::tokenizer::{Token, TokenType as TT, BINNUMBER, FLOATNUMBER, HEXNUMBER, OCTNUMBER};
use crate::value::Value;

#[derive(Clone)]
pub(crate) struct Name {
    pub(crate) name: String,
    pub(crate) span: Span,
}

impl std::fmt::Debug for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Name(\"{}\")", self.name)
    }
}

impl From<Token> for Name {
    fn from(value: Token) -> Self {
        match value.typ {
            TT::NAME => Self {
                name: value.lexeme,
                span: value.span,
            },
            _ => unreachable!(),
        }
    }
}

/// The closed set of node kinds the sandbox accepts. Every node owns its
/// children and carries the span of its originating tokens.
#[derive(Debug, Clone)]
pub(crate) enum Expression {
    Literal(Value, Span),
    Name(Name),
    UnaryOperation(UnaryOperator, Box<Expression>, Span),
    BinaryOperation(BinaryOperator, Box<(Expression, Expression)>, Span),
    BooleanOperation(BooleanOperator, Vec<Expression>, Span),
    Comparison(Box<Expression>, Vec<(CompareOperator, Expression)>, Span),
    Ternary(Box<Expression>, Box<Expression>, Box<Expression>, Span),
    Call(Name, Arguments, Span),
    /// Star-argument marker. Only produced inside call argument lists and
    /// rejected at evaluation time, before the callee is invoked.
    Starred(Box<Expression>, Span),
}

#[derive(Debug, Clone)]
pub(crate) struct Arguments {
    pub(crate) positional: Vec<Expression>,
    pub(crate) keyword: Vec<(Name, Expression)>,
}

impl Arguments {
    pub(super) fn empty() -> Self {
        Self {
            positional: vec![],
            keyword: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BooleanOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOperator {
    Add,
    Sub,
    Mult,
    Div,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
    FloorDiv,
}

impl BinaryOperator {
    pub(crate) fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::FloorDiv => "//",
        }
    }
}

impl From<Token> for BinaryOperator {
    fn from(value: Token) -> Self {
        match value.typ {
            TT::PLUS => Self::Add,
            TT::MINUS => Self::Sub,
            TT::STAR => Self::Mult,
            TT::SLASH => Self::Div,
            TT::PERCENT => Self::Mod,
            TT::DOUBLESTAR => Self::Pow,
            TT::LEFTSHIFT => Self::LShift,
            TT::RIGHTSHIFT => Self::RShift,
            TT::VBAR => Self::BitOr,
            TT::CIRCUMFLEX => Self::BitXor,
            TT::AMPER => Self::BitAnd,
            TT::DOUBLESLASH => Self::FloorDiv,
            _ => unreachable!(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOperator {
    Invert,
    Not,
    UAdd,
    USub,
}

impl UnaryOperator {
    pub(crate) fn symbol(&self) -> &'static str {
        match self {
            Self::Invert => "~",
            Self::Not => "not",
            Self::UAdd => "+",
            Self::USub => "-",
        }
    }
}

impl From<Token> for UnaryOperator {
    fn from(value: Token) -> Self {
        match value.typ {
            TT::PLUS => Self::UAdd,
            TT::MINUS => Self::USub,
            TT::TILDE => Self::Invert,
            _ => unreachable!(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CompareOperator {
    pub(crate) fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

/// Converts a NUMBER lexeme into its literal value. `None` only for integer
/// literals that do not fit the value domain.
pub(super) fn literal_value(lexeme: &str) -> Option<Value> {
    let digits = lexeme.replace('_', "");
    if HEXNUMBER.is_match(lexeme) {
        i64::from_str_radix(&digits[2..], 16).ok().map(Value::Int)
    } else if BINNUMBER.is_match(lexeme) {
        i64::from_str_radix(&digits[2..], 2).ok().map(Value::Int)
    } else if OCTNUMBER.is_match(lexeme) {
        i64::from_str_radix(&digits[2..], 8).ok().map(Value::Int)
    } else if FLOATNUMBER.is_match(lexeme) {
        digits.parse::<f64>().ok().map(Value::Float)
    } else {
        digits.parse::<i64>().ok().map(Value::Int)
    }
}
