use const_format::concatcp;
use once_cell::sync::Lazy;
use regex::Regex;

use super::locations::{Location, Span};
use crate::error::Error;

#[derive(Clone, Debug)]
pub(crate) struct Token {
    pub(crate) typ: TokenType,
    pub(crate) lexeme: String,
    pub(crate) span: Span,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}('{}')", self.typ, self.lexeme)
    }
}

#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum TokenType {
    ENDMARKER,
    NAME,
    NUMBER,
    STRING,
    NEWLINE,
    KEYWORD,
    LPAR,
    RPAR,
    LSQB,
    RSQB,
    LBRACE,
    RBRACE,
    COLON,
    COMMA,
    SEMI,
    DOT,
    EQUAL,
    AT,
    RARROW,
    ELLIPSIS,
    COLONEQUAL,
    EXCLAMATION,
    PLUS,
    MINUS,
    STAR,
    SLASH,
    DOUBLESLASH,
    PERCENT,
    DOUBLESTAR,
    VBAR,
    AMPER,
    CIRCUMFLEX,
    TILDE,
    LEFTSHIFT,
    RIGHTSHIFT,
    LESS,
    GREATER,
    EQEQUAL,
    NOTEQUAL,
    LESSEQUAL,
    GREATEREQUAL,
    PLUSEQUAL,
    MINEQUAL,
    STAREQUAL,
    SLASHEQUAL,
    DOUBLESLASHEQUAL,
    PERCENTEQUAL,
    AMPEREQUAL,
    VBAREQUAL,
    CIRCUMFLEXEQUAL,
    LEFTSHIFTEQUAL,
    RIGHTSHIFTEQUAL,
    DOUBLESTAREQUAL,
    ATEQUAL,
}

// Longest lexemes first, so that e.g. "<<=" never tokenizes as "<" "<" "=".
// The table deliberately covers operators the expression grammar itself never
// accepts (assignment and friends): tokenizing them lets the parser name the
// disallowed construct instead of failing on a stray character.
const SIMPLE_TOKENS: [(&str, TokenType); 48] = [
    ("<<=", TokenType::LEFTSHIFTEQUAL),
    (">>=", TokenType::RIGHTSHIFTEQUAL),
    ("**=", TokenType::DOUBLESTAREQUAL),
    ("//=", TokenType::DOUBLESLASHEQUAL),
    ("...", TokenType::ELLIPSIS),
    ("==", TokenType::EQEQUAL),
    ("!=", TokenType::NOTEQUAL),
    ("<=", TokenType::LESSEQUAL),
    (">=", TokenType::GREATEREQUAL),
    ("<<", TokenType::LEFTSHIFT),
    (">>", TokenType::RIGHTSHIFT),
    ("**", TokenType::DOUBLESTAR),
    ("//", TokenType::DOUBLESLASH),
    ("+=", TokenType::PLUSEQUAL),
    ("-=", TokenType::MINEQUAL),
    ("*=", TokenType::STAREQUAL),
    ("/=", TokenType::SLASHEQUAL),
    ("%=", TokenType::PERCENTEQUAL),
    ("&=", TokenType::AMPEREQUAL),
    ("|=", TokenType::VBAREQUAL),
    ("^=", TokenType::CIRCUMFLEXEQUAL),
    ("@=", TokenType::ATEQUAL),
    ("->", TokenType::RARROW),
    (":=", TokenType::COLONEQUAL),
    ("(", TokenType::LPAR),
    (")", TokenType::RPAR),
    ("[", TokenType::LSQB),
    ("]", TokenType::RSQB),
    ("{", TokenType::LBRACE),
    ("}", TokenType::RBRACE),
    (":", TokenType::COLON),
    (",", TokenType::COMMA),
    (";", TokenType::SEMI),
    ("+", TokenType::PLUS),
    ("-", TokenType::MINUS),
    ("*", TokenType::STAR),
    ("/", TokenType::SLASH),
    ("|", TokenType::VBAR),
    ("&", TokenType::AMPER),
    ("<", TokenType::LESS),
    (">", TokenType::GREATER),
    ("=", TokenType::EQUAL),
    (".", TokenType::DOT),
    ("%", TokenType::PERCENT),
    ("~", TokenType::TILDE),
    ("^", TokenType::CIRCUMFLEX),
    ("@", TokenType::AT),
    ("!", TokenType::EXCLAMATION),
];

macro_rules! alternative {
    ($t:expr) => {{
        $t
    }};
    ($t:expr, $($ts:expr),+) => {{
        concatcp!($t, "|", alternative!($($ts),+))
    }}
}

macro_rules! group {
    ($($ts:expr),+) => {{
        concatcp!(r"(", alternative!($($ts),+), ")")
    }}
}

macro_rules! maybe {
    ($($ts:expr),+) => {
        concatcp!(group!($($ts),+), r"?")
    }
}

const S_WHITESPACE: &str = r"^[ \f\t]+";
const S_COMMENT: &str = r"^#[^\r\n]*";
const S_NAME: &str = r"^\w+";
const S_HEXNUMBER: &str = r"0[xX](?:_?[0-9a-fA-F])+";
const S_BINNUMBER: &str = r"0[bB](?:_?[01])+";
const S_OCTNUMBER: &str = r"0[oO](?:_?[0-7])+";
const S_DECNUMBER: &str = r"(?:0(?:_?0)*|[1-9](?:_?[0-9])*)";
const S_WHOLE_HEXNUMBER: &str = concatcp!("^", S_HEXNUMBER, "$");
const S_WHOLE_BINNUMBER: &str = concatcp!("^", S_BINNUMBER, "$");
const S_WHOLE_OCTNUMBER: &str = concatcp!("^", S_OCTNUMBER, "$");
const S_INTNUMBER: &str = group!(S_HEXNUMBER, S_BINNUMBER, S_OCTNUMBER, S_DECNUMBER);
const S_EXPONENT: &str = r"[eE][-+]?[0-9](?:_?[0-9])*";
const S_POINTFLOAT: &str = concatcp!(
    group!(
        r"[0-9](?:_?[0-9])*\.(?:[0-9](?:_?[0-9])*)?",
        r"\.[0-9](?:_?[0-9])*"
    ),
    maybe!(S_EXPONENT)
);
const S_EXPFLOAT: &str = concatcp!(r"[0-9](?:_?[0-9])*", S_EXPONENT);
const S_FLOATNUMBER: &str = group!(S_POINTFLOAT, S_EXPFLOAT);
const S_WHOLE_FLOATNUMBER: &str = concatcp!("^", S_FLOATNUMBER, "$");
const S_NUMBER: &str = concatcp!(r"^", group!(S_FLOATNUMBER, S_INTNUMBER));
// The complete Python keyword set, not just the handful the expression
// grammar consumes: a `while` or `lambda` must surface as a KEYWORD token
// so the parser can reject the construct by name.
const S_KEYWORDS: &str = r"^(\bFalse\b|\bNone\b|\bTrue\b|\band\b|\bas\b|\bassert\b|\basync\b|\bawait\b|\bbreak\b|\bclass\b|\bcontinue\b|\bdef\b|\bdel\b|\belif\b|\belse\b|\bexcept\b|\bfinally\b|\bfor\b|\bfrom\b|\bglobal\b|\bif\b|\bimport\b|\bin\b|\bis\b|\blambda\b|\bnonlocal\b|\bnot\b|\bor\b|\bpass\b|\braise\b|\breturn\b|\btry\b|\bwhile\b|\bwith\b|\byield\b)";

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_WHITESPACE).expect("Error compiling regex."));
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(S_COMMENT).expect("Error compiling regex."));
static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(S_NAME).expect("Error compiling regex."));
pub(super) static HEXNUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_WHOLE_HEXNUMBER).expect("Error compiling regex."));
pub(super) static BINNUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_WHOLE_BINNUMBER).expect("Error compiling regex."));
pub(super) static OCTNUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_WHOLE_OCTNUMBER).expect("Error compiling regex."));
pub(super) static FLOATNUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_WHOLE_FLOATNUMBER).expect("Error compiling regex."));
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(S_NUMBER).expect("Error compiling regex."));
static KEYWORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(S_KEYWORDS).expect("Error compiling regex."));

pub(crate) struct Tokenizer {
    tokens: Vec<Token>,
    paren_lvl: isize,
}

impl Tokenizer {
    pub(crate) fn new() -> Self {
        Self {
            tokens: vec![],
            paren_lvl: 0,
        }
    }

    fn tokenize_line(&mut self, line: &str, lineno: usize) -> Result<(), Error> {
        let mut col = 0;
        let added_before = self.tokens.len();

        while col < line.len() {
            let rest = &line[col..];
            if let Some(m) = WHITESPACE.find(rest) {
                col += m.end();
                continue;
            }
            if COMMENT.is_match(rest) {
                break;
            }
            if let Some(m) = KEYWORDS.find(rest) {
                self.push(TokenType::KEYWORD, m.as_str(), lineno, col);
                col += m.end();
                continue;
            }
            if let Some(m) = NUMBER.find(rest) {
                self.push(TokenType::NUMBER, m.as_str(), lineno, col);
                col += m.end();
                continue;
            }
            if let Some(m) = NAME.find(rest) {
                self.push(TokenType::NAME, m.as_str(), lineno, col);
                col += m.end();
                continue;
            }
            if rest.starts_with('\'') || rest.starts_with('"') {
                let (contents, consumed) = scan_string(rest, lineno, col)?;
                self.tokens.push(Token {
                    typ: TokenType::STRING,
                    lexeme: contents,
                    span: Span::new(lineno, col, col + consumed),
                });
                col += consumed;
                continue;
            }
            if let Some((lexeme, typ)) = SIMPLE_TOKENS
                .iter()
                .copied()
                .find(|(lexeme, _)| rest.starts_with(lexeme))
            {
                self.push(typ, lexeme, lineno, col);
                match typ {
                    TokenType::LPAR | TokenType::LSQB | TokenType::LBRACE => self.paren_lvl += 1,
                    TokenType::RPAR | TokenType::RSQB | TokenType::RBRACE => self.paren_lvl -= 1,
                    _ => {}
                }
                col += lexeme.len();
                continue;
            }
            let character = rest.chars().next().unwrap_or_default();
            return Err(Error::syntax(
                format!("invalid character '{character}'"),
                Location::new(lineno, col),
            ));
        }

        // A line break only separates expressions outside of brackets.
        if self.tokens.len() > added_before && self.paren_lvl <= 0 {
            self.tokens.push(Token {
                typ: TokenType::NEWLINE,
                lexeme: String::new(),
                span: Span::new(lineno, line.len(), line.len()),
            });
        }
        Ok(())
    }

    fn push(&mut self, typ: TokenType, lexeme: &str, lineno: usize, col: usize) {
        self.tokens.push(Token {
            typ,
            lexeme: lexeme.to_string(),
            span: Span::new(lineno, col, col + lexeme.len()),
        });
    }

    fn finalize(mut self) -> Vec<Token> {
        let end = match self.tokens.last() {
            Some(token) => token.span.end,
            None => Location::start_of_input(),
        };
        self.tokens.push(Token {
            typ: TokenType::ENDMARKER,
            lexeme: String::new(),
            span: Span {
                start: end,
                end,
            },
        });
        self.tokens
    }
}

/// Scans a single-line string literal starting at the opening quote of
/// `rest`; returns its unescaped contents and the number of bytes consumed,
/// quotes included.
fn scan_string(rest: &str, lineno: usize, start_col: usize) -> Result<(String, usize), Error> {
    let mut chars = rest.char_indices();
    let quote = chars.next().map(|(_, c)| c).unwrap_or_default();
    let mut contents = String::new();
    while let Some((offset, chr)) = chars.next() {
        if chr == quote {
            return Ok((contents, offset + chr.len_utf8()));
        }
        if chr == '\\' {
            match chars.next() {
                Some((_, escaped)) => {
                    let resolved = match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' | '\'' | '"' => escaped,
                        other => {
                            // unrecognized escapes keep their backslash
                            contents.push('\\');
                            other
                        }
                    };
                    contents.push(resolved);
                }
                None => break,
            }
            continue;
        }
        contents.push(chr);
    }
    Err(Error::syntax(
        "EOL while scanning string literal",
        Location::new(lineno, start_col),
    ))
}

pub(crate) fn tokenize_string(input: &str) -> Result<Vec<Token>, Error> {
    let mut tokenizer = Tokenizer::new();
    for (number, line) in input.lines().enumerate() {
        tokenizer.tokenize_line(line, number + 1)?;
    }
    Ok(tokenizer.finalize())
}
