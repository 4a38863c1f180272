//! WIP-limit formula language.
//!
//! Formulas are tiny arithmetic expressions evaluated against the analysis of
//! a repository. The grammar is deliberately closed:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := ('+' | '-') unary | atom
//! atom   := NUMBER | 'team_size' | '(' expr ')'
//! NUMBER := DIGIT+ ('.' DIGIT+)?
//! ```
//!
//! `team_size` is the only identifier and is bound to the contributor count.
//! Anything outside the grammar is rejected with a [`FormulaError`]; nothing
//! is ever executed.

use thiserror::Error;

/// The single variable a formula may reference.
pub const TEAM_SIZE_VARIABLE: &str = "team_size";

/// Nesting depth beyond which a formula is rejected.
const MAX_DEPTH: usize = 32;

/// Errors produced while parsing or evaluating a formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,

    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedCharacter { position: usize, found: char },

    #[error("unknown identifier '{name}' at position {position}")]
    UnknownIdentifier { position: usize, name: String },

    #[error("malformed number '{text}' at position {position}")]
    MalformedNumber { position: usize, text: String },

    #[error("unexpected {found} at position {position}")]
    UnexpectedToken { position: usize, found: String },

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("formula nests deeper than {MAX_DEPTH} levels")]
    TooDeep,

    #[error("formula evaluated to a non-finite value")]
    NonFinite,
}

// ---------------------------------------------------------------------------
// Lexing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    TeamSize,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::TeamSize => format!("'{TEAM_SIZE_VARIABLE}'"),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, FormulaError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let token = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'0'..=b'9' | b'.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let text = &source[start..i];
                let well_formed = !text.starts_with('.')
                    && !text.ends_with('.')
                    && text.matches('.').count() <= 1;
                let value = text
                    .parse::<f64>()
                    .ok()
                    .filter(|_| well_formed)
                    .ok_or_else(|| FormulaError::MalformedNumber {
                        position: start,
                        text: text.to_string(),
                    })?;
                tokens.push((start, Token::Number(value)));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let name = &source[start..i];
                if name != TEAM_SIZE_VARIABLE {
                    return Err(FormulaError::UnknownIdentifier {
                        position: start,
                        name: name.to_string(),
                    });
                }
                tokens.push((start, Token::TeamSize));
                continue;
            }
            _ => {
                // Report the full (possibly multi-byte) character.
                let found = source[i..].chars().next().unwrap_or('\u{FFFD}');
                return Err(FormulaError::UnexpectedCharacter { position: i, found });
            }
        };
        tokens.push((i, token));
        i += 1;
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    TeamSize,
    Negate(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.cursor).map(|(_, t)| *t)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let item = self.tokens.get(self.cursor).copied();
        if item.is_some() {
            self.cursor += 1;
        }
        item
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep);
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        while let Some(op) = self.peek().and_then(|t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Subtract),
            _ => None,
        }) {
            self.cursor += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek().and_then(|t| match t {
            Token::Star => Some(BinaryOp::Multiply),
            Token::Slash => Some(BinaryOp::Divide),
            _ => None,
        }) {
            self.cursor += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.cursor += 1;
                self.descend()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(Expr::Negate(Box::new(inner)))
            }
            Some(Token::Plus) => {
                self.cursor += 1;
                self.descend()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(inner)
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<Expr, FormulaError> {
        match self.next() {
            Some((_, Token::Number(n))) => Ok(Expr::Number(n)),
            Some((_, Token::TeamSize)) => Ok(Expr::TeamSize),
            Some((_, Token::LParen)) => {
                self.descend()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.next() {
                    Some((_, Token::RParen)) => Ok(inner),
                    Some((position, token)) => Err(FormulaError::UnexpectedToken {
                        position,
                        found: token.describe(),
                    }),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some((position, token)) => Err(FormulaError::UnexpectedToken {
                position,
                found: token.describe(),
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// A parsed, validated WIP-limit formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    root: Expr,
}

impl Formula {
    /// Parses `source`, rejecting anything outside the formula grammar.
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }

        let mut parser = Parser {
            tokens,
            cursor: 0,
            depth: 0,
        };
        let root = parser.expr()?;
        if let Some((position, token)) = parser.next() {
            return Err(FormulaError::UnexpectedToken {
                position,
                found: token.describe(),
            });
        }

        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// The formula text as written in the template.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the formula with `team_size` bound to `team_size`.
    ///
    /// Fails with [`FormulaError::NonFinite`] when the result is infinite or
    /// NaN (e.g. division by zero).
    pub fn evaluate(&self, team_size: f64) -> Result<f64, FormulaError> {
        let value = eval(&self.root, team_size);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite)
        }
    }
}

fn eval(expr: &Expr, team_size: f64) -> f64 {
    match expr {
        Expr::Number(n) => *n,
        Expr::TeamSize => team_size,
        Expr::Negate(inner) => -eval(inner, team_size),
        Expr::Binary(op, lhs, rhs) => {
            let (l, r) = (eval(lhs, team_size), eval(rhs, team_size));
            match op {
                BinaryOp::Add => l + r,
                BinaryOp::Subtract => l - r,
                BinaryOp::Multiply => l * r,
                BinaryOp::Divide => l / r,
            }
        }
    }
}

/// Parses and evaluates `source` in one step.
pub fn evaluate(source: &str, team_size: f64) -> Result<f64, FormulaError> {
    Formula::parse(source)?.evaluate(team_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_with_precedence_and_parentheses() {
        assert_eq!(evaluate("2 + 3 * 4", 0.0).unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4", 0.0).unwrap(), 20.0);
        assert_eq!(evaluate("10 - 4 - 3", 0.0).unwrap(), 3.0);
        assert_eq!(evaluate("12 / 3 / 2", 0.0).unwrap(), 2.0);
    }

    #[test]
    fn binds_team_size_everywhere_it_appears() {
        assert_eq!(evaluate("team_size * 2", 2.0).unwrap(), 4.0);
        assert_eq!(evaluate("team_size * team_size", 3.0).unwrap(), 9.0);
        assert_eq!(evaluate("(team_size + 1) / 2", 5.0).unwrap(), 3.0);
    }

    #[test]
    fn supports_unary_signs_and_decimals() {
        assert_eq!(evaluate("-2 + 5", 0.0).unwrap(), 3.0);
        assert_eq!(evaluate("+team_size", 4.0).unwrap(), 4.0);
        assert_eq!(evaluate("team_size * 1.5", 4.0).unwrap(), 6.0);
    }

    #[test]
    fn rejects_code_and_unknown_identifiers() {
        assert!(matches!(
            evaluate("process.exit(1)", 1.0),
            Err(FormulaError::UnknownIdentifier { .. })
        ));
        assert!(matches!(
            evaluate("team_size; 1", 1.0),
            Err(FormulaError::UnexpectedCharacter { found: ';', .. })
        ));
        assert!(matches!(
            evaluate("2 ** 3", 1.0),
            Err(FormulaError::UnexpectedToken { position: 3, .. })
        ));
        assert!(matches!(
            evaluate("\"10\"", 1.0),
            Err(FormulaError::UnexpectedCharacter { position: 0, .. })
        ));
    }

    #[test]
    fn rejects_incomplete_and_malformed_input() {
        assert_eq!(evaluate("   ", 1.0), Err(FormulaError::Empty));
        assert_eq!(evaluate("(1 + 2", 1.0), Err(FormulaError::UnexpectedEnd));
        assert_eq!(evaluate("1 +", 1.0), Err(FormulaError::UnexpectedEnd));
        assert!(matches!(
            evaluate("1.2.3", 1.0),
            Err(FormulaError::MalformedNumber { .. })
        ));
        assert!(matches!(
            evaluate("2 3", 1.0),
            Err(FormulaError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(evaluate("team_size / 0", 3.0), Err(FormulaError::NonFinite));
        assert_eq!(evaluate("0 / 0", 3.0), Err(FormulaError::NonFinite));
    }

    #[test]
    fn rejects_pathological_nesting() {
        let nested = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate(&nested, 0.0), Err(FormulaError::TooDeep));
        let negated = format!("{}1", "-".repeat(100));
        assert_eq!(evaluate(&negated, 0.0), Err(FormulaError::TooDeep));
    }
}
