// ast.rs — Lexer and recursive-descent parser for the condition grammar.
//
// Grammar (closed — no calls, no loops, no assignment):
//
//   expr       := or
//   or         := and ( "||" and )*
//   and        := unary ( "&&" unary )*
//   unary      := "!" unary | comparison
//   comparison := primary ( cmp-op primary | "in" "[" literals "]" )?
//   primary    := "(" expr ")" | literal | variable-path
//   cmp-op     := "==" | "!=" | "<" | "<=" | ">" | ">="
//   literal    := string | number | "true" | "false" | "null"
//
// Variable paths are dotted identifiers (`payload.amount`). Membership
// haystacks are literal arrays only — a variable can never appear on the
// right of `in`, which keeps the analysis in the conflict detector simple.

use serde::{Deserialize, Serialize};

use crate::error::ExprError;
use crate::value::Value;

/// Maximum expression nesting depth. Conditions deeper than this are
/// rejected at parse time, bounding evaluation recursion.
pub const MAX_DEPTH: usize = 32;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// The source-text spelling, used in error messages.
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A parsed condition expression.
///
/// `PartialEq` is structural — the conflict detector compares rule
/// conditions for equivalence and conjunct containment with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A literal value.
    Literal(Value),
    /// A dotted variable path, e.g. `agent.id`.
    Var(String),
    /// Logical negation.
    Not(Box<Expr>),
    /// Short-circuit conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// A binary comparison.
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Membership test against a literal array: `payload.region in ["us", "eu"]`.
    In { needle: Box<Expr>, haystack: Vec<Value> },
}

impl Expr {
    /// Flatten a top-level `&&` chain into its conjuncts.
    ///
    /// `a && b && c` yields `[a, b, c]`; anything that is not a
    /// conjunction yields itself. Used by the conflict detector's
    /// strict-superset analysis.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::And(left, right) => {
                let mut parts = left.conjuncts();
                parts.extend(right.conjuncts());
                parts
            }
            other => vec![other],
        }
    }
}

/// Parse a condition string into an [`Expr`].
pub fn parse(input: &str) -> Result<Expr, ExprError> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or(0)?;
    if parser.pos < parser.tokens.len() {
        let (tok, offset) = &parser.tokens[parser.pos];
        return Err(ExprError::parse(
            *offset,
            format!("unexpected trailing input near '{}'", tok.describe()),
        ));
    }
    Ok(expr)
}

// ── Lexer ──

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    True,
    False,
    Null,
    In,
    AndAnd,
    OrOr,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => name.clone(),
            Token::Str(s) => format!("\"{}\"", s),
            Token::Num(n) => n.to_string(),
            Token::True => "true".into(),
            Token::False => "false".into(),
            Token::Null => "null".into(),
            Token::In => "in".into(),
            Token::AndAnd => "&&".into(),
            Token::OrOr => "||".into(),
            Token::Not => "!".into(),
            Token::Eq => "==".into(),
            Token::Ne => "!=".into(),
            Token::Lt => "<".into(),
            Token::Le => "<=".into(),
            Token::Gt => ">".into(),
            Token::Ge => ">=".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::LBracket => "[".into(),
            Token::RBracket => "]".into(),
            Token::Comma => ",".into(),
        }
    }
}

fn lex(input: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            '[' => {
                tokens.push((Token::LBracket, i));
                i += 1;
            }
            ']' => {
                tokens.push((Token::RBracket, i));
                i += 1;
            }
            ',' => {
                tokens.push((Token::Comma, i));
                i += 1;
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push((Token::AndAnd, i));
                    i += 2;
                } else {
                    return Err(ExprError::parse(i, "expected '&&'"));
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push((Token::OrOr, i));
                    i += 2;
                } else {
                    return Err(ExprError::parse(i, "expected '||'"));
                }
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((Token::Eq, i));
                    i += 2;
                } else {
                    return Err(ExprError::parse(i, "assignment is not allowed; use '=='"));
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((Token::Ne, i));
                    i += 2;
                } else {
                    tokens.push((Token::Not, i));
                    i += 1;
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((Token::Le, i));
                    i += 2;
                } else {
                    tokens.push((Token::Lt, i));
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((Token::Ge, i));
                    i += 2;
                } else {
                    tokens.push((Token::Gt, i));
                    i += 1;
                }
            }
            '"' | '\'' => {
                let (s, next) = lex_string(input, i, c)?;
                tokens.push((Token::Str(s), i));
                i = next;
            }
            '-' | '0'..='9' => {
                let (n, next) = lex_number(input, i)?;
                tokens.push((Token::Num(n), i));
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() {
                    let c = bytes[i] as char;
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let word = &input[start..i];
                let token = match word {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "in" => Token::In,
                    _ => Token::Ident(word.to_string()),
                };
                tokens.push((token, start));
            }
            other => {
                return Err(ExprError::parse(i, format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

fn lex_string(input: &str, start: usize, quote: char) -> Result<(String, usize), ExprError> {
    let mut out = String::new();
    let mut chars = input[start + 1..].char_indices();

    while let Some((offset, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, escaped)) => out.push(escaped),
                None => return Err(ExprError::parse(start, "unterminated string escape")),
            },
            c if c == quote => return Ok((out, start + 1 + offset + c.len_utf8())),
            c => out.push(c),
        }
    }

    Err(ExprError::parse(start, "unterminated string literal"))
}

fn lex_number(input: &str, start: usize) -> Result<(f64, usize), ExprError> {
    let bytes = input.as_bytes();
    let mut i = start;
    if bytes[i] == b'-' {
        i += 1;
    }
    let mut seen_dot = false;
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => i += 1,
            b'.' if !seen_dot && matches!(bytes.get(i + 1), Some(b'0'..=b'9')) => {
                seen_dot = true;
                i += 1;
            }
            _ => break,
        }
    }
    input[start..i]
        .parse::<f64>()
        .map(|n| (n, i))
        .map_err(|_| ExprError::parse(start, "malformed number literal"))
}

// ── Parser ──

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, o)| *o)
            .unwrap_or_else(|| self.tokens.last().map(|(_, o)| *o + 1).unwrap_or(0))
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ExprError> {
        let offset = self.offset();
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(ExprError::parse(
                offset,
                format!("expected {} but found '{}'", what, token.describe()),
            )),
            None => Err(ExprError::parse(offset, format!("expected {}", what))),
        }
    }

    fn check_depth(&self, depth: usize) -> Result<(), ExprError> {
        if depth >= MAX_DEPTH {
            Err(ExprError::TooDeep { max: MAX_DEPTH })
        } else {
            Ok(())
        }
    }

    fn parse_or(&mut self, depth: usize) -> Result<Expr, ExprError> {
        self.check_depth(depth)?;
        let mut left = self.parse_and(depth + 1)?;
        while self.peek() == Some(&Token::OrOr) {
            self.advance();
            let right = self.parse_and(depth + 1)?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self, depth: usize) -> Result<Expr, ExprError> {
        self.check_depth(depth)?;
        let mut left = self.parse_unary(depth + 1)?;
        while self.peek() == Some(&Token::AndAnd) {
            self.advance();
            let right = self.parse_unary(depth + 1)?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self, depth: usize) -> Result<Expr, ExprError> {
        self.check_depth(depth)?;
        if self.peek() == Some(&Token::Not) {
            self.advance();
            let operand = self.parse_unary(depth + 1)?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison(depth + 1)
    }

    fn parse_comparison(&mut self, depth: usize) -> Result<Expr, ExprError> {
        self.check_depth(depth)?;
        let left = self.parse_primary(depth + 1)?;

        let op = match self.peek() {
            Some(Token::Eq) => Some(CompareOp::Eq),
            Some(Token::Ne) => Some(CompareOp::Ne),
            Some(Token::Lt) => Some(CompareOp::Lt),
            Some(Token::Le) => Some(CompareOp::Le),
            Some(Token::Gt) => Some(CompareOp::Gt),
            Some(Token::Ge) => Some(CompareOp::Ge),
            Some(Token::In) => {
                self.advance();
                let haystack = self.parse_literal_array()?;
                return Ok(Expr::In {
                    needle: Box::new(left),
                    haystack,
                });
            }
            _ => None,
        };

        match op {
            Some(op) => {
                self.advance();
                let right = self.parse_primary(depth + 1)?;
                Ok(Expr::Compare {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            None => Ok(left),
        }
    }

    fn parse_primary(&mut self, depth: usize) -> Result<Expr, ExprError> {
        self.check_depth(depth)?;
        let offset = self.offset();
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or(depth + 1)?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(Value::Num(n))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Ident(path)) => Ok(Expr::Var(path)),
            Some(token) => Err(ExprError::parse(
                offset,
                format!("expected a value or variable, found '{}'", token.describe()),
            )),
            None => Err(ExprError::parse(offset, "unexpected end of condition")),
        }
    }

    fn parse_literal_array(&mut self) -> Result<Vec<Value>, ExprError> {
        self.expect(Token::LBracket, "'[' after 'in'")?;
        let mut items = Vec::new();

        if self.peek() == Some(&Token::RBracket) {
            self.advance();
            return Ok(items);
        }

        loop {
            let offset = self.offset();
            match self.advance() {
                Some(Token::Str(s)) => items.push(Value::Str(s)),
                Some(Token::Num(n)) => items.push(Value::Num(n)),
                Some(Token::True) => items.push(Value::Bool(true)),
                Some(Token::False) => items.push(Value::Bool(false)),
                Some(Token::Null) => items.push(Value::Null),
                Some(token) => {
                    return Err(ExprError::parse(
                        offset,
                        format!(
                            "membership arrays hold literals only, found '{}'",
                            token.describe()
                        ),
                    ))
                }
                None => return Err(ExprError::parse(offset, "unterminated membership array")),
            }
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => return Ok(items),
                _ => return Err(ExprError::parse(self.offset(), "expected ',' or ']'")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_comparison() {
        let expr = parse("payload.amount > 10000").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                op: CompareOp::Gt,
                left: Box::new(Expr::Var("payload.amount".into())),
                right: Box::new(Expr::Literal(Value::Num(10000.0))),
            }
        );
    }

    #[test]
    fn parse_boolean_combination() {
        let expr = parse(r#"task.action == "read" && agent.role == "guest""#).unwrap();
        // Two conjuncts, both comparisons.
        let parts = expr.conjuncts();
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn parse_negation_and_parens() {
        let expr = parse(r#"!(context.simulationMode || payload.dry_run)"#).unwrap();
        assert!(matches!(expr, Expr::Not(_)));
    }

    #[test]
    fn parse_membership() {
        let expr = parse(r#"payload.region in ["us", "eu"]"#).unwrap();
        match expr {
            Expr::In { needle, haystack } => {
                assert_eq!(*needle, Expr::Var("payload.region".into()));
                assert_eq!(haystack, vec![Value::Str("us".into()), Value::Str("eu".into())]);
            }
            other => panic!("expected In, got {:?}", other),
        }
    }

    #[test]
    fn parse_single_quoted_strings() {
        let expr = parse("agent.id == 'a1'").unwrap();
        match expr {
            Expr::Compare { right, .. } => assert_eq!(*right, Expr::Literal(Value::Str("a1".into()))),
            other => panic!("expected Compare, got {:?}", other),
        }
    }

    #[test]
    fn parse_negative_and_decimal_numbers() {
        assert!(parse("payload.delta >= -1.5").is_ok());
        assert!(parse("payload.score < 0.25").is_ok());
    }

    #[test]
    fn reject_assignment() {
        let err = parse("agent.id = 'a1'").unwrap_err();
        match err {
            ExprError::Parse { message, .. } => assert!(message.contains("assignment")),
            other => panic!("expected Parse, got {:?}", other),
        }
    }

    #[test]
    fn reject_function_calls() {
        // `(` after an identifier is a trailing-input error — there are no calls.
        assert!(parse("exec(payload.cmd)").is_err());
    }

    #[test]
    fn reject_unterminated_string() {
        assert!(matches!(
            parse(r#"agent.id == "a1"#),
            Err(ExprError::Parse { .. })
        ));
    }

    #[test]
    fn reject_variable_in_membership_array() {
        assert!(parse("payload.region in [agent.region]").is_err());
    }

    #[test]
    fn reject_empty_input() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
    }

    #[test]
    fn reject_excessive_nesting() {
        let mut s = String::new();
        for _ in 0..(MAX_DEPTH + 1) {
            s.push('(');
        }
        s.push_str("true");
        for _ in 0..(MAX_DEPTH + 1) {
            s.push(')');
        }
        assert!(matches!(parse(&s), Err(ExprError::TooDeep { .. })));
    }

    #[test]
    fn operator_precedence_and_binds_tighter_than_or() {
        // a || b && c parses as a || (b && c)
        let expr = parse("payload.a || payload.b && payload.c").unwrap();
        match expr {
            Expr::Or(left, right) => {
                assert_eq!(*left, Expr::Var("payload.a".into()));
                assert!(matches!(*right, Expr::And(_, _)));
            }
            other => panic!("expected Or at the top, got {:?}", other),
        }
    }

    #[test]
    fn conjuncts_flatten_nested_chains() {
        let expr = parse("payload.a && payload.b && payload.c").unwrap();
        let parts = expr.conjuncts();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], &Expr::Var("payload.a".into()));
        assert_eq!(parts[2], &Expr::Var("payload.c".into()));
    }

    #[test]
    fn structural_equality_ignores_whitespace() {
        let a = parse(r#"task.action=="read""#).unwrap();
        let b = parse(r#"task.action ==   "read""#).unwrap();
        assert_eq!(a, b);
    }
}
