//! Initializer and constraint expressions
//!
//! A small expression language evaluated against the field values of a record
//! under construction:
//!
//! ```text
//! expr    := or ('?' expr ':' expr)?
//! or      := and ('||' and)*
//! and     := cmp ('&&' cmp)*
//! cmp     := sum (('==' | '!=' | '<' | '<=' | '>' | '>=') sum)*
//! sum     := product (('+' | '-') product)*
//! product := unary (('*' | '/' | '%') unary)*
//! unary   := ('!' | '-') unary | primary
//! primary := literal | ident | ident '(' args ')' | '(' expr ')' | '[' args ']'
//! ```
//!
//! Literals are integers, floats, double-quoted strings, `true`, `false`
//! and `missing`.

use crate::{Error, Result};
use rowspec_types::Value;
use std::fmt;

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Operator spelling.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Parsed expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Literal(Value),
    /// Reference to a field of the record under construction
    Field(String),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Reference to the named field.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Whether this expression is exactly a reference to `name`.
    pub fn is_field_ref(&self, name: &str) -> bool {
        matches!(self, Expr::Field(n) if n == name)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::Field(name) => f.write_str(name),
            Expr::List(items) => {
                f.write_str("[")?;
                write_separated(f, items)?;
                f.write_str("]")
            }
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!{operand}"),
                UnaryOp::Neg => write!(f, "-{operand}"),
            },
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => write!(f, "({condition} ? {then_branch} : {else_branch})"),
            Expr::Call { function, args } => {
                write!(f, "{function}(")?;
                write_separated(f, args)?;
                f.write_str(")")
            }
        }
    }
}

fn write_separated(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Parse a complete expression.
///
/// # Errors
///
/// Returns [`Error::Parse`] on any lexical or syntax error.
pub fn parse_expr(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = ExprParser {
        input,
        tokens,
        pos: 0,
    };
    let expr = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(Error::parse(input, format!("unexpected {token} after expression")));
    }
    Ok(expr)
}

/// Whether `s` is a valid field identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !is_keyword(s)
}

fn is_keyword(s: &str) -> bool {
    matches!(s, "true" | "false" | "missing")
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Question,
    Colon,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "identifier '{s}'"),
            Token::Int(i) => write!(f, "integer {i}"),
            Token::Float(x) => write!(f, "float {x}"),
            Token::Str(s) => write!(f, "string {s:?}"),
            Token::Op(op) => write!(f, "'{op}'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Comma => f.write_str("','"),
            Token::Question => f.write_str("'?'"),
            Token::Colon => f.write_str("':'"),
        }
    }
}

const OPERATORS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "<", ">", "+", "-", "*", "/", "%", "!",
];

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            c if c.is_ascii_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '"' => {
                let (literal, next) = lex_string(input, i)?;
                tokens.push(Token::Str(literal));
                i = next;
            }
            c if c.is_ascii_digit() => {
                let (token, next) = lex_number(input, i)?;
                tokens.push(token);
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(Token::Ident(input[start..i].to_string()));
            }
            _ => {
                let rest = &input[i..];
                let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
                    let bad = rest.chars().next().unwrap_or(c);
                    return Err(Error::parse(input, format!("unexpected character '{bad}'")));
                };
                tokens.push(Token::Op(op));
                i += op.len();
            }
        }
    }

    Ok(tokens)
}

fn lex_string(input: &str, start: usize) -> Result<(String, usize)> {
    let mut out = String::new();
    let mut chars = input[start + 1..].char_indices();

    while let Some((offset, c)) = chars.next() {
        match c {
            '"' => return Ok((out, start + 1 + offset + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, other)) => {
                    return Err(Error::parse(input, format!("unknown escape '\\{other}'")));
                }
                None => break,
            },
            other => out.push(other),
        }
    }

    Err(Error::parse(input, "unterminated string literal"))
}

fn lex_number(input: &str, start: usize) -> Result<(Token, usize)> {
    let bytes = input.as_bytes();
    let mut i = start;
    let mut is_float = false;

    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
        is_float = true;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text = &input[start..i];
    let token = if is_float {
        Token::Float(
            text.parse()
                .map_err(|_| Error::parse(input, format!("invalid float literal '{text}'")))?,
        )
    } else {
        Token::Int(
            text.parse()
                .map_err(|_| Error::parse(input, format!("integer literal '{text}' is out of range")))?,
        )
    };
    Ok((token, i))
}

struct ExprParser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.eat(expected) {
            return Ok(());
        }
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_string(), ToString::to_string);
        Err(Error::parse(self.input, format!("expected {expected}, found {found}")))
    }

    fn eat_op(&mut self, candidates: &[(&str, BinaryOp)]) -> Option<BinaryOp> {
        if let Some(Token::Op(op)) = self.peek() {
            if let Some((_, binary)) = candidates.iter().find(|(s, _)| s == op) {
                let binary = *binary;
                self.pos += 1;
                return Some(binary);
            }
        }
        None
    }

    fn expr(&mut self) -> Result<Expr> {
        let condition = self.or()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then_branch = self.expr()?;
        self.expect(&Token::Colon)?;
        let else_branch = self.expr()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut lhs = next(self)?;
        while let Some(op) = self.eat_op(ops) {
            let rhs = next(self)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn or(&mut self) -> Result<Expr> {
        self.binary_level(&[("||", BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Expr> {
        self.binary_level(&[("&&", BinaryOp::And)], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::Ne),
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::sum,
        )
    }

    fn sum(&mut self) -> Result<Expr> {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::product)
    }

    fn product(&mut self) -> Result<Expr> {
        self.binary_level(
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Some(Token::Op("!")) => UnaryOp::Not,
            Some(Token::Op("-")) => UnaryOp::Neg,
            _ => return self.primary(),
        };
        self.pos += 1;
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int64(i))),
            Some(Token::Float(x)) => Ok(Expr::Literal(Value::Float64(x))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "missing" => Ok(Expr::Literal(Value::Missing)),
                _ if self.eat(&Token::LParen) => {
                    let args = self.arguments(&Token::RParen)?;
                    Ok(Expr::Call {
                        function: name,
                        args,
                    })
                }
                _ => Ok(Expr::Field(name)),
            },
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => Ok(Expr::List(self.arguments(&Token::RBracket)?)),
            Some(other) => Err(Error::parse(self.input, format!("unexpected {other}"))),
            None => Err(Error::parse(self.input, "unexpected end of expression")),
        }
    }

    fn arguments(&mut self, close: &Token) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(close) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(close) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }
}
