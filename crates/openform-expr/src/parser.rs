//! Expression parser.
//!
//! A recursive-descent parser over the lexer's tokens. Precedence, lowest
//! first:
//!
//! | Level | Operators |
//! |---|---|
//! | conditional | `a ? b : c` |
//! | nullish / or | `??`, `\|\|` |
//! | and | `&&` |
//! | equality | `==`, `!=`, `===`, `!==` |
//! | relational | `<`, `<=`, `>`, `>=` |
//! | additive | `+`, `-` |
//! | multiplicative | `*`, `/`, `%` |
//! | unary | `!`, `-`, `+` |
//! | postfix | `.name`, `[expr]`, calls |
//!
//! Calls are only accepted for the whitelisted [`Function`]s; anything else
//! is a syntax error, so evaluation never needs to resolve a callable.

use openform_core::error::FormError;

use crate::lexer::{tokenize, Spanned, Token};

/// Default nesting limit when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A number literal.
    Number(f64),
    /// A string literal.
    Str(String),
    /// `true` / `false`.
    Bool(bool),
    /// `null`.
    Null,
    /// `undefined`.
    Undefined,
    /// A bare identifier, resolved against the context.
    Ident(String),
    /// `object.name`
    Member(Box<Expr>, String),
    /// `object[index]`
    Index(Box<Expr>, Box<Expr>),
    /// A prefix operator.
    Unary(UnaryOp, Box<Expr>),
    /// An arithmetic, comparison or equality operator.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// A short-circuiting operator.
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    /// `test ? then : otherwise`
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    /// A call to a whitelisted function. For methods the receiver is the first argument.
    Call(Function, Vec<Expr>),
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Neg,
    /// `+`
    Plus,
}

/// Binary operators that always evaluate both operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+` (addition or concatenation)
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `==`
    LooseEq,
    /// `!=`
    LooseNe,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// Short-circuiting operators; they yield one of their operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
    /// `??`
    Nullish,
}

/// The functions an expression may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `Number(x)`
    Number,
    /// `String(x)`
    String,
    /// `Boolean(x)`
    Boolean,
    /// `parseFloat(x)`
    ParseFloat,
    /// `parseInt(x, radix?)`
    ParseInt,
    /// `isNaN(x)`
    IsNaN,
    /// `Math.round(x)`
    Round,
    /// `Math.floor(x)`
    Floor,
    /// `Math.ceil(x)`
    Ceil,
    /// `Math.abs(x)`
    Abs,
    /// `Math.trunc(x)`
    Trunc,
    /// `Math.sqrt(x)`
    Sqrt,
    /// `Math.pow(x, y)`
    Pow,
    /// `Math.min(...)`
    Min,
    /// `Math.max(...)`
    Max,
    /// `x.toFixed(digits)`
    ToFixed,
}

impl Function {
    fn global(name: &str) -> Option<Self> {
        Some(match name {
            "Number" => Self::Number,
            "String" => Self::String,
            "Boolean" => Self::Boolean,
            "parseFloat" => Self::ParseFloat,
            "parseInt" => Self::ParseInt,
            "isNaN" => Self::IsNaN,
            _ => return None,
        })
    }

    fn math(name: &str) -> Option<Self> {
        Some(match name {
            "round" => Self::Round,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "abs" => Self::Abs,
            "trunc" => Self::Trunc,
            "sqrt" => Self::Sqrt,
            "pow" => Self::Pow,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => return None,
        })
    }
}

/// Parses an expression with the default nesting limit.
///
/// # Errors
///
/// Returns [`FormError::ExpressionSyntax`] if the source is not a valid expression.
pub fn parse(source: &str) -> Result<Expr, FormError> {
    Parser::new(source, DEFAULT_MAX_DEPTH)?.parse_all()
}

/// A recursive-descent expression parser.
#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    /// Tokenizes `source` and prepares a parser with the given nesting limit.
    pub fn new(source: &str, max_depth: usize) -> Result<Self, FormError> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            depth: 0,
            max_depth,
        })
    }

    /// Parses the whole token stream as one expression.
    pub fn parse_all(mut self) -> Result<Expr, FormError> {
        if self.tokens.is_empty() {
            return Err(FormError::ExpressionSyntax("Empty expression".to_string()));
        }
        let expr = self.parse_conditional()?;
        if let Some(extra) = self.tokens.get(self.pos) {
            return Err(FormError::ExpressionSyntax(format!(
                "Unexpected {:?} at offset {}",
                extra.token, extra.offset
            )));
        }
        Ok(expr)
    }

    // ── Token helpers ───────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), FormError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected {what}")))
        }
    }

    fn error(&self, message: &str) -> FormError {
        match self.tokens.get(self.pos) {
            Some(s) => FormError::ExpressionSyntax(format!(
                "{message}, found {:?} at offset {}",
                s.token, s.offset
            )),
            None => FormError::ExpressionSyntax(format!("{message}, found end of expression")),
        }
    }

    fn enter(&mut self) -> Result<(), FormError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(FormError::ExpressionSyntax(format!(
                "Expression nested deeper than {} levels",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ── Grammar ─────────────────────────────────────────────────────

    fn parse_conditional(&mut self) -> Result<Expr, FormError> {
        self.enter()?;
        let test = self.parse_or()?;
        let expr = if self.eat(&Token::Question) {
            let then = self.parse_conditional()?;
            self.expect(&Token::Colon, "':' in conditional")?;
            let otherwise = self.parse_conditional()?;
            Expr::Conditional(Box::new(test), Box::new(then), Box::new(otherwise))
        } else {
            test
        };
        self.leave();
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, FormError> {
        let mut left = self.parse_and()?;
        loop {
            let op = match self.peek() {
                Some(Token::Or) => LogicalOp::Or,
                Some(Token::Nullish) => LogicalOp::Nullish,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Logical(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, FormError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, FormError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::LooseEq,
                Some(Token::NotEq) => BinaryOp::LooseNe,
                Some(Token::StrictEq) => BinaryOp::StrictEq,
                Some(Token::StrictNotEq) => BinaryOp::StrictNe,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, FormError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, FormError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, FormError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, FormError> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave();
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> Result<Expr, FormError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let name = match self.tokens.get(self.pos).map(|s| &s.token) {
                    Some(Token::Ident(name)) => name.clone(),
                    _ => return Err(self.error("Expected property name after '.'")),
                };
                self.pos += 1;
                expr = Expr::Member(Box::new(expr), name);
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_conditional()?;
                self.expect(&Token::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.peek() == Some(&Token::LParen) {
                expr = self.parse_call(expr)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_call(&mut self, callee: Expr) -> Result<Expr, FormError> {
        let (function, receiver) = match callee {
            Expr::Ident(name) => (Function::global(&name), None),
            Expr::Member(object, name) => match *object {
                Expr::Ident(ref owner) if owner == "Math" => (Function::math(&name), None),
                other if name == "toFixed" => (Some(Function::ToFixed), Some(other)),
                _ => (None, None),
            },
            _ => (None, None),
        };
        let function = function.ok_or_else(|| self.error("Call to a function that is not allowed"))?;

        self.expect(&Token::LParen, "'('")?;
        let mut args: Vec<Expr> = receiver.into_iter().collect();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.parse_conditional()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma, "',' or ')' in argument list")?;
            }
        }
        Ok(Expr::Call(function, args))
    }

    fn parse_primary(&mut self) -> Result<Expr, FormError> {
        let Some(spanned) = self.tokens.get(self.pos) else {
            return Err(self.error("Expected a value"));
        };
        let expr = match &spanned.token {
            Token::Number(n) => Expr::Number(*n),
            Token::Str(s) => Expr::Str(s.clone()),
            Token::Ident(name) => match name.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" => Expr::Null,
                "undefined" => Expr::Undefined,
                "NaN" => Expr::Number(f64::NAN),
                "Infinity" => Expr::Number(f64::INFINITY),
                _ => Expr::Ident(name.clone()),
            },
            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_conditional()?;
                self.expect(&Token::RParen, "')'")?;
                return Ok(inner);
            }
            _ => return Err(self.error("Expected a value")),
        };
        self.pos += 1;
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    #[test]
    fn test_parse_table_column_expression() {
        let expr = parse("Number(data.quantity) * Number(data.price)").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Mul,
                Box::new(Expr::Call(
                    Function::Number,
                    vec![Expr::Member(ident("data"), "quantity".into())]
                )),
                Box::new(Expr::Call(
                    Function::Number,
                    vec![Expr::Member(ident("data"), "price".into())]
                )),
            )
        );
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a + b * c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                ident("a"),
                Box::new(Expr::Binary(BinaryOp::Mul, ident("b"), ident("c")))
            )
        );
    }

    #[test]
    fn test_left_associative_subtraction() {
        let expr = parse("a - b - c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(BinaryOp::Sub, ident("a"), ident("b"))),
                ident("c")
            )
        );
    }

    #[test]
    fn test_conditional_is_right_associative() {
        let expr = parse("a ? b : c ? d : e").unwrap();
        assert!(matches!(expr, Expr::Conditional(_, _, ref otherwise) if matches!(**otherwise, Expr::Conditional(..))));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(parse("true").unwrap(), Expr::Bool(true));
        assert_eq!(parse("null").unwrap(), Expr::Null);
        assert_eq!(parse("undefined").unwrap(), Expr::Undefined);
    }

    #[test]
    fn test_math_and_method_calls() {
        assert_eq!(
            parse("Math.max(1, 2)").unwrap(),
            Expr::Call(Function::Max, vec![Expr::Number(1.0), Expr::Number(2.0)])
        );
        assert_eq!(
            parse("(a * 2).toFixed(2)").unwrap(),
            Expr::Call(
                Function::ToFixed,
                vec![
                    Expr::Binary(BinaryOp::Mul, ident("a"), Box::new(Expr::Number(2.0))),
                    Expr::Number(2.0)
                ]
            )
        );
    }

    #[test]
    fn test_rejects_unknown_calls() {
        assert!(parse("eval('1')").is_err());
        assert!(parse("alert(1)").is_err());
        assert!(parse("data.constructor('x')()").is_err());
        assert!(parse("Math.random()").is_err());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse("").is_err());
        assert!(parse("1 +").is_err());
        assert!(parse("(1").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("a ? b").is_err());
        assert!(parse("a.").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert!(Parser::new(&deep, 64).unwrap().parse_all().is_ok());
        assert!(Parser::new(&deep, 5).unwrap().parse_all().is_err());
        let negations = "-".repeat(100) + "1";
        assert!(parse(&negations).is_err());
    }

    #[test]
    fn test_index_access() {
        assert_eq!(
            parse("data['unit price']").unwrap(),
            Expr::Index(ident("data"), Box::new(Expr::Str("unit price".into())))
        );
    }
}
