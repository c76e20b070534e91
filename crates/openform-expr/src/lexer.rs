//! Expression lexer (tokenizer).
//!
//! Converts expression source into a flat list of [`Token`]s, each tagged
//! with its byte offset for error messages.

use openform_core::error::FormError;
use openform_core::value::parse_number;

/// A token produced by the expression lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A numeric literal.
    Number(f64),
    /// A quoted string literal, escapes resolved.
    Str(String),
    /// An identifier or keyword (`data`, `true`, `Math`).
    Ident(String),
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `!`
    Bang,
    /// `==`
    Eq,
    /// `===`
    StrictEq,
    /// `!=`
    NotEq,
    /// `!==`
    StrictNotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `??`
    Nullish,
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
}

/// A token together with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// The token.
    pub token: Token,
    /// Byte offset into the source.
    pub offset: usize,
}

/// Tokenizes an expression.
///
/// # Errors
///
/// Returns [`FormError::ExpressionSyntax`] for unterminated strings, malformed
/// numbers and characters that are not part of the language (including `=`,
/// since assignment is not supported).
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, FormError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).map(|&(_, c)| c);

        if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) {
            let (token, consumed) = lex_number(source, &chars[i..])?;
            tokens.push(Spanned { token, offset });
            i += consumed;
            continue;
        }

        if c == '"' || c == '\'' {
            let (token, consumed) = lex_string(&chars[i..], offset)?;
            tokens.push(Spanned { token, offset });
            i += consumed;
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_part(chars[i].1) {
                i += 1;
            }
            let name: String = chars[start..i].iter().map(|&(_, c)| c).collect();
            tokens.push(Spanned {
                token: Token::Ident(name),
                offset,
            });
            continue;
        }

        let third = chars.get(i + 2).map(|&(_, c)| c);
        let (token, width) = match (c, next, third) {
            ('=', Some('='), Some('=')) => (Token::StrictEq, 3),
            ('!', Some('='), Some('=')) => (Token::StrictNotEq, 3),
            ('=', Some('='), _) => (Token::Eq, 2),
            ('!', Some('='), _) => (Token::NotEq, 2),
            ('<', Some('='), _) => (Token::Le, 2),
            ('>', Some('='), _) => (Token::Ge, 2),
            ('&', Some('&'), _) => (Token::And, 2),
            ('|', Some('|'), _) => (Token::Or, 2),
            ('?', Some('?'), _) => (Token::Nullish, 2),
            ('+', ..) => (Token::Plus, 1),
            ('-', ..) => (Token::Minus, 1),
            ('*', ..) => (Token::Star, 1),
            ('/', ..) => (Token::Slash, 1),
            ('%', ..) => (Token::Percent, 1),
            ('!', ..) => (Token::Bang, 1),
            ('<', ..) => (Token::Lt, 1),
            ('>', ..) => (Token::Gt, 1),
            ('?', ..) => (Token::Question, 1),
            (':', ..) => (Token::Colon, 1),
            ('.', ..) => (Token::Dot, 1),
            (',', ..) => (Token::Comma, 1),
            ('(', ..) => (Token::LParen, 1),
            (')', ..) => (Token::RParen, 1),
            ('[', ..) => (Token::LBracket, 1),
            (']', ..) => (Token::RBracket, 1),
            _ => {
                return Err(FormError::ExpressionSyntax(format!(
                    "Unexpected character '{c}' at offset {offset}"
                )))
            }
        };
        tokens.push(Spanned { token, offset });
        i += width;
    }

    Ok(tokens)
}

const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

const fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// Lexes a numeric literal; returns the token and the number of chars consumed.
fn lex_number(source: &str, chars: &[(usize, char)]) -> Result<(Token, usize), FormError> {
    let start = chars[0].0;
    let mut i = 0;

    let is_prefixed = chars[0].1 == '0'
        && chars
            .get(1)
            .is_some_and(|&(_, c)| matches!(c, 'x' | 'X' | 'o' | 'O' | 'b' | 'B'));

    if is_prefixed {
        i = 2;
        while i < chars.len() && chars[i].1.is_ascii_alphanumeric() {
            i += 1;
        }
    } else {
        while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
            i += 1;
        }
        if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
            let sign = chars.get(i + 1).map(|&(_, c)| c);
            let digit_at = if matches!(sign, Some('+' | '-')) { i + 2 } else { i + 1 };
            if chars.get(digit_at).is_some_and(|&(_, c)| c.is_ascii_digit()) {
                i = digit_at;
                while i < chars.len() && chars[i].1.is_ascii_digit() {
                    i += 1;
                }
            }
        }
    }

    let end = chars.get(i).map_or(source.len(), |&(o, _)| o);
    let literal = &source[start..end];
    let value = parse_number(literal);

    let followed_by_ident = chars.get(i).is_some_and(|&(_, c)| is_ident_start(c));
    if value.is_nan() || followed_by_ident {
        return Err(FormError::ExpressionSyntax(format!(
            "Invalid number literal '{literal}' at offset {start}"
        )));
    }
    Ok((Token::Number(value), i))
}

/// Lexes a quoted string literal; returns the token and the number of chars consumed.
fn lex_string(chars: &[(usize, char)], offset: usize) -> Result<(Token, usize), FormError> {
    let quote = chars[0].1;
    let mut out = String::new();
    let mut i = 1;

    while i < chars.len() {
        let c = chars[i].1;
        if c == quote {
            return Ok((Token::Str(out), i + 1));
        }
        if c == '\\' {
            let escaped = chars.get(i + 1).map(|&(_, c)| c).ok_or_else(|| unterminated(offset))?;
            i += 2;
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                'u' => {
                    let hex: String = chars.iter().skip(i).take(4).map(|&(_, c)| c).collect();
                    let decoded = u32::from_str_radix(&hex, 16)
                        .ok()
                        .filter(|_| hex.len() == 4)
                        .and_then(char::from_u32)
                        .ok_or_else(|| {
                            FormError::ExpressionSyntax(format!(
                                "Invalid unicode escape in string at offset {offset}"
                            ))
                        })?;
                    out.push(decoded);
                    i += 4;
                }
                other => out.push(other),
            }
            continue;
        }
        out.push(c);
        i += 1;
    }

    Err(unterminated(offset))
}

fn unterminated(offset: usize) -> FormError {
    FormError::ExpressionSyntax(format!("Unterminated string starting at offset {offset}"))
}
