//! lexer.rs
//! Tokenizer for formula text. Dice patterns (`1d20`) are located by a pass
//! over the raw source before tokenizing, so the identifier scanner never sees
//! them and quoted text containing `2d8` is left untouched.

use super::error::ExprError;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    Dice { count: u32, sides: u32 },
    True,
    False,
    LParen,
    RParen,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn is_ident_start(c: char) -> bool { c.is_ascii_alphabetic() || c == '_' || c == '@' }
fn is_ident_char(c: char) -> bool { c.is_ascii_alphanumeric() || c == '_' || c == '@' }

/// Byte ranges of every `NdM` pattern outside quoted text.
pub fn mark_dice(src: &str) -> Vec<Range<usize>> {
    let bytes = src.as_bytes();
    let mut marks = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if b == b'"' || b == b'\'' {
            quote = Some(b);
            i += 1;
            continue;
        }

        let preceded = i > 0 && (is_ident_char(bytes[i - 1] as char) || bytes[i - 1] == b'.');
        if b.is_ascii_digit() && !preceded {
            let start = i;
            let mut j = i;
            while j < bytes.len() && bytes[j].is_ascii_digit() { j += 1; }
            if j < bytes.len() && (bytes[j] == b'd' || bytes[j] == b'D') {
                let mut k = j + 1;
                while k < bytes.len() && bytes[k].is_ascii_digit() { k += 1; }
                let followed = k < bytes.len() && (is_ident_char(bytes[k] as char) || bytes[k] == b'.');
                if k > j + 1 && !followed {
                    marks.push(start..k);
                    i = k;
                    continue;
                }
            }
            i = j;
            continue;
        }
        i += 1;
    }
    marks
}

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ExprError> {
    let dice = mark_dice(src);
    let mut dice = dice.into_iter().peekable();
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let unexpected = |offset: usize, ch: char| ExprError::UnexpectedChar { text: src.to_string(), ch, offset };

    while i < chars.len() {
        let (offset, c) = chars[i];

        if let Some(range) = dice.peek() {
            if range.start == offset {
                let range = dice.next().unwrap_or(offset..offset);
                let (count, sides) = parse_dice(src, &src[range.clone()])?;
                tokens.push(Spanned { token: Token::Dice { count, sides }, offset });
                while i < chars.len() && chars[i].0 < range.end { i += 1; }
                continue;
            }
        }

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|(_, n)| n.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') { i += 1; }
            let end = chars.get(i).map_or(src.len(), |(o, _)| *o);
            let literal = &src[offset..end];
            let n = literal.parse::<f64>().map_err(|_| ExprError::Syntax {
                text: src.to_string(),
                message: format!("invalid number \"{}\"", literal),
            })?;
            tokens.push(Spanned { token: Token::Number(n), offset: chars[start].0 });
            continue;
        }

        if is_ident_start(c) {
            let start = offset;
            while i < chars.len() && is_ident_char(chars[i].1) { i += 1; }
            let end = chars.get(i).map_or(src.len(), |(o, _)| *o);
            let token = match &src[start..end] {
                "true" => Token::True,
                "false" => Token::False,
                name => Token::Ident(name.to_string()),
            };
            tokens.push(Spanned { token, offset: start });
            continue;
        }

        if c == '"' || c == '\'' {
            let mut text = String::new();
            i += 1;
            let mut closed = false;
            while i < chars.len() {
                let ch = chars[i].1;
                if ch == '\\' {
                    match chars.get(i + 1) {
                        Some((_, 'n')) => text.push('\n'),
                        Some((_, 't')) => text.push('\t'),
                        Some((_, escaped)) => text.push(*escaped),
                        None => break,
                    }
                    i += 2;
                    continue;
                }
                i += 1;
                if ch == c {
                    closed = true;
                    break;
                }
                text.push(ch);
            }
            if !closed {
                return Err(ExprError::UnterminatedText(src.to_string()));
            }
            tokens.push(Spanned { token: Token::Text(text), offset });
            continue;
        }

        let next = chars.get(i + 1).map(|(_, n)| *n);
        let (token, width) = match (c, next) {
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('&', Some('&')) => (Token::AndAnd, 2),
            ('|', Some('|')) => (Token::OrOr, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('!', _) => (Token::Bang, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            _ => return Err(unexpected(offset, c)),
        };
        tokens.push(Spanned { token, offset });
        i += width;
    }

    Ok(tokens)
}

fn parse_dice(src: &str, pattern: &str) -> Result<(u32, u32), ExprError> {
    let lower = pattern.to_ascii_lowercase();
    let invalid = |message: String| ExprError::Syntax { text: src.to_string(), message };
    let (count, sides) = lower.split_once('d').ok_or_else(|| invalid(format!("invalid dice \"{}\"", pattern)))?;
    let count = count.parse::<u32>().map_err(|_| invalid(format!("too many dice in \"{}\"", pattern)))?;
    let sides = sides.parse::<u32>().map_err(|_| invalid(format!("too many sides in \"{}\"", pattern)))?;
    if sides == 0 {
        return Err(invalid(format!("dice need at least one side: \"{}\"", pattern)));
    }
    Ok((count, sides))
}
