//! Hand-written tokenizer for the DDL subset the registry consumes.
//!
//! Tokens carry byte offsets into the source text so the parser can recover
//! the exact source slice of a clause (used when re-serializing ALTER specs
//! into canonical, schema-qualified form).

use crate::error::DdlError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tok {
    /// Unquoted word: identifier or keyword, stored verbatim.
    Word(String),
    /// Backtick-quoted identifier, with doubled backticks unescaped.
    Quoted(String),
    /// Single- or double-quoted string literal, unescaped.
    Str(String),
    Number(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Semi,
    /// Any other single-character operator, e.g. `=`.
    Op(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub tok: Tok,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// Case-insensitive keyword match against an unquoted word.
    pub fn is_word(&self, kw: &str) -> bool {
        matches!(&self.tok, Tok::Word(w) if w.eq_ignore_ascii_case(kw))
    }

    /// Identifier text, whether the source quoted it or not.
    pub fn ident(&self) -> Option<&str> {
        match &self.tok {
            Tok::Word(w) => Some(w),
            Tok::Quoted(q) => Some(q),
            _ => None,
        }
    }
}

/// Tokenize a statement. Line comments (`-- `, `#`) and block comments
/// (including optimizer-hint style `/*! ... */`) are skipped.
pub fn tokenize(sql: &str) -> Result<Vec<Token>, DdlError> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            c if c.is_whitespace() => i += 1,
            '-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            '#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            '/' if bytes.get(i + 1) == Some(&b'*') => {
                let close = sql[i + 2..].find("*/").ok_or_else(|| DdlError::ParseError {
                    pos: i,
                    message: "unterminated block comment".to_string(),
                    sql: sql.to_string(),
                })?;
                i += 2 + close + 2;
            }
            '`' => {
                let start = i;
                i += 1;
                // raw bytes, so multi-byte identifiers survive intact
                let mut out = Vec::new();
                loop {
                    match bytes.get(i) {
                        Some(b'`') if bytes.get(i + 1) == Some(&b'`') => {
                            out.push(b'`');
                            i += 2;
                        }
                        Some(b'`') => {
                            i += 1;
                            break;
                        }
                        Some(&b) => {
                            out.push(b);
                            i += 1;
                        }
                        None => {
                            return Err(DdlError::ParseError {
                                pos: start,
                                message: "unterminated quoted identifier".to_string(),
                                sql: sql.to_string(),
                            })
                        }
                    }
                }
                tokens.push(Token {
                    tok: Tok::Quoted(into_utf8(out, start, sql)?),
                    start,
                    end: i,
                });
            }
            '\'' | '"' => {
                let quote = bytes[i];
                let start = i;
                i += 1;
                let mut out = Vec::new();
                loop {
                    match bytes.get(i) {
                        Some(b'\\') if bytes.get(i + 1).is_some() => {
                            out.push(unescape(bytes[i + 1]));
                            i += 2;
                        }
                        Some(&b) if b == quote && bytes.get(i + 1) == Some(&quote) => {
                            out.push(quote);
                            i += 2;
                        }
                        Some(&b) if b == quote => {
                            i += 1;
                            break;
                        }
                        Some(&b) => {
                            out.push(b);
                            i += 1;
                        }
                        None => {
                            return Err(DdlError::ParseError {
                                pos: start,
                                message: "unterminated string literal".to_string(),
                                sql: sql.to_string(),
                            })
                        }
                    }
                }
                tokens.push(Token {
                    tok: Tok::Str(into_utf8(out, start, sql)?),
                    start,
                    end: i,
                });
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric()
                        || bytes[i] == b'.'
                        || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push(Token {
                    tok: Tok::Number(sql[start..i].to_string()),
                    start,
                    end: i,
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' || !c.is_ascii() => {
                let start = i;
                while i < bytes.len() {
                    let b = bytes[i] as char;
                    if b.is_ascii_alphanumeric() || b == '_' || b == '$' || !b.is_ascii() {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    tok: Tok::Word(sql[start..i].to_string()),
                    start,
                    end: i,
                });
            }
            _ => {
                let tok = match c {
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    ',' => Tok::Comma,
                    '.' => Tok::Dot,
                    ';' => Tok::Semi,
                    other => Tok::Op(other),
                };
                tokens.push(Token {
                    tok,
                    start: i,
                    end: i + 1,
                });
                i += 1;
            }
        }
    }

    Ok(tokens)
}

fn unescape(b: u8) -> u8 {
    match b {
        b'n' => b'\n',
        b't' => b'\t',
        b'r' => b'\r',
        b'0' => 0,
        other => other,
    }
}

/// The input is `&str`, so the only way the accumulated bytes are invalid
/// is a backslash splitting a multi-byte sequence.
fn into_utf8(out: Vec<u8>, start: usize, sql: &str) -> Result<String, DdlError> {
    String::from_utf8(out).map_err(|_| DdlError::ParseError {
        pos: start,
        message: "escape breaks a multi-byte sequence".to_string(),
        sql: sql.to_string(),
    })
}
