//! SQL lexer - converts source text into tokens
//!
//! Sublexers are tried in a fixed priority order at each cursor position:
//! keyword, symbol, string, numeric, identifier. The first match advances
//! the cursor; whitespace is consumed by the symbol sublexer without
//! emitting a token. When nothing matches, lexing fails with the position
//! and a hint naming the last good token.

use super::token::{Location, Token, TokenKind, KEYWORDS, MAX_KEYWORD_LEN, SYMBOLS};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy)]
struct Cursor {
    pointer: usize,
    loc: Location,
}

/// A sublexer either produces a token and a new cursor, consumes input
/// without a token (whitespace), or reports no match at this position.
type Sublexer = fn(&Lexer, Cursor) -> Option<(Option<Token>, Cursor)>;

pub struct Lexer {
    input: Vec<char>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            input: source.chars().collect(),
        }
    }

    pub fn tokenize(&self) -> Result<Vec<Token>> {
        let sublexers: [Sublexer; 5] = [
            Self::lex_keyword,
            Self::lex_symbol,
            Self::lex_string,
            Self::lex_numeric,
            Self::lex_identifier,
        ];

        let mut tokens = Vec::new();
        let mut cur = Cursor {
            pointer: 0,
            loc: Location::default(),
        };

        'lex: while cur.pointer < self.input.len() {
            for sublexer in sublexers {
                if let Some((token, next)) = sublexer(self, cur) {
                    cur = next;
                    if let Some(token) = token {
                        tokens.push(token);
                    }
                    continue 'lex;
                }
            }

            let hint = tokens
                .last()
                .map(|t| format!(" after {}", t.value))
                .unwrap_or_default();
            return Err(EngineError::Lex {
                line: cur.loc.line,
                column: cur.loc.column,
                hint,
            });
        }

        Ok(tokens)
    }

    /// Longest case-insensitive match against the keyword set. `true` and
    /// `false` come out as Boolean tokens, `null` as a Null token.
    fn lex_keyword(&self, ic: Cursor) -> Option<(Option<Token>, Cursor)> {
        let mut candidate = String::new();
        let mut best = None;

        for len in 1..=MAX_KEYWORD_LEN {
            match self.input.get(ic.pointer + len - 1) {
                Some(c) if c.is_ascii_alphabetic() => {
                    candidate.push(c.to_ascii_lowercase());
                }
                _ => break,
            }
            if KEYWORDS.contains(candidate.as_str()) {
                best = Some(len);
            }
        }

        let len = best?;
        let value = candidate[..len].to_string();
        let kind = match value.as_str() {
            "true" | "false" => TokenKind::Boolean,
            "null" => TokenKind::Null,
            _ => TokenKind::Keyword,
        };

        let mut cur = ic;
        cur.pointer += len;
        cur.loc.column += len;
        Some((Some(Token::new(kind, value, ic.loc)), cur))
    }

    /// Whitespace and the symbol set. Whitespace advances the cursor but
    /// emits no token; newlines bump the line counter and reset the column.
    fn lex_symbol(&self, ic: Cursor) -> Option<(Option<Token>, Cursor)> {
        let mut cur = ic;
        match self.input[ic.pointer] {
            '\n' => {
                cur.pointer += 1;
                cur.loc.line += 1;
                cur.loc.column = 1;
                return Some((None, cur));
            }
            ' ' | '\t' | '\r' => {
                cur.pointer += 1;
                cur.loc.column += 1;
                return Some((None, cur));
            }
            _ => {}
        }

        // Candidates are ordered longest-first, so the first hit is the
        // longest match.
        for symbol in SYMBOLS {
            if self.matches_at(ic.pointer, symbol) {
                cur.pointer += symbol.len();
                cur.loc.column += symbol.len();
                return Some((
                    Some(Token::new(TokenKind::Symbol, *symbol, ic.loc)),
                    cur,
                ));
            }
        }

        None
    }

    /// Single-quoted string literal; a doubled `''` is an embedded quote.
    fn lex_string(&self, ic: Cursor) -> Option<(Option<Token>, Cursor)> {
        let (token, cur) = self.lex_delimited(ic, '\'')?;
        Some((Some(token), cur))
    }

    /// Decimal literal with optional fraction and `e[+-]?digits` exponent.
    fn lex_numeric(&self, ic: Cursor) -> Option<(Option<Token>, Cursor)> {
        let mut cur = ic;
        let mut period_found = false;
        let mut exp_found = false;

        while let Some(&c) = self.input.get(cur.pointer) {
            if cur.pointer == ic.pointer {
                if !c.is_ascii_digit() && c != '.' {
                    return None;
                }
                period_found = c == '.';
                cur.pointer += 1;
                cur.loc.column += 1;
                continue;
            }

            if c == '.' {
                if period_found {
                    return None;
                }
                period_found = true;
                cur.pointer += 1;
                cur.loc.column += 1;
                continue;
            }

            if c == 'e' {
                if exp_found {
                    return None;
                }
                // No fraction allowed in the exponent.
                period_found = true;
                exp_found = true;

                // An optional sign must be followed by at least one digit.
                let mut next = cur.pointer + 1;
                if matches!(self.input.get(next), Some('+') | Some('-')) {
                    next += 1;
                }
                match self.input.get(next) {
                    Some(d) if d.is_ascii_digit() => {}
                    _ => return None,
                }

                let consumed = next - cur.pointer;
                cur.pointer += consumed;
                cur.loc.column += consumed;
                continue;
            }

            if !c.is_ascii_digit() {
                break;
            }
            cur.pointer += 1;
            cur.loc.column += 1;
        }

        let value: String = self.input[ic.pointer..cur.pointer].iter().collect();
        Some((Some(Token::new(TokenKind::Numeric, value, ic.loc)), cur))
    }

    /// Bare identifier (lowercased) or a `"..."`-quoted identifier that
    /// preserves case, with `""` as an embedded quote.
    fn lex_identifier(&self, ic: Cursor) -> Option<(Option<Token>, Cursor)> {
        if let Some((mut token, cur)) = self.lex_delimited(ic, '"') {
            token.kind = TokenKind::Identifier;
            return Some((Some(token), cur));
        }

        let first = self.input[ic.pointer];
        if !first.is_ascii_alphabetic() {
            return None;
        }

        let mut cur = ic;
        let mut value = String::new();
        while let Some(&c) = self.input.get(cur.pointer) {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                value.push(c.to_ascii_lowercase());
                cur.pointer += 1;
                cur.loc.column += 1;
            } else {
                break;
            }
        }

        Some((Some(Token::new(TokenKind::Identifier, value, ic.loc)), cur))
    }

    /// Character-delimited token shared by strings and quoted identifiers.
    /// A doubled delimiter inside is one literal delimiter character.
    /// Unterminated input is a no-match, which surfaces as a lex error.
    fn lex_delimited(&self, ic: Cursor, delimiter: char) -> Option<(Token, Cursor)> {
        if self.input.get(ic.pointer) != Some(&delimiter) {
            return None;
        }

        let mut cur = ic;
        cur.pointer += 1;
        cur.loc.column += 1;

        let mut value = String::new();
        while let Some(&c) = self.input.get(cur.pointer) {
            if c == delimiter {
                if self.input.get(cur.pointer + 1) == Some(&delimiter) {
                    value.push(delimiter);
                    cur.pointer += 2;
                    cur.loc.column += 2;
                    continue;
                }
                cur.pointer += 1;
                cur.loc.column += 1;
                return Some((Token::new(TokenKind::String, value, ic.loc), cur));
            }

            if c == '\n' {
                cur.loc.line += 1;
                cur.loc.column = 1;
            } else {
                cur.loc.column += 1;
            }
            value.push(c);
            cur.pointer += 1;
        }

        None
    }

    fn matches_at(&self, pointer: usize, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, expected)| self.input.get(pointer + i) == Some(&expected))
    }
}
