//! Hand-written lexer: source string → flat token sequence.
//!
//! The scanner never fails to terminate. Unterminated string/char literals
//! still produce a token that reaches end of input (marked unterminated so
//! callers that need complete input can reject it, while probe parsing of
//! half-typed text keeps working).

pub mod token;


use thiserror::Error;

use token::{keyword, IntKind, Span, Token, TokenKind};

/// Lexical failure.
#[derive(Debug, Clone, Error)]
pub enum LexError {
    #[error("invalid character '{ch}' at offset {offset} (line {line})")]
    InvalidCharacter { ch: char, offset: usize, line: u32 },

    #[error("invalid literal '{text}' at offset {offset} (line {line})")]
    InvalidLiteral {
        text: String,
        offset: usize,
        line: u32,
    },
}

impl LexError {
    pub fn offset(&self) -> usize {
        match self {
            LexError::InvalidCharacter { offset, .. } => *offset,
            LexError::InvalidLiteral { offset, .. } => *offset,
        }
    }
}

/// Lex `source` completely, ending with an [`TokenKind::Eoi`] sentinel.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut scanner = Scanner::new(source);
    let mut out = Vec::new();
    loop {
        match scanner.next_token()? {
            Some(tok) => out.push(tok),
            None => break,
        }
    }
    out.push(scanner.eoi());
    Ok(out)
}

/// Lex as much of `source` as is valid, then end the stream quietly.
///
/// The suggestion engine uses this so that garbage after the cursor still
/// leaves a usable token prefix.
pub fn lex_lossy(source: &str) -> Vec<Token> {
    let mut scanner = Scanner::new(source);
    let mut out = Vec::new();
    while let Ok(Some(tok)) = scanner.next_token() {
        out.push(tok);
    }
    out.push(scanner.eoi());
    out
}

struct Scanner<'s> {
    src: &'s str,
    bytes: &'s [u8],
    pos: usize,
    line: u32,
}

impl<'s> Scanner<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn eoi(&self) -> Token {
        Token {
            kind: TokenKind::Eoi,
            span: Span::new(self.src.len(), self.src.len()),
            line: self.line,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        Some(b)
    }

    /// Decode the UTF-8 character at the cursor.
    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'\t' || b == b'\r' || b == b'\n' {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize, line: u32) -> Token {
        Token {
            kind,
            span: Span::new(start, self.pos),
            line,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace();
        let start = self.pos;
        let line = self.line;
        let Some(b) = self.peek() else {
            return Ok(None);
        };

        let kind = match b {
            b'0'..=b'9' => return self.scan_number(start, line).map(Some),
            b'"' => return self.scan_string(start, line).map(Some),
            b'\'' => return self.scan_char(start, line).map(Some),
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => return Ok(Some(self.scan_ident(start, line))),
            b'(' => self.one(TokenKind::LParen),
            b')' => self.one(TokenKind::RParen),
            b'{' => self.one(TokenKind::LBrace),
            b'}' => self.one(TokenKind::RBrace),
            b'[' => self.one(TokenKind::LBracket),
            b']' => self.one(TokenKind::RBracket),
            b',' => self.one(TokenKind::Comma),
            b';' => self.one(TokenKind::Semi),
            b':' => self.one(TokenKind::Colon),
            b'?' => self.one(TokenKind::Question),
            b'.' => self.one(TokenKind::Dot),
            b'~' => self.one(TokenKind::Tilde),
            b'+' => self.multi(&[("++", TokenKind::PlusPlus), ("+=", TokenKind::PlusEq)], TokenKind::Plus),
            b'-' => self.multi(
                &[("--", TokenKind::MinusMinus), ("-=", TokenKind::MinusEq)],
                TokenKind::Minus,
            ),
            b'*' => self.multi(&[("*=", TokenKind::StarEq)], TokenKind::Star),
            b'/' => self.multi(&[("/=", TokenKind::SlashEq)], TokenKind::Slash),
            b'%' => self.multi(&[("%=", TokenKind::PercentEq)], TokenKind::Percent),
            b'&' => self.multi(&[("&&", TokenKind::AmpAmp), ("&=", TokenKind::AmpEq)], TokenKind::Amp),
            b'|' => self.multi(
                &[("||", TokenKind::PipePipe), ("|=", TokenKind::PipeEq)],
                TokenKind::Pipe,
            ),
            b'^' => self.multi(&[("^=", TokenKind::CaretEq)], TokenKind::Caret),
            b'!' => self.multi(&[("!=", TokenKind::BangEq)], TokenKind::Bang),
            b'=' => self.multi(&[("==", TokenKind::EqEq)], TokenKind::Eq),
            b'<' => self.multi(
                &[
                    ("<<=", TokenKind::ShlEq),
                    ("<<", TokenKind::Shl),
                    ("<=", TokenKind::Le),
                ],
                TokenKind::Lt,
            ),
            b'>' => self.multi(
                &[
                    (">>=", TokenKind::ShrEq),
                    (">>", TokenKind::Shr),
                    (">=", TokenKind::Ge),
                ],
                TokenKind::Gt,
            ),
            _ => {
                let ch = self.peek_char().unwrap_or('\u{fffd}');
                return Err(LexError::InvalidCharacter {
                    ch,
                    offset: start,
                    line,
                });
            }
        };
        Ok(Some(self.token(kind, start, line)))
    }

    fn one(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    /// Match the longest operator from `options`, falling back to `single`.
    fn multi(&mut self, options: &[(&str, TokenKind)], single: TokenKind) -> TokenKind {
        for (text, kind) in options {
            if self.src[self.pos..].starts_with(text) {
                for _ in 0..text.len() {
                    self.bump();
                }
                return kind.clone();
            }
        }
        self.bump();
        single
    }

    fn scan_ident(&mut self, start: usize, line: u32) -> Token {
        while let Some(b) = self.peek() {
            if b == b'_' || b.is_ascii_alphanumeric() {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.src[start..self.pos];
        // A keyword hit re-tags the token, keeping the identifier's span.
        let kind = match keyword(text) {
            Some(kw) => TokenKind::Kw(kw),
            None => TokenKind::Ident(text.into()),
        };
        self.token(kind, start, line)
    }

    // ── Numeric literals ───────────────────────────────────────────────

    fn scan_number(&mut self, start: usize, line: u32) -> Result<Token, LexError> {
        if self.peek() == Some(b'0')
            && matches!(self.peek_at(1), Some(b'x') | Some(b'X') | Some(b'b') | Some(b'B'))
        {
            return self.scan_radix_number(start, line);
        }

        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.bump();
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.bump();
            }
            is_float = true;
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let after = if self.peek_at(1) == Some(b'-') { 2 } else { 1 };
            if self.peek_at(after).is_some_and(|b| b.is_ascii_digit()) {
                // exponent marker, optional '-', digits
                for _ in 0..after {
                    self.bump();
                }
                while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.bump();
                }
                is_float = true;
            }
        }

        let digits_end = self.pos;

        if matches!(self.peek(), Some(b'f') | Some(b'F')) {
            self.bump();
            self.reject_literal_tail(start, line)?;
            let value = self.parse_float(start, digits_end, line)?;
            return Ok(self.token(TokenKind::Float { value, single: true }, start, line));
        }

        if is_float {
            self.reject_literal_tail(start, line)?;
            let value = self.parse_float(start, digits_end, line)?;
            return Ok(self.token(TokenKind::Float { value, single: false }, start, line));
        }

        let suffix = self.scan_int_suffix();
        self.reject_literal_tail(start, line)?;
        let text = &self.src[start..digits_end];
        let value = text
            .parse::<u128>()
            .map_err(|_| self.invalid_literal(start, line))?;
        let kind = self.classify_int(value, suffix, start, line)?;
        Ok(self.token(kind, start, line))
    }

    fn scan_radix_number(&mut self, start: usize, line: u32) -> Result<Token, LexError> {
        self.bump(); // '0'
        let marker = self.bump().unwrap_or(b'x');
        let radix = if marker == b'x' || marker == b'X' { 16 } else { 2 };
        let digits_start = self.pos;
        while self.peek().is_some_and(|b| {
            if radix == 16 {
                b.is_ascii_hexdigit()
            } else {
                b == b'0' || b == b'1'
            }
        }) {
            self.bump();
        }
        let digits_end = self.pos;
        if digits_start == digits_end {
            self.consume_literal_tail();
            return Err(self.invalid_literal(start, line));
        }
        let suffix = self.scan_int_suffix();
        self.reject_literal_tail(start, line)?;
        let value = u128::from_str_radix(&self.src[digits_start..digits_end], radix)
            .map_err(|_| self.invalid_literal(start, line))?;
        let kind = self.classify_int(value, suffix, start, line)?;
        Ok(self.token(kind, start, line))
    }

    /// `u`/`l`/`ul` suffix in either case and order; at most two letters.
    fn scan_int_suffix(&mut self) -> (bool, bool) {
        let mut unsigned = false;
        let mut long = false;
        for _ in 0..2 {
            match self.peek() {
                Some(b'u') | Some(b'U') if !unsigned => {
                    unsigned = true;
                    self.bump();
                }
                Some(b'l') | Some(b'L') if !long => {
                    long = true;
                    self.bump();
                }
                _ => break,
            }
        }
        (unsigned, long)
    }

    fn classify_int(
        &self,
        value: u128,
        (unsigned, long): (bool, bool),
        start: usize,
        line: u32,
    ) -> Result<TokenKind, LexError> {
        let kind = match (unsigned, long) {
            // Unsuffixed: smallest of int → uint → long → ulong that fits.
            (false, false) => {
                if value <= i32::MAX as u128 {
                    IntKind::I32
                } else if value <= u32::MAX as u128 {
                    IntKind::U32
                } else if value <= i64::MAX as u128 {
                    IntKind::I64
                } else if value <= u64::MAX as u128 {
                    IntKind::U64
                } else {
                    return Err(self.invalid_literal(start, line));
                }
            }
            (true, false) => {
                if value <= u32::MAX as u128 {
                    IntKind::U32
                } else if value <= u64::MAX as u128 {
                    IntKind::U64
                } else {
                    return Err(self.invalid_literal(start, line));
                }
            }
            (false, true) => {
                if value <= i64::MAX as u128 {
                    IntKind::I64
                } else if value <= u64::MAX as u128 {
                    IntKind::U64
                } else {
                    return Err(self.invalid_literal(start, line));
                }
            }
            (true, true) => {
                if value <= u64::MAX as u128 {
                    IntKind::U64
                } else {
                    return Err(self.invalid_literal(start, line));
                }
            }
        };
        Ok(TokenKind::Int {
            value: value as u64,
            kind,
        })
    }

    fn parse_float(&self, start: usize, digits_end: usize, line: u32) -> Result<f64, LexError> {
        self.src[start..digits_end]
            .parse::<f64>()
            .map_err(|_| self.invalid_literal(start, line))
    }

    /// A literal immediately followed by identifier characters is malformed
    /// as a whole ("123abc"); consume the tail so the error names all of it.
    fn reject_literal_tail(&mut self, start: usize, line: u32) -> Result<(), LexError> {
        if self
            .peek()
            .is_some_and(|b| b == b'_' || b.is_ascii_alphanumeric() || b == b'.')
        {
            // '.' only counts when it would have been part of the number
            if self.peek() == Some(b'.')
                && !self.peek_at(1).is_some_and(|b| b.is_ascii_digit())
            {
                return Ok(());
            }
            self.consume_literal_tail();
            return Err(self.invalid_literal(start, line));
        }
        Ok(())
    }

    fn consume_literal_tail(&mut self) {
        while self
            .peek()
            .is_some_and(|b| b == b'_' || b == b'.' || b.is_ascii_alphanumeric())
        {
            self.bump();
        }
    }

    fn invalid_literal(&self, start: usize, line: u32) -> LexError {
        LexError::InvalidLiteral {
            text: self.src[start..self.pos].to_string(),
            offset: start,
            line,
        }
    }

    // ── String and char literals ───────────────────────────────────────

    fn scan_string(&mut self, start: usize, line: u32) -> Result<Token, LexError> {
        self.bump(); // opening quote
        let mut value = String::new();
        let mut terminated = false;
        while let Some(c) = self.peek_char() {
            match c {
                '"' => {
                    self.bump();
                    terminated = true;
                    break;
                }
                '\\' => value.push(self.scan_escape(start, line)?),
                _ => {
                    self.bump_char();
                    value.push(c);
                }
            }
        }
        Ok(self.token(
            TokenKind::Str {
                value: value.into(),
                terminated,
            },
            start,
            line,
        ))
    }

    fn scan_char(&mut self, start: usize, line: u32) -> Result<Token, LexError> {
        self.bump(); // opening quote
        let value = match self.peek_char() {
            None => {
                return Ok(self.token(
                    TokenKind::CharLit {
                        value: '\0',
                        terminated: false,
                    },
                    start,
                    line,
                ));
            }
            Some('\'') => {
                // '' is an empty char literal
                self.bump();
                return Err(self.invalid_literal(start, line));
            }
            Some('\\') => self.scan_escape(start, line)?,
            Some(c) => {
                self.bump_char();
                c
            }
        };
        match self.peek() {
            Some(b'\'') => {
                self.bump();
                Ok(self.token(
                    TokenKind::CharLit {
                        value,
                        terminated: true,
                    },
                    start,
                    line,
                ))
            }
            None => Ok(self.token(
                TokenKind::CharLit {
                    value,
                    terminated: false,
                },
                start,
                line,
            )),
            Some(_) => {
                // Multi-character literal; scan to the closing quote so the
                // error text covers the whole thing.
                while let Some(c) = self.bump_char() {
                    if c == '\'' {
                        break;
                    }
                }
                Err(self.invalid_literal(start, line))
            }
        }
    }

    fn scan_escape(&mut self, start: usize, line: u32) -> Result<char, LexError> {
        self.bump(); // backslash
        let Some(marker) = self.bump_char() else {
            return Err(self.invalid_literal(start, line));
        };
        let c = match marker {
            '0' => '\0',
            '\'' => '\'',
            '"' => '"',
            '\\' => '\\',
            'a' => '\u{7}',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{b}',
            'u' => {
                let mut code: u32 = 0;
                for _ in 0..4 {
                    let Some(d) = self.peek().and_then(|b| (b as char).to_digit(16)) else {
                        return Err(self.invalid_literal(start, line));
                    };
                    self.bump();
                    code = code * 16 + d;
                }
                char::from_u32(code).ok_or_else(|| self.invalid_literal(start, line))?
            }
            _ => return Err(self.invalid_literal(start, line)),
        };
        Ok(c)
    }
}
