//! Tokenizer for the accepted JavaScript subset.

use super::ast::Span;
use super::{Diagnostic, Phase};

/// Token payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword.
    Name(String),
    /// Numeric literal.
    Number(f64),
    /// String literal (cooked).
    String(String),
    /// Template piece. `head` is set for the piece that opens with a backtick,
    /// `tail` for the piece that closes with one.
    Template {
        /// Cooked text of the piece.
        cooked: String,
        /// Starts the template literal.
        head: bool,
        /// Ends the template literal.
        tail: bool,
    },
    /// Punctuator.
    Punct(&'static str),
    /// End of input.
    Eof,
}

/// A lexed token with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Payload.
    pub kind: TokenKind,
    /// Location.
    pub span: Span,
    /// A line terminator separates this token from the previous one.
    pub newline_before: bool,
}

const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

pub(crate) type LexResult<T> = std::result::Result<T, Diagnostic>;

/// On-demand tokenizer over a source string.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    brace_depth: usize,
    template_braces: Vec<usize>,
}

impl<'a> Lexer<'a> {
    /// Start lexing `src` from the beginning.
    pub fn new(src: &'a str) -> Self {
        let mut lexer = Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
            brace_depth: 0,
            template_braces: Vec::new(),
        };
        if src.starts_with("#!") {
            while let Some(ch) = lexer.peek() {
                if is_line_terminator(ch) {
                    break;
                }
                lexer.bump();
            }
        }
        lexer
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if is_line_terminator(ch) {
            if ch == '\r' && self.peek() == Some('\n') {
                self.pos += 1;
            }
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn here(&self) -> Span {
        Span {
            start: self.pos,
            end: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn error_at(&self, span: Span, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(Phase::Parse, message, span.line, span.column, span.start)
    }

    fn error(&self, message: impl Into<String>) -> Diagnostic {
        self.error_at(self.here(), message)
    }

    fn skip_trivia(&mut self) -> LexResult<bool> {
        let mut newline = false;
        loop {
            match self.peek() {
                Some(ch) if is_line_terminator(ch) => {
                    newline = true;
                    self.bump();
                }
                Some(ch) if super::number::is_js_whitespace(ch) => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(ch) = self.peek() {
                        if is_line_terminator(ch) {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.here();
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(ch) if is_line_terminator(ch) => newline = true,
                            Some(_) => {}
                            None => return Err(self.error_at(start, "Invalid or unexpected token")),
                        }
                    }
                }
                _ => return Ok(newline),
            }
        }
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> LexResult<Token> {
        let newline_before = self.skip_trivia()?;
        let start = self.here();
        let Some(ch) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: start,
                newline_before,
            });
        };

        let kind = if ch == '`' {
            self.bump();
            self.lex_template(start, true)?
        } else if ch == '}' && self.template_braces.last() == Some(&self.brace_depth) {
            self.template_braces.pop();
            self.bump();
            self.lex_template(start, false)?
        } else if ch == '"' || ch == '\'' {
            self.lex_string(ch)?
        } else if ch.is_ascii_digit()
            || (ch == '.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
        {
            self.lex_number(start)?
        } else if is_identifier_start(ch) {
            let mut name = String::new();
            while let Some(ch) = self.peek() {
                if is_identifier_part(ch) {
                    name.push(ch);
                    self.bump();
                } else {
                    break;
                }
            }
            if self.peek() == Some('\\') {
                return Err(self.error("Invalid or unexpected token"));
            }
            TokenKind::Name(name)
        } else {
            self.lex_punct()?
        };

        Ok(Token {
            kind,
            span: Span {
                start: start.start,
                end: self.pos,
                line: start.line,
                column: start.column,
            },
            newline_before,
        })
    }

    fn lex_punct(&mut self) -> LexResult<TokenKind> {
        let rest = &self.src[self.pos..];
        for punct in PUNCTUATORS {
            if !rest.starts_with(punct) {
                continue;
            }
            // `a?.5:b` is a conditional, not optional chaining.
            if *punct == "?." && rest[2..].starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            for _ in 0..punct.len() {
                self.bump();
            }
            match *punct {
                "{" => self.brace_depth += 1,
                "}" => self.brace_depth = self.brace_depth.saturating_sub(1),
                _ => {}
            }
            return Ok(TokenKind::Punct(punct));
        }
        Err(self.error("Invalid or unexpected token"))
    }

    fn lex_number(&mut self, start: Span) -> LexResult<TokenKind> {
        let radix = if self.peek() == Some('0') {
            match self.peek_at(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                Some(c) if c.is_ascii_digit() => {
                    return Err(self.error("Octal literals are not allowed in strict mode."));
                }
                _ => None,
            }
        } else {
            None
        };

        let value = if let Some(radix) = radix {
            self.bump();
            self.bump();
            let digits = self.digits(radix)?;
            super::number::parse_integer_digits(&digits, radix)
                .ok_or_else(|| self.error_at(start, "Invalid or unexpected token"))?
        } else {
            let mut text = self.digits(10)?;
            if self.peek() == Some('.') {
                self.bump();
                text.push('.');
                if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    text.push_str(&self.digits(10)?);
                }
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                self.bump();
                text.push('e');
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    self.bump();
                    text.push(sign);
                }
                let exponent = self.digits(10)?;
                if exponent.is_empty() {
                    return Err(self.error("Invalid or unexpected token"));
                }
                text.push_str(&exponent);
            }
            if text.starts_with('.') {
                text.insert(0, '0');
            }
            text.parse::<f64>()
                .map_err(|_| self.error_at(start, "Invalid or unexpected token"))?
        };

        match self.peek() {
            Some('n') => Err(self.error("BigInt literals are not supported")),
            Some(c) if is_identifier_start(c) || c.is_ascii_digit() => {
                Err(self.error("Invalid or unexpected token"))
            }
            _ => Ok(TokenKind::Number(value)),
        }
    }

    /// Digits of `radix` with `_` separators allowed between digits.
    fn digits(&mut self, radix: u32) -> LexResult<String> {
        let mut out = String::new();
        let mut last_was_separator = false;
        while let Some(ch) = self.peek() {
            if ch == '_' {
                if out.is_empty() || last_was_separator {
                    return Err(self.error("Numeric separators are not allowed here"));
                }
                last_was_separator = true;
                self.bump();
            } else if ch.is_digit(radix) {
                out.push(ch);
                last_was_separator = false;
                self.bump();
            } else {
                break;
            }
        }
        if last_was_separator {
            return Err(self.error("Numeric separators are not allowed at the end of numeric literals"));
        }
        Ok(out)
    }

    fn lex_string(&mut self, quote: char) -> LexResult<TokenKind> {
        let start = self.here();
        self.bump();
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error_at(start, "Invalid or unexpected token")),
                Some(ch) if ch == '\n' || ch == '\r' => {
                    return Err(self.error_at(start, "Invalid or unexpected token"));
                }
                Some(ch) if ch == quote => {
                    self.bump();
                    return Ok(TokenKind::String(value));
                }
                Some('\\') => {
                    self.bump();
                    self.escape(&mut value)?;
                }
                Some(ch) => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
    }

    fn lex_template(&mut self, start: Span, head: bool) -> LexResult<TokenKind> {
        let mut cooked = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error_at(start, "Unterminated template literal")),
                Some('`') => {
                    self.bump();
                    return Ok(TokenKind::Template {
                        cooked,
                        head,
                        tail: true,
                    });
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    self.bump();
                    self.bump();
                    self.template_braces.push(self.brace_depth);
                    return Ok(TokenKind::Template {
                        cooked,
                        head,
                        tail: false,
                    });
                }
                Some('\\') => {
                    self.bump();
                    self.escape(&mut cooked)?;
                }
                Some('\r') => {
                    self.bump();
                    cooked.push('\n');
                }
                Some(ch) => {
                    cooked.push(ch);
                    self.bump();
                }
            }
        }
    }

    /// Decode one escape sequence; the backslash is already consumed.
    fn escape(&mut self, out: &mut String) -> LexResult<()> {
        let Some(ch) = self.bump() else {
            return Err(self.error("Invalid or unexpected token"));
        };
        match ch {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'v' => out.push('\u{000B}'),
            '0' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
            '0'..='7' => {
                return Err(self.error("Octal escape sequences are not allowed in strict mode."));
            }
            '8' | '9' => {
                return Err(self.error("\\8 and \\9 are not allowed in strict mode."));
            }
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            'u' => {
                let code = self.unicode_escape()?;
                if (0xD800..0xDC00).contains(&code)
                    && self.peek() == Some('\\')
                    && self.peek_at(1) == Some('u')
                {
                    let checkpoint = (self.pos, self.line, self.column);
                    self.bump();
                    self.bump();
                    let low = self.unicode_escape()?;
                    if (0xDC00..0xE000).contains(&low) {
                        let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                        out.push(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                        return Ok(());
                    }
                    (self.pos, self.line, self.column) = checkpoint;
                }
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            c if is_line_terminator(c) => {}
            c => out.push(c),
        }
        Ok(())
    }

    fn unicode_escape(&mut self) -> LexResult<u32> {
        if self.peek() == Some('{') {
            self.bump();
            let mut code: u32 = 0;
            let mut any = false;
            while let Some(ch) = self.peek() {
                if ch == '}' {
                    break;
                }
                let digit = ch
                    .to_digit(16)
                    .ok_or_else(|| self.error("Invalid Unicode escape sequence"))?;
                code = code.saturating_mul(16).saturating_add(digit);
                any = true;
                self.bump();
            }
            if !any || self.peek() != Some('}') || code > 0x10FFFF {
                return Err(self.error("Invalid Unicode escape sequence"));
            }
            self.bump();
            Ok(code)
        } else {
            self.hex_digits(4)
                .map_err(|_| self.error("Invalid Unicode escape sequence"))
        }
    }

    fn hex_digits(&mut self, count: usize) -> LexResult<u32> {
        let mut code = 0;
        for _ in 0..count {
            let digit = self
                .peek()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("Invalid hexadecimal escape sequence"))?;
            code = code * 16 + digit;
            self.bump();
        }
        Ok(code)
    }
}

fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_identifier_start(ch: char) -> bool {
    ch == '$' || ch == '_' || ch.is_alphabetic()
}

fn is_identifier_part(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_alphanumeric() || ch == '\u{200C}' || ch == '\u{200D}'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn longest_punctuator_wins() {
        assert_eq!(
            kinds("a >>>= b ?? c?.d"),
            vec![
                TokenKind::Name("a".into()),
                TokenKind::Punct(">>>="),
                TokenKind::Name("b".into()),
                TokenKind::Punct("??"),
                TokenKind::Name("c".into()),
                TokenKind::Punct("?."),
                TokenKind::Name("d".into()),
            ]
        );
    }

    #[test]
    fn numbers_and_strings() {
        assert_eq!(
            kinds("0x1f 1_000 .5 2e3 'a\\n\\u{1F600}' \"\\uD83D\\uDE00\""),
            vec![
                TokenKind::Number(31.0),
                TokenKind::Number(1000.0),
                TokenKind::Number(0.5),
                TokenKind::Number(2000.0),
                TokenKind::String("a\n😀".into()),
                TokenKind::String("😀".into()),
            ]
        );
    }

    #[test]
    fn template_with_nested_braces() {
        let tokens = kinds("`a${ {x: 1}.x }b`");
        assert_eq!(
            tokens.first(),
            Some(&TokenKind::Template {
                cooked: "a".into(),
                head: true,
                tail: false
            })
        );
        assert_eq!(
            tokens.last(),
            Some(&TokenKind::Template {
                cooked: "b".into(),
                head: false,
                tail: true
            })
        );
    }

    #[test]
    fn positions_count_characters() {
        let mut lexer = Lexer::new("// é\n  ééé x");
        let first = lexer.next_token().unwrap();
        assert_eq!((first.span.line, first.span.column), (2, 3));
        assert!(first.newline_before);
        let second = lexer.next_token().unwrap();
        assert_eq!((second.span.line, second.span.column), (2, 7));
    }

    #[test]
    fn rejects_malformed_literals() {
        assert!(Lexer::new("'abc").next_token().is_err());
        assert!(Lexer::new("12abc").next_token().is_err());
        assert!(Lexer::new("10n").next_token().is_err());
        assert!(Lexer::new("1__0").next_token().is_err());
        assert!(Lexer::new("/* open").next_token().is_err());
    }
}
