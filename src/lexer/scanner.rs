use std::collections::HashMap;
use std::io::Write;

use once_cell::sync::Lazy;
use regex::Regex;

use super::token::{Token, TokenKind};
use crate::diagnostics::{render_illegal_char, Diagnostics, LexError};

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("if", TokenKind::If);
    m.insert("else", TokenKind::Else);
    m.insert("while", TokenKind::While);
    m.insert("break", TokenKind::Break);
    m.insert("continue", TokenKind::Continue);
    m.insert("define", TokenKind::Define);
    m.insert("auto", TokenKind::Auto);
    m.insert("return", TokenKind::Return);
    m.insert("halt", TokenKind::Halt);
    m
});

static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*").unwrap());
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[0-9]+\.[0-9]*|\.[0-9]+|[0-9]+)").unwrap());

/// Scans an entire source string into a token vector up front. The grammar
/// never needs more than the next token of lookahead, so there is no benefit
/// to a truly lazy iterator here, and a materialized `Vec` lets the parser
/// freely re-`peek`.
pub struct Scanner<'a> {
    source: &'a str,
    current: usize,
    line: usize,
    column: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source,
            current: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn scan_tokens<W: Write>(mut self, diagnostics: &mut Diagnostics<W>) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.is_at_end() {
                tokens.push(Token::new(TokenKind::Eof, "", self.line, self.column));
                break;
            }
            tokens.push(self.scan_one(diagnostics));
        }
        tokens
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => break,
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_one<W: Write>(&mut self, diagnostics: &mut Diagnostics<W>) -> Token {
        let line = self.line;
        let column = self.column;
        let c = self.peek().expect("scan_one called at end of input");

        if c == '\n' {
            self.advance();
            return Token::new(TokenKind::Newline, "\n", line, column);
        }
        if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            return self.number(line, column);
        }
        if c.is_ascii_lowercase() {
            return self.identifier(line, column);
        }

        self.advance();
        let two = |c2: char| self.peek() == Some(c2);
        macro_rules! tok {
            ($kind:expr, $lex:expr) => {
                Token::new($kind, $lex, line, column)
            };
        }
        match c {
            '(' => tok!(TokenKind::LParen, "("),
            ')' => tok!(TokenKind::RParen, ")"),
            '{' => tok!(TokenKind::LBrace, "{"),
            '}' => tok!(TokenKind::RBrace, "}"),
            ';' => tok!(TokenKind::Semicolon, ";"),
            ',' => tok!(TokenKind::Comma, ","),
            '+' => {
                if two('+') {
                    self.advance();
                    tok!(TokenKind::PlusPlus, "++")
                } else if two('=') {
                    self.advance();
                    tok!(TokenKind::PlusEq, "+=")
                } else {
                    tok!(TokenKind::Plus, "+")
                }
            }
            '-' => {
                if two('-') {
                    self.advance();
                    tok!(TokenKind::MinusMinus, "--")
                } else if two('=') {
                    self.advance();
                    tok!(TokenKind::MinusEq, "-=")
                } else {
                    tok!(TokenKind::Minus, "-")
                }
            }
            '*' => {
                if two('=') {
                    self.advance();
                    tok!(TokenKind::StarEq, "*=")
                } else {
                    tok!(TokenKind::Star, "*")
                }
            }
            '/' => {
                if two('=') {
                    self.advance();
                    tok!(TokenKind::SlashEq, "/=")
                } else {
                    tok!(TokenKind::Slash, "/")
                }
            }
            '%' => {
                if two('=') {
                    self.advance();
                    tok!(TokenKind::PercentEq, "%=")
                } else {
                    tok!(TokenKind::Percent, "%")
                }
            }
            '^' => {
                if two('=') {
                    self.advance();
                    tok!(TokenKind::CaretEq, "^=")
                } else {
                    tok!(TokenKind::Caret, "^")
                }
            }
            '=' => {
                if two('=') {
                    self.advance();
                    tok!(TokenKind::EqEq, "==")
                } else {
                    tok!(TokenKind::Assign, "=")
                }
            }
            '!' => {
                if two('=') {
                    self.advance();
                    tok!(TokenKind::Ne, "!=")
                } else {
                    tok!(TokenKind::Bang, "!")
                }
            }
            '<' => {
                if two('=') {
                    self.advance();
                    tok!(TokenKind::Le, "<=")
                } else {
                    tok!(TokenKind::Lt, "<")
                }
            }
            '>' => {
                if two('=') {
                    self.advance();
                    tok!(TokenKind::Ge, ">=")
                } else {
                    tok!(TokenKind::Gt, ">")
                }
            }
            '&' if two('&') => {
                self.advance();
                tok!(TokenKind::AndAnd, "&&")
            }
            '|' if two('|') => {
                self.advance();
                tok!(TokenKind::OrOr, "||")
            }
            other => {
                let rendered = render_illegal_char(other);
                diagnostics.report(LexError {
                    rendered: rendered.clone(),
                    line,
                    column,
                });
                Token::new(TokenKind::Illegal, other.to_string(), line, column)
            }
        }
    }

    fn number(&mut self, line: usize, column: usize) -> Token {
        let m = NUMBER_RE
            .find(&self.source[self.current..])
            .expect("number() called without a numeric lexeme at cursor");
        let text = m.as_str().to_string();
        for _ in text.chars() {
            self.advance();
        }
        Token::new(TokenKind::Number, text, line, column)
    }

    fn identifier(&mut self, line: usize, column: usize) -> Token {
        let m = IDENT_RE
            .find(&self.source[self.current..])
            .expect("identifier() called without an identifier lexeme at cursor");
        let text = m.as_str().to_string();
        for _ in text.chars() {
            self.advance();
        }
        let kind = KEYWORDS.get(text.as_str()).copied().unwrap_or(TokenKind::Ident);
        Token::new(kind, text, line, column)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.current..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.current..].chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.current += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(src: &str) -> Vec<Token> {
        let mut buf = Vec::new();
        let mut diag = Diagnostics::new(&mut buf);
        Scanner::new(src).scan_tokens(&mut diag)
    }

    #[test]
    fn scans_arithmetic_line() {
        let toks = scan("1+2*3\n");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::Star,
                TokenKind::Number,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn recognizes_keywords_and_identifiers() {
        let toks = scan("define f\n");
        assert_eq!(toks[0].kind, TokenKind::Define);
        assert_eq!(toks[1].kind, TokenKind::Ident);
        assert_eq!(toks[1].lexeme, "f");
    }

    #[test]
    fn skips_line_and_block_comments() {
        let toks = scan("1 # comment\n/* block\nspanning */2\n");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Number,
                TokenKind::Newline,
                TokenKind::Number,
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn compound_assignment_and_increment_operators() {
        let toks = scan("x += 1; x++; x--\n");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::PlusEq,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Ident,
                TokenKind::PlusPlus,
                TokenKind::Semicolon,
                TokenKind::Ident,
                TokenKind::MinusMinus,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn illegal_character_reports_and_emits_token() {
        let mut buf = Vec::new();
        let mut diag = Diagnostics::new(&mut buf);
        let toks = Scanner::new("1 @ 2\n").scan_tokens(&mut diag);
        assert_eq!(toks[1].kind, TokenKind::Illegal);
        let printed = String::from_utf8(buf).unwrap();
        assert_eq!(printed, "\nillegal character: @ at line 1 column 3\n");
    }

    #[test]
    fn tracks_line_and_column_across_newlines() {
        let toks = scan("1\nab\n");
        let ab = toks.iter().find(|t| t.lexeme == "ab").unwrap();
        assert_eq!(ab.line, 2);
        assert_eq!(ab.column, 1);
    }
}
