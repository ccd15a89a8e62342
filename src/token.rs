//! Tokenizing is the first step in handling a statement: a byte-by-byte
//! state machine turns the raw input string into tokens (symbols,
//! literals, identifiers, keywords), each tagged with its source line.
//!
//! Lines are counted per statement: a closing `;` bumps the line number
//! for whatever follows. On end of input the tokenizer succeeds only if
//! the last token was a `;`, so a caller feeding it partial input can
//! treat `UnendedStmt` as "send more".

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    // single-character symbols
    LeftParen,    // (
    RightParen,   // )
    Semicolon,    // ;
    Comma,        // ,
    Star,         // *
    Plus,         // +
    Minus,        // -
    Slash,        // /
    Equal,        // =
    Greater,      // >
    Less,         // <
    Bang,         // !
    Ampersand,    // &
    Pipe,         // |
    // two-character symbols
    EqualEqual,   // ==
    BangEqual,    // != and the <> spelling
    GreaterEqual, // >=
    LessEqual,    // <=
    AmpAmp,       // &&
    PipePipe,     // ||
    // literals
    String,     // inside double quotes
    Number,     // 1, 34, 3.14
    Identifier, // unquoted word that is not a keyword
    // keywords
    And,
    Or,
    Not,
    Let,
    Select,
    From,
    Where,
    Ya, // true
    Na, // false
}

/// One token: its text, the 1-based line it started on, and its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub lexeme: String,
    pub line: usize,
    pub kind: TokenType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input ran out before the closing `;`. The statement may simply be
    /// incomplete; a REPL can ask for more input.
    UnendedStmt,
    UnexpectedChar(char),
    MissingQuote,
    /// A token that cannot start the expected grammar production.
    UnexpectedToken,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::UnendedStmt => write!(f, "unended statement"),
            ParseErrorKind::UnexpectedChar(c) => write!(f, "unexpected character {c:?}"),
            ParseErrorKind::MissingQuote => write!(f, "missing closing quote"),
            ParseErrorKind::UnexpectedToken => write!(f, "unexpected token"),
        }
    }
}

/// A front-end failure, pinned to a (line, column) position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} at line {line}, column {col}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: usize,
    pub col: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, line: usize, col: usize) -> Self {
        Self { kind, line, col }
    }
}

/// Turns an input string into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(input).run()
}

fn keyword(lexeme: &str) -> Option<TokenType> {
    // case-sensitive on purpose
    match lexeme {
        "and" => Some(TokenType::And),
        "or" => Some(TokenType::Or),
        "not" => Some(TokenType::Not),
        "let" => Some(TokenType::Let),
        "select" => Some(TokenType::Select),
        "from" => Some(TokenType::From),
        "where" => Some(TokenType::Where),
        "ya" => Some(TokenType::Ya),
        "na" => Some(TokenType::Na),
        _ => None,
    }
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            src: input.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        self.col += 1;
        Some(byte)
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.line, self.col)
    }

    fn push_token(&mut self, kind: TokenType, lexeme: String) {
        self.tokens.push(Token {
            lexeme,
            line: self.line,
            kind,
        });
        if kind == TokenType::Semicolon {
            self.line += 1;
            self.col = 1;
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        loop {
            match self.peek() {
                None => {
                    return match self.tokens.last() {
                        Some(tok) if tok.kind == TokenType::Semicolon => Ok(self.tokens),
                        _ => Err(self.error(ParseErrorKind::UnendedStmt)),
                    };
                }
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(c) if c.is_ascii_alphabetic() => self.identifier(),
                Some(c) if c.is_ascii_digit() => self.number()?,
                Some(b'"') => self.string()?,
                Some(_) => self.symbol()?,
            }
        }
    }

    fn identifier(&mut self) {
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                lexeme.push(c as char);
                self.bump();
            } else {
                break;
            }
        }
        let kind = keyword(&lexeme).unwrap_or(TokenType::Identifier);
        self.push_token(kind, lexeme);
    }

    fn number(&mut self) -> Result<(), ParseError> {
        let mut lexeme = String::new();
        let mut seen_dot = false;
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_digit() => {
                    lexeme.push(c as char);
                    self.bump();
                }
                Some(b'.') => {
                    if seen_dot {
                        return Err(self.error(ParseErrorKind::UnexpectedChar('.')));
                    }
                    seen_dot = true;
                    lexeme.push('.');
                    self.bump();
                }
                // a letter glued onto a number is no identifier
                Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                    return Err(self.error(ParseErrorKind::UnexpectedChar(c as char)));
                }
                _ => break,
            }
        }
        self.push_token(TokenType::Number, lexeme);
        Ok(())
    }

    fn string(&mut self) -> Result<(), ParseError> {
        self.bump(); // the opening quote
        let mut lexeme = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error(ParseErrorKind::MissingQuote)),
                Some(b'"') => break,
                Some(c) => lexeme.push(c as char),
            }
        }
        self.push_token(TokenType::String, lexeme);
        Ok(())
    }

    fn symbol(&mut self) -> Result<(), ParseError> {
        let col = self.col;
        let Some(c) = self.bump() else {
            return Err(self.error(ParseErrorKind::UnendedStmt));
        };
        let (kind, lexeme) = match c {
            b'(' => (TokenType::LeftParen, "("),
            b')' => (TokenType::RightParen, ")"),
            b';' => (TokenType::Semicolon, ";"),
            b',' => (TokenType::Comma, ","),
            b'*' => (TokenType::Star, "*"),
            b'+' => (TokenType::Plus, "+"),
            b'-' => (TokenType::Minus, "-"),
            b'/' => (TokenType::Slash, "/"),
            b'=' => match self.peek() {
                Some(b'=') => {
                    self.bump();
                    (TokenType::EqualEqual, "==")
                }
                _ => (TokenType::Equal, "="),
            },
            b'!' => match self.peek() {
                Some(b'=') => {
                    self.bump();
                    (TokenType::BangEqual, "!=")
                }
                _ => (TokenType::Bang, "!"),
            },
            b'&' => match self.peek() {
                Some(b'&') => {
                    self.bump();
                    (TokenType::AmpAmp, "&&")
                }
                _ => (TokenType::Ampersand, "&"),
            },
            b'|' => match self.peek() {
                Some(b'|') => {
                    self.bump();
                    (TokenType::PipePipe, "||")
                }
                _ => (TokenType::Pipe, "|"),
            },
            b'<' => match self.peek() {
                Some(b'=') => {
                    self.bump();
                    (TokenType::LessEqual, "<=")
                }
                Some(b'>') => {
                    self.bump();
                    (TokenType::BangEqual, "<>")
                }
                _ => (TokenType::Less, "<"),
            },
            b'>' => match self.peek() {
                Some(b'=') => {
                    self.bump();
                    (TokenType::GreaterEqual, ">=")
                }
                _ => (TokenType::Greater, ">"),
            },
            other => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedChar(other as char),
                    self.line,
                    col,
                ));
            }
        };
        self.push_token(kind, lexeme.to_string());
        Ok(())
    }
}
