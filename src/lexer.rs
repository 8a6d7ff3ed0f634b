use crate::error::{Diagnostic, Diagnostics, ErrorKind, Location};
use crate::source::CharSource;
use std::collections::HashMap;
use std::fmt;

/// Longest identifier, string, comment or fraction the lexer accumulates.
pub const MAX_TOKEN_LENGTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Punctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Semicolon,
    Dot,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    Assign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Arrow,

    // Literals
    Integer,
    Float,
    String,
    Identifier,

    // Keywords
    Var,
    If,
    Else,
    And,
    Or,
    While,
    For,
    Return,
    Switch,
    Def,
    Class,
    New,
    Not,
    In,

    // Special
    Comment,
    Eof,
    Unknown,
}

impl TokenKind {
    /// Source spelling of tokens that have a fixed one.
    pub fn symbol(self) -> Option<&'static str> {
        let symbol = match self {
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Bang => "!",
            TokenKind::Assign => "=",
            TokenKind::Equal => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Arrow => "->",
            TokenKind::Var => "var",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::Return => "return",
            TokenKind::Switch => "switch",
            TokenKind::Def => "def",
            TokenKind::Class => "class",
            TokenKind::New => "new",
            TokenKind::Not => "not",
            TokenKind::In => "in",
            TokenKind::Integer
            | TokenKind::Float
            | TokenKind::String
            | TokenKind::Identifier
            | TokenKind::Comment
            | TokenKind::Eof
            | TokenKind::Unknown => return None,
        };
        Some(symbol)
    }

    /// Human readable name used in parser explanations.
    pub fn describe(self) -> String {
        match self {
            TokenKind::Integer => "integer".to_string(),
            TokenKind::Float => "float".to_string(),
            TokenKind::String => "string".to_string(),
            TokenKind::Identifier => "identifier".to_string(),
            TokenKind::Comment => "comment".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::Unknown => "unknown character".to_string(),
            other => format!("'{}'", other.symbol().unwrap_or_default()),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Int(i32),
    Float(f32),
    Str(String),
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenValue::Int(n) => write!(f, "{}", n),
            TokenValue::Float(n) => write!(f, "{}", n),
            TokenValue::Str(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: Option<TokenValue>,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, location: Location) -> Self {
        Self {
            kind,
            value: None,
            location,
        }
    }

    pub fn with_value(kind: TokenKind, value: TokenValue, location: Location) -> Self {
        Self {
            kind,
            value: Some(value),
            location,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.value {
            Some(TokenValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// How the token most likely looked in the source; used to underline it.
    pub fn fragment(&self) -> String {
        match (&self.value, self.kind) {
            (Some(TokenValue::Str(s)), TokenKind::String) => s.clone(),
            (Some(value), _) => value.to_string(),
            (None, kind) => kind.symbol().unwrap_or_default().to_string(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.value {
            Some(value) => {
                let prefix = match value {
                    TokenValue::Int(_) => "Int",
                    TokenValue::Float(_) => "Float",
                    TokenValue::Str(_) => "String",
                };
                write!(f, "{}Token(type={}, value=[{}])", prefix, self.kind, value)
            }
            None => write!(f, "Token(type={})", self.kind),
        }
    }
}

pub struct Lexer {
    source: CharSource,
    diagnostics: Diagnostics,
    current: Option<Token>,
    finished: bool,
    keywords: HashMap<&'static str, TokenKind>,
}

impl Lexer {
    /// The lexer reports into the same sink as its source.
    pub fn new(source: CharSource) -> Self {
        let mut keywords = HashMap::new();
        keywords.insert("var", TokenKind::Var);
        keywords.insert("if", TokenKind::If);
        keywords.insert("else", TokenKind::Else);
        keywords.insert("and", TokenKind::And);
        keywords.insert("or", TokenKind::Or);
        keywords.insert("while", TokenKind::While);
        keywords.insert("for", TokenKind::For);
        keywords.insert("return", TokenKind::Return);
        keywords.insert("switch", TokenKind::Switch);
        keywords.insert("def", TokenKind::Def);
        keywords.insert("class", TokenKind::Class);
        keywords.insert("new", TokenKind::New);
        keywords.insert("not", TokenKind::Not);
        keywords.insert("in", TokenKind::In);

        Self {
            diagnostics: source.diagnostics().clone(),
            source,
            current: None,
            finished: false,
            keywords,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Scans and returns the next token. Returns `Eof` forever once the
    /// input is exhausted.
    pub fn next_token(&mut self) -> Token {
        let token = self.scan_token();
        tracing::trace!(%token, "scanned");
        self.current = Some(token.clone());
        token
    }

    /// The last token produced by [`Lexer::next_token`].
    pub fn current_token(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    pub fn recent_line(&self) -> String {
        self.source.recent_line()
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace();

        let location = self.source.location();
        let Some(c) = self.source.current() else {
            return Token::new(TokenKind::Eof, location);
        };

        if let Some(token) = self.operator(c, &location) {
            return token;
        }
        if c.is_ascii_digit() {
            return self.number(location);
        }
        if c == '"' || c == '\'' {
            return self.string(c, location);
        }
        if is_identifier_start(c) {
            return self.identifier(location);
        }

        self.report(ErrorKind::UnknownCharacter, location.clone(), Some(c.to_string()), None);
        self.source.advance();
        Token::with_value(TokenKind::Unknown, TokenValue::Str(c.to_string()), location)
    }

    fn skip_whitespace(&mut self) {
        while self.source.current().is_some_and(char::is_whitespace) {
            self.source.advance();
        }
    }

    fn operator(&mut self, c: char, location: &Location) -> Option<Token> {
        let single = match c {
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            '{' => Some(TokenKind::LeftBrace),
            '}' => Some(TokenKind::RightBrace),
            '[' => Some(TokenKind::LeftBracket),
            ']' => Some(TokenKind::RightBracket),
            ',' => Some(TokenKind::Comma),
            ';' => Some(TokenKind::Semicolon),
            '.' => Some(TokenKind::Dot),
            '+' => Some(TokenKind::Plus),
            '*' => Some(TokenKind::Star),
            _ => None,
        };
        if let Some(kind) = single {
            self.source.advance();
            return Some(Token::new(kind, location.clone()));
        }

        let (short, long, second) = match c {
            '<' => (TokenKind::Less, TokenKind::LessEqual, '='),
            '>' => (TokenKind::Greater, TokenKind::GreaterEqual, '='),
            '=' => (TokenKind::Assign, TokenKind::Equal, '='),
            '!' => (TokenKind::Bang, TokenKind::NotEqual, '='),
            '-' => (TokenKind::Minus, TokenKind::Arrow, '>'),
            '/' => return Some(self.slash(location.clone())),
            _ => return None,
        };

        // The peeked character stays current unless it completes the operator.
        let kind = if self.source.advance() == Some(second) {
            self.source.advance();
            long
        } else {
            short
        };
        Some(Token::new(kind, location.clone()))
    }

    fn slash(&mut self, location: Location) -> Token {
        if self.source.advance() != Some('/') {
            return Token::new(TokenKind::Slash, location);
        }

        let mut text = String::new();
        let mut length = 0;
        while let Some(c) = self.source.advance() {
            if c == '\n' {
                break;
            }
            if length == MAX_TOKEN_LENGTH {
                self.report_too_long(location.clone(), &text);
                self.skip_while(|c| c != '\n');
                break;
            }
            text.push(c);
            length += 1;
        }
        Token::with_value(TokenKind::Comment, TokenValue::Str(text), location)
    }

    fn number(&mut self, location: Location) -> Token {
        let mut digits = String::new();
        let mut integer: i32 = 0;

        if self.source.current() == Some('0') {
            digits.push('0');
            self.source.advance();
        } else {
            while let Some(c) = self.source.current().filter(char::is_ascii_digit) {
                digits.push(c);
                if !accumulate(&mut integer, c) {
                    self.report(ErrorKind::ConstantTooBig, location.clone(), Some(digits.clone()), None);
                    self.skip_while(|c| c.is_ascii_digit());
                    break;
                }
                self.source.advance();
            }
        }

        if self.source.current() != Some('.') {
            return Token::with_value(TokenKind::Integer, TokenValue::Int(integer), location);
        }
        digits.push('.');

        if !self.source.advance().is_some_and(|c| c.is_ascii_digit()) {
            self.report(
                ErrorKind::MalformedNumber,
                location.clone(),
                Some(digits),
                Some("expected a digit after the decimal point".to_string()),
            );
            return Token::with_value(TokenKind::Float, TokenValue::Float(integer as f32), location);
        }

        let mut fraction: i32 = 0;
        let mut decimals: i32 = 0;
        while let Some(c) = self.source.current().filter(char::is_ascii_digit) {
            digits.push(c);
            if decimals as usize == MAX_TOKEN_LENGTH {
                self.report_too_long(location.clone(), &digits);
                self.skip_while(|c| c.is_ascii_digit());
                break;
            }
            if !accumulate(&mut fraction, c) {
                self.report(ErrorKind::ConstantTooBig, location.clone(), Some(digits.clone()), None);
                self.skip_while(|c| c.is_ascii_digit());
                break;
            }
            decimals += 1;
            self.source.advance();
        }

        let value = integer as f32 + fraction as f32 * 10f32.powi(-decimals);
        Token::with_value(TokenKind::Float, TokenValue::Float(value), location)
    }

    fn string(&mut self, delimiter: char, location: Location) -> Token {
        let mut raw = String::new();
        let mut length = 0;
        self.source.advance();

        loop {
            match self.source.current() {
                None | Some('\n') => {
                    self.report(
                        ErrorKind::UnclosedString,
                        location.clone(),
                        Some(format!("{}{}", delimiter, raw)),
                        Some(format!("missing closing {}", delimiter)),
                    );
                    break;
                }
                Some(c) if c == delimiter => {
                    self.source.advance();
                    break;
                }
                Some('\\') => {
                    raw.push('\\');
                    if let Some(escaped) = self.source.advance().filter(|&c| c != '\n') {
                        raw.push(escaped);
                        self.source.advance();
                    }
                }
                Some(c) => {
                    raw.push(c);
                    self.source.advance();
                }
            }

            length += 1;
            if length == MAX_TOKEN_LENGTH {
                self.report_too_long(location.clone(), &raw);
                self.skip_string_rest(delimiter);
                break;
            }
        }

        Token::with_value(TokenKind::String, TokenValue::Str(unescape(&raw)), location)
    }

    fn skip_string_rest(&mut self, delimiter: char) {
        while let Some(c) = self.source.current() {
            match c {
                '\n' => return,
                '\\' => {
                    if self.source.advance().is_some_and(|c| c != '\n') {
                        self.source.advance();
                    }
                }
                c if c == delimiter => {
                    self.source.advance();
                    return;
                }
                _ => {
                    self.source.advance();
                }
            }
        }
    }

    fn identifier(&mut self, location: Location) -> Token {
        let mut text = String::new();
        let mut length = 0;

        while let Some(c) = self.source.current().filter(|&c| is_identifier_continue(c)) {
            if length == MAX_TOKEN_LENGTH {
                self.report_too_long(location.clone(), &text);
                self.skip_while(is_identifier_continue);
                break;
            }
            text.push(c);
            length += 1;
            self.source.advance();
        }

        match self.keywords.get(text.as_str()) {
            Some(&kind) => Token::new(kind, location),
            None => Token::with_value(TokenKind::Identifier, TokenValue::Str(text), location),
        }
    }

    fn skip_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.source.current().is_some_and(&predicate) {
            self.source.advance();
        }
    }

    fn report_too_long(&self, location: Location, text: &str) {
        self.report(
            ErrorKind::TokenTooLong,
            location,
            Some(text.chars().take(16).collect()),
            Some(format!("tokens are limited to {} characters", MAX_TOKEN_LENGTH)),
        );
    }

    fn report(
        &self,
        kind: ErrorKind,
        location: Location,
        fragment: Option<String>,
        explanation: Option<String>,
    ) {
        let mut diagnostic = Diagnostic::new(kind, location, self.source.recent_line());
        diagnostic.fragment = fragment;
        diagnostic.explanation = explanation;
        self.diagnostics.report(diagnostic);
    }
}

impl Iterator for Lexer {
    type Item = Token;

    /// Yields every token including the first `Eof`, then stops.
    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        self.finished = token.kind == TokenKind::Eof;
        Some(token)
    }
}

/// Appends `digit` to `value` unless that would overflow `i32`.
fn accumulate(value: &mut i32, digit: char) -> bool {
    let Some(digit) = digit.to_digit(10).map(|d| d as i32) else {
        return false;
    };
    if *value > (i32::MAX - digit) / 10 {
        return false;
    }
    *value = *value * 10 + digit;
    true
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || is_emoji(c)
}

fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || is_emoji(c)
}

fn is_emoji(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F000..=0x1FAFF   // pictographs, emoticons, transport, supplemental symbols
            | 0x2600..=0x27BF   // miscellaneous symbols and dingbats
            | 0x2300..=0x23FF   // technical (watch, hourglass)
            | 0x2B00..=0x2BFF   // arrows, stars
            | 0x200D            // zero width joiner
            | 0xFE0F            // variation selector
            | 0xE0020..=0xE007F // tag sequences
    )
}
