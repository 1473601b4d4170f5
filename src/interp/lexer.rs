//! Tokenizer for the scripting subset

use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    String(String),
    Ident(String),
    Keyword(Keyword),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Var,
    Let,
    Const,
    Function,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Throw,
    True,
    False,
    Null,
    Typeof,
}

impl Keyword {
    fn from_ident(s: &str) -> Option<Self> {
        Some(match s {
            "var" => Self::Var,
            "let" => Self::Let,
            "const" => Self::Const,
            "function" => Self::Function,
            "return" => Self::Return,
            "if" => Self::If,
            "else" => Self::Else,
            "for" => Self::For,
            "while" => Self::While,
            "do" => Self::Do,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "throw" => Self::Throw,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            "typeof" => Self::Typeof,
            _ => return None,
        })
    }
}

/// A token with its byte range in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Longest punctuators first so that `===` wins over `==` and `=`
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "**", "=>", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=",
    "/=", "%=", "{", "}", "(", ")", "[", "]", ";", ",", ".", "?", ":", "<", ">", "+", "-", "*",
    "/", "%", "=", "!",
];

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Tokenize the whole input, ending with [`Token::Eof`]
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Spanned {
                    token: Token::Eof,
                    start,
                    end: start,
                });
                return Ok(tokens);
            };

            let token = if c.is_ascii_digit()
                || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()))
            {
                self.number()?
            } else if c == '"' || c == '\'' {
                self.string(c)?
            } else if c.is_alphabetic() || c == '_' || c == '$' {
                let ident = self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                match Keyword::from_ident(ident) {
                    Some(kw) => Token::Keyword(kw),
                    None => Token::Ident(ident.to_string()),
                }
            } else {
                self.punct()?
            };

            tokens.push(Spanned {
                token,
                start,
                end: self.pos,
            });
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            self.take_while(char::is_whitespace);
            let rest = &self.src[self.pos..];
            if rest.starts_with("//") {
                self.take_while(|c| c != '\n');
            } else if rest.starts_with("/*") {
                let start = self.pos;
                match rest[2..].find("*/") {
                    Some(idx) => self.pos += idx + 4,
                    None => {
                        return Err(ParseError::new(self.src, start, "Unterminated comment"));
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    fn number(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') {
            self.bump();
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let save = self.pos;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if self.take_while(|c| c.is_ascii_digit()).is_empty() {
                self.pos = save;
            }
        }
        let text = &self.src[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ParseError::new(self.src, start, format!("Invalid number '{text}'")))
    }

    fn string(&mut self, quote: char) -> Result<Token, ParseError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(ParseError::new(self.src, start, "Unterminated string literal"));
                }
                Some(c) if c == quote => return Ok(Token::String(out)),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some(other) => out.push(other),
                    None => {
                        return Err(ParseError::new(self.src, start, "Unterminated string literal"));
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn punct(&mut self) -> Result<Token, ParseError> {
        let rest = &self.src[self.pos..];
        match PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
            Some(p) => {
                self.pos += p.len();
                Ok(Token::Punct(p))
            }
            None => {
                let c = rest.chars().next().unwrap_or(' ');
                Err(ParseError::new(
                    self.src,
                    self.pos,
                    format!("Unexpected character '{c}'"),
                ))
            }
        }
    }
}
