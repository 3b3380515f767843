//! Logical records and tokens of DBC text.

use std::io::{self, BufRead};
use std::str::FromStr;

use thiserror::Error;

use crate::error::CANConstructionError;

/// Why a single record could not be understood. Becomes the detail text of a
/// parse warning.
#[derive(Debug, Error)]
pub(crate) enum RecordError {
    #[error("unexpected end of record")]
    UnexpectedEnd,

    #[error("expected {0}, found `{1}`")]
    Unexpected(&'static str, String),

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("unterminated string")]
    UnterminatedString,

    #[error("trailing `{0}` after record")]
    Trailing(String),

    #[error("unknown node `{0}`")]
    UnknownNode(String),

    #[error("unknown signal `{1}` in message 0x{0:x}")]
    UnknownSignal(u32, String),

    #[error("unknown environment variable `{0}`")]
    UnknownEnvironmentVariable(String),

    #[error(transparent)]
    Construction(#[from] CANConstructionError),

    #[error("{0}")]
    Invalid(String),
}

/// One logical record: a physical line, extended over further lines while a
/// quoted string is open.
#[derive(Debug, PartialEq)]
pub(crate) struct Record {
    /// Line number the record starts on, from 1.
    pub line: usize,
    pub text: String,
}

impl Record {
    pub fn is_indented(&self) -> bool {
        self.text.starts_with([' ', '\t'])
    }
}

pub(crate) struct RecordReader<R> {
    inner: R,
    line: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            buf: Vec::new(),
        }
    }

    /// Read the next record. Bytes that are not UTF-8 are replaced rather than
    /// rejected; only the underlying reader can fail.
    pub fn next_record(&mut self) -> io::Result<Option<Record>> {
        let mut record: Option<Record> = None;
        let mut in_string = false;

        loop {
            self.buf.clear();
            if self.inner.read_until(b'\n', &mut self.buf)? == 0 {
                // EOF; an unterminated string is left to the tokenizer
                return Ok(record);
            }
            self.line += 1;

            let chunk = String::from_utf8_lossy(&self.buf);
            let chunk = chunk.strip_suffix('\n').unwrap_or(&chunk);
            let chunk = chunk.strip_suffix('\r').unwrap_or(chunk);

            in_string = scan_quotes(chunk, in_string);

            match &mut record {
                Some(r) => {
                    r.text.push('\n');
                    r.text.push_str(chunk);
                }
                None => {
                    record = Some(Record {
                        line: self.line,
                        text: chunk.into(),
                    })
                }
            }

            if !in_string {
                return Ok(record);
            }
        }
    }
}

/// Track whether a quoted string is still open at the end of `chunk`.
fn scan_quotes(chunk: &str, mut in_string: bool) -> bool {
    let mut escaped = false;

    for c in chunk.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            _ => {}
        }
    }

    in_string
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Word(String),
    Str(String),
    Punct(char),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Word(w) => w.clone(),
            Self::Str(s) => format!("\"{s}\""),
            Self::Punct(c) => c.to_string(),
        }
    }
}

const PUNCTUATION: &[char] = &[':', ';', ',', '|', '@', '(', ')', '[', ']'];

/// Split record text into tokens. Words run until whitespace, a quote or
/// punctuation, so `1+` and `-2.5e-3` stay whole.
pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, RecordError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if PUNCTUATION.contains(&c) {
            chars.next();
            tokens.push(Token::Punct(c));
        } else if c == '"' {
            chars.next();
            let mut s = String::new();
            loop {
                match chars.next() {
                    None => return Err(RecordError::UnterminatedString),
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some(e @ ('"' | '\\')) => s.push(e),
                        Some(other) => {
                            s.push('\\');
                            s.push(other);
                        }
                        None => return Err(RecordError::UnterminatedString),
                    },
                    Some(other) => s.push(other),
                }
            }
            tokens.push(Token::Str(s));
        } else {
            let mut w = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '"' || PUNCTUATION.contains(&c) {
                    break;
                }
                w.push(c);
                chars.next();
            }
            tokens.push(Token::Word(w));
        }
    }

    Ok(tokens)
}

/// Quote a string for DBC output.
pub(crate) fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Cursor over the tokens of one record.
pub(crate) struct Tokens {
    tokens: Vec<Token>,
    pos: usize,
}

impl Tokens {
    pub fn new(text: &str) -> Result<Self, RecordError> {
        Ok(Self {
            tokens: tokenize(text)?,
            pos: 0,
        })
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    /// Look `n` tokens past the next one.
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn advance(&mut self) -> Result<Token, RecordError> {
        let t = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(RecordError::UnexpectedEnd)?;
        self.pos += 1;

        Ok(t)
    }

    pub fn word(&mut self) -> Result<String, RecordError> {
        match self.advance()? {
            Token::Word(w) => Ok(w),
            other => Err(RecordError::Unexpected("a name", other.describe())),
        }
    }

    /// Consume the given keyword.
    pub fn keyword(&mut self, keyword: &'static str) -> Result<(), RecordError> {
        match self.advance()? {
            Token::Word(w) if w == keyword => Ok(()),
            other => Err(RecordError::Unexpected(keyword, other.describe())),
        }
    }

    pub fn string(&mut self) -> Result<String, RecordError> {
        match self.advance()? {
            Token::Str(s) => Ok(s),
            other => Err(RecordError::Unexpected("a quoted string", other.describe())),
        }
    }

    pub fn punct(&mut self, c: char) -> Result<(), RecordError> {
        match self.advance()? {
            Token::Punct(p) if p == c => Ok(()),
            other => Err(RecordError::Unexpected(
                match c {
                    ':' => "`:`",
                    ';' => "`;`",
                    ',' => "`,`",
                    '|' => "`|`",
                    '@' => "`@`",
                    '(' => "`(`",
                    ')' => "`)`",
                    '[' => "`[`",
                    ']' => "`]`",
                    _ => "punctuation",
                },
                other.describe(),
            )),
        }
    }

    /// Consume `c` if it is next.
    pub fn eat_punct(&mut self, c: char) -> bool {
        if self.peek() == Some(&Token::Punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn number<T: FromStr>(&mut self) -> Result<T, RecordError> {
        let w = self.word()?;
        w.parse().map_err(|_| RecordError::InvalidNumber(w))
    }

    /// An integer, also accepting integral floats like `3.0`.
    pub fn integer(&mut self) -> Result<i64, RecordError> {
        let w = self.word()?;
        if let Ok(i) = w.parse() {
            return Ok(i);
        }

        match w.parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
            _ => Err(RecordError::InvalidNumber(w)),
        }
    }

    /// Is the next token a word that parses as `T`?
    pub fn next_is<T: FromStr>(&self) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.parse::<T>().is_ok())
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// End of record: an optional `;` and nothing else.
    pub fn finish(&mut self) -> Result<(), RecordError> {
        self.eat_punct(';');

        match self.peek() {
            None => Ok(()),
            Some(t) => Err(RecordError::Trailing(t.describe())),
        }
    }
}
