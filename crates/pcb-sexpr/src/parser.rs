use std::fmt;

use crate::Sexpr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedEof,
    UnexpectedCloseParen,
    UnclosedList,
    UnterminatedString,
    TrailingInput,
}

/// Parse failure with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            ParseErrorKind::UnexpectedEof => "unexpected end of input",
            ParseErrorKind::UnexpectedCloseParen => "unexpected ')'",
            ParseErrorKind::UnclosedList => "unclosed list",
            ParseErrorKind::UnterminatedString => "unterminated string",
            ParseErrorKind::TrailingInput => "unexpected input after top-level expression",
        };
        write!(f, "{what} at byte {}", self.offset)
    }
}

impl std::error::Error for ParseError {}

/// Parse exactly one expression; anything but trivia after it is an error.
pub fn parse(input: &str) -> Result<Sexpr, ParseError> {
    log::trace!("parsing {} bytes of s-expression text", input.len());
    let mut reader = Reader::new(input);
    let value = reader.value()?;
    reader.skip_trivia();
    if reader.pos < reader.bytes.len() {
        return Err(reader.error(ParseErrorKind::TrailingInput, reader.pos));
    }
    Ok(value)
}

/// Parse a sequence of top-level expressions.
pub fn parse_all(input: &str) -> Result<Vec<Sexpr>, ParseError> {
    let mut reader = Reader::new(input);
    let mut out = Vec::new();
    loop {
        reader.skip_trivia();
        if reader.pos >= reader.bytes.len() {
            return Ok(out);
        }
        out.push(reader.value()?);
    }
}

struct Reader<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, kind: ParseErrorKind, offset: usize) -> ParseError {
        ParseError { kind, offset }
    }

    fn skip_trivia(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else if b == b';' {
                while let Some(&c) = self.bytes.get(self.pos) {
                    self.pos += 1;
                    if c == b'\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn value(&mut self) -> Result<Sexpr, ParseError> {
        self.skip_trivia();
        match self.bytes.get(self.pos) {
            None => Err(self.error(ParseErrorKind::UnexpectedEof, self.pos)),
            Some(b'(') => self.list(),
            Some(b')') => Err(self.error(ParseErrorKind::UnexpectedCloseParen, self.pos)),
            Some(b'"') => self.string(),
            Some(_) => Ok(self.atom()),
        }
    }

    fn list(&mut self) -> Result<Sexpr, ParseError> {
        let open = self.pos;
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.bytes.get(self.pos) {
                None => return Err(self.error(ParseErrorKind::UnclosedList, open)),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Sexpr::List(items));
                }
                Some(_) => items.push(self.value()?),
            }
        }
    }

    fn string(&mut self) -> Result<Sexpr, ParseError> {
        let open = self.pos;
        self.pos += 1;
        let mut out = String::new();
        let src = self.src;
        let mut chars = src[self.pos..].chars();
        loop {
            let Some(ch) = chars.next() else {
                return Err(self.error(ParseErrorKind::UnterminatedString, open));
            };
            self.pos += ch.len_utf8();
            match ch {
                '"' => return Ok(Sexpr::String(out)),
                '\\' => {
                    let Some(escaped) = chars.next() else {
                        return Err(self.error(ParseErrorKind::UnterminatedString, open));
                    };
                    self.pos += escaped.len_utf8();
                    out.push(match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => other,
                    });
                }
                other => out.push(other),
            }
        }
    }

    fn atom(&mut self) -> Sexpr {
        let start = self.pos;
        while let Some(&b) = self.bytes.get(self.pos) {
            if b.is_ascii_whitespace() || b == b'(' || b == b')' || b == b'"' {
                break;
            }
            self.pos += 1;
        }
        classify(&self.src[start..self.pos])
    }
}

fn classify(text: &str) -> Sexpr {
    if looks_numeric(text) {
        if let Ok(n) = text.parse::<i64>() {
            return Sexpr::Int(n);
        }
        if let Ok(f) = text.parse::<f64>() {
            return Sexpr::Float(f);
        }
    }
    Sexpr::Symbol(text.to_string())
}

// Keeps tokens like `nan` or `inf` as symbols.
fn looks_numeric(text: &str) -> bool {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    let unsigned = unsigned.strip_prefix('.').unwrap_or(unsigned);
    unsigned.bytes().next().is_some_and(|b| b.is_ascii_digit())
}
