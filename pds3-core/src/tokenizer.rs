//! Line tokenizer for ODL label text.
//!
//! This module turns physical label lines into logical statements. Quoted
//! strings and parenthesized sequences that span several physical lines are
//! reassembled here, so a [`Token::Pair`] always carries a complete value.

use std::io;

/// A logical statement of an ODL label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// An empty line.
    Blank,
    /// A line without `=`, such as `END`.
    Word(String),
    /// A complete `KEY = VALUE` statement with both sides trimmed.
    Pair(String, String),
    /// A line that could not be split into a single key and value.
    Malformed(String),
    /// A key whose value was expected on the next line, but input ended.
    DanglingKey(String),
}

/// Returns true for lines opening with a `/*` comment marker.
#[inline]
fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with("/*")
}

#[inline]
fn is_quote_start(value: &str) -> bool {
    value.starts_with('"')
}

// A lone `"` opens a string, it does not close one.
#[inline]
fn is_quote_end(value: &str) -> bool {
    value.len() > 1 && value.ends_with('"')
}

#[inline]
fn is_sequence_start(value: &str) -> bool {
    value.starts_with('(') || value.ends_with(',')
}

#[inline]
fn is_sequence_end(value: &str) -> bool {
    value.ends_with(')') || (value.ends_with(',') && !value.starts_with('('))
}

/// Lazy tokenizer over a sequence of text lines.
///
/// Each item is either a [`Token`] or the read error that cut the input
/// short. After a read error has been yielded the tokenizer is exhausted.
/// A value interrupted by end of input is emitted truncated; a value
/// interrupted by a read error is dropped and only the error is yielded.
#[derive(Debug)]
pub struct Tokenizer<I> {
    lines: I,
    line_number: usize,
    fault: Option<io::Error>,
    exhausted: bool,
}

impl<I> Tokenizer<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    /// Creates a tokenizer over `lines`.
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            line_number: 0,
            fault: None,
            exhausted: false,
        }
    }

    /// Number of physical lines consumed so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    fn next_line(&mut self) -> Option<String> {
        if self.exhausted {
            return None;
        }
        match self.lines.next() {
            Some(Ok(line)) => {
                self.line_number += 1;
                Some(line)
            }
            Some(Err(err)) => {
                self.fault = Some(err);
                self.exhausted = true;
                None
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }

    /// Next non-comment line, trimmed.
    fn next_content_line(&mut self) -> Option<String> {
        while let Some(line) = self.next_line() {
            if !is_comment(&line) {
                return Some(line.trim().to_owned());
            }
        }
        None
    }

    fn continue_quoted(&mut self, mut value: String) -> String {
        while !is_quote_end(&value) {
            match self.next_content_line() {
                Some(line) => {
                    value.push(' ');
                    value.push_str(&line);
                }
                None => break,
            }
        }
        value
    }

    fn continue_sequence(&mut self, mut value: String) -> String {
        while !is_sequence_end(&value) {
            match self.next_content_line() {
                Some(line) => value.push_str(&line),
                None => break,
            }
        }
        value
    }

    /// Builds the statement opened by `line`. `None` when a read fault
    /// interrupted the value, which is then never emitted.
    fn statement(&mut self, line: &str) -> Option<Token> {
        let line = line.trim();
        if line.is_empty() {
            return Some(Token::Blank);
        }
        let Some((key, value)) = line.split_once('=') else {
            return Some(Token::Word(line.to_owned()));
        };
        let key = key.trim().to_owned();
        let value = value.trim().to_owned();

        // Unquoted values may not carry another `=`.
        if key.is_empty() || (value.contains('=') && !is_quote_start(&value)) {
            return Some(Token::Malformed(line.to_owned()));
        }

        let token = if is_quote_start(&value) {
            let value = self.continue_quoted(value);
            Token::Pair(key, value)
        } else if is_sequence_start(&value) {
            let value = self.continue_sequence(value);
            Token::Pair(key, value)
        } else if value.is_empty() {
            match self.next_content_line() {
                Some(value) => Token::Pair(key, value),
                None => Token::DanglingKey(key),
            }
        } else {
            Token::Pair(key, value)
        };

        if self.fault.is_some() {
            return None;
        }
        Some(token)
    }
}

impl<I> Iterator for Tokenizer<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = io::Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(line) = self.next_line() else {
                return self.fault.take().map(Err);
            };
            if is_comment(&line) {
                continue;
            }
            if let Some(token) = self.statement(&line) {
                return Some(Ok(token));
            }
        }
    }
}
