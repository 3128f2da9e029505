//! Streaming label builder.
//!
//! Consumes the [`Tokenizer`] output, tracks the `GROUP`/`OBJECT` scope
//! stack and accumulates the flattened [`Label`]. Anomalies are logged and
//! recorded as [`Diagnostic`]s; they never stop the pass. A read fault, as
//! raised when an embedded label runs into binary pixel data, ends the pass
//! early and the label gathered so far is still returned.

use crate::label::{Label, LabelError};
use crate::tokenizer::{Token, Tokenizer};
use log::{debug, trace, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::ops::ControlFlow;
use std::path::Path;

/// Separator between scope names and the terminal key in a key path.
pub const PATH_SEPARATOR: &str = "/";

/// First statements accepted in strict-header mode.
const ACCEPTED_HEADERS: [(&str, &str); 2] = [("PDS_VERSION_ID", "PDS3"), ("ODL_VERSION_ID", "ODL3")];

/// Options controlling a parsing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Remove every `"` from stored values
    pub strip_quotes: bool,
    /// Reject input whose first statement is not a PDS3/ODL3 version marker
    pub strict_header: bool,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strip_quotes(mut self, enabled: bool) -> Self {
        self.strip_quotes = enabled;
        self
    }

    pub fn strict_header(mut self, enabled: bool) -> Self {
        self.strict_header = enabled;
        self
    }
}

/// Kind of anomaly found while building a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A line that is neither a statement nor a known keyword.
    UnparsedLine(String),
    /// A key with no value before end of input; the key was dropped.
    DanglingKey(String),
    /// `END_GROUP`/`END_OBJECT` with no open scope.
    UnmatchedClose(String),
    /// A close naming a different scope than the one it closed.
    MismatchedClose { open: String, close: String },
    /// `END` while scopes were still open; parsing continued.
    UnexpectedEnd { open: Vec<String> },
    /// Scopes still open when input ran out.
    UnclosedScope(Vec<String>),
    /// Input could not be read past this point.
    ReadFault(String),
}

/// An anomaly with the physical line number where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            DiagnosticKind::UnparsedLine(text) => write!(f, "unparsed line {text:?}"),
            DiagnosticKind::DanglingKey(key) => write!(f, "no value for key {key}"),
            DiagnosticKind::UnmatchedClose(name) => write!(f, "close of {name} with no open scope"),
            DiagnosticKind::MismatchedClose { open, close } => {
                write!(f, "close of {close} while {open} is open")
            }
            DiagnosticKind::UnexpectedEnd { open } => {
                write!(f, "END inside open scope {}", open.join(PATH_SEPARATOR))
            }
            DiagnosticKind::UnclosedScope(open) => {
                write!(f, "unclosed scope {}", open.join(PATH_SEPARATOR))
            }
            DiagnosticKind::ReadFault(reason) => write!(f, "read stopped: {reason}"),
        }
    }
}

/// Accumulates entries for one pass.
#[derive(Debug)]
struct LabelBuilder {
    strip_quotes: bool,
    entries: BTreeMap<String, String>,
    scope: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    partial: bool,
}

impl LabelBuilder {
    fn new(options: ParseOptions) -> Self {
        Self {
            strip_quotes: options.strip_quotes,
            entries: BTreeMap::new(),
            scope: Vec::new(),
            diagnostics: Vec::new(),
            partial: false,
        }
    }

    fn diagnose(&mut self, line: usize, kind: DiagnosticKind) {
        let diagnostic = Diagnostic { line, kind };
        warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    fn key_path(&self, key: &str) -> String {
        if self.scope.is_empty() {
            key.to_owned()
        } else {
            format!("{}{PATH_SEPARATOR}{key}", self.scope.join(PATH_SEPARATOR))
        }
    }

    /// Applies one token. `Break` means the terminal `END` was accepted.
    fn push(&mut self, line: usize, token: Token) -> ControlFlow<()> {
        match token {
            Token::Blank => {}
            Token::Word(word) => {
                if word == "END" {
                    if self.scope.is_empty() {
                        return ControlFlow::Break(());
                    }
                    let open = self.scope.clone();
                    self.diagnose(line, DiagnosticKind::UnexpectedEnd { open });
                } else {
                    self.diagnose(line, DiagnosticKind::UnparsedLine(word));
                }
            }
            Token::Malformed(text) => self.diagnose(line, DiagnosticKind::UnparsedLine(text)),
            Token::DanglingKey(key) => self.diagnose(line, DiagnosticKind::DanglingKey(key)),
            Token::Pair(key, value) => self.pair(line, key, value),
        }
        ControlFlow::Continue(())
    }

    fn pair(&mut self, line: usize, key: String, value: String) {
        let value = if self.strip_quotes {
            value.replace('"', "")
        } else {
            value
        };

        match key.as_str() {
            "GROUP" | "OBJECT" => {
                trace!("line {line}: open {key} {value}");
                self.scope.push(value);
            }
            // A mismatched close still pops.
            "END_GROUP" | "END_OBJECT" => match self.scope.pop() {
                Some(open) if open != value => {
                    self.diagnose(line, DiagnosticKind::MismatchedClose { open, close: value })
                }
                Some(_) => trace!("line {line}: close {key} {value}"),
                None => self.diagnose(line, DiagnosticKind::UnmatchedClose(value)),
            },
            _ => {
                let path = self.key_path(&key);
                if let Some(previous) = self.entries.insert(path, value) {
                    debug!("line {line}: {key} overwrites previous value {previous:?}");
                }
            }
        }
    }

    fn read_fault(&mut self, line: usize, err: &io::Error) {
        self.partial = true;
        self.diagnose(line, DiagnosticKind::ReadFault(err.to_string()));
    }

    fn finish(mut self, line: usize) -> Label {
        if !self.scope.is_empty() {
            let open = std::mem::take(&mut self.scope);
            self.diagnose(line, DiagnosticKind::UnclosedScope(open));
        }
        Label::from_parts(self.entries, self.diagnostics, self.partial)
    }
}

/// ODL label parser.
///
/// The parser holds only its options; every call produces an independent
/// [`Label`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelParser {
    options: ParseOptions,
}

impl LabelParser {
    /// Creates a parser with default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    /// Parses a sequence of lines.
    ///
    /// Fails only in strict-header mode, when the first statement is not an
    /// accepted version marker. Read errors end the pass and yield a partial
    /// label.
    pub fn parse_lines<I>(&self, lines: I) -> Result<Label, LabelError>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let mut tokens = Tokenizer::new(lines.into_iter());
        let mut builder = LabelBuilder::new(self.options);

        if self.options.strict_header {
            check_header(&mut tokens, &mut builder)?;
        }

        while let Some(item) = tokens.next() {
            let line = tokens.line_number();
            match item {
                Ok(token) => {
                    if builder.push(line, token).is_break() {
                        trace!("line {line}: END");
                        break;
                    }
                }
                Err(err) => {
                    builder.read_fault(line, &err);
                    break;
                }
            }
        }

        Ok(builder.finish(tokens.line_number()))
    }

    /// Parses label text held in memory.
    pub fn parse_str(&self, text: &str) -> Result<Label, LabelError> {
        self.parse_lines(text.lines().map(|line| Ok(line.to_owned())))
    }

    /// Parses a label from a buffered reader.
    ///
    /// Reading stops at the terminal `END`, so the reader is left inside,
    /// or just past, the label.
    pub fn parse_reader<R: BufRead>(&self, reader: R) -> Result<Label, LabelError> {
        self.parse_lines(reader.lines())
    }

    /// Parses the label at the start of the file at `path`.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Label, LabelError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => LabelError::NotFound(path.to_path_buf()),
            _ => LabelError::Io(err),
        })?;
        self.parse_reader(BufReader::new(file))
    }
}

/// Consumes the first statement and checks it against the accepted markers.
fn check_header<I>(tokens: &mut Tokenizer<I>, builder: &mut LabelBuilder) -> Result<(), LabelError>
where
    I: Iterator<Item = io::Result<String>>,
{
    let mut first = tokens.next();
    while let Some(Ok(Token::Blank)) = first {
        first = tokens.next();
    }

    let found = match first {
        Some(Ok(Token::Pair(key, value))) => {
            let accepted = ACCEPTED_HEADERS
                .iter()
                .any(|(marker, version)| key == *marker && value.trim_matches('"') == *version);
            if accepted {
                builder.pair(tokens.line_number(), key, value);
                return Ok(());
            }
            Some(format!("{key} = {value}"))
        }
        Some(Ok(Token::Word(text) | Token::Malformed(text) | Token::DanglingKey(text))) => {
            Some(text)
        }
        Some(Ok(Token::Blank)) | Some(Err(_)) | None => None,
    };
    warn!("rejecting label without a version header");
    Err(LabelError::HeaderRejected { found })
}
