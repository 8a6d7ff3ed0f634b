use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Position of a character in the input. Cloned as a snapshot by tokens,
/// AST nodes and diagnostics, because the live location of the source keeps
/// moving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub filename: Option<Rc<str>>,
}

impl Location {
    pub fn new(filename: Option<Rc<str>>) -> Self {
        Self {
            line: 1,
            column: 0,
            filename,
        }
    }

    pub fn at(line: usize, column: usize) -> Self {
        Self {
            line,
            column,
            filename: None,
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.filename {
            Some(name) => write!(f, "{}:{}:{}", name, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lexical,
    Syntactic,
    Semantic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("inconsistent line endings")]
    InconsistentLineEndings,
    #[error("token too long")]
    TokenTooLong,
    #[error("unknown character")]
    UnknownCharacter,
    #[error("unclosed string")]
    UnclosedString,
    #[error("constant too big")]
    ConstantTooBig,
    #[error("malformed number")]
    MalformedNumber,
    #[error("unexpected token")]
    UnexpectedToken,
    #[error("already declared")]
    AlreadyDeclared,
    #[error("undeclared variable")]
    UndeclaredVariable,
    #[error("uninitialized variable")]
    UninitializedVariable,
    #[error("division by zero")]
    DivisionByZero,
    #[error("unsupported operation")]
    UnsupportedOperation,
    #[error("unmatched arguments")]
    UnmatchedArguments,
    #[error("undefined symbol")]
    UndefinedSymbol,
    #[error("duplicate label")]
    DuplicateLabel,
    #[error("unsupported chaining")]
    UnsupportedChaining,
    #[error("recursion limit exceeded")]
    RecursionLimit,
    #[error("nesting too deep")]
    NestingTooDeep,
}

impl ErrorKind {
    pub fn stage(self) -> Stage {
        match self {
            ErrorKind::InconsistentLineEndings
            | ErrorKind::TokenTooLong
            | ErrorKind::UnknownCharacter
            | ErrorKind::UnclosedString
            | ErrorKind::ConstantTooBig
            | ErrorKind::MalformedNumber => Stage::Lexical,
            ErrorKind::UnexpectedToken
            | ErrorKind::AlreadyDeclared
            | ErrorKind::NestingTooDeep => Stage::Syntactic,
            ErrorKind::UndeclaredVariable
            | ErrorKind::UninitializedVariable
            | ErrorKind::DivisionByZero
            | ErrorKind::UnsupportedOperation
            | ErrorKind::UnmatchedArguments
            | ErrorKind::UndefinedSymbol
            | ErrorKind::DuplicateLabel
            | ErrorKind::UnsupportedChaining
            | ErrorKind::RecursionLimit => Stage::Semantic,
        }
    }
}

/// Fatal conditions. Everything else is recorded as a [`Diagnostic`].
#[derive(Debug, Error)]
pub enum KiwiError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot decode input: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub location: Location,
    pub source_line: String,
    pub fragment: Option<String>,
    pub explanation: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, location: Location, source_line: String) -> Self {
        Self {
            kind,
            location,
            source_line,
            fragment: None,
            explanation: None,
        }
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Marks the last occurrence of the fragment in the source line.
    pub fn underline(&self) -> Option<String> {
        let fragment = self.fragment.as_deref().filter(|f| !f.is_empty())?;
        let byte_start = self.source_line.rfind(fragment)?;
        let padding = self.source_line[..byte_start].chars().count();
        let width = fragment.chars().count();
        Some(format!("{}{}", " ".repeat(padding), "^".repeat(width)))
    }

    /// Prints a labelled report for this diagnostic. `source` must be the
    /// newline-normalized program text so that line and column map onto it.
    pub fn report(&self, source: &str, filename: Option<&str>) {
        let filename = filename.unwrap_or("<stdin>");

        let color = match self.kind.stage() {
            Stage::Lexical => Color::Red,
            Stage::Syntactic => Color::Yellow,
            Stage::Semantic => Color::Magenta,
        };

        let kind_str = match self.kind.stage() {
            Stage::Lexical => "Lexical Error",
            Stage::Syntactic => "Parse Error",
            Stage::Semantic => "Runtime Error",
        };

        let start = char_offset(source, &self.location);
        let width = self
            .fragment
            .as_deref()
            .map(|f| f.chars().count().max(1))
            .unwrap_or(1);

        let mut report_builder = Report::build(ReportKind::Error, filename, start)
            .with_message(format!("{}: {}", kind_str.fg(color), self.kind))
            .with_label(
                Label::new((filename, start..start + width))
                    .with_message(self.kind.to_string())
                    .with_color(color),
            );

        if let Some(ref help_text) = self.explanation {
            report_builder =
                report_builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
        }

        if let Err(error) = report_builder
            .finish()
            .eprint((filename, Source::from(source)))
        {
            tracing::warn!(%error, "failed to print diagnostic report");
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.kind)?;
        if let Some(explanation) = &self.explanation {
            write!(f, " ({})", explanation)?;
        }
        if !self.source_line.is_empty() {
            write!(f, "\n{}", self.source_line)?;
            if let Some(underline) = self.underline() {
                write!(f, "\n{}", underline)?;
            }
        }
        Ok(())
    }
}

fn char_offset(source: &str, location: &Location) -> usize {
    let mut offset = 0;
    for (index, line) in source.split('\n').enumerate() {
        if index + 1 == location.line {
            return offset + location.column.min(line.chars().count());
        }
        offset += line.chars().count() + 1;
    }
    source.chars().count()
}

/// Shared, append-only sink for the diagnostics of one run. Clones are
/// handles onto the same records.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    records: Rc<RefCell<Vec<Diagnostic>>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        tracing::debug!(
            kind = ?diagnostic.kind,
            location = %diagnostic.location,
            "diagnostic recorded"
        );
        self.records.borrow_mut().push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Records in the order they were reported.
    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.records.borrow().iter().map(|d| d.kind).collect()
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.records.borrow().iter().filter(|d| d.kind == kind).count()
    }

    /// Plain report, most recent record first.
    pub fn render(&self) -> String {
        let records = self.records.borrow();
        let mut out = format!("{} Errors, most recent errors first:\n", records.len());
        for diagnostic in records.iter().rev() {
            out.push_str(&diagnostic.to_string());
            out.push('\n');
        }
        out
    }

    pub fn report_pretty(&self, source: &str, filename: Option<&str>) {
        for diagnostic in self.records.borrow().iter().rev() {
            diagnostic.report(source, filename);
        }
    }
}
