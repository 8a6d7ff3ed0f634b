use crate::error::{Diagnostic, Diagnostics, ErrorKind, KiwiError, Location};
use std::collections::VecDeque;
use std::rc::Rc;

/// Upper bound on the characters kept for the diagnostic line snapshot.
pub const MAX_LINE_SNAPSHOT: usize = 256;

const CR: u16 = 0x0D;
const LF: u16 = 0x0A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewlineStyle {
    Lf,
    Cr,
    CrLf,
    LfCr,
}

impl NewlineStyle {
    fn spelling(self) -> &'static str {
        match self {
            NewlineStyle::Lf => "\\n",
            NewlineStyle::Cr => "\\r",
            NewlineStyle::CrLf => "\\r\\n",
            NewlineStyle::LfCr => "\\n\\r",
        }
    }
}

/// Turns a stream of UTF-16 code units into logical characters.
///
/// Surrogate pairs become one scalar value and every newline spelling becomes
/// a single `'\n'`. The source tracks the location of its current character
/// and keeps a bounded snapshot of the current line for diagnostics.
pub struct CharSource {
    units: Box<dyn Iterator<Item = u16>>,
    lookahead: Option<u16>,
    current: Option<char>,
    started: bool,
    location: Location,
    next_location: Location,
    newline_style: Option<NewlineStyle>,
    line: VecDeque<char>,
    clear_line: bool,
    diagnostics: Diagnostics,
}

impl CharSource {
    pub fn new(text: &str, filename: Option<&str>) -> Self {
        let units: Vec<u16> = text.encode_utf16().collect();
        Self::from_units(units, filename)
    }

    pub fn from_units(units: Vec<u16>, filename: Option<&str>) -> Self {
        let start = Location::new(filename.map(Rc::from));
        Self {
            units: Box::new(units.into_iter()),
            lookahead: None,
            current: None,
            started: false,
            location: start.clone(),
            next_location: start,
            newline_style: None,
            line: VecDeque::new(),
            clear_line: false,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The character under the cursor, `None` at end of input.
    pub fn current(&mut self) -> Option<char> {
        self.start();
        self.current
    }

    /// Moves to the next character and returns it.
    pub fn advance(&mut self) -> Option<char> {
        self.start();
        self.current = self.fetch();
        self.current
    }

    pub fn is_at_end(&mut self) -> bool {
        self.current().is_none()
    }

    /// Location of the current character (or of the end of input).
    pub fn location(&mut self) -> Location {
        self.start();
        self.location.clone()
    }

    /// The current line as read so far, bounded to [`MAX_LINE_SNAPSHOT`].
    pub fn recent_line(&self) -> String {
        self.line.iter().collect()
    }

    fn start(&mut self) {
        if !self.started {
            self.started = true;
            self.current = self.fetch();
        }
    }

    fn next_unit(&mut self) -> Option<u16> {
        self.lookahead.take().or_else(|| self.units.next())
    }

    /// Consumes the next unit only if it equals `expected`.
    fn next_unit_if(&mut self, expected: u16) -> bool {
        match self.next_unit() {
            Some(unit) if unit == expected => true,
            other => {
                self.lookahead = other;
                false
            }
        }
    }

    fn fetch(&mut self) -> Option<char> {
        if self.clear_line {
            self.line.clear();
            self.clear_line = false;
        }

        loop {
            let Some(unit) = self.next_unit() else {
                self.location = self.next_location.clone();
                return None;
            };
            let location = self.next_location.clone();

            let c = match unit {
                0xD800..=0xDBFF => match self.next_unit() {
                    Some(low @ 0xDC00..=0xDFFF) => {
                        let scalar = 0x10000
                            + ((u32::from(unit) - 0xD800) << 10)
                            + (u32::from(low) - 0xDC00);
                        char::from_u32(scalar).unwrap_or(char::REPLACEMENT_CHARACTER)
                    }
                    other => {
                        self.lookahead = other;
                        self.report_unpaired(unit, location);
                        continue;
                    }
                },
                0xDC00..=0xDFFF => {
                    self.report_unpaired(unit, location);
                    continue;
                }
                CR => {
                    let style = if self.next_unit_if(LF) {
                        NewlineStyle::CrLf
                    } else {
                        NewlineStyle::Cr
                    };
                    self.note_newline(style, &location);
                    '\n'
                }
                LF => {
                    let style = if self.next_unit_if(CR) {
                        NewlineStyle::LfCr
                    } else {
                        NewlineStyle::Lf
                    };
                    self.note_newline(style, &location);
                    '\n'
                }
                unit => char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER),
            };

            if c == '\n' {
                self.next_location.line += 1;
                self.next_location.column = 0;
                self.clear_line = true;
            } else {
                self.next_location.column += 1;
                if self.line.len() == MAX_LINE_SNAPSHOT {
                    self.line.pop_front();
                }
                self.line.push_back(c);
            }
            self.location = location;
            return Some(c);
        }
    }

    fn note_newline(&mut self, style: NewlineStyle, location: &Location) {
        match self.newline_style {
            None => self.newline_style = Some(style),
            Some(previous) if previous != style => {
                self.newline_style = Some(style);
                self.diagnostics.report(
                    Diagnostic::new(
                        ErrorKind::InconsistentLineEndings,
                        location.clone(),
                        self.recent_line(),
                    )
                    .with_explanation(format!(
                        "expected {}, found {}",
                        previous.spelling(),
                        style.spelling()
                    )),
                );
            }
            Some(_) => {}
        }
    }

    fn report_unpaired(&mut self, unit: u16, location: Location) {
        self.diagnostics.report(
            Diagnostic::new(ErrorKind::UnknownCharacter, location, self.recent_line())
                .with_explanation(format!("unpaired surrogate 0x{:04X} dropped", unit)),
        );
    }
}

/// Decodes raw input bytes into the UTF-16 code units `CharSource` reads.
/// Input marked with a UTF-16 byte order mark is passed through unit by
/// unit, so unpaired surrogates reach the source and are reported there.
/// Everything else must be UTF-8.
pub fn decode(bytes: Vec<u8>) -> Result<Vec<u16>, KiwiError> {
    match bytes.as_slice() {
        [0xFF, 0xFE, rest @ ..] => utf16_units(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => utf16_units(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => utf8_units(rest.to_vec()),
        _ => utf8_units(bytes),
    }
}

fn utf8_units(bytes: Vec<u8>) -> Result<Vec<u16>, KiwiError> {
    let text = String::from_utf8(bytes).map_err(|e| KiwiError::Encoding(e.to_string()))?;
    Ok(text.encode_utf16().collect())
}

fn utf16_units(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<Vec<u16>, KiwiError> {
    if bytes.len() % 2 != 0 {
        return Err(KiwiError::Encoding(
            "UTF-16 input has an odd number of bytes".to_string(),
        ));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect())
}

/// Text as the lexer sees it: every newline spelling reduced to `'\n'`.
pub fn normalize_newlines(text: &str) -> String {
    logical_text(text.encode_utf16().collect())
}

/// Like [`normalize_newlines`], for raw code units. Unpaired surrogates are
/// dropped the same way the lexer drops them.
pub fn logical_text(units: Vec<u16>) -> String {
    let mut source = CharSource::from_units(units, None);
    let mut out = String::new();
    let mut current = source.current();
    while let Some(c) = current {
        out.push(c);
        current = source.advance();
    }
    out
}
