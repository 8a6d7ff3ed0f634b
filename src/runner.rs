use crate::ast::Program;
use crate::error::{Diagnostics, KiwiError};
use crate::interpreter::Interpreter;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::source::{logical_text, CharSource};
use crate::value::Value;
use std::io::{self, Write};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Print the token stream instead of running the program.
    pub dump_tokens: bool,
    /// Render diagnostics as labelled reports instead of plain text.
    pub pretty: bool,
}

/// Result of running a program against some output writer.
pub struct Outcome<W> {
    pub value: Option<Value>,
    pub diagnostics: Diagnostics,
    pub output: W,
}

pub fn parse_source(text: &str, filename: Option<&str>) -> (Program, Diagnostics) {
    parse_units(text.encode_utf16().collect(), filename)
}

/// Parses raw UTF-16 code units, surrogates and all.
pub fn parse_units(units: Vec<u16>, filename: Option<&str>) -> (Program, Diagnostics) {
    let diagnostics = Diagnostics::new();
    let source = CharSource::from_units(units, filename).with_diagnostics(diagnostics.clone());
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse();
    (program, diagnostics)
}

/// Lexes, parses and runs `text`. Whatever parsed is run even if earlier
/// stages reported problems.
pub fn interpret<W: Write>(text: &str, filename: Option<&str>, output: W) -> Outcome<W> {
    interpret_units(text.encode_utf16().collect(), filename, output)
}

pub fn interpret_units<W: Write>(units: Vec<u16>, filename: Option<&str>, output: W) -> Outcome<W> {
    let (program, diagnostics) = parse_units(units, filename);
    let mut interpreter = Interpreter::new(program, diagnostics.clone(), output);
    let value = interpreter.run();
    Outcome {
        value,
        diagnostics,
        output: interpreter.into_output(),
    }
}

pub fn dump_tokens<W: Write>(
    text: &str,
    filename: Option<&str>,
    out: &mut W,
) -> io::Result<Diagnostics> {
    dump_units(text.encode_utf16().collect(), filename, out)
}

pub fn dump_units<W: Write>(
    units: Vec<u16>,
    filename: Option<&str>,
    out: &mut W,
) -> io::Result<Diagnostics> {
    let diagnostics = Diagnostics::new();
    let source = CharSource::from_units(units, filename).with_diagnostics(diagnostics.clone());
    for token in Lexer::new(source) {
        writeln!(out, "{}", token)?;
    }
    Ok(diagnostics)
}

/// Runs decoded input for the command line: program output goes to stdout,
/// the diagnostic report to stderr.
pub fn run(
    units: Vec<u16>,
    filename: Option<&str>,
    options: &RunOptions,
) -> Result<Diagnostics, KiwiError> {
    let stdout = io::stdout();
    // The pretty report needs the text again once the source has consumed it.
    let retained = options.pretty.then(|| units.clone());
    let diagnostics = if options.dump_tokens {
        dump_units(units, filename, &mut stdout.lock())?
    } else {
        let mut outcome = interpret_units(units, filename, stdout.lock());
        outcome.output.flush()?;
        outcome.diagnostics
    };

    if !diagnostics.is_empty() {
        match retained {
            Some(units) => diagnostics.report_pretty(&logical_text(units), filename),
            None => eprint!("{}", diagnostics.render()),
        }
    }

    Ok(diagnostics)
}
