use crate::symbols;
use serde::Serialize;
use std::fmt;

/// Logical position of a token or rune: file number, 1-based logical
/// offset into the file, plus the line/column pair reported to users.
/// The offset is stable across trigraph substitution and line splicing;
/// it always points at the first physical byte of the construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SourceLocation {
    pub file_no: usize,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            symbols::file_name(self.file_no),
            self.line,
            self.column
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// Classification used by tests and embedding drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Malformed number, unterminated literal, bad universal character name.
    Lex,
    /// Unknown directive, malformed `#if`, stray `#else`/`#elif`/`#endif`.
    Directive,
    /// Redefinition, argument count, `#`/`##` placement.
    Macro,
    /// File not found, include nesting too deep.
    Include,
    /// Overflow, division by zero, malformed `defined`.
    Expr,
    /// Reserved for the downstream semantic layer.
    Redecl,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub location: SourceLocation,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {severity}: {}", self.location, self.message)
    }
}

/// A fatal condition that stops the engine. Everything recoverable goes
/// through [`Report`] instead.
#[derive(Debug, Clone)]
pub struct PpError {
    message: String,
    location: Option<SourceLocation>,
}

impl PpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub fn at(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location: Some(location),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<SourceLocation> {
        self.location
    }
}

impl fmt::Display for PpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(location) => write!(f, "{location}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for PpError {}

pub type PpResult<T> = Result<T, PpError>;

/// Ordered diagnostic list with the crash/limit policy attached.
///
/// Recoverable problems are appended here and the engine continues with
/// best-effort output. Only `panic_on_error` and an exceeded error limit
/// unwind, as a [`PpError`].
#[derive(Debug, Clone, Default)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
    errors: usize,
    error_limit: i32,
    panic_on_error: bool,
    disable_warnings: bool,
}

impl Report {
    pub fn new(error_limit: i32, panic_on_error: bool, disable_warnings: bool) -> Self {
        Self {
            diagnostics: Vec::new(),
            errors: 0,
            error_limit,
            panic_on_error,
            disable_warnings,
        }
    }

    pub fn error(
        &mut self,
        kind: ErrorKind,
        location: SourceLocation,
        message: impl Into<String>,
    ) -> PpResult<()> {
        let message = message.into();
        self.diagnostics.push(Diagnostic {
            kind,
            severity: Severity::Error,
            location,
            message: message.clone(),
        });
        self.errors += 1;
        if self.panic_on_error {
            return Err(PpError::at(message, location));
        }
        if self.error_limit >= 0 && self.errors > self.error_limit as usize {
            return Err(PpError::at("too many errors", location));
        }
        Ok(())
    }

    pub fn warning(
        &mut self,
        kind: ErrorKind,
        location: SourceLocation,
        message: impl Into<String>,
    ) {
        if self.disable_warnings {
            return;
        }
        self.diagnostics.push(Diagnostic {
            kind,
            severity: Severity::Warning,
            location,
            message: message.into(),
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors != 0
    }
}
