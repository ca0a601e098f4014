//! Diagnostics collected while parsing and checking a script.

use std::fmt;
use std::ops::Range;

use ariadne::{Color, Label, Report, ReportKind, Source};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The line cannot run as written.
    Error,
    /// The line runs but is probably a mistake.
    Warning,
}

impl Severity {
    fn report_kind(self) -> ReportKind<'static> {
        match self {
            Self::Error => ReportKind::Error,
            Self::Warning => ReportKind::Warning,
        }
    }

    fn color(self) -> Color {
        match self {
            Self::Error => Color::Red,
            Self::Warning => Color::Yellow,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
        })
    }
}

/// A problem at a byte range of the script source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// How serious it is.
    pub severity: Severity,
    /// Byte range in the script source.
    pub span: Range<usize>,
    /// Headline.
    pub message: String,
    /// Text under the highlighted span; the headline is used when absent.
    pub label: Option<String>,
    /// A hint printed below the source excerpt.
    pub note: Option<String>,
}

impl Diagnostic {
    fn new(severity: Severity, span: Range<usize>, message: String) -> Self {
        Self {
            severity,
            span,
            message,
            label: None,
            note: None,
        }
    }

    /// An error at `span`.
    pub fn error(span: Range<usize>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, span, message.into())
    }

    /// A warning at `span`.
    pub fn warning(span: Range<usize>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, span, message.into())
    }

    /// Text for the highlighted span.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// A hint shown after the excerpt.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Errors and warnings in a batch of diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Number of errors.
    pub errors: usize,
    /// Number of warnings.
    pub warnings: usize,
}

impl Counts {
    /// Tally `diagnostics`.
    pub fn of(diagnostics: &[Diagnostic]) -> Self {
        diagnostics
            .iter()
            .fold(Self::default(), |mut counts, d| {
                match d.severity {
                    Severity::Error => counts.errors += 1,
                    Severity::Warning => counts.warnings += 1,
                }
                counts
            })
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors == 0 {
            return f.write_str(&plural(self.warnings, "warning"));
        }
        write!(
            f,
            "{}, {}",
            plural(self.errors, "error"),
            plural(self.warnings, "warning")
        )
    }
}

/// Render diagnostics with ariadne, one report each, in the order given.
pub fn render_diagnostics(source: &str, filename: &str, diagnostics: &[Diagnostic]) -> String {
    let mut cache = (filename, Source::from(source));
    let mut output = Vec::new();

    for diag in diagnostics {
        let span = (filename, diag.span.clone());
        let label = Label::new(span.clone())
            .with_message(diag.label.as_deref().unwrap_or(&diag.message))
            .with_color(diag.severity.color());
        let mut report = Report::build(diag.severity.report_kind(), span)
            .with_message(&diag.message)
            .with_label(label);
        if let Some(note) = &diag.note {
            report = report.with_note(note);
        }
        // Writing into a Vec only fails on a span outside the source.
        let _ = report.finish().write(&mut cache, &mut output);
    }

    String::from_utf8_lossy(&output).into_owned()
}
