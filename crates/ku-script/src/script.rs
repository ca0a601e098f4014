//! Line model and label table.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use crate::diagnostics::Diagnostic;
use crate::error::{ScriptLoadError, ScriptLoadResult};
use crate::lexer::{Token, lex_line};

/// Index of a label in [`Script::labels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub usize);

/// A `*name` label and the range of lines that form its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Lowercased name without the asterisk.
    pub name: String,
    /// Global index of the `*name` line itself.
    pub line: usize,
    /// Global index one past the last line of the body.
    pub end: usize,
}

impl Label {
    /// Global index of the first body line.
    pub fn body_start(&self) -> usize {
        self.line + 1
    }

    /// Number of body lines.
    pub fn len(&self) -> usize {
        self.end - self.body_start()
    }

    /// Whether the label has no body lines.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a single script line contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Empty, comment-only, or `~` line.
    Blank,
    /// A `*name` label line.
    Label(String),
    /// Narrative text, backtick already stripped.
    Text(String),
    /// One or more `:`-separated commands.
    Commands {
        /// Lexed tokens.
        tokens: Vec<Token>,
        /// Source span of each token.
        spans: Vec<Range<usize>>,
    },
}

/// A classified script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// What the line contains.
    pub kind: LineKind,
    /// Byte range of the line in the source.
    pub span: Range<usize>,
}

impl Line {
    /// Token slice of a command line, empty for every other kind.
    pub fn tokens(&self) -> &[Token] {
        match &self.kind {
            LineKind::Commands { tokens, .. } => tokens,
            _ => &[],
        }
    }

    /// Source span of the token at `index`, falling back to the line span.
    pub fn token_span(&self, index: usize) -> Range<usize> {
        match &self.kind {
            LineKind::Commands { spans, .. } => {
                spans.get(index).cloned().unwrap_or(self.span.clone())
            }
            _ => self.span.clone(),
        }
    }
}

/// A parsed script: classified lines plus the label table.
///
/// Lines are addressed by a zero-based *global line number*. Snapshots store
/// the cursor as a global line, and the label is recomputed from it with
/// [`Script::label_of_line`].
#[derive(Debug, Clone)]
pub struct Script {
    source: String,
    lines: Vec<Line>,
    labels: Vec<Label>,
    label_index: HashMap<String, LabelId>,
    diagnostics: Vec<Diagnostic>,
}

impl Script {
    /// Parse a script from source text. Never fails; problems are recorded
    /// as diagnostics.
    pub fn parse(source: &str) -> Self {
        let mut lines = Vec::new();
        let mut labels: Vec<Label> = Vec::new();
        let mut label_index = HashMap::new();
        let mut diagnostics = Vec::new();

        let mut offset = 0;
        for raw in source.split_inclusive('\n') {
            let start = offset;
            offset += raw.len();
            let content = raw.trim_end_matches(['\n', '\r']);
            let span = start..start + content.len();
            let trimmed = content.trim_start();
            let lead = content.len() - trimmed.len();

            let kind = match trimmed.chars().next() {
                None | Some(';') | Some('~') => LineKind::Blank,
                Some('*') => {
                    let name: String = trimmed[1..]
                        .chars()
                        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                        .collect::<String>()
                        .to_ascii_lowercase();
                    if name.is_empty() {
                        diagnostics.push(Diagnostic::error(span.clone(), "empty label name"));
                        LineKind::Blank
                    } else {
                        LineKind::Label(name)
                    }
                }
                Some('`') => LineKind::Text(trimmed[1..].to_string()),
                Some(c) if !c.is_ascii() => LineKind::Text(trimmed.to_string()),
                Some(_) => {
                    let (lexed, errors) = lex_line(trimmed, start + lead);
                    diagnostics.extend(
                        errors
                            .into_iter()
                            .map(|e| Diagnostic::error(e.span, e.message)),
                    );
                    let (tokens, spans) = lexed.into_iter().unzip();
                    LineKind::Commands { tokens, spans }
                }
            };

            let index = lines.len();
            if let LineKind::Label(name) = &kind {
                if let Some(last) = labels.last_mut() {
                    last.end = index;
                }
                if label_index.contains_key(name) {
                    diagnostics.push(
                        Diagnostic::warning(span.clone(), format!("duplicate label *{name}"))
                            .with_label("the first definition wins"),
                    );
                } else {
                    label_index.insert(name.clone(), LabelId(labels.len()));
                }
                labels.push(Label {
                    name: name.clone(),
                    line: index,
                    end: index + 1,
                });
            } else if labels.is_empty() && !matches!(kind, LineKind::Blank) {
                diagnostics.push(
                    Diagnostic::warning(span.clone(), "line outside of any label")
                        .with_label("never executed"),
                );
            }

            lines.push(Line { kind, span });
        }

        if let Some(last) = labels.last_mut() {
            last.end = lines.len();
        }

        Self {
            source: source.to_string(),
            lines,
            labels,
            label_index,
            diagnostics,
        }
    }

    /// Read and parse a script file.
    pub fn from_path(path: &Path) -> ScriptLoadResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| ScriptLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let script = Self::parse(&source);
        if script.labels.is_empty() {
            return Err(ScriptLoadError::NoLabels(path.to_path_buf()));
        }
        Ok(script)
    }

    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// All lines in order.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// The line at a global index.
    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    /// Total number of lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// All labels in script order.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// The label with the given id.
    ///
    /// # Panics
    ///
    /// Panics if the id did not come from this script.
    pub fn label(&self, id: LabelId) -> &Label {
        &self.labels[id.0]
    }

    /// Look up a label by name. A leading `*` and letter case are ignored.
    pub fn find_label(&self, name: &str) -> Option<LabelId> {
        let name = name.strip_prefix('*').unwrap_or(name);
        self.label_index.get(&name.to_ascii_lowercase()).copied()
    }

    /// The label whose body (or label line) contains a global line.
    pub fn label_of_line(&self, line: usize) -> Option<LabelId> {
        if line >= self.lines.len() {
            return None;
        }
        let idx = self.labels.partition_point(|l| l.line <= line);
        idx.checked_sub(1).map(LabelId)
    }

    /// The label following `id` in script order.
    pub fn next_label(&self, id: LabelId) -> Option<LabelId> {
        let next = id.0 + 1;
        (next < self.labels.len()).then_some(LabelId(next))
    }

    /// Where execution begins: `*define`, else `*start`, else the first label.
    pub fn entry_label(&self) -> Option<LabelId> {
        self.find_label("define")
            .or_else(|| self.find_label("start"))
            .or_else(|| (!self.labels.is_empty()).then_some(LabelId(0)))
    }

    /// Diagnostics collected while parsing.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// 1-based source line number for a global line, for messages.
    pub fn display_line(&self, index: usize) -> usize {
        index + 1
    }
}
