use ku_script::{LabelId, Script};
use serde::{Deserialize, Serialize};

/// A resumable point in the script: global line plus position within it
/// (token index on command lines, byte offset on text lines).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Global line index.
    pub line: usize,
    /// Token index or byte offset.
    pub pos: usize,
}

/// The execution loop's instruction cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptCursor {
    /// Label whose body contains `line`.
    pub label: LabelId,
    /// Global line index.
    pub line: usize,
    /// Token index or byte offset.
    pub pos: usize,
}

impl ScriptCursor {
    /// The first body line of a label.
    pub fn at_label(script: &Script, label: LabelId) -> Self {
        Self {
            label,
            line: script.label(label).body_start(),
            pos: 0,
        }
    }

    /// Rebuild a cursor from a saved position, recomputing the label.
    pub fn from_position(script: &Script, position: Position) -> Option<Self> {
        let label = script.label_of_line(position.line)?;
        Some(Self {
            label,
            line: position.line,
            pos: position.pos,
        })
    }

    /// Line and position without the label.
    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            pos: self.pos,
        }
    }

    /// Move to the start of the following line.
    pub fn next_line(&mut self) {
        self.line += 1;
        self.pos = 0;
    }
}
