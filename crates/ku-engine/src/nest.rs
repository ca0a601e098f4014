use serde::{Deserialize, Serialize};

use crate::cursor::Position;
use crate::error::{ScriptError, ScriptResult};

/// One frame of the nesting stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum NestFrame {
    /// A `gosub` return point.
    Label {
        /// Where `return` resumes.
        return_to: Position,
    },
    /// An active `for` loop.
    For {
        /// Loop variable index.
        var: u32,
        /// Inclusive bound.
        to: i32,
        /// Increment, never zero.
        step: i32,
        /// First token after the `for` arguments.
        body: Position,
    },
}

/// Strictly paired gosub/for frames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestStack {
    frames: Vec<NestFrame>,
}

impl NestStack {
    /// An empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame.
    pub fn push(&mut self, frame: NestFrame) {
        self.frames.push(frame);
    }

    /// Pop a LABEL frame. Leaves the stack untouched on a FOR frame.
    pub fn pop_label(&mut self) -> ScriptResult<Position> {
        match self.frames.last() {
            Some(NestFrame::Label { return_to }) => {
                let position = *return_to;
                self.frames.pop();
                Ok(position)
            }
            _ => Err(ScriptError::NestMismatch {
                expected: "gosub",
                found: "return",
            }),
        }
    }

    /// The top FOR frame, or an error naming the command that wanted it.
    pub fn top_for(&self, command: &'static str) -> ScriptResult<&NestFrame> {
        match self.frames.last() {
            Some(frame @ NestFrame::For { .. }) => Ok(frame),
            _ => Err(ScriptError::NestMismatch {
                expected: "for",
                found: command,
            }),
        }
    }

    /// Pop the top FOR frame. Leaves the stack untouched on a LABEL frame.
    pub fn pop_for(&mut self, command: &'static str) -> ScriptResult<()> {
        self.top_for(command)?;
        self.frames.pop();
        Ok(())
    }

    /// Frames, bottom first.
    pub fn frames(&self) -> &[NestFrame] {
        &self.frames
    }

    /// Number of frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drop every frame.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
