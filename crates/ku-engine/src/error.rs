use std::io;

use crate::snapshot::SnapshotError;

/// Alias for `Result<T, ScriptError>`.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

/// Problems with a single command. The loop logs them and skips the rest of
/// the line.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The command word matches neither the table nor a numbered variant.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// An argument of the wrong shape.
    #[error("expected {expected}, found {found}")]
    Expected {
        /// What the reader wanted.
        expected: &'static str,
        /// What it got instead.
        found: String,
    },

    /// An argument that parsed but cannot be used.
    #[error("{command}: {detail}")]
    Malformed {
        /// The command that rejected it.
        command: String,
        /// Human-readable reason.
        detail: String,
    },

    /// `div` or `mod` by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A variable index beyond the configured register count.
    #[error("variable index out of range: {0}")]
    VariableRange(u32),

    /// An alias that was never declared with `numalias`/`stralias`.
    #[error("unknown alias: {0}")]
    UnknownAlias(String),

    /// `return` on a FOR frame, `next` on a LABEL frame, or an empty stack.
    #[error("{found} without matching {expected}")]
    NestMismatch {
        /// The frame kind the command needs.
        expected: &'static str,
        /// The command that found the wrong frame.
        found: &'static str,
    },
}

/// Problems with external assets and devices.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// The archive has no file with this name.
    #[error("missing asset: {0}")]
    MissingAsset(String),

    /// The audio device refused to play.
    #[error("audio unavailable: {0}")]
    AudioUnavailable(String),

    /// Reading an asset failed.
    #[error("cannot read {name}: {source}")]
    Io {
        /// Asset name.
        name: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Problems writing or reading a save slot.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing store failed.
    #[error("slot {slot}: {source}")]
    Io {
        /// Slot number.
        slot: u32,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Everything a step, a wait or a system call can fail with.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A recoverable command error.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// A recoverable asset error.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// A recoverable storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A snapshot could not be restored.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// An explicit jump named a label the script does not define.
    #[error("fatal: label *{0} does not exist")]
    MissingLabel(String),

    /// The script has nowhere to start.
    #[error("fatal: script defines no labels")]
    NoEntryLabel,
}

impl EngineError {
    /// Whether the session must end. Everything else is logged and the rest
    /// of the line is skipped.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Script(_) | Self::Resource(_) | Self::Storage(_) => false,
            Self::Snapshot(e) => e.is_fatal(),
            Self::MissingLabel(_) | Self::NoEntryLabel => true,
        }
    }
}
