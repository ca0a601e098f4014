//! Script execution engine for Kulisse.
//!
//! Turns a line-by-line interpreter into an event-driven player. The
//! [`Engine`] owns one [`SessionState`], asks the dispatcher for a handler
//! per command, and suspends inside a single reusable wait loop whenever a
//! command needs a click, a timer, a voice channel, or a button choice.
//! System calls (menu, save, load, lookback, ...) run nested inside that
//! loop with the interrupted state sheltered, and the whole resumable state
//! can be persisted to a slot and restored.

/// Command argument reader and expression evaluation.
pub mod args;
/// Click-selectable regions.
pub mod buttons;
/// Static script validation for `kulisse check`.
pub mod check;
/// Script command handlers.
pub mod commands;
/// Engine configuration and define-time settings.
pub mod config;
/// Script cursor and saved positions.
pub mod cursor;
/// Command table and first-letter index.
pub mod dispatch;
/// The execution loop.
pub mod engine;
/// Error types for the engine.
pub mod error;
/// External events and the serial event queue.
pub mod event;
/// Capability interfaces to presentation, audio, archive, and storage.
pub mod host;
/// Subroutine and loop nesting.
pub mod nest;
/// Text page history.
pub mod page;
/// Read-line tracking for skip-until-unread.
pub mod readlog;
/// Session state shared by the loop, wait machine, and system calls.
pub mod session;
/// Snapshot encoding, persist, and restore.
pub mod snapshot;
/// Nested system-call sub-machine.
pub mod syscall;
/// Numeric and string registers.
pub mod variables;
/// Wait descriptor, skip table, and the event resolver.
pub mod wait;

pub use config::{EngineConfig, EngineSettings};
pub use cursor::{Position, ScriptCursor};
pub use dispatch::{DispatchTable, Handler, StepFlags};
pub use engine::{Engine, LoopState, RunSummary};
pub use error::{EngineError, EngineResult, ResourceError, ScriptError, ScriptResult, StorageError};
pub use event::{Event, EventSender, EventSource, Key, PointerButton, TraceSource, TraceStep};
pub use host::{Host, SlotId};
pub use session::SessionState;
pub use snapshot::{Snapshot, SnapshotError};
pub use syscall::{SystemCall, SystemMode};
pub use wait::{SkipMode, WaitKind, WaitReasons};
