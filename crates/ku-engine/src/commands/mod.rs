//! Script command handlers, grouped by concern.
//!
//! Every handler has the [`CommandFn`](crate::dispatch::CommandFn) shape.
//! A handler that waits must not touch the session until its wait has
//! resolved: a save taken during the wait resumes at the start of the
//! command, so it has to be safe to run again from scratch.

pub mod choice;
pub mod flow;
pub mod media;
pub mod system;
pub mod text;
pub mod vars;
