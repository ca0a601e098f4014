use std::rc::Rc;

use ku_script::{LineKind, Script, Token};
use log::{debug, error, info, warn};

use crate::args::{Args, Scope};
use crate::config::{EngineConfig, EngineSettings};
use crate::cursor::{Position, ScriptCursor};
use crate::dispatch::{DispatchTable, StepFlags};
use crate::error::{EngineError, EngineResult, ScriptError};
use crate::event::{EventQueue, EventSource};
use crate::host::{Host, SlotId};
use crate::readlog::ReadLog;
use crate::session::SessionState;
use crate::snapshot::{self, GlobalRecord};
use crate::wait::SkipMode;

/// Where the execution loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Executing label bodies.
    Running,
    /// The current label body ran out; looking for the next label.
    BlockedInLabelEnd,
    /// Finished.
    Terminated,
}

/// What a finished run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps executed.
    pub steps: u64,
    /// Recoverable errors logged and skipped.
    pub recovered: u32,
}

/// The script execution engine.
///
/// Owns the session, the host and the event queue. [`Engine::run`] steps
/// until the session terminates; each [`Engine::step`] runs at most one
/// command, which may block inside the wait machine.
pub struct Engine {
    pub(crate) script: Rc<Script>,
    pub(crate) config: EngineConfig,
    pub(crate) settings: EngineSettings,
    pub(crate) state: SessionState,
    pub(crate) host: Box<dyn Host>,
    pub(crate) events: EventQueue,
    pub(crate) dispatch: DispatchTable,
    pub(crate) read_log: ReadLog,
    pub(crate) next_timer: u64,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("cursor", &self.state.cursor)
            .field("loop_state", &self.state.loop_state)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine positioned at the script's entry label. The global
    /// record is loaded from slot 0 when present.
    pub fn new(
        script: Script,
        config: EngineConfig,
        host: Box<dyn Host>,
        events: Box<dyn EventSource>,
    ) -> EngineResult<Self> {
        let settings = EngineSettings::from_config(&config);
        let state = SessionState::new(&script, &config, &settings)?;
        let mut engine = Self {
            script: Rc::new(script),
            config,
            settings,
            state,
            host,
            events: EventQueue::new(events),
            dispatch: DispatchTable::new(),
            read_log: ReadLog::new(),
            next_timer: 0,
        };
        engine.load_global_record();
        Ok(engine)
    }

    /// The script being run.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// The frozen configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Settings the script has changed so far.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The session.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The session, for embedders that drive it directly.
    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Loop state.
    pub fn loop_state(&self) -> LoopState {
        self.state.loop_state
    }

    /// Lines read so far.
    pub fn read_log(&self) -> &ReadLog {
        &self.read_log
    }

    /// Change the skip mode.
    pub fn set_skip_mode(&mut self, mode: SkipMode) {
        debug!("skip {:?} -> {mode:?}", self.state.skip);
        self.state.skip = mode;
    }

    /// Step until the session terminates. Recoverable errors are logged and
    /// the offending line is skipped. On a fatal error an emergency snapshot
    /// is attempted before the error is returned. The global record is
    /// written either way.
    pub fn run(&mut self) -> EngineResult<RunSummary> {
        let mut summary = RunSummary::default();
        while self.state.loop_state != LoopState::Terminated {
            summary.steps += 1;
            match self.step() {
                Ok(_) => {}
                Err(err) if err.is_fatal() => {
                    error!(
                        "line {}: {err}",
                        self.script.display_line(self.state.save_point.line)
                    );
                    self.emergency_save();
                    self.state.loop_state = LoopState::Terminated;
                    self.write_global_record();
                    return Err(err);
                }
                Err(err) => {
                    summary.recovered += 1;
                    warn!(
                        "line {}: {err}",
                        self.script.display_line(self.state.save_point.line)
                    );
                    self.discard_line();
                }
            }
        }
        self.write_global_record();
        info!("session ended after {} steps", summary.steps);
        Ok(summary)
    }

    /// Execute one step: at most one command, or one text segment.
    pub fn step(&mut self) -> EngineResult<StepFlags> {
        match self.state.loop_state {
            LoopState::Terminated => return Ok(StepFlags::TERMINATE),
            LoopState::BlockedInLabelEnd => return Ok(self.continue_after_label()),
            LoopState::Running => {}
        }

        let script = Rc::clone(&self.script);
        let cursor = self.state.cursor;
        self.state.save_point = cursor;

        if cursor.line >= script.label(cursor.label).end {
            self.state.loop_state = LoopState::BlockedInLabelEnd;
            return Ok(self.continue_after_label());
        }
        let Some(line) = script.line(cursor.line) else {
            self.state.loop_state = LoopState::BlockedInLabelEnd;
            return Ok(self.continue_after_label());
        };

        let flags = match &line.kind {
            LineKind::Blank | LineKind::Label(_) => {
                self.state.cursor.next_line();
                StepFlags::NEXT_LINE
            }
            LineKind::Text(_) if self.state.break_pending => {
                self.state.cursor.next_line();
                StepFlags::NEXT_LINE
            }
            LineKind::Text(text) => self.run_text(text)?,
            LineKind::Commands { tokens, .. } => self.run_command(tokens)?,
        };
        if flags.contains(StepFlags::TERMINATE) {
            self.state.loop_state = LoopState::Terminated;
        }
        Ok(flags)
    }

    fn run_command(&mut self, tokens: &[Token]) -> EngineResult<StepFlags> {
        let mut pos = self.state.cursor.pos;
        while tokens.get(pos) == Some(&Token::Colon) {
            pos += 1;
        }
        self.state.cursor.pos = pos;
        self.state.save_point.pos = pos;

        let word = match tokens.get(pos) {
            None => {
                self.state.cursor.next_line();
                return Ok(StepFlags::NEXT_LINE);
            }
            Some(Token::Word(word)) => word.as_str(),
            Some(other) => {
                return Err(ScriptError::Expected {
                    expected: "a command",
                    found: other.to_string(),
                }
                .into());
            }
        };

        if self.state.break_pending && word != "next" {
            let mut args = Args::new(tokens, pos + 1, word);
            args.skip_rest();
            return Ok(self.advance(StepFlags::NONE, args.position(), tokens.len()));
        }

        let handler = self.dispatch.lookup(word)?;
        debug!(
            "line {}: {handler:?}",
            self.script.display_line(self.state.cursor.line)
        );
        let mut args = Args::new(tokens, pos + 1, word);
        let flags = handler.invoke(self, &mut args)?;
        Ok(self.advance(flags, args.position(), tokens.len()))
    }

    /// Apply a handler's flags to the cursor.
    fn advance(&mut self, flags: StepFlags, next: usize, len: usize) -> StepFlags {
        if flags.contains(StepFlags::TERMINATE) || flags.contains(StepFlags::POSITIONED) {
            return flags;
        }
        if flags.contains(StepFlags::NEXT_LINE) || next >= len {
            self.state.cursor.next_line();
            return flags | StepFlags::NEXT_LINE;
        }
        self.state.cursor.pos = next;
        flags
    }

    fn continue_after_label(&mut self) -> StepFlags {
        match self.script.next_label(self.state.cursor.label) {
            Some(next) => {
                debug!("falling through to *{}", self.script.label(next).name);
                self.state.cursor = ScriptCursor::at_label(&self.script, next);
                self.state.loop_state = LoopState::Running;
                StepFlags::END_OF_LABEL
            }
            None => {
                info!("end of script");
                self.state.loop_state = LoopState::Terminated;
                StepFlags::END_OF_LABEL | StepFlags::TERMINATE
            }
        }
    }

    fn discard_line(&mut self) {
        let mut cursor = self.state.save_point;
        cursor.next_line();
        self.state.cursor = cursor;
        if self.state.loop_state == LoopState::BlockedInLabelEnd {
            self.state.loop_state = LoopState::Running;
        }
    }

    /// Registers and aliases for argument evaluation.
    pub(crate) fn scope(&self) -> Scope<'_> {
        Scope {
            vars: &self.state.vars,
            settings: &self.settings,
        }
    }

    /// Move the cursor to the start of a label's body.
    pub(crate) fn jump_to(&mut self, label: &str) -> EngineResult<()> {
        let id = self
            .script
            .find_label(label)
            .ok_or_else(|| EngineError::MissingLabel(label.to_string()))?;
        debug!("jump to *{}", self.script.label(id).name);
        self.state.cursor = ScriptCursor::at_label(&self.script, id);
        self.state.loop_state = LoopState::Running;
        Ok(())
    }

    /// Move the cursor to a recorded position.
    pub(crate) fn jump_to_position(&mut self, position: Position) -> EngineResult<()> {
        let cursor = ScriptCursor::from_position(&self.script, position).ok_or_else(|| {
            ScriptError::Malformed {
                command: "return".into(),
                detail: format!("line {} is outside the script", position.line),
            }
        })?;
        self.state.cursor = cursor;
        self.state.loop_state = LoopState::Running;
        Ok(())
    }

    /// Cursor just after the arguments of the running command.
    pub(crate) fn cursor_after(&self, args: &Args<'_>) -> ScriptCursor {
        ScriptCursor {
            pos: args.position(),
            ..self.state.cursor
        }
    }

    fn emergency_save(&mut self) {
        let resume_at = self.state.save_point;
        let result = self
            .persist(resume_at)
            .and_then(|bytes| Ok(self.host.write_slot(SlotId::EMERGENCY, &bytes)?));
        match result {
            Ok(()) => info!("emergency snapshot written"),
            Err(e) => warn!("emergency snapshot failed: {e}"),
        }
    }

    fn load_global_record(&mut self) {
        let bytes = match self.host.read_slot(SlotId::GLOBAL) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return,
            Err(e) => {
                warn!("cannot read global record: {e}");
                return;
            }
        };
        match snapshot::decode_global(&bytes) {
            Ok(record) => {
                if let Err(e) = self.state.vars.apply_global_record(&record.variables) {
                    warn!("global record does not fit: {e}");
                }
                self.read_log = record.read_log;
                debug!("global record loaded ({} lines read)", self.read_log.count());
            }
            Err(e) => warn!("ignoring global record: {e}"),
        }
    }

    /// Write global variables and the read log to slot 0.
    pub(crate) fn write_global_record(&mut self) {
        let record = GlobalRecord {
            variables: self.state.vars.global_record(),
            read_log: self.read_log.clone(),
        };
        let result = snapshot::encode_global(&record)
            .map_err(EngineError::from)
            .and_then(|bytes| Ok(self.host.write_slot(SlotId::GLOBAL, &bytes)?));
        if let Err(e) = result {
            warn!("cannot write global record: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TraceSource;
    use crate::host::RecordingHost;

    fn engine(source: &str) -> Engine {
        Engine::new(
            Script::parse(source),
            EngineConfig::default(),
            Box::new(RecordingHost::new()),
            Box::new(TraceSource::default()),
        )
        .unwrap()
    }

    #[test]
    fn no_flags_moves_to_next_command() {
        let mut e = engine("*start\nmov %0, 1 : mov %1, 2\n");
        let flags = e.step().unwrap();
        assert!(flags.is_empty());
        assert_eq!(e.state().cursor.line, 1);
        assert_eq!(e.state().cursor.pos, 4);
        e.step().unwrap();
        assert_eq!(e.state().cursor.line, 2);
        assert_eq!(e.state().vars.num(1).unwrap(), 2);
    }

    #[test]
    fn label_chain_falls_through() {
        let mut e = engine("*start\nmov %0, 1\n*second\nmov %1, 2\n");
        e.run().unwrap();
        assert_eq!(e.state().vars.num(0).unwrap(), 1);
        assert_eq!(e.state().vars.num(1).unwrap(), 2);
        assert_eq!(e.loop_state(), LoopState::Terminated);
    }

    #[test]
    fn end_of_last_label_terminates() {
        let mut e = engine("*start\n");
        let flags = e.step().unwrap();
        assert!(flags.contains(StepFlags::TERMINATE));
        assert!(flags.contains(StepFlags::END_OF_LABEL));
    }

    #[test]
    fn unknown_command_skips_line() {
        let mut e = engine("*start\nmov %0, 1 : frobnicate : mov %0, 5\nmov %1, 9\n");
        let summary = e.run().unwrap();
        assert_eq!(summary.recovered, 1);
        assert_eq!(e.state().vars.num(0).unwrap(), 1);
        assert_eq!(e.state().vars.num(1).unwrap(), 9);
    }

    #[test]
    fn missing_label_is_fatal_and_saves() {
        let host = RecordingHost::new();
        let storage = host.storage();
        let mut e = Engine::new(
            Script::parse("*start\nmov %0, 4\ngoto *nowhere\n"),
            EngineConfig::default(),
            Box::new(host),
            Box::new(TraceSource::default()),
        )
        .unwrap();
        let err = e.run().unwrap_err();
        assert!(matches!(err, EngineError::MissingLabel(ref l) if l == "nowhere"));
        assert!(storage.occupied().contains(&SlotId::EMERGENCY));
        assert!(storage.occupied().contains(&SlotId::GLOBAL));
    }

    #[test]
    fn global_variables_survive_sessions() {
        let host = RecordingHost::new();
        let storage = host.storage();
        let mut first = Engine::new(
            Script::parse("*start\nmov %250, 77 : mov %1, 5\n"),
            EngineConfig::default(),
            Box::new(host),
            Box::new(TraceSource::default()),
        )
        .unwrap();
        first.run().unwrap();

        let second = Engine::new(
            Script::parse("*start\n"),
            EngineConfig::default(),
            Box::new(RecordingHost::new().with_storage(storage)),
            Box::new(TraceSource::default()),
        )
        .unwrap();
        assert_eq!(second.state().vars.num(250).unwrap(), 77);
        assert_eq!(second.state().vars.num(1).unwrap(), 0);
    }

    #[test]
    fn stray_token_is_recoverable() {
        let mut e = engine("*start\n5\nmov %0, 1\n");
        let summary = e.run().unwrap();
        assert_eq!(summary.recovered, 1);
        assert_eq!(e.state().vars.num(0).unwrap(), 1);
    }
}
