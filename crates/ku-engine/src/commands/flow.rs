//! Jumps, subroutines, conditionals, loops and traps.

use ku_script::Token;
use log::{debug, info};

use crate::args::Args;
use crate::dispatch::StepFlags;
use crate::engine::Engine;
use crate::error::{EngineResult, ScriptError, ScriptResult};
use crate::nest::NestFrame;

/// `goto *label`
pub fn goto(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let label = args.label()?;
    engine.jump_to(&label)?;
    Ok(StepFlags::POSITIONED)
}

/// `gosub *label`
pub fn gosub(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let label = args.label()?;
    engine.call(&label, args)?;
    Ok(StepFlags::POSITIONED)
}

/// `return [*label]`: pop the gosub frame and resume at the caller, or at
/// `label` when one is given.
pub fn return_from(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let target = args.opt_label();
    let return_to = engine.state.nest.pop_label()?;
    match target {
        Some(label) => engine.jump_to(&label)?,
        None => engine.jump_to_position(return_to)?,
    }
    Ok(StepFlags::POSITIONED)
}

/// `if cond command...`
pub fn if_then(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let holds = args.condition(&engine.scope())?;
    Ok(rest_of_line_if(holds))
}

/// `notif cond command...`
pub fn if_not(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let holds = args.condition(&engine.scope())?;
    Ok(rest_of_line_if(!holds))
}

fn rest_of_line_if(run: bool) -> StepFlags {
    if run {
        StepFlags::NONE
    } else {
        StepFlags::NEXT_LINE
    }
}

/// `for %v = from to bound [step s]`
///
/// The frame is pushed even when the range is empty; the body is then
/// skipped up to the matching `next`, which pops it.
pub fn for_loop(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let var = args.num_var(&scope)?;
    if !args.eat(&Token::Eq) {
        return Err(args.malformed("expected '=' after the loop variable").into());
    }
    let from = args.int(&scope)?;
    if !args.eat_word("to") {
        return Err(args.malformed("expected 'to'").into());
    }
    let to = args.int(&scope)?;
    let step = if args.eat_word("step") {
        args.int(&scope)?
    } else {
        1
    };
    if step == 0 {
        return Err(args.malformed("step must not be zero").into());
    }

    engine.state.vars.set_num(var, from)?;
    let body = engine.cursor_after(args).position();
    engine.state.nest.push(NestFrame::For { var, to, step, body });
    if !in_range(from, to, step) {
        debug!("for %{var}: {from} to {to} is empty");
        engine.state.break_pending = true;
    }
    Ok(StepFlags::NONE)
}

fn in_range(value: i32, to: i32, step: i32) -> bool {
    if step > 0 { value <= to } else { value >= to }
}

/// `next`
pub fn next(engine: &mut Engine, _args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let (var, to, step, body) = match *engine.state.nest.top_for("next")? {
        NestFrame::For { var, to, step, body } => (var, to, step, body),
        NestFrame::Label { .. } => {
            return Err(ScriptError::NestMismatch {
                expected: "for",
                found: "next",
            }
            .into());
        }
    };
    if engine.state.break_pending {
        engine.state.break_pending = false;
        engine.state.nest.pop_for("next")?;
        return Ok(StepFlags::NONE);
    }

    let value = engine.state.vars.num(var)?.wrapping_add(step);
    engine.state.vars.set_num(var, value)?;
    if in_range(value, to, step) {
        engine.jump_to_position(body)?;
        Ok(StepFlags::POSITIONED)
    } else {
        engine.state.nest.pop_for("next")?;
        Ok(StepFlags::NONE)
    }
}

/// `break [*label]`: leave the innermost loop, at its `next` or at `label`.
pub fn break_loop(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let target = args.opt_label();
    engine.state.nest.top_for("break")?;
    match target {
        Some(label) => {
            engine.state.nest.pop_for("break")?;
            engine.jump_to(&label)?;
            Ok(StepFlags::POSITIONED)
        }
        None => {
            engine.state.break_pending = true;
            Ok(StepFlags::NONE)
        }
    }
}

/// `end`
pub fn end(_engine: &mut Engine, _args: &mut Args<'_>) -> EngineResult<StepFlags> {
    info!("end of game");
    Ok(StepFlags::TERMINATE)
}

/// `game`: leave the define block and start the game at `*start`.
pub fn game(engine: &mut Engine, _args: &mut Args<'_>) -> EngineResult<StepFlags> {
    engine.jump_to("start")?;
    Ok(StepFlags::POSITIONED)
}

/// `reset`
pub fn reset(engine: &mut Engine, _args: &mut Args<'_>) -> EngineResult<StepFlags> {
    engine.reset_session()?;
    Ok(StepFlags::POSITIONED)
}

fn trap_target(args: &mut Args<'_>) -> ScriptResult<Option<String>> {
    if args.eat_word("off") {
        Ok(None)
    } else {
        args.label().map(Some)
    }
}

/// `trap *label|off`: left click jumps.
pub fn trap(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    engine.state.traps.left = trap_target(args)?;
    Ok(StepFlags::NONE)
}

/// `r_trap *label|off`: right click jumps.
pub fn r_trap(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    engine.state.traps.right = trap_target(args)?;
    Ok(StepFlags::NONE)
}

/// `lr_trap *label|off`: either button jumps.
pub fn lr_trap(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let target = trap_target(args)?;
    engine.state.traps.left.clone_from(&target);
    engine.state.traps.right = target;
    Ok(StepFlags::NONE)
}

impl Engine {
    /// Push a return point after the current command and jump to `label`.
    pub(crate) fn call(&mut self, label: &str, args: &Args<'_>) -> EngineResult<()> {
        let return_to = self.cursor_after(args).position();
        self.jump_to(label)?;
        self.state.nest.push(NestFrame::Label { return_to });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::testing::{engine_with, run};
    use crate::config::EngineConfig;
    use crate::error::EngineError;
    use crate::event::Event;
    use crate::host::RecordingHost;

    fn num(source: &str, index: u32) -> i32 {
        let (engine, _) = run(source, vec![]);
        engine.state().vars.num(index).unwrap()
    }

    #[test]
    fn gosub_returns_after_call() {
        let source = "*start\ngosub *sub : add %0, 10\nend\n*sub\nmov %0, 1\nreturn\n";
        assert_eq!(num(source, 0), 11);
    }

    #[test]
    fn return_to_label() {
        let source = "*start\ngosub *sub\nmov %0, 99\nend\n*sub\nreturn *out\n*out\nmov %1, 5\n";
        let (engine, _) = run(source, vec![]);
        assert_eq!(engine.state().vars.num(0).unwrap(), 0);
        assert_eq!(engine.state().vars.num(1).unwrap(), 5);
        assert_eq!(engine.state().nest.depth(), 0);
    }

    #[test]
    fn return_without_gosub_is_skipped() {
        let (mut engine, _, _) = engine_with(
            "*start\nreturn : mov %0, 3\nmov %1, 4\n",
            EngineConfig::default(),
            RecordingHost::new(),
            vec![],
        );
        assert_eq!(engine.run().unwrap().recovered, 1);
        assert_eq!(engine.state().vars.num(0).unwrap(), 0);
        assert_eq!(engine.state().vars.num(1).unwrap(), 4);
    }

    #[test]
    fn if_and_notif() {
        let source = "*start\nmov %0, 5\nif %0 == 5 mov %1, 1 : mov %2, 2\nif %0 > 5 mov %3, 3 : mov %4, 4\nnotif %0 > 5 mov %5, 5\n";
        let (engine, _) = run(source, vec![]);
        let vars = &engine.state().vars;
        assert_eq!(vars.num(1).unwrap(), 1);
        assert_eq!(vars.num(2).unwrap(), 2);
        assert_eq!(vars.num(3).unwrap(), 0);
        assert_eq!(vars.num(4).unwrap(), 0);
        assert_eq!(vars.num(5).unwrap(), 5);
    }

    #[test]
    fn for_loop_counts() {
        let source = "*start\nfor %0 = 1 to 4\nadd %1, %0\nnext\n";
        let (engine, _) = run(source, vec![]);
        assert_eq!(engine.state().vars.num(1).unwrap(), 10);
        assert_eq!(engine.state().vars.num(0).unwrap(), 5);
        assert_eq!(engine.state().nest.depth(), 0);
    }

    #[test]
    fn one_line_loop_with_negative_step() {
        let source = "*start\nfor %0 = 10 to 1 step -3 : inc %1 : next\n";
        let (engine, _) = run(source, vec![]);
        assert_eq!(engine.state().vars.num(1).unwrap(), 4);
    }

    #[test]
    fn empty_range_skips_body_and_text() {
        let source = "*start\nfor %0 = 3 to 1\nmov %1, 9\n`never shown\nnext\nmov %2, 1\n";
        let (engine, log) = run(source, vec![]);
        assert_eq!(engine.state().vars.num(1).unwrap(), 0);
        assert_eq!(engine.state().vars.num(2).unwrap(), 1);
        assert_eq!(log.text(), "");
        assert!(!engine.state().break_pending);
        assert_eq!(engine.state().nest.depth(), 0);
    }

    #[test]
    fn break_to_next_and_to_label() {
        let source = "*start\nfor %0 = 1 to 10\nif %0 == 3 break\nadd %1, 1\nnext\nfor %2 = 1 to 10\nif %2 == 2 break *done\nnext\n*done\nmov %3, 1\n";
        let (engine, _) = run(source, vec![]);
        let vars = &engine.state().vars;
        assert_eq!(vars.num(1).unwrap(), 2);
        assert_eq!(vars.num(2).unwrap(), 2);
        assert_eq!(vars.num(3).unwrap(), 1);
        assert_eq!(engine.state().nest.depth(), 0);
    }

    #[test]
    fn zero_step_is_rejected() {
        let source = "*start\nfor %0 = 1 to 3 step 0\nmov %1, 1\n";
        assert_eq!(num(source, 1), 1);
    }

    #[test]
    fn next_inside_gosub_is_a_mismatch() {
        let source = "*start\nfor %0 = 1 to 2\ngosub *sub\nnext\nend\n*sub\nnext\nreturn\n";
        let (engine, _) = run(source, vec![]);
        assert_eq!(engine.state().vars.num(0).unwrap(), 3);
    }

    #[test]
    fn game_jumps_to_start() {
        let source = "*define\nmov %0, 1\ngame\n*skipped\nmov %1, 1\n*start\nmov %2, 1\n";
        let (engine, _) = run(source, vec![]);
        let vars = &engine.state().vars;
        assert_eq!(vars.num(0).unwrap(), 1);
        assert_eq!(vars.num(1).unwrap(), 0);
        assert_eq!(vars.num(2).unwrap(), 1);
    }

    #[test]
    fn end_stops_the_session() {
        assert_eq!(num("*start\nend\nmov %0, 1\n", 0), 0);
    }

    #[test]
    fn goto_missing_label_is_fatal() {
        let (mut engine, _, _) = engine_with(
            "*start\ngoto *missing\n",
            EngineConfig::default(),
            RecordingHost::new(),
            vec![],
        );
        assert!(matches!(engine.run(), Err(EngineError::MissingLabel(_))));
    }

    #[test]
    fn trap_fires_on_click() {
        let source = "*start\ntrap *away\nclick\nmov %0, 1\nend\n*away\nmov %1, 1\n";
        let (engine, _) = run(source, vec![Event::click().into()]);
        let state = engine.state();
        assert_eq!(state.vars.num(0).unwrap(), 0);
        assert_eq!(state.vars.num(1).unwrap(), 1);
        assert!(!state.traps.is_armed());
    }

    #[test]
    fn trap_off_and_lr_trap() {
        let (engine, _) = run("*start\nlr_trap *x\n*x\n", vec![]);
        assert_eq!(engine.state().traps.left.as_deref(), Some("x"));
        assert_eq!(engine.state().traps.right.as_deref(), Some("x"));
        let (engine, _) = run("*start\nlr_trap *x : trap off\n*x\n", vec![]);
        assert!(engine.state().traps.left.is_none());
        assert!(engine.state().traps.right.is_some());
    }
}
