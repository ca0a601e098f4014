//! Save, load, system calls and the settings scripts declare in `*define`.

use ku_script::Token;
use log::{debug, info};

use crate::args::Args;
use crate::dispatch::StepFlags;
use crate::engine::Engine;
use crate::error::EngineResult;
use crate::host::SlotId;
use crate::page::PageBuffer;
use crate::syscall::{MenuEntry, SystemCall, SystemCallExit};
use crate::wait::SkipMode;

/// Highest user slot `savenumber` accepts.
const MAX_SAVE_SLOTS: u32 = 99;

fn system_call(args: &mut Args<'_>) -> EngineResult<SystemCall> {
    let name = args.word()?;
    SystemCall::from_name(&name)
        .ok_or_else(|| args.malformed(format!("unknown system call {name}")).into())
}

/// `rmenu "label", call, ...`: replace the right-click menu.
pub fn rmenu(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let mut entries = Vec::new();
    loop {
        let label = args.string(&scope)?;
        args.comma()?;
        let call = system_call(args)?;
        entries.push(MenuEntry { label, call });
        if !args.eat(&Token::Comma) {
            break;
        }
    }
    debug!("rmenu with {} entries", entries.len());
    engine.settings.rmenu = entries;
    Ok(StepFlags::NONE)
}

/// `rmode on|off`
pub fn rmode(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let on = args.switch(&engine.scope())?;
    engine.settings.rmode = on;
    Ok(StepFlags::NONE)
}

/// `savenumber n`: how many user slots the save and load screens offer.
pub fn savenumber(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let n = args.uint(&engine.scope())?;
    engine.settings.save_slots = n.clamp(1, MAX_SAVE_SLOTS);
    Ok(StepFlags::NONE)
}

fn user_slot(engine: &Engine, args: &mut Args<'_>) -> EngineResult<SlotId> {
    let n = args.uint(&engine.scope())?;
    if !(1..=engine.settings.save_slots).contains(&n) {
        return Err(args
            .malformed(format!(
                "slot {n} is not in 1..={}",
                engine.settings.save_slots
            ))
            .into());
    }
    Ok(SlotId(n))
}

/// `savegame n`: save to a slot; loading it resumes after this command.
pub fn savegame(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let slot = user_slot(engine, args)?;
    let resume_at = engine.cursor_after(args);
    engine.save_slot(slot, resume_at, None)?;
    Ok(StepFlags::NONE)
}

/// `loadgame n`
pub fn loadgame(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let slot = user_slot(engine, args)?;
    engine.load_slot(slot)?;
    Ok(StepFlags::POSITIONED)
}

/// `systemcall name`: run a system call as if the player had asked for it.
pub fn systemcall(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let call = system_call(args)?;
    let resume_at = engine.cursor_after(args);
    Ok(match engine.run_system_call(call, resume_at)? {
        SystemCallExit::Restored => StepFlags::NONE,
        SystemCallExit::Superseded => StepFlags::POSITIONED,
        SystemCallExit::Quit => StepFlags::TERMINATE,
    })
}

/// `skipoff`
pub fn skipoff(engine: &mut Engine, _args: &mut Args<'_>) -> EngineResult<StepFlags> {
    engine.set_skip_mode(SkipMode::Off);
    Ok(StepFlags::NONE)
}

/// `automode_time ms`
pub fn automode_time(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let ms = args.uint(&engine.scope())?;
    engine.settings.automode_delay = ms;
    Ok(StepFlags::NONE)
}

/// `kidokuskip [on|off]`: skip stops at unread text.
pub fn kidokuskip(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let on = if args.at_end() {
        true
    } else {
        args.switch(&engine.scope())?
    };
    engine.settings.kidoku_skip = on;
    Ok(StepFlags::NONE)
}

/// `maxkaisoupage n`: lookback capacity. Kept pages beyond it are dropped,
/// oldest first.
pub fn maxkaisoupage(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let n = args.uint(&engine.scope())?;
    let capacity = usize::try_from(n).unwrap_or(usize::MAX).max(1);
    let pages = &engine.state.pages;
    let resized = PageBuffer::from_pages(capacity, pages.completed(), pages.current().to_string());
    engine.state.pages = resized;
    engine.settings.page_capacity = capacity;
    info!("lookback keeps {capacity} pages");
    Ok(StepFlags::NONE)
}

#[cfg(test)]
mod tests {
    use crate::commands::testing::{engine_with, run};
    use crate::config::EngineConfig;
    use crate::engine::LoopState;
    use crate::event::Event;
    use crate::host::{RecordingHost, SlotId};
    use crate::syscall::SystemCall;
    use crate::wait::SkipMode;

    #[test]
    fn define_time_settings() {
        let source = "*define\nrmenu \"Save\", save, \"Back log\", LOOKBACK\nrmode off\nsavenumber 200\nautomode_time 900\nkidokuskip\nmaxkaisoupage 3\ngame\n*start\n";
        let (engine, _) = run(source, vec![]);
        let settings = engine.settings();
        let calls: Vec<_> = settings.rmenu.iter().map(|e| (e.label.as_str(), e.call)).collect();
        assert_eq!(
            calls,
            vec![("Save", SystemCall::Save), ("Back log", SystemCall::Lookback)]
        );
        assert!(!settings.rmode);
        assert_eq!(settings.save_slots, 99);
        assert_eq!(settings.automode_delay, 900);
        assert!(settings.kidoku_skip);
        assert_eq!(engine.state().pages.capacity(), 3);
    }

    #[test]
    fn unknown_menu_call_is_skipped() {
        let (mut engine, _, _) = engine_with(
            "*start\nrmenu \"Fly\", fly\n",
            EngineConfig::default(),
            RecordingHost::new(),
            vec![],
        );
        assert_eq!(engine.run().unwrap().recovered, 1);
        assert!(engine.settings().rmenu.is_empty());
    }

    #[test]
    fn savegame_then_loadgame_resumes_after_save() {
        let source = "*start\nmov %0, 1\nsavegame 2 : add %0, 10\nadd %300, 1\nif %300 == 1 mov %0, 50 : loadgame 2\nmov %1, %0\n";
        let host = RecordingHost::new();
        let storage = host.storage();
        let (mut engine, _, _) = engine_with(source, EngineConfig::default(), host, vec![]);
        engine.run().unwrap();
        assert!(storage.occupied().contains(&SlotId(2)));
        assert_eq!(engine.state().vars.num(300).unwrap(), 2);
        assert_eq!(engine.state().vars.num(1).unwrap(), 11);
    }

    #[test]
    fn slot_outside_range_is_malformed() {
        let (mut engine, _, _) = engine_with(
            "*start\nsavenumber 3\nsavegame 4\nloadgame 0\n",
            EngineConfig::default(),
            RecordingHost::new(),
            vec![],
        );
        assert_eq!(engine.run().unwrap().recovered, 2);
    }

    #[test]
    fn loading_an_empty_slot_is_skipped() {
        let (mut engine, _, _) = engine_with(
            "*start\nloadgame 1\nmov %0, 1\n",
            EngineConfig::default(),
            RecordingHost::new(),
            vec![],
        );
        assert_eq!(engine.run().unwrap().recovered, 1);
        assert_eq!(engine.state().vars.num(0).unwrap(), 1);
    }

    #[test]
    fn systemcall_skip_and_skipoff() {
        let (engine, _) = run("*start\nsystemcall skip\nmov %0, 1\n", vec![]);
        assert_eq!(engine.state().skip, SkipMode::UntilUnread);
        let (engine, _) = run("*start\nsystemcall skip : skipoff\n", vec![]);
        assert_eq!(engine.state().skip, SkipMode::Off);
    }

    #[test]
    fn systemcall_end_terminates() {
        let (engine, _) = run(
            "*start\nsystemcall end\nmov %0, 1\n",
            vec![Event::char('1').into()],
        );
        assert_eq!(engine.loop_state(), LoopState::Terminated);
        assert_eq!(engine.state().vars.num(0).unwrap(), 0);
    }
}
