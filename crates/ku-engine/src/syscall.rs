//! The system-call sub-machine: menu, save, load, reset, lookback, window
//! erase, skip, automode and end.
//!
//! A system call seizes control from inside a wait. The interrupted wait's
//! buttons, descriptor and window-erase flag are moved into a [`Shelter`]
//! while the call runs its own screens through the ordinary wait loop, and
//! are moved back when it leaves. Calls chain: a menu choice leaves the
//! menu and enters the chosen call without returning to the script.

use std::fmt;

use chrono::DateTime;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::buttons::ButtonSet;
use crate::cursor::ScriptCursor;
use crate::engine::Engine;
use crate::error::EngineResult;
use crate::host::{Redraw, SlotId, SystemUi};
use crate::session::{AudioState, DisplayFlags};
use crate::snapshot;
use crate::wait::{NAV_NEWER, NAV_OLDER, SkipMode, WaitDescriptor, WaitKind, WaitOutcome, WaitRequest};

/// A system call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemCall {
    /// Skip until unread text.
    Skip,
    /// Restart at `*start` after confirmation.
    Reset,
    /// Save to a slot.
    Save,
    /// Load from a slot.
    Load,
    /// Page back through completed text.
    Lookback,
    /// The right-click menu.
    Menu,
    /// Turn automode on.
    Automode,
    /// Hide the text window until the next input.
    WindowErase,
    /// End the game after confirmation.
    End,
}

impl SystemCall {
    /// Every call, in menu order.
    pub const ALL: [SystemCall; 9] = [
        Self::Skip,
        Self::Reset,
        Self::Save,
        Self::Load,
        Self::Lookback,
        Self::Menu,
        Self::Automode,
        Self::WindowErase,
        Self::End,
    ];

    /// Script name, as used by `systemcall` and `rmenu`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Reset => "reset",
            Self::Save => "save",
            Self::Load => "load",
            Self::Lookback => "lookback",
            Self::Menu => "menu",
            Self::Automode => "automode",
            Self::WindowErase => "windowerase",
            Self::End => "end",
        }
    }

    /// Parse a script name. Case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|call| call.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for SystemCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a system call is running, and which.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SystemMode {
    /// Script execution.
    #[default]
    None,
    /// A system call owns the screen.
    Active(SystemCall),
}

/// One `rmenu` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    /// Text shown in the menu.
    pub label: String,
    /// What choosing it runs.
    pub call: SystemCall,
}

/// State moved aside while a system call runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shelter {
    buttons: ButtonSet,
    wait: WaitDescriptor,
    window_erased: bool,
}

impl Shelter {
    /// The interrupted wait's buttons.
    pub fn buttons(&self) -> &ButtonSet {
        &self.buttons
    }

    /// The interrupted wait's descriptor.
    pub fn wait(&self) -> &WaitDescriptor {
        &self.wait
    }

    /// Whether the window was erased when the call started.
    pub fn window_erased(&self) -> bool {
        self.window_erased
    }
}

/// How a system call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCallExit {
    /// The interrupted state is back; keep waiting.
    Restored,
    /// A load or reset replaced the session.
    Superseded,
    /// Input ended or the game was ended.
    Quit,
}

/// What one system screen asks for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Chain(SystemCall),
    Back,
    Leave,
    Superseded,
    Quit,
}

impl Engine {
    /// Move the interrupted wait's state aside and enter `call`.
    pub fn enter_system_call(&mut self, call: SystemCall) -> Shelter {
        debug!("enter system call {call}");
        let shelter = Shelter {
            buttons: std::mem::take(&mut self.state.buttons),
            wait: std::mem::take(&mut self.state.wait),
            window_erased: std::mem::take(&mut self.state.display.window_erased),
        };
        self.state.system = SystemMode::Active(call);
        shelter
    }

    /// Leave the system call. With `restore` the sheltered state comes back
    /// unchanged and the screen is repainted; otherwise the session has been
    /// replaced and the shelter is dropped.
    pub fn leave_system_call(&mut self, shelter: Shelter, restore: bool) {
        debug!("leave system call (restore: {restore})");
        self.state.system = SystemMode::None;
        self.host.show_system_ui(&SystemUi::Closed);
        if !restore {
            return;
        }
        self.state.buttons = shelter.buttons;
        self.state.wait = shelter.wait;
        self.state.display.window_erased = shelter.window_erased;
        self.host.set_window_visible(!shelter.window_erased);
        self.host.show_buttons(&self.state.buttons);
        self.host.request_redraw(Redraw::Full);
    }

    /// Run `call` and everything it chains to. `resume_at` is where a save
    /// made from here resumes.
    pub(crate) fn run_system_call(
        &mut self,
        call: SystemCall,
        resume_at: ScriptCursor,
    ) -> EngineResult<SystemCallExit> {
        let shelter = self.enter_system_call(call);
        let result = self.system_call_chain(call, resume_at, &shelter);
        let restore = matches!(result, Ok(SystemCallExit::Restored));
        self.leave_system_call(shelter, restore);
        result
    }

    fn system_call_chain(
        &mut self,
        call: SystemCall,
        resume_at: ScriptCursor,
        shelter: &Shelter,
    ) -> EngineResult<SystemCallExit> {
        let mut current = call;
        let mut from_menu = false;
        loop {
            self.state.system = SystemMode::Active(current);
            let next = match current {
                SystemCall::Skip => {
                    info!("skip until unread");
                    self.state.skip = SkipMode::UntilUnread;
                    Next::Leave
                }
                SystemCall::Automode => {
                    info!("automode on");
                    self.state.automode = true;
                    Next::Leave
                }
                SystemCall::Menu => self.menu_screen()?,
                SystemCall::Save => self.save_screen(resume_at, shelter)?,
                SystemCall::Load => self.load_screen()?,
                SystemCall::Reset => self.reset_screen()?,
                SystemCall::End => self.end_screen()?,
                SystemCall::Lookback => self.lookback_screen()?,
                SystemCall::WindowErase => self.window_erase_screen()?,
            };
            match next {
                Next::Chain(chained) => {
                    debug!("system call {current} chains to {chained}");
                    from_menu = current == SystemCall::Menu;
                    current = chained;
                }
                Next::Back if from_menu => {
                    from_menu = false;
                    current = SystemCall::Menu;
                }
                Next::Back | Next::Leave => return Ok(SystemCallExit::Restored),
                Next::Superseded => return Ok(SystemCallExit::Superseded),
                Next::Quit => return Ok(SystemCallExit::Quit),
            }
        }
    }

    /// Wait on a system screen. `None` means input ended.
    fn system_wait(&mut self, kind: WaitKind) -> EngineResult<Option<i32>> {
        match self.enter_wait(WaitRequest::new(kind))? {
            WaitOutcome::Resolved(code) => Ok(Some(code)),
            WaitOutcome::Trapped | WaitOutcome::Superseded | WaitOutcome::Quit => Ok(None),
        }
    }

    /// Show a column of entries as buttons and wait for one. `Some(Some(n))`
    /// is the 1-based entry, `Some(None)` a cancel.
    fn pick<I, S>(&mut self, ui: &SystemUi, entries: I) -> EngineResult<Option<Option<usize>>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = entries.into_iter().zip(1..);
        self.state.buttons = ButtonSet::text_column(entries, &self.config.layout);
        self.host.show_system_ui(ui);
        self.host.show_buttons(&self.state.buttons);
        let code = self.system_wait(WaitKind::SystemUi)?;
        self.state.buttons = ButtonSet::new();
        Ok(code.map(|c| usize::try_from(c).ok().filter(|n| *n >= 1)))
    }

    /// A yes/no dialog. `None` means input ended.
    fn confirm(&mut self, message: String) -> EngineResult<Option<bool>> {
        let ui = SystemUi::Confirm { message };
        let answer = self.pick(&ui, ["Yes", "No"])?;
        Ok(answer.map(|choice| choice == Some(1)))
    }

    fn menu_screen(&mut self) -> EngineResult<Next> {
        if self.settings.rmenu.is_empty() {
            return Ok(Next::Leave);
        }
        let entries: Vec<String> = self.settings.rmenu.iter().map(|e| e.label.clone()).collect();
        let ui = SystemUi::Menu {
            entries: entries.clone(),
        };
        Ok(match self.pick(&ui, entries)? {
            None => Next::Quit,
            Some(None) => Next::Leave,
            Some(Some(n)) => match self.settings.rmenu.get(n - 1) {
                Some(entry) => Next::Chain(entry.call),
                None => Next::Leave,
            },
        })
    }

    fn slot_entries(&self) -> Vec<String> {
        (1..=self.settings.save_slots)
            .map(|n| {
                let stamp = self
                    .host
                    .read_slot(SlotId(n))
                    .ok()
                    .flatten()
                    .and_then(|bytes| snapshot::read_header(&bytes, snapshot::MAGIC).ok())
                    .and_then(|header| DateTime::from_timestamp(header.timestamp, 0));
                match stamp {
                    Some(time) => format!("{n}: {}", time.format("%Y-%m-%d %H:%M")),
                    None => format!("{n}: empty"),
                }
            })
            .collect()
    }

    fn save_screen(&mut self, resume_at: ScriptCursor, shelter: &Shelter) -> EngineResult<Next> {
        loop {
            let entries = self.slot_entries();
            let ui = SystemUi::Slots {
                saving: true,
                entries: entries.clone(),
            };
            let slot = match self.pick(&ui, entries)? {
                None => return Ok(Next::Quit),
                Some(None) => return Ok(Next::Back),
                Some(Some(n)) => slot_number(n),
            };
            match self.confirm(format!("Save to slot {slot}?"))? {
                None => return Ok(Next::Quit),
                Some(false) => continue,
                Some(true) => {}
            }
            if let Err(e) = self.save_slot(slot, resume_at, Some(shelter)) {
                warn!("save to slot {slot} failed: {e}");
                continue;
            }
            return Ok(Next::Leave);
        }
    }

    fn load_screen(&mut self) -> EngineResult<Next> {
        loop {
            let entries = self.slot_entries();
            let ui = SystemUi::Slots {
                saving: false,
                entries: entries.clone(),
            };
            let slot = match self.pick(&ui, entries)? {
                None => return Ok(Next::Quit),
                Some(None) => return Ok(Next::Back),
                Some(Some(n)) => slot_number(n),
            };
            match self.confirm(format!("Load slot {slot}?"))? {
                None => return Ok(Next::Quit),
                Some(false) => continue,
                Some(true) => {}
            }
            match self.load_slot(slot) {
                Ok(()) => return Ok(Next::Superseded),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("load from slot {slot} failed: {e}"),
            }
        }
    }

    fn reset_screen(&mut self) -> EngineResult<Next> {
        Ok(match self.confirm("Return to the title?".into())? {
            None => Next::Quit,
            Some(false) => Next::Back,
            Some(true) => {
                self.reset_session()?;
                Next::Superseded
            }
        })
    }

    fn end_screen(&mut self) -> EngineResult<Next> {
        Ok(match self.confirm("Quit the game?".into())? {
            None => Next::Quit,
            Some(false) => Next::Back,
            Some(true) => {
                info!("game ended from the menu");
                Next::Quit
            }
        })
    }

    fn lookback_screen(&mut self) -> EngineResult<Next> {
        let total = self.state.pages.completed_len();
        let mut index = 0;
        while index < total {
            let page = self.state.pages.page_back(index).unwrap_or_default().to_string();
            self.host
                .show_system_ui(&SystemUi::Lookback { page, index, total });
            match self.system_wait(WaitKind::Lookback)? {
                None => return Ok(Next::Quit),
                Some(NAV_OLDER) => index = (index + 1).min(total - 1),
                Some(NAV_NEWER) if index == 0 => break,
                Some(NAV_NEWER) => index -= 1,
                Some(_) => break,
            }
        }
        Ok(Next::Leave)
    }

    fn window_erase_screen(&mut self) -> EngineResult<Next> {
        self.state.display.window_erased = true;
        self.host.set_window_visible(false);
        self.host.show_system_ui(&SystemUi::WindowErased);
        let next = match self.system_wait(WaitKind::WindowErased)? {
            None => Next::Quit,
            Some(_) => Next::Leave,
        };
        self.state.display.window_erased = false;
        Ok(next)
    }

    /// Clear everything local and restart at `*start`. Global registers,
    /// the read log and the script's settings survive.
    pub(crate) fn reset_session(&mut self) -> EngineResult<()> {
        info!("reset");
        let previous_display = std::mem::replace(
            &mut self.state.display,
            DisplayFlags {
                text_speed: self.config.text_speed,
                ..DisplayFlags::default()
            },
        );
        let previous_audio = std::mem::take(&mut self.state.audio);
        let state = &mut self.state;
        state.vars.clear_locals();
        state.nest.clear();
        state.pages.clear();
        state.buttons = ButtonSet::new();
        state.traps.clear();
        state.btntime = None;
        state.skip = SkipMode::Off;
        state.automode = false;
        state.break_pending = false;
        self.redisplay(&previous_display);
        self.resume_audio(&previous_audio);
        self.jump_to("start")
    }
}

fn slot_number(n: usize) -> SlotId {
    SlotId(u32::try_from(n).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::engine_with;
    use crate::config::EngineConfig;
    use crate::event::{Event, Key, TraceStep};
    use crate::host::{HostCall, RecordingHost};
    use crate::wait::WaitReasons;

    fn engine(source: &str, trace: Vec<TraceStep>) -> (Engine, crate::host::Recording) {
        let (engine, log, _) = engine_with(source, EngineConfig::default(), RecordingHost::new(), trace);
        (engine, log)
    }

    #[test]
    fn names_round_trip() {
        for call in SystemCall::ALL {
            assert_eq!(SystemCall::from_name(call.name()), Some(call));
        }
        assert_eq!(SystemCall::from_name("LookBack"), Some(SystemCall::Lookback));
        assert_eq!(SystemCall::from_name("quit"), None);
        assert_eq!(SystemCall::WindowErase.to_string(), "windowerase");
    }

    #[test]
    fn shelter_restores_bit_for_bit() {
        let (mut e, _) = engine("*start\n", vec![]);
        e.state.buttons.add(
            crate::buttons::ButtonKind::Region,
            crate::host::Rect::new(0, 0, 5, 5),
            3,
        );
        e.state.wait.arm(&WaitRequest::new(WaitKind::ButtonSelect));
        e.state.display.window_erased = true;
        let (buttons, wait) = (e.state.buttons.clone(), e.state.wait.clone());

        let shelter = e.enter_system_call(SystemCall::Menu);
        assert!(e.state.buttons.is_empty());
        assert!(e.state.wait.is_idle());
        assert!(!e.state.display.window_erased);
        assert_eq!(e.state.system, SystemMode::Active(SystemCall::Menu));
        e.state.buttons.add(
            crate::buttons::ButtonKind::Text("Save".into()),
            crate::host::Rect::new(0, 0, 5, 5),
            1,
        );
        e.state.wait.arm(&WaitRequest::new(WaitKind::SystemUi));

        e.leave_system_call(shelter, true);
        assert_eq!(e.state.buttons, buttons);
        assert_eq!(e.state.wait, wait);
        assert!(e.state.wait.reasons.contains(WaitReasons::BUTTON));
        assert!(e.state.display.window_erased);
        assert_eq!(e.state.system, SystemMode::None);
    }

    #[test]
    fn leave_without_restore_drops_shelter() {
        let (mut e, _) = engine("*start\n", vec![]);
        e.state.wait.arm(&WaitRequest::new(WaitKind::ClickCommand));
        let shelter = e.enter_system_call(SystemCall::Load);
        e.leave_system_call(shelter, false);
        assert!(e.state.wait.is_idle());
    }

    #[test]
    fn skip_call_resolves_the_interrupted_wait() {
        let (mut e, _) = engine(
            "*start\nclick\nclick\nmov %0, 1\n",
            vec![Event::char('s').into()],
        );
        e.run().unwrap();
        assert_eq!(e.state().vars.num(0).unwrap(), 1);
        assert_eq!(e.state().skip, SkipMode::UntilUnread);
    }

    #[test]
    fn menu_chains_to_save_and_returns() {
        let source = "*define\nrmenu \"Save\", save, \"Load\", load\ngame\n*start\nmov %0, 5\nclick\nmov %1, 1\n";
        let host = RecordingHost::new();
        let storage = host.storage();
        let (mut e, log, _) = engine_with(
            source,
            EngineConfig::default(),
            host,
            vec![
                Event::right_click().into(),
                Event::char('1').into(),
                Event::char('2').into(),
                Event::char('1').into(),
                Event::click().into(),
            ],
        );
        e.run().unwrap();
        assert_eq!(e.state().vars.num(1).unwrap(), 1);
        assert!(storage.occupied().contains(&SlotId(2)));
        assert!(log.calls().iter().any(|c| matches!(c, HostCall::SystemUi(SystemUi::Menu { .. }))));
        assert!(log.calls().iter().any(|c| matches!(
            c,
            HostCall::SystemUi(SystemUi::Slots { saving: true, .. })
        )));
        assert!(log.calls().contains(&HostCall::SystemUi(SystemUi::Closed)));
    }

    #[test]
    fn cancel_in_save_list_goes_back_to_menu() {
        let source = "*define\nrmenu \"Save\", save\ngame\n*start\nclick\nmov %0, 1\n";
        let (mut e, log) = engine(
            source,
            vec![
                Event::right_click().into(),
                Event::char('1').into(),
                Event::key(Key::Escape).into(),
                Event::key(Key::Escape).into(),
                Event::click().into(),
            ],
        );
        e.run().unwrap();
        assert_eq!(e.state().vars.num(0).unwrap(), 1);
        let menus = log.count(|c| matches!(c, HostCall::SystemUi(SystemUi::Menu { .. })));
        assert_eq!(menus, 2);
    }

    #[test]
    fn window_erase_without_menu() {
        let (mut e, log) = engine(
            "*start\nclick\nmov %0, 1\n",
            vec![
                Event::right_click().into(),
                Event::key(Key::Return).into(),
                Event::click().into(),
            ],
        );
        e.run().unwrap();
        assert_eq!(e.state().vars.num(0).unwrap(), 1);
        assert!(log.calls().contains(&HostCall::Window(false)));
        assert!(log.calls().contains(&HostCall::SystemUi(SystemUi::WindowErased)));
        assert!(!e.state().display.window_erased);
    }

    #[test]
    fn lookback_pages_and_exits() {
        let (mut e, log) = engine(
            "*start\n`one\\\n`two\\\n`three@\n",
            vec![
                Event::click().into(),
                Event::click().into(),
                Event::key(Key::Up).into(),
                Event::key(Key::Up).into(),
                Event::key(Key::Up).into(),
                Event::key(Key::Down).into(),
                Event::key(Key::Down).into(),
                Event::click().into(),
            ],
        );
        e.run().unwrap();
        let pages: Vec<(String, usize)> = log
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::SystemUi(SystemUi::Lookback { page, index, .. }) => Some((page, index)),
                _ => None,
            })
            .collect();
        assert_eq!(
            pages,
            vec![
                ("two".to_string(), 0),
                ("one".to_string(), 1),
                ("one".to_string(), 1),
                ("two".to_string(), 0),
            ]
        );
        assert_eq!(e.state().pages.current(), "three\n");
    }

    #[test]
    fn end_asks_first() {
        let (mut e, _) = engine(
            "*start\nsystemcall end\nmov %0, 1\nsystemcall end\nmov %1, 1\n",
            vec![Event::char('2').into(), Event::char('1').into()],
        );
        e.run().unwrap();
        assert_eq!(e.state().vars.num(0).unwrap(), 1);
        assert_eq!(e.state().vars.num(1).unwrap(), 0);
        assert_eq!(e.loop_state(), crate::engine::LoopState::Terminated);
    }

    #[test]
    fn reset_clears_locals_and_restarts() {
        let (mut e, _) = engine(
            "*start\nadd %0, 1\nadd %300, 1\nif %300 == 1 systemcall reset\n",
            vec![Event::char('1').into()],
        );
        e.run().unwrap();
        let vars = &e.state().vars;
        assert_eq!(vars.num(0).unwrap(), 1);
        assert_eq!(vars.num(300).unwrap(), 2);
    }

    #[test]
    fn system_calls_are_dropped_during_sleep() {
        let (mut e, _) = engine(
            "*start\nw100\nmov %0, 1\n",
            vec![
                Event::SystemCall {
                    call: SystemCall::Menu,
                }
                .into(),
            ],
        );
        e.run().unwrap();
        assert_eq!(e.state().vars.num(0).unwrap(), 1);
        assert_eq!(e.state().system, SystemMode::None);
    }
}
