//! The wait/event state machine.
//!
//! Every suspension goes through [`Engine::enter_wait`]: it arms the single
//! live [`WaitDescriptor`], then runs one blocking inner loop that feeds
//! events through the pure [`resolve`] function until something resolves
//! the wait. Skip modes and automode are applied at the top of that loop.

use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::buttons::{ButtonId, ButtonSet};
use crate::dispatch::StepFlags;
use crate::engine::Engine;
use crate::error::EngineResult;
use crate::event::{Event, Key, PointerButton, TimerId};
use crate::host::Redraw;
use crate::syscall::{SystemCall, SystemCallExit, SystemMode};

/// Click or timeout.
pub const CLICKED: i32 = 0;
/// Right-click, Escape, or a dismissed dialog.
pub const CANCELLED: i32 = -1;
/// A `btntime` limit ran out.
pub const TIMED_OUT: i32 = -2;
/// Lookback: one page older.
pub const NAV_OLDER: i32 = -3;
/// Lookback: one page newer.
pub const NAV_NEWER: i32 = -4;

/// Which command path armed the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitKind {
    /// `click`.
    ClickCommand,
    /// `@` inside text.
    InlinePause,
    /// `\` inside text.
    PageEnd,
    /// `wait`.
    Sleep,
    /// `w<ms>`.
    HardSleep,
    /// `delay`, `d<ms>`.
    Delay,
    /// Text being drawn character by character.
    TextAnimation,
    /// `voicewait`.
    VoiceWait,
    /// `btnwait`.
    ButtonSelect,
    /// `select` and friends.
    Choice,
    /// A system-call screen.
    SystemUi,
    /// Lookback pages.
    Lookback,
    /// The text window is hidden until the next click or key.
    WindowErased,
}

impl WaitKind {
    /// The reasons armed for this kind.
    pub fn reasons(self) -> WaitReasons {
        use WaitReasons as R;
        match self {
            Self::ClickCommand | Self::InlinePause | Self::Lookback | Self::WindowErased => {
                R::CLICK
            }
            Self::PageEnd => R::CLICK | R::PAGE_END,
            Self::Sleep | Self::HardSleep => R::TIMER,
            Self::Delay => R::TIMER | R::CLICK,
            Self::TextAnimation => R::ANIMATION | R::CLICK | R::TIMER,
            Self::VoiceWait => R::VOICE | R::CLICK,
            Self::ButtonSelect | Self::Choice => R::BUTTON,
            Self::SystemUi => R::CLICK | R::BUTTON,
        }
    }

    /// Click-type waits: the ones automode resolves and `ToNextPause` stops at.
    pub fn is_click_like(self) -> bool {
        matches!(self, Self::ClickCommand | Self::InlinePause | Self::PageEnd)
    }

    /// Whether a trap may fire during this wait.
    pub fn allows_trap(self) -> bool {
        !matches!(self, Self::SystemUi | Self::Lookback | Self::WindowErased)
    }

    /// Waits no skip mode may run through.
    pub fn halts_skip(self) -> bool {
        matches!(self, Self::Choice | Self::ButtonSelect)
    }

    /// Whether a system call may interrupt this wait.
    pub fn allows_system_call(self) -> bool {
        matches!(
            self,
            Self::ClickCommand
                | Self::InlinePause
                | Self::PageEnd
                | Self::ButtonSelect
                | Self::Choice
        )
    }
}

/// Independent reasons a wait is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaitReasons(u8);

impl WaitReasons {
    /// No reason.
    pub const NONE: Self = Self(0);
    /// A click resolves.
    pub const CLICK: Self = Self(1);
    /// End of a text page.
    pub const PAGE_END: Self = Self(1 << 1);
    /// A timer resolves.
    pub const TIMER: Self = Self(1 << 2);
    /// A voice channel finishing resolves.
    pub const VOICE: Self = Self(1 << 3);
    /// A button choice resolves.
    pub const BUTTON: Self = Self(1 << 4);
    /// Text animation is running.
    pub const ANIMATION: Self = Self(1 << 5);
    /// Do not show the click cursor.
    pub const SUPPRESS_ANIMATION: Self = Self(1 << 6);

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Whether no bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for WaitReasons {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for WaitReasons {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Skip state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipMode {
    /// Not skipping.
    #[default]
    Off,
    /// Skip everything skippable (until unread text with `kidokuskip`).
    UntilUnread,
    /// Skip to the end of the page, then stop.
    ToPageEnd,
    /// Finish the current text animation, stop at the next pause.
    ToNextPause,
    /// Finish text animation up to the end of the line.
    ToLineEnd,
}

impl SkipMode {
    /// Whether this mode resolves a wait kind without reading any event.
    pub fn resolves(self, kind: WaitKind) -> bool {
        use WaitKind as K;
        match self {
            Self::Off => false,
            Self::UntilUnread => matches!(
                kind,
                K::ClickCommand
                    | K::InlinePause
                    | K::PageEnd
                    | K::Sleep
                    | K::Delay
                    | K::TextAnimation
                    | K::VoiceWait
            ),
            Self::ToPageEnd => matches!(
                kind,
                K::InlinePause | K::PageEnd | K::Delay | K::TextAnimation
            ),
            Self::ToNextPause | Self::ToLineEnd => kind == K::TextAnimation,
        }
    }
}

/// Armed trap labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traps {
    /// Jump target on left click.
    pub left: Option<String>,
    /// Jump target on right click.
    pub right: Option<String>,
}

impl Traps {
    /// Disarm both.
    pub fn clear(&mut self) {
        self.left = None;
        self.right = None;
    }

    /// Whether any trap is armed.
    pub fn is_armed(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }
}

/// A timer armed for the current wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    /// Id carried by the expiry event.
    pub id: TimerId,
    /// Absolute deadline on the event source clock.
    pub deadline: Duration,
    /// Code delivered on expiry.
    pub code: i32,
}

/// The one live wait.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitDescriptor {
    /// What is waiting; `None` when idle.
    pub kind: Option<WaitKind>,
    /// Pending reasons.
    pub reasons: WaitReasons,
    /// Armed timer.
    pub timer: Option<ArmedTimer>,
    /// Armed voice channel.
    pub voice_channel: Option<u32>,
    /// Automode waits for the voice before starting its delay.
    pub auto_pending: bool,
}

impl WaitDescriptor {
    /// Whether nothing is waiting.
    pub fn is_idle(&self) -> bool {
        self.kind.is_none()
    }

    /// Arm for a request.
    pub fn arm(&mut self, request: &WaitRequest) {
        *self = Self {
            kind: Some(request.kind),
            reasons: request.kind.reasons(),
            timer: None,
            voice_channel: request.voice_channel,
            auto_pending: false,
        };
    }

    /// Arm a timer, replacing any armed one.
    pub fn arm_timer(&mut self, id: TimerId, deadline: Duration, code: i32) {
        self.reasons.insert(WaitReasons::TIMER);
        self.timer = Some(ArmedTimer { id, deadline, code });
    }

    /// Wait for a voice channel before automode's delay starts.
    pub fn arm_voice_for_automode(&mut self, channel: u32) {
        self.reasons.insert(WaitReasons::VOICE);
        self.voice_channel = Some(channel);
        self.auto_pending = true;
    }

    /// The voice finished; automode may start its delay.
    pub fn voice_finished(&mut self) {
        self.reasons.remove(WaitReasons::VOICE);
        self.voice_channel = None;
        self.auto_pending = false;
    }

    /// Return to idle.
    pub fn disarm(&mut self) {
        *self = Self::default();
    }
}

/// What a command asks the wait machine for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitRequest {
    /// Wait kind.
    pub kind: WaitKind,
    /// Relative timeout and the code it delivers.
    pub timeout: Option<(Duration, i32)>,
    /// Voice channel to wait on.
    pub voice_channel: Option<u32>,
}

impl WaitRequest {
    /// A request without timer or voice.
    pub fn new(kind: WaitKind) -> Self {
        Self {
            kind,
            timeout: None,
            voice_channel: None,
        }
    }

    /// Resolve with `code` after `ms` milliseconds.
    pub fn with_timeout(mut self, ms: u32, code: i32) -> Self {
        self.timeout = Some((Duration::from_millis(u64::from(ms)), code));
        self
    }

    /// Resolve when an effect channel finishes.
    pub fn with_voice(mut self, channel: u32) -> Self {
        self.voice_channel = Some(channel);
        self
    }
}

/// What one event means for the current wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Irrelevant or stale.
    Dropped,
    /// The pointer moved onto another button (or off all of them).
    Hover(Option<ButtonId>),
    /// The wait is over with this code.
    Resolved(i32),
    /// A trap fires.
    Trap(String),
    /// Run a system call.
    SystemCall(SystemCall),
    /// The armed voice channel finished.
    VoiceFinished,
    /// Toggle a skip mode from the keyboard.
    ToggleSkip(SkipMode),
    /// Input ended.
    Quit,
}

/// Everything [`resolve`] may look at.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// The live wait.
    pub descriptor: &'a WaitDescriptor,
    /// Active buttons.
    pub buttons: &'a ButtonSet,
    /// Armed traps.
    pub traps: &'a Traps,
    /// Right-click opens the menu.
    pub rmode: bool,
    /// The menu has entries.
    pub has_menu: bool,
    /// A system call is already running.
    pub in_system_call: bool,
}

/// Map one event onto the current wait. Pure: the caller applies the result.
pub fn resolve(event: &Event, ctx: &ResolveContext<'_>) -> Resolution {
    let Some(kind) = ctx.descriptor.kind else {
        return Resolution::Dropped;
    };
    if kind == WaitKind::WindowErased {
        return match event {
            Event::Quit => Resolution::Quit,
            Event::PointerPress { .. } | Event::KeyDown { .. } => Resolution::Resolved(CLICKED),
            _ => Resolution::Dropped,
        };
    }
    match event {
        Event::Quit => Resolution::Quit,
        Event::Timer { id } => match ctx.descriptor.timer {
            Some(timer) if timer.id == *id => Resolution::Resolved(timer.code),
            _ => Resolution::Dropped,
        },
        Event::ChannelFinished { channel } => {
            let armed = ctx.descriptor.reasons.contains(WaitReasons::VOICE)
                && ctx.descriptor.voice_channel == Some(*channel);
            if armed {
                Resolution::VoiceFinished
            } else {
                Resolution::Dropped
            }
        }
        Event::PointerMove { x, y } => {
            if !ctx.descriptor.reasons.contains(WaitReasons::BUTTON) {
                return Resolution::Dropped;
            }
            let target = ctx.buttons.hit(*x, *y);
            if target == ctx.buttons.hovered() {
                Resolution::Dropped
            } else {
                Resolution::Hover(target)
            }
        }
        Event::PointerPress { button, x, y } => match button {
            PointerButton::Left => primary(kind, ctx, Some((*x, *y))),
            PointerButton::Right => secondary(kind, ctx),
            PointerButton::WheelUp => older(kind, ctx),
            PointerButton::WheelDown => newer(kind),
        },
        Event::KeyDown { key } => match key {
            Key::Return | Key::Space => primary(kind, ctx, None),
            Key::Escape => secondary(kind, ctx),
            Key::Up | Key::PageUp => older(kind, ctx),
            Key::Down | Key::PageDown => newer(kind),
            Key::Char(c) => shortcut(kind, ctx, c.to_ascii_lowercase()),
        },
        Event::PointerRelease { .. } | Event::KeyUp { .. } => Resolution::Dropped,
        Event::SystemCall { call } => {
            if may_interrupt(kind, ctx) {
                Resolution::SystemCall(*call)
            } else {
                Resolution::Dropped
            }
        }
    }
}

fn may_interrupt(kind: WaitKind, ctx: &ResolveContext<'_>) -> bool {
    kind.allows_system_call() && !ctx.in_system_call
}

fn primary(kind: WaitKind, ctx: &ResolveContext<'_>, at: Option<(i32, i32)>) -> Resolution {
    if kind.allows_trap() {
        if let Some(label) = &ctx.traps.left {
            return Resolution::Trap(label.clone());
        }
    }
    let reasons = ctx.descriptor.reasons;
    if reasons.contains(WaitReasons::BUTTON) {
        let target = match at {
            Some((x, y)) => ctx.buttons.hit(x, y),
            None => ctx.buttons.hovered(),
        };
        if let Some(button) = target.and_then(|id| ctx.buttons.get(id)) {
            return Resolution::Resolved(button.value);
        }
        if kind == WaitKind::ButtonSelect {
            return Resolution::Resolved(CLICKED);
        }
        if !ctx.buttons.is_empty() {
            return Resolution::Dropped;
        }
    }
    if reasons.contains(WaitReasons::CLICK) {
        Resolution::Resolved(CLICKED)
    } else {
        Resolution::Dropped
    }
}

fn secondary(kind: WaitKind, ctx: &ResolveContext<'_>) -> Resolution {
    if kind.allows_trap() {
        if let Some(label) = &ctx.traps.right {
            return Resolution::Trap(label.clone());
        }
    }
    if ctx.in_system_call || !kind.allows_trap() {
        return Resolution::Resolved(CANCELLED);
    }
    if ctx.rmode && may_interrupt(kind, ctx) {
        return Resolution::SystemCall(if ctx.has_menu {
            SystemCall::Menu
        } else {
            SystemCall::WindowErase
        });
    }
    if kind == WaitKind::ButtonSelect {
        Resolution::Resolved(CANCELLED)
    } else {
        Resolution::Dropped
    }
}

fn older(kind: WaitKind, ctx: &ResolveContext<'_>) -> Resolution {
    if kind == WaitKind::Lookback {
        Resolution::Resolved(NAV_OLDER)
    } else if may_interrupt(kind, ctx) {
        Resolution::SystemCall(SystemCall::Lookback)
    } else {
        Resolution::Dropped
    }
}

fn newer(kind: WaitKind) -> Resolution {
    if kind == WaitKind::Lookback {
        Resolution::Resolved(NAV_NEWER)
    } else {
        Resolution::Dropped
    }
}

fn shortcut(kind: WaitKind, ctx: &ResolveContext<'_>, c: char) -> Resolution {
    if let Some(n) = c.to_digit(10) {
        if !ctx.descriptor.reasons.contains(WaitReasons::BUTTON) {
            return Resolution::Dropped;
        }
        return match ctx
            .buttons
            .by_ordinal(n as usize)
            .and_then(|id| ctx.buttons.get(id))
        {
            Some(button) => Resolution::Resolved(button.value),
            None => Resolution::Dropped,
        };
    }
    if !may_interrupt(kind, ctx) {
        return Resolution::Dropped;
    }
    match c {
        's' | 'o' if kind.halts_skip() => Resolution::Dropped,
        's' => Resolution::SystemCall(SystemCall::Skip),
        'a' => Resolution::SystemCall(SystemCall::Automode),
        'o' => Resolution::ToggleSkip(SkipMode::ToPageEnd),
        _ => Resolution::Dropped,
    }
}

/// How a wait ended, from the command's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Resolved with a code; the command finishes its work.
    Resolved(i32),
    /// A trap moved the cursor.
    Trapped,
    /// A load or reset replaced the session.
    Superseded,
    /// Input ended.
    Quit,
}

impl WaitOutcome {
    /// Step flags for an outcome that did not resolve. The command must
    /// return these without touching the session.
    pub fn interrupted(self) -> StepFlags {
        match self {
            Self::Quit => StepFlags::TERMINATE,
            Self::Resolved(_) | Self::Trapped | Self::Superseded => StepFlags::POSITIONED,
        }
    }
}

impl Engine {
    /// Suspend until the request resolves.
    pub(crate) fn enter_wait(&mut self, request: WaitRequest) -> EngineResult<WaitOutcome> {
        let kind = request.kind;
        self.state.wait.arm(&request);
        if let Some((after, code)) = request.timeout {
            let id = self.next_timer_id();
            let deadline = self.events.now() + after;
            self.state.wait.arm_timer(id, deadline, code);
        }
        let outcome = self.wait_loop(kind);
        self.state.wait.disarm();
        let outcome = outcome?;
        if matches!(outcome, WaitOutcome::Resolved(_)) {
            self.host.request_redraw(Redraw::Full);
        }
        Ok(outcome)
    }

    fn wait_loop(&mut self, kind: WaitKind) -> EngineResult<WaitOutcome> {
        let mut cursor_shown = false;
        loop {
            // Checked every pass: the menu can start skipping mid-wait.
            if kind.halts_skip() && self.state.skip != SkipMode::Off {
                debug!("skip {:?} stops at {kind:?}", self.state.skip);
                self.state.skip = SkipMode::Off;
            }
            let skip = self.state.skip;
            if skip.resolves(kind) {
                trace!("{kind:?} skipped by {skip:?}");
                if kind == WaitKind::PageEnd && skip == SkipMode::ToPageEnd {
                    self.state.skip = SkipMode::Off;
                }
                return Ok(self.finish(cursor_shown, WaitOutcome::Resolved(CLICKED)));
            }
            if kind.is_click_like() && skip == SkipMode::ToNextPause {
                self.state.skip = SkipMode::Off;
            }
            if self.state.automode
                && kind.is_click_like()
                && self.state.wait.timer.is_none()
                && !self.state.wait.auto_pending
            {
                self.arm_automode();
            }
            if kind.is_click_like()
                && !cursor_shown
                && !self.state.wait.reasons.contains(WaitReasons::SUPPRESS_ANIMATION)
            {
                self.host.set_wait_cursor(Some(kind));
                cursor_shown = true;
            }

            let deadline = self.state.wait.timer.map(|t| t.deadline);
            let event = match self.events.next(deadline) {
                Some(event) => event,
                None => match self.state.wait.timer {
                    Some(timer) => Event::Timer { id: timer.id },
                    None => continue,
                },
            };
            self.observe(&event);

            let resolution = resolve(&event, &self.resolve_context());
            trace!("{kind:?}: {event:?} -> {resolution:?}");
            match resolution {
                Resolution::Dropped => {}
                Resolution::Hover(target) => self.hover(target),
                Resolution::Resolved(code) => {
                    if self.state.automode && kind.is_click_like() && event.is_user_input() {
                        info!("automode off");
                        self.state.automode = false;
                    }
                    return Ok(self.finish(cursor_shown, WaitOutcome::Resolved(code)));
                }
                Resolution::VoiceFinished => {
                    if self.state.wait.auto_pending {
                        self.state.wait.voice_finished();
                        self.arm_automode();
                    } else {
                        return Ok(self.finish(cursor_shown, WaitOutcome::Resolved(CLICKED)));
                    }
                }
                Resolution::Trap(label) => {
                    debug!("trap fires: *{label}");
                    self.finish(cursor_shown, WaitOutcome::Trapped);
                    self.state.traps.clear();
                    if !self.state.buttons.is_empty() {
                        self.state.buttons.clear();
                        self.host.show_buttons(&self.state.buttons);
                    }
                    self.jump_to(&label)?;
                    return Ok(WaitOutcome::Trapped);
                }
                Resolution::SystemCall(call) => {
                    let resume_at = self.state.save_point;
                    match self.run_system_call(call, resume_at)? {
                        SystemCallExit::Restored => {}
                        SystemCallExit::Superseded => {
                            return Ok(self.finish(cursor_shown, WaitOutcome::Superseded));
                        }
                        SystemCallExit::Quit => {
                            return Ok(self.finish(cursor_shown, WaitOutcome::Quit));
                        }
                    }
                }
                Resolution::ToggleSkip(mode) => {
                    self.state.skip = if self.state.skip == mode {
                        SkipMode::Off
                    } else {
                        mode
                    };
                    debug!("skip now {:?}", self.state.skip);
                }
                Resolution::Quit => return Ok(self.finish(cursor_shown, WaitOutcome::Quit)),
            }
        }
    }

    fn finish(&mut self, cursor_shown: bool, outcome: WaitOutcome) -> WaitOutcome {
        if cursor_shown {
            self.host.set_wait_cursor(None);
        }
        outcome
    }

    fn arm_automode(&mut self) {
        let voice_playing = self.state.audio.is_playing(0);
        let wait = &mut self.state.wait;
        wait.reasons.insert(WaitReasons::SUPPRESS_ANIMATION);
        if voice_playing && wait.voice_channel.is_none() {
            wait.arm_voice_for_automode(0);
            return;
        }
        let id = self.next_timer_id();
        let delay = Duration::from_millis(u64::from(self.settings.automode_delay));
        let deadline = self.events.now() + delay;
        self.state.wait.arm_timer(id, deadline, CLICKED);
    }

    fn next_timer_id(&mut self) -> TimerId {
        self.next_timer += 1;
        TimerId(self.next_timer)
    }

    fn observe(&mut self, event: &Event) {
        if let Event::ChannelFinished { channel } = event {
            self.state.audio.finished(*channel);
        }
    }

    fn hover(&mut self, target: Option<ButtonId>) {
        let previous = self.state.buttons.set_hover(target);
        if let Some(id) = previous {
            self.host.set_button_visual(id, crate::buttons::ButtonVisual::Normal);
        }
        if let Some(id) = self.state.buttons.hovered() {
            self.host.set_button_visual(id, crate::buttons::ButtonVisual::Hover);
        }
    }

    pub(crate) fn resolve_context(&self) -> ResolveContext<'_> {
        ResolveContext {
            descriptor: &self.state.wait,
            buttons: &self.state.buttons,
            traps: &self.state.traps,
            rmode: self.settings.rmode,
            has_menu: !self.settings.rmenu.is_empty(),
            in_system_call: self.state.system != SystemMode::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buttons::ButtonKind;
    use crate::host::Rect;

    fn armed(kind: WaitKind) -> WaitDescriptor {
        let mut d = WaitDescriptor::default();
        d.arm(&WaitRequest::new(kind));
        d
    }

    fn ctx<'a>(
        descriptor: &'a WaitDescriptor,
        buttons: &'a ButtonSet,
        traps: &'a Traps,
    ) -> ResolveContext<'a> {
        ResolveContext {
            descriptor,
            buttons,
            traps,
            rmode: true,
            has_menu: true,
            in_system_call: false,
        }
    }

    fn two_buttons() -> ButtonSet {
        let mut set = ButtonSet::new();
        set.add(ButtonKind::Region, Rect::new(0, 0, 10, 10), 1);
        set.add(ButtonKind::Region, Rect::new(20, 0, 10, 10), 2);
        set
    }

    #[test]
    fn skip_exemption_table() {
        use WaitKind as K;
        let kinds = [
            K::ClickCommand,
            K::InlinePause,
            K::PageEnd,
            K::Sleep,
            K::HardSleep,
            K::Delay,
            K::TextAnimation,
            K::VoiceWait,
            K::ButtonSelect,
            K::Choice,
            K::SystemUi,
            K::Lookback,
            K::WindowErased,
        ];
        let row = |mode: SkipMode| -> Vec<bool> { kinds.iter().map(|k| mode.resolves(*k)).collect() };
        let (t, f) = (true, false);
        assert_eq!(row(SkipMode::Off), vec![f; 13]);
        assert_eq!(
            row(SkipMode::UntilUnread),
            vec![t, t, t, t, f, t, t, t, f, f, f, f, f]
        );
        assert_eq!(
            row(SkipMode::ToPageEnd),
            vec![f, t, t, f, f, t, t, f, f, f, f, f, f]
        );
        assert_eq!(
            row(SkipMode::ToNextPause),
            vec![f, f, f, f, f, f, t, f, f, f, f, f, f]
        );
        assert_eq!(row(SkipMode::ToLineEnd), row(SkipMode::ToNextPause));
    }

    #[test]
    fn reasons_bitset() {
        let mut r = WaitReasons::CLICK | WaitReasons::TIMER;
        assert!(r.contains(WaitReasons::CLICK));
        assert!(!r.contains(WaitReasons::VOICE));
        r.remove(WaitReasons::CLICK);
        assert_eq!(r, WaitReasons::TIMER);
        r.remove(WaitReasons::TIMER);
        assert!(r.is_empty());
    }

    #[test]
    fn click_resolves_click_wait() {
        let d = armed(WaitKind::ClickCommand);
        let (b, t) = (ButtonSet::new(), Traps::default());
        assert_eq!(resolve(&Event::click(), &ctx(&d, &b, &t)), Resolution::Resolved(0));
        assert_eq!(
            resolve(&Event::key(Key::Return), &ctx(&d, &b, &t)),
            Resolution::Resolved(0)
        );
    }

    #[test]
    fn idle_descriptor_drops_everything() {
        let d = WaitDescriptor::default();
        let (b, t) = (ButtonSet::new(), Traps::default());
        assert_eq!(resolve(&Event::click(), &ctx(&d, &b, &t)), Resolution::Dropped);
    }

    #[test]
    fn clicks_do_not_end_sleep() {
        let d = armed(WaitKind::HardSleep);
        let (b, t) = (ButtonSet::new(), Traps::default());
        assert_eq!(resolve(&Event::click(), &ctx(&d, &b, &t)), Resolution::Dropped);
    }

    #[test]
    fn stale_timer_and_channel_are_dropped() {
        let mut d = armed(WaitKind::Sleep);
        d.arm_timer(TimerId(7), Duration::from_millis(100), 0);
        let before = d.clone();
        let (b, t) = (two_buttons(), Traps::default());
        let c = ctx(&d, &b, &t);
        assert_eq!(resolve(&Event::Timer { id: TimerId(6) }, &c), Resolution::Dropped);
        assert_eq!(
            resolve(&Event::ChannelFinished { channel: 0 }, &c),
            Resolution::Dropped
        );
        assert_eq!(resolve(&Event::Timer { id: TimerId(7) }, &c), Resolution::Resolved(0));
        assert_eq!(d, before);
    }

    #[test]
    fn voice_wait_resolves_on_its_channel() {
        let mut d = WaitDescriptor::default();
        d.arm(&WaitRequest::new(WaitKind::VoiceWait).with_voice(2));
        let (b, t) = (ButtonSet::new(), Traps::default());
        let c = ctx(&d, &b, &t);
        assert_eq!(
            resolve(&Event::ChannelFinished { channel: 1 }, &c),
            Resolution::Dropped
        );
        assert_eq!(
            resolve(&Event::ChannelFinished { channel: 2 }, &c),
            Resolution::VoiceFinished
        );
    }

    #[test]
    fn button_wait_returns_values() {
        let d = armed(WaitKind::ButtonSelect);
        let (b, t) = (two_buttons(), Traps::default());
        let c = ctx(&d, &b, &t);
        assert_eq!(resolve(&Event::click_at(25, 5), &c), Resolution::Resolved(2));
        assert_eq!(resolve(&Event::click_at(100, 100), &c), Resolution::Resolved(0));
        assert_eq!(resolve(&Event::char('1'), &c), Resolution::Resolved(1));
        assert_eq!(resolve(&Event::char('3'), &c), Resolution::Dropped);
    }

    #[test]
    fn choice_ignores_misses() {
        let d = armed(WaitKind::Choice);
        let (b, t) = (two_buttons(), Traps::default());
        let c = ctx(&d, &b, &t);
        assert_eq!(resolve(&Event::click_at(100, 100), &c), Resolution::Dropped);
        assert_eq!(resolve(&Event::click_at(5, 5), &c), Resolution::Resolved(1));
    }

    #[test]
    fn hover_only_on_change() {
        let d = armed(WaitKind::Choice);
        let (mut b, t) = (two_buttons(), Traps::default());
        let moved = Event::PointerMove { x: 5, y: 5 };
        assert_eq!(
            resolve(&moved, &ctx(&d, &b, &t)),
            Resolution::Hover(Some(ButtonId(0)))
        );
        b.set_hover(Some(ButtonId(0)));
        assert_eq!(resolve(&moved, &ctx(&d, &b, &t)), Resolution::Dropped);
    }

    #[test]
    fn right_click_opens_menu_or_erases_window() {
        let d = armed(WaitKind::InlinePause);
        let (b, t) = (ButtonSet::new(), Traps::default());
        let mut c = ctx(&d, &b, &t);
        assert_eq!(
            resolve(&Event::right_click(), &c),
            Resolution::SystemCall(SystemCall::Menu)
        );
        c.has_menu = false;
        assert_eq!(
            resolve(&Event::right_click(), &c),
            Resolution::SystemCall(SystemCall::WindowErase)
        );
        c.rmode = false;
        assert_eq!(resolve(&Event::right_click(), &c), Resolution::Dropped);
    }

    #[test]
    fn traps_take_precedence() {
        let d = armed(WaitKind::ButtonSelect);
        let b = two_buttons();
        let t = Traps {
            left: None,
            right: Some("escape".into()),
        };
        let c = ctx(&d, &b, &t);
        assert_eq!(
            resolve(&Event::right_click(), &c),
            Resolution::Trap("escape".into())
        );
        assert_eq!(resolve(&Event::click_at(5, 5), &c), Resolution::Resolved(1));
    }

    #[test]
    fn traps_ignored_in_system_ui() {
        let d = armed(WaitKind::SystemUi);
        let b = ButtonSet::new();
        let t = Traps {
            left: Some("x".into()),
            right: Some("x".into()),
        };
        let mut c = ctx(&d, &b, &t);
        c.in_system_call = true;
        assert_eq!(resolve(&Event::click(), &c), Resolution::Resolved(0));
        assert_eq!(resolve(&Event::right_click(), &c), Resolution::Resolved(CANCELLED));
    }

    #[test]
    fn system_calls_dropped_inside_system_ui() {
        let d = armed(WaitKind::SystemUi);
        let b = ButtonSet::new();
        let t = Traps::default();
        let mut c = ctx(&d, &b, &t);
        c.in_system_call = true;
        let request = Event::SystemCall {
            call: SystemCall::Save,
        };
        assert_eq!(resolve(&request, &c), Resolution::Dropped);
        assert_eq!(resolve(&Event::char('s'), &c), Resolution::Dropped);
    }

    #[test]
    fn skip_keys_dropped_during_choice() {
        let d = armed(WaitKind::Choice);
        let b = two_buttons();
        let t = Traps::default();
        let c = ctx(&d, &b, &t);
        assert_eq!(resolve(&Event::char('o'), &c), Resolution::Dropped);
        assert_eq!(resolve(&Event::char('s'), &c), Resolution::Dropped);
        assert_eq!(
            resolve(&Event::char('a'), &c),
            Resolution::SystemCall(SystemCall::Automode)
        );
    }

    #[test]
    fn erased_window_returns_on_any_press() {
        let d = armed(WaitKind::WindowErased);
        let (b, t) = (ButtonSet::new(), Traps::default());
        let mut c = ctx(&d, &b, &t);
        c.in_system_call = true;
        assert_eq!(resolve(&Event::char('x'), &c), Resolution::Resolved(CLICKED));
        assert_eq!(resolve(&Event::right_click(), &c), Resolution::Resolved(CLICKED));
        assert_eq!(
            resolve(&Event::KeyDown { key: Key::Escape }, &c),
            Resolution::Resolved(CLICKED)
        );
        assert_eq!(
            resolve(&Event::PointerMove { x: 3, y: 3 }, &c),
            Resolution::Dropped
        );
    }

    #[test]
    fn keyboard_shortcuts() {
        let d = armed(WaitKind::ClickCommand);
        let (b, t) = (ButtonSet::new(), Traps::default());
        let c = ctx(&d, &b, &t);
        assert_eq!(
            resolve(&Event::char('S'), &c),
            Resolution::SystemCall(SystemCall::Skip)
        );
        assert_eq!(
            resolve(&Event::char('a'), &c),
            Resolution::SystemCall(SystemCall::Automode)
        );
        assert_eq!(
            resolve(&Event::char('o'), &c),
            Resolution::ToggleSkip(SkipMode::ToPageEnd)
        );
        assert_eq!(
            resolve(
                &Event::PointerPress {
                    button: PointerButton::WheelUp,
                    x: 0,
                    y: 0
                },
                &c
            ),
            Resolution::SystemCall(SystemCall::Lookback)
        );
    }

    #[test]
    fn lookback_navigation_codes() {
        let d = armed(WaitKind::Lookback);
        let (b, t) = (ButtonSet::new(), Traps::default());
        let mut c = ctx(&d, &b, &t);
        c.in_system_call = true;
        assert_eq!(resolve(&Event::key(Key::Up), &c), Resolution::Resolved(NAV_OLDER));
        assert_eq!(
            resolve(&Event::key(Key::Down), &c),
            Resolution::Resolved(NAV_NEWER)
        );
        assert_eq!(resolve(&Event::click(), &c), Resolution::Resolved(CLICKED));
        assert_eq!(
            resolve(&Event::key(Key::Escape), &c),
            Resolution::Resolved(CANCELLED)
        );
    }

    #[test]
    fn quit_always_resolves() {
        let d = armed(WaitKind::HardSleep);
        let (b, t) = (ButtonSet::new(), Traps::default());
        assert_eq!(resolve(&Event::Quit, &ctx(&d, &b, &t)), Resolution::Quit);
    }
}
