//! Input events and where they come from.
//!
//! Producers on any thread push [`Event`]s through an [`EventSender`]; the
//! engine pulls them from one serial [`EventQueue`], which coalesces pointer
//! motion. [`TraceSource`] replays a recorded list instead, with its own
//! clock, for tests and scripted runs.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use log::trace;
use serde::{Deserialize, Serialize};

use crate::syscall::SystemCall;

/// Pointer buttons, including wheel notches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    /// Primary button.
    Left,
    /// Secondary button.
    Right,
    /// Wheel away from the user.
    WheelUp,
    /// Wheel towards the user.
    WheelDown,
}

/// Keys the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// Enter.
    Return,
    /// Space bar.
    Space,
    /// Escape.
    Escape,
    /// Cursor up.
    Up,
    /// Cursor down.
    Down,
    /// Page up.
    PageUp,
    /// Page down.
    PageDown,
    /// A printable character.
    Char(char),
}

/// Identifies one armed timer. A timer event carrying any other id is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u64);

/// Everything that can resolve a wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Pointer moved.
    PointerMove {
        /// X.
        x: i32,
        /// Y.
        y: i32,
    },
    /// Pointer button went down.
    PointerPress {
        /// Which button.
        button: PointerButton,
        /// X.
        #[serde(default)]
        x: i32,
        /// Y.
        #[serde(default)]
        y: i32,
    },
    /// Pointer button went up.
    PointerRelease {
        /// Which button.
        button: PointerButton,
        /// X.
        #[serde(default)]
        x: i32,
        /// Y.
        #[serde(default)]
        y: i32,
    },
    /// Key pressed.
    KeyDown {
        /// Which key.
        key: Key,
    },
    /// Key released.
    KeyUp {
        /// Which key.
        key: Key,
    },
    /// A timer expired.
    Timer {
        /// The timer.
        id: TimerId,
    },
    /// A non-looping effect channel finished.
    ChannelFinished {
        /// Effect channel.
        channel: u32,
    },
    /// The platform asked for a system call (menu key, window button, ...).
    SystemCall {
        /// Which one.
        call: SystemCall,
    },
    /// The window closed or input ended.
    Quit,
}

impl Event {
    /// Left click at a point.
    pub fn click_at(x: i32, y: i32) -> Self {
        Self::PointerPress {
            button: PointerButton::Left,
            x,
            y,
        }
    }

    /// Left click where no button is.
    pub fn click() -> Self {
        Self::click_at(-1, -1)
    }

    /// Right click.
    pub fn right_click() -> Self {
        Self::PointerPress {
            button: PointerButton::Right,
            x: -1,
            y: -1,
        }
    }

    /// Key press.
    pub fn key(key: Key) -> Self {
        Self::KeyDown { key }
    }

    /// Printable key press.
    pub fn char(c: char) -> Self {
        Self::KeyDown { key: Key::Char(c) }
    }

    /// Whether a person produced this event, as opposed to a timer or device.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            Self::PointerPress { .. } | Self::KeyDown { .. } | Self::SystemCall { .. }
        )
    }
}

/// Where the engine's events come from.
pub trait EventSource {
    /// Block for the next event. `None` when `timeout` elapsed first; with
    /// no timeout this only returns once an event (possibly `Quit`) arrives.
    fn next_event(&mut self, timeout: Option<Duration>) -> Option<Event>;
    /// The next event if one is already queued.
    fn poll_event(&mut self) -> Option<Event>;
    /// Time since the source started.
    fn now(&self) -> Duration;
}

/// Clonable handle for producers on other threads.
#[derive(Debug, Clone)]
pub struct EventSender(Sender<Event>);

impl EventSender {
    /// Queue an event. `false` once the engine has gone away.
    pub fn send(&self, event: Event) -> bool {
        self.0.send(event).is_ok()
    }
}

/// Live events from an mpsc channel. A disconnected channel reads as `Quit`.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Receiver<Event>,
    started: Instant,
}

/// A sender and the source it feeds.
pub fn channel() -> (EventSender, ChannelSource) {
    let (tx, rx) = mpsc::channel();
    (
        EventSender(tx),
        ChannelSource {
            rx,
            started: Instant::now(),
        },
    )
}

impl EventSource for ChannelSource {
    fn next_event(&mut self, timeout: Option<Duration>) -> Option<Event> {
        match timeout {
            None => Some(self.rx.recv().unwrap_or(Event::Quit)),
            Some(t) => match self.rx.recv_timeout(t) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => Some(Event::Quit),
            },
        }
    }

    fn poll_event(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }
}

/// One entry of a recorded input trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStep {
    /// Deliver an event.
    Event(Event),
    /// Let the armed timer expire. Ignored when no timer is armed.
    Elapse,
}

impl From<Event> for TraceStep {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

#[derive(Debug, Default)]
struct TraceState {
    steps: VecDeque<TraceStep>,
    clock: Duration,
}

/// Replays a fixed trace on a virtual clock. Queued events are delivered
/// before any timer fires; once the trace is exhausted every armed timer
/// expires and an unarmed wait receives `Quit`.
#[derive(Debug, Clone, Default)]
pub struct TraceSource(Rc<RefCell<TraceState>>);

impl TraceSource {
    /// A source replaying `steps`.
    pub fn new<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TraceStep>,
    {
        Self(Rc::new(RefCell::new(TraceState {
            steps: steps.into_iter().map(Into::into).collect(),
            clock: Duration::ZERO,
        })))
    }

    /// Parse a JSON array of trace steps.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let steps: Vec<TraceStep> = serde_json::from_str(json)?;
        Ok(Self::new(steps))
    }

    /// Steps not yet delivered. Clones share the trace, so a test can keep
    /// one and inspect it after the engine ran.
    pub fn remaining(&self) -> usize {
        self.0.borrow().steps.len()
    }
}

impl EventSource for TraceSource {
    fn next_event(&mut self, timeout: Option<Duration>) -> Option<Event> {
        let mut state = self.0.borrow_mut();
        loop {
            match state.steps.pop_front() {
                Some(TraceStep::Event(event)) => return Some(event),
                Some(TraceStep::Elapse) | None => match timeout {
                    Some(t) => {
                        state.clock += t;
                        return None;
                    }
                    None if state.steps.is_empty() => return Some(Event::Quit),
                    None => continue,
                },
            }
        }
    }

    fn poll_event(&mut self) -> Option<Event> {
        let mut state = self.0.borrow_mut();
        match state.steps.front() {
            Some(TraceStep::Event(_)) => match state.steps.pop_front() {
                Some(TraceStep::Event(event)) => Some(event),
                _ => None,
            },
            _ => None,
        }
    }

    fn now(&self) -> Duration {
        self.0.borrow().clock
    }
}

/// The serial queue in front of an [`EventSource`]. Runs of pointer moves
/// collapse to the last one; timeouts come back as `None` for the caller to
/// turn into its armed timer's event.
pub struct EventQueue {
    source: Box<dyn EventSource>,
    stash: Option<Event>,
}

impl EventQueue {
    /// Wrap a source.
    pub fn new(source: Box<dyn EventSource>) -> Self {
        Self {
            source,
            stash: None,
        }
    }

    /// Current time on the source's clock.
    pub fn now(&self) -> Duration {
        self.source.now()
    }

    /// Next event, blocking until `deadline` (absolute, on the source clock).
    /// `None` when the deadline passed first.
    pub fn next(&mut self, deadline: Option<Duration>) -> Option<Event> {
        let event = match self.stash.take() {
            Some(event) => event,
            None => {
                let timeout = deadline.map(|d| d.saturating_sub(self.source.now()));
                self.source.next_event(timeout)?
            }
        };
        if !matches!(event, Event::PointerMove { .. }) {
            return Some(event);
        }
        let mut latest = event;
        while let Some(next) = self.source.poll_event() {
            if matches!(next, Event::PointerMove { .. }) {
                trace!("coalescing pointer move");
                latest = next;
            } else {
                self.stash = Some(next);
                break;
            }
        }
        Some(latest)
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("stash", &self.stash)
            .finish_non_exhaustive()
    }
}
