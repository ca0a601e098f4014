//! Capability interfaces the engine drives.
//!
//! The engine never renders, decodes or touches the platform itself. It
//! calls a [`Host`], which is any type providing [`Presentation`],
//! [`AudioSink`], [`Archive`] and [`SlotStorage`].

mod fs;
mod recording;

pub use fs::{DirArchive, FsSlotStorage};
pub use recording::{HostCall, MemoryStorage, Recording, RecordingHost};

use serde::{Deserialize, Serialize};

use crate::buttons::{ButtonId, ButtonSet, ButtonVisual};
use crate::error::{ResourceError, StorageError};
use crate::wait::WaitKind;

/// An axis-aligned hit rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub w: u32,
    /// Height.
    pub h: u32,
}

impl Rect {
    /// Build a rectangle.
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Whether a point lies inside. The right and bottom edges are exclusive.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (px, py) = (i64::from(x), i64::from(y));
        let (left, top) = (i64::from(self.x), i64::from(self.y));
        px >= left && py >= top && px < left + i64::from(self.w) && py < top + i64::from(self.h)
    }

    /// Centre point, handy for synthesizing clicks.
    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add((self.w / 2) as i32),
            self.y.saturating_add((self.h / 2) as i32),
        )
    }
}

/// What needs repainting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    /// The whole screen.
    Full,
    /// One region.
    Region(Rect),
}

/// Standing-image slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandPosition {
    /// Left third.
    Left,
    /// Centre.
    Center,
    /// Right third.
    Right,
}

impl StandPosition {
    /// All positions in slot order.
    pub const ALL: [StandPosition; 3] = [Self::Left, Self::Center, Self::Right];

    /// Index into a three-slot array.
    pub fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Center => 1,
            Self::Right => 2,
        }
    }
}

/// An audio channel. Music is separate from the numbered effect channels;
/// voice lines play on effect channel 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioChannel {
    /// Background music.
    Music,
    /// Numbered effect channel.
    Effect(u32),
}

/// A loaded sprite as the presentation should show it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteState {
    /// Image name in the archive.
    pub image: String,
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Whether it is drawn.
    pub visible: bool,
}

/// A system-call screen for the presentation to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemUi {
    /// The right-click menu.
    Menu {
        /// Entry labels, in button order.
        entries: Vec<String>,
    },
    /// The save or load slot list.
    Slots {
        /// Saving rather than loading.
        saving: bool,
        /// One description per slot, slot 1 first.
        entries: Vec<String>,
    },
    /// A yes/no dialog.
    Confirm {
        /// The question.
        message: String,
    },
    /// One completed page of lookback.
    Lookback {
        /// The page text.
        page: String,
        /// 0 is the newest completed page.
        index: usize,
        /// Completed pages available.
        total: usize,
    },
    /// The text window is hidden until the next input.
    WindowErased,
    /// No system UI is showing.
    Closed,
}

/// Drawing and UI surface.
pub trait Presentation {
    /// Repaint after a wait resolves.
    fn request_redraw(&mut self, region: Redraw);
    /// Append text to the text window.
    fn draw_text(&mut self, text: &str);
    /// Clear the text window.
    fn clear_text(&mut self);
    /// Show a freshly created button set.
    fn show_buttons(&mut self, buttons: &ButtonSet);
    /// Change one button's visual state.
    fn set_button_visual(&mut self, id: ButtonId, visual: ButtonVisual);
    /// Set or clear the background image.
    fn set_background(&mut self, image: Option<&str>);
    /// Set or clear a standing image.
    fn set_standing(&mut self, position: StandPosition, image: Option<&str>);
    /// Set or clear a sprite.
    fn set_sprite(&mut self, id: u32, sprite: Option<&SpriteState>);
    /// Screen rectangle of a loaded sprite.
    fn sprite_bounds(&self, id: u32) -> Option<Rect>;
    /// Window caption.
    fn set_caption(&mut self, caption: &str);
    /// Monochrome filter.
    fn set_monochrome(&mut self, on: bool);
    /// Show or hide the text window.
    fn set_window_visible(&mut self, visible: bool);
    /// Show the click cursor for a wait kind, or hide it.
    fn set_wait_cursor(&mut self, kind: Option<WaitKind>);
    /// Show a system-call screen.
    fn show_system_ui(&mut self, ui: &SystemUi);
}

/// Audio output. Completion of a non-looping channel is reported back as
/// [`Event::ChannelFinished`](crate::event::Event::ChannelFinished).
pub trait AudioSink {
    /// Start playing a file on a channel, replacing what it played.
    fn play(&mut self, name: &str, channel: AudioChannel, looped: bool) -> Result<(), ResourceError>;
    /// Stop a channel.
    fn stop(&mut self, channel: AudioChannel);
}

/// Read-only asset store.
pub trait Archive {
    /// The bytes of a named file.
    fn read_file(&self, name: &str) -> Result<Vec<u8>, ResourceError>;
    /// Whether a named file exists.
    fn file_exists(&self, name: &str) -> bool;
}

/// A save slot number. Slot 0 holds the global record and slot 999 the
/// emergency snapshot; user slots are `1..=savenumber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl SlotId {
    /// The global record.
    pub const GLOBAL: SlotId = SlotId(0);
    /// Written on a fatal error.
    pub const EMERGENCY: SlotId = SlotId(999);
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::GLOBAL => write!(f, "global"),
            Self::EMERGENCY => write!(f, "emergency"),
            SlotId(n) => write!(f, "{n}"),
        }
    }
}

/// Persistent byte slots.
pub trait SlotStorage {
    /// Replace a slot's contents.
    fn write_slot(&mut self, slot: SlotId, bytes: &[u8]) -> Result<(), StorageError>;
    /// A slot's contents, `None` when it was never written.
    fn read_slot(&self, slot: SlotId) -> Result<Option<Vec<u8>>, StorageError>;
}

/// Everything the engine needs from its embedder.
pub trait Host: Presentation + AudioSink + Archive + SlotStorage {}

impl<T: Presentation + AudioSink + Archive + SlotStorage> Host for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect::new(10, 20, 30, 40);
        assert!(r.contains(10, 20));
        assert!(r.contains(39, 59));
        assert!(!r.contains(40, 20));
        assert!(!r.contains(10, 60));
        assert!(!r.contains(9, 25));
    }

    #[test]
    fn rect_center() {
        assert_eq!(Rect::new(0, 0, 100, 50).center(), (50, 25));
    }

    #[test]
    fn slot_display() {
        assert_eq!(SlotId(3).to_string(), "3");
        assert_eq!(SlotId::GLOBAL.to_string(), "global");
        assert_eq!(SlotId::EMERGENCY.to_string(), "emergency");
    }

    #[test]
    fn stand_positions_index_in_order() {
        let indices: Vec<_> = StandPosition::ALL.iter().map(|p| p.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
