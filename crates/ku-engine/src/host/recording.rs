use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use super::{
    Archive, AudioChannel, AudioSink, Presentation, Rect, Redraw, SlotId, SlotStorage,
    SpriteState, StandPosition, SystemUi,
};
use crate::buttons::{ButtonId, ButtonSet, ButtonVisual};
use crate::error::{ResourceError, StorageError};
use crate::wait::WaitKind;

/// One call the engine made on a [`RecordingHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    /// `request_redraw`.
    Redraw(Redraw),
    /// `draw_text`.
    Text(String),
    /// `clear_text`.
    ClearText,
    /// `show_buttons`, as `(value, rect)` pairs.
    Buttons(Vec<(i32, Rect)>),
    /// `set_button_visual`.
    ButtonVisual(ButtonId, ButtonVisual),
    /// `set_background`.
    Background(Option<String>),
    /// `set_standing`.
    Standing(StandPosition, Option<String>),
    /// `set_sprite`.
    Sprite(u32, Option<SpriteState>),
    /// `set_caption`.
    Caption(String),
    /// `set_monochrome`.
    Monochrome(bool),
    /// `set_window_visible`.
    Window(bool),
    /// `set_wait_cursor`.
    WaitCursor(Option<WaitKind>),
    /// `show_system_ui`.
    SystemUi(SystemUi),
    /// `play`.
    Play {
        /// File name.
        name: String,
        /// Channel.
        channel: AudioChannel,
        /// Looping.
        looped: bool,
    },
    /// `stop`.
    Stop(AudioChannel),
}

/// Shared, inspectable log of host calls. Clones see the same log, so a
/// test keeps one while the engine owns the host.
#[derive(Debug, Clone, Default)]
pub struct Recording(Rc<RefCell<Vec<HostCall>>>);

impl Recording {
    fn push(&self, call: HostCall) {
        self.0.borrow_mut().push(call);
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<HostCall> {
        self.0.borrow().clone()
    }

    /// All drawn text concatenated.
    pub fn text(&self) -> String {
        self.0
            .borrow()
            .iter()
            .filter_map(|c| match c {
                HostCall::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of calls matching a predicate.
    pub fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| pred(c)).count()
    }

    /// Number of full-screen redraw requests.
    pub fn full_redraws(&self) -> usize {
        self.count(|c| *c == HostCall::Redraw(Redraw::Full))
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Slots kept in memory. Clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage(Rc<RefCell<BTreeMap<SlotId, Vec<u8>>>>);

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupied slots in ascending order.
    pub fn occupied(&self) -> Vec<SlotId> {
        self.0.borrow().keys().copied().collect()
    }
}

impl SlotStorage for MemoryStorage {
    fn write_slot(&mut self, slot: SlotId, bytes: &[u8]) -> Result<(), StorageError> {
        self.0.borrow_mut().insert(slot, bytes.to_vec());
        Ok(())
    }

    fn read_slot(&self, slot: SlotId) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.0.borrow().get(&slot).cloned())
    }
}

/// A headless host that records every call. Every asset exists unless
/// marked missing; sprites report a fixed size at their position.
#[derive(Debug, Clone)]
pub struct RecordingHost {
    log: Recording,
    storage: MemoryStorage,
    missing: HashSet<String>,
    audio_broken: bool,
    sprite_size: (u32, u32),
    sprites: BTreeMap<u32, SpriteState>,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self {
            log: Recording::default(),
            storage: MemoryStorage::new(),
            missing: HashSet::new(),
            audio_broken: false,
            sprite_size: (64, 32),
            sprites: BTreeMap::new(),
        }
    }
}

impl RecordingHost {
    /// A host with fresh memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Share slots with another host.
    pub fn with_storage(mut self, storage: MemoryStorage) -> Self {
        self.storage = storage;
        self
    }

    /// Treat an asset as absent.
    pub fn with_missing_file(mut self, name: &str) -> Self {
        self.missing.insert(name.to_string());
        self
    }

    /// Make every `play` fail.
    pub fn with_broken_audio(mut self) -> Self {
        self.audio_broken = true;
        self
    }

    /// Handle to the call log.
    pub fn recording(&self) -> Recording {
        self.log.clone()
    }

    /// Handle to the slots.
    pub fn storage(&self) -> MemoryStorage {
        self.storage.clone()
    }
}

impl Presentation for RecordingHost {
    fn request_redraw(&mut self, region: Redraw) {
        self.log.push(HostCall::Redraw(region));
    }

    fn draw_text(&mut self, text: &str) {
        self.log.push(HostCall::Text(text.to_string()));
    }

    fn clear_text(&mut self) {
        self.log.push(HostCall::ClearText);
    }

    fn show_buttons(&mut self, buttons: &ButtonSet) {
        let summary = buttons.iter().map(|(_, b)| (b.value, b.rect)).collect();
        self.log.push(HostCall::Buttons(summary));
    }

    fn set_button_visual(&mut self, id: ButtonId, visual: ButtonVisual) {
        self.log.push(HostCall::ButtonVisual(id, visual));
    }

    fn set_background(&mut self, image: Option<&str>) {
        self.log.push(HostCall::Background(image.map(str::to_string)));
    }

    fn set_standing(&mut self, position: StandPosition, image: Option<&str>) {
        self.log
            .push(HostCall::Standing(position, image.map(str::to_string)));
    }

    fn set_sprite(&mut self, id: u32, sprite: Option<&SpriteState>) {
        match sprite {
            Some(s) => self.sprites.insert(id, s.clone()),
            None => self.sprites.remove(&id),
        };
        self.log.push(HostCall::Sprite(id, sprite.cloned()));
    }

    fn sprite_bounds(&self, id: u32) -> Option<Rect> {
        let (w, h) = self.sprite_size;
        self.sprites.get(&id).map(|s| Rect::new(s.x, s.y, w, h))
    }

    fn set_caption(&mut self, caption: &str) {
        self.log.push(HostCall::Caption(caption.to_string()));
    }

    fn set_monochrome(&mut self, on: bool) {
        self.log.push(HostCall::Monochrome(on));
    }

    fn set_window_visible(&mut self, visible: bool) {
        self.log.push(HostCall::Window(visible));
    }

    fn set_wait_cursor(&mut self, kind: Option<WaitKind>) {
        self.log.push(HostCall::WaitCursor(kind));
    }

    fn show_system_ui(&mut self, ui: &SystemUi) {
        self.log.push(HostCall::SystemUi(ui.clone()));
    }
}

impl AudioSink for RecordingHost {
    fn play(&mut self, name: &str, channel: AudioChannel, looped: bool) -> Result<(), ResourceError> {
        if self.audio_broken {
            return Err(ResourceError::AudioUnavailable("no device".into()));
        }
        self.log.push(HostCall::Play {
            name: name.to_string(),
            channel,
            looped,
        });
        Ok(())
    }

    fn stop(&mut self, channel: AudioChannel) {
        self.log.push(HostCall::Stop(channel));
    }
}

impl Archive for RecordingHost {
    fn read_file(&self, name: &str) -> Result<Vec<u8>, ResourceError> {
        if self.missing.contains(name) {
            Err(ResourceError::MissingAsset(name.to_string()))
        } else {
            Ok(name.as_bytes().to_vec())
        }
    }

    fn file_exists(&self, name: &str) -> bool {
        !self.missing.contains(name)
    }
}

impl SlotStorage for RecordingHost {
    fn write_slot(&mut self, slot: SlotId, bytes: &[u8]) -> Result<(), StorageError> {
        self.storage.write_slot(slot, bytes)
    }

    fn read_slot(&self, slot: SlotId) -> Result<Option<Vec<u8>>, StorageError> {
        self.storage.read_slot(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_is_shared_between_clones() {
        let mut host = RecordingHost::new();
        let log = host.recording();
        host.draw_text("Hello, ");
        host.draw_text("world");
        host.request_redraw(Redraw::Full);
        assert_eq!(log.text(), "Hello, world");
        assert_eq!(log.full_redraws(), 1);
        log.clear();
        assert!(log.calls().is_empty());
    }

    #[test]
    fn storage_is_shared_between_hosts() {
        let storage = MemoryStorage::new();
        let mut first = RecordingHost::new().with_storage(storage.clone());
        first.write_slot(SlotId(2), b"x").unwrap();
        let second = RecordingHost::new().with_storage(storage.clone());
        assert_eq!(second.read_slot(SlotId(2)).unwrap(), Some(b"x".to_vec()));
        assert_eq!(storage.occupied(), vec![SlotId(2)]);
    }

    #[test]
    fn missing_files_and_broken_audio() {
        let mut host = RecordingHost::new()
            .with_missing_file("gone.png")
            .with_broken_audio();
        assert!(!host.file_exists("gone.png"));
        assert!(host.file_exists("here.png"));
        assert!(host.read_file("gone.png").is_err());
        assert!(host.play("a.ogg", AudioChannel::Music, true).is_err());
    }

    #[test]
    fn sprite_bounds_follow_set_sprite() {
        let mut host = RecordingHost::new();
        assert_eq!(host.sprite_bounds(1), None);
        let sprite = SpriteState {
            image: "b.png".into(),
            x: 10,
            y: 20,
            visible: true,
        };
        host.set_sprite(1, Some(&sprite));
        assert_eq!(host.sprite_bounds(1), Some(Rect::new(10, 20, 64, 32)));
        host.set_sprite(1, None);
        assert_eq!(host.sprite_bounds(1), None);
    }
}
