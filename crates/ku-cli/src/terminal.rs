//! A host that prints the story to stdout.

use std::collections::BTreeMap;
use std::io::{self, Write};

use colored::Colorize;
use ku_engine::buttons::{ButtonId, ButtonKind, ButtonSet, ButtonVisual};
use ku_engine::error::{ResourceError, StorageError};
use ku_engine::host::{
    Archive, AudioChannel, AudioSink, DirArchive, Presentation, Rect, Redraw, SlotStorage,
    SpriteState, StandPosition, SystemUi,
};
use ku_engine::{Event, EventSender, SlotId, WaitKind};
use log::warn;

/// Size reported for every sprite; the terminal never decodes images.
const SPRITE_SIZE: (u32, u32) = (64, 32);

/// Text goes to stdout as it is drawn; everything visual becomes a dimmed
/// status line. Audio is only announced.
pub struct TerminalHost {
    archive: DirArchive,
    storage: Box<dyn SlotStorage>,
    sprites: BTreeMap<u32, SpriteState>,
    /// Posts `ChannelFinished` for effects, since nothing actually plays.
    notifier: Option<EventSender>,
    mid_line: bool,
}

impl TerminalHost {
    pub fn new(archive: DirArchive, storage: Box<dyn SlotStorage>) -> Self {
        Self {
            archive,
            storage,
            sprites: BTreeMap::new(),
            notifier: None,
            mid_line: false,
        }
    }

    /// Report effect completion through `sender`.
    pub fn with_notifier(mut self, sender: EventSender) -> Self {
        self.notifier = Some(sender);
        self
    }

    fn line_start(&mut self) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }

    fn status(&mut self, text: String) {
        self.line_start();
        println!("{}", format!("[{text}]").dimmed());
    }
}

fn image_name(image: Option<&str>) -> &str {
    image.unwrap_or("off")
}

impl Presentation for TerminalHost {
    fn request_redraw(&mut self, _region: Redraw) {}

    fn draw_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{text}");
        self.mid_line = !text.ends_with('\n');
        if let Err(e) = io::stdout().flush() {
            warn!("cannot flush stdout: {e}");
        }
    }

    fn clear_text(&mut self) {
        self.line_start();
        println!();
    }

    fn show_buttons(&mut self, buttons: &ButtonSet) {
        if buttons.is_empty() {
            return;
        }
        self.line_start();
        for (n, (_, button)) in buttons.iter().enumerate() {
            let caption = match &button.kind {
                ButtonKind::Text(label) => label.clone(),
                ButtonKind::Region => format!("button {}", button.value),
                ButtonKind::Sprite(id) => format!("sprite {id}"),
            };
            println!("  {} {caption}", format!("[{}]", n + 1).bold());
        }
    }

    fn set_button_visual(&mut self, _id: ButtonId, _visual: ButtonVisual) {}

    fn set_background(&mut self, image: Option<&str>) {
        self.status(format!("bg {}", image_name(image)));
    }

    fn set_standing(&mut self, position: StandPosition, image: Option<&str>) {
        let slot = match position {
            StandPosition::Left => "left",
            StandPosition::Center => "center",
            StandPosition::Right => "right",
        };
        self.status(format!("{slot} {}", image_name(image)));
    }

    fn set_sprite(&mut self, id: u32, sprite: Option<&SpriteState>) {
        match sprite {
            Some(s) => {
                self.sprites.insert(id, s.clone());
            }
            None => {
                self.sprites.remove(&id);
            }
        }
    }

    fn sprite_bounds(&self, id: u32) -> Option<Rect> {
        let (w, h) = SPRITE_SIZE;
        self.sprites.get(&id).map(|s| Rect::new(s.x, s.y, w, h))
    }

    fn set_caption(&mut self, caption: &str) {
        self.line_start();
        println!("{}", caption.bold());
    }

    fn set_monochrome(&mut self, on: bool) {
        self.status(format!("monochrome {}", if on { "on" } else { "off" }));
    }

    fn set_window_visible(&mut self, _visible: bool) {}

    fn set_wait_cursor(&mut self, _kind: Option<WaitKind>) {}

    fn show_system_ui(&mut self, ui: &SystemUi) {
        self.line_start();
        match ui {
            SystemUi::Menu { .. } => println!("{}", "== Menu ==".cyan()),
            SystemUi::Slots { saving, .. } => {
                let title = if *saving { "== Save ==" } else { "== Load ==" };
                println!("{}", title.cyan());
            }
            SystemUi::Confirm { message } => println!("{}", message.cyan()),
            SystemUi::Lookback { page, index, total } => {
                println!("{}", format!("== Lookback {}/{total} ==", index + 1).cyan());
                println!("{page}");
            }
            SystemUi::WindowErased => println!("{}", "(window hidden)".dimmed()),
            SystemUi::Closed => {}
        }
    }
}

impl AudioSink for TerminalHost {
    fn play(&mut self, name: &str, channel: AudioChannel, looped: bool) -> Result<(), ResourceError> {
        match channel {
            AudioChannel::Music => self.status(format!("music {name}")),
            AudioChannel::Effect(n) => {
                self.status(format!("sound {name} on {n}"));
                if !looped {
                    if let Some(sender) = &self.notifier {
                        sender.send(Event::ChannelFinished { channel: n });
                    }
                }
            }
        }
        Ok(())
    }

    fn stop(&mut self, _channel: AudioChannel) {}
}

impl Archive for TerminalHost {
    fn read_file(&self, name: &str) -> Result<Vec<u8>, ResourceError> {
        self.archive.read_file(name)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.archive.file_exists(name)
    }
}

impl SlotStorage for TerminalHost {
    fn write_slot(&mut self, slot: SlotId, bytes: &[u8]) -> Result<(), StorageError> {
        self.storage.write_slot(slot, bytes)
    }

    fn read_slot(&self, slot: SlotId) -> Result<Option<Vec<u8>>, StorageError> {
        self.storage.read_slot(slot)
    }
}
