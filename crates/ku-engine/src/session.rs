use std::collections::BTreeMap;

use ku_script::Script;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::buttons::ButtonSet;
use crate::config::{EngineConfig, EngineSettings};
use crate::cursor::ScriptCursor;
use crate::engine::LoopState;
use crate::error::{EngineError, EngineResult};
use crate::host::{SpriteState, StandPosition};
use crate::nest::NestStack;
use crate::page::PageBuffer;
use crate::syscall::SystemMode;
use crate::variables::VariableStore;
use crate::wait::{SkipMode, Traps, WaitDescriptor};

/// Presentation state the engine must be able to re-send after a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFlags {
    /// Window caption.
    pub caption: String,
    /// Background image or `#rrggbb` colour.
    pub background: Option<String>,
    /// Standing images, indexed by [`StandPosition::index`].
    pub standing: [Option<String>; 3],
    /// Loaded sprites.
    pub sprites: BTreeMap<u32, SpriteState>,
    /// Monochrome filter.
    pub monochrome: bool,
    /// Text window hidden by the window-erase system call.
    pub window_erased: bool,
    /// Hide the text window while images change (`erasetextwindow`).
    pub erase_text_window: bool,
    /// Milliseconds per character.
    pub text_speed: u32,
}

impl DisplayFlags {
    /// The standing image at a position.
    pub fn standing(&self, position: StandPosition) -> Option<&str> {
        self.standing[position.index()].as_deref()
    }
}

/// One playing effect channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayingChannel {
    /// File name.
    pub name: String,
    /// Restarted after a restore when set.
    pub looped: bool,
}

/// The audio channel table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioState {
    /// Background music, always looping.
    pub bgm: Option<String>,
    /// Effect channels currently playing.
    pub effects: BTreeMap<u32, PlayingChannel>,
}

impl AudioState {
    /// Whether an effect channel is playing.
    pub fn is_playing(&self, channel: u32) -> bool {
        self.effects.contains_key(&channel)
    }

    /// A channel reported completion. Looping channels never finish.
    pub fn finished(&mut self, channel: u32) {
        if self.effects.get(&channel).is_some_and(|c| !c.looped) {
            self.effects.remove(&channel);
        }
    }
}

/// Seeded randomness with a draw counter, so a restored session continues
/// the same sequence.
#[derive(Debug, Clone)]
pub struct Randomizer {
    seed: u64,
    draws: u64,
}

impl Randomizer {
    /// Start a sequence.
    pub fn new(seed: u64) -> Self {
        Self { seed, draws: 0 }
    }

    /// Continue a sequence after `draws` values.
    pub fn resume(seed: u64, draws: u64) -> Self {
        Self { seed, draws }
    }

    /// The seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Values drawn so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// A value in `low..=high`. Each draw derives its own generator from
    /// the seed and the draw index.
    pub fn range(&mut self, low: i32, high: i32) -> i32 {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.draws));
        self.draws += 1;
        rng.random_range(low..=high)
    }
}

/// Everything the execution loop, the wait machine and the system-call
/// machine share. Passed by `&mut`; nothing lives in globals.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Instruction cursor.
    pub cursor: ScriptCursor,
    /// Cursor at the start of the current step.
    pub save_point: ScriptCursor,
    /// Loop state.
    pub loop_state: LoopState,
    /// Gosub and for frames.
    pub nest: NestStack,
    /// Registers.
    pub vars: VariableStore,
    /// The live wait.
    pub wait: WaitDescriptor,
    /// Skip mode.
    pub skip: SkipMode,
    /// Automode on.
    pub automode: bool,
    /// Active buttons.
    pub buttons: ButtonSet,
    /// `btntime` limit for the next button waits.
    pub btntime: Option<u32>,
    /// Text pages.
    pub pages: PageBuffer,
    /// Armed traps.
    pub traps: Traps,
    /// Presentation flags.
    pub display: DisplayFlags,
    /// Audio channels.
    pub audio: AudioState,
    /// A `for` whose range was empty is being skipped up to its `next`.
    pub break_pending: bool,
    /// System-call mode.
    pub system: SystemMode,
    /// `rnd` state.
    pub rng: Randomizer,
}

impl SessionState {
    /// A fresh session positioned at the script's entry label.
    pub fn new(script: &Script, config: &EngineConfig, settings: &EngineSettings) -> EngineResult<Self> {
        let entry = script.entry_label().ok_or(EngineError::NoEntryLabel)?;
        let cursor = ScriptCursor::at_label(script, entry);
        Ok(Self {
            cursor,
            save_point: cursor,
            loop_state: LoopState::Running,
            nest: NestStack::new(),
            vars: VariableStore::new(config.variable_count, config.global_border),
            wait: WaitDescriptor::default(),
            skip: SkipMode::Off,
            automode: false,
            buttons: ButtonSet::new(),
            btntime: None,
            pages: PageBuffer::with_capacity(settings.page_capacity),
            traps: Traps::default(),
            display: DisplayFlags {
                text_speed: config.text_speed,
                ..DisplayFlags::default()
            },
            audio: AudioState::default(),
            break_pending: false,
            system: SystemMode::None,
            rng: Randomizer::new(config.seed),
        })
    }
}
