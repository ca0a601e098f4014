use std::collections::HashMap;

use crate::buttons::ColumnLayout;
use crate::syscall::MenuEntry;

/// Configuration for an engine run. Built once by the embedder and frozen
/// before the first step.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// RNG seed for `rnd` and `rnd2`.
    pub seed: u64,
    /// Milliseconds per character of text animation. 0 draws instantly.
    pub text_speed: u32,
    /// Automode delay after each auto-resolved click wait, in milliseconds.
    pub automode_delay: u32,
    /// Stop skip-until-unread at text that has never been read.
    pub kidoku_skip: bool,
    /// Completed pages kept for lookback (1..=100).
    pub page_capacity: usize,
    /// Number of user save slots (1..=99).
    pub save_slots: u32,
    /// Numeric and string registers of each kind.
    pub variable_count: usize,
    /// First global register index.
    pub global_border: usize,
    /// Play audio at all.
    pub audio_enabled: bool,
    /// Where choice and system-UI buttons are laid out.
    pub layout: ColumnLayout,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            text_speed: 0,
            automode_delay: 1000,
            kidoku_skip: false,
            page_capacity: 10,
            save_slots: 9,
            variable_count: 4096,
            global_border: 200,
            audio_enabled: true,
            layout: ColumnLayout::default(),
        }
    }
}

impl EngineConfig {
    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the text speed in milliseconds per character.
    pub fn with_text_speed(mut self, ms: u32) -> Self {
        self.text_speed = ms;
        self
    }

    /// Set the automode delay in milliseconds.
    pub fn with_automode_delay(mut self, ms: u32) -> Self {
        self.automode_delay = ms;
        self
    }

    /// Stop skip at unread text.
    pub fn with_kidoku_skip(mut self, on: bool) -> Self {
        self.kidoku_skip = on;
        self
    }

    /// Set the lookback page capacity, clamped to 1..=100.
    pub fn with_page_capacity(mut self, pages: usize) -> Self {
        self.page_capacity = pages.clamp(1, 100);
        self
    }

    /// Set the number of save slots, clamped to 1..=99.
    pub fn with_save_slots(mut self, slots: u32) -> Self {
        self.save_slots = slots.clamp(1, 99);
        self
    }

    /// Set the register count and global border. The border is clamped to
    /// the count.
    pub fn with_variables(mut self, count: usize, global_border: usize) -> Self {
        self.variable_count = count.max(1);
        self.global_border = global_border.min(self.variable_count);
        self
    }

    /// Enable or disable audio.
    pub fn with_audio(mut self, enabled: bool) -> Self {
        self.audio_enabled = enabled;
        self
    }
}

/// Settings a script may change while it runs (`rmenu`, `savenumber`,
/// `numalias`, ...). Seeded from [`EngineConfig`]; not part of a snapshot,
/// since scripts declare them in `*define` before any save can happen.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Right-click menu entries.
    pub rmenu: Vec<MenuEntry>,
    /// Whether right-click opens the menu.
    pub rmode: bool,
    /// Number of user save slots.
    pub save_slots: u32,
    /// Stop skip at unread text.
    pub kidoku_skip: bool,
    /// Automode delay in milliseconds.
    pub automode_delay: u32,
    /// Lookback page capacity.
    pub page_capacity: usize,
    /// Audio stays enabled until the first device failure.
    pub audio_enabled: bool,
    /// `numalias` declarations.
    pub num_aliases: HashMap<String, i32>,
    /// `stralias` declarations.
    pub str_aliases: HashMap<String, String>,
}

impl EngineSettings {
    /// Initial settings for a config.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            rmenu: Vec::new(),
            rmode: true,
            save_slots: config.save_slots,
            kidoku_skip: config.kidoku_skip,
            automode_delay: config.automode_delay,
            page_capacity: config.page_capacity,
            audio_enabled: config.audio_enabled,
            num_aliases: HashMap::new(),
            str_aliases: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.page_capacity, 10);
        assert_eq!(config.save_slots, 9);
        assert_eq!(config.global_border, 200);
        assert_eq!(config.text_speed, 0);
    }

    #[test]
    fn config_builder_clamps() {
        let config = EngineConfig::default()
            .with_page_capacity(0)
            .with_save_slots(500)
            .with_variables(100, 300);
        assert_eq!(config.page_capacity, 1);
        assert_eq!(config.save_slots, 99);
        assert_eq!(config.global_border, 100);
    }

    #[test]
    fn settings_follow_config() {
        let config = EngineConfig::default()
            .with_kidoku_skip(true)
            .with_automode_delay(250);
        let settings = EngineSettings::from_config(&config);
        assert!(settings.kidoku_skip);
        assert_eq!(settings.automode_delay, 250);
        assert!(settings.rmode);
        assert!(settings.rmenu.is_empty());
    }
}
