//! Images, sprites and audio. Every change is recorded in the session's
//! display and audio state first, so a restore can re-send it.

use log::{debug, warn};

use crate::args::{Args, Scope};
use crate::dispatch::StepFlags;
use crate::engine::Engine;
use crate::error::{EngineResult, ResourceError, ScriptResult};
use crate::host::{AudioChannel, Redraw, SpriteState, StandPosition};
use crate::session::{AudioState, DisplayFlags, PlayingChannel};

fn stand_position(args: &mut Args<'_>, allow_all: bool) -> ScriptResult<Option<StandPosition>> {
    let word = args.word()?;
    match word.as_str() {
        "l" => Ok(Some(StandPosition::Left)),
        "c" => Ok(Some(StandPosition::Center)),
        "r" => Ok(Some(StandPosition::Right)),
        "a" if allow_all => Ok(None),
        other => Err(args.malformed(format!("unknown position '{other}'"))),
    }
}

impl Engine {
    /// Fail unless `image` is a colour or an archive file.
    fn require_image(&self, image: &str) -> Result<(), ResourceError> {
        if image.starts_with('#') || self.host.file_exists(image) {
            Ok(())
        } else {
            Err(ResourceError::MissingAsset(image.to_string()))
        }
    }

    /// Apply a scene change, hiding the text window around it when
    /// `erasetextwindow` is on and an effect is used.
    fn change_scene(&mut self, effect: i32, apply: impl FnOnce(&mut Self)) {
        let display = &self.state.display;
        let hide = effect != 0 && display.erase_text_window && !display.window_erased;
        if hide {
            self.host.set_window_visible(false);
        }
        apply(self);
        self.host.request_redraw(Redraw::Full);
        if hide {
            self.host.set_window_visible(true);
        }
    }

    /// Start a sound. A device failure disables audio for the session.
    fn play(&mut self, name: &str, channel: AudioChannel, looped: bool) -> bool {
        if !self.settings.audio_enabled {
            debug!("audio disabled, not playing {name}");
            return false;
        }
        match self.host.play(name, channel, looped) {
            Ok(()) => true,
            Err(e) => {
                warn!("{e}; audio disabled for this session");
                self.settings.audio_enabled = false;
                false
            }
        }
    }

    fn play_effect(&mut self, channel: u32, name: String, looped: bool) {
        if self.play(&name, AudioChannel::Effect(channel), looped) {
            self.state
                .audio
                .effects
                .insert(channel, PlayingChannel { name, looped });
        }
    }

    /// Re-send every piece of display state, clearing what `previous`
    /// showed and the current state does not.
    pub(crate) fn redisplay(&mut self, previous: &DisplayFlags) {
        let display = &self.state.display;
        for id in previous.sprites.keys() {
            if !display.sprites.contains_key(id) {
                self.host.set_sprite(*id, None);
            }
        }
        self.host.set_caption(&display.caption);
        self.host.set_background(display.background.as_deref());
        for position in StandPosition::ALL {
            self.host.set_standing(position, display.standing(position));
        }
        for (id, sprite) in &display.sprites {
            self.host.set_sprite(*id, Some(sprite));
        }
        self.host.set_monochrome(display.monochrome);
        self.host.set_window_visible(!display.window_erased);
        self.host.clear_text();
        self.host.draw_text(self.state.pages.current());
        self.host.request_redraw(Redraw::Full);
    }

    /// Stop what `previous` was playing, forget one-shot channels, and
    /// restart looping sounds by name.
    pub(crate) fn resume_audio(&mut self, previous: &AudioState) {
        if previous.bgm.is_some() {
            self.host.stop(AudioChannel::Music);
        }
        for channel in previous.effects.keys() {
            self.host.stop(AudioChannel::Effect(*channel));
        }
        self.state.audio.effects.retain(|_, c| c.looped);
        let audio = self.state.audio.clone();
        if let Some(name) = &audio.bgm {
            self.play(name, AudioChannel::Music, true);
        }
        for (channel, playing) in &audio.effects {
            self.play(&playing.name, AudioChannel::Effect(*channel), true);
        }
    }
}

/// `caption "title"`
pub fn caption(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let caption = args.string(&engine.scope())?;
    engine.host.set_caption(&caption);
    engine.state.display.caption = caption;
    Ok(StepFlags::NONE)
}

/// `bg image [, effect]`
pub fn bg(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let image = args.image(&scope)?;
    let effect = args.effect(&scope)?;
    engine.require_image(&image)?;
    engine.change_scene(effect, |e| {
        e.host.set_background(Some(&image));
        e.state.display.standing = Default::default();
        for position in StandPosition::ALL {
            e.host.set_standing(position, None);
        }
        e.state.display.background = Some(image);
    });
    Ok(StepFlags::NONE)
}

/// `ld l|c|r, image [, effect]`
pub fn ld(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let Some(position) = stand_position(args, false)? else {
        return Err(args.malformed("ld needs l, c or r").into());
    };
    args.comma()?;
    let image = args.image(&scope)?;
    let effect = args.effect(&scope)?;
    engine.require_image(&image)?;
    engine.change_scene(effect, |e| {
        e.host.set_standing(position, Some(&image));
        e.state.display.standing[position.index()] = Some(image);
    });
    Ok(StepFlags::NONE)
}

/// `cl l|c|r|a [, effect]`
pub fn cl(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let target = stand_position(args, true)?;
    let effect = args.effect(&scope)?;
    let positions = match target {
        Some(position) => vec![position],
        None => StandPosition::ALL.to_vec(),
    };
    engine.change_scene(effect, |e| {
        for position in positions {
            e.host.set_standing(position, None);
            e.state.display.standing[position.index()] = None;
        }
    });
    Ok(StepFlags::NONE)
}

/// `lsp n, image, x, y`
pub fn lsp(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let id = args.uint(&scope)?;
    args.comma()?;
    let image = args.image(&scope)?;
    args.comma()?;
    let x = args.int(&scope)?;
    args.comma()?;
    let y = args.int(&scope)?;
    engine.require_image(&image)?;
    let sprite = SpriteState {
        image,
        x,
        y,
        visible: true,
    };
    engine.host.set_sprite(id, Some(&sprite));
    engine.state.display.sprites.insert(id, sprite);
    Ok(StepFlags::NONE)
}

fn clear_sprite(engine: &mut Engine, id: Option<u32>) {
    match id {
        Some(id) => {
            if engine.state.display.sprites.remove(&id).is_some() {
                engine.host.set_sprite(id, None);
            }
        }
        None => {
            for id in std::mem::take(&mut engine.state.display.sprites).into_keys() {
                engine.host.set_sprite(id, None);
            }
        }
    }
}

fn sprite_number(args: &mut Args<'_>, scope: &Scope<'_>) -> ScriptResult<Option<u32>> {
    let n = args.int(scope)?;
    if n < 0 {
        Ok(None)
    } else {
        Ok(u32::try_from(n).ok())
    }
}

/// `csp n`; `csp -1` clears every sprite.
pub fn csp(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let id = sprite_number(args, &engine.scope())?;
    clear_sprite(engine, id);
    Ok(StepFlags::NONE)
}

/// `c<n>`
pub fn clear_sprite_variant(
    engine: &mut Engine,
    id: u32,
    _args: &mut Args<'_>,
) -> EngineResult<StepFlags> {
    clear_sprite(engine, Some(id));
    Ok(StepFlags::NONE)
}

/// `print effect`: show pending image changes.
pub fn print(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let effect = if args.at_end() {
        0
    } else {
        args.int(&engine.scope())?
    };
    engine.change_scene(effect, |_| {});
    Ok(StepFlags::NONE)
}

/// `monocro #rrggbb|off`
pub fn monocro(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let on = !args.eat_word("off");
    if on {
        args.image(&engine.scope())?;
    }
    engine.state.display.monochrome = on;
    engine.host.set_monochrome(on);
    Ok(StepFlags::NONE)
}

/// `erasetextwindow 0|1`
pub fn erasetextwindow(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let on = args.switch(&engine.scope())?;
    engine.state.display.erase_text_window = on;
    Ok(StepFlags::NONE)
}

/// `bgm "name"`: loop background music.
pub fn bgm(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let name = args.string(&engine.scope())?;
    if engine.state.audio.bgm.take().is_some() {
        engine.host.stop(AudioChannel::Music);
    }
    if engine.play(&name, AudioChannel::Music, true) {
        engine.state.audio.bgm = Some(name);
    }
    Ok(StepFlags::NONE)
}

/// `bgmstop`
pub fn bgmstop(engine: &mut Engine, _args: &mut Args<'_>) -> EngineResult<StepFlags> {
    if engine.state.audio.bgm.take().is_some() {
        engine.host.stop(AudioChannel::Music);
    }
    Ok(StepFlags::NONE)
}

fn channel_and_name(engine: &Engine, args: &mut Args<'_>) -> ScriptResult<(u32, String)> {
    let scope = engine.scope();
    let channel = args.uint(&scope)?;
    args.comma()?;
    Ok((channel, args.string(&scope)?))
}

/// `dwave ch, "name"`
pub fn dwave(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let (channel, name) = channel_and_name(engine, args)?;
    engine.play_effect(channel, name, false);
    Ok(StepFlags::NONE)
}

/// `dwaveloop ch, "name"`
pub fn dwaveloop(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let (channel, name) = channel_and_name(engine, args)?;
    engine.play_effect(channel, name, true);
    Ok(StepFlags::NONE)
}

/// `dwavestop ch`
pub fn dwavestop(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let channel = args.uint(&engine.scope())?;
    if engine.state.audio.effects.remove(&channel).is_some() {
        engine.host.stop(AudioChannel::Effect(channel));
    }
    Ok(StepFlags::NONE)
}
