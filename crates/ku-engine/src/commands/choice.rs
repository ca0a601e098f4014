//! Choices and button waits.

use ku_script::Token;
use log::debug;

use crate::args::Args;
use crate::buttons::{ButtonKind, ButtonSet};
use crate::dispatch::StepFlags;
use crate::engine::Engine;
use crate::error::{EngineResult, ScriptResult};
use crate::host::Rect;
use crate::wait::{TIMED_OUT, WaitKind, WaitOutcome, WaitRequest};

/// Read `"text"[, *label]` entries separated by commas.
fn read_choices(
    engine: &Engine,
    args: &mut Args<'_>,
    with_labels: bool,
) -> ScriptResult<Vec<(String, Option<String>)>> {
    let scope = engine.scope();
    let mut entries = Vec::new();
    loop {
        let text = args.string(&scope)?;
        let label = if with_labels {
            args.comma()?;
            Some(args.label()?)
        } else {
            None
        };
        entries.push((text, label));
        if !args.eat(&Token::Comma) {
            return Ok(entries);
        }
    }
}

impl Engine {
    /// Show a column of text choices and wait for one. `Ok(index)` is the
    /// 0-based choice; `Err(flags)` means the wait was interrupted.
    fn choose<'a>(
        &mut self,
        texts: impl IntoIterator<Item = &'a str>,
    ) -> EngineResult<Result<usize, StepFlags>> {
        let entries = texts.into_iter().zip(1..);
        self.state.buttons = ButtonSet::text_column(entries, &self.config.layout);
        self.host.show_buttons(&self.state.buttons);
        match self.enter_wait(WaitRequest::new(WaitKind::Choice))? {
            WaitOutcome::Resolved(code) => {
                self.clear_buttons();
                let index = usize::try_from(code.max(1) - 1).unwrap_or_default();
                debug!("choice {index}");
                Ok(Ok(index))
            }
            other => Ok(Err(other.interrupted())),
        }
    }

    fn clear_buttons(&mut self) {
        self.state.buttons.clear();
        self.host.show_buttons(&self.state.buttons);
    }
}

/// `select "text", *label, ...`: jump to the chosen label.
pub fn select(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let entries = read_choices(engine, args, true)?;
    let index = match engine.choose(entries.iter().map(|(t, _)| t.as_str()))? {
        Ok(index) => index,
        Err(flags) => return Ok(flags),
    };
    if let Some((_, Some(label))) = entries.get(index) {
        engine.jump_to(label)?;
    }
    Ok(StepFlags::POSITIONED)
}

/// `selgosub "text", *label, ...`: call the chosen label.
pub fn selgosub(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let entries = read_choices(engine, args, true)?;
    let index = match engine.choose(entries.iter().map(|(t, _)| t.as_str()))? {
        Ok(index) => index,
        Err(flags) => return Ok(flags),
    };
    if let Some((_, Some(label))) = entries.get(index) {
        engine.call(label, args)?;
    }
    Ok(StepFlags::POSITIONED)
}

/// `selnum %v, "text", ...`: store the 0-based choice.
pub fn selnum(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let var = args.num_var(&engine.scope())?;
    args.comma()?;
    let entries = read_choices(engine, args, false)?;
    let index = match engine.choose(entries.iter().map(|(t, _)| t.as_str()))? {
        Ok(index) => index,
        Err(flags) => return Ok(flags),
    };
    engine
        .state
        .vars
        .set_num(var, i32::try_from(index).unwrap_or(i32::MAX))?;
    Ok(StepFlags::NONE)
}

/// `btndef "image"|clear`: start a new button set.
pub fn btndef(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let image = if args.eat_word("clear") {
        None
    } else {
        Some(args.image(&engine.scope())?)
    };
    engine.state.buttons.reset(image);
    Ok(StepFlags::NONE)
}

/// `btn value, x, y, w, h[, sx, sy]`: a region of the `btndef` image.
pub fn btn(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let value = args.int(&scope)?;
    let mut rect = [0i32; 4];
    for field in &mut rect {
        args.comma()?;
        *field = args.int(&scope)?;
    }
    while args.eat(&Token::Comma) {
        args.int(&scope)?;
    }
    let [x, y, w, h] = rect;
    let (Ok(w), Ok(h)) = (u32::try_from(w), u32::try_from(h)) else {
        return Err(args.malformed("width and height must not be negative").into());
    };
    engine
        .state
        .buttons
        .add(ButtonKind::Region, Rect::new(x, y, w, h), value);
    Ok(StepFlags::NONE)
}

/// `spbtn sprite, value`: the sprite's bounds become a button.
pub fn spbtn(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let sprite = args.uint(&scope)?;
    args.comma()?;
    let value = args.int(&scope)?;
    let Some(rect) = engine.host.sprite_bounds(sprite) else {
        return Err(args.malformed(format!("sprite {sprite} is not loaded")).into());
    };
    engine
        .state
        .buttons
        .add(ButtonKind::Sprite(sprite), rect, value);
    Ok(StepFlags::NONE)
}

/// `btntime ms`: time limit for later button waits; 0 removes it.
pub fn btntime(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let ms = args.uint(&engine.scope())?;
    engine.state.btntime = (ms > 0).then_some(ms);
    Ok(StepFlags::NONE)
}

/// `btnwait %v`: wait for a button and store its value (0 for a miss,
/// -1 for cancel, -2 when `btntime` runs out).
pub fn btnwait(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let var = args.num_var(&engine.scope())?;
    let mut request = WaitRequest::new(WaitKind::ButtonSelect);
    if let Some(ms) = engine.state.btntime {
        request = request.with_timeout(ms, TIMED_OUT);
    }
    engine.host.show_buttons(&engine.state.buttons);
    match engine.enter_wait(request)? {
        WaitOutcome::Resolved(code) => {
            engine.clear_buttons();
            engine.state.vars.set_num(var, code)?;
            Ok(StepFlags::NONE)
        }
        other => Ok(other.interrupted()),
    }
}
