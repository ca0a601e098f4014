use log::info;

use crate::args::Args;
use crate::dispatch::StepFlags;
use crate::engine::Engine;
use crate::error::EngineResult;
use crate::wait::{CLICKED, SkipMode, TIMED_OUT, WaitKind, WaitOutcome, WaitRequest};

impl Engine {
    /// Run the next segment of a text line, starting at the cursor's byte
    /// offset.
    pub(crate) fn run_text(&mut self, text: &str) -> EngineResult<StepFlags> {
        let line = self.state.cursor.line;
        let start = self.state.cursor.pos.min(text.len());
        if start == 0
            && self.state.skip == SkipMode::UntilUnread
            && self.settings.kidoku_skip
            && !self.read_log.is_read(line)
        {
            info!(
                "unread text at line {}, skip off",
                self.script.display_line(line)
            );
            self.state.skip = SkipMode::Off;
        }

        let rest = text.get(start..).unwrap_or_default();
        match rest.chars().next() {
            None => {
                if !text.ends_with(['/', '\\']) {
                    self.host.draw_text("\n");
                    self.state.pages.push_text("\n");
                }
                self.read_log.mark(line);
                if self.state.skip == SkipMode::ToLineEnd {
                    self.state.skip = SkipMode::Off;
                }
                self.state.cursor.next_line();
                Ok(StepFlags::NEXT_LINE)
            }
            Some('@') => match self.enter_wait(WaitRequest::new(WaitKind::InlinePause))? {
                WaitOutcome::Resolved(_) => {
                    self.state.cursor.pos = start + 1;
                    Ok(StepFlags::NONE)
                }
                other => Ok(other.interrupted()),
            },
            Some('\\') => match self.enter_wait(WaitRequest::new(WaitKind::PageEnd))? {
                WaitOutcome::Resolved(_) => {
                    self.state.pages.complete_page();
                    self.state.buttons.clear();
                    self.host.clear_text();
                    self.state.cursor.pos = start + 1;
                    Ok(StepFlags::NONE)
                }
                other => Ok(other.interrupted()),
            },
            Some(_) => {
                let end = rest.find(['@', '\\']).map_or(text.len(), |i| start + i);
                let at_line_end = end == text.len();
                let mut segment = &text[start..end];
                if at_line_end {
                    segment = segment.strip_suffix('/').unwrap_or(segment);
                }
                self.host.draw_text(segment);

                let speed = self.state.display.text_speed;
                let chars = u32::try_from(segment.chars().count()).unwrap_or(u32::MAX);
                if speed > 0 && chars > 0 {
                    let request = WaitRequest::new(WaitKind::TextAnimation)
                        .with_timeout(speed.saturating_mul(chars), TIMED_OUT);
                    match self.enter_wait(request)? {
                        WaitOutcome::Resolved(CLICKED) if self.state.skip == SkipMode::Off => {
                            self.state.skip = if at_line_end {
                                SkipMode::ToLineEnd
                            } else {
                                SkipMode::ToNextPause
                            };
                        }
                        WaitOutcome::Resolved(_) => {}
                        other => return Ok(other.interrupted()),
                    }
                }

                self.state.pages.push_text(segment);
                self.state.cursor.pos = end;
                Ok(StepFlags::NONE)
            }
        }
    }

    fn append_text(&mut self, text: &str) {
        self.host.draw_text(text);
        self.state.pages.push_text(text);
    }
}

fn sleep(engine: &mut Engine, kind: WaitKind, ms: u32) -> EngineResult<StepFlags> {
    match engine.enter_wait(WaitRequest::new(kind).with_timeout(ms, CLICKED))? {
        WaitOutcome::Resolved(_) => Ok(StepFlags::NONE),
        other => Ok(other.interrupted()),
    }
}

/// `click`
pub fn click(engine: &mut Engine, _args: &mut Args<'_>) -> EngineResult<StepFlags> {
    match engine.enter_wait(WaitRequest::new(WaitKind::ClickCommand))? {
        WaitOutcome::Resolved(_) => Ok(StepFlags::NONE),
        other => Ok(other.interrupted()),
    }
}

/// `wait ms`: sleep, clicks ignored, skippable.
pub fn wait(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let ms = args.uint(&engine.scope())?;
    sleep(engine, WaitKind::Sleep, ms)
}

/// `delay ms`: sleep that a click cuts short.
pub fn delay(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let ms = args.uint(&engine.scope())?;
    sleep(engine, WaitKind::Delay, ms)
}

/// `w<ms>`: sleep that nothing cuts short.
pub fn hard_sleep_variant(
    engine: &mut Engine,
    ms: u32,
    _args: &mut Args<'_>,
) -> EngineResult<StepFlags> {
    sleep(engine, WaitKind::HardSleep, ms)
}

/// `d<ms>`
pub fn delay_variant(engine: &mut Engine, ms: u32, _args: &mut Args<'_>) -> EngineResult<StepFlags> {
    sleep(engine, WaitKind::Delay, ms)
}

/// `s<n>`
pub fn speed_variant(engine: &mut Engine, ms: u32, _args: &mut Args<'_>) -> EngineResult<StepFlags> {
    engine.state.display.text_speed = ms;
    Ok(StepFlags::NONE)
}

/// `br`
pub fn br(engine: &mut Engine, _args: &mut Args<'_>) -> EngineResult<StepFlags> {
    engine.append_text("\n");
    Ok(StepFlags::NONE)
}

/// `textclear`: complete the page and clear the window.
pub fn textclear(engine: &mut Engine, _args: &mut Args<'_>) -> EngineResult<StepFlags> {
    engine.state.pages.complete_page();
    engine.host.clear_text();
    Ok(StepFlags::NONE)
}

/// `textspeed ms`
pub fn textspeed(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let speed = args.uint(&engine.scope())?;
    engine.state.display.text_speed = speed;
    Ok(StepFlags::NONE)
}

/// `voicewait [channel]`: wait for a voice to finish, or a click.
pub fn voicewait(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let channel = if args.at_end() {
        0
    } else {
        args.uint(&engine.scope())?
    };
    if !engine.state.audio.is_playing(channel) {
        return Ok(StepFlags::NONE);
    }
    match engine.enter_wait(WaitRequest::new(WaitKind::VoiceWait).with_voice(channel))? {
        WaitOutcome::Resolved(_) => Ok(StepFlags::NONE),
        other => Ok(other.interrupted()),
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::testing::{engine_with, run};
    use crate::config::EngineConfig;
    use crate::event::{Event, TraceStep};
    use crate::host::{HostCall, RecordingHost};
    use crate::wait::{SkipMode, WaitKind};

    fn clicks(n: usize) -> Vec<TraceStep> {
        (0..n).map(|_| Event::click().into()).collect()
    }

    #[test]
    fn text_line_with_pause() {
        let (engine, log) = run("*start\n`Hello@ world\n", clicks(1));
        assert_eq!(log.text(), "Hello world\n");
        assert_eq!(engine.state().pages.current(), "Hello world\n");
        assert!(engine.read_log().is_read(1));
    }

    #[test]
    fn text_rendering_snapshot() {
        let (_, log) = run(
            "*start\n`First line.@\n`Second/\n`, joined.\\\n`Next page.\n",
            clicks(2),
        );
        assert_eq!(log.text(), "First line.\nSecond, joined.Next page.\n");
    }

    #[test]
    fn page_end_completes_page() {
        let (engine, log) = run("*start\n`One\\\n`Two\n", clicks(1));
        assert_eq!(engine.state().pages.page_back(0), Some("One"));
        assert_eq!(engine.state().pages.current(), "Two\n");
        assert_eq!(log.count(|c| *c == HostCall::ClearText), 1);
    }

    #[test]
    fn quit_inside_pause_stops_before_rest() {
        let (engine, log) = run("*start\n`Before@after\n", vec![]);
        assert_eq!(log.text(), "Before");
        assert_eq!(engine.state().cursor.pos, 6);
    }

    #[test]
    fn animation_click_switches_to_line_end_skip() {
        let config = EngineConfig::default().with_text_speed(10);
        let (mut engine, log, _) = engine_with(
            "*start\n`Long text\n`Next@\n",
            config,
            RecordingHost::new(),
            vec![Event::click().into()],
        );
        engine.step().unwrap();
        assert_eq!(engine.state().skip, SkipMode::ToLineEnd);
        engine.step().unwrap();
        assert_eq!(engine.state().skip, SkipMode::Off);
        assert_eq!(log.text(), "Long text\n");
    }

    #[test]
    fn animation_click_mid_line_stops_at_next_pause() {
        let config = EngineConfig::default().with_text_speed(10);
        let (mut engine, _, trace) = engine_with(
            "*start\n`Some@ more\n",
            config,
            RecordingHost::new(),
            vec![Event::click().into(), Event::click().into()],
        );
        engine.step().unwrap();
        assert_eq!(engine.state().skip, SkipMode::ToNextPause);
        engine.step().unwrap();
        assert_eq!(engine.state().skip, SkipMode::Off);
        assert_eq!(trace.remaining(), 0);
    }

    #[test]
    fn unread_text_stops_skip() {
        let config = EngineConfig::default().with_kidoku_skip(true);
        let (mut engine, _, _) = engine_with(
            "*start\n`Unread@\n",
            config,
            RecordingHost::new(),
            vec![],
        );
        engine.set_skip_mode(SkipMode::UntilUnread);
        engine.step().unwrap();
        assert_eq!(engine.state().skip, SkipMode::Off);
    }

    #[test]
    fn waits_time_out() {
        let (engine, log) = run(
            "*start\nwait 100\ndelay 50\nw20\nd10\nmov %0, 1\n",
            vec![],
        );
        assert_eq!(engine.state().vars.num(0).unwrap(), 1);
        assert_eq!(log.full_redraws(), 4);
    }

    #[test]
    fn hard_sleep_ignores_skip() {
        let (mut engine, _, trace) = engine_with(
            "*start\nw100\n",
            EngineConfig::default(),
            RecordingHost::new(),
            vec![Event::click().into(), TraceStep::Elapse],
        );
        engine.set_skip_mode(SkipMode::UntilUnread);
        engine.step().unwrap();
        assert_eq!(trace.remaining(), 0);
    }

    #[test]
    fn speed_commands() {
        let (engine, _) = run("*start\ns30\n", vec![]);
        assert_eq!(engine.state().display.text_speed, 30);
        let (engine, _) = run("*start\ntextspeed 5\n", vec![]);
        assert_eq!(engine.state().display.text_speed, 5);
    }

    #[test]
    fn voicewait_without_voice_returns_at_once() {
        let (engine, log) = run("*start\nvoicewait\nmov %0, 1\n", vec![]);
        assert_eq!(engine.state().vars.num(0).unwrap(), 1);
        assert_eq!(log.count(|c| *c == HostCall::WaitCursor(Some(WaitKind::VoiceWait))), 0);
    }

    #[test]
    fn voicewait_ends_on_channel_finish() {
        let (engine, _) = run(
            "*start\ndwave 0, \"v.ogg\"\nvoicewait\nmov %0, 1\n",
            vec![Event::ChannelFinished { channel: 0 }.into()],
        );
        assert_eq!(engine.state().vars.num(0).unwrap(), 1);
        assert!(!engine.state().audio.is_playing(0));
    }

    #[test]
    fn br_and_textclear() {
        let (engine, log) = run("*start\n`a/\nbr\n`b/\ntextclear\n", vec![]);
        assert_eq!(log.text(), "a\nb");
        assert_eq!(engine.state().pages.page_back(0), Some("a\nb"));
        assert_eq!(engine.state().pages.current(), "");
    }
}
