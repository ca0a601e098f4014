use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::thread;

use colored::Colorize;
use ku_engine::host::{DirArchive, FsSlotStorage, MemoryStorage, SlotStorage};
use ku_engine::{Engine, EngineConfig, Event, EventSender, EventSource, TraceSource, event};
use log::{debug, info};

use crate::terminal::TerminalHost;

/// Flags of `kulisse run`.
pub struct RunOptions {
    pub script: PathBuf,
    pub input: Option<PathBuf>,
    pub saves: Option<PathBuf>,
    pub archive: Option<PathBuf>,
    pub seed: u64,
    pub text_speed: u32,
    pub auto_delay: u32,
    pub kidoku: bool,
}

pub fn run(options: RunOptions) -> Result<(), String> {
    let script = super::load_script(&options.script)?;

    let config = EngineConfig::default()
        .with_seed(options.seed)
        .with_text_speed(options.text_speed)
        .with_automode_delay(options.auto_delay)
        .with_kidoku_skip(options.kidoku);

    let archive_root = match &options.archive {
        Some(dir) => dir.clone(),
        None => script_dir(&options.script),
    };
    let storage: Box<dyn SlotStorage> = match &options.saves {
        Some(dir) => Box::new(FsSlotStorage::new(dir)),
        None => Box::new(MemoryStorage::new()),
    };
    let host = TerminalHost::new(DirArchive::new(archive_root), storage);

    let (host, events): (TerminalHost, Box<dyn EventSource>) = match &options.input {
        Some(path) => {
            let json = fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            let trace = TraceSource::from_json(&json)
                .map_err(|e| format!("invalid trace {}: {e}", path.display()))?;
            info!("replaying {} trace steps", trace.remaining());
            (host, Box::new(trace))
        }
        None => {
            let (sender, source) = event::channel();
            spawn_stdin_reader(sender.clone());
            (host.with_notifier(sender), Box::new(source))
        }
    };

    let mut engine =
        Engine::new(script, config, Box::new(host), events).map_err(|e| e.to_string())?;
    let summary = engine.run().map_err(|e| e.to_string())?;

    println!();
    let mut status = format!("  {} steps", summary.steps);
    if summary.recovered > 0 {
        status.push_str(&format!(", {} lines skipped after errors", summary.recovered));
    }
    eprintln!("{}", status.dimmed());
    Ok(())
}

fn script_dir(script: &Path) -> PathBuf {
    script
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Feed stdin lines to the engine until input ends or the engine is gone.
fn spawn_stdin_reader(sender: EventSender) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let Some(event) = parse_input(&line) else {
                eprintln!(
                    "{}",
                    "enter: click, r: menu, s: skip, a: auto, o: page, q: quit, 1-9: choose"
                        .dimmed()
                );
                continue;
            };
            debug!("stdin event {event:?}");
            let quit = event == Event::Quit;
            if !sender.send(event) || quit {
                return;
            }
        }
        // The host keeps a sender alive, so end of input must be explicit.
        sender.send(Event::Quit);
    });
}

/// One line of player input.
fn parse_input(line: &str) -> Option<Event> {
    let line = line.trim();
    let mut chars = line.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return line.is_empty().then(Event::click);
    };
    match c.to_ascii_lowercase() {
        'r' => Some(Event::right_click()),
        'q' => Some(Event::Quit),
        c @ ('s' | 'a' | 'o') => Some(Event::char(c)),
        c if c.is_ascii_digit() => Some(Event::char(c)),
        _ => None,
    }
}
