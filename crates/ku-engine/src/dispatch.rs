//! Command word to handler.
//!
//! A sorted static table holds every command; a 26-entry first-letter index
//! narrows lookup to one contiguous run of it. Numbered variants (`w500`,
//! `d300`, `s20`, `c3`) are matched before the table.

use std::ops::{BitOr, BitOrAssign, Range};

use crate::args::Args;
use crate::commands::{choice, flow, media, system, text, vars};
use crate::engine::Engine;
use crate::error::{EngineResult, ScriptError};

/// Control-flow result of one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepFlags(u8);

impl StepFlags {
    /// Continue after the consumed arguments.
    pub const NONE: Self = Self(0);
    /// Skip the rest of the line.
    pub const NEXT_LINE: Self = Self(1);
    /// The handler placed the cursor itself.
    pub const POSITIONED: Self = Self(1 << 1);
    /// The label body ran out.
    pub const END_OF_LABEL: Self = Self(1 << 2);
    /// Stop the session.
    pub const TERMINATE: Self = Self(1 << 3);

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flag is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for StepFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for StepFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A command handler.
pub type CommandFn = fn(&mut Engine, &mut Args<'_>) -> EngineResult<StepFlags>;

/// A numbered-variant handler; receives the number after the prefix.
pub type VariantFn = fn(&mut Engine, u32, &mut Args<'_>) -> EngineResult<StepFlags>;

/// What the dispatcher hands back. Running it is the loop's business.
#[derive(Clone, Copy)]
pub enum Handler {
    /// A table command.
    Command {
        /// Table name.
        name: &'static str,
        /// Handler.
        run: CommandFn,
    },
    /// A numbered variant.
    Variant {
        /// One-letter prefix.
        prefix: char,
        /// Number after the prefix.
        number: u32,
        /// Handler.
        run: VariantFn,
    },
}

impl Handler {
    /// Run the handler.
    pub fn invoke(self, engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
        match self {
            Self::Command { run, .. } => run(engine, args),
            Self::Variant { number, run, .. } => run(engine, number, args),
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command { name, .. } => write!(f, "Command({name})"),
            Self::Variant { prefix, number, .. } => write!(f, "Variant({prefix}{number})"),
        }
    }
}

/// Every command, sorted by name.
pub(crate) static COMMANDS: &[(&str, CommandFn)] = &[
    ("add", vars::add),
    ("atoi", vars::atoi),
    ("automode_time", system::automode_time),
    ("bg", media::bg),
    ("bgm", media::bgm),
    ("bgmstop", media::bgmstop),
    ("br", text::br),
    ("break", flow::break_loop),
    ("btn", choice::btn),
    ("btndef", choice::btndef),
    ("btntime", choice::btntime),
    ("btnwait", choice::btnwait),
    ("caption", media::caption),
    ("cl", media::cl),
    ("click", text::click),
    ("cmp", vars::cmp),
    ("csp", media::csp),
    ("date", vars::date),
    ("dec", vars::dec),
    ("delay", text::delay),
    ("div", vars::div),
    ("dwave", media::dwave),
    ("dwaveloop", media::dwaveloop),
    ("dwavestop", media::dwavestop),
    ("end", flow::end),
    ("erasetextwindow", media::erasetextwindow),
    ("fileexist", vars::fileexist),
    ("for", flow::for_loop),
    ("game", flow::game),
    ("gosub", flow::gosub),
    ("goto", flow::goto),
    ("if", flow::if_then),
    ("inc", vars::inc),
    ("itoa", vars::itoa),
    ("kidokuskip", system::kidokuskip),
    ("ld", media::ld),
    ("len", vars::len),
    ("loadgame", system::loadgame),
    ("lr_trap", flow::lr_trap),
    ("lsp", media::lsp),
    ("maxkaisoupage", system::maxkaisoupage),
    ("mod", vars::modulo),
    ("monocro", media::monocro),
    ("mov", vars::mov),
    ("mul", vars::mul),
    ("next", flow::next),
    ("notif", flow::if_not),
    ("numalias", vars::numalias),
    ("print", media::print),
    ("r_trap", flow::r_trap),
    ("reset", flow::reset),
    ("return", flow::return_from),
    ("rmenu", system::rmenu),
    ("rmode", system::rmode),
    ("rnd", vars::rnd),
    ("rnd2", vars::rnd2),
    ("savegame", system::savegame),
    ("savenumber", system::savenumber),
    ("select", choice::select),
    ("selgosub", choice::selgosub),
    ("selnum", choice::selnum),
    ("skipoff", system::skipoff),
    ("spbtn", choice::spbtn),
    ("stralias", vars::stralias),
    ("sub", vars::sub),
    ("systemcall", system::systemcall),
    ("textclear", text::textclear),
    ("textspeed", text::textspeed),
    ("time", vars::time),
    ("trap", flow::trap),
    ("voicewait", text::voicewait),
    ("wait", text::wait),
];

/// Numbered-variant families.
static VARIANTS: &[(char, VariantFn)] = &[
    ('c', media::clear_sprite_variant),
    ('d', text::delay_variant),
    ('s', text::speed_variant),
    ('w', text::hard_sleep_variant),
];

/// The sorted table plus its first-letter index.
#[derive(Clone)]
pub struct DispatchTable {
    entries: &'static [(&'static str, CommandFn)],
    index: [Option<Range<usize>>; 26],
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("commands", &self.entries.len())
            .finish()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchTable {
    /// Build the index over the built-in command table.
    pub fn new() -> Self {
        Self::with_entries(COMMANDS)
    }

    fn with_entries(entries: &'static [(&'static str, CommandFn)]) -> Self {
        debug_assert!(
            entries.windows(2).all(|w| w[0].0 < w[1].0),
            "command table must be sorted and unique"
        );
        let mut index: [Option<Range<usize>>; 26] = Default::default();
        for (i, (name, _)) in entries.iter().enumerate() {
            let Some(slot) = letter_slot(name) else {
                continue;
            };
            match &mut index[slot] {
                Some(range) => range.end = i + 1,
                empty => *empty = Some(i..i + 1),
            }
        }
        Self { entries, index }
    }

    /// Find the handler for a command word. Case-insensitive.
    pub fn lookup(&self, word: &str) -> Result<Handler, ScriptError> {
        let word = word.to_ascii_lowercase();
        if let Some(handler) = variant(&word) {
            return Ok(handler);
        }
        let found = letter_slot(&word)
            .and_then(|slot| self.index[slot].clone())
            .and_then(|range| {
                let run = &self.entries[range];
                run.binary_search_by(|(name, _)| (*name).cmp(word.as_str()))
                    .ok()
                    .map(|i| run[i])
            });
        match found {
            Some((name, run)) => Ok(Handler::Command { name, run }),
            None => Err(ScriptError::UnknownCommand(word)),
        }
    }

    /// Whether a word names a command or a numbered variant.
    pub fn contains(&self, word: &str) -> bool {
        self.lookup(word).is_ok()
    }

    /// Every table command name, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    /// The table range for names starting with `letter`.
    pub fn range_for(&self, letter: char) -> Option<Range<usize>> {
        letter_slot(letter.encode_utf8(&mut [0; 4]))
            .and_then(|slot| self.index[slot].clone())
    }
}

fn letter_slot(word: &str) -> Option<usize> {
    let first = word.bytes().next()?.to_ascii_lowercase();
    if first.is_ascii_lowercase() {
        Some(usize::from(first - b'a'))
    } else {
        None
    }
}

fn variant(word: &str) -> Option<Handler> {
    let mut chars = word.chars();
    let prefix = chars.next()?;
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number = digits.parse().ok()?;
    VARIANTS
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(prefix, run)| Handler::Variant {
            prefix: *prefix,
            number,
            run: *run,
        })
}
