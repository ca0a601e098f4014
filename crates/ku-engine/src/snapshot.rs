//! Snapshot encoding, persist and restore.
//!
//! A snapshot is a fixed 20-byte header followed by a JSON body:
//!
//! ```text
//! 0..4    magic     b"KUSV" (b"KUGL" for the global record)
//! 4..8    version   u32 LE
//! 8..16   timestamp i64 LE, Unix seconds
//! 16..20  length    u32 LE, body bytes
//! 20..    body      JSON
//! ```
//!
//! Restoring decodes and validates everything before the live session is
//! touched, so a bad snapshot leaves the engine exactly as it was.

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::buttons::ButtonSet;
use crate::cursor::{Position, ScriptCursor};
use crate::engine::{Engine, LoopState};
use crate::error::EngineResult;
use crate::host::SlotId;
use crate::nest::NestStack;
use crate::page::PageBuffer;
use crate::readlog::ReadLog;
use crate::session::{AudioState, DisplayFlags, Randomizer};
use crate::syscall::Shelter;
use crate::variables::VariableRecord;
use crate::wait::{SkipMode, Traps};

/// Session snapshot magic.
pub const MAGIC: &[u8; 4] = b"KUSV";
/// Global record magic.
pub const GLOBAL_MAGIC: &[u8; 4] = b"KUGL";
/// Current session snapshot version.
/// Increment this when making breaking changes to the snapshot format.
pub const VERSION: u32 = 2;
/// Current global record version.
pub const GLOBAL_VERSION: u32 = 1;
/// Header size in bytes.
pub const HEADER_LEN: usize = 20;

/// Why a snapshot could not be written or restored.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Fewer bytes than the header or its length field promise.
    #[error("snapshot is truncated")]
    Truncated,

    /// Not a snapshot of the expected kind.
    #[error("snapshot has a bad magic number")]
    BadMagic,

    /// Written by an incompatible version.
    #[error("fatal: unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    /// The body is not valid JSON for the layout.
    #[error("corrupt snapshot body: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The body does not fit the length field.
    #[error("snapshot body of {0} bytes is too large")]
    Oversized(usize),

    /// The saved position is not inside the running script.
    #[error("saved line {line} is outside the script")]
    CursorOutOfRange {
        /// Global line index from the snapshot.
        line: usize,
    },

    /// The snapshot does not fit the running engine's configuration.
    #[error("snapshot does not fit: {0}")]
    Mismatch(String),

    /// Nothing was saved in the slot.
    #[error("slot {0} is empty")]
    EmptySlot(u32),
}

impl SnapshotError {
    /// Only an unknown version ends the session; everything else aborts the
    /// restore and leaves the session as it was.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnsupportedVersion(_))
    }
}

/// The fixed-size prefix of every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Format version.
    pub version: u32,
    /// Unix seconds when it was written.
    pub timestamp: i64,
    /// Body length in bytes.
    pub body_len: u32,
}

/// Read the header and check the magic. The version is not checked here,
/// so slot listings can show any snapshot's timestamp.
pub fn read_header(bytes: &[u8], magic: &[u8; 4]) -> Result<Header, SnapshotError> {
    let header = bytes.get(..HEADER_LEN).ok_or(SnapshotError::Truncated)?;
    if &header[0..4] != magic {
        return Err(SnapshotError::BadMagic);
    }
    let word = |range: std::ops::Range<usize>| -> [u8; 4] {
        let mut out = [0; 4];
        out.copy_from_slice(&header[range]);
        out
    };
    let mut stamp = [0; 8];
    stamp.copy_from_slice(&header[8..16]);
    Ok(Header {
        version: u32::from_le_bytes(word(4..8)),
        timestamp: i64::from_le_bytes(stamp),
        body_len: u32::from_le_bytes(word(16..20)),
    })
}

fn frame(magic: &[u8; 4], version: u32, body: Vec<u8>) -> Result<Vec<u8>, SnapshotError> {
    let len = u32::try_from(body.len()).map_err(|_| SnapshotError::Oversized(body.len()))?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(magic);
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(&Utc::now().timestamp().to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend(body);
    Ok(out)
}

fn body<'a>(bytes: &'a [u8], header: &Header) -> Result<&'a [u8], SnapshotError> {
    let len = usize::try_from(header.body_len).map_err(|_| SnapshotError::Truncated)?;
    bytes
        .get(HEADER_LEN..HEADER_LEN + len)
        .ok_or(SnapshotError::Truncated)
}

/// Completed pages and the page being written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Completed pages, oldest first.
    pub completed: Vec<String>,
    /// The current page.
    pub current: String,
}

/// Where the random sequence stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngRecord {
    /// Seed.
    pub seed: u64,
    /// Values drawn.
    pub draws: u64,
}

/// Everything needed to resume a session, in the order it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Name of the label containing the resume line.
    pub label: String,
    /// Resume line and position.
    pub position: Position,
    /// Gosub and for frames.
    pub nest: NestStack,
    /// Local registers.
    pub variables: VariableRecord,
    /// Text history.
    pub pages: PageRecord,
    /// Presentation state.
    pub display: DisplayFlags,
    /// Audio channels.
    pub audio: AudioState,
    /// Skip mode.
    pub skip: SkipMode,
    /// Automode.
    pub automode: bool,
    /// Button definitions.
    pub buttons: ButtonSet,
    /// `btntime` limit.
    pub btntime: Option<u32>,
    /// Armed traps.
    pub traps: Traps,
    /// Random sequence position.
    pub rng: RngRecord,
    /// A `break` is skipping to `next`.
    pub break_pending: bool,
}

/// The first layout, without page history, traps or random bookkeeping.
#[derive(Debug, Clone, Deserialize)]
struct SnapshotV1 {
    label: String,
    position: Position,
    nest: NestStack,
    variables: VariableRecord,
    display: DisplayFlags,
    audio: AudioState,
    skip: SkipMode,
    automode: bool,
    buttons: ButtonSet,
    btntime: Option<u32>,
    break_pending: bool,
}

impl From<SnapshotV1> for Snapshot {
    fn from(v1: SnapshotV1) -> Self {
        Self {
            label: v1.label,
            position: v1.position,
            nest: v1.nest,
            variables: v1.variables,
            pages: PageRecord::default(),
            display: v1.display,
            audio: v1.audio,
            skip: v1.skip,
            automode: v1.automode,
            buttons: v1.buttons,
            btntime: v1.btntime,
            traps: Traps::default(),
            rng: RngRecord::default(),
            break_pending: v1.break_pending,
        }
    }
}

impl Snapshot {
    /// Header plus JSON body at the current version.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        frame(MAGIC, VERSION, serde_json::to_vec(self)?)
    }

    /// Decode any supported version.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let header = read_header(bytes, MAGIC)?;
        let body = body(bytes, &header)?;
        match header.version {
            1 => Ok(serde_json::from_slice::<SnapshotV1>(body)?.into()),
            VERSION => Ok(serde_json::from_slice(body)?),
            other => Err(SnapshotError::UnsupportedVersion(other)),
        }
    }
}

/// What survives every session: global registers and the read log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRecord {
    /// Registers from the global border up.
    pub variables: VariableRecord,
    /// Lines read.
    pub read_log: ReadLog,
}

/// Encode the global record.
pub fn encode_global(record: &GlobalRecord) -> Result<Vec<u8>, SnapshotError> {
    frame(GLOBAL_MAGIC, GLOBAL_VERSION, serde_json::to_vec(record)?)
}

/// Decode the global record.
pub fn decode_global(bytes: &[u8]) -> Result<GlobalRecord, SnapshotError> {
    let header = read_header(bytes, GLOBAL_MAGIC)?;
    if header.version != GLOBAL_VERSION {
        return Err(SnapshotError::UnsupportedVersion(header.version));
    }
    Ok(serde_json::from_slice(body(bytes, &header)?)?)
}

impl Engine {
    /// Capture the session so that it resumes at `resume_at`. During a
    /// system call the sheltered buttons and window state are the ones the
    /// player will come back to, so they are captured instead of the live
    /// ones.
    pub fn capture(&self, resume_at: ScriptCursor, shelter: Option<&Shelter>) -> Snapshot {
        let state = &self.state;
        let mut display = state.display.clone();
        let buttons = match shelter {
            Some(shelter) => {
                display.window_erased = shelter.window_erased();
                shelter.buttons().clone()
            }
            None => state.buttons.clone(),
        };
        Snapshot {
            label: self.script.label(resume_at.label).name.clone(),
            position: resume_at.position(),
            nest: state.nest.clone(),
            variables: state.vars.local_record(),
            pages: PageRecord {
                completed: state.pages.completed(),
                current: state.pages.current().to_string(),
            },
            display,
            audio: state.audio.clone(),
            skip: state.skip,
            automode: state.automode,
            buttons,
            btntime: state.btntime,
            traps: state.traps.clone(),
            rng: RngRecord {
                seed: state.rng.seed(),
                draws: state.rng.draws(),
            },
            break_pending: state.break_pending,
        }
    }

    /// Serialize the session, resuming at `resume_at`.
    pub fn persist(&self, resume_at: ScriptCursor) -> EngineResult<Vec<u8>> {
        self.persist_with(resume_at, None)
    }

    /// [`Engine::persist`] from inside a system call.
    pub fn persist_with(
        &self,
        resume_at: ScriptCursor,
        shelter: Option<&Shelter>,
    ) -> EngineResult<Vec<u8>> {
        Ok(self.capture(resume_at, shelter).encode()?)
    }

    /// Persist into a user slot.
    pub(crate) fn save_slot(
        &mut self,
        slot: SlotId,
        resume_at: ScriptCursor,
        shelter: Option<&Shelter>,
    ) -> EngineResult<()> {
        let bytes = self.persist_with(resume_at, shelter)?;
        self.host.write_slot(slot, &bytes)?;
        info!(
            "saved slot {slot} at line {}",
            self.script.display_line(resume_at.line)
        );
        Ok(())
    }

    /// Restore from a user slot.
    pub(crate) fn load_slot(&mut self, slot: SlotId) -> EngineResult<()> {
        let bytes = self
            .host
            .read_slot(slot)?
            .ok_or(SnapshotError::EmptySlot(slot.0))?;
        self.restore(&bytes)?;
        info!("loaded slot {slot}");
        Ok(())
    }

    /// Replace the session with a snapshot and bring the host in line with
    /// it. Nothing changes unless the whole snapshot is usable.
    pub fn restore(&mut self, bytes: &[u8]) -> EngineResult<()> {
        let snapshot = Snapshot::decode(bytes)?;
        let line = snapshot.position.line;
        let cursor = ScriptCursor::from_position(&self.script, snapshot.position)
            .ok_or(SnapshotError::CursorOutOfRange { line })?;
        let mut vars = self.state.vars.clone();
        vars.apply_local_record(&snapshot.variables)
            .map_err(|e| SnapshotError::Mismatch(e.to_string()))?;
        let label = self.script.label(cursor.label).name.as_str();
        if !label.eq_ignore_ascii_case(&snapshot.label) {
            debug!("saved in *{}, resuming in *{label}", snapshot.label);
        }

        let previous_display = std::mem::replace(&mut self.state.display, snapshot.display);
        let previous_audio = std::mem::replace(&mut self.state.audio, snapshot.audio);
        let state = &mut self.state;
        state.cursor = cursor;
        state.save_point = cursor;
        state.loop_state = LoopState::Running;
        state.nest = snapshot.nest;
        state.vars = vars;
        state.pages = PageBuffer::from_pages(
            self.settings.page_capacity,
            snapshot.pages.completed,
            snapshot.pages.current,
        );
        state.skip = snapshot.skip;
        state.automode = snapshot.automode;
        state.buttons = snapshot.buttons;
        state.btntime = snapshot.btntime;
        state.traps = snapshot.traps;
        state.rng = Randomizer::resume(snapshot.rng.seed, snapshot.rng.draws);
        state.break_pending = snapshot.break_pending;
        state.wait.disarm();

        self.resume_audio(&previous_audio);
        self.redisplay(&previous_display);
        self.host.show_buttons(&self.state.buttons);
        Ok(())
    }
}
