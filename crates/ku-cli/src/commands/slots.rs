use std::path::Path;

use chrono::DateTime;
use comfy_table::{ContentArrangement, Table};
use ku_engine::host::{FsSlotStorage, SlotStorage};
use ku_engine::snapshot::{self, MAGIC};
use ku_engine::{SlotId, Snapshot};

/// User slots the listing reads, plus the emergency slot.
const MAX_USER_SLOT: u32 = 99;

pub fn run(dir: &Path) -> Result<(), String> {
    if !dir.is_dir() {
        return Err(format!("{} is not a directory", dir.display()));
    }
    let storage = FsSlotStorage::new(dir);

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Slot", "Saved", "Label", "Line"]);

    let slots = (1..=MAX_USER_SLOT).map(SlotId).chain([SlotId::EMERGENCY]);
    let mut occupied = 0;
    for slot in slots {
        let bytes = match storage.read_slot(slot) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => continue,
            Err(e) => return Err(e.to_string()),
        };
        occupied += 1;

        let saved = snapshot::read_header(&bytes, MAGIC)
            .ok()
            .and_then(|h| DateTime::from_timestamp(h.timestamp, 0))
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "?".to_string());
        let (label, line) = match Snapshot::decode(&bytes) {
            Ok(snap) => (format!("*{}", snap.label), (snap.position.line + 1).to_string()),
            Err(e) => (format!("unreadable: {e}"), "—".to_string()),
        };
        table.add_row(vec![slot.to_string(), saved, label, line]);
    }

    if occupied == 0 {
        println!("  No saved games in {}.", dir.display());
        return Ok(());
    }

    println!("{table}");
    println!();
    println!("  {occupied} occupied slots");

    Ok(())
}
