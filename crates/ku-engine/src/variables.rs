use serde::{Deserialize, Serialize};

use crate::error::{ScriptError, ScriptResult};

/// A run of registers as stored in a snapshot or the global record.
/// Trailing defaults are trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRecord {
    /// Numeric registers from the start of the range.
    pub nums: Vec<i32>,
    /// String registers from the start of the range.
    pub strs: Vec<String>,
}

/// Numeric and string registers. Indices at or above the global border are
/// global: they survive reset and load and live in the global record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableStore {
    nums: Vec<i32>,
    strs: Vec<String>,
    global_border: usize,
}

impl VariableStore {
    /// `count` registers of each kind, globals from `global_border` up.
    pub fn new(count: usize, global_border: usize) -> Self {
        Self {
            nums: vec![0; count],
            strs: vec![String::new(); count],
            global_border: global_border.min(count),
        }
    }

    fn index(&self, index: u32) -> ScriptResult<usize> {
        let i = index as usize;
        if i < self.nums.len() {
            Ok(i)
        } else {
            Err(ScriptError::VariableRange(index))
        }
    }

    /// Registers of each kind.
    pub fn len(&self) -> usize {
        self.nums.len()
    }

    /// Whether there are no registers at all.
    pub fn is_empty(&self) -> bool {
        self.nums.is_empty()
    }

    /// First global index.
    pub fn global_border(&self) -> usize {
        self.global_border
    }

    /// Read `%index`.
    pub fn num(&self, index: u32) -> ScriptResult<i32> {
        Ok(self.nums[self.index(index)?])
    }

    /// Write `%index`.
    pub fn set_num(&mut self, index: u32, value: i32) -> ScriptResult<()> {
        let i = self.index(index)?;
        self.nums[i] = value;
        Ok(())
    }

    /// Read `$index`.
    pub fn str(&self, index: u32) -> ScriptResult<&str> {
        Ok(&self.strs[self.index(index)?])
    }

    /// Write `$index`.
    pub fn set_str(&mut self, index: u32, value: impl Into<String>) -> ScriptResult<()> {
        let i = self.index(index)?;
        self.strs[i] = value.into();
        Ok(())
    }

    /// Reset every local register.
    pub fn clear_locals(&mut self) {
        let border = self.global_border;
        self.nums[..border].fill(0);
        for s in &mut self.strs[..border] {
            s.clear();
        }
    }

    fn record(&self, range: std::ops::Range<usize>) -> VariableRecord {
        let nums = &self.nums[range.clone()];
        let strs = &self.strs[range];
        let num_len = nums.iter().rposition(|n| *n != 0).map_or(0, |i| i + 1);
        let str_len = strs.iter().rposition(|s| !s.is_empty()).map_or(0, |i| i + 1);
        VariableRecord {
            nums: nums[..num_len].to_vec(),
            strs: strs[..str_len].to_vec(),
        }
    }

    fn apply(&mut self, range: std::ops::Range<usize>, record: &VariableRecord) -> ScriptResult<()> {
        let width = range.len();
        if record.nums.len() > width || record.strs.len() > width {
            let over = record.nums.len().max(record.strs.len()) + range.start;
            return Err(ScriptError::VariableRange(u32::try_from(over).unwrap_or(u32::MAX)));
        }
        self.nums[range.clone()].fill(0);
        for s in &mut self.strs[range.clone()] {
            s.clear();
        }
        self.nums[range.start..range.start + record.nums.len()].copy_from_slice(&record.nums);
        for (slot, value) in self.strs[range.start..].iter_mut().zip(&record.strs) {
            slot.clone_from(value);
        }
        Ok(())
    }

    /// Local registers for a snapshot.
    pub fn local_record(&self) -> VariableRecord {
        self.record(0..self.global_border)
    }

    /// Replace the local registers. Fails without mutating if the record
    /// does not fit below the global border.
    pub fn apply_local_record(&mut self, record: &VariableRecord) -> ScriptResult<()> {
        self.apply(0..self.global_border, record)
    }

    /// Global registers for the global record.
    pub fn global_record(&self) -> VariableRecord {
        self.record(self.global_border..self.nums.len())
    }

    /// Replace the global registers.
    pub fn apply_global_record(&mut self, record: &VariableRecord) -> ScriptResult<()> {
        self.apply(self.global_border..self.nums.len(), record)
    }
}
