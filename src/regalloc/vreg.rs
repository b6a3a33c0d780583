//! Virtual registers and live ranges (§3 "VReg", "Live range").

use super::regmask::{PhysReg, RegMask};
use crate::ir::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct VReg(pub(crate) u32);

/// A single contiguous `[start, end]` interval over the program-point
/// numbering LSRA assigns during interval construction, plus the sorted use
/// positions within it (consulted by `allocate_free_reg`'s furthest-next-use
/// heuristic) and whatever register constraint the target imposed.
pub(crate) struct LiveRange {
    pub(crate) vreg: VReg,
    pub(crate) value: Value,
    pub(crate) mask: RegMask,
    pub(crate) start: u32,
    pub(crate) end: u32,
    pub(crate) use_positions: Vec<u32>,
    pub(crate) assigned: Option<PhysReg>,
    pub(crate) spilled: bool,

    /// Operand this range would prefer to share a register with, from
    /// `Target::node_2addr`. A preference only: `allocate_free_reg` honors it
    /// when the hinted register happens to be free, never at the cost of
    /// failing an otherwise-satisfiable allocation.
    pub(crate) hint: Option<Value>,

    /// True for a synthetic single-point range reserving a register a
    /// target's `tmp_count`/`clobbers_flags` says the emitted sequence
    /// clobbers but which isn't itself the value of any `Value` in the IR.
    /// Excluded from `LsraResult::assignment`.
    pub(crate) scratch: bool,
}

impl LiveRange {
    pub(crate) fn covers(&self, pos: u32) -> bool {
        self.start <= pos && pos <= self.end
    }

    pub(crate) fn intersects(&self, other: &LiveRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// First use position at or after `pos`, or `u32::MAX` if none (used to
    /// rank candidate registers by how soon they'd be needed again).
    pub(crate) fn next_use_at_or_after(&self, pos: u32) -> u32 {
        self.use_positions
            .iter()
            .copied()
            .find(|&p| p >= pos)
            .unwrap_or(u32::MAX)
    }

    pub(crate) fn record_use(&mut self, pos: u32) {
        if !self.use_positions.contains(&pos) {
            self.use_positions.push(pos);
            self.use_positions.sort_unstable();
        }
    }

    pub(crate) fn extend_to(&mut self, point: u32) {
        if point < self.start {
            self.start = point;
        }
        if point > self.end {
            self.end = point;
        }
    }
}
