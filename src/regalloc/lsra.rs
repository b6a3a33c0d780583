//! Linear-scan register allocation (§4.8). Builds one `LiveRange` per
//! register-needing `Value`, numbers program points by walking blocks in
//! RPO, then runs the classic unhandled/active/inactive/handled scan:
//! intervals are processed start-point order, `allocate_free_reg` picks the
//! class register free for longest, and an interval that can't be
//! satisfied is spilled whole and the round restarted — split-vs-whole
//! spill (§9) stays a `split_intersecting` stub, same as upstream allocators
//! that ship the simple path first.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};

use super::regmask::{PhysReg, RegClass, CLASS_STK, STACK_BASE};
use super::vreg::{LiveRange, VReg};
use crate::cfg::{self, CfgInfo};
use crate::config::PipelineConfig;
use crate::error::CoreError;
use crate::ir::verify;
use crate::ir::{Block, Context, Dt, Function, Instruction, Value};
use crate::stats::CompileStats;
use crate::target::Target;

pub(crate) struct LsraResult {
    pub(crate) assignment: HashMap<Value, PhysReg>,
    pub(crate) spilled: HashSet<Value>,
    /// Stack slot handed to each value still in `spilled` once the
    /// spill/restart loop converges. Always `CLASS_STK`, numbered from
    /// `STACK_BASE`.
    pub(crate) stack_slots: HashMap<Value, (RegClass, PhysReg)>,
}

struct ProgramPoints {
    point_of: HashMap<Value, u32>,
    block_range: HashMap<Block, (u32, u32)>,
    order: Vec<Block>,
}

fn number_points(context: &Context, function: Function, cfg: &CfgInfo) -> ProgramPoints {
    let mut point_of = HashMap::new();
    let mut block_range = HashMap::new();
    let mut next = 0u32;
    for &block in &cfg.rpo {
        let start = next;
        for val in block.instruction_iter(context) {
            point_of.insert(val, next);
            next += 1;
        }
        let end = next.saturating_sub(1).max(start);
        block_range.insert(block, (start, end));
    }
    ProgramPoints {
        point_of,
        block_range,
        order: cfg.rpo.clone(),
    }
}

/// Needs-a-register test: control, memory, tuple and void-typed values never
/// occupy a machine register.
fn needs_reg(context: &Context, val: Value) -> bool {
    match val.get_type(context) {
        Some(Dt::Control) | Some(Dt::Memory) | Some(Dt::Tuple) | Some(Dt::Void) | None => false,
        _ => true,
    }
}

fn block_gen_kill(
    context: &Context,
    block: Block,
) -> (HashSet<Value>, HashSet<Value>, HashMap<Block, HashSet<Value>>) {
    let mut gen = HashSet::new();
    let mut kill = HashSet::new();
    let mut phi_uses_by_pred: HashMap<Block, HashSet<Value>> = HashMap::new();
    for val in block.instruction_iter(context) {
        if let Some(Instruction::Phi(alts)) = val.as_instruction(context) {
            for &(pred, operand) in alts {
                if needs_reg(context, operand) {
                    phi_uses_by_pred.entry(pred).or_default().insert(operand);
                }
            }
        } else {
            for operand in val.operands(context) {
                if needs_reg(context, operand) && !kill.contains(&operand) {
                    gen.insert(operand);
                }
            }
        }
        if needs_reg(context, val) {
            kill.insert(val);
        }
    }
    (gen, kill, phi_uses_by_pred)
}

/// Backward fixpoint over the CFG to get live_in/live_out per block,
/// attributing a phi's operand use to the end of the supplying predecessor
/// rather than the phi's own block.
fn compute_liveness(
    context: &Context,
    function: Function,
    cfg: &CfgInfo,
) -> (HashMap<Block, HashSet<Value>>, HashMap<Block, HashSet<Value>>) {
    let mut gen = HashMap::new();
    let mut kill = HashMap::new();
    let mut phi_uses: HashMap<Block, HashSet<Value>> = HashMap::new();
    for block in function.block_iter(context) {
        let (g, k, pu) = block_gen_kill(context, block);
        gen.insert(block, g);
        kill.insert(block, k);
        for (pred, vals) in pu {
            phi_uses.entry(pred).or_default().extend(vals);
        }
    }

    let mut live_in: HashMap<Block, HashSet<Value>> = HashMap::new();
    let mut live_out: HashMap<Block, HashSet<Value>> = HashMap::new();
    for block in function.block_iter(context) {
        live_in.insert(block, HashSet::new());
        live_out.insert(block, HashSet::new());
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &block in cfg.rpo.iter().rev() {
            let mut out = HashSet::new();
            for succ in block.successors(context) {
                out.extend(live_in[&succ].iter().copied());
            }
            if let Some(extra) = phi_uses.get(&block) {
                out.extend(extra.iter().copied());
            }
            let mut new_in = out.difference(&kill[&block]).copied().collect::<HashSet<_>>();
            new_in.extend(gen[&block].iter().copied());

            if new_in != live_in[&block] {
                live_in.insert(block, new_in);
                changed = true;
            }
            if out != live_out[&block] {
                live_out.insert(block, out);
                changed = true;
            }
        }
    }

    (live_in, live_out)
}

fn ensure(
    val: Value,
    context: &Context,
    target: &dyn Target,
    ranges: &mut HashMap<Value, LiveRange>,
    next_vreg: &mut u32,
) {
    if !ranges.contains_key(&val) {
        let mask = target.constraint(context, val);
        let vreg = VReg(*next_vreg);
        *next_vreg += 1;
        ranges.insert(
            val,
            LiveRange {
                vreg,
                value: val,
                mask,
                start: u32::MAX,
                end: 0,
                use_positions: Vec::new(),
                assigned: None,
                spilled: false,
                hint: None,
                scratch: false,
            },
        );
    }
}

/// Builds one `LiveRange` per register-needing value, plus one synthetic
/// `scratch` range per clobbered temporary `Target::tmp_count` and
/// `Target::clobbers_flags` report for that value's defining instruction, and
/// records `Target::node_2addr`'s two-address preference as `hint`. The
/// scratch ranges are backed by freshly minted `MachCopy` placeholders that
/// are never spliced into any block — they exist purely so the allocator has
/// a `Value` to key their `LiveRange` on.
fn build_ranges(
    context: &mut Context,
    function: Function,
    target: &dyn Target,
    points: &ProgramPoints,
    live_in: &HashMap<Block, HashSet<Value>>,
    live_out: &HashMap<Block, HashSet<Value>>,
) -> Vec<LiveRange> {
    let mut ranges: HashMap<Value, LiveRange> = HashMap::new();
    let mut next_vreg = 0u32;
    let mut scratch_needs: Vec<(Value, u32, u32)> = Vec::new();

    for &block in &points.order {
        let (start, end) = points.block_range[&block];
        for &val in live_in.get(&block).into_iter().flatten() {
            ensure(val, context, target, &mut ranges, &mut next_vreg);
            ranges.get_mut(&val).unwrap().extend_to(start);
        }
        for &val in live_out.get(&block).into_iter().flatten() {
            ensure(val, context, target, &mut ranges, &mut next_vreg);
            ranges.get_mut(&val).unwrap().extend_to(end);
        }
        for val in block.instruction_iter(context) {
            let def_point = points.point_of[&val];
            if needs_reg(context, val) {
                ensure(val, context, target, &mut ranges, &mut next_vreg);
                let r = ranges.get_mut(&val).unwrap();
                r.extend_to(def_point);

                if target.node_2addr(context, val) {
                    if let Some(first) = val.operands(context).get(0).copied() {
                        if needs_reg(context, first) {
                            r.hint = Some(first);
                        }
                    }
                }

                let extra = target.tmp_count(context, val) + u32::from(target.clobbers_flags(context, val));
                if extra > 0 {
                    scratch_needs.push((val, def_point, extra));
                }
            }
            if let Some(Instruction::Phi(_)) = val.as_instruction(context) {
                continue;
            }
            for operand in val.operands(context) {
                if needs_reg(context, operand) {
                    ensure(operand, context, target, &mut ranges, &mut next_vreg);
                    let r = ranges.get_mut(&operand).unwrap();
                    r.extend_to(def_point);
                    r.record_use(def_point);
                }
            }
        }
    }

    for (def_val, def_point, count) in scratch_needs {
        let mask = target.constraint(context, def_val);
        for _ in 0..count {
            let scratch_val = context.new_node(Instruction::MachCopy(def_val));
            let vreg = VReg(next_vreg);
            next_vreg += 1;
            ranges.insert(
                scratch_val,
                LiveRange {
                    vreg,
                    value: scratch_val,
                    mask,
                    start: def_point,
                    end: def_point,
                    use_positions: Vec::new(),
                    assigned: None,
                    spilled: false,
                    hint: None,
                    scratch: true,
                },
            );
        }
    }

    let mut out: Vec<LiveRange> = ranges.into_values().collect();
    out.sort_by_key(|r| r.start);
    out
}

struct State {
    ranges: Vec<LiveRange>,
    unhandled: Vec<usize>,
    active: Vec<usize>,
    inactive: Vec<usize>,
    handled: Vec<usize>,
    by_value: HashMap<Value, usize>,
}

impl State {
    fn new(ranges: Vec<LiveRange>) -> Self {
        let mut unhandled: Vec<usize> = (0..ranges.len()).collect();
        unhandled.sort_by_key(|&i| std::cmp::Reverse(ranges[i].start));
        let by_value = ranges.iter().enumerate().map(|(i, r)| (r.value, i)).collect();
        State {
            ranges,
            unhandled,
            active: Vec::new(),
            inactive: Vec::new(),
            handled: Vec::new(),
            by_value,
        }
    }

    fn next_unhandled(&mut self) -> Option<usize> {
        self.unhandled.pop()
    }
}

fn update_state(state: &mut State, cur: usize) {
    let start = state.ranges[cur].start;
    let mut next_active = Vec::new();
    let mut next_inactive = Vec::new();

    for &i in &state.active {
        if state.ranges[i].end < start {
            state.handled.push(i);
        } else if state.ranges[i].covers(start) {
            next_active.push(i);
        } else {
            next_inactive.push(i);
        }
    }
    for &i in &state.inactive {
        if state.ranges[i].end < start {
            state.handled.push(i);
        } else if state.ranges[i].covers(start) {
            next_active.push(i);
        } else {
            next_inactive.push(i);
        }
    }
    state.active = next_active;
    state.inactive = next_inactive;
}

/// §4.8 `allocate_free_reg`: for every physical register in the current
/// range's class, find the earliest point at which an active or
/// intersecting-inactive range occupies it, then take the register free for
/// longest. Fixed (`may_spill = false`) ranges must get their single bit or
/// the allocation fails outright for this round.
fn allocate_free_reg(state: &mut State, cur: usize) -> Option<PhysReg> {
    let mask = state.ranges[cur].mask;
    let mut free_until: HashMap<PhysReg, u32> = mask.iter().map(|r| (r, u32::MAX)).collect();

    for &i in &state.active {
        if let Some(reg) = state.ranges[i].assigned {
            if free_until.contains_key(&reg) {
                free_until.insert(reg, 0);
            }
        }
    }
    for &i in &state.inactive {
        if let Some(reg) = state.ranges[i].assigned {
            if free_until.contains_key(&reg) && state.ranges[i].intersects(&state.ranges[cur]) {
                let at = free_until[&reg].min(state.ranges[i].start);
                free_until.insert(reg, at);
            }
        }
    }

    if !mask.may_spill {
        let reg = mask.iter().next()?;
        return if free_until.get(&reg).copied().unwrap_or(0) > state.ranges[cur].start {
            Some(reg)
        } else {
            None
        };
    }

    // Two-address hint: if the preferred operand already holds a register
    // that's free for this whole range, reuse it instead of whatever
    // `max_by_key` would otherwise pick. Only taken when it would have been
    // a legal choice anyway, so it can never turn a satisfiable allocation
    // into a failed one.
    if let Some(hint_val) = state.ranges[cur].hint {
        if let Some(&hi) = state.by_value.get(&hint_val) {
            if let Some(reg) = state.ranges[hi].assigned {
                if mask.contains(reg) && free_until.get(&reg).copied().unwrap_or(0) > state.ranges[cur].start {
                    return Some(reg);
                }
            }
        }
    }

    free_until
        .into_iter()
        .filter(|&(_, until)| until > state.ranges[cur].start)
        .max_by_key(|&(_, until)| until)
        .map(|(reg, _)| reg)
}

pub(crate) fn allocate(
    context: &mut Context,
    function: Function,
    target: &dyn Target,
    config: &PipelineConfig,
    stats: &mut CompileStats,
) -> Result<LsraResult, CoreError> {
    let cfg = cfg::compute_rpo(context, function);
    let points = number_points(context, function, &cfg);
    let (live_in, live_out) = compute_liveness(context, function, &cfg);

    let mut spilled_values: HashSet<Value> = HashSet::new();
    let mut round = 0u32;

    loop {
        round += 1;
        stats.lsra_rounds = round;
        let ranges = build_ranges(context, function, target, &points, &live_in, &live_out);
        let mut state = State::new(ranges);
        let mut newly_spilled: Vec<usize> = Vec::new();

        while let Some(cur) = state.next_unhandled() {
            if spilled_values.contains(&state.ranges[cur].value) {
                state.ranges[cur].spilled = true;
                state.handled.push(cur);
                continue;
            }
            update_state(&mut state, cur);
            match allocate_free_reg(&mut state, cur) {
                Some(reg) => {
                    state.ranges[cur].assigned = Some(reg);
                    state.active.push(cur);
                    trace!(target: "tb_core::lsra", "vreg {:?} <- {:?}", state.ranges[cur].vreg, reg);
                }
                None => {
                    newly_spilled.push(cur);
                }
            }
        }

        if newly_spilled.is_empty() {
            let mut assignment = HashMap::new();
            for r in &state.ranges {
                if let (Some(reg), false) = (r.assigned, r.scratch) {
                    assignment.insert(r.value, reg);
                }
            }
            if config.verify_between_passes {
                verify::verify(context, function, Some(&state.ranges))?;
            }
            let stack_slots = legalize_spills(context, function, &spilled_values);
            debug!(target: "tb_core::lsra", "converged after {} round(s), {} spilled", round, spilled_values.len());
            return Ok(LsraResult {
                assignment,
                spilled: spilled_values,
                stack_slots,
            });
        }

        for &i in &newly_spilled {
            if !state.ranges[i].mask.may_spill {
                return Err(CoreError::RegisterAllocationFailed {
                    function: function.get_name(context).to_owned(),
                    vreg: format!("{:?}", state.ranges[i].vreg),
                    detail: "fixed (non-spillable) constraint could not be satisfied".into(),
                });
            }
            spilled_values.insert(state.ranges[i].value);
            stats.lsra_spills += 1;
        }

        if round >= config.max_lsra_rounds {
            return Err(CoreError::RegisterAllocationFailed {
                function: function.get_name(context).to_owned(),
                vreg: format!("{} range(s)", newly_spilled.len()),
                detail: format!("did not converge within {} spill/restart rounds", config.max_lsra_rounds),
            });
        }
        warn!(target: "tb_core::lsra", "round {} spilled {} range(s), restarting", round, newly_spilled.len());
    }
}

/// §9 whole-lifetime spill legalization: every value still in `spilled` once
/// the round loop converges gets a stack slot in `CLASS_STK`'s numbering,
/// and each of its ordinary (non-phi) uses is rewritten to read a `MachCopy`
/// reload spliced in immediately before that use rather than the original
/// definition directly. Phi operands are left untouched — legalizing a
/// spilled value flowing into a phi would need the reload inserted at the
/// end of the supplying predecessor rather than before the phi itself, which
/// this allocator doesn't attempt, the same simplification
/// `split_intersecting` documents for the rest of interval splitting.
fn legalize_spills(
    context: &mut Context,
    function: Function,
    spilled: &HashSet<Value>,
) -> HashMap<Value, (RegClass, PhysReg)> {
    let mut stack_slots = HashMap::new();
    for (i, &val) in spilled.iter().enumerate() {
        stack_slots.insert(val, (CLASS_STK, PhysReg(STACK_BASE.wrapping_add(i as u8))));
    }
    if spilled.is_empty() {
        return stack_slots;
    }

    let mut loc: HashMap<Value, (Block, usize)> = HashMap::new();
    for block in function.block_iter(context) {
        for (i, val) in block.instruction_iter(context).enumerate() {
            loc.insert(val, (block, i));
        }
    }

    // (insert index, spilled value, user to rewire), grouped by block and
    // collected before any splice so every index refers to the pre-insertion
    // layout.
    let mut by_block: HashMap<Block, Vec<(usize, Value, Value)>> = HashMap::new();
    for &val in spilled {
        let mut seen_users = HashSet::new();
        for (user, _) in val.users(context) {
            if !seen_users.insert(user) {
                continue;
            }
            if matches!(user.as_instruction(context), Some(Instruction::Phi(_))) {
                continue;
            }
            if let Some(&(block, idx)) = loc.get(&user) {
                by_block.entry(block).or_default().push((idx, val, user));
            }
        }
    }

    for (block, mut reqs) in by_block {
        // Splice back-to-front so an earlier insertion never shifts a
        // later one's recorded index.
        reqs.sort_by_key(|&(at, ..)| std::cmp::Reverse(at));
        for (at, val, user) in reqs {
            let reload = context.new_node(Instruction::MachCopy(val));
            context.blocks[block.0].instructions.insert(at, reload);
            context.replace_operand(user, val, reload);
        }
    }

    stack_slots
}

/// Splits an interval at a program point so the piece before the split can
/// keep its register while the tail is retried separately. Not implemented:
/// this crate always takes the whole-lifetime spill path (§9); a future
/// target with tight register pressure would need this to avoid spilling an
/// entire long-lived range over one contested region.
#[allow(dead_code)]
fn split_intersecting(_state: &mut State, _cur: usize, _at: u32) -> bool {
    false
}

pub(crate) fn rename_to_vregs(ranges: &[LiveRange]) -> HashMap<Value, VReg> {
    ranges.iter().map(|r| (r.value, r.vreg)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOpKind, Constant, Module};
    use crate::regalloc::{RegMask, CLASS_INT};

    struct FixedWidthTarget {
        num_regs: u32,
    }

    impl Target for FixedWidthTarget {
        fn constraint(&self, _context: &Context, _value: Value) -> RegMask {
            RegMask::any(CLASS_INT, self.num_regs)
        }
        fn node_2addr(&self, _context: &Context, _value: Value) -> bool {
            false
        }
        fn tmp_count(&self, _context: &Context, _value: Value) -> u32 {
            0
        }
        fn clobbers_flags(&self, _context: &Context, _value: Value) -> bool {
            false
        }
        fn extra_bytes(&self, _context: &Context, _value: Value) -> u32 {
            4
        }
        fn can_gvn(&self, _context: &Context, _value: Value) -> bool {
            true
        }
        fn emit(&self, _context: &Context, _function: Function, _value: Value, _out: &mut Vec<u8>) -> Result<(), CoreError> {
            Ok(())
        }
    }

    /// Builds `v1 = x + 1; v2 = y + 1; v3 = v1 + v2; ret v3` so `v1` and `v2`
    /// are simultaneously live across the definition of `v3`.
    fn two_overlapping_ranges(context: &mut Context) -> Function {
        let module = Module::new(context, "m");
        let func = Function::new(context, module, "f".into(), vec![("x".into(), Dt::Int(32)), ("y".into(), Dt::Int(32))], Dt::Int(32), true);
        let x = func.get_arg(context, "x").unwrap();
        let y = func.get_arg(context, "y").unwrap();
        let entry = func.get_entry_block(context);
        let one = Value::new_constant(context, Constant::new_iconst(Dt::Int(32), 1));
        let v1 = entry.ins(context).bin_op(BinOpKind::Add, x, one);
        let v2 = entry.ins(context).bin_op(BinOpKind::Add, y, one);
        let v3 = entry.ins(context).bin_op(BinOpKind::Add, v1, v2);
        entry.ins(context).ret(Some(v3));
        func
    }

    #[test]
    fn two_overlapping_values_get_distinct_registers() {
        let mut context = Context::new();
        let func = two_overlapping_ranges(&mut context);
        let target = FixedWidthTarget { num_regs: 8 };
        let config = PipelineConfig::default();
        let mut stats = CompileStats::default();

        let result = allocate(&mut context, func, &target, &config, &mut stats).expect("allocation should succeed");
        assert!(result.spilled.is_empty());
        let regs: HashSet<PhysReg> = result.assignment.values().copied().collect();
        assert!(regs.len() >= 2, "expected at least two distinct registers, got {:?}", regs);
    }

    #[test]
    fn insufficient_registers_spill_instead_of_failing() {
        let mut context = Context::new();
        let func = two_overlapping_ranges(&mut context);
        let target = FixedWidthTarget { num_regs: 1 };
        let config = PipelineConfig::default();
        let mut stats = CompileStats::default();

        let result = allocate(&mut context, func, &target, &config, &mut stats).expect("spilling should let allocation converge");
        assert!(!result.spilled.is_empty());
        assert!(stats.lsra_spills >= 1);
    }

    #[test]
    fn fixed_constraint_that_can_never_be_freed_fails() {
        struct AlwaysFixedTarget;
        impl Target for AlwaysFixedTarget {
            fn constraint(&self, _context: &Context, _value: Value) -> RegMask {
                RegMask::fixed(CLASS_INT, PhysReg(0))
            }
            fn node_2addr(&self, _context: &Context, _value: Value) -> bool {
                false
            }
            fn tmp_count(&self, _context: &Context, _value: Value) -> u32 {
                0
            }
            fn clobbers_flags(&self, _context: &Context, _value: Value) -> bool {
                false
            }
            fn extra_bytes(&self, _context: &Context, _value: Value) -> u32 {
                4
            }
            fn can_gvn(&self, _context: &Context, _value: Value) -> bool {
                true
            }
            fn emit(&self, _context: &Context, _function: Function, _value: Value, _out: &mut Vec<u8>) -> Result<(), CoreError> {
                Ok(())
            }
        }

        let mut context = Context::new();
        let func = two_overlapping_ranges(&mut context);
        let config = PipelineConfig::default();
        let mut stats = CompileStats::default();

        let result = allocate(&mut context, func, &AlwaysFixedTarget, &config, &mut stats);
        assert!(matches!(result, Err(CoreError::RegisterAllocationFailed { .. })));
    }

    /// A target where every op is two-address, clobbers one scratch register
    /// and clobbers flags: exercises `node_2addr`/`tmp_count`/
    /// `clobbers_flags` wiring end to end rather than via the always-trivial
    /// mocks above.
    struct TwoAddrTarget {
        num_regs: u32,
    }

    impl Target for TwoAddrTarget {
        fn constraint(&self, _context: &Context, _value: Value) -> RegMask {
            RegMask::any(CLASS_INT, self.num_regs)
        }
        fn node_2addr(&self, _context: &Context, value: Value) -> bool {
            matches!(value.as_instruction(_context), Some(Instruction::BinOp { .. }))
        }
        fn tmp_count(&self, _context: &Context, _value: Value) -> u32 {
            1
        }
        fn clobbers_flags(&self, _context: &Context, _value: Value) -> bool {
            true
        }
        fn extra_bytes(&self, _context: &Context, _value: Value) -> u32 {
            4
        }
        fn can_gvn(&self, _context: &Context, _value: Value) -> bool {
            true
        }
        fn emit(&self, _context: &Context, _function: Function, _value: Value, _out: &mut Vec<u8>) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[test]
    fn two_addr_hint_and_scratch_reservation_still_allocate() {
        let mut context = Context::new();
        let func = two_overlapping_ranges(&mut context);
        let target = TwoAddrTarget { num_regs: 8 };
        let config = PipelineConfig::default();
        let mut stats = CompileStats::default();

        let result = allocate(&mut context, func, &target, &config, &mut stats).expect("allocation should succeed");
        assert!(result.spilled.is_empty());
        // Scratch ranges reserve registers but never surface as assignment keys.
        assert!(result.assignment.keys().all(|&v| !v.is_dead(&context)));
    }

    #[test]
    fn spilled_values_get_stack_slots_and_reload_copies() {
        let mut context = Context::new();
        let func = two_overlapping_ranges(&mut context);
        let target = FixedWidthTarget { num_regs: 1 };
        let config = PipelineConfig::default();
        let mut stats = CompileStats::default();

        let result = allocate(&mut context, func, &target, &config, &mut stats).expect("spilling should let allocation converge");
        for spilled in &result.spilled {
            assert!(result.stack_slots.contains_key(spilled));
        }
        let entry = func.get_entry_block(&context);
        let reload_count = entry
            .instruction_iter(&context)
            .filter(|v| matches!(v.as_instruction(&context), Some(Instruction::MachCopy(_))))
            .count();
        assert!(reload_count >= 1, "expected at least one reload copy spliced in for a spilled value");
    }
}
