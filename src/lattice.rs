//! Interned abstract values used by the SCCP engine and by the peephole
//! engine's pessimistic-value step. Every `Lattice` is hashed into a table
//! once; after that, comparing two elements for equality is a pointer (id)
//! comparison, which keeps `meet`/`join` cheap in the fixpoint's hot loop.

use rustc_hash::FxHashMap;

use crate::ir::{BinOpKind, CmpKind, Constant, Context, Dt, ShiftKind, Value, ValueContent};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub(crate) struct LatticeId(u32);

/// How many times an integer range may be refined before the SCCP engine
/// gives up chasing a tighter bound and jumps straight to the datatype's
/// full range. Without this, a monotonically-growing range (e.g. a loop
/// induction variable) would never reach a fixpoint.
pub(crate) const WIDEN_LIMIT: u8 = 2;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Lattice {
    /// Unseen / unreachable. The optimistic starting point for every node.
    Top,
    /// The full range of the node's datatype; nothing more is known.
    Bot,
    /// Control reachable.
    Ctrl,
    Int {
        dt: Dt,
        min: i64,
        max: i64,
        known_zeros: u64,
        known_ones: u64,
        widen_count: u8,
    },
    F32Con(u32),
    F64Con(u64),
    /// Pointer value lattice: unknown-but-nonnull, known-null, or a concrete
    /// constant address.
    AnyPtr,
    NullPtr,
    PtrCon(u64),
    Tuple(Vec<LatticeId>),
    /// `true` = ALLMEM (every alias class may have been written),
    /// `false` = ANYMEM (no writes observed yet, optimistic starting point).
    Mem(bool),
}

pub(crate) struct LatticeTable {
    table: FxHashMap<Lattice, LatticeId>,
    values: Vec<Lattice>,
    top: LatticeId,
    bot: LatticeId,
    ctrl: LatticeId,
    widen_limit: u8,
    pub(crate) widenings: u64,
}

impl LatticeTable {
    pub(crate) fn new() -> Self {
        Self::with_widen_limit(WIDEN_LIMIT)
    }

    /// Builds a table whose widen threshold comes from `PipelineConfig::widen_limit`
    /// rather than the module default; `run_pipeline` constructs its table this way.
    pub(crate) fn with_widen_limit(widen_limit: u8) -> Self {
        let mut t = LatticeTable {
            table: FxHashMap::default(),
            values: Vec::new(),
            top: LatticeId(0),
            bot: LatticeId(0),
            ctrl: LatticeId(0),
            widen_limit,
            widenings: 0,
        };
        t.top = t.intern(Lattice::Top);
        t.bot = t.intern(Lattice::Bot);
        t.ctrl = t.intern(Lattice::Ctrl);
        t
    }

    pub(crate) fn top(&self) -> LatticeId {
        self.top
    }

    pub(crate) fn bot(&self) -> LatticeId {
        self.bot
    }

    pub(crate) fn ctrl(&self) -> LatticeId {
        self.ctrl
    }

    pub(crate) fn intern(&mut self, value: Lattice) -> LatticeId {
        if let Some(&id) = self.table.get(&value) {
            return id;
        }
        let id = LatticeId(self.values.len() as u32);
        self.values.push(value.clone());
        self.table.insert(value, id);
        id
    }

    pub(crate) fn get(&self, id: LatticeId) -> &Lattice {
        &self.values[id.0 as usize]
    }

    pub(crate) fn int_const(&mut self, dt: Dt, value: i64) -> LatticeId {
        self.intern(Lattice::Int {
            dt,
            min: value,
            max: value,
            known_zeros: !(value as u64),
            known_ones: value as u64,
            widen_count: 0,
        })
    }

    pub(crate) fn int_range(&mut self, dt: Dt, min: i64, max: i64) -> LatticeId {
        self.intern(Lattice::Int {
            dt,
            min,
            max,
            known_zeros: 0,
            known_ones: 0,
            widen_count: 0,
        })
    }

    /// Moves two elements *down* toward BOT: the standard SCCP join-at-use
    /// operator. `meet(TOP, x) = x`; `meet(x, x) = x`; anything else not
    /// representable exactly widens or falls to BOT.
    pub(crate) fn meet(&mut self, a: LatticeId, b: LatticeId) -> LatticeId {
        if a == b {
            return a;
        }
        if a == self.top {
            return b;
        }
        if b == self.top {
            return a;
        }
        if a == self.bot || b == self.bot {
            return self.bot;
        }
        match (self.get(a).clone(), self.get(b).clone()) {
            (Lattice::Ctrl, Lattice::Ctrl) => self.ctrl,
            (
                Lattice::Int {
                    dt,
                    min: amin,
                    max: amax,
                    known_zeros: az,
                    known_ones: ao,
                    widen_count: aw,
                },
                Lattice::Int {
                    min: bmin,
                    max: bmax,
                    known_zeros: bz,
                    known_ones: bo,
                    widen_count: bw,
                    ..
                },
            ) => {
                let min = amin.min(bmin);
                let max = amax.max(bmax);
                let widen_count = aw.max(bw) + 1;
                if widen_count > self.widen_limit {
                    self.widen(dt)
                } else {
                    self.intern(Lattice::Int {
                        dt,
                        min,
                        max,
                        known_zeros: az & bz,
                        known_ones: ao & bo,
                        widen_count,
                    })
                }
            }
            (Lattice::F32Con(x), Lattice::F32Con(y)) if x == y => a,
            (Lattice::F64Con(x), Lattice::F64Con(y)) if x == y => a,
            (Lattice::PtrCon(x), Lattice::PtrCon(y)) if x == y => a,
            (Lattice::Mem(x), Lattice::Mem(y)) => self.intern(Lattice::Mem(x || y)),
            (Lattice::Tuple(xs), Lattice::Tuple(ys)) if xs.len() == ys.len() => {
                let merged: Vec<LatticeId> = xs
                    .iter()
                    .zip(ys.iter())
                    .map(|(&x, &y)| self.meet(x, y))
                    .collect();
                self.intern(Lattice::Tuple(merged))
            }
            _ => self.bot,
        }
    }

    /// Moves an element *up* toward TOP. Used when a control predecessor
    /// becomes unreachable and a previously-derived value must be retracted.
    pub(crate) fn join(&mut self, a: LatticeId, b: LatticeId) -> LatticeId {
        if a == b {
            return a;
        }
        if a == self.bot {
            return b;
        }
        if b == self.bot {
            return a;
        }
        self.top
    }

    /// Jumps straight to the datatype's full range, guaranteeing the
    /// fixpoint terminates regardless of how many times a value was refined.
    pub(crate) fn widen(&mut self, dt: Dt) -> LatticeId {
        self.widenings += 1;
        match dt.bits() {
            Some(bits) if dt.is_integer() => {
                let (min, max) = if bits == 64 {
                    (i64::MIN, i64::MAX)
                } else {
                    (0, (1i64 << bits) - 1)
                };
                self.intern(Lattice::Int {
                    dt,
                    min,
                    max,
                    known_zeros: 0,
                    known_ones: 0,
                    widen_count: self.widen_limit + 1,
                })
            }
            _ => self.bot,
        }
    }

    pub(crate) fn is_constant(&self, id: LatticeId) -> bool {
        match self.get(id) {
            Lattice::Int { min, max, .. } => min == max,
            Lattice::F32Con(_) | Lattice::F64Con(_) | Lattice::PtrCon(_) | Lattice::NullPtr => {
                true
            }
            _ => false,
        }
    }
}

impl Default for LatticeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds a binary arithmetic opcode over two operand lattices, shared between
/// `peephole::transfer` (pessimistic seeding) and `sccp::evaluate` (optimistic
/// fixpoint). `Add`/`Sub` keep range-based saturating arithmetic so a partial
/// bound on either operand still narrows the result; the remaining opcodes
/// only fold when both operands have settled on an exact constant and widen
/// to the full range otherwise, which is sound even though less precise.
pub(crate) fn eval_binop(
    table: &mut LatticeTable,
    op: BinOpKind,
    dt: Dt,
    a: &Lattice,
    b: &Lattice,
) -> Option<LatticeId> {
    let (Lattice::Int { min: amin, max: amax, .. }, Lattice::Int { min: bmin, max: bmax, .. }) = (a, b) else {
        return None;
    };
    match op {
        BinOpKind::Add => Some(table.int_range(dt, amin.saturating_add(*bmin), amax.saturating_add(*bmax))),
        BinOpKind::Sub => Some(table.int_range(dt, amin.saturating_sub(*bmax), amax.saturating_sub(*bmin))),
        _ if *amin != *amax || *bmin != *bmax => Some(table.widen(dt)),
        _ => {
            let mask = dt.int_mask();
            let x = (*amin as u64) & mask;
            let y = (*bmin as u64) & mask;
            let result = match op {
                BinOpKind::Mul => x.wrapping_mul(y),
                BinOpKind::SDiv => {
                    if y == 0 {
                        return Some(table.widen(dt));
                    }
                    ((*amin).wrapping_div(*bmin)) as u64
                }
                BinOpKind::UDiv => {
                    if y == 0 {
                        return Some(table.widen(dt));
                    }
                    x.wrapping_div(y)
                }
                BinOpKind::SRem => {
                    if y == 0 {
                        return Some(table.widen(dt));
                    }
                    ((*amin).wrapping_rem(*bmin)) as u64
                }
                BinOpKind::URem => {
                    if y == 0 {
                        return Some(table.widen(dt));
                    }
                    x.wrapping_rem(y)
                }
                BinOpKind::And => x & y,
                BinOpKind::Or => x | y,
                BinOpKind::Xor => x ^ y,
                BinOpKind::Add | BinOpKind::Sub => unreachable!("handled above"),
            };
            Some(table.int_const(dt, (result & mask) as i64))
        }
    }
}

/// Folds a comparison when both operands have settled on an exact constant;
/// otherwise widens to the full `i1` range (BOT) so the optimizer keeps both
/// successors reachable rather than mis-folding a branch.
pub(crate) fn eval_cmp(table: &mut LatticeTable, op: CmpKind, a: &Lattice, b: &Lattice) -> Option<LatticeId> {
    let (Lattice::Int { min: amin, max: amax, .. }, Lattice::Int { min: bmin, max: bmax, .. }) = (a, b) else {
        return None;
    };
    if *amin != *amax || *bmin != *bmax {
        return Some(table.widen(Dt::Int(1)));
    }
    let (sa, sb) = (*amin, *bmin);
    let (ua, ub) = (*amin as u64, *bmin as u64);
    let result = match op {
        CmpKind::Eq => sa == sb,
        CmpKind::Ne => sa != sb,
        CmpKind::LtS => sa < sb,
        CmpKind::LeS => sa <= sb,
        CmpKind::GtS => sa > sb,
        CmpKind::GeS => sa >= sb,
        CmpKind::LtU => ua < ub,
        CmpKind::LeU => ua <= ub,
        CmpKind::GtU => ua > ub,
        CmpKind::GeU => ua >= ub,
    };
    Some(table.int_const(Dt::Int(1), result as i64))
}

/// Folds a shift when both operands are exact constants; the shift amount is
/// reduced modulo the operand width first since `wrapping_shl`/`wrapping_shr`
/// only wrap mod 64, not mod a narrower `Int(n)` width.
pub(crate) fn eval_shift(table: &mut LatticeTable, op: ShiftKind, dt: Dt, a: &Lattice, b: &Lattice) -> Option<LatticeId> {
    let (Lattice::Int { min: amin, max: amax, .. }, Lattice::Int { min: bmin, max: bmax, .. }) = (a, b) else {
        return None;
    };
    if *amin != *amax || *bmin != *bmax {
        return Some(table.widen(dt));
    }
    let bits = dt.bits().unwrap_or(64).max(1) as u32;
    let shift = (*bmin as u64 as u32) % bits;
    let mask = dt.int_mask();
    let result = match op {
        ShiftKind::Shl => ((*amin as u64) & mask).wrapping_shl(shift),
        ShiftKind::LShr => ((*amin as u64) & mask).wrapping_shr(shift),
        ShiftKind::AShr => (*amin).wrapping_shr(shift) as u64,
    };
    Some(table.int_const(dt, (result & mask) as i64))
}

/// Looks up `val`'s current lattice entry, synthesizing one on the fly for a
/// bare constant node (which never goes through `Context::set_lattice` since
/// it isn't an instruction `pessimistic_value`/`SccpEngine::evaluate` would
/// visit). Used anywhere a transfer function reads an operand's value.
pub(crate) fn operand_lattice(context: &Context, table: &mut LatticeTable, val: Value) -> Option<LatticeId> {
    if let Some(id) = context.lattice_of(val) {
        return Some(id);
    }
    match &context.values[val.0].content {
        ValueContent::Constant(Constant::Iconst { dt, value }) => Some(table.int_const(*dt, *value as i64)),
        ValueContent::Constant(Constant::F32const(bits)) => Some(table.intern(Lattice::F32Con(*bits))),
        ValueContent::Constant(Constant::F64const(bits)) => Some(table.intern(Lattice::F64Con(*bits))),
        ValueContent::Constant(Constant::Ptrconst(addr)) => Some(table.intern(Lattice::PtrCon(*addr))),
        _ => None,
    }
}
