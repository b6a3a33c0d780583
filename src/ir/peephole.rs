//! The local rewriter: idealize → pessimistic value → identity → GVN, driven
//! by a worklist. Runs to a local fixpoint; SCCP and the peephole engine are
//! expected to alternate (a caller drives that loop, see `lib::run_pipeline`).

use tracing::{debug, trace};

use super::*;
use crate::error::CoreError;
use crate::lattice::{eval_binop, eval_cmp, eval_shift, operand_lattice, Lattice, LatticeId, LatticeTable};
use crate::worklist::Worklist;

/// Shape-sensitive opcodes: when one of their inputs changes identity, their
/// *users* may now match a pattern that didn't apply before (e.g. folding
/// `(a + 0) * b` needs the `MUL` re-examined once the `ADD` simplifies to
/// `a`), so users of these get re-queued transitively rather than just the
/// immediate one.
fn is_shape_sensitive(ins: &Instruction) -> bool {
    matches!(
        ins,
        Instruction::Proj { .. }
            | Instruction::Cmp { .. }
            | Instruction::Shift { .. }
            | Instruction::BinOp {
                op: BinOpKind::Mul,
                ..
            }
            | Instruction::Store { .. }
            | Instruction::Phi(_)
    )
}

pub(crate) struct PeepholeEngine<'a> {
    context: &'a mut Context,
    lattice: &'a mut LatticeTable,
    worklist: Worklist,
    pub(crate) rewrites: u64,
    pub(crate) gvn_hits: u64,
}

impl<'a> PeepholeEngine<'a> {
    pub(crate) fn new(context: &'a mut Context, lattice: &'a mut LatticeTable) -> Self {
        PeepholeEngine {
            context,
            lattice,
            worklist: Worklist::new(),
            rewrites: 0,
            gvn_hits: 0,
        }
    }

    pub(crate) fn run(&mut self, function: Function) -> Result<(), CoreError> {
        for (_, val) in function.instruction_iter(self.context).collect::<Vec<_>>() {
            self.worklist.push(val);
        }
        while let Some(val) = self.worklist.pop() {
            if val.is_dead(self.context) {
                continue;
            }
            self.visit(val)?;
        }
        Ok(())
    }

    fn requeue_users(&mut self, val: Value) {
        for (user, _) in val.users(self.context) {
            if user.is_dead(self.context) {
                continue;
            }
            self.worklist.push(user);
            if let Some(ins) = user.as_instruction(self.context) {
                if is_shape_sensitive(ins) {
                    for (grand_user, _) in user.users(self.context) {
                        self.worklist.push(grand_user);
                    }
                }
            }
        }
    }

    fn commit(&mut self, old: Value, new: Value) {
        trace!(target: "tb_core::peephole", "subsuming {:?} -> {:?}", old, new);
        self.requeue_users(old);
        self.context.subsume(old, new);
        self.rewrites += 1;
        debug!(target: "tb_core::peephole", "rewrote node (now {} total)", self.rewrites);
    }

    fn visit(&mut self, val: Value) -> Result<(), CoreError> {
        if let Some(new) = self.idealize(val) {
            if new != val {
                self.commit(val, new);
                return Ok(());
            }
        }
        self.pessimistic_value(val)?;
        if let Some(new) = self.identity(val) {
            if new != val {
                self.commit(val, new);
                return Ok(());
            }
        }
        if val
            .as_instruction(self.context)
            .map(Instruction::is_gvn_eligible)
            .unwrap_or(false)
        {
            let canon = self.context.gvn_intern(val);
            if canon != val {
                self.gvn_hits += 1;
                self.commit(val, canon);
            }
        }
        Ok(())
    }

    /// Opcode-specific rewrite to a different node shape. Only a handful of
    /// algebraic simplifications are implemented; anything not recognized
    /// returns `None` (no progress), which is always sound.
    fn idealize(&mut self, val: Value) -> Option<Value> {
        let ins = val.as_instruction(self.context)?.clone();
        match ins {
            Instruction::BinOp {
                op: BinOpKind::Add,
                lhs,
                rhs,
            } => {
                // Canonicalize constant to the right-hand side so identity
                // folds (`x + 0`) only need to check one shape.
                if lhs.is_constant(self.context) && !rhs.is_constant(self.context) {
                    let new = self.context.new_node(Instruction::BinOp {
                        op: BinOpKind::Add,
                        lhs: rhs,
                        rhs: lhs,
                    });
                    return Some(new);
                }
                None
            }
            _ => None,
        }
    }

    /// Folds a node to an already-existing equivalent value without
    /// introducing a new node — the classic `x + 0 -> x`, `x * 1 -> x`,
    /// `x & x -> x` family.
    fn identity(&mut self, val: Value) -> Option<Value> {
        let ins = val.as_instruction(self.context)?.clone();
        match ins {
            Instruction::BinOp {
                op: BinOpKind::Add,
                lhs,
                rhs,
            } if Self::is_zero(self.context, rhs) => Some(lhs),
            Instruction::BinOp {
                op: BinOpKind::Sub,
                lhs,
                rhs,
            } if Self::is_zero(self.context, rhs) => Some(lhs),
            Instruction::BinOp {
                op: BinOpKind::Mul,
                lhs,
                rhs,
            } if Self::is_one(self.context, rhs) => Some(lhs),
            Instruction::BinOp {
                op: BinOpKind::Or,
                lhs,
                rhs,
            }
            | Instruction::BinOp {
                op: BinOpKind::And,
                lhs,
                rhs,
            } if lhs == rhs => Some(lhs),
            Instruction::BinOp {
                op: BinOpKind::Xor,
                lhs,
                rhs,
            } if lhs == rhs => Some(Value::new_constant(
                self.context,
                Constant::new_iconst(ins.get_type(self.context), 0),
            )),
            _ => None,
        }
    }

    fn is_zero(context: &Context, val: Value) -> bool {
        matches!(
            context_const(context, val),
            Some(Constant::Iconst { value: 0, .. })
        )
    }

    fn is_one(context: &Context, val: Value) -> bool {
        matches!(
            context_const(context, val),
            Some(Constant::Iconst { value: 1, .. })
        )
    }

    /// Computes a monotone upper bound on `val`'s lattice value from its
    /// current inputs. Must never regress below the value previously
    /// recorded; a regression is a forward-progress violation (§8.3).
    fn pessimistic_value(&mut self, val: Value) -> Result<(), CoreError> {
        let new_val = self.transfer(val);
        let Some(new_val) = new_val else {
            return Ok(());
        };
        if let Some(old) = self.context.lattice_of(val) {
            let merged = self.lattice.meet(old, new_val);
            if merged != old && !matches!(self.lattice.get(old), Lattice::Top) {
                // old wasn't TOP and the value moved: only acceptable if it
                // moved *down* (merged == new_val, i.e. meet(old,new)==new).
                if merged != new_val {
                    return Err(CoreError::invariant(
                        "peephole::pessimistic_value",
                        "lattice value regressed upward",
                    ));
                }
            }
        }
        self.context.set_lattice(val, new_val);
        if self.lattice.is_constant(new_val) {
            self.materialize_constant(val, new_val);
        }
        Ok(())
    }

    fn transfer(&mut self, val: Value) -> Option<LatticeId> {
        let ins = val.as_instruction(self.context)?.clone();
        let dt = ins.get_type(self.context);
        match ins {
            Instruction::BinOp { op, lhs, rhs } => {
                let a = operand_lattice(self.context, self.lattice, lhs)?;
                let b = operand_lattice(self.context, self.lattice, rhs)?;
                let (av, bv) = (self.lattice.get(a).clone(), self.lattice.get(b).clone());
                eval_binop(self.lattice, op, dt, &av, &bv)
            }
            Instruction::Cmp { op, lhs, rhs } => {
                let a = operand_lattice(self.context, self.lattice, lhs)?;
                let b = operand_lattice(self.context, self.lattice, rhs)?;
                let (av, bv) = (self.lattice.get(a).clone(), self.lattice.get(b).clone());
                eval_cmp(self.lattice, op, &av, &bv)
            }
            Instruction::Shift { op, lhs, rhs } => {
                let a = operand_lattice(self.context, self.lattice, lhs)?;
                let b = operand_lattice(self.context, self.lattice, rhs)?;
                let (av, bv) = (self.lattice.get(a).clone(), self.lattice.get(b).clone());
                eval_shift(self.lattice, op, dt, &av, &bv)
            }
            _ => None,
        }
    }

    fn materialize_constant(&mut self, val: Value, lattice_id: LatticeId) {
        let dt = val
            .as_instruction(self.context)
            .map(|i| i.get_type(self.context))
            .unwrap_or(Dt::Void);
        if let Lattice::Int { min, .. } = self.lattice.get(lattice_id).clone() {
            let c = Value::new_constant(self.context, Constant::new_iconst(dt, min as u64));
            if c != val {
                self.worklist.push(c);
                self.commit(val, c);
            }
        }
    }
}

fn context_const(context: &Context, val: Value) -> Option<Constant> {
    match &context.values[val.0].content {
        ValueContent::Constant(c) => Some(*c),
        _ => None,
    }
}
