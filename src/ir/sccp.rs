//! Sparse Conditional Constant Propagation: an optimistic two-pass fixpoint
//! over the lattice (§4.3). Pass 1 assumes every node is unreachable (TOP)
//! and only lowers a value when forced to by its inputs; pass 2 walks the
//! live graph once and replaces anything that settled on a concrete constant.

use tracing::{debug, info};

use super::*;
use crate::error::CoreError;
use crate::lattice::{eval_binop, eval_cmp, eval_shift, operand_lattice, Lattice, LatticeId, LatticeTable};
use crate::worklist::Worklist;

pub(crate) struct SccpEngine<'a> {
    context: &'a mut Context,
    lattice: &'a mut LatticeTable,
    /// Per-block reachability, separate from the per-node lattice array
    /// since a block can be "reached" before any of its phis have a value.
    reachable: std::collections::HashSet<Block>,
    pub(crate) materialized: u64,
}

impl<'a> SccpEngine<'a> {
    pub(crate) fn new(context: &'a mut Context, lattice: &'a mut LatticeTable) -> Self {
        SccpEngine {
            context,
            lattice,
            reachable: std::collections::HashSet::new(),
            materialized: 0,
        }
    }

    pub(crate) fn run(&mut self, function: Function) -> Result<(), CoreError> {
        self.find_constants(function);
        self.materialize(function);
        info!(target: "tb_core::sccp", "fixpoint reached for {}", function.get_name(self.context));
        Ok(())
    }

    fn find_constants(&mut self, function: Function) {
        let entry = function.get_entry_block(self.context);
        self.reachable.insert(entry);

        let mut worklist = Worklist::new();
        for arg in function.args_iter(self.context).copied().collect::<Vec<_>>() {
            let bot = self.lattice.bot();
            self.context.set_lattice(arg, bot);
            worklist.push(arg);
        }
        for (_, val) in function.instruction_iter(self.context).collect::<Vec<_>>() {
            worklist.push(val);
        }

        while let Some(val) = worklist.pop() {
            let new = self.evaluate(val);
            let Some(new) = new else { continue };
            let old = self
                .context
                .lattice_of(val)
                .unwrap_or_else(|| self.lattice.top());
            let merged = self.lattice.meet(old, new);
            if merged != old {
                self.context.set_lattice(val, merged);
                for (user, _) in val.users(self.context) {
                    worklist.push(user);
                }
            }
        }
    }

    /// Single-input nodes (most arithmetic) are evaluated directly from
    /// their operands' current lattice value; `PHI` additionally consults
    /// block reachability so a dead predecessor doesn't drag a live one's
    /// value toward BOT.
    fn evaluate(&mut self, val: Value) -> Option<LatticeId> {
        let ins = val.as_instruction(self.context)?.clone();
        let dt = ins.get_type(self.context);
        match ins {
            Instruction::Phi(alts) => {
                let mut acc = self.lattice.top();
                let mut any_live = false;
                for (from_block, operand) in alts {
                    if !self.reachable.contains(&from_block) {
                        continue;
                    }
                    any_live = true;
                    let v = operand_lattice(self.context, self.lattice, operand)
                        .unwrap_or_else(|| self.lattice.top());
                    acc = self.lattice.meet(acc, v);
                }
                if any_live {
                    Some(acc)
                } else {
                    Some(self.lattice.top())
                }
            }
            Instruction::ConditionalBranch {
                cond_value,
                true_block,
                false_block,
            } => {
                let cond = operand_lattice(self.context, self.lattice, cond_value);
                match cond.map(|c| self.lattice.get(c).clone()) {
                    Some(Lattice::Int { min, max, .. }) if min == max => {
                        if min != 0 {
                            self.reachable.insert(true_block);
                        } else {
                            self.reachable.insert(false_block);
                        }
                    }
                    _ => {
                        self.reachable.insert(true_block);
                        self.reachable.insert(false_block);
                    }
                }
                None
            }
            Instruction::Branch(to) => {
                self.reachable.insert(to);
                None
            }
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

    /// Replaces every node whose lattice value settled on a concrete
    /// constant with a fresh constant node, subsuming the original.
    fn materialize(&mut self, function: Function) {
        for (_, val) in function.instruction_iter(self.context).collect::<Vec<_>>() {
            if val.is_dead(self.context) {
                continue;
            }
            let Some(lat) = self.context.lattice_of(val) else {
                continue;
            };
            if !self.lattice.is_constant(lat) {
                continue;
            }
            if let Lattice::Int { dt, min, .. } = self.lattice.get(lat).clone() {
                let dt_is_void = matches!(dt, Dt::Void | Dt::Control | Dt::Memory | Dt::Tuple);
                if dt_is_void {
                    continue;
                }
                let c = Value::new_constant(self.context, Constant::new_iconst(dt, min as u64));
                if c != val {
                    self.context.subsume(val, c);
                    self.materialized += 1;
                    debug!(target: "tb_core::sccp", "materialized constant ({} total)", self.materialized);
                }
            }
        }
    }
}
