use generational_arena::Arena;
use rustc_hash::FxHashMap;

use super::*;
use crate::lattice::LatticeId;

/// Owns every arena-backed IR structure for a compilation unit, plus the
/// graph-core bookkeeping (GVN table, lattice array, memory-state counter)
/// shared across all functions in it. Mirrors the "one big arena of arenas"
/// shape: every `Value`/`Block`/`Function`/`Module` handle is an index into
/// one of these, so nothing here ever hands out a raw reference that would
/// pin the whole structure behind a borrow.
pub(crate) struct Context {
    pub(crate) modules: Arena<ModuleContent>,
    pub(crate) functions: Arena<FunctionContent>,
    pub(crate) blocks: Arena<BlockContent>,
    pub(crate) values: Arena<Node>,
    pub(crate) locals: Arena<LocalContent>,

    /// Canonical-node lookup for GVN-eligible opcodes, keyed by the
    /// opcode+operand identity the `Instruction` enum already encodes.
    gvn_table: FxHashMap<Instruction, Value>,

    /// Per-node abstract value, indexed by `gvn`. Grown lazily; entries for
    /// nodes that predate SCCP running are `None` (treated as TOP).
    pub(crate) lattice: Vec<Option<LatticeId>>,

    next_gvn: u32,
    /// Bumped on every `Store`; stamped onto `Load` nodes created afterward
    /// so GVN only unifies loads that see the same memory state.
    pub(crate) cur_mem_gen: u32,

    /// Running totals surfaced through `CompileStats` at the end of a
    /// pipeline run.
    pub(crate) nodes_created: u64,
    pub(crate) nodes_killed: u64,
}

impl Context {
    pub(crate) fn new() -> Context {
        Context {
            modules: Arena::new(),
            functions: Arena::new(),
            blocks: Arena::new(),
            values: Arena::new(),
            locals: Arena::new(),
            gvn_table: FxHashMap::default(),
            lattice: Vec::new(),
            next_gvn: 0,
            cur_mem_gen: 0,
            nodes_created: 0,
            nodes_killed: 0,
        }
    }

    pub(crate) fn module_iter(&self) -> ModuleIterator {
        ModuleIterator::new(self)
    }

    fn fresh_gvn(&mut self) -> u32 {
        let gvn = self.next_gvn;
        self.next_gvn += 1;
        if self.lattice.len() <= gvn as usize {
            self.lattice.resize(gvn as usize + 1, None);
        }
        gvn
    }

    /// Inserts a node with no GVN lookup (arguments, constants: identity is
    /// always fresh for an argument, and constants are deliberately folded
    /// later by the peephole/SCCP passes rather than on construction).
    pub(crate) fn insert_node(&mut self, content: ValueContent) -> Value {
        let gvn = self.fresh_gvn();
        let node = Node {
            gvn,
            content,
            users: Vec::new(),
            dead: false,
        };
        let idx = self.values.insert(node);
        let val = Value(idx);
        self.link_operands(val);
        self.nodes_created += 1;
        val
    }

    /// Creates an instruction node. Does **not** consult the GVN table —
    /// that's the peephole engine's job (§4.2); the builder always gets a
    /// fresh node so construction order is predictable.
    pub(crate) fn new_node(&mut self, instruction: Instruction) -> Value {
        self.insert_node(ValueContent::Instruction(instruction))
    }

    fn link_operands(&mut self, val: Value) {
        let operands = val.operands(self);
        for (slot, operand) in operands.into_iter().enumerate() {
            self.add_user(operand, val, slot);
        }
    }

    pub(crate) fn add_user(&mut self, operand: Value, user: Value, slot: usize) {
        self.values[operand.0].users.push((user, slot));
    }

    pub(crate) fn remove_user(&mut self, operand: Value, user: Value, slot: usize) {
        let users = &mut self.values[operand.0].users;
        if let Some(pos) = users.iter().position(|&(u, s)| u == user && s == slot) {
            users.swap_remove(pos);
        }
    }

    /// Replaces one operand of `user` with `new_val`, fixing up the user
    /// lists of both the old and new operand so the edge invariant holds
    /// afterward. The only path by which operand identity may change.
    pub(crate) fn replace_operand(&mut self, user: Value, old_val: Value, new_val: Value) {
        if old_val == new_val {
            return;
        }
        let before = user.operands(self);
        if let ValueContent::Instruction(ins) = &mut self.values[user.0].content {
            ins.replace_value(old_val, new_val);
        } else {
            return;
        }
        for (slot, operand) in before.into_iter().enumerate() {
            if operand == old_val {
                self.remove_user(old_val, user, slot);
                self.add_user(new_val, user, slot);
            }
        }
    }

    /// Transfers every user edge of `old` onto `new`, then kills `old`. The
    /// single operation the peephole engine uses to commit a rewrite.
    pub(crate) fn subsume(&mut self, old: Value, new: Value) {
        if old == new {
            return;
        }
        let users = old.users(self);
        for (user, slot) in users {
            if user == new {
                continue;
            }
            let operand_at_slot = user.operands(self).get(slot).copied();
            if operand_at_slot == Some(old) {
                self.replace_operand(user, old, new);
            }
        }
        self.kill(old);
    }

    /// Removes a dead node's outgoing edges and marks it dead. The arena slot
    /// is retained (so existing `Value` handles don't dangle into a wrong
    /// generation) but is skipped by every iterator.
    pub(crate) fn kill(&mut self, val: Value) {
        let operands = val.operands(self);
        for (slot, operand) in operands.into_iter().enumerate() {
            self.remove_user(operand, val, slot);
        }
        if let ValueContent::Instruction(ins) = &self.values[val.0].content {
            if ins.is_gvn_eligible() {
                self.gvn_table.remove(&ins.clone());
            }
        }
        self.values[val.0].dead = true;
        self.nodes_killed += 1;
    }

    /// Canonicalizes a GVN-eligible node: returns the existing representative
    /// for an equal node if one exists, otherwise interns `val` itself and
    /// returns it unchanged. Non-eligible opcodes always return `val`.
    pub(crate) fn gvn_intern(&mut self, val: Value) -> Value {
        let ins = match &self.values[val.0].content {
            ValueContent::Instruction(ins) if ins.is_gvn_eligible() => ins.clone(),
            _ => return val,
        };
        match self.gvn_table.get(&ins) {
            Some(&existing) if existing != val && !self.values[existing.0].dead => existing,
            _ => {
                self.gvn_table.insert(ins, val);
                val
            }
        }
    }

    pub(crate) fn lattice_of(&self, val: Value) -> Option<LatticeId> {
        self.lattice.get(val.gvn(self) as usize).copied().flatten()
    }

    pub(crate) fn set_lattice(&mut self, val: Value, id: LatticeId) {
        let gvn = val.gvn(self) as usize;
        if self.lattice.len() <= gvn {
            self.lattice.resize(gvn + 1, None);
        }
        self.lattice[gvn] = Some(id);
    }

    pub(crate) fn set_block_idom(&mut self, block: Block, idom: Option<Block>) {
        self.blocks[block.0].idom = idom;
    }

    pub(crate) fn set_block_dom_depth(&mut self, block: Block, depth: u32) {
        self.blocks[block.0].dom_depth = Some(depth);
    }
}
