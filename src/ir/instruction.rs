use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum UnOpKind {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BinOpKind {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CmpKind {
    Eq,
    Ne,
    LtS,
    LeS,
    GtS,
    GeS,
    LtU,
    LeU,
    GtU,
    GeU,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ShiftKind {
    Shl,
    LShr,
    AShr,
}

/// The opcode taxonomy. Variants that are excluded from GVN (see
/// `is_gvn_eligible`) are exactly the ones the node-level spec calls out by
/// name: ROOT/REGION are modelled implicitly by block structure rather than
/// as nodes, so they don't appear here; everything else with a side effect or
/// control-flow role keeps its own identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Instruction {
    /// Merge point for values flowing in from predecessor blocks.
    Phi(Vec<(Block, Value)>),
    /// Unconditional control transfer, carrying an optional value for the
    /// target's phi.
    Branch(Block),
    ConditionalBranch {
        cond_value: Value,
        true_block: Block,
        false_block: Block,
    },
    Call(Function, Vec<Value>),
    Ret(Option<Value>),
    /// Reads the address of a stack slot. Never GVN'd: two reads of the same
    /// local still need to be the same node for LSRA's sake, but aliasing a
    /// `Local` slot across uses is handled by identity, not value numbering.
    GetLocal(Local),
    /// `mem_gen` is the memory-state token at the point of the load: two
    /// loads through the same pointer are only interchangeable if no store
    /// has intervened, which bumps the token (see `Context::new_load`).
    Load { ptr: Value, dt: Dt, mem_gen: u32 },
    Store { ptr: Value, stored_val: Value },
    UnOp {
        op: UnOpKind,
        arg: Value,
    },
    BinOp {
        op: BinOpKind,
        lhs: Value,
        rhs: Value,
    },
    Cmp {
        op: CmpKind,
        lhs: Value,
        rhs: Value,
    },
    Shift {
        op: ShiftKind,
        lhs: Value,
        rhs: Value,
    },
    /// Projects one output of a tuple-producing node (e.g. a call's return
    /// value, or a divmod pair).
    Proj { src: Value, index: u32 },
    /// Legalizing copy inserted by LSRA between a definition and a
    /// register-incompatible use.
    MachCopy(Value),
}

impl Instruction {
    /// Whether this opcode may ever be looked up in the GVN table. Mirrors
    /// the exclusion list: control/side-effecting/identity-sensitive ops are
    /// never deduplicated.
    pub(crate) fn is_gvn_eligible(&self) -> bool {
        match self {
            Instruction::Phi(_)
            | Instruction::Branch(_)
            | Instruction::ConditionalBranch { .. }
            | Instruction::Call(..)
            | Instruction::Ret(_)
            | Instruction::GetLocal(_)
            | Instruction::Store { .. }
            | Instruction::MachCopy(_) => false,
            Instruction::Load { .. }
            | Instruction::UnOp { .. }
            | Instruction::BinOp { .. }
            | Instruction::Cmp { .. }
            | Instruction::Shift { .. }
            | Instruction::Proj { .. } => true,
        }
    }

    /// Whether this node is pinned to its block position (cannot be moved by
    /// GCM). Everything with a control or memory role is pinned; pure
    /// arithmetic and projections are floating.
    pub(crate) fn is_pinned(&self) -> bool {
        !matches!(
            self,
            Instruction::UnOp { .. }
                | Instruction::BinOp { .. }
                | Instruction::Cmp { .. }
                | Instruction::Shift { .. }
        )
    }

    pub(crate) fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Branch(_) | Instruction::ConditionalBranch { .. } | Instruction::Ret(_)
        )
    }

    pub(crate) fn get_type(&self, context: &Context) -> Dt {
        match self {
            Instruction::Phi(alts) => alts
                .first()
                .and_then(|(_, v)| v.get_type(context))
                .unwrap_or(Dt::Void),
            Instruction::Branch(_) | Instruction::ConditionalBranch { .. } | Instruction::Ret(_) => {
                Dt::Void
            }
            Instruction::Call(func, _) => context.functions[func.0].return_type,
            Instruction::GetLocal(_) => Dt::Ptr,
            Instruction::Load { dt, .. } => *dt,
            Instruction::Store { .. } => Dt::Void,
            Instruction::UnOp { arg, .. } => arg.get_type(context).unwrap_or(Dt::Void),
            Instruction::BinOp { lhs, .. } => lhs.get_type(context).unwrap_or(Dt::Void),
            Instruction::Cmp { .. } => Dt::Int(1),
            Instruction::Shift { lhs, .. } => lhs.get_type(context).unwrap_or(Dt::Void),
            Instruction::Proj { src, .. } => src.get_type(context).unwrap_or(Dt::Void),
            Instruction::MachCopy(src) => src.get_type(context).unwrap_or(Dt::Void),
        }
    }

    pub(crate) fn replace_value(&mut self, old_val: Value, new_val: Value) {
        let replace = |val: &mut Value| {
            if *val == old_val {
                *val = new_val;
            }
        };
        match self {
            Instruction::Phi(pairs) => pairs.iter_mut().for_each(|(_, v)| replace(v)),
            Instruction::Branch(_) => (),
            Instruction::ConditionalBranch { cond_value, .. } => replace(cond_value),
            Instruction::Call(_, args) => args.iter_mut().for_each(replace),
            Instruction::Ret(val) => {
                if let Some(v) = val {
                    replace(v)
                }
            }
            Instruction::GetLocal(_) => (),
            Instruction::Load { ptr, .. } => replace(ptr),
            Instruction::Store { ptr, stored_val } => {
                replace(ptr);
                replace(stored_val);
            }
            Instruction::UnOp { arg, .. } => replace(arg),
            Instruction::BinOp { lhs, rhs, .. } => {
                replace(lhs);
                replace(rhs);
            }
            Instruction::Cmp { lhs, rhs, .. } => {
                replace(lhs);
                replace(rhs);
            }
            Instruction::Shift { lhs, rhs, .. } => {
                replace(lhs);
                replace(rhs);
            }
            Instruction::Proj { src, .. } => replace(src),
            Instruction::MachCopy(src) => replace(src),
        }
    }

    /// All data operands, in positional order. Used by the GVN key, by the
    /// peephole worklist to find users-of-users, and by SCCP's transfer
    /// functions. Control successors (block targets) are intentionally
    /// excluded; they aren't data edges.
    pub(crate) fn operands(&self) -> smallvec::SmallVec<[Value; 3]> {
        use smallvec::smallvec;
        match self {
            Instruction::Phi(pairs) => pairs.iter().map(|(_, v)| *v).collect(),
            Instruction::Branch(_) => smallvec![],
            Instruction::ConditionalBranch { cond_value, .. } => smallvec![*cond_value],
            Instruction::Call(_, args) => args.iter().copied().collect(),
            Instruction::Ret(val) => val.into_iter().copied().collect(),
            Instruction::GetLocal(_) => smallvec![],
            Instruction::Load { ptr, .. } => smallvec![*ptr],
            Instruction::Store { ptr, stored_val } => smallvec![*ptr, *stored_val],
            Instruction::UnOp { arg, .. } => smallvec![*arg],
            Instruction::BinOp { lhs, rhs, .. } => smallvec![*lhs, *rhs],
            Instruction::Cmp { lhs, rhs, .. } => smallvec![*lhs, *rhs],
            Instruction::Shift { lhs, rhs, .. } => smallvec![*lhs, *rhs],
            Instruction::Proj { src, .. } => smallvec![*src],
            Instruction::MachCopy(src) => smallvec![*src],
        }
    }
}

pub(crate) struct InstructionIterator {
    instructions: Vec<generational_arena::Index>,
    next: usize,
}

impl InstructionIterator {
    pub(crate) fn new(context: &Context, block: &Block) -> Self {
        InstructionIterator {
            instructions: context.blocks[block.0]
                .instructions
                .iter()
                .map(|val| val.0)
                .collect(),
            next: 0,
        }
    }
}

impl Iterator for InstructionIterator {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        if self.next < self.instructions.len() {
            let idx = self.next;
            self.next += 1;
            Some(Value(self.instructions[idx]))
        } else {
            None
        }
    }
}

pub(crate) struct InstructionInserter<'a> {
    context: &'a mut Context,
    block: Block,
}

impl<'a> InstructionInserter<'a> {
    pub(crate) fn new(context: &'a mut Context, block: Block) -> InstructionInserter<'a> {
        InstructionInserter { context, block }
    }

    fn append(self, instruction: Instruction) -> Value {
        let val = self.context.new_node(instruction);
        self.context.blocks[self.block.0].instructions.push(val);
        val
    }

    pub(crate) fn branch(self, to_block: Block, phi_value: Option<Value>) -> Value {
        let block = self.block;
        let context = &mut *self.context;
        phi_value
            .into_iter()
            .for_each(|pv| to_block.add_phi(context, block, pv));
        let val = context.new_node(Instruction::Branch(to_block));
        context.blocks[block.0].instructions.push(val);
        val
    }

    pub(crate) fn conditional_branch(
        self,
        cond_value: Value,
        true_block: Block,
        false_block: Block,
        phi_value: Option<Value>,
    ) -> Value {
        let block = self.block;
        let context = &mut *self.context;
        phi_value.into_iter().for_each(|pv| {
            true_block.add_phi(context, block, pv);
            false_block.add_phi(context, block, pv);
        });
        let val = context.new_node(Instruction::ConditionalBranch {
            cond_value,
            true_block,
            false_block,
        });
        context.blocks[block.0].instructions.push(val);
        val
    }

    pub(crate) fn call(self, function: Function, args: &[Value]) -> Value {
        self.append(Instruction::Call(function, args.to_vec()))
    }

    pub(crate) fn ret(self, value: Option<Value>) -> Value {
        self.append(Instruction::Ret(value))
    }

    pub(crate) fn get_local(self, local: Local) -> Value {
        self.append(Instruction::GetLocal(local))
    }

    pub(crate) fn load(self, ptr: Value, dt: Dt) -> Value {
        let mem_gen = self.context.cur_mem_gen;
        self.append(Instruction::Load { ptr, dt, mem_gen })
    }

    pub(crate) fn store(self, ptr: Value, stored_val: Value) -> Value {
        self.context.cur_mem_gen += 1;
        self.append(Instruction::Store { ptr, stored_val })
    }

    pub(crate) fn un_op(self, op: UnOpKind, arg: Value) -> Value {
        self.append(Instruction::UnOp { op, arg })
    }

    pub(crate) fn bin_op(self, op: BinOpKind, lhs: Value, rhs: Value) -> Value {
        self.append(Instruction::BinOp { op, lhs, rhs })
    }

    pub(crate) fn cmp(self, op: CmpKind, lhs: Value, rhs: Value) -> Value {
        self.append(Instruction::Cmp { op, lhs, rhs })
    }

    pub(crate) fn shift(self, op: ShiftKind, lhs: Value, rhs: Value) -> Value {
        self.append(Instruction::Shift { op, lhs, rhs })
    }

    pub(crate) fn proj(self, src: Value, index: u32) -> Value {
        self.append(Instruction::Proj { src, index })
    }
}
