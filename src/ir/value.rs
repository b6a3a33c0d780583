use super::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub(crate) struct Value(pub(crate) generational_arena::Index);

/// Every node carries a `gvn` identity distinct from its arena index: the
/// arena index is recycled by `generational_arena` (a new generation), while
/// `gvn` is a dense, monotone id used to key the lattice table and the
/// worklist's "already queued" bitset.
#[derive(Clone)]
pub(crate) struct Node {
    pub(crate) gvn: u32,
    pub(crate) content: ValueContent,
    /// Back-edges: `(user, operand slot)` pairs. Maintained exclusively by
    /// `Context::set_operand`/`add_user`/`remove_user` so the edge invariant
    /// (`n.inputs[i] = m` implies `m.users` contains `(n, i)`) can't be torn
    /// by a direct field write.
    pub(crate) users: Vec<(Value, usize)>,
    pub(crate) dead: bool,
}

#[derive(Clone)]
pub(crate) enum ValueContent {
    Argument(Dt),
    Constant(Constant),
    Instruction(Instruction),
}

impl Value {
    pub(crate) fn new_argument(context: &mut Context, dt: Dt) -> Value {
        context.insert_node(ValueContent::Argument(dt))
    }

    pub(crate) fn new_constant(context: &mut Context, constant: Constant) -> Value {
        context.insert_node(ValueContent::Constant(constant))
    }

    pub(crate) fn new_instruction(context: &mut Context, instruction: Instruction) -> Value {
        context.new_node(instruction)
    }

    pub(crate) fn is_constant(&self, context: &Context) -> bool {
        matches!(context.values[self.0].content, ValueContent::Constant(_))
    }

    pub(crate) fn as_instruction<'a>(&self, context: &'a Context) -> Option<&'a Instruction> {
        match &context.values[self.0].content {
            ValueContent::Instruction(ins) => Some(ins),
            _ => None,
        }
    }

    pub(crate) fn is_terminator(&self, context: &Context) -> bool {
        self.as_instruction(context)
            .map(Instruction::is_terminator)
            .unwrap_or(false)
    }

    pub(crate) fn is_pinned(&self, context: &Context) -> bool {
        self.as_instruction(context)
            .map(Instruction::is_pinned)
            .unwrap_or(true)
    }

    pub(crate) fn gvn(&self, context: &Context) -> u32 {
        context.values[self.0].gvn
    }

    pub(crate) fn is_dead(&self, context: &Context) -> bool {
        context.values[self.0].dead
    }

    pub(crate) fn users(&self, context: &Context) -> Vec<(Value, usize)> {
        context.values[self.0].users.clone()
    }

    pub(crate) fn operands(&self, context: &Context) -> smallvec::SmallVec<[Value; 3]> {
        match &context.values[self.0].content {
            ValueContent::Instruction(ins) => ins.operands(),
            _ => smallvec::smallvec![],
        }
    }

    pub(crate) fn replace_instruction_value(
        &self,
        context: &mut Context,
        old_val: Value,
        new_val: Value,
    ) {
        context.replace_operand(*self, old_val, new_val);
    }

    pub(crate) fn get_type(&self, context: &Context) -> Option<Dt> {
        match &context.values[self.0].content {
            ValueContent::Argument(dt) => Some(*dt),
            ValueContent::Constant(c) => Some(c.get_type()),
            ValueContent::Instruction(ins) => Some(ins.get_type(context)),
        }
    }
}
