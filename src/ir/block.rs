use super::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub(crate) struct Block(pub(crate) generational_arena::Index);

pub(crate) struct BlockContent {
    pub(crate) label: Label,
    pub(crate) function: Function,
    pub(crate) instructions: Vec<Value>,

    /// Filled in by `cfg::compute_dominators`; `None` until a dominator
    /// analysis has run for the owning function.
    pub(crate) idom: Option<Block>,
    pub(crate) dom_depth: Option<u32>,
}

pub(crate) type Label = String;

impl Block {
    pub(crate) fn new(
        context: &mut Context,
        mut function: Function,
        label: Option<String>,
    ) -> Block {
        let label = function.get_unique_label(context, label);
        let phi = Value::new_instruction(context, Instruction::Phi(Vec::new()));
        let content = BlockContent {
            label,
            function,
            instructions: vec![phi],
            idom: None,
            dom_depth: None,
        };
        Block(context.blocks.insert(content))
    }

    pub(crate) fn get_function(&self, context: &Context) -> Function {
        context.blocks[self.0].function
    }

    pub(crate) fn ins<'a>(&self, context: &'a mut Context) -> InstructionInserter<'a> {
        InstructionInserter::new(context, *self)
    }

    pub(crate) fn get_label(&self, context: &Context) -> String {
        context.blocks[self.0].label.clone()
    }

    pub(crate) fn get_phi(&self, context: &Context) -> Value {
        context.blocks[self.0].instructions[0]
    }

    pub(crate) fn add_phi(&self, context: &mut Context, from_block: Block, phi_value: Value) {
        let phi_val = self.get_phi(context);
        let slot = match &context.values[phi_val.0].content {
            ValueContent::Instruction(Instruction::Phi(list)) => list.len(),
            _ => unreachable!("First value in block instructions is not a phi."),
        };
        match &mut context.values.get_mut(phi_val.0).unwrap().content {
            ValueContent::Instruction(Instruction::Phi(list)) => {
                list.push((from_block, phi_value));
            }
            _ => unreachable!("First value in block instructions is not a phi."),
        }
        context.add_user(phi_value, phi_val, slot);
    }

    pub(crate) fn get_phi_val_coming_from(
        &self,
        context: &Context,
        from_block: &Block,
    ) -> Option<Value> {
        let phi_val = self.get_phi(context);
        if let ValueContent::Instruction(Instruction::Phi(pairs)) =
            &context.values[phi_val.0].content
        {
            pairs.iter().find_map(|(block, value)| {
                if block == from_block {
                    Some(*value)
                } else {
                    None
                }
            })
        } else {
            unreachable!("Phi value must be a PHI instruction.");
        }
    }

    pub(crate) fn replace_value(&self, context: &mut Context, old_val: Value, new_val: Value) {
        for ins in context.blocks[self.0].instructions.clone() {
            ins.replace_instruction_value(context, old_val, new_val);
        }
    }

    /// Successor blocks as named by this block's terminator. Empty for a
    /// block that ends in `Ret` (or isn't terminated yet).
    pub(crate) fn successors(&self, context: &Context) -> smallvec::SmallVec<[Block; 2]> {
        use smallvec::smallvec;
        let term = *context.blocks[self.0].instructions.last().unwrap();
        match term.as_instruction(context) {
            Some(Instruction::Branch(to)) => smallvec![*to],
            Some(Instruction::ConditionalBranch {
                true_block,
                false_block,
                ..
            }) => smallvec![*true_block, *false_block],
            _ => smallvec![],
        }
    }

    pub(crate) fn split_at(&mut self, context: &mut Context, split_idx: usize) -> (Block, Block) {
        let mut function = context.blocks[self.0].function;
        if split_idx == 0 {
            let new_block = function.create_block_before(context, self, None).unwrap();
            (new_block, *self)
        } else {
            let new_block = function.create_block_after(context, self, None).unwrap();
            let mut tail_instructions = context.blocks[self.0].instructions.split_off(split_idx);
            context.blocks[new_block.0]
                .instructions
                .append(&mut tail_instructions);
            (*self, new_block)
        }
    }

    pub(crate) fn instruction_iter(&self, context: &Context) -> InstructionIterator {
        InstructionIterator::new(context, self)
    }

    pub(crate) fn idom(&self, context: &Context) -> Option<Block> {
        context.blocks[self.0].idom
    }

    pub(crate) fn dom_depth(&self, context: &Context) -> Option<u32> {
        context.blocks[self.0].dom_depth
    }
}

pub(crate) struct BlockIterator {
    blocks: Vec<generational_arena::Index>,
    next: usize,
}

impl BlockIterator {
    pub(crate) fn new(context: &Context, function: &Function) -> Self {
        BlockIterator {
            blocks: context.functions[function.0]
                .blocks
                .iter()
                .map(|block| block.0)
                .collect(),
            next: 0,
        }
    }
}

impl Iterator for BlockIterator {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        if self.next < self.blocks.len() {
            let idx = self.next;
            self.next += 1;
            Some(Block(self.blocks[idx]))
        } else {
            None
        }
    }
}
