use std::collections::{BTreeMap, HashMap};

use super::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub(crate) struct Function(pub(crate) generational_arena::Index);

pub(crate) struct FunctionContent {
    pub(crate) name: String,
    pub(crate) arguments: Vec<(String, Value)>,
    pub(crate) return_type: Dt,
    pub(crate) blocks: Vec<Block>,
    pub(crate) is_public: bool,

    pub(crate) local_storage: BTreeMap<String, Local>,

    /// Call sites made by this function, in order of appearance — the
    /// "CALLGRAPH" edges of §3, threaded through the function rather than
    /// modelled as extra graph nodes (see DESIGN.md).
    pub(crate) call_sites: Vec<Value>,

    next_label_idx: u64,
}

impl Function {
    pub(crate) fn new(
        context: &mut Context,
        module: Module,
        name: String,
        args: Vec<(String, Dt)>,
        return_type: Dt,
        is_public: bool,
    ) -> Function {
        let arguments = args
            .into_iter()
            .map(|(name, dt)| (name, Value::new_argument(context, dt)))
            .collect();
        let content = FunctionContent {
            name,
            arguments,
            return_type,
            blocks: Vec::new(),
            is_public,
            local_storage: BTreeMap::new(),
            call_sites: Vec::new(),
            next_label_idx: 0,
        };
        let func = Function(context.functions.insert(content));

        context.modules[module.0].functions.push(func);

        let entry_block = Block::new(context, func, Some("entry".to_owned()));
        context
            .functions
            .get_mut(func.0)
            .unwrap()
            .blocks
            .push(entry_block);

        func
    }

    pub(crate) fn create_block(&mut self, context: &mut Context, label: Option<Label>) -> Block {
        let block = Block::new(context, *self, label);
        let func = context.functions.get_mut(self.0).unwrap();
        func.blocks.push(block);
        block
    }

    pub(crate) fn create_block_before(
        &mut self,
        context: &mut Context,
        other: &Block,
        label: Option<Label>,
    ) -> Result<Block, String> {
        let new_block = Block::new(context, *self, label);
        let func = context.functions.get_mut(self.0).unwrap();
        func.blocks
            .iter()
            .position(|block| block == other)
            .map(|idx| {
                func.blocks.insert(idx, new_block);
                new_block
            })
            .ok_or_else(|| "Cannot insert block before other, not found in function.".into())
    }

    pub(crate) fn create_block_after(
        &mut self,
        context: &mut Context,
        other: &Block,
        label: Option<Label>,
    ) -> Result<Block, String> {
        let new_block = Block::new(context, *self, label);
        let func = context.functions.get_mut(self.0).unwrap();
        func.blocks
            .iter()
            .position(|block| block == other)
            .map(|idx| {
                func.blocks.insert(idx + 1, new_block);
                new_block
            })
            .ok_or_else(|| "Cannot insert block after other, not found in function.".into())
    }

    pub(crate) fn get_unique_label(
        &mut self,
        context: &mut Context,
        hint: Option<String>,
    ) -> String {
        match hint {
            Some(hint) => {
                if context.functions[self.0]
                    .blocks
                    .iter()
                    .any(|block| context.blocks[block.0].label == hint)
                {
                    let func = &mut context.functions.get_mut(self.0).unwrap();
                    let idx = func.next_label_idx;
                    func.next_label_idx += 1;
                    format!("{}{}", hint, idx)
                } else {
                    hint
                }
            }
            None => {
                let func = &mut context.functions.get_mut(self.0).unwrap();
                let idx = func.next_label_idx;
                func.next_label_idx += 1;
                format!("block{}", idx)
            }
        }
    }

    pub(crate) fn get_name<'a>(&self, context: &'a Context) -> &'a str {
        &context.functions[self.0].name
    }

    pub(crate) fn is_public(&self, context: &Context) -> bool {
        context.functions[self.0].is_public
    }

    pub(crate) fn get_entry_block(&self, context: &Context) -> Block {
        context.functions[self.0].blocks[0]
    }

    pub(crate) fn get_arg(&self, context: &Context, name: &str) -> Option<Value> {
        context.functions[self.0]
            .arguments
            .iter()
            .find_map(|(arg_name, val)| if arg_name == name { Some(val) } else { None })
            .copied()
    }

    pub(crate) fn args_iter<'a>(&self, context: &'a Context) -> impl Iterator<Item = &'a Value> {
        context.functions[self.0].arguments.iter().map(|(_, v)| v)
    }

    pub(crate) fn get_local(&self, context: &Context, name: &str) -> Option<Local> {
        context.functions[self.0].local_storage.get(name).copied()
    }

    pub(crate) fn new_local(
        &mut self,
        context: &mut Context,
        name: String,
        dt: Dt,
        is_mutable: bool,
        initializer: Option<Constant>,
    ) -> Result<Local, String> {
        let local = Local::new(context, dt, is_mutable, initializer);
        let func = context.functions.get_mut(self.0).unwrap();
        if func.local_storage.insert(name.clone(), local).is_some() {
            Err(format!(
                "Local storage for function {} already has entry for {}.",
                func.name, name
            ))
        } else {
            Ok(local)
        }
    }

    /// Uses `name` as a hint, appending a numeric suffix until it's unique.
    /// Used by the inliner when splicing a callee's locals into the caller.
    pub(crate) fn new_unique_local(
        &mut self,
        context: &mut Context,
        name: String,
        dt: Dt,
        is_mutable: bool,
        initializer: Option<Constant>,
    ) -> Local {
        let func = &context.functions[self.0];
        let new_name = if func.local_storage.contains_key(&name) {
            (0..)
                .find_map(|n| {
                    let candidate = format!("{}{}", name, n);
                    if func.local_storage.contains_key(&candidate) {
                        None
                    } else {
                        Some(candidate)
                    }
                })
                .unwrap()
        } else {
            name
        };
        self.new_local(context, new_name, dt, is_mutable, initializer)
            .unwrap()
    }

    pub(crate) fn locals_iter<'a>(
        &self,
        context: &'a Context,
    ) -> impl Iterator<Item = (&'a String, &'a Local)> {
        context.functions[self.0].local_storage.iter()
    }

    /// Copies every local of `other` into `self` under a freshened name,
    /// returning the old→new mapping so the inliner can rewrite `GetLocal`
    /// operands in the cloned callee body.
    pub(crate) fn merge_locals_from(
        &mut self,
        context: &mut Context,
        other: Function,
    ) -> HashMap<Local, Local> {
        let mut local_map = HashMap::new();
        let old_locals: Vec<(String, Local, LocalContent)> = context.functions[other.0]
            .local_storage
            .iter()
            .map(|(name, local)| (name.clone(), *local, context.locals[local.0].clone()))
            .collect();
        for (name, old_local, old_content) in old_locals {
            let new_local = self.new_unique_local(
                context,
                name,
                old_content.dt,
                old_content.is_mutable,
                old_content.initializer,
            );
            local_map.insert(old_local, new_local);
        }
        local_map
    }

    pub(crate) fn record_call_site(&mut self, context: &mut Context, call: Value) {
        context.functions[self.0].call_sites.push(call);
    }

    pub(crate) fn call_sites<'a>(&self, context: &'a Context) -> &'a [Value] {
        &context.functions[self.0].call_sites
    }

    pub(crate) fn block_iter(&self, context: &Context) -> BlockIterator {
        BlockIterator::new(context, self)
    }

    pub(crate) fn instruction_iter<'a>(
        &self,
        context: &'a Context,
    ) -> impl Iterator<Item = (Block, Value)> + 'a {
        context.functions[self.0]
            .blocks
            .iter()
            .flat_map(move |block| {
                context.blocks[block.0]
                    .instructions
                    .iter()
                    .map(move |ins_val| (*block, *ins_val))
            })
    }
}

pub(crate) struct FunctionIterator {
    functions: Vec<generational_arena::Index>,
    next: usize,
}

impl FunctionIterator {
    pub(crate) fn new(context: &Context, module: &Module) -> FunctionIterator {
        FunctionIterator {
            functions: context.modules[module.0]
                .functions
                .iter()
                .map(|func| func.0)
                .collect(),
            next: 0,
        }
    }
}

impl Iterator for FunctionIterator {
    type Item = Function;

    fn next(&mut self) -> Option<Function> {
        if self.next < self.functions.len() {
            let idx = self.next;
            self.next += 1;
            Some(Function(self.functions[idx]))
        } else {
            None
        }
    }
}
