//! Interprocedural, bottom-up inliner (§4.9). Builds the call graph from
//! every function's recorded call sites, finds strongly connected
//! components with `petgraph::algo::tarjan_scc` (returned in reverse
//! topological order, i.e. leaves first — exactly the order a bottom-up
//! inliner needs), and splices callee bodies no bigger than
//! `PipelineConfig::inline_threshold` into their callers. A function whose
//! SCC has more than one member, or that calls itself, is recursive and is
//! left alone: inlining it would not terminate.

use std::collections::HashMap;

use petgraph::graph::DiGraph;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::ir::{Block, Context, Function, Instruction, Local, Module, Value};
use crate::stats::CompileStats;

pub(crate) struct InlineResult {
    pub(crate) inlined_call_sites: u64,
}

pub(crate) fn run(
    context: &mut Context,
    module: Module,
    config: &PipelineConfig,
    stats: &mut CompileStats,
) -> InlineResult {
    let functions: Vec<Function> = module.function_iter(context).collect();

    let mut graph = DiGraph::<Function, ()>::new();
    let mut node_of = HashMap::new();
    for &f in &functions {
        node_of.insert(f, graph.add_node(f));
    }
    for &f in &functions {
        for &call in f.call_sites(context) {
            if let Some(Instruction::Call(callee, _)) = call.as_instruction(context) {
                if let (Some(&a), Some(&b)) = (node_of.get(&f), node_of.get(callee)) {
                    graph.add_edge(a, b, ());
                }
            }
        }
    }

    let sccs = petgraph::algo::tarjan_scc(&graph);
    let mut inlined = 0u64;
    for scc in sccs {
        let recursive = scc.len() > 1
            || graph.find_edge(scc[0], scc[0]).is_some();
        if recursive {
            debug!(target: "tb_core::ipo", "skipping recursive scc of size {}", scc.len());
            continue;
        }
        let callee = graph[scc[0]];
        inline_into_callers(context, &functions, callee, config, &mut inlined);
    }

    stats.inlined_call_sites += inlined;
    InlineResult {
        inlined_call_sites: inlined,
    }
}

fn can_inline(context: &Context, callee: Function, config: &PipelineConfig) -> bool {
    let blocks: Vec<Block> = callee.block_iter(context).collect();
    if blocks.len() != 1 {
        // Multi-block callee inlining needs CFG splicing (splitting the call
        // block, wiring the callee's internal edges, merging multiple
        // returns through a phi); not implemented, so such callees are left
        // as ordinary calls.
        return false;
    }
    blocks[0].instruction_iter(context).count() <= config.inline_threshold
}

fn inline_into_callers(
    context: &mut Context,
    functions: &[Function],
    callee: Function,
    config: &PipelineConfig,
    inlined: &mut u64,
) {
    if !can_inline(context, callee, config) {
        return;
    }
    for &caller in functions {
        if caller == callee {
            continue;
        }
        let call_sites: Vec<Value> = caller.call_sites(context).to_vec();
        for call_val in call_sites {
            if call_val.is_dead(context) {
                continue;
            }
            let is_target = matches!(
                call_val.as_instruction(context),
                Some(Instruction::Call(f, _)) if *f == callee
            );
            if !is_target {
                continue;
            }
            inline_one(context, caller, callee, call_val);
            *inlined += 1;
        }
    }
}

fn containing_block(context: &Context, function: Function, val: Value) -> Option<Block> {
    function
        .block_iter(context)
        .find(|block| block.instruction_iter(context).any(|v| v == val))
}

/// Splices `callee`'s single-block body in place of `call_val` inside
/// `caller`, remapping callee arguments to the call's actual arguments,
/// callee locals to freshly named caller locals (`merge_locals_from`), and
/// every instruction's operands through a value map built in program order
/// (sound because the callee body is already in SSA def-before-use order).
fn inline_one(context: &mut Context, mut caller: Function, callee: Function, call_val: Value) {
    let Some(call_block) = containing_block(context, caller, call_val) else {
        return;
    };
    let call_args = match call_val.as_instruction(context) {
        Some(Instruction::Call(_, args)) => args.clone(),
        _ => return,
    };

    let mut val_map: HashMap<Value, Value> = HashMap::new();
    for (i, &arg_val) in callee.args_iter(context).enumerate() {
        if let Some(&actual) = call_args.get(i) {
            val_map.insert(arg_val, actual);
        }
    }
    let local_map: HashMap<Local, Local> = caller.merge_locals_from(context, callee);

    let callee_block = callee.block_iter(context).next().expect("callee has an entry block");
    let body: Vec<Value> = callee_block.instruction_iter(context).collect();

    let mut spliced = Vec::new();
    let mut ret_val: Option<Value> = None;
    for old_val in body {
        match old_val.as_instruction(context).cloned() {
            Some(Instruction::Phi(_)) => continue,
            Some(Instruction::Ret(v)) => {
                ret_val = v.map(|v| remap(v, &val_map));
            }
            Some(ins) => {
                let remapped = remap_instruction(&ins, &val_map, &local_map);
                let new_val = Value::new_instruction(context, remapped);
                if matches!(ins, Instruction::Store { .. }) {
                    context.cur_mem_gen += 1;
                }
                val_map.insert(old_val, new_val);
                spliced.push(new_val);
            }
            None => {}
        }
    }

    let position = context.blocks[call_block.0]
        .instructions
        .iter()
        .position(|&v| v == call_val);
    if let Some(pos) = position {
        context.blocks[call_block.0].instructions.remove(pos);
        for (offset, val) in spliced.into_iter().enumerate() {
            context.blocks[call_block.0].instructions.insert(pos + offset, val);
        }
    }

    match ret_val {
        Some(replacement) => context.subsume(call_val, replacement),
        None => context.kill(call_val),
    }

    for &inner_call in callee.call_sites(context).to_vec().iter() {
        caller.record_call_site(context, remap(inner_call, &val_map));
    }
}

fn remap(val: Value, val_map: &HashMap<Value, Value>) -> Value {
    val_map.get(&val).copied().unwrap_or(val)
}



fn remap_instruction(
    ins: &Instruction,
    val_map: &HashMap<Value, Value>,
    local_map: &HashMap<Local, Local>,
) -> Instruction {
    match ins {
        Instruction::Phi(_) | Instruction::Branch(_) | Instruction::ConditionalBranch { .. } => {
            unreachable!("control-flow instruction in a single-block callee body")
        }
        Instruction::Call(f, args) => {
            Instruction::Call(*f, args.iter().map(|&a| remap(a, val_map)).collect())
        }
        Instruction::Ret(_) => unreachable!("Ret handled by the caller before remapping"),
        Instruction::GetLocal(local) => {
            Instruction::GetLocal(local_map.get(local).copied().unwrap_or(*local))
        }
        Instruction::Load { ptr, dt, mem_gen } => Instruction::Load {
            ptr: remap(*ptr, val_map),
            dt: *dt,
            mem_gen: *mem_gen,
        },
        Instruction::Store { ptr, stored_val } => Instruction::Store {
            ptr: remap(*ptr, val_map),
            stored_val: remap(*stored_val, val_map),
        },
        Instruction::UnOp { op, arg } => Instruction::UnOp {
            op: *op,
            arg: remap(*arg, val_map),
        },
        Instruction::BinOp { op, lhs, rhs } => Instruction::BinOp {
            op: *op,
            lhs: remap(*lhs, val_map),
            rhs: remap(*rhs, val_map),
        },
        Instruction::Cmp { op, lhs, rhs } => Instruction::Cmp {
            op: *op,
            lhs: remap(*lhs, val_map),
            rhs: remap(*rhs, val_map),
        },
        Instruction::Shift { op, lhs, rhs } => Instruction::Shift {
            op: *op,
            lhs: remap(*lhs, val_map),
            rhs: remap(*rhs, val_map),
        },
        Instruction::Proj { src, index } => Instruction::Proj {
            src: remap(*src, val_map),
            index: *index,
        },
        Instruction::MachCopy(v) => Instruction::MachCopy(remap(*v, val_map)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOpKind, Constant, Dt};

    /// `callee(a) { ret a + 1 }` called once from `caller(x) { ret callee(x) }`.
    fn caller_and_single_block_callee(context: &mut Context) -> (Module, Function, Function, Value) {
        let module = Module::new(context, "m");
        let mut callee = Function::new(context, module, "callee".into(), vec![("a".into(), Dt::Int(32))], Dt::Int(32), true);
        let a = callee.get_arg(context, "a").unwrap();
        let callee_entry = callee.get_entry_block(context);
        let one = Value::new_constant(context, Constant::new_iconst(Dt::Int(32), 1));
        let sum = callee_entry.ins(context).bin_op(BinOpKind::Add, a, one);
        callee_entry.ins(context).ret(Some(sum));

        let mut caller = Function::new(context, module, "caller".into(), vec![("x".into(), Dt::Int(32))], Dt::Int(32), true);
        let x = caller.get_arg(context, "x").unwrap();
        let caller_entry = caller.get_entry_block(context);
        let call = caller_entry.ins(context).call(callee, &[x]);
        caller.record_call_site(context, call);
        caller_entry.ins(context).ret(Some(call));

        (module, caller, callee, call)
    }

    #[test]
    fn single_block_callee_is_eligible_for_inlining() {
        let mut context = Context::new();
        let (_module, _caller, callee, _call) = caller_and_single_block_callee(&mut context);
        let config = PipelineConfig::default();
        assert!(can_inline(&context, callee, &config));
    }

    #[test]
    fn run_inlines_the_call_and_rewires_the_return_value() {
        let mut context = Context::new();
        let (module, caller, _callee, call) = caller_and_single_block_callee(&mut context);
        let config = PipelineConfig::default();
        let mut stats = CompileStats::default();

        let result = run(&mut context, module, &config, &mut stats);

        assert_eq!(result.inlined_call_sites, 1);
        assert!(call.is_dead(&context));
        let entry = caller.get_entry_block(&context);
        assert!(entry.instruction_iter(&context).all(|v| !matches!(
            v.as_instruction(&context),
            Some(Instruction::Call(_, _))
        )));
        let ret = entry
            .instruction_iter(&context)
            .find(|v| matches!(v.as_instruction(&context), Some(Instruction::Ret(_))))
            .unwrap();
        match ret.as_instruction(&context) {
            Some(Instruction::Ret(Some(v))) => {
                assert!(matches!(
                    v.as_instruction(&context),
                    Some(Instruction::BinOp { op: BinOpKind::Add, .. })
                ));
            }
            other => panic!("expected a ret of the inlined add, got {:?}", other),
        }
    }

    #[test]
    fn a_function_that_calls_itself_is_left_alone() {
        let mut context = Context::new();
        let module = Module::new(&mut context, "m");
        let mut recursive = Function::new(&mut context, module, "r".into(), vec![("x".into(), Dt::Int(32))], Dt::Int(32), true);
        let x = recursive.get_arg(&context, "x").unwrap();
        let entry = recursive.get_entry_block(&context);
        let call = entry.ins(&mut context).call(recursive, &[x]);
        recursive.record_call_site(&mut context, call);
        entry.ins(&mut context).ret(Some(call));

        let config = PipelineConfig::default();
        let mut stats = CompileStats::default();
        let result = run(&mut context, module, &config, &mut stats);

        assert_eq!(result.inlined_call_sites, 0);
        assert!(!call.is_dead(&context));
    }
}