//! Global Code Motion (§4.5): schedules every floating (non-pinned) node
//! into a basic block, given the RPO and dominator tree computed by `cfg`.
//! Pinned nodes already live at their final position by construction (they
//! were pushed into a `Block`'s instruction vector when built); GCM's job is
//! placing the pure, GVN-eligible nodes that the peephole/SCCP passes create
//! without inserting into any block.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::cfg::{self, CfgInfo, LoopTree};
use crate::ir::{Block, Context, Function, Instruction, Value};

pub(crate) struct GcmResult {
    pub(crate) node_block: HashMap<Value, Block>,
    pub(crate) hoisted: u64,
}

pub(crate) fn schedule(context: &mut Context, function: Function, cfg: &CfgInfo) -> GcmResult {
    let loop_tree = LoopTree::build(context, function, cfg);
    let mut floating = collect_floating(context, function);
    // Order by RPO position of the node's early block isn't known yet, so
    // sort by `rpo_index` of whatever block currently anchors the node's
    // nearest scheduled user instead — keeps the late-schedule walk close to
    // a reverse postorder traversal without a second fixpoint.
    floating.sort_by_key(|&v| std::cmp::Reverse(anchor_rpo(context, function, cfg, v)));
    let mut node_block = HashMap::new();
    let mut hoisted = 0u64;

    // Early schedule: each floating node's earliest legal block is the
    // deepest dominator block among its operands' blocks (pinned operands
    // resolve directly; floating operands recurse, memoized via
    // `node_block`).
    for &node in &floating {
        let early = early_schedule(context, function, node, &mut node_block, &floating);
        node_block.insert(node, early);
    }

    // Late schedule: walk floating nodes in reverse program order, moving
    // each to the LCA of its users' blocks (using the predecessor block for
    // a PHI user), then applying the hoist heuristic.
    for &node in floating.iter().rev() {
        let users = node_users_in_function(context, function, node);
        if users.is_empty() {
            continue;
        }
        let mut target: Option<Block> = None;
        for (user, slot) in users {
            let user_block = block_of(context, &node_block, user);
            let use_block = match user.as_instruction(context) {
                Some(Instruction::Phi(alts)) => alts.get(slot).map(|(b, _)| *b).unwrap_or(user_block),
                _ => user_block,
            };
            target = Some(match target {
                None => use_block,
                Some(cur) => cfg::lca(context, cur, use_block),
            });
        }
        if let Some(mut target) = target {
            let early = node_block[&node];
            // The node can't legally move above its early-schedule block;
            // clamp by walking up the idom chain from target until we reach
            // a block dominated-by-or-equal-to `early`.
            while target != early && !cfg::is_dominated_by(context, target, early) {
                target = target.idom(context).unwrap_or(early);
            }
            if try_to_hoist(context, &loop_tree, target, early) {
                target = early;
                hoisted += 1;
            }
            node_block.insert(node, target);
        }
    }

    for (&node, &block) in node_block.iter() {
        insert_before_terminator(context, block, node);
    }

    info!(target: "tb_core::gcm", "scheduled {} floating nodes ({} hoisted)", floating.len(), hoisted);
    GcmResult { node_block, hoisted }
}

fn collect_floating(context: &Context, function: Function) -> Vec<Value> {
    // In this model a node is "floating" (unscheduled) exactly when it's not
    // reachable by walking any block's instruction list — i.e. it exists in
    // the arena (a peephole/SCCP byproduct) but hasn't been placed yet.
    let scheduled: std::collections::HashSet<Value> = function
        .instruction_iter(context)
        .map(|(_, v)| v)
        .collect();
    let mut floating = Vec::new();
    for (_, val) in function.instruction_iter(context) {
        for operand in val.operands(context) {
            if !scheduled.contains(&operand) && !floating.contains(&operand) {
                if operand.as_instruction(context).is_some() {
                    floating.push(operand);
                }
            }
        }
    }
    floating
}

fn early_schedule(
    context: &Context,
    function: Function,
    node: Value,
    node_block: &mut HashMap<Value, Block>,
    floating: &[Value],
) -> Block {
    let entry = function.get_entry_block(context);
    let mut deepest = entry;
    for operand in node.operands(context) {
        let operand_block = if floating.contains(&operand) {
            if let Some(&b) = node_block.get(&operand) {
                b
            } else {
                let b = early_schedule(context, function, operand, node_block, floating);
                node_block.insert(operand, b);
                b
            }
        } else {
            block_of(context, node_block, operand)
        };
        if operand_block.dom_depth(context).unwrap_or(0) > deepest.dom_depth(context).unwrap_or(0)
        {
            deepest = operand_block;
        }
    }
    deepest
}

fn block_of(context: &Context, node_block: &HashMap<Value, Block>, val: Value) -> Block {
    if let Some(&b) = node_block.get(&val) {
        return b;
    }
    for module in context.module_iter() {
        for func in module.function_iter(context) {
            for block in func.block_iter(context) {
                if block.instruction_iter(context).any(|v| v == val) {
                    return block;
                }
            }
        }
    }
    func_entry_fallback(context)
}

fn func_entry_fallback(context: &Context) -> Block {
    context
        .module_iter()
        .next()
        .and_then(|m| m.function_iter(context).next())
        .map(|f| f.get_entry_block(context))
        .expect("at least one function must exist to schedule")
}

fn node_users_in_function(context: &Context, _function: Function, node: Value) -> Vec<(Value, usize)> {
    node.users(context)
}

/// Best-effort ordering key for the late-schedule pass: the RPO index of the
/// block containing the node's first already-scheduled user, or `0` if none
/// is scheduled yet (e.g. a floating operand of another floating node).
fn anchor_rpo(context: &Context, _function: Function, cfg: &CfgInfo, node: Value) -> usize {
    node.users(context)
        .into_iter()
        .find_map(|(user, _)| {
            for module in context.module_iter() {
                for func in module.function_iter(context) {
                    for block in func.block_iter(context) {
                        if block.instruction_iter(context).any(|v| v == user) {
                            return cfg.rpo_index.get(&block).copied();
                        }
                    }
                }
            }
            None
        })
        .unwrap_or(0)
}

/// Latency-based heuristic (§4.5 step 3): cheap, pure ops stay at their LCA;
/// hoisting to `early` only pays off when it actually pulls the node out of
/// a loop `target` sits in, or when `target` is deep enough in the
/// dominator tree relative to `early` that the difference is likely a loop
/// nest the `LoopTree` back-edge search didn't resolve (e.g. an irreducible
/// region). A real cost model would weigh estimated latency against
/// register pressure; this crate approximates it with loop depth and
/// dominator depth, which is sound (never makes scheduling incorrect) even
/// if not maximally aggressive.
fn try_to_hoist(context: &Context, loop_tree: &LoopTree, target: Block, early: Block) -> bool {
    if loop_tree.loop_depth(target) > loop_tree.loop_depth(early) {
        return true;
    }
    let target_depth = target.dom_depth(context).unwrap_or(0);
    let early_depth = early.dom_depth(context).unwrap_or(0);
    target_depth > early_depth + 4
}

fn insert_before_terminator(context: &mut Context, block: Block, node: Value) {
    let content = &mut context.blocks[block.0];
    if content.instructions.iter().any(|&v| v == node) {
        return;
    }
    let insert_at = content.instructions.len().saturating_sub(1).max(1);
    content.instructions.insert(insert_at, node);
    debug!(target: "tb_core::gcm", "placed node into block {:?} at {}", block, insert_at);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOpKind, Constant, Dt, Module};

    /// `entry` branches on `cond` to `left`/`right`, both rejoining at
    /// `merge`, where the only use of a floating add sits.
    fn build_diamond_with_floating_user(context: &mut Context) -> (Function, Block, Value, Value) {
        let module = Module::new(context, "m");
        let mut func = Function::new(
            context,
            module,
            "f".into(),
            vec![("cond".into(), Dt::Int(1)), ("x".into(), Dt::Int(32))],
            Dt::Int(32),
            true,
        );
        let cond = func.get_arg(context, "cond").unwrap();
        let x = func.get_arg(context, "x").unwrap();
        let entry = func.get_entry_block(context);
        let left = func.create_block(context, Some("left".into()));
        let right = func.create_block(context, Some("right".into()));
        let merge = func.create_block(context, Some("merge".into()));

        entry.ins(context).conditional_branch(cond, left, right, None);
        left.ins(context).branch(merge, None);
        right.ins(context).branch(merge, None);
        let one = Value::new_constant(context, Constant::new_iconst(Dt::Int(32), 1));
        // A placeholder sum that gets swapped out for the floating node below,
        // mimicking what `peephole::commit` leaves behind: a node created via
        // `new_node` that was never pushed into any block's instruction list.
        let placeholder = merge.ins(context).bin_op(BinOpKind::Add, x, one);
        let ret = merge.ins(context).ret(Some(placeholder));
        let floating = context.new_node(Instruction::BinOp {
            op: BinOpKind::Add,
            lhs: x,
            rhs: one,
        });
        context.replace_operand(ret, placeholder, floating);

        (func, merge, floating, ret)
    }

    #[test]
    fn floating_node_with_a_single_user_schedules_into_the_users_block() {
        let mut context = Context::new();
        let (func, merge, floating, _ret) = build_diamond_with_floating_user(&mut context);
        let cfg = cfg::compute_rpo(&context, func);
        cfg::compute_dominators(&mut context, func, &cfg);

        let result = schedule(&mut context, func, &cfg);

        assert_eq!(result.node_block.get(&floating), Some(&merge));
        assert!(merge.instruction_iter(&context).any(|v| v == floating));
    }

    #[test]
    fn collect_floating_ignores_instructions_already_in_a_block() {
        let mut context = Context::new();
        let module = Module::new(&mut context, "m");
        let func = Function::new(
            &mut context,
            module,
            "f".into(),
            vec![("x".into(), Dt::Int(32))],
            Dt::Int(32),
            true,
        );
        let x = func.get_arg(&context, "x").unwrap();
        let entry = func.get_entry_block(&context);
        let one = Value::new_constant(&mut context, Constant::new_iconst(Dt::Int(32), 1));
        let sum = entry.ins(&mut context).bin_op(BinOpKind::Add, x, one);
        entry.ins(&mut context).ret(Some(sum));

        assert!(collect_floating(&context, func).is_empty());
    }
}
