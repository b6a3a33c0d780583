//! CFG discovery, dominators, and the loop tree (§4.4). Unlike a classic
//! Sea-of-Nodes where basic blocks are derived from control edges, this
//! crate's blocks already exist as a first-class structure (§9 design
//! notes); this module's job is purely the analysis over them — RPO,
//! Cooper–Harvey–Kennedy dominators, and back-edge-based loop detection —
//! grounded in the same iterative-intersection technique as a from-scratch
//! SoN CFG pass.

mod loop_tree;

pub(crate) use loop_tree::LoopTree;

use std::collections::HashMap;

use crate::ir::{Block, Context, Function};

pub(crate) struct CfgInfo {
    pub(crate) rpo: Vec<Block>,
    pub(crate) rpo_index: HashMap<Block, usize>,
}

/// Depth-first post-order walk from the entry block, then reversed — the
/// standard way to guarantee a node's dominators are visited before it.
pub(crate) fn compute_rpo(context: &Context, function: Function) -> CfgInfo {
    let entry = function.get_entry_block(context);
    let mut visited = std::collections::HashSet::new();
    let mut postorder = Vec::new();
    let mut stack = vec![(entry, false)];
    while let Some((block, processed)) = stack.pop() {
        if processed {
            postorder.push(block);
            continue;
        }
        if !visited.insert(block) {
            continue;
        }
        stack.push((block, true));
        for succ in block.successors(context) {
            if !visited.contains(&succ) {
                stack.push((succ, false));
            }
        }
    }
    postorder.reverse();
    let rpo_index = postorder
        .iter()
        .enumerate()
        .map(|(i, &b)| (b, i))
        .collect();
    CfgInfo {
        rpo: postorder,
        rpo_index,
    }
}

/// Cooper–Harvey–Kennedy iterative dominator computation: repeatedly
/// intersect each block's predecessors' currently-known idoms (by RPO index,
/// walking each candidate's idom chain until the two "fingers" meet) until no
/// block's idom changes. Converges in `O(E)` iterations in the worst case,
/// far fewer in practice since blocks are already in RPO.
pub(crate) fn compute_dominators(context: &mut Context, function: Function, cfg: &CfgInfo) {
    let entry = function.get_entry_block(context);
    let preds = predecessors(context, function);

    let mut idom: HashMap<Block, Option<Block>> = HashMap::new();
    idom.insert(entry, Some(entry));

    let mut changed = true;
    while changed {
        changed = false;
        for &block in cfg.rpo.iter() {
            if block == entry {
                continue;
            }
            let mut new_idom: Option<Block> = None;
            for &pred in preds.get(&block).into_iter().flatten() {
                if idom.get(&pred).map(|i| i.is_some()).unwrap_or(false) {
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(cur) => intersect(&idom, cfg, cur, pred),
                    });
                }
            }
            if idom.get(&block).copied().flatten() != new_idom {
                idom.insert(block, new_idom);
                changed = true;
            }
        }
    }

    for (&block, &computed) in idom.iter() {
        context.set_block_idom(block, if block == entry { None } else { computed });
    }
    resolve_dom_depths(context, function, entry);
}

fn intersect(
    idom: &HashMap<Block, Option<Block>>,
    cfg: &CfgInfo,
    mut a: Block,
    mut b: Block,
) -> Block {
    let idx = |b: Block| *cfg.rpo_index.get(&b).unwrap_or(&usize::MAX);
    while a != b {
        while idx(a) > idx(b) {
            a = idom.get(&a).copied().flatten().unwrap_or(a);
        }
        while idx(b) > idx(a) {
            b = idom.get(&b).copied().flatten().unwrap_or(b);
        }
    }
    a
}

/// Dominator depth, resolved lazily by following each block's idom chain up
/// to the entry (already computed) rather than threaded through the
/// fixpoint loop above.
fn resolve_dom_depths(context: &mut Context, function: Function, entry: Block) {
    context.set_block_dom_depth(entry, 0);
    for block in function.block_iter(context) {
        if block == entry {
            continue;
        }
        let mut depth = 0;
        let mut cur = block;
        while let Some(idom) = cur.idom(context) {
            depth += 1;
            cur = idom;
            if cur == entry {
                break;
            }
        }
        context.set_block_dom_depth(block, depth);
    }
}

pub(crate) fn is_dominated_by(context: &Context, block: Block, candidate: Block) -> bool {
    let mut cur = block;
    loop {
        if cur == candidate {
            return true;
        }
        match cur.idom(context) {
            Some(idom) if idom != cur => cur = idom,
            _ => return cur == candidate,
        }
    }
}

/// Least common ancestor of two blocks in the dominator tree, by walking the
/// deeper one up until both are at the same depth, then walking both up
/// together.
pub(crate) fn lca(context: &Context, mut a: Block, mut b: Block) -> Block {
    let mut da = a.dom_depth(context).unwrap_or(0);
    let mut db = b.dom_depth(context).unwrap_or(0);
    while da > db {
        a = a.idom(context).unwrap_or(a);
        da -= 1;
    }
    while db > da {
        b = b.idom(context).unwrap_or(b);
        db -= 1;
    }
    while a != b {
        a = a.idom(context).unwrap_or(a);
        b = b.idom(context).unwrap_or(b);
    }
    a
}

pub(crate) fn predecessors(
    context: &Context,
    function: Function,
) -> HashMap<Block, Vec<Block>> {
    let mut preds: HashMap<Block, Vec<Block>> = HashMap::new();
    for block in function.block_iter(context) {
        for succ in block.successors(context) {
            preds.entry(succ).or_default().push(block);
        }
    }
    preds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Dt, Module};

    /// `entry` branches on `cond` to `true_block`/`false_block`, both of
    /// which rejoin at `merge`.
    fn build_diamond(context: &mut Context) -> (Function, Block, Block, Block, Block) {
        let module = Module::new(context, "m");
        let mut func = Function::new(context, module, "f".into(), vec![("cond".into(), Dt::Int(1))], Dt::Void, true);
        let cond = func.get_arg(context, "cond").unwrap();
        let entry = func.get_entry_block(context);
        let true_block = func.create_block(context, Some("true_block".into()));
        let false_block = func.create_block(context, Some("false_block".into()));
        let merge = func.create_block(context, Some("merge".into()));

        entry.ins(context).conditional_branch(cond, true_block, false_block, None);
        true_block.ins(context).branch(merge, None);
        false_block.ins(context).branch(merge, None);
        merge.ins(context).ret(None);

        (func, entry, true_block, false_block, merge)
    }

    #[test]
    fn rpo_visits_entry_first_and_merge_last() {
        let mut context = Context::new();
        let (func, entry, true_block, false_block, merge) = build_diamond(&mut context);
        let cfg = compute_rpo(&context, func);
        assert_eq!(cfg.rpo[0], entry);
        assert_eq!(*cfg.rpo.last().unwrap(), merge);
        assert!(cfg.rpo.contains(&true_block));
        assert!(cfg.rpo.contains(&false_block));
    }

    #[test]
    fn diamond_dominators_and_lca() {
        let mut context = Context::new();
        let (func, entry, true_block, false_block, merge) = build_diamond(&mut context);
        let cfg = compute_rpo(&context, func);
        compute_dominators(&mut context, func, &cfg);

        assert_eq!(true_block.idom(&context), Some(entry));
        assert_eq!(false_block.idom(&context), Some(entry));
        assert_eq!(merge.idom(&context), Some(entry));

        assert_eq!(lca(&context, true_block, false_block), entry);
        assert!(is_dominated_by(&context, merge, entry));
        assert!(!is_dominated_by(&context, entry, merge));
    }
}
