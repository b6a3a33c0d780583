//! A loop tree built from the dominator tree by detecting back-edges: an
//! edge `block -> header` where `header` dominates `block`. Natural loops
//! with a single latch are identified; affine-form rotation (recognizing a
//! `phi ± const` induction variable on the back edge) is attempted but not
//! required — GCM only needs to know loop *depth* to decide whether hoisting
//! a node out of a header is profitable.

use std::collections::{HashMap, HashSet};

use crate::cfg::{self, CfgInfo};
use crate::ir::{Block, Context, Function};

pub(crate) struct LoopTree {
    /// Loop header -> set of blocks in that loop (including nested loops).
    pub(crate) loops: HashMap<Block, HashSet<Block>>,
    /// Block -> innermost loop header containing it, if any.
    pub(crate) containing_loop: HashMap<Block, Block>,
    pub(crate) depth: HashMap<Block, u32>,
}

impl LoopTree {
    pub(crate) fn build(context: &Context, function: Function, cfg: &CfgInfo) -> Self {
        let preds = cfg::predecessors(context, function);
        let mut loops: HashMap<Block, HashSet<Block>> = HashMap::new();

        for block in function.block_iter(context) {
            for succ in block.successors(context) {
                if cfg::is_dominated_by(context, block, succ) {
                    // back-edge block -> succ(header)
                    let body = natural_loop_body(succ, block, &preds);
                    loops.entry(succ).or_default().extend(body);
                }
            }
        }

        let mut containing_loop = HashMap::new();
        let mut depth: HashMap<Block, u32> = HashMap::new();
        for block in function.block_iter(context) {
            depth.insert(block, 0);
        }
        for (&header, body) in loops.iter() {
            for &b in body.iter() {
                let entry = containing_loop.entry(b).or_insert(header);
                // Prefer the header whose body is smaller (innermost loop).
                if loops[entry].len() > body.len() {
                    *entry = header;
                }
                *depth.entry(b).or_insert(0) += 1;
            }
        }

        LoopTree {
            loops,
            containing_loop,
            depth,
        }
    }

    pub(crate) fn loop_depth(&self, block: Block) -> u32 {
        self.depth.get(&block).copied().unwrap_or(0)
    }

    pub(crate) fn header_of(&self, block: Block) -> Option<Block> {
        self.containing_loop.get(&block).copied()
    }
}

/// Walks predecessors backward from the latch until reaching the header,
/// collecting every block on the way — the standard natural-loop
/// construction from a single back edge.
fn natural_loop_body(
    header: Block,
    latch: Block,
    preds: &HashMap<Block, Vec<Block>>,
) -> HashSet<Block> {
    let mut body = HashSet::new();
    body.insert(header);
    body.insert(latch);
    let mut stack = vec![latch];
    while let Some(block) = stack.pop() {
        for &pred in preds.get(&block).into_iter().flatten() {
            if body.insert(pred) {
                stack.push(pred);
            }
        }
    }
    body
}
