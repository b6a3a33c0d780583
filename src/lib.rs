//! tb-core: retargetable optimizing compiler backend core.
//!
//! Owns the Sea-of-Nodes-style IR, the peephole/GVN engine, SCCP, Global
//! Code Motion, an interprocedural inliner and linear-scan register
//! allocation. Machine-specific concerns cross the `Target` trait boundary
//! (`src/target.rs`); this crate never names a concrete instruction set.
//!
//! The IR itself (`ir`), the dataflow analyses (`cfg`, `lattice`), and the
//! allocator (`regalloc`) stay crate-private: `Unit` is the only handle a
//! caller gets, and `run_pipeline` is the only way to drive it. A multi-crate
//! split (`tb-ir` + `tb-target-*`) would need to make more of this public;
//! that's future work, noted in DESIGN.md.

mod cfg;
pub mod config;
mod error;
mod gcm;
mod ipo;
mod ir;
mod lattice;
mod regalloc;
pub mod stats;
mod target;
mod worklist;

pub use config::PipelineConfig;
pub use error::CoreError;
pub use stats::CompileStats;

use ir::{Context, Function, Module};
use lattice::LatticeTable;
use target::Target;
use tracing::info;

/// A single compilation unit: one arena-backed `Context` plus the module it
/// owns. Functions are built against it through `Unit::module` before
/// `run_pipeline` is called; there's no public way to reach into the graph
/// once it's been created, matching the teacher's pattern of hiding the
/// concurrent-slab/arena internals behind a handle.
pub struct Unit {
    context: Context,
    module: Module,
}

impl Unit {
    pub fn new(name: &str) -> Self {
        let mut context = Context::new();
        let module = Module::new(&mut context, name);
        Unit { context, module }
    }
}

/// Runs the pipeline described in §1: the inliner runs once over the whole
/// module, then every function alternates peephole/GVN and SCCP to a local
/// fixpoint (capped at `MAX_PEEPHOLE_SCCP_ROUNDS` since each round is
/// monotone but a pathological graph could oscillate forever without a
/// bound), Global Code Motion schedules the floating nodes GVN/SCCP leave
/// behind, and linear-scan register allocation assigns the function's
/// values to `target`'s registers.
pub fn run_pipeline(unit: &mut Unit, target: &dyn Target, config: &PipelineConfig) -> Result<CompileStats, CoreError> {
    let mut stats = CompileStats::default();

    let inline_result = ipo::run(&mut unit.context, unit.module, config, &mut stats);
    info!(
        target: "tb_core::pipeline",
        "inlined {} call site(s)",
        inline_result.inlined_call_sites
    );

    let functions: Vec<Function> = unit.module.function_iter(&unit.context).collect();
    for function in functions {
        optimize_function(&mut unit.context, function, target, config, &mut stats)?;
    }

    stats.nodes_created = unit.context.nodes_created;
    stats.nodes_killed = unit.context.nodes_killed;

    Ok(stats)
}

const MAX_PEEPHOLE_SCCP_ROUNDS: u32 = 4;

fn optimize_function(
    context: &mut Context,
    function: Function,
    target: &dyn Target,
    config: &PipelineConfig,
    stats: &mut CompileStats,
) -> Result<(), CoreError> {
    let mut lattice = LatticeTable::with_widen_limit(config.widen_limit);

    for round in 0..MAX_PEEPHOLE_SCCP_ROUNDS {
        let mut peephole = ir::peephole::PeepholeEngine::new(context, &mut lattice);
        peephole.run(function)?;
        let rewrites = peephole.rewrites;
        stats.peephole_rewrites += rewrites;
        stats.gvn_hits += peephole.gvn_hits;

        let mut sccp = ir::sccp::SccpEngine::new(context, &mut lattice);
        sccp.run(function)?;
        let sccp_materialized = sccp.materialized;
        stats.sccp_materialized += sccp_materialized;

        if config.verify_between_passes {
            ir::verify::verify(context, function, None)?;
        }

        if rewrites == 0 && sccp_materialized == 0 {
            info!(target: "tb_core::pipeline", "peephole/sccp converged after {} round(s)", round + 1);
            break;
        }
    }
    stats.sccp_widenings += lattice.widenings;

    let cfg_info = cfg::compute_rpo(context, function);
    cfg::compute_dominators(context, function, &cfg_info);

    let gcm_result = gcm::schedule(context, function, &cfg_info);
    stats.gcm_nodes_hoisted += gcm_result.hoisted;

    if config.verify_between_passes {
        ir::verify::verify(context, function, None)?;
    }

    regalloc::allocate(context, function, target, config, stats)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Dt;

    struct NullTarget;

    impl Target for NullTarget {
        fn constraint(&self, _context: &Context, _value: ir::Value) -> regalloc::RegMask {
            regalloc::RegMask::any(regalloc::CLASS_INT, 8)
        }
        fn node_2addr(&self, _context: &Context, _value: ir::Value) -> bool {
            false
        }
        fn tmp_count(&self, _context: &Context, _value: ir::Value) -> u32 {
            0
        }
        fn clobbers_flags(&self, _context: &Context, _value: ir::Value) -> bool {
            false
        }
        fn extra_bytes(&self, _context: &Context, _value: ir::Value) -> u32 {
            4
        }
        fn can_gvn(&self, _context: &Context, _value: ir::Value) -> bool {
            true
        }
        fn emit(
            &self,
            _context: &Context,
            _function: Function,
            _value: ir::Value,
            _out: &mut Vec<u8>,
        ) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[test]
    fn empty_function_pipeline_succeeds() {
        let mut unit = Unit::new("test_unit");
        let func = Function::new(&mut unit.context, unit.module, "main".into(), vec![], Dt::Int(32), true);
        let entry = func.get_entry_block(&unit.context);
        entry.ins(&mut unit.context).ret(None);

        let config = PipelineConfig::default();
        let stats = run_pipeline(&mut unit, &NullTarget, &config).expect("pipeline should succeed");
        assert_eq!(stats.lsra_rounds, 1);
    }

    #[test]
    fn add_zero_folds_and_allocates() {
        let mut unit = Unit::new("test_unit");
        let func = Function::new(
            &mut unit.context,
            unit.module,
            "identity".into(),
            vec![("x".into(), Dt::Int(32))],
            Dt::Int(32),
            true,
        );
        let x = func.get_arg(&unit.context, "x").unwrap();
        let entry = func.get_entry_block(&unit.context);
        let zero = ir::Value::new_constant(&mut unit.context, ir::Constant::new_iconst(Dt::Int(32), 0));
        let sum = entry.ins(&mut unit.context).bin_op(ir::BinOpKind::Add, x, zero);
        entry.ins(&mut unit.context).ret(Some(sum));

        let config = PipelineConfig::default();
        let stats = run_pipeline(&mut unit, &NullTarget, &config).expect("pipeline should succeed");
        assert!(stats.peephole_rewrites >= 1);
    }
}
