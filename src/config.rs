//! Pipeline-wide knobs. One `PipelineConfig` is threaded through a
//! `run_pipeline` call; defaults match the constants named throughout the
//! component design (§4).

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Number of lattice-range refinements SCCP tolerates before widening to
    /// the datatype's full range.
    pub widen_limit: u8,
    /// Node-count ceiling under which the inliner will clone a callee's body
    /// into its caller.
    pub inline_threshold: usize,
    /// Upper bound on LSRA spill/restart rounds before giving up with
    /// `CoreError::RegisterAllocationFailed`.
    pub max_lsra_rounds: u32,
    /// Runs `ir::verify::verify` between every pass when set; expensive, so
    /// it defaults to on only in debug builds.
    pub verify_between_passes: bool,
    /// Hint consulted only by the CLI-style front end that owns the
    /// `tracing` subscriber; the core itself just emits events.
    pub log_level: tracing::Level,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            widen_limit: crate::lattice::WIDEN_LIMIT,
            inline_threshold: 15,
            max_lsra_rounds: 8,
            verify_between_passes: cfg!(debug_assertions),
            log_level: tracing::Level::INFO,
        }
    }
}
