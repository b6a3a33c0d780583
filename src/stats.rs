//! A serializable snapshot of pipeline counters, taken at the end of a run.
//! Used for regression tracking across commits and for a `--dump-stats`
//! style diagnostic path; the only artifact this crate persists to disk.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompileStats {
    pub nodes_created: u64,
    pub nodes_killed: u64,
    pub peephole_rewrites: u64,
    pub gvn_hits: u64,
    pub sccp_widenings: u64,
    pub sccp_materialized: u64,
    pub gcm_nodes_hoisted: u64,
    pub lsra_rounds: u32,
    pub lsra_spills: u64,
    pub inlined_call_sites: u64,
}

impl CompileStats {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
