use thiserror::Error;

/// The taxonomy of things that can go wrong in the core. Every public entry
/// point that can fail returns `Result<T, CoreError>` rather than panicking;
/// the one exception is a genuinely unreachable invariant break, which goes
/// through `bug!` below so a debug build still aborts loudly.
#[derive(Error, Debug)]
pub enum CoreError {
    /// An edge, GVN, or dominator invariant was found broken — either by the
    /// verifier, or by a pessimistic-value computation going non-monotone.
    #[error("invariant violation in {context}: {detail}")]
    InvariantViolation { context: String, detail: String },

    /// The target has no pattern for an opcode/shape it was asked to select.
    #[error("{target} has no pattern for {opcode} in function {function}")]
    UnsupportedPattern {
        target: String,
        opcode: String,
        function: String,
    },

    /// LSRA could not satisfy a non-spillable register constraint even after
    /// the configured number of spill/restart rounds.
    #[error("register allocation failed for {vreg} in function {function}: {detail}")]
    RegisterAllocationFailed {
        function: String,
        vreg: String,
        detail: String,
    },

    /// The verifier (`ir::verify::verify`) rejected the graph.
    #[error("verifier failed: {0}")]
    VerifierFailed(String),
}

impl CoreError {
    pub(crate) fn invariant(context: impl Into<String>, detail: impl Into<String>) -> Self {
        CoreError::InvariantViolation {
            context: context.into(),
            detail: detail.into(),
        }
    }
}

/// Logs at `error` and, in debug builds only, aborts via `unreachable!` so a
/// developer build fails loudly at the exact point of the break rather than
/// propagating a classified error several frames up. Release builds skip the
/// abort and just return through the call site's `Result`.
macro_rules! bug {
    ($context:expr, $($arg:tt)*) => {{
        let detail = format!($($arg)*);
        tracing::error!(target: "tb_core::invariant", "{}: {}", $context, detail);
        #[cfg(debug_assertions)]
        {
            unreachable!("{}: {}", $context, detail);
        }
        #[cfg(not(debug_assertions))]
        {
            $crate::error::CoreError::invariant($context, detail)
        }
    }};
}

/// Unconditionally fatal: used for target-unsupported patterns where there
/// is no sensible way to continue compiling the function.
macro_rules! fatal {
    ($err:expr) => {{
        tracing::error!(target: "tb_core::fatal", "{}", $err);
        return Err($err);
    }};
}

pub(crate) use bug;
pub(crate) use fatal;
