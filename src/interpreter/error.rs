//! Fatal interpreter errors
//!
//! Rules that cannot decide never fail the run; they leave diagnostics.
//! Only a runaway fixpoint or unreadable input ends it.

use thiserror::Error;

use crate::config::ConfigError;
use crate::mei::MeiError;

#[derive(Debug, Error)]
pub enum InterpretError {
    /// The beat-dependent pass kept making progress past its sweep cap
    #[error("beat-dependent pass hit its cap after {sweeps} sweeps with {remaining} events unresolved")]
    FixpointCapExceeded { sweeps: usize, remaining: usize },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("MEI error: {0}")]
    Mei(#[from] MeiError),

    #[error("export failed: {0}")]
    Export(#[from] serde_json::Error),
}
