use cascade_schema::TerritoryId;
use thiserror::Error;

/// Failures raised while building or analysing a territory network.
///
/// Only [`CascadeError::InvalidSnapshot`] and [`CascadeError::EmptyNetwork`] are
/// returned to callers. The remaining variants are recovered locally and
/// surface as structured log fields.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CascadeError {
    #[error("invalid territory snapshot: {reason}")]
    InvalidSnapshot { reason: String },
    #[error("cascade analysis needs at least 2 territories, snapshot has {territories}")]
    EmptyNetwork { territories: usize },
    #[error("territory {0} is not part of the built network")]
    UnknownSourceTerritory(TerritoryId),
    #[error("full-fidelity centrality analysis unavailable, using degree approximation")]
    CentralityLibraryUnavailable,
    #[error("cascade analysis took {elapsed_ms:.3}ms against a {budget_ms}ms budget")]
    PerformanceBudgetExceeded { elapsed_ms: f64, budget_ms: u64 },
}

impl CascadeError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        CascadeError::InvalidSnapshot {
            reason: reason.into(),
        }
    }
}
