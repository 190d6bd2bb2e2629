use ai_core::BlackboardError;
use thiserror::Error;

use crate::handlers::HandlerError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GoapError {
    #[error("unknown atom '{0}'")]
    UnknownAtom(String),

    #[error("cannot register atom '{atom}': atom cap of {cap} reached")]
    AtomCapExceeded { atom: String, cap: usize },

    #[error("cannot register action '{action}': action cap of {cap} reached")]
    ActionCapExceeded { action: String, cap: usize },

    #[error("unknown entity type '{0}'")]
    UnknownType(String),

    #[error("entity #{0} has no GOAP state")]
    UnknownEntity(u64),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Blackboard(#[from] BlackboardError),

    #[error("no plan reaches the goal")]
    PlanNotFound,

    #[error("plan search hit the depth cap of {cap} actions")]
    PlanTruncated { cap: usize },
}

pub type Result<T> = std::result::Result<T, GoapError>;
