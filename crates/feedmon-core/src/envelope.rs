//! Read outcomes and the envelopes built from them.

use crate::state::{ConfigState, TransmissionState};
use chrono::{DateTime, Utc};

/// Result of one poll tick.
///
/// Either a value or an error, never both; `observed_at` is when the read
/// finished (or failed).
#[derive(Debug, Clone)]
pub struct ReadOutcome<T, E> {
    pub result: Result<T, E>,
    pub observed_at: DateTime<Utc>,
}

impl<T, E> ReadOutcome<T, E> {
    pub fn new(result: Result<T, E>) -> Self {
        Self {
            result,
            observed_at: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Config and oracle set snapshot, ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEnvelope {
    pub state: ConfigState,
    pub observed_at: DateTime<Utc>,
}

impl StateEnvelope {
    pub fn new(state: ConfigState, observed_at: DateTime<Utc>) -> Self {
        Self { state, observed_at }
    }

    pub fn block_height(&self) -> u64 {
        self.state.block_height
    }
}

/// Latest answer snapshot, ready for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmissionEnvelope {
    pub transmission: TransmissionState,
    pub observed_at: DateTime<Utc>,
}

impl TransmissionEnvelope {
    pub fn new(transmission: TransmissionState, observed_at: DateTime<Utc>) -> Self {
        Self {
            transmission,
            observed_at,
        }
    }

    pub fn block_height(&self) -> u64 {
        self.transmission.block_height
    }
}

/// Normalized, immutable snapshot of on-chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    State(StateEnvelope),
    Transmission(TransmissionEnvelope),
}

impl Envelope {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::State(_) => "state",
            Self::Transmission(_) => "transmission",
        }
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        match self {
            Self::State(env) => env.observed_at,
            Self::Transmission(env) => env.observed_at,
        }
    }
}

impl From<StateEnvelope> for Envelope {
    fn from(env: StateEnvelope) -> Self {
        Self::State(env)
    }
}

impl From<TransmissionEnvelope> for Envelope {
    fn from(env: TransmissionEnvelope) -> Self {
        Self::Transmission(env)
    }
}
