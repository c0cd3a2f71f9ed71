//! Error types for ingestion and the entity store

use thiserror::Error;

/// Failures while pulling and normalizing upstream game events.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Network failure or timeout; the whole cycle is skipped
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Upstream answered with a non-2xx status
    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// One event could not be normalized; its siblings are unaffected
    #[error("malformed event {event_id}: {reason}")]
    MalformedEvent { event_id: String, reason: String },

    /// Team code not present locally
    #[error("unknown team code '{0}'")]
    UnknownTeam(String),
}

impl IngestError {
    pub fn malformed(event_id: &str, reason: impl Into<String>) -> Self {
        IngestError::MalformedEvent {
            event_id: event_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Rejected writes and failed lookups in the entity store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("a game needs two different teams, got '{0}' twice")]
    SameTeam(String),

    #[error("scores must be non-negative, got {home}-{away}")]
    NegativeScore { home: i32, away: i32 },

    /// Another row already holds this pairing at this kickoff
    #[error("{away} @ {home} is already scheduled at {date}")]
    DuplicateFixture { home: String, away: String, date: String },

    #[error("team not found: {0}")]
    TeamNotFound(String),
}
