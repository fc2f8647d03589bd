use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while crawling.
///
/// Only `Persistence` (and startup problems such as a bad roster) stop a run.
/// The per-entity variants are caught by the crawler, logged, and the entity
/// is left out of the graph so the next run retries it.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("failed to load {url} after {attempts} attempts: {last_error}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("could not find the correct pid for {first} {last}")]
    ResolutionFailure { first: String, last: String },

    #[error("table #{table_id} never appeared on the page for {entity}")]
    MissingRelationshipTable { entity: String, table_id: String },

    #[error("graph store {} is unreadable: {reason}", .path.display())]
    PersistenceCorruption { path: PathBuf, reason: String },

    #[error("interrupted while working on {0}")]
    Interrupted(String),

    #[error("cannot split {0:?} into a given name and a surname")]
    InvalidName(String),

    #[error("failed to write graph store {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize graph store: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to load roster {}: {reason}", .path.display())]
    Roster { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, CrawlError>;
