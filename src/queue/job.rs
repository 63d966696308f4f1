use std::fmt;
use std::str::FromStr;

use rand::RngExt;
use serde::{Deserialize, Serialize};

/// Largest identifier handed out by [`RandomIdSource`]
pub const MAX_JOB_ID: u64 = 1_000_000_000;

/// Opaque job identifier. Its decimal form is the status store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn store_key(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(JobId)
    }
}

/// One factorization request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub number: i64,
}

impl Job {
    pub fn new(id: JobId, number: i64) -> Self {
        Self { id, number }
    }
}

/// Source of candidate job identifiers.
///
/// Candidates need not be unique; the submitter reserves each one in the
/// status store and asks again on collision.
pub trait JobIdSource: Send + Sync {
    fn next_id(&self) -> JobId;
}

/// Uniform random ids in `0..=MAX_JOB_ID`
#[derive(Debug, Clone, Copy)]
pub struct RandomIdSource {
    max: u64,
}

impl RandomIdSource {
    pub fn new(max: u64) -> Self {
        Self { max }
    }
}

impl Default for RandomIdSource {
    fn default() -> Self {
        Self::new(MAX_JOB_ID)
    }
}

impl JobIdSource for RandomIdSource {
    fn next_id(&self) -> JobId {
        JobId(rand::rng().random_range(0..=self.max))
    }
}
