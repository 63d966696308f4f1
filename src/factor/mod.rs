//! Prime factorization routine
//!
//! The scheduler only depends on the [`Factorizer`] trait: a pure,
//! deterministic function that may take arbitrarily long. [`TrialDivision`]
//! is the default implementation.
//!
//! Conventions:
//! - `n <= 1` has no prime factors (`[]`)
//! - a prime `p` factors as `[p]`
//! - otherwise factors are ascending, with multiplicity, and multiply to `n`

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactorError {
    #[error("factorization failed: {0}")]
    Internal(String),
}

/// Computes the ordered prime factors of an integer.
///
/// Implementations run on the blocking thread pool and must be safe to call
/// from many threads at once.
pub trait Factorizer: Send + Sync {
    fn factor(&self, n: i64) -> Result<Vec<u64>, FactorError>;
}

/// Naive trial division
#[derive(Debug, Clone, Copy, Default)]
pub struct TrialDivision;

impl Factorizer for TrialDivision {
    fn factor(&self, n: i64) -> Result<Vec<u64>, FactorError> {
        if n <= 1 {
            return Ok(Vec::new());
        }

        let mut remaining = n as u64;
        let mut factors = Vec::new();
        let mut divisor: u64 = 2;

        // divisor <= remaining / divisor avoids overflowing divisor * divisor
        while divisor <= remaining / divisor {
            while remaining % divisor == 0 {
                factors.push(divisor);
                remaining /= divisor;
            }
            divisor += if divisor == 2 { 1 } else { 2 };
        }

        if remaining > 1 {
            factors.push(remaining);
        }

        Ok(factors)
    }
}

/// Joins factors with `,` and no padding: `[2, 2, 3]` -> `"2,2,3"`, `[]` -> `""`
pub fn format_factors(factors: &[u64]) -> String {
    factors
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
