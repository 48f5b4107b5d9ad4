//! Active-realization masks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RunError, RunResult};

/// One flag per realization slot; `true` means the realization takes part
/// in the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<bool>", into = "Vec<bool>")]
pub struct ActiveMask(Vec<bool>);

impl ActiveMask {
    /// Create a mask from explicit flags. The mask must have at least one slot.
    pub fn new(flags: Vec<bool>) -> RunResult<Self> {
        if flags.is_empty() {
            return Err(RunError::InvalidConfiguration(
                "active realization mask must not be empty".to_string(),
            ));
        }
        Ok(Self(flags))
    }

    /// Mask with every one of `size` realizations active.
    ///
    /// A size of zero yields a single inactive slot so the mask is never empty.
    pub fn all(size: usize) -> Self {
        if size == 0 {
            return Self(vec![false]);
        }
        Self(vec![true; size])
    }

    /// Mask of `size` slots where only `indices` are active.
    pub fn from_indices(size: usize, indices: &[usize]) -> RunResult<Self> {
        let mut flags = vec![false; size];
        for &index in indices {
            let slot = flags.get_mut(index).ok_or_else(|| {
                RunError::InvalidConfiguration(format!(
                    "realization {} is outside the ensemble of size {}",
                    index, size
                ))
            })?;
            *slot = true;
        }
        Self::new(flags)
    }

    /// Number of realization slots, active or not.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_active(&self, realization: usize) -> bool {
        self.0.get(realization).copied().unwrap_or(false)
    }

    pub fn count_active(&self) -> usize {
        self.0.iter().filter(|active| **active).count()
    }

    /// Indices of the active realizations, in ascending order.
    pub fn active_indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(index, active)| active.then_some(index))
            .collect()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }
}

impl TryFrom<Vec<bool>> for ActiveMask {
    type Error = RunError;

    fn try_from(flags: Vec<bool>) -> Result<Self, Self::Error> {
        Self::new(flags)
    }
}

impl From<ActiveMask> for Vec<bool> {
    fn from(mask: ActiveMask) -> Self {
        mask.0
    }
}

impl fmt::Display for ActiveMask {
    /// Renders the active indices as compact ranges, e.g. `0-3,7`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indices = self.active_indices();
        let mut parts = Vec::new();
        let mut iter = indices.iter().copied().peekable();
        while let Some(start) = iter.next() {
            let mut end = start;
            while iter.peek() == Some(&(end + 1)) {
                end += 1;
                iter.next();
            }
            if start == end {
                parts.push(start.to_string());
            } else {
                parts.push(format!("{}-{}", start, end));
            }
        }
        f.write_str(&parts.join(","))
    }
}
