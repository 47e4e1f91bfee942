//! Victim selection
//!
//! Candidates are filtered by an optional start-anchored name pattern and an
//! exclusion set, then one survivor is drawn uniformly with the caller's RNG.

use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use crate::error::{ChaosError, ChaosResult};

/// Constraints on which pods may be picked
#[derive(Debug, Clone, Default)]
pub struct VictimFilter {
    include: Option<Regex>,
    exclude: BTreeSet<String>,
}

impl VictimFilter {
    /// A filter that admits every name
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an optional pattern and a list of excluded names
    pub fn from_parts<I, S>(pattern: Option<&str>, exceptions: I) -> ChaosResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filter = match pattern {
            Some(pattern) => Self::new().include_pattern(pattern)?,
            None => Self::new(),
        };
        Ok(filter.exclude(exceptions))
    }

    /// Admit only names whose beginning matches `pattern`
    pub fn include_pattern(mut self, pattern: &str) -> ChaosResult<Self> {
        let anchored = format!("^(?:{})", pattern);
        let regex = Regex::new(&anchored).map_err(|source| ChaosError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.include = Some(regex);
        Ok(self)
    }

    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn is_eligible(&self, name: &str) -> bool {
        if self.exclude.contains(name) {
            return false;
        }
        self.include
            .as_ref()
            .map_or(true, |regex| regex.is_match(name))
    }
}

/// Pick one eligible `(name, namespace)` pair uniformly at random.
///
/// Returns `None` when nothing survives the filter.
pub fn select_random_pod<R>(
    candidates: &BTreeMap<String, String>,
    filter: &VictimFilter,
    rng: &mut R,
) -> Option<(String, String)>
where
    R: Rng + ?Sized,
{
    let eligible: Vec<(&String, &String)> = candidates
        .iter()
        .filter(|(name, _)| filter.is_eligible(name))
        .collect();

    eligible
        .choose(rng)
        .map(|(name, namespace)| ((*name).clone(), (*namespace).clone()))
}
