use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::OrchestratorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One job per batch
    Sequential,
    /// Every ready job in one batch
    Parallel,
    /// Ready jobs grouped by complexity, sized against the worker budget
    #[default]
    Smart,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Sequential => write!(f, "sequential"),
            Strategy::Parallel => write!(f, "parallel"),
            Strategy::Smart => write!(f, "smart"),
        }
    }
}

impl FromStr for Strategy {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Strategy::Sequential),
            "parallel" => Ok(Strategy::Parallel),
            "smart" => Ok(Strategy::Smart),
            other => Err(OrchestratorError::validation(format!(
                "unknown strategy '{other}' (expected sequential, parallel or smart)"
            ))),
        }
    }
}

/// What the planner needs to know about one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanItem {
    /// Position in the submitted list
    pub index: usize,
    pub complexity: u8,
    /// 0 without dependencies, else 1 + the deepest dependency level
    pub level: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub index: usize,
    /// Submission indexes of the jobs in this batch
    pub jobs: Vec<usize>,
}

/// Group jobs into batches that run one after another
///
/// `items` must already be in dependency order. Batches never mix levels, so
/// every dependency of a job finishes in an earlier batch.
pub fn plan_batches(
    strategy: Strategy,
    items: &[PlanItem],
    worker_budget: usize,
    max_smart_batch_size: usize,
) -> Vec<Batch> {
    let groups: Vec<Vec<usize>> = match strategy {
        Strategy::Sequential => items.iter().map(|item| vec![item.index]).collect(),
        Strategy::Parallel => by_level(items)
            .into_values()
            .map(|level| level.iter().map(|item| item.index).collect())
            .collect(),
        Strategy::Smart => by_level(items)
            .into_values()
            .flat_map(|level| smart_groups(level, worker_budget, max_smart_batch_size))
            .collect(),
    };

    groups
        .into_iter()
        .filter(|jobs| !jobs.is_empty())
        .enumerate()
        .map(|(index, jobs)| Batch { index, jobs })
        .collect()
}

fn by_level(items: &[PlanItem]) -> BTreeMap<usize, Vec<PlanItem>> {
    let mut levels: BTreeMap<usize, Vec<PlanItem>> = BTreeMap::new();
    for item in items {
        levels.entry(item.level).or_default().push(*item);
    }
    for level in levels.values_mut() {
        level.sort_by_key(|item| item.index);
    }
    levels
}

/// Jobs a sub-batch of complexity `c` may hold: `min(max, budget / (c * 2))`, at least one
pub fn smart_batch_size(complexity: u8, worker_budget: usize, max_smart_batch_size: usize) -> usize {
    let per_job = (complexity.max(1) as usize) * 2;
    max_smart_batch_size.min(worker_budget / per_job).max(1)
}

fn smart_groups(level: Vec<PlanItem>, worker_budget: usize, max_size: usize) -> Vec<Vec<usize>> {
    let mut by_complexity: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for item in level {
        by_complexity.entry(item.complexity).or_default().push(item.index);
    }

    by_complexity
        .into_iter()
        .flat_map(|(complexity, jobs)| {
            let size = smart_batch_size(complexity, worker_budget, max_size);
            jobs.chunks(size).map(<[usize]>::to_vec).collect::<Vec<_>>()
        })
        .collect()
}
