use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use super::consensus::ConsensusResult;
use super::context::HookContext;
use super::types::HookType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookOutcome {
    Succeeded,
    Failed,
    /// No command is bound to the lifecycle point
    NotConfigured,
}

/// One recorded hook run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookInvocation {
    pub id: Uuid,
    pub hook_type: HookType,
    pub context: HookContext,
    pub command: Option<String>,
    pub outcome: HookOutcome,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub consensus: Option<ConsensusResult>,
    pub finished_at: DateTime<Utc>,
}

impl HookInvocation {
    pub fn succeeded(&self) -> bool {
        self.outcome == HookOutcome::Succeeded
    }

    /// A failed run is never validated; gated runs also need consensus.
    pub fn validated(&self) -> bool {
        self.succeeded() && self.consensus.as_ref().map_or(true, |c| c.validated)
    }
}

/// Bounded ring buffer of hook invocations; the oldest entry is evicted first.
#[derive(Debug)]
pub struct HookHistory {
    entries: VecDeque<HookInvocation>,
    capacity: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HookStats {
    pub total: usize,
    pub failed: usize,
    pub gated: usize,
    pub validated: usize,
}

impl HookHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, invocation: HookInvocation) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(invocation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn snapshot(&self) -> Vec<HookInvocation> {
        self.entries.iter().cloned().collect()
    }

    pub fn for_type(&self, hook_type: HookType) -> Vec<HookInvocation> {
        self.entries
            .iter()
            .filter(|inv| inv.hook_type == hook_type)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> HookStats {
        self.entries.iter().fold(HookStats::default(), |mut stats, inv| {
            stats.total += 1;
            if inv.outcome == HookOutcome::Failed {
                stats.failed += 1;
            }
            if inv.consensus.is_some() {
                stats.gated += 1;
                if inv.validated() {
                    stats.validated += 1;
                }
            }
            stats
        })
    }
}
