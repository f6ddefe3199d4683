use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::capabilities::CapabilityTable;
use super::worker::Worker;
use crate::error::{OrchestratorError, Result};

/// Point-in-time view of worker load; idle workers are omitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkloadReport {
    pub loads: BTreeMap<String, u32>,
    pub total_load: u32,
    pub registered_workers: usize,
    pub active_jobs: usize,
}

struct WorkerSlot {
    worker: Arc<dyn Worker>,
    load: u32,
}

impl WorkerSlot {
    fn has_capacity(&self) -> bool {
        self.worker
            .max_concurrent()
            .map_or(true, |max| self.load < max)
    }
}

#[derive(Default)]
struct RegistryState {
    /// Registration order doubles as the tie-breaker for equal loads
    slots: Vec<WorkerSlot>,
    index: HashMap<String, usize>,
    assignments: HashMap<String, Vec<usize>>,
}

/// Tracks workers and their load; every mutation happens under one registry-wide lock
pub struct AgentRegistry {
    capabilities: CapabilityTable,
    state: Mutex<RegistryState>,
}

impl AgentRegistry {
    pub fn new(capabilities: CapabilityTable) -> Self {
        Self {
            capabilities,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    pub fn register(&self, worker: Arc<dyn Worker>) -> Result<()> {
        let mut state = self.state.lock();
        let id = worker.id().to_string();
        if id.is_empty() {
            return Err(OrchestratorError::validation("worker id must not be empty"));
        }
        if state.index.contains_key(&id) {
            return Err(OrchestratorError::validation(format!(
                "worker '{id}' is already registered"
            )));
        }

        info!(worker_id = %id, capabilities = ?worker.capabilities(), "Worker registered");
        let position = state.slots.len();
        state.slots.push(WorkerSlot { worker, load: 0 });
        state.index.insert(id, position);
        Ok(())
    }

    /// Up to `n` qualifying workers, least loaded first, ties in registration order
    ///
    /// A worker qualifies when it satisfies every required tag and has spare
    /// capacity.
    pub fn select_least_loaded(&self, n: usize, required: &[String]) -> Result<Vec<Arc<dyn Worker>>> {
        let state = self.state.lock();
        self.select_in(&state, n, required)
    }

    fn select_in(&self, state: &RegistryState, n: usize, required: &[String]) -> Result<Vec<Arc<dyn Worker>>> {
        if state.slots.is_empty() {
            return Err(OrchestratorError::NotFound {
                kind: "worker",
                id: "any registered worker".to_string(),
            });
        }

        let capable: Vec<(usize, &WorkerSlot)> = state
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                required
                    .iter()
                    .all(|tag| self.capabilities.satisfies(slot.worker.capabilities(), tag))
            })
            .collect();

        if capable.is_empty() {
            return Err(OrchestratorError::NotFound {
                kind: "capability",
                id: required.join(","),
            });
        }

        let mut available: Vec<(u32, usize, &WorkerSlot)> = capable
            .into_iter()
            .filter(|(_, slot)| slot.has_capacity())
            .map(|(order, slot)| (slot.load, order, slot))
            .collect();

        if available.is_empty() {
            return Err(OrchestratorError::NotFound {
                kind: "available worker",
                id: if required.is_empty() {
                    "any".to_string()
                } else {
                    required.join(",")
                },
            });
        }

        available.sort_by_key(|(load, order, _)| (*load, *order));
        Ok(available
            .into_iter()
            .take(n)
            .map(|(_, _, slot)| Arc::clone(&slot.worker))
            .collect())
    }

    /// Record `job_id` as holding `worker_ids`, incrementing each load once
    ///
    /// Every id is checked before any load changes, so a failed call leaves
    /// the registry untouched.
    pub fn assign(&self, job_id: &str, worker_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        Self::assign_in(&mut state, job_id, worker_ids)
    }

    fn assign_in(state: &mut RegistryState, job_id: &str, worker_ids: &[String]) -> Result<()> {
        if state.assignments.contains_key(job_id) {
            return Err(OrchestratorError::validation(format!(
                "job '{job_id}' already holds workers"
            )));
        }

        let mut positions: Vec<usize> = Vec::with_capacity(worker_ids.len());
        for id in worker_ids {
            let position = state
                .index
                .get(id)
                .copied()
                .ok_or_else(|| OrchestratorError::NotFound {
                    kind: "worker",
                    id: id.clone(),
                })?;
            if positions.contains(&position) {
                continue;
            }
            if !state.slots[position].has_capacity() {
                return Err(OrchestratorError::validation(format!(
                    "worker '{id}' is at capacity"
                )));
            }
            positions.push(position);
        }

        for &position in &positions {
            state.slots[position].load += 1;
        }
        debug!(job_id, workers = positions.len(), "Workers assigned");
        state.assignments.insert(job_id.to_string(), positions);
        Ok(())
    }

    /// Undo the assignment for `job_id`; a second call is a no-op
    pub fn release(&self, job_id: &str) -> Vec<String> {
        let mut state = self.state.lock();
        let Some(positions) = state.assignments.remove(job_id) else {
            return Vec::new();
        };

        let mut released = Vec::with_capacity(positions.len());
        for position in positions {
            let slot = &mut state.slots[position];
            if slot.load == 0 {
                warn!(job_id, worker_id = slot.worker.id(), "Release on idle worker");
            }
            slot.load = slot.load.saturating_sub(1);
            released.push(slot.worker.id().to_string());
        }
        debug!(job_id, workers = released.len(), "Workers released");
        released
    }

    /// Assign and hand back a guard that releases on drop
    pub fn lease(&self, job_id: &str, worker_ids: &[String]) -> Result<AssignmentLease<'_>> {
        self.assign(job_id, worker_ids)?;
        Ok(self.lease_for(job_id))
    }

    /// Select up to `n` least-loaded workers and assign them to `job_id` under one lock
    ///
    /// Concurrent callers always see each other's assignments, so two jobs
    /// never pick from the same stale loads.
    pub fn lease_least_loaded(
        &self,
        job_id: &str,
        n: usize,
        required: &[String],
    ) -> Result<(Vec<Arc<dyn Worker>>, AssignmentLease<'_>)> {
        let mut state = self.state.lock();
        let selected = self.select_in(&state, n, required)?;
        let worker_ids: Vec<String> = selected.iter().map(|w| w.id().to_string()).collect();
        Self::assign_in(&mut state, job_id, &worker_ids)?;
        drop(state);
        Ok((selected, self.lease_for(job_id)))
    }

    fn lease_for(&self, job_id: &str) -> AssignmentLease<'_> {
        AssignmentLease {
            registry: self,
            job_id: job_id.to_string(),
            released: false,
        }
    }

    pub fn workload_report(&self) -> WorkloadReport {
        let state = self.state.lock();
        let loads: BTreeMap<String, u32> = state
            .slots
            .iter()
            .filter(|slot| slot.load > 0)
            .map(|slot| (slot.worker.id().to_string(), slot.load))
            .collect();

        WorkloadReport {
            total_load: loads.values().sum(),
            loads,
            registered_workers: state.slots.len(),
            active_jobs: state.assignments.len(),
        }
    }

    pub fn load_of(&self, worker_id: &str) -> Option<u32> {
        let state = self.state.lock();
        state.index.get(worker_id).map(|&position| state.slots[position].load)
    }

    pub fn assignments_of(&self, job_id: &str) -> Vec<String> {
        let state = self.state.lock();
        state
            .assignments
            .get(job_id)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&position| state.slots[position].worker.id().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn worker(&self, worker_id: &str) -> Option<Arc<dyn Worker>> {
        let state = self.state.lock();
        state
            .index
            .get(worker_id)
            .map(|&position| Arc::clone(&state.slots[position].worker))
    }

    pub fn workers(&self) -> Vec<Arc<dyn Worker>> {
        self.state
            .lock()
            .slots
            .iter()
            .map(|slot| Arc::clone(&slot.worker))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held while a job owns workers; releases exactly once
pub struct AssignmentLease<'a> {
    registry: &'a AgentRegistry,
    job_id: String,
    released: bool,
}

impl std::fmt::Debug for AssignmentLease<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentLease")
            .field("job_id", &self.job_id)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl AssignmentLease<'_> {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn release(mut self) -> Vec<String> {
        self.released = true;
        self.registry.release(&self.job_id)
    }
}

impl Drop for AssignmentLease<'_> {
    fn drop(&mut self) {
        if !self.released {
            let released = self.registry.release(&self.job_id);
            debug!(job_id = %self.job_id, workers = released.len(), "Lease dropped, workers released");
        }
    }
}
