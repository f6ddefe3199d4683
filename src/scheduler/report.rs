use serde::Serialize;

use super::batch::Strategy;
use super::job::JobStatus;
use super::operation::OperationKind;
use crate::agents::WorkloadReport;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub job_id: String,
    pub status: JobStatus,
    /// Short reason for failed and skipped jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub workers: Vec<String>,
    pub complexity: u8,
    pub duration_ms: u64,
    pub batch_index: usize,
}

impl JobResult {
    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}

/// Outcome of one scheduler run; every submitted job appears exactly once
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerReport {
    pub correlation_id: String,
    pub strategy: Strategy,
    pub operation: OperationKind,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub batches: usize,
    /// In submission order
    pub results: Vec<JobResult>,
    /// Worker load once every job has released its workers
    pub workload: WorkloadReport,
    pub duration_ms: u64,
}

impl SchedulerReport {
    pub fn new(
        correlation_id: String,
        strategy: Strategy,
        operation: OperationKind,
        batches: usize,
        results: Vec<JobResult>,
        workload: WorkloadReport,
        duration_ms: u64,
    ) -> Self {
        let count = |status: JobStatus| results.iter().filter(|r| r.status == status).count();
        Self {
            correlation_id,
            strategy,
            operation,
            total: results.len(),
            succeeded: count(JobStatus::Succeeded),
            failed: count(JobStatus::Failed),
            skipped: count(JobStatus::Skipped),
            batches,
            results,
            workload,
            duration_ms,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }

    pub fn result(&self, job_id: &str) -> Option<&JobResult> {
        self.results.iter().find(|r| r.job_id == job_id)
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobResult> {
        self.results.iter().filter(|r| r.status == JobStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(job_id: &str, status: JobStatus) -> JobResult {
        JobResult {
            job_id: job_id.into(),
            status,
            error: None,
            error_kind: None,
            summary: None,
            workers: Vec::new(),
            complexity: 1,
            duration_ms: 0,
            batch_index: 0,
        }
    }

    #[test]
    fn test_counts() {
        let report = SchedulerReport::new(
            "corr".into(),
            Strategy::Parallel,
            OperationKind::Start,
            1,
            vec![
                result("a.1", JobStatus::Succeeded),
                result("a.2", JobStatus::Failed),
                result("a.3", JobStatus::Skipped),
                result("a.4", JobStatus::Succeeded),
            ],
            WorkloadReport::default(),
            12,
        );
        assert_eq!(report.total, 4);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert!(!report.all_succeeded());
        assert_eq!(report.failures().count(), 1);
        assert!(report.result("a.3").is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy"], "parallel");
        assert_eq!(json["results"][1]["status"], "failed");
        assert!(json["results"][0].get("error").is_none());
    }
}
