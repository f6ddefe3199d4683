use std::collections::HashMap;

use crate::config::{CapabilityConfig, TaskRoleConfig};
use crate::decomposer::TaskType;

/// Role used for task types with no entry in the role table
pub const GENERIC_ROLE: &str = "generalist";

/// Domain -> roles and task type -> role lookups, read once at startup
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    domains: HashMap<String, Vec<String>>,
    task_roles: HashMap<String, String>,
}

impl CapabilityTable {
    pub fn new(capabilities: &CapabilityConfig, task_roles: &TaskRoleConfig) -> Self {
        Self {
            domains: capabilities
                .0
                .iter()
                .map(|(domain, roles)| (domain.to_ascii_lowercase(), roles.clone()))
                .collect(),
            task_roles: task_roles.0.clone(),
        }
    }

    pub fn from_defaults() -> Self {
        Self::new(&CapabilityConfig::default(), &TaskRoleConfig::default())
    }

    pub fn roles_for_domain(&self, domain: &str) -> &[String] {
        self.domains
            .get(domain)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn role_for_task(&self, task_type: TaskType) -> &str {
        self.task_roles
            .get(task_type.as_str())
            .map(String::as_str)
            .unwrap_or(GENERIC_ROLE)
    }

    pub fn is_domain(&self, tag: &str) -> bool {
        self.domains.contains_key(tag)
    }

    pub fn domains(&self) -> Vec<&str> {
        let mut domains: Vec<&str> = self.domains.keys().map(String::as_str).collect();
        domains.sort_unstable();
        domains
    }

    /// A worker satisfies a tag when it carries the tag itself or, for a
    /// domain tag, any role of that domain.
    pub fn satisfies(&self, worker_capabilities: &[String], required: &str) -> bool {
        if worker_capabilities.iter().any(|c| c == required) {
            return true;
        }
        self.roles_for_domain(required)
            .iter()
            .any(|role| worker_capabilities.contains(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lookups() {
        let table = CapabilityTable::from_defaults();
        assert_eq!(table.roles_for_domain("frontend")[0], "frontend-developer");
        assert!(table.roles_for_domain("payments").is_empty());
        assert_eq!(table.role_for_task(TaskType::Review), "code-reviewer");
        assert_eq!(table.domains(), vec!["ai", "backend", "frontend", "security"]);
    }

    #[test]
    fn test_unmapped_task_type_falls_back() {
        let table = CapabilityTable::new(
            &CapabilityConfig::default(),
            &TaskRoleConfig(HashMap::new()),
        );
        assert_eq!(table.role_for_task(TaskType::Design), GENERIC_ROLE);
    }

    #[test]
    fn test_domain_tags_match_domain_roles() {
        let table = CapabilityTable::from_defaults();
        let worker = vec!["ml-engineer".to_string()];
        assert!(table.satisfies(&worker, "ai"));
        assert!(table.satisfies(&worker, "ml-engineer"));
        assert!(!table.satisfies(&worker, "security"));
        assert!(!table.satisfies(&worker, "architect"));
    }
}
