//! Deterministic domain rule table
//!
//! Each domain maps to an ordered list of task templates. A template carries
//! its base complexity and subtask hours; nothing here depends on runtime
//! state, so the same job id always yields the same tree.

use super::types::TaskType;

#[derive(Debug, Clone, Copy)]
pub struct SubtaskTemplate {
    pub title: &'static str,
    pub hours: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct TaskTemplate {
    pub title: &'static str,
    pub task_type: TaskType,
    pub base_complexity: u8,
    pub subtasks: &'static [SubtaskTemplate],
}

const fn sub(title: &'static str, hours: f64) -> SubtaskTemplate {
    SubtaskTemplate { title, hours }
}

const FRONTEND: &[TaskTemplate] = &[
    TaskTemplate {
        title: "UI Component Design",
        task_type: TaskType::Design,
        base_complexity: 2,
        subtasks: &[sub("Wireframes", 2.0), sub("Component API", 2.0)],
    },
    TaskTemplate {
        title: "State Management",
        task_type: TaskType::Implementation,
        base_complexity: 3,
        subtasks: &[sub("Store shape", 2.0), sub("Data fetching", 3.0), sub("Error states", 1.0)],
    },
    TaskTemplate {
        title: "Styling & Responsiveness",
        task_type: TaskType::Implementation,
        base_complexity: 2,
        subtasks: &[sub("Layout", 2.0), sub("Breakpoints", 2.0)],
    },
    TaskTemplate {
        title: "Accessibility Review",
        task_type: TaskType::Review,
        base_complexity: 2,
        subtasks: &[sub("Keyboard navigation", 1.0), sub("Screen reader pass", 1.0)],
    },
];

const BACKEND: &[TaskTemplate] = &[
    TaskTemplate {
        title: "API Design",
        task_type: TaskType::Design,
        base_complexity: 3,
        subtasks: &[sub("Endpoint contract", 2.0), sub("Error model", 1.0)],
    },
    TaskTemplate {
        title: "Data Model & Persistence",
        task_type: TaskType::Implementation,
        base_complexity: 3,
        subtasks: &[sub("Schema", 2.0), sub("Migrations", 2.0), sub("Repository layer", 3.0)],
    },
    TaskTemplate {
        title: "Business Logic",
        task_type: TaskType::Implementation,
        base_complexity: 3,
        subtasks: &[sub("Core rules", 4.0), sub("Validation", 2.0)],
    },
    TaskTemplate {
        title: "Integration Wiring",
        task_type: TaskType::Integration,
        base_complexity: 2,
        subtasks: &[sub("Service wiring", 2.0), sub("Configuration", 1.0)],
    },
];

const AI: &[TaskTemplate] = &[
    TaskTemplate {
        title: "Model Selection",
        task_type: TaskType::Research,
        base_complexity: 3,
        subtasks: &[sub("Candidate survey", 3.0), sub("Cost estimate", 1.0)],
    },
    TaskTemplate {
        title: "Prompt & Pipeline Engineering",
        task_type: TaskType::Implementation,
        base_complexity: 4,
        subtasks: &[sub("Prompt design", 3.0), sub("Pipeline", 4.0), sub("Fallbacks", 2.0)],
    },
    TaskTemplate {
        title: "Evaluation Harness",
        task_type: TaskType::Testing,
        base_complexity: 3,
        subtasks: &[sub("Golden set", 3.0), sub("Scoring", 2.0)],
    },
];

const SECURITY: &[TaskTemplate] = &[
    TaskTemplate {
        title: "Threat Modeling",
        task_type: TaskType::Analysis,
        base_complexity: 3,
        subtasks: &[sub("Asset inventory", 2.0), sub("Attack surface", 3.0)],
    },
    TaskTemplate {
        title: "Hardening",
        task_type: TaskType::Implementation,
        base_complexity: 4,
        subtasks: &[sub("Input validation", 3.0), sub("Secrets handling", 2.0), sub("Access control", 3.0)],
    },
    TaskTemplate {
        title: "Security Audit",
        task_type: TaskType::Review,
        base_complexity: 3,
        subtasks: &[sub("Dependency audit", 2.0), sub("Findings report", 2.0)],
    },
];

const GENERIC: &[TaskTemplate] = &[
    TaskTemplate {
        title: "Requirements Analysis",
        task_type: TaskType::Analysis,
        base_complexity: 2,
        subtasks: &[sub("Scope", 2.0), sub("Acceptance criteria", 1.0)],
    },
    TaskTemplate {
        title: "Implementation",
        task_type: TaskType::Implementation,
        base_complexity: 3,
        subtasks: &[sub("Core change", 4.0), sub("Documentation", 1.0)],
    },
];

/// Appended when a template produces no testing task
pub const VALIDATION_TASK_TITLE: &str = "Testing & Validation";

pub const VALIDATION_SUBTASKS: &[SubtaskTemplate] = &[
    sub("Unit tests", 2.0),
    sub("Integration tests", 2.0),
    sub("Acceptance check", 1.0),
];

/// Template for a domain; unknown domains get the generic template
pub fn template_for(domain: &str) -> &'static [TaskTemplate] {
    match domain {
        "frontend" => FRONTEND,
        "backend" => BACKEND,
        "ai" => AI,
        "security" => SECURITY,
        _ => GENERIC,
    }
}

pub fn known_domains() -> &'static [&'static str] {
    &["frontend", "backend", "ai", "security"]
}

/// One point per threshold crossed: segment at depth `d` adds 1 once it reaches `thresholds[d]`
pub fn complexity_bonus(segments: &[u32], thresholds: &[u32]) -> u8 {
    segments
        .iter()
        .zip(thresholds)
        .filter(|(segment, threshold)| segment >= threshold)
        .count() as u8
}

pub fn task_complexity(base: u8, bonus: u8, hint: Option<u8>) -> u8 {
    let computed = base.saturating_add(bonus).clamp(1, 5);
    match hint {
        Some(hint) => computed.max(hint.clamp(1, 5)),
        None => computed,
    }
}
