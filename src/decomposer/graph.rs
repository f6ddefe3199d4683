use std::collections::{BTreeSet, HashMap};

use crate::error::{OrchestratorError, Result};

/// Directed acyclic graph of id -> dependency ids, kept in insertion order
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    dependencies: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: &str) -> Result<()> {
        if self.index.contains_key(id) {
            return Err(OrchestratorError::validation(format!("duplicate id '{id}'")));
        }
        self.index.insert(id.to_string(), self.ids.len());
        self.ids.push(id.to_string());
        self.dependencies.push(Vec::new());
        Ok(())
    }

    /// Record that `id` cannot start before `depends_on` finishes
    pub fn add_edge(&mut self, id: &str, depends_on: &str) -> Result<()> {
        if id == depends_on {
            return Err(OrchestratorError::validation(format!("'{id}' depends on itself")));
        }
        let node = self.position(id)?;
        let dependency = self.position(depends_on)?;
        if !self.dependencies[node].contains(&dependency) {
            self.dependencies[node].push(dependency);
        }
        Ok(())
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| OrchestratorError::NotFound {
                kind: "dependency",
                id: id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&node| {
                self.dependencies[node]
                    .iter()
                    .map(|&dep| self.ids[dep].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_cycle(&self) -> bool {
        let mut visited = vec![0u8; self.ids.len()];
        (0..self.ids.len()).any(|node| self.dfs_cycle(node, &mut visited))
    }

    fn dfs_cycle(&self, node: usize, visited: &mut [u8]) -> bool {
        match visited[node] {
            1 => return true,  // back edge
            2 => return false, // finished
            _ => {}
        }
        visited[node] = 1;
        for &dep in &self.dependencies[node] {
            if self.dfs_cycle(dep, visited) {
                return true;
            }
        }
        visited[node] = 2;
        false
    }

    /// Kahn's algorithm; among ready nodes the earliest inserted goes first
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut remaining: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut dependents = vec![Vec::new(); self.ids.len()];
        for (node, deps) in self.dependencies.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(node);
            }
        }

        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| node)
            .collect();
        let mut order = Vec::with_capacity(self.ids.len());

        while let Some(node) = ready.pop_first() {
            order.push(self.ids[node].clone());
            for &dependent in &dependents[node] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != self.ids.len() {
            let stuck = remaining
                .iter()
                .position(|count| *count > 0)
                .map(|node| self.ids[node].clone())
                .unwrap_or_default();
            return Err(OrchestratorError::validation(format!(
                "dependency cycle involving '{stuck}'"
            )));
        }
        Ok(order)
    }

    /// Level of each id: 0 without dependencies, else 1 + the deepest dependency
    pub fn levels(&self) -> Result<HashMap<String, usize>> {
        let order = self.topological_order()?;
        let mut levels: HashMap<String, usize> = HashMap::with_capacity(order.len());
        for id in order {
            let level = self
                .dependencies_of(&id)
                .iter()
                .filter_map(|dep| levels.get(*dep))
                .map(|level| level + 1)
                .max()
                .unwrap_or(0);
            levels.insert(id, level);
        }
        Ok(levels)
    }
}
