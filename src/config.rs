//! Per-graph settings.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DagConfig {
    /// Check after every evaluation traversal that each node was visited.
    pub verify_traversals: bool,
    /// Log the evaluation statistics when the graph is dropped.
    pub report_on_drop: bool,
    /// Name attached to log events of this graph.
    pub label: Option<String>,
}

impl Default for DagConfig {
    fn default() -> Self {
        Self { verify_traversals: true, report_on_drop: true, label: None }
    }
}

impl DagConfig {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub(crate) fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("fao_dag")
    }
}
