use omero_client::{Dataset, GroupId, Project};

/// Accumulates the human-readable report printed after an import run.
#[derive(Debug, Default)]
pub struct Summary {
    lines: Vec<String>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_changed(&mut self, group: GroupId) {
        self.lines.push(format!("== Group {group} =="));
    }

    pub fn project(&mut self, project: &Project) {
        self.lines
            .push(format!("Project: {} (ID={})", project.name.0, project.id));
    }

    pub fn dataset(&mut self, dataset: &Dataset) {
        self.lines
            .push(format!("  - Dataset: {} (ID={})", dataset.name.0, dataset.id));
    }

    pub fn row_done(&mut self) {
        self.lines.push(String::new());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn build(&self) -> String {
        self.lines.join("\n")
    }
}
