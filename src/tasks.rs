use chrono::Utc;
use uuid::Uuid;

use crate::types::{TaskRecord, TaskStatus};

/// Stores background task records for listing and inspection. Task execution
/// is out of scope: nothing here transitions a task's status.
#[derive(Default)]
pub struct TaskStore {
    tasks: Vec<TaskRecord>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, kind: &str, description: &str) -> TaskRecord {
        let record = TaskRecord {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            description: description.to_string(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
        };
        self.tasks.push(record.clone());
        record
    }

    pub fn list(&self) -> Vec<TaskRecord> {
        self.tasks.clone()
    }

    pub fn get(&self, id: &str) -> Option<TaskRecord> {
        self.tasks.iter().find(|t| t.id == id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_inspect() {
        let mut store = TaskStore::new();
        let created = store.create("export", "export search history");
        assert_eq!(created.status, TaskStatus::Pending);

        let fetched = store.get(&created.id).unwrap();
        assert_eq!(fetched.kind, "export");
        assert_eq!(store.list().len(), 1);
        assert!(store.get("missing").is_none());
    }
}
