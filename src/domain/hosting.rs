use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub name: String,
    pub released_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub title: String,
    pub author: String,
    pub merged_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub target_branch: String,
}

impl MergeRequest {
    /// Instant the request was merged. Records without `merged_at` fall back to
    /// their last update.
    pub fn merged_instant(&self) -> DateTime<Utc> {
        self.merged_at.unwrap_or(self.updated_at)
    }
}
