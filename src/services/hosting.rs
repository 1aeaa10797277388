use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::hosting::{MergeRequest, Project, Release};
use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    UpdatedAt,
    MergedAt,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::UpdatedAt => "updated_at",
            OrderBy::MergedAt => "merged_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// One page request against the listing of merged merge requests. Pages start at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequestQuery {
    pub updated_after: Option<DateTime<Utc>>,
    pub target_branch: Option<String>,
    pub order_by: Option<OrderBy>,
    pub sort: Option<SortDirection>,
    pub page: u32,
    /// `None` leaves the page size to the hosting platform.
    pub per_page: Option<u32>,
}

impl MergeRequestQuery {
    pub fn merged(target_branch: Option<String>) -> Self {
        Self {
            updated_after: None,
            target_branch,
            order_by: None,
            sort: None,
            page: 1,
            per_page: None,
        }
    }

    pub fn updated_after(mut self, instant: DateTime<Utc>) -> Self {
        self.updated_after = Some(instant);
        self
    }

    pub fn ordered(mut self, order_by: OrderBy, sort: SortDirection) -> Self {
        self.order_by = Some(order_by);
        self.sort = Some(sort);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }
}

#[async_trait]
pub trait HostingService: Send + Sync {
    async fn resolve_project(&self, project_id: u64) -> AppResult<Project>;
    /// Releases ordered newest first.
    async fn list_releases(&self, project: &Project) -> AppResult<Vec<Release>>;
    /// A single page of merged merge requests; an empty page means the
    /// listing is exhausted.
    async fn list_merge_requests(
        &self,
        project: &Project,
        query: &MergeRequestQuery,
    ) -> AppResult<Vec<MergeRequest>>;
}
