use crate::context::AppContext;
use crate::domain::changelog::{Boundary, ChangelogLine, LineTerminator, Since};
use crate::domain::hosting::{MergeRequest, Project};
use crate::error::{AppError, AppResult};
use crate::services::{HostingService, MergeRequestQuery, OrderBy, SortDirection};

#[derive(Debug, Clone)]
pub struct ChangelogRequest {
    pub project_id: u64,
    pub since: Option<Since>,
    pub terminator: LineTerminator,
    pub branch: Option<String>,
    /// Return nothing instead of a "no merged merge request" notice.
    pub quiet: bool,
}

/// Merged merge requests, one page at a time, ending at the first empty page.
pub struct MergeRequestPages<'a> {
    hosting: &'a dyn HostingService,
    project: &'a Project,
    query: MergeRequestQuery,
    exhausted: bool,
}

impl<'a> MergeRequestPages<'a> {
    pub fn new(
        hosting: &'a dyn HostingService,
        project: &'a Project,
        query: MergeRequestQuery,
    ) -> Self {
        Self {
            hosting,
            project,
            query,
            exhausted: false,
        }
    }

    pub async fn next_page(&mut self) -> AppResult<Option<Vec<MergeRequest>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .hosting
            .list_merge_requests(self.project, &self.query)
            .await?;
        if page.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        self.query.page += 1;
        Ok(Some(page))
    }
}

pub async fn build_changelog(ctx: &AppContext, request: ChangelogRequest) -> AppResult<String> {
    let hosting = ctx.hosting.as_ref();
    let project = hosting.resolve_project(request.project_id).await?;

    ensure_merged_requests_exist(hosting, &project, request.branch.as_deref()).await?;

    let releases = hosting.list_releases(&project).await?;
    let boundary = Boundary::resolve(request.since, releases.first());
    let terminator = &request.terminator;

    let mut log = boundary.header(&project.name, request.branch.as_deref(), terminator);

    let query = MergeRequestQuery::merged(request.branch.clone())
        .updated_after(boundary.instant)
        .ordered(OrderBy::UpdatedAt, SortDirection::Ascending)
        .per_page(ctx.config.per_page);
    let mut pages = MergeRequestPages::new(hosting, &project, query);

    let branch = request.branch.as_deref();
    let mut included = 0usize;
    while let Some(page) = pages.next_page().await? {
        // Listing is ordered by update time; merged_at decides membership.
        let qualifying = page.iter().filter(|mr| {
            boundary.admits(mr) && branch.is_none_or(|branch| mr.target_branch == branch)
        });
        for merge_request in qualifying {
            log.push_str(&ChangelogLine::from(merge_request).render(terminator));
            included += 1;
        }
    }

    if included == 0 {
        if request.quiet {
            return Ok(String::new());
        }
        log.push_str(&boundary.empty_trailer(terminator));
    }

    Ok(log)
}

async fn ensure_merged_requests_exist(
    hosting: &dyn HostingService,
    project: &Project,
    branch: Option<&str>,
) -> AppResult<()> {
    let latest = MergeRequestQuery::merged(branch.map(str::to_string))
        .ordered(OrderBy::MergedAt, SortDirection::Descending)
        .per_page(1);
    if hosting.list_merge_requests(project, &latest).await?.is_empty() {
        return Err(AppError::NoMergedRequests {
            project_id: project.id,
            project_name: project.name.clone(),
            branch: branch.map(str::to_string),
        });
    }
    Ok(())
}
