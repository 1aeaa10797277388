use crate::context::AppContext;
use crate::domain::changelog::{LineTerminator, Since};
use crate::error::AppResult;
use crate::workflow::changelog::{ChangelogRequest, build_changelog};

#[derive(Debug, Clone)]
pub struct NotesCommandArgs {
    pub project_id: u64,
    pub since: Option<Since>,
    pub branch: Option<String>,
    pub html: bool,
    pub quiet: bool,
}

pub async fn run(ctx: &AppContext, args: NotesCommandArgs) -> AppResult<String> {
    let terminator = if args.html {
        LineTerminator::html()
    } else {
        LineTerminator::plain()
    };

    build_changelog(
        ctx,
        ChangelogRequest {
            project_id: args.project_id,
            since: args.since,
            terminator,
            branch: args.branch.filter(|branch| !branch.trim().is_empty()),
            quiet: args.quiet,
        },
    )
    .await
}
