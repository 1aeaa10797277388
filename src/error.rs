use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(
        "There is no merged merge request for project {project_id} {project_name}{}",
        branch_suffix(.branch)
    )]
    NoMergedRequests {
        project_id: u64,
        project_name: String,
        branch: Option<String>,
    },
    #[error("hosting API responded with {status}: {body}")]
    HostingApi { status: u16, body: String },
    #[error("hosting API error: {0}")]
    Transport(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn branch_suffix(branch: &Option<String>) -> String {
    branch
        .as_deref()
        .map(|branch| format!(" on branch '{branch}'"))
        .unwrap_or_default()
}

pub type AppResult<T> = Result<T, AppError>;
