use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{App, HttpResponse, HttpServer, web};
use serde::Deserialize;
use tracing::{error, info};

use crate::cmd::notes::{self, NotesCommandArgs};
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::infra::gitlab::GitLabClient;

const FORM_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>GitLab release notes</title></head>
  <body>
    <h1>GitLab release notes</h1>
    <form method="post" action="/">
      <label>Project id <input type="number" name="project_id" required></label><br>
      <label>GitLab URL <input type="url" name="url" placeholder="https://gitlab.com"></label><br>
      <label>Private token <input type="password" name="private_token"></label><br>
      <label>Target branch <input type="text" name="branch"></label><br>
      <input type="submit" value="Generate">
    </form>
  </body>
</html>
"#;

const UNEXPECTED_ERROR: &str = "Unexpected error while generating release notes, see server logs.";

pub async fn run(config: AppConfig) -> AppResult<()> {
    let address = (config.host.clone(), config.port);
    info!(host = %config.host, port = config.port, "starting release notes form server");

    let state = web::Data::new(config);
    HttpServer::new(move || App::new().app_data(state.clone()).configure(configure_routes))
        .bind(address)?
        .run()
        .await?;

    Ok(())
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(show_form))
        .route("/", web::post().to(release_notes));
}

/// Fields of the submitted form. The token lives only for this request.
#[derive(Deserialize)]
pub struct ReleaseNotesForm {
    project_id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    private_token: String,
    #[serde(default)]
    branch: String,
}

async fn show_form() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(FORM_PAGE)
}

async fn release_notes(
    config: web::Data<AppConfig>,
    form: web::Form<ReleaseNotesForm>,
) -> HttpResponse {
    let form = form.into_inner();
    let Ok(project_id) = form.project_id.trim().parse::<u64>() else {
        return message(StatusCode::BAD_REQUEST, "Project id must be a positive integer.");
    };

    let request_config = AppConfig {
        gitlab_url: non_empty(form.url).unwrap_or_else(|| config.gitlab_url.clone()),
        private_token: non_empty(form.private_token),
        ..config.get_ref().clone()
    };
    let args = NotesCommandArgs {
        project_id,
        since: None,
        branch: non_empty(form.branch),
        html: true,
        quiet: false,
    };

    match generate(request_config, args).await {
        Ok(changelog) => HttpResponse::Ok()
            .content_type(ContentType::html())
            .body(changelog),
        Err(err @ AppError::NoMergedRequests { .. }) => message(StatusCode::OK, err.to_string()),
        Err(err @ AppError::NotFound(_)) => message(StatusCode::NOT_FOUND, err.to_string()),
        Err(err) => {
            error!(project_id, error = %err, "release notes generation failed");
            message(StatusCode::BAD_GATEWAY, UNEXPECTED_ERROR)
        }
    }
}

async fn generate(config: AppConfig, args: NotesCommandArgs) -> AppResult<String> {
    let hosting = GitLabClient::from_config(&config)?;
    let ctx = AppContext::new(config, Arc::new(hosting));
    notes::run(&ctx, args).await
}

fn message(status: StatusCode, body: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status)
        .content_type(ContentType::plaintext())
        .body(body.into())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
