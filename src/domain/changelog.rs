use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::domain::hosting::{MergeRequest, Release};
use crate::error::AppError;

/// Explicit start of the changelog window. Displays exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Since {
    instant: DateTime<Utc>,
    text: String,
}

impl Since {
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }
}

impl FromStr for Since {
    type Err = AppError;

    /// Accepts `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let text = value.trim();
        let instant = match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            Ok(date) => date.and_time(NaiveTime::MIN).and_utc(),
            Err(_) => DateTime::parse_from_rfc3339(text)
                .map(|timestamp| timestamp.with_timezone(&Utc))
                .map_err(|_| {
                    AppError::Configuration(format!(
                        "'{text}' is neither a YYYY-MM-DD date nor an RFC 3339 timestamp"
                    ))
                })?,
        };
        Ok(Self {
            instant,
            text: text.to_string(),
        })
    }
}

impl fmt::Display for Since {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryOrigin {
    Since(Since),
    Release { name: String },
    Beginning,
}

/// Cutoff instant: merge requests merged at or after it are new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    pub instant: DateTime<Utc>,
    pub origin: BoundaryOrigin,
}

impl Boundary {
    /// An explicit `since` wins over the latest release; with neither the
    /// window starts at the Unix epoch.
    pub fn resolve(since: Option<Since>, latest_release: Option<&Release>) -> Self {
        match (since, latest_release) {
            (Some(since), _) => Self {
                instant: since.instant(),
                origin: BoundaryOrigin::Since(since),
            },
            (None, Some(release)) => Self {
                instant: release.released_at,
                origin: BoundaryOrigin::Release {
                    name: release.name.clone(),
                },
            },
            (None, None) => Self {
                instant: DateTime::<Utc>::UNIX_EPOCH,
                origin: BoundaryOrigin::Beginning,
            },
        }
    }

    pub fn admits(&self, merge_request: &MergeRequest) -> bool {
        merge_request.merged_instant() >= self.instant
    }

    pub fn header(
        &self,
        project_name: &str,
        branch: Option<&str>,
        terminator: &LineTerminator,
    ) -> String {
        let project_name = terminator.escape(project_name);
        let branch = branch_clause(branch, terminator);
        let end = terminator.as_str();
        match &self.origin {
            BoundaryOrigin::Since(since) => {
                let since = terminator.escape(&since.text);
                format!("Changelog of {project_name}{branch} since {since}:{end}")
            }
            BoundaryOrigin::Release { name } => {
                let name = terminator.escape(name);
                format!("Changelog since release {name} of {project_name}{branch}:{end}")
            }
            BoundaryOrigin::Beginning => format!("Changelog of {project_name}{branch}:{end}"),
        }
    }

    pub fn empty_trailer(&self, terminator: &LineTerminator) -> String {
        let end = terminator.as_str();
        match &self.origin {
            BoundaryOrigin::Since(since) => {
                let since = terminator.escape(&since.text);
                format!("There is no merged merge request since {since}{end}")
            }
            BoundaryOrigin::Release { name } => {
                let name = terminator.escape(name);
                format!("There is no merged merge request after release {name}{end}")
            }
            BoundaryOrigin::Beginning => format!("There is no merged merge request{end}"),
        }
    }
}

fn branch_clause(branch: Option<&str>, terminator: &LineTerminator) -> String {
    branch
        .map(|branch| format!(" for branch '{}'", terminator.escape(branch)))
        .unwrap_or_default()
}

/// String appended to every rendered line. The HTML terminator also escapes
/// the text it follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTerminator {
    value: String,
    escape_html: bool,
}

impl LineTerminator {
    pub const PLAIN: &'static str = "\n";
    pub const HTML: &'static str = "  <br>";

    /// Arbitrary terminator; text is written verbatim.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            escape_html: false,
        }
    }

    pub fn plain() -> Self {
        Self::new(Self::PLAIN)
    }

    pub fn html() -> Self {
        Self {
            value: Self::HTML.to_string(),
            escape_html: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn escape<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.escape_html {
            html_escape::encode_text(text)
        } else {
            Cow::Borrowed(text)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogLine {
    pub title: String,
    pub author: String,
}

impl ChangelogLine {
    pub fn render(&self, terminator: &LineTerminator) -> String {
        format!(
            " * {} (@{}){}",
            terminator.escape(&self.title),
            terminator.escape(&self.author),
            terminator.as_str()
        )
    }
}

impl From<&MergeRequest> for ChangelogLine {
    fn from(merge_request: &MergeRequest) -> Self {
        Self {
            title: merge_request.title.clone(),
            author: merge_request.author.clone(),
        }
    }
}
