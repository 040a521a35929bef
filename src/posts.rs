//! Local journal post loader: front-matter files under `POSTS_DIR`.
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::model::Post;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("missing front-matter block in {0}")]
    MissingFrontMatter(String),
    #[error("missing required field '{field}' in {path}")]
    MissingField { field: &'static str, path: String },
    #[error("invalid publishedAt '{value}' in {path}")]
    InvalidDate { value: String, path: String },
}

static FRONT_MATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\s*(.*?)\s*---").expect("valid front-matter regex"));
static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\A['"](.*)['"]\z"#).expect("valid quote regex"));

/// Load every `.md`/`.mdx` post in `dir`. Any malformed file fails the
/// whole load: a post set with silently missing entries would make the
/// sync engine treat those posts as deleted.
pub fn load_posts(dir: &Path) -> Result<Vec<Post>, PostError> {
    let entries = std::fs::read_dir(dir).map_err(|source| PostError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut posts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PostError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str());
        if !matches!(ext, Some("md") | Some("mdx")) {
            continue;
        }
        posts.push(load_post(&path)?);
    }
    posts.sort_by(|a, b| a.slug.cmp(&b.slug));
    tracing::debug!(count = posts.len(), dir = %dir.display(), "loaded local posts");
    Ok(posts)
}

/// Read and parse a single post file. The slug is the file stem.
pub fn load_post(path: &Path) -> Result<Post, PostError> {
    let raw = std::fs::read_to_string(path).map_err(|source| PostError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let slug = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    parse_post(&raw, &slug, &path.display().to_string())
}

fn parse_post(raw: &str, slug: &str, path: &str) -> Result<Post, PostError> {
    let captures = FRONT_MATTER
        .captures(raw)
        .ok_or_else(|| PostError::MissingFrontMatter(path.to_string()))?;
    let block = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let content = raw[captures.get(0).map(|m| m.end()).unwrap_or(0)..]
        .trim()
        .to_string();

    let mut title = None;
    let mut published_at_raw = None;
    let mut summary = None;
    let mut image = None;

    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = unquote(value.trim());
        match key.trim() {
            "title" => title = Some(value),
            "publishedAt" => published_at_raw = Some(value),
            "summary" => summary = Some(value),
            "image" => image = Some(value),
            _ => {}
        }
    }

    let title = title
        .filter(|t| !t.is_empty())
        .ok_or(PostError::MissingField {
            field: "title",
            path: path.to_string(),
        })?;
    let published_at_raw =
        published_at_raw
            .filter(|d| !d.is_empty())
            .ok_or(PostError::MissingField {
                field: "publishedAt",
                path: path.to_string(),
            })?;
    let published_at = parse_date(&published_at_raw).ok_or_else(|| PostError::InvalidDate {
        value: published_at_raw.clone(),
        path: path.to_string(),
    })?;

    Ok(Post {
        title,
        published_at,
        summary: summary.unwrap_or_default(),
        image: image.filter(|i| !i.is_empty()),
        slug: slug.to_string(),
        content,
        url: None,
    })
}

fn unquote(value: &str) -> String {
    match QUOTED.captures(value) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(value).to_string(),
        None => value.to_string(),
    }
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
