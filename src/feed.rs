//! Feed-based post loader: reconstructs the post set from the public RSS
//! feed plus each item's rendered page. Used when no local posts
//! directory is configured.
use chrono::{DateTime, Utc};
use reqwest::Client;
use rss::Channel;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::warn;

use crate::model::Post;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to fetch feed {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to parse feed {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: rss::Error,
    },
    #[error("feed {0} contained no posts")]
    Empty(String),
}

/// Fetch the feed and reconstruct every post it lists.
///
/// Per-item page fetches degrade gracefully: a failed or empty page falls
/// back to the feed description as content, logged but non-fatal. A feed
/// that yields zero posts is a hard error.
pub async fn load_posts_from_feed(http: &Client, feed_url: &str) -> Result<Vec<Post>, FeedError> {
    let bytes = http
        .get(feed_url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| FeedError::Fetch {
            url: feed_url.to_string(),
            source,
        })?
        .bytes()
        .await
        .map_err(|source| FeedError::Fetch {
            url: feed_url.to_string(),
            source,
        })?;

    let channel = Channel::read_from(&bytes[..]).map_err(|source| FeedError::Parse {
        url: feed_url.to_string(),
        source,
    })?;

    let mut posts = Vec::new();
    for item in channel.items() {
        let Some(title) = item.title().map(str::trim).filter(|t| !t.is_empty()) else {
            warn!("skipping feed item without a title");
            continue;
        };
        let link = item.link().map(str::trim).unwrap_or_default();
        let description = item.description().unwrap_or_default().trim().to_string();
        let published_at = item
            .pub_date()
            .and_then(|raw| DateTime::parse_from_rfc2822(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let content = match fetch_item_content(http, link).await {
            Some(html) if !html.trim().is_empty() => html,
            _ => description.clone(),
        };

        posts.push(Post {
            title: title.to_string(),
            published_at,
            summary: description,
            image: None,
            slug: slug_from_link(link, title),
            content,
            url: (!link.is_empty()).then(|| link.to_string()),
        });
    }

    if posts.is_empty() {
        return Err(FeedError::Empty(feed_url.to_string()));
    }
    tracing::debug!(count = posts.len(), feed = feed_url, "loaded posts from feed");
    Ok(posts)
}

async fn fetch_item_content(http: &Client, link: &str) -> Option<String> {
    if link.is_empty() {
        return None;
    }
    let page = http
        .get(link)
        .send()
        .await
        .and_then(|r| r.error_for_status());
    match page {
        Ok(response) => match response.text().await {
            Ok(html) => Some(extract_main_content(&html)),
            Err(err) => {
                warn!(link, error = %err, "failed to read post page, using feed description");
                None
            }
        },
        Err(err) => {
            warn!(link, error = %err, "failed to fetch post page, using feed description");
            None
        }
    }
}

/// First `<article>` region, otherwise the `<main>` region, otherwise empty.
pub fn extract_main_content(html: &str) -> String {
    let doc = Html::parse_document(html);
    for selector in ["article", "main"] {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        if let Some(node) = doc.select(&sel).next() {
            return node.inner_html();
        }
    }
    String::new()
}

/// Slug of a post is the last path segment of its link; falls back to a
/// dashed lowercase title when the link has no usable path.
pub fn slug_from_link(link: &str, title: &str) -> String {
    let from_link = url::Url::parse(link).ok().and_then(|url| {
        url.path_segments()?
            .filter(|segment| !segment.is_empty())
            .next_back()
            .map(str::to_string)
    });
    from_link.unwrap_or_else(|| title.trim().to_lowercase().replace(char::is_whitespace, "-"))
}
