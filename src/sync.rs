//! Remote sync engine: diffs local posts against Kit broadcasts and
//! creates broadcasts for the posts Kit has not seen yet.
use std::collections::HashSet;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::email;
use crate::kit::model::Broadcast;
use crate::kit::{BroadcastDraft, KitError, KitService};
use crate::model::{Post, SyncOutcome, SyncResult, SyncStatus};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("post \"{0}\" not found")]
    SlugNotFound(String),
    #[error(transparent)]
    Kit(#[from] KitError),
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Restrict the run to a single slug.
    pub slug: Option<String>,
    /// Resync candidates even when a matching broadcast exists. Creates
    /// duplicate broadcasts by design.
    pub force: bool,
}

/// Partitioned result of one sync run.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub synced: Vec<SyncResult>,
    pub failed: Vec<SyncResult>,
    #[serde(rename = "allSynced")]
    pub all_synced: Vec<SyncStatus>,
}

/// Run one sync pass over `posts`.
///
/// Fetches the remote broadcast list, joins it to the local posts on
/// trimmed title equality, then fans out one create per unsynced post and
/// waits for every one to settle. One post's failure never aborts its
/// siblings; every work-set item gets a result. A final re-list produces
/// the authoritative `all_synced` snapshot.
pub async fn run_sync(
    kit: &dyn KitService,
    posts: &[Post],
    options: &SyncOptions,
    base_url: &str,
) -> Result<SyncReport, SyncError> {
    let broadcasts = kit.list_broadcasts().await?;
    let statuses = join_statuses(posts, &broadcasts);
    let synced_slugs: HashSet<&str> = statuses.iter().map(|s| s.slug.as_str()).collect();

    let candidates: Vec<&Post> = match &options.slug {
        Some(slug) => {
            let matched: Vec<&Post> = posts.iter().filter(|p| &p.slug == slug).collect();
            if matched.is_empty() {
                return Err(SyncError::SlugNotFound(slug.clone()));
            }
            matched
        }
        None => posts.iter().collect(),
    };

    let work: Vec<&Post> = if options.force {
        candidates
    } else {
        candidates
            .into_iter()
            .filter(|post| !synced_slugs.contains(post.slug.as_str()))
            .collect()
    };

    if work.is_empty() {
        info!("no new posts to sync");
        return Ok(SyncReport {
            synced: Vec::new(),
            failed: Vec::new(),
            all_synced: statuses,
        });
    }

    info!(count = work.len(), force = options.force, "syncing posts to Kit");
    let results = join_all(
        work.iter()
            .map(|post| sync_one(kit, post, options.force, base_url)),
    )
    .await;

    // Authoritative final snapshot; concurrent external writes may have
    // landed while ours were in flight. A failed re-list falls back to
    // the pre-run snapshot rather than failing a run that already wrote.
    let all_synced = match kit.list_broadcasts().await {
        Ok(final_broadcasts) => join_statuses(posts, &final_broadcasts),
        Err(err) => {
            warn!(error = %err, "failed to refresh sync status after run");
            statuses
        }
    };

    let (synced, failed): (Vec<_>, Vec<_>) = results.into_iter().partition(SyncResult::is_success);
    Ok(SyncReport {
        synced,
        failed,
        all_synced,
    })
}

async fn sync_one(kit: &dyn KitService, post: &Post, force: bool, base_url: &str) -> SyncResult {
    // The initial snapshot may be stale by the time this post is reached;
    // re-check unless the caller asked to resync regardless.
    if !force {
        match kit.list_broadcasts().await {
            Ok(broadcasts) => {
                if broadcasts.iter().any(|b| titles_match(&b.subject, &post.title)) {
                    return SyncResult {
                        slug: post.slug.clone(),
                        title: post.title.clone(),
                        outcome: SyncOutcome::AlreadySynced,
                    };
                }
            }
            Err(err) => {
                warn!(slug = %post.slug, error = %err, "sync re-check failed, proceeding to create");
            }
        }
    }

    let transformed = email::transform(&post.content, base_url);
    let thumbnail_url = post.image.clone().or(transformed.image);
    let draft = BroadcastDraft {
        subject: post.title.clone(),
        content: transformed.html,
        summary: post.summary.clone(),
        published_at: post.published_at,
        thumbnail_url,
    };

    match kit.create_broadcast(&draft).await {
        Ok(broadcast) => {
            info!(slug = %post.slug, kit_id = broadcast.id, "created broadcast");
            SyncResult {
                slug: post.slug.clone(),
                title: post.title.clone(),
                outcome: SyncOutcome::Created {
                    kit_id: broadcast.id,
                },
            }
        }
        Err(err) => {
            error!(slug = %post.slug, title = %post.title, error = %err, "failed to create broadcast");
            SyncResult {
                slug: post.slug.clone(),
                title: post.title.clone(),
                outcome: SyncOutcome::Failed {
                    error: err.to_string(),
                },
            }
        }
    }
}

/// Join posts to broadcasts on trimmed, case-sensitive title equality.
/// Sorted by slug for stable response bodies.
pub fn join_statuses(posts: &[Post], broadcasts: &[Broadcast]) -> Vec<SyncStatus> {
    let mut statuses: Vec<SyncStatus> = posts
        .iter()
        .filter_map(|post| {
            broadcasts
                .iter()
                .find(|b| titles_match(&b.subject, &post.title))
                .map(|b| SyncStatus {
                    slug: post.slug.clone(),
                    kit_id: b.id,
                    synced_at: b.created_at.clone(),
                })
        })
        .collect();
    statuses.sort_by(|a, b| a.slug.cmp(&b.slug));
    statuses
}

fn titles_match(subject: &str, title: &str) -> bool {
    subject.trim() == title.trim()
}
