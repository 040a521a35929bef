//! Journal→Kit sync service.
//!
//! Syncs local journal posts into Kit email broadcasts and handles
//! newsletter subscriptions with referrer/UTM attribution. Three pieces
//! form the sync pipeline: a content loader ([`posts`] for local
//! front-matter files, [`feed`] for the public RSS feed), the
//! email-HTML transformer ([`email`]) and the remote sync engine
//! ([`sync`]). The subscriber attribution client lives in [`kit`] and is
//! invoked independently from the subscribe endpoint.
//!
//! State lives entirely in Kit: the engine recomputes the synced set on
//! every run by joining post titles against broadcast subjects.

pub mod config;
pub mod email;
pub mod feed;
pub mod kit;
pub mod model;
pub mod posts;
pub mod server;
pub mod sync;

pub use config::Config;
pub use server::{router, AppState};
