//! # plexbadge
//!
//! Puts a rating badge on Plex Web show, season and episode pages, linking
//! to the matching page on Serializd.
//!
//! The badge itself is trivial. The work is in deciding which show, season
//! and episode the page is about while the single-page app keeps changing
//! underneath, and in doing so without duplicate requests, stale badges or
//! unbounded caches.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐   ┌────────────┐
//! │ Navigation │──▶│   Session    │──▶│   Identity   │──▶│  Metadata  │
//! │  Monitor   │   │ run + retry  │   │   Resolver   │   │ (Plex XML) │
//! └────────────┘   └──────┬───────┘   └──────────────┘   └────────────┘
//!                         │
//!          ┌──────────────┼───────────────┐
//!          ▼              ▼               ▼
//!    ┌──────────┐   ┌───────────┐   ┌──────────┐
//!    │  Rating  │   │ TTL caches│   │ Injector │
//!    │ Resolver │   │ (KvStore) │   │  (Page)  │
//!    └──────────┘   └───────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! plexbadge init                                   # create the cache database
//! plexbadge resolve --title "Dark" --year 2017     # one-shot lookup
//! plexbadge url --show 70523 --season 2 --season-id 96291 --episode 5
//! plexbadge cache stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`page`] | Host page access and context extraction |
//! | [`metadata`] | Plex metadata parsing and the per-type decision table |
//! | [`discovery`] | Server connection lookup |
//! | [`proxy`] | Fetch proxy contract and HTTP implementation |
//! | [`rating`] | Rating page parsing and lookup |
//! | [`links`] | Provider URL construction |
//! | [`store`] | Key-scoped persistent store |
//! | [`sqlite_store`] | SQLite-backed store |
//! | [`cache`] | TTL caches over the store |
//! | [`identity`] | Metadata key to catalog ids |
//! | [`run`] | Run numbering and staleness checks |
//! | [`retry`] | Bounded retry scheduling |
//! | [`navigation`] | Debounced navigation detection |
//! | [`inject`] | Badge placement |
//! | [`session`] | The resolution pipeline |

pub mod cache;
pub mod cache_cmd;
pub mod config;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod inject;
pub mod links;
pub mod metadata;
pub mod models;
pub mod navigation;
pub mod page;
pub mod proxy;
pub mod rating;
pub mod resolve_cmd;
pub mod retry;
pub mod run;
pub mod session;
pub mod sqlite_store;
pub mod store;
