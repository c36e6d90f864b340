//! ```text
//! seed URL ─┬─► sitemap probe ──► frontier
//!           └─► robots opt-in
//!
//! frontier ──► fetch ──► change detection ──► extraction ──► pipeline
//!                │            │                                 │
//!                │            └─ UNCHANGED: touch + links only  │
//!                └─ thin page: dynamic-render fallback          ▼
//!                                              chunk ─► embed ─► vector store
//! ```
//!
//! Two modes share the storage logic: the initial scrape walks everything,
//! the incremental updater consults the tenant's URL-tracking rows first
//! and re-embeds only new or modified pages.

pub mod canonical;
pub mod cli;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod manual;
pub mod pipeline;
pub mod robots;
pub mod sitemap;
pub mod tracker;

pub use crawler::{CrawlConfig, CrawlStats, Crawler};
pub use error::HarvestError;
