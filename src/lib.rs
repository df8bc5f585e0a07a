//! # Trendline
//!
//! A daily design-trend signal pipeline with a durable run lifecycle.
//!
//! Trendline collects items from crawler output, removes duplicates,
//! cleans and embeds them, scores externally computed clusters, hands the
//! result to a topic analyzer, and aggregates raw keyword samples into
//! labelled daily trends. Every execution is a run whose `running →
//! success | failed` transition is recorded exactly once in SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────────┐   ┌──────────┐
//! │ Collectors  │──▶│  Orchestrator + Stages   │──▶│  SQLite  │
//! │ FS / custom │   │ dedup·clean·embed·score  │   │ runs +   │
//! └─────────────┘   └────────────┬─────────────┘   │ artifacts│
//!                                │                 └──────────┘
//!                     ┌──────────┴─────────┐
//!                     ▼                    ▼
//!               ┌──────────┐        ┌────────────┐
//!               │   CLI    │        │ trend JSON │
//!               │trendline │        │  reports   │
//!               └──────────┘        └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! trendline init                          # create database
//! trendline run                           # one daily run
//! trendline runs --limit 5                # recent run history
//! trendline trends --input data/raw/google_trends
//! trendline quality --input clusters.json --breakdown
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`orchestrator`] | Run lifecycle and stage sequencing |
//! | [`stages`] | Payload, stage trait, built-in stages |
//! | [`traits`] | Collaborator capabilities |
//! | [`collector_fs`] | Filesystem JSON collector |
//! | [`trend_feed`] | Trend sample input and report output |
//! | [`embedding`] | OpenAI embedding backend |
//! | [`sqlite_store`] | SQLite run and artifact storage |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod collector_fs;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod language;
pub mod migrate;
pub mod orchestrator;
pub mod quality_cmd;
pub mod runs;
pub mod sqlite_store;
pub mod stages;
pub mod topics;
pub mod traits;
pub mod trend_feed;
pub mod trends_cmd;
