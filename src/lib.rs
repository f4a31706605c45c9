//! ATLAS - Adaptive Telemetry & Live Analytics System.
//!
//! A lightweight host-telemetry daemon for single-node deployments: a
//! configurable set of metric collectors feeds a per-cycle orchestration
//! loop, which persists the latest snapshot atomically and keeps a
//! bounded-retention history. A small key-authenticated read API and a
//! terminal dashboard serve the persisted data.
//!
//! # Architecture
//!
//! - **Collectors** ([`collector`]): one function per metric section, each
//!   isolating its own failures into the section payload
//! - **Orchestrator** ([`orchestrator`]): sequential per-cycle collection
//!   with interval cadence and unconditional persistence retry
//! - **Snapshot cache** ([`cache`]): atomic latest-snapshot JSON file
//! - **History** ([`history`]): SQLite log with retention pruning on append
//! - **API** ([`api`]): four read endpoints over two interchangeable
//!   transport engines
//! - **Dashboard** ([`dashboard`]): terminal rendering over the cache
//!
//! The collector and API run as separate processes communicating only
//! through the cache file and the history database.

pub mod api;
pub mod cache;
pub mod collector;
pub mod config;
pub mod dashboard;
pub mod history;
pub mod orchestrator;
pub mod snapshot;

pub use cache::SnapshotCache;
pub use config::{ApiEngine, AtlasConfig, BaseDirs};
pub use history::{HistoryRecord, HistoryStore};
pub use orchestrator::Orchestrator;
pub use snapshot::{Section, SectionData, Snapshot};
