//! Core library for the `climate` CLI.
//!
//! This crate defines:
//! - Month name to date range resolution
//! - The archive provider abstraction and its Open-Meteo implementation
//! - A persistent response cache with an explicit expiry policy
//! - Daily series aggregation and the batch enrichment driver
//!
//! It is used by `climate-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod config;
pub mod enrich;
pub mod error;
pub mod model;
pub mod month;
pub mod provider;
pub mod summary;

pub use cache::{ExpiryPolicy, ResponseCache};
pub use config::{ArchiveConfig, CacheConfig, Config};
pub use enrich::{Enricher, FailurePolicy, RunReport};
pub use error::EnrichError;
pub use model::{ArchiveRequest, DailySeries, DailyVariable, Point, RenderedSummary, WeatherSummary};
pub use month::{Month, MonthRange, resolve_month};
pub use provider::{ArchiveProvider, openmeteo::OpenMeteoArchive, provider_from_config};

pub type Result<T> = std::result::Result<T, EnrichError>;
