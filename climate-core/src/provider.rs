use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    Config, Result,
    cache::ResponseCache,
    model::{ArchiveRequest, DailySeries},
    provider::openmeteo::OpenMeteoArchive,
};

pub mod openmeteo;

/// Source of historical daily weather series.
#[async_trait]
pub trait ArchiveProvider: Send + Sync + Debug {
    async fn daily_series(&self, request: &ArchiveRequest) -> Result<DailySeries>;
}

/// Construct the archive provider described by `config`.
///
/// The response cache is opened here unless disabled in config or by the
/// caller through `use_cache`.
pub fn provider_from_config(config: &Config, use_cache: bool) -> Result<OpenMeteoArchive> {
    let cache = if use_cache && config.cache.enabled {
        Some(ResponseCache::open(&config.cache.path, config.cache.expiry)?)
    } else {
        tracing::info!("response cache disabled");
        None
    };

    OpenMeteoArchive::new(&config.archive, cache)
}
