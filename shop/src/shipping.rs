use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::cache::TtlCache;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Province {
    pub code: String,
    pub name: String,
}

/// Province lookup proxy over the upstream address service, cached with a
/// TTL so the (rarely changing) list is not re-fetched per request and
/// concurrent cold-cache requests make one upstream call.
pub struct ProvinceDirectory {
    client: reqwest::Client,
    url: String,
    cache: TtlCache<Vec<Province>>,
}

impl ProvinceDirectory {
    pub fn new(url: String, ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            cache: TtlCache::new(ttl),
        }
    }

    pub async fn provinces(&self) -> Result<Vec<Province>> {
        self.cache
            .get_or_refresh(|| async {
                debug!(url = %self.url, "refreshing province directory");
                let provinces = self
                    .client
                    .get(&self.url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<Vec<Province>>()
                    .await?;
                Ok(provinces)
            })
            .await
    }
}
