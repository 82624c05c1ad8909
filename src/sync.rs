use std::sync::Arc;

use tracing::{info, warn};

use crate::db::OddsStore;
use crate::error::Result;
use crate::fetcher::PoolFetcher;
use crate::mapper::{decode_pool, map_fragment};
use crate::types::{Pool, SyncCounts};

/// Runs one fetch → map → persist pass over every pool.
///
/// Pools are processed sequentially in `Pool::ALL` order. The first fetch or
/// persistence error aborts the cycle: counters are dropped and the ledger is
/// left as it was. Matches already written before the abort stay written;
/// each upsert is idempotent and the next successful cycle overwrites them.
pub struct SyncService {
    fetcher: Arc<dyn PoolFetcher>,
    store: OddsStore,
}

impl SyncService {
    pub fn new(fetcher: Arc<dyn PoolFetcher>, store: OddsStore) -> Self {
        Self { fetcher, store }
    }

    pub async fn run_once(&self) -> Result<SyncCounts> {
        let mut counts = SyncCounts::default();

        for pool in Pool::ALL {
            let raw = self.fetcher.fetch(pool.code()).await?;
            let Some(fragments) = decode_pool(&raw) else {
                info!(%pool, "Pool empty or unsuccessful, skipping");
                continue;
            };

            let mut pool_matches = 0u64;
            let mut pool_odds = 0u64;
            for fragment in &fragments {
                let Some(records) = map_fragment(pool, fragment) else {
                    warn!(%pool, "Skipping fragment without matchId");
                    continue;
                };
                let written = self.store.persist(&records).await?;
                if records.info.is_some() {
                    pool_matches += 1;
                }
                pool_odds += written as u64;
            }

            counts.matches += pool_matches;
            counts.odds += pool_odds;
            info!(
                %pool,
                fragments = fragments.len(),
                matches = pool_matches,
                odds = pool_odds,
                "Pool synced",
            );
        }

        self.store.record_sync(counts).await?;
        Ok(counts)
    }
}
