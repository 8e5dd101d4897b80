//! Fills the user directory from on-chain pack buyers: every wallet that
//! received a pack NFT is looked up on rip.fun and stored with its account.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use metrics::counter;
use serde::Serialize;
use sqlx::PgPool;

use crate::chain::AddressSource;
use crate::db::{sync_repo, user_repo};
use crate::models::{SyncStatus, UserUpsert};
use crate::ripfun::{AddressUser, RipFunClient};

pub const BLOCKCHAIN_USERS: &str = "blockchain_users";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub addresses_processed: usize,
    pub users_found: usize,
    pub users_updated: usize,
    pub last_block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressMatch {
    pub address: String,
    pub user: AddressUser,
}

/// Look `addresses` up on rip.fun in batches of `batch_size`, pausing
/// `delay` between batches. Addresses without an account, or whose lookup
/// fails, are left out.
pub async fn lookup_addresses(
    rip: &RipFunClient,
    addresses: &[String],
    batch_size: usize,
    delay: Duration,
) -> Vec<AddressMatch> {
    let batches: Vec<&[String]> = addresses.chunks(batch_size.max(1)).collect();
    let mut found = Vec::new();

    for (i, batch) in batches.iter().enumerate() {
        tracing::debug!(batch = i + 1, of = batches.len(), "looking up addresses");

        let users = join_all(batch.iter().map(|address| rip.user_by_address(address))).await;
        for (address, user) in batch.iter().zip(users) {
            match user {
                Ok(Some(user)) if user.identity().is_some() => found.push(AddressMatch {
                    address: address.clone(),
                    user,
                }),
                Ok(_) => {}
                Err(e) => tracing::warn!(address = %address, error = %e, "address lookup failed"),
            }
        }

        if i + 1 < batches.len() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    found
}

pub struct UserSyncService {
    pool: PgPool,
    rip: RipFunClient,
    source: Arc<dyn AddressSource>,
    batch_size: usize,
    batch_delay: Duration,
}

impl UserSyncService {
    pub fn new(
        pool: PgPool,
        rip: RipFunClient,
        source: Arc<dyn AddressSource>,
        batch_size: usize,
        batch_delay: Duration,
    ) -> Self {
        Self {
            pool,
            rip,
            source,
            batch_size,
            batch_delay,
        }
    }

    pub async fn status(&self) -> anyhow::Result<Option<SyncStatus>> {
        sync_repo::get_status(&self.pool, BLOCKCHAIN_USERS).await
    }

    /// Claim the job and run it in the background, resuming from the last
    /// synced block unless `from_block` is given. Returns `false` when a
    /// run is already in progress.
    pub async fn start(self: &Arc<Self>, from_block: Option<u64>) -> anyhow::Result<bool> {
        let Some(claimed) = sync_repo::try_mark_running(&self.pool, BLOCKCHAIN_USERS).await? else {
            return Ok(false);
        };
        let from_block = from_block.or_else(|| {
            claimed
                .last_block_number
                .and_then(|b| u64::try_from(b).ok())
        });

        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.run(from_block).await {
                tracing::error!(error = %e, "User sync failed");
            }
        });
        Ok(true)
    }

    async fn run(&self, from_block: Option<u64>) -> anyhow::Result<SyncReport> {
        match self.sync(from_block).await {
            Ok(report) => {
                let last_block = i64::try_from(report.last_block_number)?;
                sync_repo::mark_completed(&self.pool, BLOCKCHAIN_USERS, last_block).await?;
                counter!("user_sync_runs_total", "outcome" => "ok").increment(1);
                tracing::info!(
                    addresses = report.addresses_processed,
                    found = report.users_found,
                    updated = report.users_updated,
                    last_block = report.last_block_number,
                    "User sync completed"
                );
                Ok(report)
            }
            Err(e) => {
                counter!("user_sync_runs_total", "outcome" => "error").increment(1);
                if let Err(mark) = sync_repo::mark_failed(&self.pool, BLOCKCHAIN_USERS, &e.to_string()).await {
                    tracing::warn!(error = %mark, "failed to record sync error");
                }
                Err(e)
            }
        }
    }

    async fn sync(&self, from_block: Option<u64>) -> anyhow::Result<SyncReport> {
        tracing::info!(from_block = ?from_block, "User sync started");

        let latest_block = self.source.latest_block().await?;
        let addresses = self.source.buyer_addresses(from_block).await?;
        let matches = lookup_addresses(&self.rip, &addresses, self.batch_size, self.batch_delay).await;

        let block = i64::try_from(latest_block).ok();
        let mut users_updated = 0;
        for found in &matches {
            match self.store(found, block).await {
                Ok(()) => users_updated += 1,
                Err(e) => tracing::warn!(address = %found.address, error = %e, "failed to store synced user"),
            }
        }
        counter!("user_sync_users_updated_total").increment(users_updated as u64);

        Ok(SyncReport {
            addresses_processed: addresses.len(),
            users_found: matches.len(),
            users_updated,
            last_block_number: latest_block,
        })
    }

    async fn store(&self, found: &AddressMatch, block: Option<i64>) -> anyhow::Result<()> {
        let Some((id, username)) = found.user.identity() else {
            return Ok(());
        };
        let user = &found.user;

        user_repo::upsert_user(
            &self.pool,
            &UserUpsert {
                id,
                username,
                smart_wallet_address: non_empty(&user.smart_wallet_address),
                owner_wallet_address: non_empty(&user.owner_wallet_address),
                avatar: non_empty(&user.avatar),
                banner: non_empty(&user.banner),
                user_type: non_empty(&user.user_type),
            },
        )
        .await?;
        user_repo::upsert_address(&self.pool, &found.address, id, block).await
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
