//! On-chain sources of rip.fun buyer addresses.

pub mod alchemy;

use async_trait::async_trait;

pub use alchemy::AlchemyClient;

#[async_trait]
pub trait AddressSource: Send + Sync {
    async fn latest_block(&self) -> anyhow::Result<u64>;

    /// Distinct wallets that received pack NFTs from `from_block` (or
    /// genesis) to the chain head, lowercased, in first-seen order.
    async fn buyer_addresses(&self, from_block: Option<u64>) -> anyhow::Result<Vec<String>>;
}
