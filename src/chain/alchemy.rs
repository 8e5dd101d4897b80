use std::collections::HashSet;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AddressSource;

/// rip.fun pack contract on Base; pack NFTs are sent from here to buyers.
pub const RIP_CONTRACT_ADDRESS: &str = "0xeBeA10BCd609d3F6fb2Ea104baB638396C037388";
pub const RIP_NFT_CONTRACT_ADDRESS: &str = "0x6292bf78996e189bAd8f9CF3e3Cb31017bb70540";

/// 1000 transfers per page.
const MAX_COUNT: &str = "0x3e8";
const MAX_PAGES: usize = 10_000;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransfersPage {
    #[serde(default)]
    transfers: Vec<Transfer>,
    #[serde(default)]
    page_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Transfer {
    #[serde(default)]
    to: Option<String>,
}

/// Alchemy JSON-RPC client for the Base network.
#[derive(Debug, Clone)]
pub struct AlchemyClient {
    http: Client,
    rpc_url: String,
}

impl AlchemyClient {
    pub fn new(http: Client, rpc_url: impl Into<String>) -> Self {
        Self {
            http,
            rpc_url: rpc_url.into(),
        }
    }

    pub fn base_mainnet(http: Client, api_key: &str) -> Self {
        Self::new(http, format!("https://base-mainnet.g.alchemy.com/v2/{api_key}"))
    }

    async fn call(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp: RpcResponse = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("{method} returned malformed JSON"))?;

        if let Some(err) = resp.error {
            bail!("{method} failed: {} (code {})", err.message, err.code);
        }
        resp.result.ok_or_else(|| anyhow!("{method} returned no result"))
    }
}

#[async_trait]
impl AddressSource for AlchemyClient {
    async fn latest_block(&self) -> anyhow::Result<u64> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        result
            .as_str()
            .and_then(parse_quantity)
            .ok_or_else(|| anyhow!("eth_blockNumber returned {result}"))
    }

    async fn buyer_addresses(&self, from_block: Option<u64>) -> anyhow::Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut addresses = Vec::new();
        let mut page_key: Option<String> = None;
        let mut transfers = 0usize;

        for page in 1..=MAX_PAGES {
            let mut params = json!({
                "fromBlock": format!("{:#x}", from_block.unwrap_or(0)),
                "toBlock": "latest",
                "fromAddress": RIP_CONTRACT_ADDRESS,
                "contractAddresses": [RIP_NFT_CONTRACT_ADDRESS],
                "category": ["erc721", "erc1155"],
                "withMetadata": false,
                "maxCount": MAX_COUNT,
                "excludeZeroValue": true,
            });
            if let Some(key) = &page_key {
                params["pageKey"] = json!(key);
            }

            let result = self.call("alchemy_getAssetTransfers", json!([params])).await?;
            let batch: TransfersPage = serde_json::from_value(result)
                .context("alchemy_getAssetTransfers returned an unexpected shape")?;

            transfers += batch.transfers.len();
            for to in batch.transfers.iter().filter_map(|t| t.to.as_deref()) {
                match normalize_address(to) {
                    Some(addr) if seen.insert(addr.clone()) => addresses.push(addr),
                    Some(_) => {}
                    None => tracing::debug!(address = to, "skipping invalid recipient"),
                }
            }
            tracing::debug!(page, transfers, unique = addresses.len(), "fetched asset transfers page");

            page_key = batch.page_key.filter(|k| !k.is_empty());
            if page_key.is_none() {
                break;
            }
        }

        tracing::info!(transfers, addresses = addresses.len(), "collected buyer addresses");
        Ok(addresses)
    }
}

/// `0x`-prefixed hex quantity.
pub fn parse_quantity(raw: &str) -> Option<u64> {
    let digits = raw.strip_prefix("0x")?;
    u64::from_str_radix(digits, 16).ok()
}

/// Lowercased 20-byte hex address; the zero address is not a buyer.
pub fn normalize_address(raw: &str) -> Option<String> {
    let lower = raw.trim().to_ascii_lowercase();
    let hex = lower.strip_prefix("0x")?;
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    if hex.bytes().all(|b| b == b'0') {
        return None;
    }
    Some(lower)
}
