//! Blockhash and priority-fee providers
//!
//! Both are upstream fetches with no retry at this layer. The RPC-backed
//! implementations wrap `solana-client`'s nonblocking client.

use anyhow::Context;
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{hash::Hash, pubkey::Pubkey};
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait BlockhashProvider: Send + Sync {
    async fn latest_blockhash(&self) -> anyhow::Result<Hash>;
}

#[async_trait]
pub trait PriorityFeeProvider: Send + Sync {
    /// Compute unit price in micro-lamports
    async fn compute_unit_price(&self) -> anyhow::Result<u64>;
}

#[async_trait]
impl BlockhashProvider for RpcClient {
    async fn latest_blockhash(&self) -> anyhow::Result<Hash> {
        self.get_latest_blockhash()
            .await
            .context("getLatestBlockhash failed")
    }
}

#[async_trait]
impl<T: BlockhashProvider + ?Sized> BlockhashProvider for Arc<T> {
    async fn latest_blockhash(&self) -> anyhow::Result<Hash> {
        (**self).latest_blockhash().await
    }
}

#[async_trait]
impl<T: PriorityFeeProvider + ?Sized> PriorityFeeProvider for Arc<T> {
    async fn compute_unit_price(&self) -> anyhow::Result<u64> {
        (**self).compute_unit_price().await
    }
}

/// A constant compute unit price
#[derive(Debug, Clone, Copy)]
pub struct FixedPriorityFee(pub u64);

#[async_trait]
impl PriorityFeeProvider for FixedPriorityFee {
    async fn compute_unit_price(&self) -> anyhow::Result<u64> {
        Ok(self.0)
    }
}

/// Percentile of recent prioritization fees, never below `floor`
pub struct RpcPriorityFeeProvider {
    rpc: Arc<RpcClient>,
    accounts: Vec<Pubkey>,
    percentile: f64,
    floor: u64,
}

impl RpcPriorityFeeProvider {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self {
            rpc,
            accounts: Vec::new(),
            percentile: 0.9,
            floor: 0,
        }
    }

    /// Only consider fees paid by transactions locking these accounts
    pub fn with_accounts(mut self, accounts: Vec<Pubkey>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn with_percentile(mut self, percentile: f64) -> Self {
        self.percentile = percentile.clamp(0.0, 1.0);
        self
    }

    pub fn with_floor(mut self, floor: u64) -> Self {
        self.floor = floor;
        self
    }
}

#[async_trait]
impl PriorityFeeProvider for RpcPriorityFeeProvider {
    async fn compute_unit_price(&self) -> anyhow::Result<u64> {
        let fees = self
            .rpc
            .get_recent_prioritization_fees(&self.accounts)
            .await
            .context("getRecentPrioritizationFees failed")?;

        let mut values: Vec<u64> = fees.iter().map(|f| f.prioritization_fee).collect();
        let picked = percentile_fee(&mut values, self.percentile).unwrap_or(0);
        let price = picked.max(self.floor);

        debug!(
            samples = values.len(),
            percentile = self.percentile,
            picked = picked,
            price = price,
            "Resolved compute unit price"
        );
        Ok(price)
    }
}

/// Nearest-rank percentile: `ceil(N * p) - 1`, clamped to the valid range
pub fn percentile_fee(values: &mut [u64], percentile: f64) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();

    let len = values.len();
    let rank = (len as f64 * percentile).ceil() as usize;
    let index = rank.saturating_sub(1).min(len - 1);
    Some(values[index])
}
