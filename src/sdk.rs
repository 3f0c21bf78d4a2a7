//! Boundary to the external liquidity/swap SDK
//!
//! The SDK is a black box that returns instruction sources. It is loaded at
//! most once per [`SdkContext`]: the first caller initializes it, concurrent
//! first callers wait on the same initialization, and everyone afterwards
//! shares the cached handle. There is no teardown.

use crate::tx_builder::{AssemblyError, AssemblyResult, InstructionSource, TransactionFormat};
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// An owner's concentrated-liquidity position as reported by the SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionInfo {
    pub pool_id: Pubkey,
    pub nft_mint: Pubkey,
    pub liquidity: u128,
}

impl PositionInfo {
    pub fn has_liquidity(&self) -> bool {
        self.liquidity > 0
    }
}

/// Compute budget handed to the SDK's instruction builders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeBudget {
    /// Compute unit limit; `None` leaves it to the builder
    pub units: Option<u32>,
    /// Compute unit price in micro-lamports
    pub micro_lamports: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPositionRequest {
    pub pool: Pubkey,
    /// Amount of the pool's base mint, in UI units
    pub input_amount: f64,
    pub start_price: f64,
    pub end_price: f64,
    pub format: TransactionFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecreaseLiquidityRequest {
    pub position: PositionInfo,
    pub close_position: bool,
    pub format: TransactionFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarvestRequest {
    pub positions: Vec<PositionInfo>,
    pub format: TransactionFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Input amount in base units
    pub amount: u64,
    pub slippage_bps: u16,
    pub wrap_sol: bool,
    pub unwrap_sol: bool,
    pub format: TransactionFormat,
}

/// Instruction-building capability of the external SDK
#[async_trait]
pub trait LiquiditySdk: Send + Sync {
    /// Positions held by the SDK's owner, optionally restricted to one pool
    async fn owner_positions(&self, pool: Option<&Pubkey>) -> anyhow::Result<Vec<PositionInfo>>;

    async fn open_position(
        &self,
        request: &OpenPositionRequest,
        budget: ComputeBudget,
    ) -> anyhow::Result<InstructionSource>;

    async fn decrease_liquidity(
        &self,
        request: &DecreaseLiquidityRequest,
        budget: ComputeBudget,
    ) -> anyhow::Result<InstructionSource>;

    async fn harvest_rewards(
        &self,
        request: &HarvestRequest,
        budget: ComputeBudget,
    ) -> anyhow::Result<InstructionSource>;

    /// Swap transactions; the swap backend may split a route into several
    async fn swap(
        &self,
        request: &SwapRequest,
        budget: ComputeBudget,
    ) -> anyhow::Result<Vec<InstructionSource>>;
}

/// Loads one SDK client for a vault owner
#[async_trait]
pub trait SdkLoader: Send + Sync {
    type Sdk: LiquiditySdk;

    async fn load(&self, owner: &Pubkey) -> anyhow::Result<Self::Sdk>;
}

/// Create-once, reuse, no-teardown holder for the SDK client
pub struct SdkContext<L: SdkLoader> {
    loader: L,
    owner: Pubkey,
    client: OnceCell<Arc<L::Sdk>>,
}

impl<L: SdkLoader> SdkContext<L> {
    pub fn new(loader: L, owner: Pubkey) -> Self {
        Self {
            loader,
            owner,
            client: OnceCell::new(),
        }
    }

    pub fn owner(&self) -> &Pubkey {
        &self.owner
    }

    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    /// The shared SDK client, loading it on first use
    ///
    /// A failed load leaves the context uninitialized; the next caller tries
    /// again.
    pub async fn client(&self) -> AssemblyResult<Arc<L::Sdk>> {
        let client = self
            .client
            .get_or_try_init(|| async {
                info!(owner = %self.owner, "Loading liquidity SDK client");
                self.loader
                    .load(&self.owner)
                    .await
                    .map(Arc::new)
                    .map_err(|e| AssemblyError::upstream("sdk", e))
            })
            .await?;
        Ok(Arc::clone(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct NullSdk;

    #[async_trait]
    impl LiquiditySdk for NullSdk {
        async fn owner_positions(&self, _pool: Option<&Pubkey>) -> anyhow::Result<Vec<PositionInfo>> {
            Ok(vec![])
        }

        async fn open_position(&self, _: &OpenPositionRequest, _: ComputeBudget) -> anyhow::Result<InstructionSource> {
            Ok(InstructionSource::Raw(vec![]))
        }

        async fn decrease_liquidity(&self, _: &DecreaseLiquidityRequest, _: ComputeBudget) -> anyhow::Result<InstructionSource> {
            Ok(InstructionSource::Raw(vec![]))
        }

        async fn harvest_rewards(&self, _: &HarvestRequest, _: ComputeBudget) -> anyhow::Result<InstructionSource> {
            Ok(InstructionSource::Raw(vec![]))
        }

        async fn swap(&self, _: &SwapRequest, _: ComputeBudget) -> anyhow::Result<Vec<InstructionSource>> {
            Ok(vec![])
        }
    }

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        fail_first: bool,
    }

    #[async_trait]
    impl SdkLoader for CountingLoader {
        type Sdk = NullSdk;

        async fn load(&self, _owner: &Pubkey) -> anyhow::Result<NullSdk> {
            let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail_first && attempt == 0 {
                anyhow::bail!("cluster unreachable");
            }
            Ok(NullSdk)
        }
    }

    #[tokio::test]
    async fn test_client_loaded_once_under_concurrent_first_use() {
        let loads = Arc::new(AtomicUsize::new(0));
        let ctx = SdkContext::new(
            CountingLoader {
                loads: Arc::clone(&loads),
                fail_first: false,
            },
            Pubkey::new_unique(),
        );

        let (a, b, c) = tokio::join!(ctx.client(), ctx.client(), ctx.client());
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));

        let again = ctx.client().await.unwrap();
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_upstream_error_and_retried_next_call() {
        let loads = Arc::new(AtomicUsize::new(0));
        let ctx = SdkContext::new(
            CountingLoader {
                loads: Arc::clone(&loads),
                fail_first: true,
            },
            Pubkey::new_unique(),
        );

        let first = ctx.client().await;
        assert!(matches!(
            first,
            Err(AssemblyError::UpstreamFetchFailure { source_name: "sdk", .. })
        ));
        assert!(!ctx.is_initialized());

        assert!(ctx.client().await.is_ok());
        assert!(ctx.is_initialized());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_position_liquidity() {
        let mut position = PositionInfo {
            pool_id: Pubkey::new_unique(),
            nft_mint: Pubkey::new_unique(),
            liquidity: 0,
        };
        assert!(!position.has_liquidity());
        position.liquidity = 42;
        assert!(position.has_liquidity());
    }
}
