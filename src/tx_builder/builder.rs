//! Operation pipeline
//!
//! One orchestration for all four operations:
//!
//! 1. SDK client from the shared [`SdkContext`]
//! 2. position checks (remove-liquidity, harvest) before anything is fetched
//! 3. priority fee, then the SDK build call
//! 4. tip merge for the alternate relay (raw instructions only)
//! 5. blockhash fetch, immediately followed by assembly and serialization
//! 6. signature slots and the signing-request payload
//!
//! Any failure aborts the run. Nothing is retried and no partial payload is
//! returned.

use crate::config::{
    parse_pubkey, Config, CustodyConfig, HarvestConfig, OpenPositionConfig, RelayConfig,
    RemoveLiquidityConfig, SwapConfig,
};
use crate::metrics::metrics;
use crate::observability::TraceContext;
use crate::rpc::{BlockhashProvider, PriorityFeeProvider, RpcPriorityFeeProvider};
use crate::sdk::{
    ComputeBudget, DecreaseLiquidityRequest, HarvestRequest, LiquiditySdk, OpenPositionRequest,
    SdkContext, SdkLoader, SwapRequest,
};
use crate::tx_builder::assembler::{assemble, assemble_prebuilt, AssembledTransaction};
use crate::tx_builder::errors::{AssemblyError, AssemblyResult};
use crate::tx_builder::format::TransactionFormat;
use crate::tx_builder::instructions::{merge_tip, InstructionSource};
use crate::tx_builder::payload::{PreparedRequest, SigningRequestPayload};
use crate::tx_builder::serializer::serialize_message;
use crate::tx_builder::signatures::resolve_transaction_slots;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, debug_span, info, info_span, warn, Instrument};

/// A DEX operation to prepare for signing
#[derive(Debug, Clone)]
pub enum Operation {
    OpenPosition(OpenPositionConfig),
    RemoveLiquidity(RemoveLiquidityConfig),
    Swap(SwapConfig),
    Harvest(HarvestConfig),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenPosition(_) => "open_position",
            Self::RemoveLiquidity(_) => "remove_liquidity",
            Self::Swap(_) => "swap",
            Self::Harvest(_) => "harvest",
        }
    }

    pub fn format(&self) -> TransactionFormat {
        match self {
            Self::OpenPosition(cfg) => cfg.tx_version,
            Self::RemoveLiquidity(cfg) => cfg.tx_version,
            Self::Swap(cfg) => cfg.tx_version,
            Self::Harvest(cfg) => cfg.tx_version,
        }
    }
}

/// Builds signing-request payloads for one vault
pub struct TxBuilder<L: SdkLoader> {
    sdk: Arc<SdkContext<L>>,
    blockhash: Arc<dyn BlockhashProvider>,
    fees: Arc<dyn PriorityFeeProvider>,
    custody: CustodyConfig,
    relay: RelayConfig,
}

impl<L: SdkLoader> TxBuilder<L> {
    /// The SDK context must be loaded for the same account that pays fees
    pub fn new(
        sdk: Arc<SdkContext<L>>,
        blockhash: Arc<dyn BlockhashProvider>,
        fees: Arc<dyn PriorityFeeProvider>,
        custody: CustodyConfig,
        relay: RelayConfig,
    ) -> AssemblyResult<Self> {
        let vault = custody.vault_pubkey()?;
        if *sdk.owner() != vault {
            return Err(AssemblyError::configuration(format!(
                "SDK owner {} does not match custody.vault_address {}",
                sdk.owner(),
                vault
            )));
        }

        Ok(Self {
            sdk,
            blockhash,
            fees,
            custody,
            relay,
        })
    }

    /// Wire RPC-backed blockhash and fee providers from `config`
    pub fn from_config(config: &Config, sdk: Arc<SdkContext<L>>) -> AssemblyResult<Self> {
        config.validate()?;

        let rpc = Arc::new(RpcClient::new(config.rpc.url.clone()));
        let fees = RpcPriorityFeeProvider::new(Arc::clone(&rpc))
            .with_accounts(config.priority_fee.account_pubkeys()?)
            .with_percentile(config.priority_fee.percentile)
            .with_floor(config.priority_fee.floor_micro_lamports);

        Self::new(
            sdk,
            rpc,
            Arc::new(fees),
            config.custody.clone(),
            config.relay.clone(),
        )
    }

    /// Load `path` (with `.env` / environment overrides) and wire the builder
    pub fn from_config_file(path: &str, sdk: Arc<SdkContext<L>>) -> AssemblyResult<Self> {
        let config = Config::from_file_with_env(path)?;
        Self::from_config(&config, sdk)
    }

    /// Run `op` up to a ready-to-send payload
    pub async fn prepare(&self, op: &Operation) -> AssemblyResult<SigningRequestPayload> {
        let trace = TraceContext::new(op.name());
        let span = info_span!(
            "prepare_signing_request",
            operation = op.name(),
            format = %op.format(),
            trace_id = %trace.trace_id(),
            span_id = %trace.span_id(),
            correlation_id = %trace.correlation_id(),
        );

        let started = Instant::now();
        let result = self.run(op, &trace).instrument(span).await;
        let elapsed = started.elapsed();

        let m = metrics();
        m.assembly_latency.observe(elapsed.as_secs_f64());
        match &result {
            Ok(payload) => {
                m.requests_built
                    .with_label_values(&[op.name(), op.format().as_str()])
                    .inc();
                info!(
                    operation = op.name(),
                    correlation_id = %trace.correlation_id(),
                    push_mode = ?payload.push_mode(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Signing request ready"
                );
            }
            Err(e) => {
                m.assembly_failures.with_label_values(&[e.category()]).inc();
                warn!(
                    operation = op.name(),
                    correlation_id = %trace.correlation_id(),
                    category = e.category(),
                    error = %e,
                    "Signing request preparation failed"
                );
            }
        }
        result
    }

    /// Run `op` and render the request body for the configured endpoint
    pub async fn prepare_request(&self, op: &Operation) -> AssemblyResult<PreparedRequest> {
        let payload = self.prepare(op).await?;
        PreparedRequest::now(self.custody.api_path_endpoint.clone(), &payload)
    }

    async fn run(
        &self,
        op: &Operation,
        trace: &TraceContext,
    ) -> AssemblyResult<SigningRequestPayload> {
        let vault = self.custody.vault_pubkey()?;
        let format = op.format();
        let sdk = self.sdk.client().await?;

        let source = match op {
            Operation::OpenPosition(cfg) => self.build_open_position(sdk.as_ref(), cfg).await?,
            Operation::RemoveLiquidity(cfg) => {
                self.build_remove_liquidity(sdk.as_ref(), cfg).await?
            }
            Operation::Swap(cfg) => self.build_swap(sdk.as_ref(), cfg).await?,
            Operation::Harvest(cfg) => self.build_harvest(sdk.as_ref(), cfg).await?,
        };

        let mut tip = self.relay.tip_plan(&vault)?;
        if tip.is_some() && source.is_prebuilt() {
            // Editing a pre-built message would void its co-signatures
            warn!(
                operation = op.name(),
                "Skipping relay tip for pre-built transaction"
            );
            tip = None;
        }
        let source = merge_tip(source, tip.as_ref())?;

        let stage = trace.child_span("assemble");
        let assembled = self
            .assemble_fresh(&vault, source, format)
            .instrument(debug_span!(
                "assemble",
                span_id = %stage.span_id(),
                parent_span_id = stage.parent_span_id.as_deref().unwrap_or_default(),
            ))
            .await?;
        let data = serialize_message(&assembled, format)?;
        let signatures = resolve_transaction_slots(&assembled);

        debug!(
            instructions = assembled.instruction_count(),
            signature_slots = assembled.signatures().len(),
            co_signed = signatures.is_some(),
            "Message serialized"
        );

        Ok(SigningRequestPayload::new(
            self.custody.vault_id.clone(),
            data,
            self.relay.use_alternate_relay,
            self.custody.chain.clone(),
            signatures,
        ))
    }

    /// Fetch the blockhash last, right before compiling, for raw instructions
    async fn assemble_fresh(
        &self,
        vault: &Pubkey,
        source: InstructionSource,
        format: TransactionFormat,
    ) -> AssemblyResult<AssembledTransaction> {
        match source {
            InstructionSource::Prebuilt(prebuilt) => assemble_prebuilt(prebuilt, format),
            raw @ InstructionSource::Raw(_) => {
                let blockhash = self
                    .blockhash
                    .latest_blockhash()
                    .await
                    .map_err(|e| AssemblyError::upstream("blockhash", e))?;
                debug!(blockhash = %blockhash, "Fetched recent blockhash");
                assemble(vault, blockhash, raw, format)
            }
        }
    }

    async fn compute_budget(&self, units: Option<u32>) -> AssemblyResult<ComputeBudget> {
        let micro_lamports = self
            .fees
            .compute_unit_price()
            .await
            .map_err(|e| AssemblyError::upstream("priority_fee", e))?;
        Ok(ComputeBudget {
            units,
            micro_lamports,
        })
    }

    async fn build_open_position(
        &self,
        sdk: &L::Sdk,
        cfg: &OpenPositionConfig,
    ) -> AssemblyResult<InstructionSource> {
        cfg.validate()?;
        let request = OpenPositionRequest {
            pool: parse_pubkey("open_position.pool", &cfg.pool)?,
            input_amount: cfg.input_amount,
            start_price: cfg.start_price,
            end_price: cfg.end_price,
            format: cfg.tx_version,
        };
        let budget = self.compute_budget(Some(cfg.cu_limit)).await?;
        sdk.open_position(&request, budget)
            .await
            .map_err(|e| AssemblyError::upstream("sdk", e))
    }

    async fn build_remove_liquidity(
        &self,
        sdk: &L::Sdk,
        cfg: &RemoveLiquidityConfig,
    ) -> AssemblyResult<InstructionSource> {
        let pool = parse_pubkey("remove_liquidity.pool", &cfg.pool)?;
        let positions = sdk
            .owner_positions(Some(&pool))
            .await
            .map_err(|e| AssemblyError::upstream("pool_info", e))?;

        if positions.is_empty() {
            return Err(AssemblyError::no_active_position(format!(
                "{} holds no positions",
                self.sdk.owner()
            )));
        }
        let position = positions
            .into_iter()
            .find(|p| p.pool_id == pool)
            .ok_or_else(|| {
                AssemblyError::no_active_position(format!(
                    "{} has no position in pool {}",
                    self.sdk.owner(),
                    pool
                ))
            })?;

        info!(
            pool = %pool,
            nft_mint = %position.nft_mint,
            liquidity = %position.liquidity,
            close_position = cfg.close_position,
            "Removing liquidity"
        );

        let request = DecreaseLiquidityRequest {
            position,
            close_position: cfg.close_position,
            format: cfg.tx_version,
        };
        let budget = self.compute_budget(Some(cfg.cu_limit)).await?;
        sdk.decrease_liquidity(&request, budget)
            .await
            .map_err(|e| AssemblyError::upstream("sdk", e))
    }

    async fn build_swap(&self, sdk: &L::Sdk, cfg: &SwapConfig) -> AssemblyResult<InstructionSource> {
        cfg.validate()?;
        let request = SwapRequest {
            input_mint: parse_pubkey("swap.input_mint", &cfg.input_mint)?,
            output_mint: parse_pubkey("swap.output_mint", &cfg.output_mint)?,
            amount: cfg.amount,
            slippage_bps: cfg.slippage_bps(),
            wrap_sol: cfg.is_input_sol,
            unwrap_sol: cfg.is_output_sol,
            format: cfg.tx_version,
        };
        // The swap backend sizes its own compute limit
        let budget = self.compute_budget(None).await?;
        let sources = sdk
            .swap(&request, budget)
            .await
            .map_err(|e| AssemblyError::upstream("sdk", e))?;

        let total = sources.len();
        let first = sources
            .into_iter()
            .next()
            .ok_or_else(|| AssemblyError::invalid_instructions("swap returned no transactions"))?;
        if total > 1 {
            info!(total = total, "Swap route split across transactions, preparing the first");
        }
        Ok(first)
    }

    async fn build_harvest(
        &self,
        sdk: &L::Sdk,
        cfg: &HarvestConfig,
    ) -> AssemblyResult<InstructionSource> {
        let positions = sdk
            .owner_positions(None)
            .await
            .map_err(|e| AssemblyError::upstream("pool_info", e))?;

        let total = positions.len();
        let active: Vec<_> = positions.into_iter().filter(|p| p.has_liquidity()).collect();
        if active.is_empty() {
            return Err(AssemblyError::no_active_position(format!(
                "{} has no positions with liquidity ({} empty)",
                self.sdk.owner(),
                total
            )));
        }
        debug!(active = active.len(), skipped = total - active.len(), "Harvesting positions");

        let request = HarvestRequest {
            positions: active,
            format: cfg.tx_version,
        };
        let budget = self.compute_budget(Some(cfg.cu_limit)).await?;
        sdk.harvest_rewards(&request, budget)
            .await
            .map_err(|e| AssemblyError::upstream("sdk", e))
    }
}
