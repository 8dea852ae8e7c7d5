//! Main entry point for the paysync operator CLI.
//!
//! The binary runs the payment sync engine against a live chain for a single
//! intent, evaluates the failure analyzer offline, and computes slippage
//! recommendations. Configuration is read from a TOML file; a `.env` file is
//! loaded first so the file can interpolate secrets from the environment.

use alloy_primitives::{Address, TxHash, U256};
use clap::{Parser, Subcommand};
use paysync_config::{ChainContracts, Config};
use paysync_contracts::implementations::evm::alloy::{
	parse_signer, AlloyPaymentContract, AlloyPriceOracle,
};
use paysync_core::{FailureAnalyzer, PaymentSyncEngine};
use paysync_pricing::{MarketDataService, SlippageCalculator, SlippageService};
use paysync_types::{
	format_bps, format_token_amount, truncate_id, FrontendPaymentState, IntentId,
	PaymentIntentStatus, PaymentMethod, SlippageRequest, SlippageTolerance,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Command-line arguments for the paysync CLI.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to the configuration file
	#[arg(short, long, default_value = "paysync.toml", global = true)]
	config: String,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info", global = true)]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Follow one payment intent and log sync and recovery events until Ctrl-C
	Monitor {
		#[arg(long)]
		chain_id: u64,
		#[arg(long)]
		intent_id: IntentId,
		/// Frontend state the payment flow is assumed to be in
		#[arg(long, default_value = "executing_payment")]
		frontend_state: FrontendPaymentState,
		/// Transaction executing the payment, if already submitted
		#[arg(long)]
		execution_tx: Option<TxHash>,
		/// Key signing cleanup transactions. Without it cleanups fail closed.
		#[arg(long, env = "PAYSYNC_PRIVATE_KEY", hide_env_values = true)]
		private_key: Option<String>,
	},
	/// Print the cleanup operation chosen for a failure scenario
	Analyze {
		#[arg(long)]
		frontend_state: FrontendPaymentState,
		#[arg(long)]
		contract_status: Option<PaymentIntentStatus>,
		#[arg(long)]
		error: Option<String>,
		#[arg(long)]
		intent_id: Option<IntentId>,
		/// Prefer hard cleanups over refunds for reverted executions
		#[arg(long)]
		no_fund_safety: bool,
	},
	/// Print a slippage recommendation for a swap
	Slippage {
		#[arg(long)]
		from: Address,
		#[arg(long)]
		to: Address,
		/// Amount in the smallest unit of the input token
		#[arg(long)]
		amount: U256,
		#[arg(long)]
		method: PaymentMethod,
		#[arg(long)]
		preference: Option<SlippageTolerance>,
		/// Refresh market data from this chain's price oracle first
		#[arg(long)]
		chain_id: Option<u64>,
		/// Keep refreshing market data and print a recommendation per refresh
		#[arg(long, requires = "chain_id")]
		watch: bool,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let _ = dotenvy::dotenv();
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	match args.command {
		Command::Monitor {
			chain_id,
			intent_id,
			frontend_state,
			execution_tx,
			private_key,
		} => {
			let config = Config::from_file(&args.config).await?;
			let contracts = config.contracts_for(chain_id)?;
			let target = Target {
				intent_id,
				frontend_state,
				execution_tx,
			};
			monitor(&config, &contracts, target, private_key).await
		},
		Command::Analyze {
			frontend_state,
			contract_status,
			error,
			intent_id,
			no_fund_safety,
		} => {
			let operation = FailureAnalyzer::new(!no_fund_safety).analyze(
				frontend_state,
				contract_status,
				error.as_deref(),
				intent_id,
			);
			println!("{}", serde_json::to_string_pretty(&operation)?);
			Ok(())
		},
		Command::Slippage {
			from,
			to,
			amount,
			method,
			preference,
			chain_id,
			watch,
		} => {
			let config = Config::from_file(&args.config).await?;
			let request = SlippageRequest {
				from_token: from,
				to_token: to,
				from_amount: amount,
				payment_method: method,
				user_preference: preference,
			};
			slippage(&config, chain_id, &request, watch).await
		},
	}
}

/// The payment flow followed by `monitor`.
struct Target {
	intent_id: IntentId,
	frontend_state: FrontendPaymentState,
	execution_tx: Option<TxHash>,
}

async fn monitor(
	config: &Config,
	contracts: &ChainContracts,
	target: Target,
	private_key: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
	let signer = private_key.as_deref().map(parse_signer).transpose()?;
	if signer.is_none() {
		tracing::warn!("No private key provided, contract cleanups will fail closed");
	}
	let contract = Arc::new(
		AlloyPaymentContract::new(contracts, signer)?
			.with_confirmations(config.cleanup.confirmations),
	);

	let engine = Arc::new(PaymentSyncEngine::from_config(
		config,
		contract.clone(),
		contract,
	)?);
	let mut states = engine.subscribe();
	let mut events = engine.event_bus().subscribe();

	engine.track_intent(Some(target.intent_id));
	engine.set_frontend_state(target.frontend_state);
	if let Some(tx_hash) = target.execution_tx {
		engine.execution_submitted(tx_hash);
	}
	tracing::info!(
		chain_id = contracts.chain_id,
		intent_id = %truncate_id(&target.intent_id.to_string()),
		frontend_state = %target.frontend_state,
		"Monitoring payment intent"
	);

	let runner = Arc::clone(&engine);
	let run = runner.run();
	tokio::pin!(run);

	loop {
		tokio::select! {
			result = &mut run => {
				result?;
				break;
			}
			changed = states.changed() => {
				if changed.is_err() {
					break;
				}
				let state = states.borrow_and_update().clone();
				tracing::info!(
					frontend_state = %state.frontend_state,
					contract_status = ?state.contract_status,
					sync_status = %state.sync_status,
					can_proceed = state.can_proceed(),
					expired = state.is_expired,
					error = ?state.error,
					"Sync state"
				);
			}
			event = events.recv() => {
				match event {
					Ok(event) => println!("{}", serde_json::to_string(&event)?),
					Err(RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Event subscriber lagged");
					},
					Err(RecvError::Closed) => break,
				}
			}
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Stopping monitor");
				break;
			}
		}
	}
	Ok(())
}

async fn slippage(
	config: &Config,
	chain_id: Option<u64>,
	request: &SlippageRequest,
	watch: bool,
) -> Result<(), Box<dyn std::error::Error>> {
	let market = match chain_id {
		Some(chain_id) => {
			let contracts = config.contracts_for(chain_id)?;
			let oracle = AlloyPriceOracle::new(&contracts)?;
			Some(MarketDataService::new(
				Arc::new(oracle),
				config.slippage.volatility_window,
			))
		},
		None => None,
	};
	let calculator = SlippageCalculator::new(&config.slippage);
	let decimals = calculator.registry().decimals(&request.from_token);
	let mut service = SlippageService::new(calculator, market);
	if let Err(e) = service.refresh_market_data().await {
		tracing::warn!("Market data unavailable, using fallbacks: {}", e);
	}

	let recommendation = service.recommend(request);
	println!("{}", serde_json::to_string_pretty(&recommendation)?);

	if watch {
		let refresh_interval = config.slippage.refresh_interval();
		service.start_market_refresh(refresh_interval);
		let mut ticker = tokio::time::interval(refresh_interval);
		ticker.tick().await;
		loop {
			tokio::select! {
				_ = ticker.tick() => {
					println!("{}", serde_json::to_string(&service.recommend(request))?);
				}
				_ = tokio::signal::ctrl_c() => break,
			}
		}
	}

	let protected = service.protect_amount(request.from_amount)?.to_string();
	let protected = match decimals {
		Some(decimals) => format_token_amount(&protected, decimals),
		None => protected,
	};
	tracing::info!(
		protected_amount = %protected,
		slippage = %format_bps(service.current_slippage()),
		"Slippage protection applied to the input amount"
	);
	Ok(())
}
