//! Inspect a staking output
//!
//! Builds the staking output for one staker from a parameters file and prints
//! its address, scriptPubKey, leaf scripts and control blocks as JSON.
//!
//! Usage:
//!   staking-info --config staking.toml --staker-pubkey <hex> --amount 100000
//!   staking-info --config staking.toml --staker-pubkey <hex> --amount 100000 --validator <hex>

use btcstaking::config::{parse_btc_amount, parse_x_only_pubkey, StakingConfig};
use btcstaking::logging::{init_logging, LogLevel};
use btcstaking::StakingOutputDescriptor;
use clap::Parser;

#[derive(Parser)]
#[command(name = "staking-info")]
#[command(about = "Print the Taproot staking output for a staker")]
struct Args {
    /// Staking parameters file (TOML)
    #[arg(short, long, env = "BTCSTAKING_CONFIG")]
    config: String,

    /// Staker public key (x-only or compressed, hex)
    #[arg(short, long)]
    staker_pubkey: String,

    /// Staking amount in satoshis
    #[arg(short, long)]
    amount: String,

    /// Additional validator key to restake to (hex), repeatable
    #[arg(short, long)]
    validator: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(LogLevel::from(args.log_level.as_str()), args.json_logs)?;

    let config = StakingConfig::load(&args.config)?;
    let staker = parse_x_only_pubkey(&args.staker_pubkey)?;
    let amount = parse_btc_amount(&args.amount)?;
    let extra_validators = args
        .validator
        .iter()
        .map(|v| parse_x_only_pubkey(v))
        .collect::<Result<Vec<_>, _>>()?;

    let keys = config.key_set(staker, &extra_validators)?;
    let params = config.lock_params(amount)?;
    let descriptor = StakingOutputDescriptor::new(keys, params)?;

    tracing::info!(
        address = %descriptor.address(),
        value_sats = descriptor.value().to_sat(),
        "Staking output ready"
    );

    println!("{}", serde_json::to_string_pretty(&descriptor.summary()?)?);
    Ok(())
}
