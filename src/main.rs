mod cli;

use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands, SignArgs, VerifyArgs};
use serde_json::json;
use streamsign::{config::Config, observability, signer::Signer};
use tracing::info;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();
    let common = cli.command.common();

    let logging = observability::init_logging(common.log_level.as_deref());
    let config = Config::load(common.config.as_deref())?;
    logging.apply_config_level(&config.log_level);

    match cli.command {
        Commands::Server(args) => {
            let address = args.address.unwrap_or(config.server.bind_addr);
            info!(version = env!("CARGO_PKG_VERSION"), "Starting streamsign");
            streamsign::api::run(config, args.common.config, address).await?
        }
        Commands::Sign(args) => sign(&config, &args)?,
        Commands::Verify(args) => verify(&config, &args)?,
    }

    Ok(())
}

fn sign(config: &Config, args: &SignArgs) -> Result<(), AnyError> {
    let signer = Signer::new(&config.encipher)?;
    let ttl = match args.ttl {
        Some(secs) => i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| format!("ttl out of range: {secs}"))?,
        None => config.play_url_max_alive(),
    };
    let expire_at = Utc::now()
        .checked_add_signed(ttl)
        .map_or(i64::MAX, |at| at.timestamp());

    let token = signer.encrypt(&args.item_id, &args.media_source_id, expire_at)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "signature": token, "expireAt": expire_at }))?
    );
    Ok(())
}

fn verify(config: &Config, args: &VerifyArgs) -> Result<(), AnyError> {
    let signer = Signer::new(&config.encipher)?;
    let payload = signer.decrypt(&args.token)?;
    let valid = payload.is_valid_at(Utc::now().timestamp());

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "payload": payload, "valid": valid }))?
    );
    Ok(())
}
