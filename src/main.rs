use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep, timeout};

use ute_energy::configuration::config::{load_config, Config};
use ute_energy::models::descriptors::{render_field, DeviceDescriptor};
use ute_energy::UteClient;

// --------------------------------------------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "ute_energy", version, about = "Polls UTE electricity account data from the UTE mobile API")]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Refresh the configured account every poll interval (default).
    Run,
    /// Verify the phone by SMS and list the accounts of this user.
    Setup,
    /// List the accounts of this user with the current credentials.
    Accounts,
}

// --------------------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli    = Cli::parse();
    let config = load_config(&cli.config)?;

    // Initialise logger.
    env_logger::Builder::new()
        .filter_level(config.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info))
        .try_init()
        .context("Failed to initialise logger")?;

    let mut client = UteClient::new(&config.email, &config.phone, config.client_options())
        .context("Cannot create the UTE client")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run      => run(&config, &mut client).await,
        Command::Setup    => setup(&mut client).await,
        Command::Accounts => list_accounts(&mut client).await,
    }
}

// --------------------------------------------------------------------------------------------------------------

async fn run(config: &Config, client: &mut UteClient) -> Result<()> {
    let account_id = config.account_service_point_id.as_str();
    if account_id.is_empty() {
        bail!("account_service_point_id is not set; run `ute_energy setup` to list your accounts");
    }

    let device   = DeviceDescriptor::for_account(account_id);
    let interval = config.poll_interval();

    log::info!("=== UTE Energy starting ===");
    log::info!("Device:        {} {} ({})", device.manufacturer, device.model, device.identity);
    log::info!("API:           {}", config.base_url);
    log::info!("Poll interval: {:?}", interval);

    // ----------------------------------------------------------------------------------------------------------
    // One refresh per cycle: login → retrieve snapshot → log → sleep. Refreshes never overlap.
    loop {
        let cycle_start = Instant::now();

        // Step 1: make sure we hold a token.
        let logged_in = match timeout(config.login_timeout(), client.login()).await {
            Ok(Ok(true))  => true,
            Ok(Ok(false)) => {
                log::warn!("[Host] Login returned no token (failed attempts: {})", client.failed_logins());
                false
            }
            Ok(Err(e)) => {
                log::warn!("[Host] Login failed (failed attempts: {}): {}", client.failed_logins(), e);
                false
            }
            Err(_) => {
                log::warn!("[Host] Login timed out after {:?}", config.login_timeout());
                false
            }
        };

        // Step 2: rebuild the account snapshot.
        if logged_in {
            match timeout(config.refresh_timeout(), client.refresh(account_id)).await {
                Ok(Ok(snapshot)) => {
                    for (key, value) in snapshot.iter() {
                        log::info!("[Host] {}", render_field(key, value));
                    }
                }
                Ok(Err(e)) if e.is_transient() => {
                    log::warn!("[Host] Update failed, retrying next cycle: {}", e);
                }
                Ok(Err(e)) => {
                    log::error!("[Host] Update failed: {}", e);
                }
                Err(_) => {
                    log::error!("[Host] Update failed: refresh timed out after {:?}", config.refresh_timeout());
                }
            }
        }

        // Sleep for whatever time remains in the interval.
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            let remaining = interval - elapsed;
            log::info!("[Host] Cycle done in {:?}. Sleeping {:?}.", elapsed, remaining);
            sleep(remaining).await;
        } else {
            log::warn!(
                "[Host] Cycle took {:?}, overran interval {:?} - skipping sleep.",
                elapsed, interval
            );
        }
    }
}

// --------------------------------------------------------------------------------------------------------------

async fn setup(client: &mut UteClient) -> Result<()> {
    if !client.login().await.context("Login failed")? {
        bail!("The UTE API returned an empty token");
    }

    client.request_auth_code().await.context("Could not request the SMS code")?;
    println!("An SMS code was sent to {}. Enter it:", client.credentials().phone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let code = lines
        .next_line()
        .await?
        .map(|line| line.trim().to_string())
        .unwrap_or_default();
    if code.is_empty() {
        bail!("No SMS code entered");
    }

    if !client.validate_auth_code(&code).await.context("Could not validate the SMS code")? {
        bail!("The SMS code was rejected");
    }

    print_accounts(client).await
}

async fn list_accounts(client: &mut UteClient) -> Result<()> {
    if !client.login().await.context("Login failed")? {
        bail!("The UTE API returned an empty token");
    }
    print_accounts(client).await
}

async fn print_accounts(client: &UteClient) -> Result<()> {
    let accounts = client.request_accounts().await.context("Could not list the accounts")?;
    println!("Set account_service_point_id in the configuration to one of:");
    for account in accounts {
        println!("  {:<14} {:<12} {}", account.service_point_id, account.account_id, account.address);
    }
    Ok(())
}
