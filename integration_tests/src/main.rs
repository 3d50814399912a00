//! Integration tests for the AR glasses firmware.
//!
//! Run after flashing: connects over BLE and exercises the file, image and
//! status services.

mod ble_client;
mod protocol;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use ble_client::GlassesClient;
use tests::{print_results, run_all_tests};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "BLE integration tests for the AR glasses firmware")]
struct Args {
    /// Advertised device name
    #[arg(long, default_value = "AR_GLASS")]
    name: String,

    /// BLE scan timeout in seconds
    #[arg(long, default_value = "10")]
    scan_timeout: u64,

    /// Also run the capture test (needs a picture on the card)
    #[arg(long)]
    capture: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("{}", "AR Glasses Integration Tests".bold());
    println!("Scanning for \"{}\"...", args.name);
    let client = GlassesClient::connect_by_name(&args.name, Duration::from_secs(args.scan_timeout)).await?;
    println!("{}", "Connected!".green());

    println!("\nRunning tests...\n");
    let results = run_all_tests(&client, args.capture).await;
    print_results(&results);

    client.disconnect().await?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}
