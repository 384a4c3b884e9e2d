//! Scan Probe
//!
//! Fires simulated credential scans at a running rfid-gate instance and
//! reports the decision and round-trip latency per scan. Useful for
//! exercising the admission path from a reader's point of view without
//! any RFID hardware attached.

use clap::Parser;
use serde_json::json;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "scan_probe", about = "Simulated RFID scan generator")]
struct Args {
    /// Base URL of the rfid-gate server
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Credential uid to present
    #[arg(long, default_value = "A1B2C3D4")]
    uid: String,

    /// Number of scans to send
    #[arg(long, default_value = "1")]
    count: u32,

    /// Pause between scans in milliseconds
    #[arg(long, default_value = "500")]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let url = format!("{}/api/acceso", args.server.trim_end_matches('/'));
    let client = reqwest::Client::new();

    println!("probing {} with uid {} ({} scans)", url, args.uid, args.count);

    let mut allowed = 0u32;
    let mut denied = 0u32;

    for i in 1..=args.count {
        let started = Instant::now();
        let response = client
            .post(&url)
            .json(&json!({ "uid": args.uid }))
            .send()
            .await?;
        let elapsed = started.elapsed();

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
        let resultado = body["resultado"].as_str().unwrap_or("?");
        let detalle = body["detalle"].as_str().unwrap_or("?");

        match resultado {
            "PERMITIDO" => allowed += 1,
            _ => denied += 1,
        }

        println!(
            "[{}/{}] {} {} ({}) in {:.1}ms",
            i,
            args.count,
            status.as_u16(),
            resultado,
            detalle,
            elapsed.as_secs_f64() * 1000.0
        );

        if i < args.count {
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }
    }

    println!("done: {} permitido, {} denegado", allowed, denied);
    Ok(())
}
