// src/config.rs

use anyhow::{anyhow, Result};
use chrono::FixedOffset;
use clap::Parser;
use serde::Deserialize;

/// Runtime configuration, loaded from environment variables (a local .env
/// file is honored). Command-line flags override individual values.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    // Server
    #[serde(default = "default_host")]
    pub server_host: String,
    #[serde(default = "default_port")]
    pub server_port: u16,

    /// Business timezone as whole minutes east of UTC. All date-boundary
    /// decisions (day rollover, deadlines) are made in this offset.
    #[serde(default)]
    pub business_tz_offset_minutes: i32,

    /// Daily-task creation deadline as "HH:MM" business-local time.
    #[serde(default = "default_daily_task_deadline")]
    pub daily_task_deadline: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_daily_task_deadline() -> String {
    "10:00".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        envy::from_env::<AppConfig>()
    }

    pub fn business_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.business_tz_offset_minutes * 60).ok_or_else(|| {
            anyhow!(
                "business_tz_offset_minutes out of range: {}",
                self.business_tz_offset_minutes
            )
        })
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server_host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server_port = port;
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "crewledger", about = "Task lifecycle and incentive service")]
pub struct Cli {
    /// Bind address, overrides SERVER_HOST
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port, overrides SERVER_PORT
    #[arg(long)]
    pub port: Option<u16>,
}
