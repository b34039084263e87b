//! Command-line arguments for `fitbit-sync`.
//!
//! ```bash
//! # steady-state polling (default)
//! fitbit-sync
//!
//! # first run: seed the token file, then poll
//! fitbit-sync --refresh-token <TOKEN> incremental
//!
//! # one-time historical import
//! fitbit-sync backfill --start 2023-01-01 --end 2023-12-31
//! ```

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "fitbit-sync",
    version,
    about = "Sync Fitbit health data into InfluxDB"
)]
pub struct Cli {
    /// Refresh token used to create the token file when it does not exist yet.
    /// Overrides FITBIT_REFRESH_TOKEN.
    #[arg(long, global = true)]
    pub refresh_token: Option<String>,

    #[command(subcommand)]
    pub mode: Option<Mode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Mode {
    /// Catch up on recent days, then poll every family on its cadence.
    Incremental,
    /// Import an explicit date range, then exit.
    Backfill {
        /// First date, YYYY-MM-DD.
        #[arg(long)]
        start: NaiveDate,
        /// Last date (inclusive), YYYY-MM-DD.
        #[arg(long)]
        end: NaiveDate,
    },
}

impl Cli {
    pub fn mode(&self) -> Mode {
        self.mode.clone().unwrap_or(Mode::Incremental)
    }
}
