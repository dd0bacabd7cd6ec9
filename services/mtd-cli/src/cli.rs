//! Command-line arguments
//!
//! `--config` and `--scenario` are global, so they may follow the subcommand.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use mtd_client::ObligationStatus;

/// mtd-vat - Making Tax Digital VAT client
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "mtd-vat")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (default: $CONFIG_PATH or mtd-vat.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Sandbox test scenario sent as Gov-Test-Scenario
    #[arg(long, global = true)]
    pub scenario: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    // === Consent and tokens ===
    /// Print the consent URL
    AuthorizeUrl {
        /// Opaque state returned with the code (random when omitted)
        state: Option<String>,
    },

    /// Exchange an authorization code for tokens
    Exchange {
        /// Authorization code from the consent page
        code: String,
    },

    /// Refresh the stored tokens
    Refresh,

    // === VAT API ===
    /// List VAT obligations
    Obligations {
        /// Start date (YYYY-MM-DD)
        from: String,
        /// End date (YYYY-MM-DD)
        to: String,
        /// O (open) or F (fulfilled)
        #[arg(value_parser = ObligationStatus::from_str)]
        status: Option<ObligationStatus>,
    },

    /// View a submitted return
    GetReturn {
        /// Period key, e.g. 18A1
        period_key: String,
    },

    /// Submit a nine-box return
    SubmitReturn {
        /// JSON file holding the return
        file: PathBuf,
    },

    /// List VAT liabilities
    Liabilities {
        /// Start date (YYYY-MM-DD)
        from: String,
        /// End date (YYYY-MM-DD)
        to: String,
    },

    /// List VAT payments
    Payments {
        /// Start date (YYYY-MM-DD)
        from: String,
        /// End date (YYYY-MM-DD)
        to: String,
    },

    /// Create a sandbox organisation (defaults to mtd-vat)
    CreateTestUser {
        /// Services to enrol
        services: Vec<String>,
    },
}
