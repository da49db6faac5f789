//! Command-line interface for the lottery results pipeline.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Credentials can be provided via command-line flags or environment
//! variables, which is how the cron deployment injects them.

use chrono::NaiveDate;
use clap::Parser;

/// Command-line arguments for one pipeline run.
///
/// Everything that varies between runs lives here; everything that
/// describes the sources, groups and templates lives in the YAML config
/// file.
///
/// # Examples
///
/// ```sh
/// # Scrape yesterday's draws and deliver to all groups
/// loteria_feed -c config.yaml
///
/// # Re-run a specific date without sending anything
/// loteria_feed -c config.yaml --date 2024-03-10 --dry-run
///
/// # Evening run for the current day, with a run report
/// loteria_feed --today -r ./reports
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: String,

    /// Draw date to scrape (YYYY-MM-DD); defaults to yesterday
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Scrape today's draws instead of yesterday's
    #[arg(long, conflicts_with = "date")]
    pub today: bool,

    /// Scrape and render everything but send nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Directory for per-run JSON reports (omit to skip reports)
    #[arg(short, long)]
    pub report_dir: Option<String>,

    /// Telegram bot token; overrides the config file
    #[arg(long, env = "TELEGRAM_BOT_TOKEN")]
    pub telegram_bot_token: Option<String>,

    /// WhatsApp gateway base URL; overrides the config file
    #[arg(long, env = "WHATSAPP_GATEWAY_URL")]
    pub whatsapp_gateway_url: Option<String>,

    /// WhatsApp gateway API key; overrides the config file
    #[arg(long, env = "WHATSAPP_API_KEY")]
    pub whatsapp_api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["loteria_feed"]);
        assert_eq!(cli.config, "config.yaml");
        assert!(cli.date.is_none());
        assert!(!cli.today);
        assert!(!cli.dry_run);
        assert!(cli.report_dir.is_none());
    }

    #[test]
    fn test_cli_date_and_dry_run() {
        let cli = Cli::parse_from(["loteria_feed", "--date", "2024-03-10", "--dry-run"]);
        assert_eq!(
            cli.date,
            Some(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
        );
        assert!(cli.dry_run);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["loteria_feed", "-c", "/etc/loteria.yaml", "-r", "/var/reports"]);
        assert_eq!(cli.config, "/etc/loteria.yaml");
        assert_eq!(cli.report_dir.as_deref(), Some("/var/reports"));
    }

    #[test]
    fn test_today_conflicts_with_date() {
        let result = Cli::try_parse_from(["loteria_feed", "--today", "--date", "2024-03-10"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let result = Cli::try_parse_from(["loteria_feed", "--date", "10/03/2024"]);
        assert!(result.is_err());
    }
}
