//! 🚀 orca-cli: the front door, and the driver who waits exactly zero seconds
//! after the doors close.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 Thin wrapper: parse flags, set up logging, load config, call `orca::run`,
//! print the summary or the error chain. The real work lives in the library. 🦆

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL};
use orca::RunSummary;
use orca::app_config::{ConfigOverrides, Platform};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 🚌 Load recorded bus trips into Postgres.
#[derive(Debug, Parser)]
#[command(name = "orca", version, about)]
struct Cli {
    /// 📋 TOML config file. Optional; env vars and flags can carry everything.
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// 🐘 Target platform for --conn-str.
    #[arg(long, value_enum)]
    platform: Option<CliPlatform>,

    /// 🔗 postgresql://<user>:<pass>@<host>:<port>/<db>?<setting=value>
    #[arg(long, alias = "connStr", requires = "platform", value_name = "URL")]
    conn_str: Option<String>,

    /// 📂 Directory holding metaData.csv and one CSV per trip.
    #[arg(long, alias = "dataDir", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// 🏗️ Run the schema migrations before loading.
    #[arg(long)]
    migrate: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPlatform {
    Postgresql,
}

impl From<CliPlatform> for Platform {
    fn from(platform: CliPlatform) -> Self {
        match platform {
            CliPlatform::Postgresql => Platform::Postgresql,
        }
    }
}

/// 🚀 main(): where it all begins. The "I pressed enter and held my breath" moment.
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 default to info so a bare run still says what it's doing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // 🔒 Validate the config file exists before we get too emotionally attached
    if let Some(config_file) = &cli.config {
        let exists = config_file.try_exists().with_context(|| {
            format!(
                "💀 could not check whether the config file exists: '{}'",
                config_file.display()
            )
        })?;
        anyhow::ensure!(
            exists,
            "💀 Configuration file not found at '{}'. If it's a relative path, it's relative to \
             the current working directory; an absolute path removes all doubt.",
            config_file.display()
        );
    }

    let overrides = ConfigOverrides {
        platform: cli.platform.map(Platform::from),
        conn_str: cli.conn_str,
        data_dir: cli.data_dir,
        migrate: cli.migrate,
    };
    let app_config = orca::app_config::load_config(cli.config.as_deref(), &overrides)
        .context("💀 couldn't load the configuration. Check the file, the ORCA_* variables and the flags.")?;

    match orca::run(app_config).await {
        Ok(summary) => {
            println!("{}", render_summary(&summary));
            info!("✅ done");
            Ok(())
        }
        Err(err) => {
            report_failure(&err);
            std::process::exit(1);
        }
    }
}

/// 🧅 Peel the error onion one layer at a time, with a hint if it smells like networking.
fn report_failure(err: &anyhow::Error) {
    error!("💀 error: {}", err);
    let mut the_vibes_are_giving_connection_issues = false;
    for cause in err.chain().skip(1) {
        error!("⚠️  cause: {}", cause);
        let cause_str = cause.to_string().to_lowercase();
        if cause_str.contains("connection refused")
            || cause_str.contains("pool timed out")
            || cause_str.contains("error communicating with database")
            || cause_str.contains("could not connect")
            || cause_str.contains("password authentication failed")
        {
            the_vibes_are_giving_connection_issues = true;
        }
    }

    if the_vibes_are_giving_connection_issues {
        error!(
            "🔧 hint: the database doesn't seem reachable. Check that Postgres is running, \
             that the URL's host, port and credentials are right, and that the pool isn't \
             smaller than what the server allows. If you're using Docker, `docker ps` is a good start."
        );
    }
}

fn render_summary(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["🚌 orca run", ""]);
    let rows: [(&str, String); 6] = [
        ("trips", summary.trips_total.to_string()),
        ("loaded", summary.trips_loaded.to_string()),
        ("skipped", summary.trips_skipped.to_string()),
        ("batches committed", summary.batches_committed.to_string()),
        ("rows committed", summary.rows_committed.to_string()),
        ("elapsed", format_elapsed(summary.elapsed)),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_camel_case_flags_still_work() {
        let cli = Cli::try_parse_from([
            "orca",
            "--platform",
            "postgresql",
            "--connStr",
            "postgresql://orca@localhost/ztbus",
            "--dataDir",
            "/data/ztbus",
        ])
        .expect("💀 camelCase aliases should parse");
        assert_eq!(cli.conn_str.as_deref(), Some("postgresql://orca@localhost/ztbus"));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/data/ztbus")));
    }

    #[test]
    fn the_one_where_a_conn_str_needs_a_platform() {
        let cli = Cli::try_parse_from(["orca", "--conn-str", "postgresql://orca@localhost/ztbus"]);
        assert!(cli.is_err());
    }

    #[test]
    fn the_one_where_the_summary_table_lists_the_numbers() {
        let summary = RunSummary {
            trips_total: 3,
            trips_loaded: 2,
            trips_skipped: 1,
            batches_committed: 7,
            rows_committed: 31_337,
            elapsed: Duration::from_millis(2_500),
        };
        let rendered = render_summary(&summary).to_string();
        assert!(rendered.contains("31337"));
        assert!(rendered.contains("2.5s"));
        assert!(rendered.contains("skipped"));
    }
}
