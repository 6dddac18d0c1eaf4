//! The `query` subcommand: run a stored query once and print it.

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use ipotracker_lib::{
    recent_ipos_response, upcoming_ipos_response, PipelineConfig, QueryResponse, RecentIpoRow,
    UpcomingIpoRow,
};

use crate::output::{
    print_json, print_recent_csv, print_recent_markdown, print_recent_table, print_upcoming_csv,
    print_upcoming_markdown, print_upcoming_table, OutputFormat,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum QueryKind {
    /// Completed IPOs, newest offer first
    Recent,
    /// IPOs expected to trade today or later
    Upcoming,
}

/// Arguments for the `query` subcommand.
#[derive(Args)]
pub struct QueryArgs {
    /// Which query to run
    #[arg(value_enum)]
    pub kind: QueryKind,

    /// Reference date for `upcoming` (YYYY-MM-DD, default today)
    #[arg(long)]
    pub today: Option<String>,
}

fn parse_today(arg: Option<&str>) -> Result<chrono::NaiveDate> {
    match arg {
        Some(text) => Ok(chrono::NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")?),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

pub fn run(args: &QueryArgs, config: &PipelineConfig, format: &OutputFormat) -> Result<()> {
    let response: QueryResponse = match args.kind {
        QueryKind::Recent => recent_ipos_response(&config.database_path),
        QueryKind::Upcoming => {
            let today = parse_today(args.today.as_deref())?;
            upcoming_ipos_response(&config.database_path, today)
        }
    };

    if *format == OutputFormat::Envelope {
        print_json(&response);
        return Ok(());
    }
    if !response.is_success() {
        bail!("query failed ({}): {}", response.status_code, response.body);
    }

    match args.kind {
        QueryKind::Recent => {
            let rows: Vec<RecentIpoRow> = serde_json::from_str(&response.body)?;
            eprintln!("{} recent IPOs", rows.len());
            match format {
                OutputFormat::Json => print_json(&rows),
                OutputFormat::Csv => print_recent_csv(&rows)?,
                OutputFormat::Markdown => print_recent_markdown(&rows),
                _ => print_recent_table(&rows),
            }
        }
        QueryKind::Upcoming => {
            let rows: Vec<UpcomingIpoRow> = serde_json::from_str(&response.body)?;
            eprintln!("{} upcoming IPOs", rows.len());
            match format {
                OutputFormat::Json => print_json(&rows),
                OutputFormat::Csv => print_upcoming_csv(&rows)?,
                OutputFormat::Markdown => print_upcoming_markdown(&rows),
                _ => print_upcoming_table(&rows),
            }
        }
    }
    Ok(())
}
