// server/src/cli/commands.rs

// This file defines the command-line arguments and subcommands
// for the `hms` CLI using the `clap` crate.
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use hms_lib::services::ReportKind;

#[derive(Parser, Debug)]
#[command(name = "hms")]
#[command(version)]
#[command(about = "Hospital administration backend")]
pub struct CliArgs {
    /// YAML configuration file; defaults to config/hms.yaml when present.
    #[arg(long, short = 'c', global = true, env = "HMS_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the REST API until interrupted.
    Serve {
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },
    /// Create the default wards and an administrator account.
    Seed {
        #[arg(long, env = "HMS_ADMIN_EMAIL")]
        admin_email: String,
        #[arg(long, env = "HMS_ADMIN_PASSWORD")]
        admin_password: String,
        #[arg(long, default_value = "Administrator")]
        admin_name: String,
    },
    /// Bill outstanding bed days for every patient holding a bed.
    Accrue,
    /// Write a report to a file.
    Report {
        #[arg(value_enum)]
        kind: ReportArg,
        #[arg(long, value_enum, default_value_t = FileFormat::Csv)]
        format: FileFormat,
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        out: PathBuf,
        /// First day included (YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day included (YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportArg {
    Financial,
    Census,
    Inventory,
}

impl From<ReportArg> for ReportKind {
    fn from(arg: ReportArg) -> Self {
        match arg {
            ReportArg::Financial => ReportKind::Financial,
            ReportArg::Census => ReportKind::Census,
            ReportArg::Inventory => ReportKind::Inventory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FileFormat {
    Csv,
    Doc,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_report_arguments() {
        let args = CliArgs::try_parse_from([
            "hms", "report", "financial", "--out", "out.csv", "--from", "2026-01-01", "--to", "2026-01-31",
        ])
        .unwrap();
        match args.command {
            Commands::Report { kind, format, from, .. } => {
                assert_eq!(kind, ReportArg::Financial);
                assert_eq!(format, FileFormat::Csv);
                assert_eq!(from, NaiveDate::from_ymd_opt(2026, 1, 1));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
