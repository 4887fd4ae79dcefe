//! simpledb-migrate CLI
//!
//! Command-line tool for inspecting schema snapshots and migration plans.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use simpledb::apply::plan_statements;
use simpledb::prelude::*;

/// Inspect simpledb schema snapshots.
#[derive(Parser)]
#[command(name = "simpledb-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Snapshot directory.
    #[arg(short, long, env = "SIMPLEDB_MIGRATIONS_DIR", default_value = "./migrations/")]
    dir: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the latest snapshot.
    Show {
        /// Print the raw JSON document.
        #[arg(long)]
        json: bool,
    },

    /// Print the statements creating the latest snapshot from scratch.
    Sql,

    /// Print the statements migrating one snapshot file to another.
    Diff {
        /// Snapshot to migrate from.
        old: PathBuf,
        /// Snapshot to migrate to.
        new: PathBuf,
    },

    /// List snapshot files, oldest first.
    List,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let stdout = io::stdout();
    run(&cli.command, &cli.dir, &mut stdout.lock())
}

fn run(command: &Commands, dir: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let store = SnapshotStore::new(dir);
    debug!(dir = %dir.display(), "Using snapshot directory");

    match command {
        Commands::Show { json } => {
            let migration = store.load()?;
            if *json {
                writeln!(out, "{}", serde_json::to_string_pretty(&migration)?)?;
            } else {
                write_summary(&migration, out)?;
            }
        }

        Commands::Sql => {
            let migration = store.load()?;
            let diff = migration.diff(&Migration::new());
            write_statements(&diff, out)?;
        }

        Commands::Diff { old, new } => {
            let old_migration = SnapshotStore::read(old)
                .with_context(|| format!("Failed to read {}", old.display()))?;
            let new_migration = SnapshotStore::read(new)
                .with_context(|| format!("Failed to read {}", new.display()))?;
            let diff = new_migration.diff(&old_migration);
            if diff.is_empty() {
                info!("No changes between the two snapshots.");
            } else {
                write_statements(&diff, out)?;
            }
        }

        Commands::List => {
            let snapshots = store.list()?;
            if snapshots.is_empty() {
                info!("No migration files in {}.", dir.display());
            }
            for (timestamp, path) in snapshots {
                writeln!(
                    out,
                    "{}  {}",
                    timestamp.format("%Y-%m-%d %H:%M:%S"),
                    path.display()
                )?;
            }
        }
    }

    Ok(())
}

fn write_summary(migration: &Migration, out: &mut impl Write) -> io::Result<()> {
    if migration.tables.is_empty() {
        info!("No tables in the latest snapshot.");
    }
    for table in &migration.tables {
        writeln!(out, "{}", table.name)?;
        for column in &table.columns {
            writeln!(out, "    {column}")?;
        }
        for relation in &table.relations {
            writeln!(out, "    {relation} ({})", relation.kind)?;
        }
    }
    Ok(())
}

fn write_statements(diff: &SchemaDiff, out: &mut impl Write) -> io::Result<()> {
    for statement in plan_statements(diff) {
        writeln!(out, "-- {}", statement.target)?;
        writeln!(out, "{};", statement.sql)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn user_snapshot(with_email: bool) -> Migration {
        let mut table = Table::new("user")
            .column(Column::new("user", "id", DbType::BigInt).primary().auto())
            .column(Column::new("user", "name", DbType::Varchar).length(255));
        if with_email {
            table = table.column(Column::new("user", "email", DbType::Varchar).unique());
        }
        Migration::new().table(table)
    }

    fn at(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, second)
            .unwrap()
    }

    fn run_to_string(command: Commands, dir: &Path) -> String {
        let mut out = Vec::new();
        run(&command, dir, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_show_prints_latest_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        store.save_at(&user_snapshot(false), at(0)).unwrap();
        store.save_at(&user_snapshot(true), at(1)).unwrap();

        let output = run_to_string(Commands::Show { json: false }, tmp.path());
        assert!(output.starts_with("user\n"));
        assert!(output.contains("    email VARCHAR NOT NULL UNIQUE\n"));

        let output = run_to_string(Commands::Show { json: true }, tmp.path());
        let parsed: Migration = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.tables, user_snapshot(true).tables);
    }

    #[test]
    fn test_sql_creates_latest_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        SnapshotStore::new(tmp.path())
            .save_at(&user_snapshot(false), at(0))
            .unwrap();

        let output = run_to_string(Commands::Sql, tmp.path());
        assert_eq!(
            output,
            "-- user\nCREATE TABLE user (id BIGINT NOT NULL PRIMARY KEY AUTO_INCREMENT, \
             name VARCHAR(255) NOT NULL);\n"
        );
    }

    #[test]
    fn test_diff_between_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let old = store.save_at(&user_snapshot(false), at(0)).unwrap();
        let new = store.save_at(&user_snapshot(true), at(1)).unwrap();

        let output = run_to_string(Commands::Diff { old: old.clone(), new: new.clone() }, tmp.path());
        assert_eq!(
            output,
            "-- user.email\nALTER TABLE user ADD COLUMN email VARCHAR NOT NULL UNIQUE;\n"
        );

        let output = run_to_string(Commands::Diff { old: new, new: old }, tmp.path());
        assert_eq!(output, "-- user.email\nALTER TABLE user DROP COLUMN email;\n");
    }

    #[test]
    fn test_list_orders_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        store.save_at(&user_snapshot(true), at(5)).unwrap();
        store.save_at(&user_snapshot(false), at(2)).unwrap();

        let output = run_to_string(Commands::List, tmp.path());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("2024-05-01 10:00:02"));
        assert!(lines[1].ends_with("Migration_2024-05-01-10-00-05.json"));
    }

    #[test]
    fn test_missing_diff_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let command = Commands::Diff {
            old: tmp.path().join("nope.json"),
            new: tmp.path().join("nope.json"),
        };
        let mut out = Vec::new();
        let err = run(&command, tmp.path(), &mut out).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
