//! Command-line adapter over the circulation core.
//!
//! # Responsibility
//! - Load the library snapshot from a SQLite file, run one command and save
//!   the result back. Mutating commands hold the database write lock from
//!   load to save, so concurrent invocations serialize.
//! - Print JSON for listings and the receipt text for circulation commands.

use clap::{Parser, Subcommand};
use libris_core::{
    init_logging, open_db, with_write_lock, CirculationEngine, LibraryConfig, LibraryError,
    SnapshotRepository, SqliteSnapshotRepository, SystemClock,
};
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "libris", version, about = "Library circulation desk")]
struct Cli {
    /// SQLite file holding the library; created on first use.
    db_path: PathBuf,

    /// Absolute directory for rolling log files.
    #[arg(long, env = "LIBRIS_LOG_DIR")]
    log_dir: Option<String>,

    #[arg(long, env = "LIBRIS_LOG_LEVEL", default_value = libris_core::default_log_level())]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every book, or only one category.
    Books {
        #[arg(long)]
        category: Option<String>,
    },
    AddBook {
        title: String,
        author: String,
        category: String,
        copies: u32,
    },
    /// Remove a book nobody holds or waits for.
    RemoveBook { book_id: u32 },
    Members,
    AddMember {
        name: String,
        email: String,
        phone: String,
    },
    /// Show a member with current loans and reservations.
    Member { member_id: u32 },
    Search { query: String },
    Issue { book_id: u32, member_id: u32 },
    Return { book_id: u32, member_id: u32 },
    Reserve { book_id: u32, member_id: u32 },
    Cancel { book_id: u32, member_id: u32 },
    /// Pending reservations, optionally for one book.
    Reservations {
        #[arg(long)]
        book_id: Option<u32>,
    },
    /// Overdue loans as of now, most overdue first.
    Overdue,
    /// Register the demo books and members.
    Seed,
}

impl Command {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Self::AddBook { .. }
                | Self::RemoveBook { .. }
                | Self::AddMember { .. }
                | Self::Issue { .. }
                | Self::Return { .. }
                | Self::Reserve { .. }
                | Self::Cancel { .. }
                | Self::Seed
        )
    }
}

#[derive(Debug, Serialize)]
struct OverdueReport {
    lines: Vec<libris_core::OverdueLine>,
    total_fines: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(log_dir) = cli.log_dir.as_deref() {
        if let Err(err) = init_logging(&cli.log_level, log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error[{}]: {err}", err.code());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<String, LibraryError> {
    let config = LibraryConfig::from_env()?;
    let mut conn = open_db(&cli.db_path)?;
    let output = if cli.command.mutates() {
        with_write_lock(&mut conn, |repo| {
            let engine = load_engine(repo, config)?;
            let output = execute(&engine, &cli.command)?;
            repo.save_snapshot(&engine.snapshot())?;
            Ok(output)
        })?
    } else {
        let engine = load_engine(&SqliteSnapshotRepository::new(&conn), config)?;
        execute(&engine, &cli.command)?
    };
    info!("event=cli_command module=cli status=ok mutated={}", cli.command.mutates());
    Ok(output)
}

fn load_engine(
    repo: &SqliteSnapshotRepository<'_>,
    config: LibraryConfig,
) -> Result<CirculationEngine, LibraryError> {
    match repo.load_snapshot()? {
        Some(snapshot) => CirculationEngine::from_snapshot(config, Arc::new(SystemClock), snapshot),
        None => CirculationEngine::new(config),
    }
}

fn execute(engine: &CirculationEngine, command: &Command) -> Result<String, LibraryError> {
    match command {
        Command::Books { category: None } => json(&engine.list_books()),
        Command::Books {
            category: Some(category),
        } => json(&engine.list_books_by_category(category)),
        Command::AddBook {
            title,
            author,
            category,
            copies,
        } => json(&engine.register_book(title, author, category, *copies)?),
        Command::RemoveBook { book_id } => json(&engine.remove_book(*book_id)?),
        Command::Members => json(&engine.list_members()),
        Command::AddMember { name, email, phone } => {
            json(&engine.register_member(name, email, phone)?)
        }
        Command::Member { member_id } => json(&engine.get_member_details(*member_id)?),
        Command::Search { query } => json(&engine.search_books(query)),
        Command::Issue { book_id, member_id } => {
            Ok(engine.issue_book(*book_id, *member_id)?.to_string())
        }
        Command::Return { book_id, member_id } => {
            Ok(engine.return_book(*book_id, *member_id)?.to_string())
        }
        Command::Reserve { book_id, member_id } => {
            Ok(engine.reserve_book(*book_id, *member_id)?.to_string())
        }
        Command::Cancel { book_id, member_id } => {
            engine.cancel_reservation(*book_id, *member_id)?;
            Ok("Reservation cancelled.".to_string())
        }
        Command::Reservations { book_id: None } => json(&engine.list_reservations()),
        Command::Reservations {
            book_id: Some(book_id),
        } => json(&engine.list_reservations_for_book(*book_id)?),
        Command::Overdue => {
            let now_ms = engine.now_ms();
            json(&OverdueReport {
                lines: engine.overdue_report_lines(now_ms)?,
                total_fines: engine.total_outstanding_fines(now_ms),
            })
        }
        Command::Seed => {
            let books = engine.load_sample_books()?;
            let members = engine.load_sample_members()?;
            Ok(format!(
                "Seeded {} books and {} members.",
                books.len(),
                members.len()
            ))
        }
    }
}

fn json<T: Serialize>(value: &T) -> Result<String, LibraryError> {
    serde_json::to_string_pretty(value)
        .map_err(|err| LibraryError::InvalidData(format!("cannot render output: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{run, Cli, Command};
    use clap::Parser;
    use libris_core::LibraryError;
    use std::path::Path;

    fn run_args(db: &Path, args: &[&str]) -> Result<String, LibraryError> {
        let mut argv = vec!["libris", db.to_str().unwrap()];
        argv.extend_from_slice(args);
        run(&Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn parses_circulation_command() {
        let cli = Cli::try_parse_from(["libris", "lib.sqlite3", "issue", "101", "1"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Issue {
                book_id: 101,
                member_id: 1
            }
        ));
        assert!(cli.command.mutates());
    }

    #[test]
    fn listing_commands_do_not_save() {
        let cli = Cli::try_parse_from(["libris", "lib.sqlite3", "books", "--category", "Tech"])
            .unwrap();
        assert!(!cli.command.mutates());
    }

    #[test]
    fn each_invocation_sees_the_previous_commit() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("lib.sqlite3");

        run_args(&db, &["seed"]).unwrap();
        let issued = run_args(&db, &["issue", "108", "1"]).unwrap();
        assert!(issued.starts_with("Book issued successfully."));

        let err = run_args(&db, &["issue", "108", "2"]).unwrap_err();
        assert!(matches!(err, LibraryError::Unavailable { book_id: 108 }));

        let details = run_args(&db, &["member", "1"]).unwrap();
        assert!(details.contains("A Brief History of Time"));
    }
}
