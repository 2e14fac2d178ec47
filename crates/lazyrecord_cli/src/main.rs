//! Command-line access to a LazyRecord database.
//!
//! # Responsibility
//! - Run single counter, greeting and pool operations against a database
//!   file, for local inspection and scripting.
//! - Keep output deterministic: one value per line on stdout, errors on
//!   stderr with a non-zero exit code.

use clap::{Parser, Subcommand};
use lazyrecord_core::{
    core_version, init_logging, ping, Backend, BackendOptions, Counter, CounterService, Greeting,
    GreetingService, HelloMessage, LogTarget, MessageService, SqliteEntityStore,
    SqliteRandomPoolStore, StoreOptions,
};
use log::debug;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(author, version, about = "LazyRecord database CLI")]
struct Args {
    /// SQLite database file (created and migrated on first use).
    #[arg(long, default_value = "lazyrecord.sqlite3")]
    db: PathBuf,
    /// Per-operation deadline in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Emit core diagnostics to stderr at this level.
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core linkage probe and version.
    Ping,
    /// Singleton counter.
    Count {
        #[command(subcommand)]
        action: CountAction,
    },
    /// Print (creating on first use) the greeting for NAME.
    Greet { name: String },
    /// Random message pool.
    Pool {
        #[command(subcommand)]
        action: PoolAction,
    },
}

#[derive(Debug, Subcommand)]
enum CountAction {
    Get,
    /// Add a positive amount.
    Add {
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
}

#[derive(Debug, Subcommand)]
enum PoolAction {
    Add { message: String },
    Sample,
    Count,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), String> {
    if let Some(level) = args.log_level.as_deref() {
        init_logging(level, LogTarget::Stderr)?;
    }

    if let Command::Ping = args.command {
        println!("lazyrecord_core ping={}", ping());
        println!("lazyrecord_core version={}", core_version());
        return Ok(());
    }

    let backend =
        Backend::open(&args.db, &BackendOptions::default()).map_err(|err| err.to_string())?;
    debug!("event=cli_command module=cli status=start");
    let options = StoreOptions {
        timeout: args.timeout_ms.map(Duration::from_millis),
        auto_create_on_update: true,
    };

    let outcome = execute(&backend, options, args.command);
    backend.close();
    outcome
}

fn execute(backend: &Backend, options: StoreOptions, command: Command) -> Result<(), String> {
    match command {
        Command::Ping => {}
        Command::Count { action } => {
            let service = CounterService::new(
                SqliteEntityStore::<Counter>::new(backend.clone()).with_options(options),
            );
            match action {
                CountAction::Get => {
                    println!("{}", service.current().map_err(|err| err.to_string())?)
                }
                CountAction::Add { amount } => {
                    service.increment(amount).map_err(|err| err.to_string())?;
                    println!("{}", service.current().map_err(|err| err.to_string())?);
                }
            }
        }
        Command::Greet { name } => {
            let service = GreetingService::new(
                SqliteEntityStore::<Greeting>::new(backend.clone()).with_options(options),
            );
            println!("{}", service.greet(&name).map_err(|err| err.to_string())?);
        }
        Command::Pool { action } => {
            let mut store = SqliteRandomPoolStore::<HelloMessage>::new(backend.clone());
            if let Some(timeout) = options.timeout {
                store = store.with_timeout(timeout);
            }
            let service = MessageService::new(store);
            match action {
                PoolAction::Add { message } => {
                    service.post(&message).map_err(|err| err.to_string())?
                }
                PoolAction::Sample => {
                    println!("{}", service.random().map_err(|err| err.to_string())?)
                }
                PoolAction::Count => {
                    println!("{}", service.size().map_err(|err| err.to_string())?)
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{execute, Args, Command, CountAction, PoolAction};
    use clap::Parser;
    use lazyrecord_core::{Backend, StoreOptions};

    #[test]
    fn parses_nested_subcommands_and_globals() {
        let args =
            Args::try_parse_from(["lazyrecord_cli", "--db", "x.db", "count", "add", "3"]).unwrap();
        assert_eq!(args.db.to_str(), Some("x.db"));
        assert!(matches!(
            args.command,
            Command::Count {
                action: CountAction::Add { amount: 3 }
            }
        ));

        let args = Args::try_parse_from(["lazyrecord_cli", "pool", "add", "hi there"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Pool { action: PoolAction::Add { ref message } } if message == "hi there"
        ));
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(Args::try_parse_from(["lazyrecord_cli", "drop"]).is_err());
        assert!(Args::try_parse_from(["lazyrecord_cli", "count", "add", "many"]).is_err());
    }

    #[test]
    fn execute_surfaces_service_errors_as_messages() {
        let backend = Backend::open_in_memory().unwrap();
        let options = StoreOptions {
            timeout: None,
            auto_create_on_update: true,
        };

        let err = execute(
            &backend,
            options,
            Command::Count {
                action: CountAction::Add { amount: 0 },
            },
        )
        .unwrap_err();
        assert!(err.contains("positive"));

        let err = execute(
            &backend,
            options,
            Command::Pool {
                action: PoolAction::Sample,
            },
        )
        .unwrap_err();
        assert!(err.contains("empty"));
    }
}
