//! Command-line driver for the ballotbox core.
//!
//! # Responsibility
//! - Map one subcommand onto one integrity-service operation.
//! - Print results as JSON and errors as `kind` + message, unmodified.
//!
//! # Invariants
//! - Every mutating subcommand runs inside a single SQLite transaction.

use ballotbox_core::db::{open_db, with_transaction};
use ballotbox_core::{
    default_log_level, init_stderr_logging, BallotConfig, ErrorKind, SqliteTables, VotingError,
    VotingResult, VotingService,
};
use clap::{Parser, Subcommand, ValueEnum};
use log::error;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "ballotbox_cli", version)]
#[command(about = "Drive the ballotbox voting store from the command line")]
struct Cli {
    /// SQLite database file, created and migrated on first use
    #[arg(value_name = "DB_PATH")]
    db_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BALLOTBOX_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Report the core version without touching the database
    Ping,

    /// Register a user with a unique username
    CreateUser { username: String },

    /// Delete a user and the proposals they own
    DeleteUser { id: String },

    /// Create a proposal owned by an existing user
    CreateProposal {
        name: String,
        description: String,
        user_id: String,
    },

    /// Delete a proposal and its owner back-reference
    DeleteProposal { id: String },

    /// Cast a vote on a proposal
    Vote {
        proposal_id: String,
        voter_id: String,
        #[arg(value_enum)]
        choice: Choice,
    },

    /// List every user in key order
    Users,

    /// List every proposal in key order
    Proposals,

    /// List every vote in key order
    Votes,

    /// Show one user
    User { id: String },

    /// Show one proposal
    Proposal { id: String },

    /// Show one vote
    VoteById { id: String },

    /// Count votes for and against a proposal
    Tally { id: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    #[value(alias = "yes")]
    For,
    #[value(alias = "no")]
    Against,
}

impl From<Choice> for bool {
    fn from(choice: Choice) -> Self {
        choice == Choice::For
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    if let Err(err) = init_stderr_logging(&level) {
        eprintln!("logging disabled: {err}");
    }

    let config = match BallotConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error kind={} message={err}", ErrorKind::InvalidInput);
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, &config) {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(
                "event=cli_command module=cli status=error error_kind={}",
                err.kind()
            );
            eprintln!("error kind={} message={err}", err.kind());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &BallotConfig) -> VotingResult<Value> {
    if cli.command == Command::Ping {
        return Ok(ping_report());
    }

    let conn = open_db(&cli.db_path)?;
    let tables = SqliteTables::sqlite(&conn, &config.store)?;
    let mut service = VotingService::with_config(tables, config.service);

    match &cli.command {
        Command::Ping => Ok(ping_report()),
        Command::CreateUser { username } => {
            with_transaction(&conn, || service.create_user(username).and_then(to_json))
        }
        Command::DeleteUser { id } => {
            with_transaction(&conn, || service.delete_user(id).and_then(to_json))
        }
        Command::CreateProposal {
            name,
            description,
            user_id,
        } => with_transaction(&conn, || {
            service
                .create_proposal(name, description, user_id)
                .and_then(to_json)
        }),
        Command::DeleteProposal { id } => {
            with_transaction(&conn, || service.delete_proposal(id).and_then(to_json))
        }
        Command::Vote {
            proposal_id,
            voter_id,
            choice,
        } => with_transaction(&conn, || {
            service
                .vote(proposal_id, voter_id, (*choice).into())
                .and_then(to_json)
        }),
        Command::Users => service.list_users().and_then(to_json),
        Command::Proposals => service.list_proposals().and_then(to_json),
        Command::Votes => service.list_votes().and_then(to_json),
        Command::User { id } => service.get_user(id).and_then(to_json),
        Command::Proposal { id } => service.get_proposal(id).and_then(to_json),
        Command::VoteById { id } => service.get_vote(id).and_then(to_json),
        Command::Tally { id } => service.proposal_tally(id).and_then(to_json),
    }
}

fn ping_report() -> Value {
    json!({
        "ping": ballotbox_core::ping(),
        "version": ballotbox_core::core_version(),
    })
}

fn to_json<T: serde::Serialize>(value: T) -> VotingResult<Value> {
    serde_json::to_value(value)
        .map_err(|err| VotingError::InconsistentState(format!("result encoding failed: {err}")))
}
