//! A command-line tool for invoking the election contract directly against
//! a MongoDB-backed ledger, bypassing the HTTP gateway.

use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use ballot_ledger::config::Config;
use ballot_ledger::contract::{Caller, Invocation, VotingContract};
use ballot_ledger::error::Error;
use ballot_ledger::ledger::{MongoLedger, SharedLedger};

const PROGRAM_NAME: &str = "ledger-cli";

const ABOUT_TEXT: &str = "Invoke an election contract function on the ledger.

FUNCTIONS:
    InitElection CANDIDATES_JSON START_TIME END_TIME
    RegisterVoter VOTER_ID
    CastVote VOTER_ID CANDIDATE_ID
    GetResults
    GetVoterStatus VOTER_ID
    GetElectionInfo

EXIT CODES:
     0: The invocation succeeded.
     1: The invocation was rejected.
     2: The ledger could not be reached.";

const DB_URI: &str = "DB_URI";
const DB_NAME: &str = "DB_NAME";
const CALLER: &str = "CALLER";
const ALLOW_REINIT: &str = "ALLOW_REINIT";
const FUNCTION: &str = "FUNCTION";
const ARGS: &str = "ARGS";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(DB_URI)
                .long("db-uri")
                .help("MongoDB connection string")
                .default_value("mongodb://localhost:27017"),
        )
        .arg(
            Arg::new(DB_NAME)
                .long("db-name")
                .help("Database holding the ledger")
                .default_value("ballot_ledger"),
        )
        .arg(
            Arg::new(CALLER)
                .long("caller")
                .help("Identity to record the invocation under")
                .default_value(Caller::ANONYMOUS),
        )
        .arg(
            Arg::new(ALLOW_REINIT)
                .long("allow-reinitialization")
                .help("Let InitElection overwrite an existing election")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(FUNCTION)
                .help("The contract function to call")
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(ARGS)
                .help("Arguments to the function")
                .action(ArgAction::Append)
                .num_args(1..),
        )
}

/// Map a rejected invocation to the process exit code.
fn exit_code_for(err: &Error) -> u8 {
    if err.store_failure().is_some() {
        2
    } else {
        1
    }
}

/// Parse the function call named on the command line.
fn invocation_from(args: &ArgMatches) -> Result<Invocation, Error> {
    // Unwrap is safe as the argument is required.
    let function = args.get_one::<String>(FUNCTION).unwrap();
    let fn_args = args
        .get_many::<String>(ARGS)
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    Invocation::parse(function, fn_args)
}

async fn run(args: &ArgMatches) -> u8 {
    let invocation = match invocation_from(args) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("{err}");
            return exit_code_for(&err);
        }
    };

    // Unwraps are safe as these arguments have defaults.
    let db_uri = args.get_one::<String>(DB_URI).unwrap();
    let db_name = args.get_one::<String>(DB_NAME).unwrap();
    let caller = Caller::new(args.get_one::<String>(CALLER).unwrap());
    let config = Config::new(args.get_flag(ALLOW_REINIT));

    let ledger: SharedLedger = match MongoLedger::connect(db_uri, db_name).await {
        Ok(ledger) => Arc::new(ledger),
        Err(err) => {
            eprintln!("Failed to connect to {db_uri}: {err}");
            return 2;
        }
    };
    let contract = VotingContract::new(ledger, &config);

    match contract.invoke(&caller, invocation).await {
        Ok(output) => {
            match serde_json::to_string_pretty(&output) {
                Ok(json) => println!("{json}"),
                Err(err) => {
                    eprintln!("Failed to format output: {err}");
                    return 1;
                }
            }
            0
        }
        Err(err) => {
            eprintln!("{err}");
            exit_code_for(&err)
        }
    }
}

#[rocket::main]
async fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args).await;
    std::process::exit(exit_code.into())
}
