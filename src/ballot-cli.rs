//! A command-line client for the election contract.
//! Each invocation connects as one account, performs one action, and reports
//! the outcome the same way a browser session would.

use std::time::Duration;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use thiserror::Error;

use chain_ballot::contract::rpc::RpcConnector;
use chain_ballot::hasher::RelayHasher;
use chain_ballot::model::{Address, IdentityHash};
use chain_ballot::workflow::{Action, Dashboard, Precondition, WalletEvent, WorkflowError};

const PROGRAM_NAME: &str = "ballot-cli";

const ABOUT_TEXT: &str = "Take part in an on-chain election.

EXIT CODES:
     0: Success.
     1: Error, including refusals by the contract.";

const RPC_URL: &str = "RPC_URL";
const CONTRACT: &str = "CONTRACT";
const ACCOUNT: &str = "ACCOUNT";
const RELAY_URL: &str = "RELAY_URL";
const POLL_INTERVAL: &str = "POLL_INTERVAL";
const IDENTITY: &str = "IDENTITY";
const INDEX: &str = "INDEX";
const NAME: &str = "NAME";
const ADDRESS: &str = "ADDRESS";

fn parse_address(s: &str) -> Result<Address, String> {
    if !s.starts_with("0x") {
        return Err("addresses start with `0x`".to_string());
    }
    s.parse::<Address>().map_err(|e| e.to_string())
}

fn identity_arg() -> Arg {
    Arg::new(IDENTITY)
        .help("The identity number. It is only ever sent to the hashing relay.")
        .action(ArgAction::Set)
        .required(true)
}

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .arg(
            Arg::new(RPC_URL)
                .long("rpc-url")
                .env("BALLOT_RPC_URL")
                .default_value("http://127.0.0.1:8545")
                .help("JSON-RPC endpoint of the node")
                .global(true),
        )
        .arg(
            Arg::new(CONTRACT)
                .long("contract")
                .env("BALLOT_CONTRACT")
                .value_parser(parse_address)
                .help("Address of the deployed election contract")
                .global(true),
        )
        .arg(
            Arg::new(ACCOUNT)
                .long("account")
                .env("BALLOT_ACCOUNT")
                .value_parser(parse_address)
                .help("Node-managed account to act as")
                .global(true),
        )
        .arg(
            Arg::new(RELAY_URL)
                .long("relay-url")
                .env("BALLOT_RELAY_URL")
                .default_value("http://localhost:5000")
                .help("Root URL of the hashing relay")
                .global(true),
        )
        .arg(
            Arg::new(POLL_INTERVAL)
                .long("poll-interval")
                .value_parser(value_parser!(u64))
                .default_value("1000")
                .help("Milliseconds between receipt polls")
                .global(true),
        )
        .subcommand(Command::new("status").about("Show the election phase and your voter status"))
        .subcommand(Command::new("results").about("Show the current tally"))
        .subcommand(
            Command::new("register")
                .about("Register yourself to vote")
                .arg(identity_arg()),
        )
        .subcommand(
            Command::new("vote").about("Cast your vote").arg(
                Arg::new(INDEX)
                    .help("Index of the candidate, as shown by `results`")
                    .value_parser(value_parser!(u64))
                    .required(true),
            ),
        )
        .subcommand(
            Command::new("hash")
                .about("Print the identity hash for an identity number, without contacting anything")
                .arg(identity_arg()),
        )
        .subcommand(
            Command::new("admin")
                .about("Manage the election (contract owner only)")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add-candidate")
                        .arg(Arg::new(NAME).action(ArgAction::Set).required(true)),
                )
                .subcommand(
                    Command::new("register-voter")
                        .arg(
                            Arg::new(ADDRESS)
                                .value_parser(parse_address)
                                .required(true),
                        )
                        .arg(identity_arg()),
                )
                .subcommand(Command::new("start"))
                .subcommand(Command::new("finalize")),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Error)]
enum Error {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Could not start the runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("Error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Translate a subcommand into a dashboard action. `None` for read-only commands.
fn action(command: &str, args: &ArgMatches) -> Option<Action> {
    // Required arguments are guaranteed to be present.
    let identity = || args.get_one::<String>(IDENTITY).unwrap().clone();
    match command {
        "register" => Some(Action::Register(identity())),
        "vote" => Some(Action::Vote(args.get_one::<u64>(INDEX).copied())),
        "add-candidate" => Some(Action::AddCandidate(
            args.get_one::<String>(NAME).unwrap().clone(),
        )),
        "register-voter" => Some(Action::RegisterVoter {
            voter: *args.get_one::<Address>(ADDRESS).unwrap(),
            identity: identity(),
        }),
        "start" => Some(Action::StartElection),
        "finalize" => Some(Action::FinalizeElection),
        _ => None,
    }
}

/// Connect, perform the command, and return the lines to print.
fn execute(args: &ArgMatches) -> Result<Vec<String>, Error> {
    let (command, sub_args) = match args.subcommand() {
        Some(("admin", admin)) => admin.subcommand().unwrap(),
        Some(sub) => sub,
        None => unreachable!("subcommand is required"),
    };

    if command == "hash" {
        let identity = sub_args.get_one::<String>(IDENTITY).unwrap();
        if identity.is_empty() {
            return Err(WorkflowError::from(Precondition::EmptyIdentity).into());
        }
        return Ok(vec![IdentityHash::of(identity).to_string()]);
    }

    let contract = *args.get_one::<Address>(CONTRACT).ok_or(Error::Missing("--contract"))?;
    let account = *args.get_one::<Address>(ACCOUNT).ok_or(Error::Missing("--account"))?;
    let rpc_url = args.get_one::<String>(RPC_URL).unwrap();
    let relay_url = args.get_one::<String>(RELAY_URL).unwrap();
    let poll_interval = Duration::from_millis(*args.get_one::<u64>(POLL_INTERVAL).unwrap());

    let connector =
        RpcConnector::new(rpc_url, contract, poll_interval).map_err(WorkflowError::from)?;
    let mut dashboard = Dashboard::new(connector, RelayHasher::new(relay_url));

    let runtime = rocket::tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        dashboard
            .dispatch(Action::Wallet(WalletEvent::AccountsChanged(Some(account))))
            .await?;
        if let Some(action) = action(command, sub_args) {
            dashboard.dispatch(action).await?;
        }
        Ok::<_, Error>(())
    })?;

    let mut lines = Vec::new();
    if let Some(notice) = dashboard.notice() {
        lines.push(notice.text.clone());
    }
    match command {
        "status" => {
            let session = dashboard.session();
            lines.push(format!("Account: {account:#x}"));
            if session.is_admin {
                lines.push("You are the contract owner.".to_string());
            }
            if let Some(phase) = dashboard.phase() {
                lines.push(format!("Election status: {phase}"));
                lines.push(phase.describe().to_string());
            }
            if let Some(voter) = dashboard.voter() {
                lines.push(format!("Voter status: {}", voter.state()));
            }
        }
        "results" | "vote" => {
            if let Some(results) = dashboard.results() {
                for row in &results.candidates {
                    lines.push(format!(
                        "#{} {}: {} vote{} ({:.2}%)",
                        row.index,
                        row.name,
                        row.votes,
                        if row.votes != 1 { "s" } else { "" },
                        row.share
                    ));
                }
                lines.push(format!("Total votes: {}", results.total_votes));
                lines.push(results.headline.to_string());
            }
        }
        _ => {}
    }
    Ok(lines)
}

/// Run the command, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    match execute(args) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            0
        }
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

fn main() {
    let args = cli().get_matches();

    // Outside the project directory there is no config, and the client runs without logs.
    let _ = log4rs::init_file("log4rs.yaml", log4rs_dynamic_filters::default_deserializers());

    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_hash() {
        let command_line = [PROGRAM_NAME, "hash", "1234"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(
            execute(&args).unwrap(),
            ["0x387a8233c96e1fc0ad5e284353276177af2186e7afa85296f106336e376669f7"]
        );
        assert_eq!(run(&args), 0);

        let command_line = [PROGRAM_NAME, "hash", ""];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);
    }

    #[test]
    fn unreachable_node() {
        log4rs_test_utils::test_logging::init_logging_once_for(["chain_ballot"], None, None);

        let command_line = [
            PROGRAM_NAME,
            "--rpc-url",
            "http://127.0.0.1:9",
            "--contract",
            "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "--account",
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "vote",
            "0",
        ];
        let args = cli().try_get_matches_from(command_line).unwrap();
        match execute(&args) {
            Err(Error::Workflow(err)) => assert!(err.is_network()),
            other => panic!("expected a network error, got {other:?}"),
        }
        assert_eq!(run(&args), 1);
    }

    #[test]
    fn missing_contract() {
        let command_line = [
            PROGRAM_NAME,
            "--account",
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "status",
        ];
        let args = cli().try_get_matches_from(command_line).unwrap();
        // Only fails this way if the environment doesn't provide one.
        if std::env::var_os("BALLOT_CONTRACT").is_none() {
            assert!(matches!(execute(&args), Err(Error::Missing("--contract"))));
        }
    }

    #[test]
    fn actions() {
        let args = cli()
            .try_get_matches_from([
                PROGRAM_NAME,
                "admin",
                "register-voter",
                "0x00000000000000000000000000000000000000aa",
                "A1",
            ])
            .unwrap();
        let (_, admin) = args.subcommand().unwrap();
        let (command, sub_args) = admin.subcommand().unwrap();
        assert_eq!(
            action(command, sub_args),
            Some(Action::RegisterVoter {
                voter: "0x00000000000000000000000000000000000000aa".parse().unwrap(),
                identity: "A1".to_string(),
            })
        );

        let args = cli().try_get_matches_from([PROGRAM_NAME, "status"]).unwrap();
        let (command, sub_args) = args.subcommand().unwrap();
        assert_eq!(action(command, sub_args), None);
    }

    #[test]
    fn bad_cli_usage() {
        // No subcommand.
        cli().try_get_matches_from([PROGRAM_NAME]).unwrap_err();

        // Candidate indices are numbers.
        cli()
            .try_get_matches_from([PROGRAM_NAME, "vote", "Alice"])
            .unwrap_err();

        // Not an address.
        cli()
            .try_get_matches_from([PROGRAM_NAME, "--contract", "0x1234", "status"])
            .unwrap_err();
        cli()
            .try_get_matches_from([
                PROGRAM_NAME,
                "--contract",
                "5fbdb2315678afecb367f032d93f642f64180aa3",
                "status",
            ])
            .unwrap_err();

        // Admin needs an action.
        cli().try_get_matches_from([PROGRAM_NAME, "admin"]).unwrap_err();
    }
}
