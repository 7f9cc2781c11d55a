//! A simple CLI tool for verifying closed voting sessions.
//! This uses the internal server verification implementation, and is by definition
//! compatible with the output of our API endpoints.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use dcast_backend::model::{
    api::{session::SessionSnapshot, verification::VerificationError},
    common::{Phase, VoteCount},
};

const PROGRAM_NAME: &str = "verify-dcast";

const ABOUT_TEXT: &str = "Verify the tallies and winners of a voting session.

EXIT CODES:
     0: Verification succeeded.
   255: Ran successfully, but verification failed.
 Other: Error.";

const SNAPSHOT_PATH: &str = "SNAPSHOT_PATH";

const SNAPSHOT_PATH_HELP: &str = "The path to a JSON dump of a specific session,\n\
as returned by `GET /sessions/<session_id>/snapshot`";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME).about(ABOUT_TEXT).arg(
        Arg::new(SNAPSHOT_PATH)
            .help(SNAPSHOT_PATH_HELP)
            .action(ArgAction::Set)
            .required(true),
    )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON dump.
    Format(String),
    /// Verification failed due to the contained reason.
    Verification(VerificationError),
}

/// The verified result for a particular candidate.
#[derive(Debug, Eq, PartialEq)]
struct FriendlyResults {
    pub candidate_name: String,
    pub tally: VoteCount,
    pub ballots: u64,
    pub winner: bool,
}

impl Display for FriendlyResults {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} vote{} from {} ballot{}",
            self.candidate_name,
            self.tally,
            if self.tally != 1 { "s" } else { "" },
            self.ballots,
            if self.ballots != 1 { "s" } else { "" }
        )?;
        if self.winner {
            write!(f, " (winner)")?;
        }
        Ok(())
    }
}

/// Run verification, returning the session phase and per-candidate results
/// ordered by tally, then name.
fn verify(path: &str) -> Result<(Phase, Vec<FriendlyResults>), Error> {
    // Load the file.
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let snapshot: SessionSnapshot =
        serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;

    // Run verification.
    snapshot.verify().map_err(Error::Verification)?;

    // Assemble the friendly results.
    let mut results = snapshot
        .candidates
        .iter()
        .map(|candidate| FriendlyResults {
            candidate_name: candidate.name.clone(),
            tally: candidate.vote_count,
            ballots: snapshot
                .voters
                .iter()
                .filter(|voter| voter.voted_candidate_id == Some(candidate.id))
                .count() as u64,
            winner: snapshot.winner_ids.contains(&candidate.id),
        })
        .collect::<Vec<_>>();
    results.sort_unstable_by(|a, b| a.candidate_name.cmp(&b.candidate_name));
    results.sort_by(|a, b| b.tally.cmp(&a.tally));

    Ok((snapshot.session.phase, results))
}

/// Run verification, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(SNAPSHOT_PATH).unwrap(); // Required argument is guaranteed to be present.
    match verify(path) {
        Ok((phase, friendly_results)) => {
            println!("Verification succeeded.");
            if phase != Phase::Close {
                println!("Session is still in phase {phase}; results are not final.");
            }
            for result in friendly_results {
                println!("{}", result);
            }
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {}", msg);
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {}", msg);
            1
        }
        Err(Error::Verification(err)) => {
            println!("Verification failed: {}", err);
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
