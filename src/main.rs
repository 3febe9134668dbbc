use chrono::Utc;
use log::{error, info, warn};
use rusty_ballot::config::Config;
use rusty_ballot::contract::InMemoryContract;
use rusty_ballot::intake::{HttpVoteIntake, VoteDesk, VoteSubmission};
use rusty_ballot::models::{CandidateId, Provenance};
use rusty_ballot::pinning::{PinataClient, PinningService};
use rusty_ballot::registration::{CandidateForm, VoterForm};
use rusty_ballot::session::Session;
use rusty_ballot::tasks::round_ticker::run_round_ticker;
use std::error::Error;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, stdin};

type CommandResult = Result<(), Box<dyn Error + Send + Sync>>;

const HELP: &str = "\
Commands:
  connect <address>                          use a wallet account
  disconnect
  register-candidate <address> <age> <name>  owner only
  register-voter <address> <position> <name> owner only
  candidates                                 fetch and list candidates
  voters                                     fetch and list voters
  start                                      start a voting round
  vote <candidate-id>                        vote in the running round
  submit <candidate-id> [constituency]       send a ballot to the vote intake API
  time                                       time left in the round
  end                                        close the round now
  results                                    show the result board
  reset                                      start over with zero votes
  status
  quit";

async fn run_command(session: &Session, desk: Option<&VoteDesk>, command: &str, args: &[&str]) -> CommandResult {
    match command {
        "help" => println!("{}", HELP),
        "connect" => {
            let address = args.first().ok_or("usage: connect <address>")?;
            session.connect(address).await?;
            let role = if session.is_owner().await { " (contract owner)" } else { "" };
            println!("Connected {}{}", address, role);
        }
        "disconnect" => {
            session.disconnect().await;
            println!("Disconnected");
        }
        "register-candidate" => {
            if args.len() < 3 {
                return Err("usage: register-candidate <address> <age> <name>".into());
            }
            let form = CandidateForm {
                address: args[0].to_string(),
                age: args[1].to_string(),
                name: args[2..].join(" "),
                ..Default::default()
            };
            let receipt = session.register_candidate(&form, None, Utc::now()).await?;
            println!("Candidate registered in block {} ({})", receipt.block_number, receipt.hash);
        }
        "register-voter" => {
            if args.len() < 3 {
                return Err("usage: register-voter <address> <position> <name>".into());
            }
            let form = VoterForm {
                address: args[0].to_string(),
                position: args[1].to_string(),
                name: args[2..].join(" "),
            };
            let receipt = session.register_voter(&form, None).await?;
            println!("Voter registered in block {} ({})", receipt.block_number, receipt.hash);
        }
        "candidates" => {
            if let Err(e) = session.refresh_candidates().await {
                warn!("Showing cached candidates: {}", e);
            }
            let shown = session.display_candidates().await;
            if shown.iter().all(|c| c.provenance == Provenance::Placeholder) {
                println!("No registered candidates yet. Preview candidates:");
            }
            for c in shown {
                println!("  [{}] {} - {} votes - {}", c.id, c.name, c.vote_count, c.short_address());
            }
        }
        "voters" => {
            session.refresh_voters().await?;
            println!("{} registered voter(s)", session.voter_count().await);
            for v in session.voters().await {
                let voted = if v.has_voted { "voted" } else { "not voted" };
                println!("  [{}] {} - {} - {}", v.voter_id, v.name, v.address, voted);
            }
        }
        "start" => {
            let ends_at = session.start_round(Utc::now()).await?;
            println!("Voting started, ends at {}", ends_at.to_rfc3339());
        }
        "vote" => {
            let id = CandidateId::parse(args.first().ok_or("usage: vote <candidate-id>")?);
            match session.cast_vote(&id, Utc::now()).await? {
                Some(receipt) => println!(
                    "Vote counted for {} ({} total), tx {}",
                    receipt.candidate, receipt.votes, receipt.transaction.hash
                ),
                None => println!("No candidate with id {} in this round", id),
            }
        }
        "submit" => {
            let desk = desk.ok_or("VOTE_API_URL is not configured")?;
            let id = CandidateId::parse(args.first().ok_or("usage: submit <candidate-id> [constituency]")?);
            let account = session.account().await.ok_or("Please connect your wallet first")?;
            session.refresh_voters().await?;
            let voter = session
                .voters()
                .await
                .into_iter()
                .find(|v| v.address.eq_ignore_ascii_case(&account))
                .ok_or("Connected account is not a registered voter")?;
            let candidates = session.candidates().await;
            let candidate = candidates.iter().find(|c| c.id == id);
            let submission = VoteSubmission::new(&voter, candidate, args.get(1).map(|s| s.to_string()), Utc::now());
            let response = desk.cast(submission, voter.has_voted).await?;
            println!("Vote intake accepted: {}", response);
        }
        "time" => match session.remaining(Utc::now()).await {
            Some(left) => println!(
                "{:02}:{:02}:{:02} left",
                left.num_hours(),
                left.num_minutes() % 60,
                left.num_seconds() % 60
            ),
            None => println!("No round is running"),
        },
        "end" => {
            let classification = session.end_round_now(Utc::now()).await?;
            println!("{}", classification.headline());
        }
        "results" => match session.summary().await {
            Some(summary) => println!("{}", summary),
            None => println!("Results are available once the round ends"),
        },
        "reset" => {
            session.reset_round().await;
            println!("Round reset, all votes cleared");
        }
        "status" => {
            let status = session.status().await;
            if let Some(message) = status.success {
                println!("OK: {}", message);
            }
            if let Some(message) = status.error {
                println!("Error: {}", message);
            }
        }
        other => println!("Unknown command: {} (try `help`)", other),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    // --- Collaborators ---
    let pinning: Option<Arc<dyn PinningService>> = match config.pinata.clone() {
        Some(settings) => match PinataClient::new(settings) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                error!("Failed to create pinning client: {}", e);
                None
            }
        },
        None => {
            warn!("PINATA_API_KEY/PINATA_SECRET_KEY not set, uploads will be skipped");
            None
        }
    };

    let desk = match &config.vote_api_url {
        Some(url) => match HttpVoteIntake::new(url.clone()) {
            Ok(intake) => Some(VoteDesk::new(Arc::new(intake))),
            Err(e) => {
                error!("Failed to create vote intake client: {}", e);
                None
            }
        },
        None => None,
    };

    // In-process ledger standing in for the chain
    let contract = Arc::new(InMemoryContract::new(config.contract_owner.clone()));
    info!("Using in-process election contract owned by {}", contract.owner());
    let session = Arc::new(Session::new(contract, pinning, &config));

    // --- Start Background Task for the Round Countdown ---
    let ticker_session = Arc::clone(&session);
    let every = config.tick_interval;
    tokio::spawn(async move {
        run_round_ticker(ticker_session, every).await;
    });

    // --- Command Loop ---
    println!("{}", HELP);
    let mut lines = BufReader::new(stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };

        let mut words = line.split_whitespace();
        let command = match words.next() {
            Some(command) => command,
            None => continue,
        };
        if command == "quit" || command == "exit" {
            break;
        }

        // Errors are reported and the loop carries on
        let args: Vec<&str> = words.collect();
        if let Err(why) = run_command(&session, desk.as_ref(), command, &args).await {
            println!("Error: {}", why);
        }
    }
}
