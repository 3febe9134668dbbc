use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusty_ballot::config::Config;
use rusty_ballot::contract::{
    CandidateRegistration, ContractError, ElectionContract, InMemoryContract, TransactionReceipt,
    VoterRegistration,
};
use rusty_ballot::models::{CandidateId, Provenance};
use rusty_ballot::pinning::{ContentHash, FileUpload, PinningError, PinningService};
use rusty_ballot::registration::{CandidateForm, VoterForm};
use rusty_ballot::round::{RoundError, Tick};
use rusty_ballot::session::{Session, SessionError};
use rusty_ballot::tasks::round_ticker::tick_once;
use rusty_ballot::voting::Classification;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify};

const OWNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const VOTER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
const ANN: &str = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC";
const BO: &str = "0x90F79bf6EB2c4f870365E785982E1f101E93b906";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn config() -> Config {
    Config {
        contract_owner: OWNER.to_string(),
        round_duration: Duration::seconds(100),
        ..Config::default()
    }
}

#[derive(Default)]
struct RecordingPinning {
    uploads: AtomicUsize,
    metadata: Mutex<Vec<Value>>,
    fail: AtomicBool,
}

#[async_trait]
impl PinningService for RecordingPinning {
    async fn upload(&self, file: FileUpload) -> Result<ContentHash, PinningError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PinningError::MissingHash);
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(ContentHash(format!("QmFile{}{}", n, file.file_name)))
    }

    async fn upload_json(&self, metadata: &Value) -> Result<ContentHash, PinningError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PinningError::MissingHash);
        }
        let mut pinned = self.metadata.lock().await;
        pinned.push(metadata.clone());
        Ok(ContentHash(format!("QmMeta{}", pinned.len())))
    }

    fn gateway_url(&self, hash: &ContentHash) -> String {
        format!("https://gateway.test/ipfs/{}", hash)
    }
}

/// Wraps the in-memory ledger and lets a test fail or hold `vote` calls.
struct Scripted {
    inner: InMemoryContract,
    fail_votes: AtomicBool,
    hold_votes: Option<Arc<Notify>>,
    entered: Notify,
    broken_candidate: Option<String>,
    short_voter_tuples: bool,
}

impl Scripted {
    fn new() -> Self {
        Self {
            inner: InMemoryContract::new(OWNER),
            fail_votes: AtomicBool::new(false),
            hold_votes: None,
            entered: Notify::new(),
            broken_candidate: None,
            short_voter_tuples: false,
        }
    }
}

#[async_trait]
impl ElectionContract for Scripted {
    async fn candidate_addresses(&self) -> Result<Vec<String>, ContractError> {
        let mut addresses = self.inner.candidate_addresses().await?;
        if let Some(broken) = &self.broken_candidate {
            addresses.insert(0, broken.clone());
        }
        Ok(addresses)
    }

    async fn candidate_data(&self, address: &str) -> Result<Value, ContractError> {
        if self.broken_candidate.as_deref() == Some(address) {
            return Ok(json!([30, "Half a record"]));
        }
        self.inner.candidate_data(address).await
    }

    async fn candidate_count(&self) -> Result<u64, ContractError> {
        self.inner.candidate_count().await
    }

    async fn voter_addresses(&self) -> Result<Vec<String>, ContractError> {
        self.inner.voter_addresses().await
    }

    async fn voter_data(&self, address: &str) -> Result<Value, ContractError> {
        if self.short_voter_tuples {
            return Ok(json!([1, "Vic"]));
        }
        self.inner.voter_data(address).await
    }

    async fn voter_count(&self) -> Result<u64, ContractError> {
        self.inner.voter_count().await
    }

    async fn vote(&self, sender: &str, candidate_address: &str, candidate_id: u64) -> Result<TransactionReceipt, ContractError> {
        if let Some(hold) = &self.hold_votes {
            self.entered.notify_one();
            hold.notified().await;
        }
        if self.fail_votes.load(Ordering::SeqCst) {
            return Err(ContractError::UserRejected);
        }
        self.inner.vote(sender, candidate_address, candidate_id).await
    }

    async fn register_candidate(&self, sender: &str, registration: &CandidateRegistration) -> Result<TransactionReceipt, ContractError> {
        self.inner.register_candidate(sender, registration).await
    }

    async fn register_voter(&self, sender: &str, registration: &VoterRegistration) -> Result<TransactionReceipt, ContractError> {
        self.inner.register_voter(sender, registration).await
    }
}

fn candidate_form(address: &str, name: &str) -> CandidateForm {
    CandidateForm {
        name: name.to_string(),
        address: address.to_string(),
        age: "40".to_string(),
        political_party: "Civic".to_string(),
        ..Default::default()
    }
}

async fn seed(session: &Session) {
    session.connect(OWNER).await.unwrap();
    session.register_candidate(&candidate_form(ANN, "Ann"), None, t0()).await.unwrap();
    session.register_candidate(&candidate_form(BO, "Bo"), None, t0()).await.unwrap();
    session
        .register_voter(
            &VoterForm {
                name: "Vic".into(),
                address: VOTER.into(),
                position: "Resident".into(),
            },
            None,
        )
        .await
        .unwrap();
}

fn session_with(contract: Arc<dyn ElectionContract>, pinning: Arc<RecordingPinning>) -> Session {
    Session::new(contract, Some(pinning as Arc<dyn PinningService>), &config())
}

#[tokio::test]
async fn registration_pins_metadata_and_merges_profile() {
    let pinning = Arc::new(RecordingPinning::default());
    let session = session_with(Arc::new(InMemoryContract::new(OWNER)), Arc::clone(&pinning));
    seed(&session).await;

    let image = FileUpload {
        file_name: "cy.png".into(),
        mime_type: "image/png".into(),
        bytes: vec![1, 2, 3],
    };
    let cy = "0x15d34AAf54267DB7D7c367839AAf71A00a2C6A65";
    session.register_candidate(&candidate_form(cy, "Cy"), Some(image), t0()).await.unwrap();

    assert_eq!(pinning.uploads.load(Ordering::SeqCst), 1);
    let metadata = pinning.metadata.lock().await.clone();
    assert_eq!(metadata.len(), 4);
    assert_eq!(metadata[3]["image"], "https://gateway.test/ipfs/QmFile0cy.png");

    let candidates = session.candidates().await;
    assert_eq!(candidates.len(), 3);
    assert!(candidates.iter().all(|c| c.provenance == Provenance::Registered));
    assert_eq!(candidates[0].id, CandidateId::Number(1));
    assert_eq!(candidates[0].profile.political_party.as_deref(), Some("Civic"));
    assert_eq!(candidates[2].image, "https://gateway.test/ipfs/QmFile0cy.png");
    assert_eq!(session.candidate_count().await, 3);
    assert_eq!(session.voter_count().await, 1);
}

#[tokio::test]
async fn only_owner_can_register() {
    let pinning = Arc::new(RecordingPinning::default());
    let session = session_with(Arc::new(InMemoryContract::new(OWNER)), pinning);
    session.connect(VOTER).await.unwrap();

    let err = session
        .register_candidate(&candidate_form(ANN, "Ann"), None, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotOwner(_)));
    assert_eq!(
        session.status().await.error.as_deref(),
        Some("Only the contract owner can register candidates")
    );
}

#[tokio::test]
async fn pinning_failure_is_reported_not_fatal() {
    let pinning = Arc::new(RecordingPinning::default());
    pinning.fail.store(true, Ordering::SeqCst);
    let session = session_with(Arc::new(InMemoryContract::new(OWNER)), Arc::clone(&pinning));
    session.connect(OWNER).await.unwrap();

    let err = session
        .register_candidate(&candidate_form(ANN, "Ann"), None, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Pinning(_)));
    assert!(session.status().await.error.is_some());

    pinning.fail.store(false, Ordering::SeqCst);
    session.register_candidate(&candidate_form(ANN, "Ann"), None, t0()).await.unwrap();
    assert_eq!(session.candidates().await.len(), 1);
}

#[tokio::test]
async fn without_candidates_the_round_does_not_start() {
    let session = session_with(Arc::new(InMemoryContract::new(OWNER)), Arc::new(RecordingPinning::default()));
    session.connect(OWNER).await.unwrap();
    session.refresh_candidates().await.unwrap();

    let shown = session.display_candidates().await;
    assert!(shown.iter().all(|c| c.provenance == Provenance::Placeholder));

    let err = session.start_round(t0()).await.unwrap_err();
    assert!(matches!(err, SessionError::Round(RoundError::NoCandidates)));
    assert_eq!(
        session.status().await.error.as_deref(),
        Some("No registered candidates available for voting")
    );
}

#[tokio::test]
async fn full_round_produces_a_winner() {
    let session = session_with(Arc::new(InMemoryContract::new(OWNER)), Arc::new(RecordingPinning::default()));
    seed(&session).await;

    session.start_round(t0()).await.unwrap();
    session.connect(VOTER).await.unwrap();
    let receipt = session
        .cast_vote(&CandidateId::Number(2), t0() + Duration::seconds(10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receipt.votes, 1);
    assert_eq!(session.status().await.success.as_deref(), Some("Vote cast successfully for Bo!"));
    assert!(session.has_voted().await.unwrap());

    let err = session
        .cast_vote(&CandidateId::Number(1), t0() + Duration::seconds(20))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Contract(ContractError::AlreadyVoted)));
    assert_eq!(
        session.status().await.error.as_deref(),
        Some("You have already voted in this election")
    );

    match session.tick(t0() + Duration::seconds(100)).await {
        Tick::Ended(Classification::Winner { candidate, votes }) => {
            assert_eq!(candidate.name, "Bo");
            assert_eq!(votes, 1);
        }
        other => panic!("expected Bo to win, got {:?}", other),
    }
    assert_eq!(session.tick(t0() + Duration::seconds(101)).await, Tick::AlreadyEnded);
    assert!(session.summary().await.unwrap().contains("Bo wins with 1 vote."));

    session.reset_round().await;
    assert!(session.classification().await.is_none());
    assert!(session.candidates().await.iter().all(|c| c.vote_count == 0));
}

#[tokio::test]
async fn owner_cannot_vote_and_unknown_ids_are_ignored() {
    let session = session_with(Arc::new(InMemoryContract::new(OWNER)), Arc::new(RecordingPinning::default()));
    seed(&session).await;
    session.start_round(t0()).await.unwrap();

    let err = session.cast_vote(&CandidateId::Number(1), t0()).await.unwrap_err();
    assert!(matches!(err, SessionError::OwnerCannotVote));

    session.connect(VOTER).await.unwrap();
    assert!(session.cast_vote(&CandidateId::Number(77), t0()).await.unwrap().is_none());
    assert!(session.cast_vote(&CandidateId::from("demo_1"), t0()).await.unwrap().is_none());
    assert!(session.candidates().await.iter().all(|c| c.vote_count == 0));
    assert!(!session.has_voted().await.unwrap());
}

#[tokio::test]
async fn votes_after_the_deadline_are_declined() {
    let session = session_with(Arc::new(InMemoryContract::new(OWNER)), Arc::new(RecordingPinning::default()));
    seed(&session).await;
    session.start_round(t0()).await.unwrap();
    session.connect(VOTER).await.unwrap();

    let err = session
        .cast_vote(&CandidateId::Number(1), t0() + Duration::seconds(150))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Round(RoundError::NotActive)));
    assert_eq!(session.classification().await, Some(Classification::NoVotes));
}

#[tokio::test]
async fn failed_confirmation_leaves_counts_untouched() {
    let contract = Arc::new(Scripted::new());
    let session = session_with(contract.clone(), Arc::new(RecordingPinning::default()));
    seed(&session).await;
    session.start_round(t0()).await.unwrap();
    session.connect(VOTER).await.unwrap();

    contract.fail_votes.store(true, Ordering::SeqCst);
    let err = session.cast_vote(&CandidateId::Number(1), t0()).await.unwrap_err();
    assert!(matches!(err, SessionError::Contract(ContractError::UserRejected)));
    assert_eq!(session.status().await.error.as_deref(), Some("Transaction was rejected"));
    assert!(session.candidates().await.iter().all(|c| c.vote_count == 0));

    contract.fail_votes.store(false, Ordering::SeqCst);
    let receipt = session.cast_vote(&CandidateId::Number(1), t0()).await.unwrap().unwrap();
    assert_eq!(receipt.votes, 1);
}

#[tokio::test]
async fn malformed_records_are_skipped() {
    let mut contract = Scripted::new();
    contract.broken_candidate = Some("0x9965507D1a55bcC2695C58ba16FB37d819B0A4dc".to_string());
    let session = session_with(Arc::new(contract), Arc::new(RecordingPinning::default()));
    seed(&session).await;

    let names: Vec<String> = session.candidates().await.into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["Ann", "Bo"]);
}

#[tokio::test]
async fn second_vote_from_same_account_waits_for_the_first() {
    let release = Arc::new(Notify::new());
    let mut contract = Scripted::new();
    contract.hold_votes = Some(Arc::clone(&release));
    let contract = Arc::new(contract);
    let session = Arc::new(session_with(contract.clone(), Arc::new(RecordingPinning::default())));
    seed(&session).await;
    session.start_round(t0()).await.unwrap();
    session.connect(VOTER).await.unwrap();

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.cast_vote(&CandidateId::Number(1), t0()).await })
    };
    contract.entered.notified().await;

    let second = session.cast_vote(&CandidateId::Number(2), t0()).await;
    assert!(matches!(second, Err(SessionError::VoteInFlight)));

    release.notify_one();
    let receipt = first.await.unwrap().unwrap().unwrap();
    assert_eq!(receipt.candidate, CandidateId::Number(1));
    let counts: Vec<u64> = session.candidates().await.iter().map(|c| c.vote_count).collect();
    assert_eq!(counts, vec![1, 0]);
}

#[tokio::test]
async fn reading_candidates_needs_a_connected_wallet() {
    let session = session_with(Arc::new(InMemoryContract::new(OWNER)), Arc::new(RecordingPinning::default()));
    let err = session.refresh_candidates().await.unwrap_err();
    assert!(matches!(err, SessionError::WalletNotConnected));
    assert_eq!(session.status().await.error.as_deref(), Some("Please connect your wallet first"));
}

#[tokio::test]
async fn countdown_step_reports_the_board_once() {
    let session = session_with(Arc::new(InMemoryContract::new(OWNER)), Arc::new(RecordingPinning::default()));
    seed(&session).await;
    assert!(tick_once(&session).await.is_none());

    session.start_round(Utc::now() - Duration::seconds(200)).await.unwrap();
    let board = tick_once(&session).await.unwrap();
    assert!(board.ends_with("0 votes cast. No votes were cast."));
    assert!(tick_once(&session).await.is_none());
}

#[tokio::test]
async fn board_keeps_the_candidates_of_the_finished_round() {
    let session = session_with(Arc::new(InMemoryContract::new(OWNER)), Arc::new(RecordingPinning::default()));
    seed(&session).await;
    session.start_round(t0()).await.unwrap();
    session.connect(VOTER).await.unwrap();
    session.cast_vote(&CandidateId::Number(2), t0()).await.unwrap();
    session.tick(t0() + Duration::seconds(100)).await;
    let board = session.summary().await.unwrap();

    session.connect(OWNER).await.unwrap();
    let cy = "0x15d34AAf54267DB7D7c367839AAf71A00a2C6A65";
    session.register_candidate(&candidate_form(cy, "Cy"), None, t0()).await.unwrap();
    assert_eq!(session.candidates().await.len(), 3);

    let after = session.summary().await.unwrap();
    assert_eq!(after, board);
    assert!(!after.contains("Cy"));
    assert!(after.ends_with("1 votes cast. Bo wins with 1 vote."));
}

#[tokio::test]
async fn unreadable_voter_record_counts_as_not_voted() {
    let mut contract = Scripted::new();
    contract.short_voter_tuples = true;
    let session = session_with(Arc::new(contract), Arc::new(RecordingPinning::default()));
    session.connect(VOTER).await.unwrap();
    assert!(!session.has_voted().await.unwrap());
}
