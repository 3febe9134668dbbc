use crate::config::Config;
use crate::contract::{ContractError, ElectionContract, TransactionReceipt};
use crate::models::{Candidate, CandidateId, SupplementaryRecord, VoterRecord, placeholder_candidates};
use crate::pinning::{FileUpload, PinningError, PinningService};
use crate::registration::{CandidateForm, ValidationError, VoterForm, is_valid_address};
use crate::round::{RoundController, RoundError, Tick, VoteOutcome};
use crate::voting::{Classification, merge_candidates, summarize};
use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Please connect your wallet first")]
    WalletNotConnected,
    #[error("Only the contract owner can {0}")]
    NotOwner(&'static str),
    #[error("Contract owner cannot vote")]
    OwnerCannotVote,
    #[error("A vote from this account is still being confirmed")]
    VoteInFlight,
    #[error("Candidate {0} cannot receive votes")]
    NotVotable(CandidateId),
    #[error(transparent)]
    Round(#[from] RoundError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Pinning(#[from] PinningError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Contract(e) => e.user_message().to_string(),
            SessionError::Pinning(_) => "Unable to upload to the pinning service, check your API key".to_string(),
            other => other.to_string(),
        }
    }
}

/// Messages for whoever is driving the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub error: Option<String>,
    pub success: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastReceipt {
    pub candidate: CandidateId,
    pub votes: u64,
    pub transaction: TransactionReceipt,
}

#[derive(Debug, Default)]
struct Counts {
    candidates: usize,
    voters: usize,
}

/// One user's view of the election: the connected account, the collaborators
/// it talks to, and the current voting round. Shared as `Arc<Session>`; no
/// lock is held while an external call is awaited.
pub struct Session {
    contract: Arc<dyn ElectionContract>,
    pinning: Option<Arc<dyn PinningService>>,
    owner: String,
    default_image: String,
    account: Mutex<Option<String>>,
    round: Mutex<RoundController>,
    supplementary: Mutex<Vec<SupplementaryRecord>>,
    voters: Mutex<Vec<VoterRecord>>,
    counts: Mutex<Counts>,
    votes_in_flight: Mutex<HashSet<String>>,
    status: Mutex<Status>,
}

impl Session {
    pub fn new(
        contract: Arc<dyn ElectionContract>,
        pinning: Option<Arc<dyn PinningService>>,
        config: &Config,
    ) -> Self {
        Self {
            contract,
            pinning,
            owner: config.contract_owner.clone(),
            default_image: config.default_candidate_image.clone(),
            account: Mutex::new(None),
            round: Mutex::new(RoundController::new(config.round_duration)),
            supplementary: Mutex::new(Vec::new()),
            voters: Mutex::new(Vec::new()),
            counts: Mutex::new(Counts::default()),
            votes_in_flight: Mutex::new(HashSet::new()),
            status: Mutex::new(Status::default()),
        }
    }

    // --- Account ---

    pub async fn connect(&self, account: &str) -> Result<(), SessionError> {
        let account = account.trim();
        if !is_valid_address(account) {
            return self.fail(ValidationError::InvalidAddress(account.to_string()).into()).await;
        }
        *self.account.lock().await = Some(account.to_string());
        self.status.lock().await.error = None;
        info!("Connected account {}", account);
        Ok(())
    }

    pub async fn disconnect(&self) {
        *self.account.lock().await = None;
    }

    pub async fn account(&self) -> Option<String> {
        self.account.lock().await.clone()
    }

    pub async fn is_owner(&self) -> bool {
        match self.account().await {
            Some(account) => self.is_owner_address(&account),
            None => false,
        }
    }

    fn is_owner_address(&self, address: &str) -> bool {
        self.owner.eq_ignore_ascii_case(address)
    }

    async fn require_account(&self) -> Result<String, SessionError> {
        self.account().await.ok_or(SessionError::WalletNotConnected)
    }

    // --- Status ---

    pub async fn status(&self) -> Status {
        self.status.lock().await.clone()
    }

    pub async fn clear_status(&self) {
        *self.status.lock().await = Status::default();
    }

    async fn set_error(&self, message: String) {
        let mut status = self.status.lock().await;
        status.error = Some(message);
        status.success = None;
    }

    async fn set_success(&self, message: String) {
        let mut status = self.status.lock().await;
        status.success = Some(message);
        status.error = None;
    }

    async fn fail<T>(&self, err: SessionError) -> Result<T, SessionError> {
        warn!("{}", err);
        self.set_error(err.user_message()).await;
        Err(err)
    }

    // --- Reads ---

    /// Fetches every candidate from the contract, skipping records that cannot
    /// be read, and merges in cached registration data. The round's working set
    /// is only replaced while no round is running.
    pub async fn refresh_candidates(&self) -> Result<usize, SessionError> {
        match self.load_candidates().await {
            Ok(n) => Ok(n),
            Err(SessionError::WalletNotConnected) => self.fail(SessionError::WalletNotConnected).await,
            Err(e) => {
                error!("Error fetching candidates: {}", e);
                self.set_error("Error fetching candidates. Please try again.".to_string()).await;
                Err(e)
            }
        }
    }

    async fn load_candidates(&self) -> Result<usize, SessionError> {
        self.require_account().await?;
        let addresses = self.contract.candidate_addresses().await?;

        // Fetch each record separately, skipping unreadable ones
        let mut fetched = Vec::with_capacity(addresses.len());
        for (position, address) in addresses.iter().enumerate() {
            let fields = match self.contract.candidate_data(address).await {
                Ok(fields) => fields,
                Err(e) => {
                    warn!("Error fetching candidate data for {}: {}", address, e);
                    continue;
                }
            };
            match Candidate::from_contract_tuple(address, position, &fields, &self.default_image) {
                Ok(candidate) => fetched.push(candidate),
                Err(e) => warn!("Skipping candidate: {}", e),
            }
        }

        // The contract's own count, falling back to what we could read
        let count = match self.contract.candidate_count().await {
            Ok(n) => n as usize,
            Err(e) => {
                warn!("Error getting candidate count: {}", e);
                fetched.len()
            }
        };

        // Overlay cached registration details
        let merged = {
            let cache = self.supplementary.lock().await;
            merge_candidates(fetched, &cache)
        };
        let loaded = merged.len();
        self.counts.lock().await.candidates = count;

        // --- Hand the set to the round, unless one is running ---
        let mut round = self.round.lock().await;
        if round.is_active() {
            info!("Round in progress, keeping the current candidate set");
        } else {
            round.load_candidates(merged)?;
        }
        info!("Loaded {} of {} candidate(s)", loaded, addresses.len());
        Ok(loaded)
    }

    pub async fn refresh_voters(&self) -> Result<usize, SessionError> {
        self.require_account().await?;
        let addresses = match self.contract.voter_addresses().await {
            Ok(addresses) => addresses,
            Err(e) => {
                self.set_error("Something went wrong".to_string()).await;
                return Err(e.into());
            }
        };

        let mut fetched = Vec::with_capacity(addresses.len());
        for address in &addresses {
            let record = match self.contract.voter_data(address).await {
                Ok(fields) => VoterRecord::from_contract_tuple(address, &fields),
                Err(e) => {
                    warn!("Error fetching voter data for {}: {}", address, e);
                    continue;
                }
            };
            match record {
                Ok(voter) => fetched.push(voter),
                Err(e) => warn!("Skipping voter: {}", e),
            }
        }

        let count = match self.contract.voter_count().await {
            Ok(n) => n as usize,
            Err(e) => {
                warn!("Error getting voter count: {}", e);
                fetched.len()
            }
        };

        let loaded = fetched.len();
        *self.voters.lock().await = fetched;
        self.counts.lock().await.voters = count;
        Ok(loaded)
    }

    pub async fn voters(&self) -> Vec<VoterRecord> {
        self.voters.lock().await.clone()
    }

    pub async fn voter_count(&self) -> usize {
        self.counts.lock().await.voters
    }

    pub async fn candidate_count(&self) -> usize {
        self.counts.lock().await.candidates
    }

    /// Registered candidates in the round's working set.
    pub async fn candidates(&self) -> Vec<Candidate> {
        self.round.lock().await.candidates().to_vec()
    }

    /// Registered candidates, or the placeholder roster when there are none.
    pub async fn display_candidates(&self) -> Vec<Candidate> {
        let registered = self.candidates().await;
        if registered.is_empty() {
            placeholder_candidates()
        } else {
            registered
        }
    }

    pub async fn supplementary_records(&self) -> Vec<SupplementaryRecord> {
        self.supplementary.lock().await.clone()
    }

    /// Whether the connected account has already voted on the contract.
    pub async fn has_voted(&self) -> Result<bool, SessionError> {
        let account = self.require_account().await?;
        match self.contract.voter_data(&account).await {
            Ok(fields) => match VoterRecord::from_contract_tuple(&account, &fields) {
                Ok(voter) => Ok(voter.has_voted),
                Err(e) => {
                    warn!("Treating {} as not voted: {}", account, e);
                    Ok(false)
                }
            },
            Err(ContractError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // --- Round ---

    pub async fn start_round(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, SessionError> {
        let started = self.round.lock().await.start(now);
        match started {
            Ok(ends_at) => {
                self.clear_status().await;
                Ok(ends_at)
            }
            Err(e) => self.fail(e.into()).await,
        }
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> Tick {
        self.round.lock().await.tick(now)
    }

    pub async fn end_round_now(&self, now: DateTime<Utc>) -> Result<Classification, SessionError> {
        let ended = self.round.lock().await.end_now(now);
        match ended {
            Ok(classification) => Ok(classification),
            Err(e) => self.fail(e.into()).await,
        }
    }

    pub async fn reset_round(&self) {
        self.round.lock().await.reset();
        self.clear_status().await;
    }

    pub async fn is_round_active(&self) -> bool {
        self.round.lock().await.is_active()
    }

    pub async fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.round.lock().await.remaining(now)
    }

    pub async fn classification(&self) -> Option<Classification> {
        self.round.lock().await.classification().cloned()
    }

    /// Result board for an ended round, drawn from the candidates as they
    /// stood when it closed.
    pub async fn summary(&self) -> Option<String> {
        let round = self.round.lock().await;
        match (round.standings(), round.classification()) {
            (Some(standings), Some(classification)) => Some(summarize(standings, classification)),
            _ => None,
        }
    }

    // --- Voting ---

    /// Casts the connected account's vote. The contract has to confirm the
    /// transaction before the round records it, so a failed call leaves local
    /// counts untouched. Returns `None` for ids nobody in the round carries.
    pub async fn cast_vote(&self, id: &CandidateId, now: DateTime<Utc>) -> Result<Option<CastReceipt>, SessionError> {
        let sender = match self.require_account().await {
            Ok(sender) => sender,
            Err(e) => return self.fail(e).await,
        };
        if self.is_owner_address(&sender) {
            return self.fail(SessionError::OwnerCannotVote).await;
        }

        // One outstanding vote per account
        let key = sender.to_lowercase();
        let claimed = self.votes_in_flight.lock().await.insert(key.clone());
        if !claimed {
            return self.fail(SessionError::VoteInFlight).await;
        }

        let result = self.confirm_vote(&sender, id, now).await;
        // Release the claim whatever the outcome
        self.votes_in_flight.lock().await.remove(&key);

        match result {
            Ok(Some(receipt)) => {
                let name = self
                    .round
                    .lock()
                    .await
                    .candidate(id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "candidate".to_string());
                self.set_success(format!("Vote cast successfully for {}!", name)).await;
                // Pick up the voter's new hasVoted flag
                if let Err(e) = self.refresh_voters().await {
                    warn!("Could not refresh voters after voting: {}", e);
                }
                Ok(Some(receipt))
            }
            Ok(None) => Ok(None),
            Err(e) => self.fail(e).await,
        }
    }

    async fn confirm_vote(
        &self,
        sender: &str,
        id: &CandidateId,
        now: DateTime<Utc>,
    ) -> Result<Option<CastReceipt>, SessionError> {
        // --- Local checks first, without holding the lock past this block ---
        let (address, chain_id) = {
            let mut round = self.round.lock().await;
            round.tick(now);
            if !round.is_active() {
                return Err(RoundError::NotActive.into());
            }
            let candidate = match round.candidate(id) {
                Some(candidate) => candidate,
                None => {
                    warn!("Ignoring vote for unknown candidate {}", id);
                    return Ok(None);
                }
            };
            let chain_id = candidate
                .id
                .as_number()
                .ok_or_else(|| SessionError::NotVotable(id.clone()))?;
            (candidate.address.clone(), chain_id)
        };

        // --- Contract confirms, then the round counts it ---
        let transaction = self.contract.vote(sender, &address, chain_id).await?;
        info!("Vote transaction confirmed: {}", transaction.hash);

        let outcome = self.round.lock().await.cast_vote(id);
        match outcome {
            Ok(VoteOutcome::Counted { candidate, votes }) => Ok(Some(CastReceipt {
                candidate,
                votes,
                transaction,
            })),
            Ok(VoteOutcome::UnknownCandidate) => Ok(None),
            Err(e) => {
                warn!(
                    "Vote {} was confirmed after the round closed and is not counted locally",
                    transaction.hash
                );
                Err(e.into())
            }
        }
    }

    // --- Registration ---

    async fn pin_image(&self, image: Option<FileUpload>, fallback: &str) -> Result<String, SessionError> {
        match (&self.pinning, image) {
            (Some(pinning), Some(file)) => {
                let hash = pinning.upload(file).await?;
                Ok(pinning.gateway_url(&hash))
            }
            (None, Some(file)) => {
                warn!("No pinning service configured, {} was not uploaded", file.file_name);
                Ok(fallback.to_string())
            }
            (_, None) => Ok(fallback.to_string()),
        }
    }

    async fn pin_metadata(&self, metadata: &Value) -> Result<String, SessionError> {
        match &self.pinning {
            Some(pinning) => {
                let hash = pinning.upload_json(metadata).await?;
                Ok(pinning.gateway_url(&hash))
            }
            None => {
                warn!("No pinning service configured, metadata was not pinned");
                Ok(String::new())
            }
        }
    }

    async fn require_owner(&self, action: &'static str) -> Result<String, SessionError> {
        let sender = self.require_account().await?;
        if !self.is_owner_address(&sender) {
            return Err(SessionError::NotOwner(action));
        }
        Ok(sender)
    }

    /// Pins the candidate's image and metadata, registers the candidate on the
    /// contract and caches the profile fields the contract does not keep.
    pub async fn register_candidate(
        &self,
        form: &CandidateForm,
        image: Option<FileUpload>,
        now: DateTime<Utc>,
    ) -> Result<TransactionReceipt, SessionError> {
        let result = async {
            let sender = self.require_owner("register candidates").await?;
            form.validate_core()?;

            // Pin the image, then metadata that references it
            let image_url = self.pin_image(image, &self.default_image).await?;
            let metadata_url = self.pin_metadata(&form.metadata(&image_url)).await?;
            let registration = form.registration(&image_url, &metadata_url)?;
            let receipt = self.contract.register_candidate(&sender, &registration).await?;

            // Keep the profile fields the contract has no room for
            self.supplementary.lock().await.push(form.supplementary(&image_url, now));
            info!("Registered candidate {} in {}", registration.name, receipt.hash);
            Ok::<_, SessionError>(receipt)
        }
        .await;

        match result {
            Ok(receipt) => {
                // Show the new candidate straight away
                if let Err(e) = self.refresh_candidates().await {
                    warn!("Could not refresh candidates after registration: {}", e);
                }
                self.set_success(format!("Candidate {} registered", form.name.trim())).await;
                Ok(receipt)
            }
            Err(e) => self.fail(e).await,
        }
    }

    pub async fn register_voter(
        &self,
        form: &VoterForm,
        image: Option<FileUpload>,
    ) -> Result<TransactionReceipt, SessionError> {
        let result = async {
            let sender = self.require_owner("register voters").await?;
            form.validate()?;

            let image_url = self.pin_image(image, "").await?;
            let metadata_url = self.pin_metadata(&form.metadata(&image_url)).await?;
            let registration = form.registration(&image_url, &metadata_url)?;
            let receipt = self.contract.register_voter(&sender, &registration).await?;
            info!("Registered voter {} in {}", registration.name, receipt.hash);
            Ok::<_, SessionError>(receipt)
        }
        .await;

        match result {
            Ok(receipt) => {
                if let Err(e) = self.refresh_voters().await {
                    warn!("Could not refresh voters after registration: {}", e);
                }
                self.set_success(format!("Voter {} registered", form.name.trim())).await;
                Ok(receipt)
            }
            Err(e) => self.fail(e).await,
        }
    }
}
