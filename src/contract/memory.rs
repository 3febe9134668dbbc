use crate::contract::{
    CandidateRegistration, ContractError, ElectionContract, TransactionReceipt, VoterRegistration,
};
use async_trait::async_trait;
use log::info;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

struct StoredCandidate {
    id: u64,
    age: u32,
    name: String,
    image: String,
    votes: u64,
    ipfs: String,
    address: String,
}

struct StoredVoter {
    id: u64,
    name: String,
    ipfs: String,
    address: String,
    image: String,
    voted_for: u64,
    has_voted: bool,
}

#[derive(Default)]
struct Ledger {
    candidates: Vec<StoredCandidate>,
    voters: Vec<StoredVoter>,
    block: u64,
}

impl Ledger {
    fn receipt(&mut self) -> TransactionReceipt {
        self.block += 1;
        TransactionReceipt {
            hash: format!("0x{}", Uuid::new_v4().simple()),
            block_number: self.block,
        }
    }
}

/// Process-local stand-in for the deployed contract: owner-only registration,
/// one vote per registered voter, and the owner may not vote.
pub struct InMemoryContract {
    owner: String,
    ledger: Mutex<Ledger>,
}

impl InMemoryContract {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn is_owner(&self, sender: &str) -> bool {
        self.owner.eq_ignore_ascii_case(sender)
    }
}

#[async_trait]
impl ElectionContract for InMemoryContract {
    async fn candidate_addresses(&self) -> Result<Vec<String>, ContractError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.candidates.iter().map(|c| c.address.clone()).collect())
    }

    async fn candidate_data(&self, address: &str) -> Result<Value, ContractError> {
        let ledger = self.ledger.lock().await;
        let c = ledger
            .candidates
            .iter()
            .find(|c| c.address.eq_ignore_ascii_case(address))
            .ok_or_else(|| ContractError::NotFound {
                kind: "candidate",
                address: address.to_string(),
            })?;
        Ok(json!([c.age, c.name, c.id, c.image, c.votes, c.ipfs]))
    }

    async fn candidate_count(&self) -> Result<u64, ContractError> {
        Ok(self.ledger.lock().await.candidates.len() as u64)
    }

    async fn voter_addresses(&self) -> Result<Vec<String>, ContractError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.voters.iter().map(|v| v.address.clone()).collect())
    }

    async fn voter_data(&self, address: &str) -> Result<Value, ContractError> {
        let ledger = self.ledger.lock().await;
        let v = ledger
            .voters
            .iter()
            .find(|v| v.address.eq_ignore_ascii_case(address))
            .ok_or_else(|| ContractError::NotFound {
                kind: "voter",
                address: address.to_string(),
            })?;
        Ok(json!([v.id, v.name, v.ipfs, v.address, v.image, v.voted_for, v.has_voted]))
    }

    async fn voter_count(&self) -> Result<u64, ContractError> {
        Ok(self.ledger.lock().await.voters.len() as u64)
    }

    async fn vote(
        &self,
        sender: &str,
        candidate_address: &str,
        candidate_id: u64,
    ) -> Result<TransactionReceipt, ContractError> {
        if self.is_owner(sender) {
            return Err(ContractError::NotAuthorized("owner can not give vote".into()));
        }

        let mut ledger = self.ledger.lock().await;
        let voter_index = ledger
            .voters
            .iter()
            .position(|v| v.address.eq_ignore_ascii_case(sender))
            .ok_or_else(|| ContractError::NotAuthorized(format!("{} is not a registered voter", sender)))?;
        if ledger.voters[voter_index].has_voted {
            return Err(ContractError::AlreadyVoted);
        }

        let candidate = ledger
            .candidates
            .iter_mut()
            .find(|c| c.id == candidate_id && c.address.eq_ignore_ascii_case(candidate_address))
            .ok_or_else(|| ContractError::NotFound {
                kind: "candidate",
                address: candidate_address.to_string(),
            })?;
        candidate.votes += 1;

        let voter = &mut ledger.voters[voter_index];
        voter.has_voted = true;
        voter.voted_for = candidate_id;

        let receipt = ledger.receipt();
        info!("Vote from {} for candidate {} in block {}", sender, candidate_id, receipt.block_number);
        Ok(receipt)
    }

    async fn register_candidate(
        &self,
        sender: &str,
        registration: &CandidateRegistration,
    ) -> Result<TransactionReceipt, ContractError> {
        if !self.is_owner(sender) {
            return Err(ContractError::NotAuthorized("only the owner can register candidates".into()));
        }

        let mut ledger = self.ledger.lock().await;
        if ledger
            .candidates
            .iter()
            .any(|c| c.address.eq_ignore_ascii_case(&registration.address))
        {
            return Err(ContractError::Reverted("candidate already registered".into()));
        }

        let id = ledger.candidates.len() as u64 + 1;
        ledger.candidates.push(StoredCandidate {
            id,
            age: registration.age,
            name: registration.name.clone(),
            image: registration.image_url.clone(),
            votes: 0,
            ipfs: registration.metadata_url.clone(),
            address: registration.address.clone(),
        });
        Ok(ledger.receipt())
    }

    async fn register_voter(
        &self,
        sender: &str,
        registration: &VoterRegistration,
    ) -> Result<TransactionReceipt, ContractError> {
        if !self.is_owner(sender) {
            return Err(ContractError::NotAuthorized("only the owner can register voters".into()));
        }

        let mut ledger = self.ledger.lock().await;
        if ledger
            .voters
            .iter()
            .any(|v| v.address.eq_ignore_ascii_case(&registration.address))
        {
            return Err(ContractError::Reverted("voter already registered".into()));
        }

        let id = ledger.voters.len() as u64 + 1;
        ledger.voters.push(StoredVoter {
            id,
            name: registration.name.clone(),
            ipfs: registration.metadata_url.clone(),
            address: registration.address.clone(),
            image: registration.image_url.clone(),
            voted_for: 0,
            has_voted: false,
        });
        Ok(ledger.receipt())
    }
}
