//! Boundary to the deployed election contract.
//!
//! Everything the contract does (storage, counting, access control) stays on the
//! other side of [`ElectionContract`]; this crate only reads tuples back and
//! submits transactions through it.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use memory::InMemoryContract;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub hash: String,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRegistration {
    pub address: String,
    pub age: u32,
    pub name: String,
    pub image_url: String,
    pub metadata_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRegistration {
    pub address: String,
    pub name: String,
    pub metadata_url: String,
    pub image_url: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("user rejected the transaction")]
    UserRejected,
    #[error("voter has already voted")]
    AlreadyVoted,
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("no {kind} registered at {address}")]
    NotFound { kind: &'static str, address: String },
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("network error: {0}")]
    Network(String),
}

impl ContractError {
    /// Message shown to the person who triggered the call.
    pub fn user_message(&self) -> &'static str {
        match self {
            ContractError::AlreadyVoted => "You have already voted in this election",
            ContractError::NotAuthorized(_) => "You are not authorized to vote",
            ContractError::UserRejected => "Transaction was rejected",
            _ => "Failed to cast vote. Please try again.",
        }
    }
}

/// Calls exposed by the voting contract. Reads return the raw positional tuples
/// the contract's getters produce; decoding happens in [`crate::models`].
#[async_trait]
pub trait ElectionContract: Send + Sync {
    async fn candidate_addresses(&self) -> Result<Vec<String>, ContractError>;

    async fn candidate_data(&self, address: &str) -> Result<Value, ContractError>;

    async fn candidate_count(&self) -> Result<u64, ContractError>;

    async fn voter_addresses(&self) -> Result<Vec<String>, ContractError>;

    async fn voter_data(&self, address: &str) -> Result<Value, ContractError>;

    async fn voter_count(&self) -> Result<u64, ContractError>;

    async fn vote(
        &self,
        sender: &str,
        candidate_address: &str,
        candidate_id: u64,
    ) -> Result<TransactionReceipt, ContractError>;

    async fn register_candidate(
        &self,
        sender: &str,
        registration: &CandidateRegistration,
    ) -> Result<TransactionReceipt, ContractError>;

    async fn register_voter(
        &self,
        sender: &str,
        registration: &VoterRegistration,
    ) -> Result<TransactionReceipt, ContractError>;
}
