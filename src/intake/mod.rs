//! Client for the application's local vote-intake endpoint.

use crate::models::{Candidate, CandidateId, VoterRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Invalid voter data")]
    InvalidVoter,
    #[error("Voter has already cast their vote")]
    AlreadyVoted,
    #[error("A vote for voter {0} is already being submitted")]
    InFlight(u64),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSubmission {
    #[serde(rename = "voterID")]
    pub voter_id: u64,
    pub voter_name: String,
    #[serde(rename = "candidateID")]
    pub candidate_id: Option<CandidateId>,
    pub candidate_name: Option<String>,
    pub constituency: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl VoteSubmission {
    pub fn new(
        voter: &VoterRecord,
        candidate: Option<&Candidate>,
        constituency: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            voter_id: voter.voter_id,
            voter_name: voter.name.clone(),
            candidate_id: candidate.map(|c| c.id.clone()),
            candidate_name: candidate.map(|c| c.name.clone()),
            constituency,
            timestamp,
        }
    }
}

#[async_trait]
pub trait VoteIntake: Send + Sync {
    async fn submit(&self, submission: &VoteSubmission) -> Result<Value, IntakeError>;
}

pub struct HttpVoteIntake {
    client: Client,
    url: String,
}

impl HttpVoteIntake {
    pub fn new(url: impl Into<String>) -> Result<Self, IntakeError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn rejection(status: StatusCode, body: &str) -> IntakeError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| {
            if status == StatusCode::NOT_FOUND {
                "Vote API endpoint not found. Please check if /api/vote exists.".to_string()
            } else {
                format!("HTTP {}: {}", status.as_u16(), status.canonical_reason().unwrap_or("Unknown"))
            }
        });
    IntakeError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl VoteIntake for HttpVoteIntake {
    async fn submit(&self, submission: &VoteSubmission) -> Result<Value, IntakeError> {
        let response = self.client.post(&self.url).json(submission).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(rejection(status, &body));
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }
}

/// Submits voter ballots, one in flight per voter at a time.
pub struct VoteDesk {
    intake: Arc<dyn VoteIntake>,
    in_flight: Mutex<HashSet<u64>>,
}

impl VoteDesk {
    pub fn new(intake: Arc<dyn VoteIntake>) -> Self {
        Self {
            intake,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_submitting(&self, voter_id: u64) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&voter_id)
    }

    pub async fn cast(&self, submission: VoteSubmission, already_voted: bool) -> Result<Value, IntakeError> {
        if submission.voter_id == 0 {
            return Err(IntakeError::InvalidVoter);
        }
        if already_voted {
            return Err(IntakeError::AlreadyVoted);
        }

        let voter_id = submission.voter_id;
        let claimed = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(voter_id);
        if !claimed {
            return Err(IntakeError::InFlight(voter_id));
        }

        let result = self.intake.submit(&submission).await;
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&voter_id);

        match &result {
            Ok(_) => info!("Vote intake accepted ballot from voter {}", voter_id),
            Err(e) => error!("Vote intake failed for voter {}: {}", voter_id, e),
        }
        result
    }
}
