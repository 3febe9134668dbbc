use crate::models::{Candidate, CandidateId, CandidateProfile, Provenance, VoterRecord};
use serde_json::Value;
use thiserror::Error;

// Positional layout returned by the contract's getters.
const CANDIDATE_FIELDS: usize = 6;
const VOTER_FIELDS: usize = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record for {address} is not a tuple")]
    NotATuple { address: String },
    #[error("record for {address} has {found} fields, expected at least {expected}")]
    TooShort {
        address: String,
        expected: usize,
        found: usize,
    },
}

fn tuple<'a>(address: &str, fields: &'a Value, expected: usize) -> Result<&'a [Value], RecordError> {
    let items = fields.as_array().ok_or_else(|| RecordError::NotATuple {
        address: address.to_string(),
    })?;
    if items.len() < expected {
        return Err(RecordError::TooShort {
            address: address.to_string(),
            expected,
            found: items.len(),
        });
    }
    Ok(items)
}

/// Reads integers that may arrive as JSON numbers, decimal strings or `0x` hex.
fn integer(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => s.parse().ok(),
            }
        }
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

impl Candidate {
    /// Builds a candidate from `[age, name, candidateId, image, totalVote, ipfs]`.
    /// `position` is the zero-based index in the contract's address list.
    pub fn from_contract_tuple(
        address: &str,
        position: usize,
        fields: &Value,
        default_image: &str,
    ) -> Result<Candidate, RecordError> {
        let items = tuple(address, fields, CANDIDATE_FIELDS)?;

        Ok(Candidate {
            id: CandidateId::Number(integer(&items[2]).unwrap_or(position as u64)),
            name: text(&items[1]).unwrap_or_else(|| format!("Candidate {}", position + 1)),
            vote_count: integer(&items[4]).unwrap_or(0),
            address: address.to_string(),
            image: text(&items[3]).unwrap_or_else(|| default_image.to_string()),
            age: integer(&items[0]).and_then(|a| u32::try_from(a).ok()),
            ipfs: text(&items[5]),
            provenance: Provenance::Registered,
            profile: CandidateProfile::default(),
        })
    }
}

impl VoterRecord {
    /// Builds a voter from `[voterId, name, ipfs, address, image, votedFor, hasVoted]`.
    pub fn from_contract_tuple(address: &str, fields: &Value) -> Result<VoterRecord, RecordError> {
        let items = tuple(address, fields, VOTER_FIELDS)?;

        Ok(VoterRecord {
            voter_id: integer(&items[0]).unwrap_or(0),
            name: text(&items[1]).unwrap_or_default(),
            image: text(&items[4]).unwrap_or_default(),
            voted_for: integer(&items[5]).unwrap_or(0),
            ipfs: text(&items[2]).unwrap_or_default(),
            address: text(&items[3]).unwrap_or_else(|| address.to_string()),
            has_voted: items[6].as_bool().unwrap_or(false),
        })
    }
}
