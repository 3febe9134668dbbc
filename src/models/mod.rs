pub mod records;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use records::RecordError;

/// Candidate identifier. Registered candidates carry the numeric id assigned by
/// the contract; placeholders use text ids. Not guaranteed unique across sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateId {
    Number(u64),
    Text(String),
}

impl CandidateId {
    pub fn as_number(&self) -> Option<u64> {
        match self {
            CandidateId::Number(n) => Some(*n),
            CandidateId::Text(s) => s.parse().ok(),
        }
    }

    /// Parses console/user input; digits become a numeric id.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match input.parse::<u64>() {
            Ok(n) => CandidateId::Number(n),
            Err(_) => CandidateId::Text(input.to_string()),
        }
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateId::Number(n) => write!(f, "{}", n),
            CandidateId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for CandidateId {
    fn from(n: u64) -> Self {
        CandidateId::Number(n)
    }
}

impl From<&str> for CandidateId {
    fn from(s: &str) -> Self {
        CandidateId::Text(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Built-in preview entry, never votable.
    Placeholder,
    /// Backed by a record on the election contract.
    Registered,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
}

/// Profile fields collected at registration that never reach the contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub political_party: Option<String>,
    pub constituency: Option<String>,
    pub education: Option<String>,
    pub profession: Option<String>,
    pub experience: Option<String>,
    pub manifesto: Option<String>,
    pub slogan: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub previous_offices: Option<String>,
    pub achievements: Option<String>,
    pub social: SocialLinks,
}

impl CandidateProfile {
    /// Fields present in `top` replace the ones in `self`.
    pub fn overlay(self, top: &CandidateProfile) -> CandidateProfile {
        fn pick(top: &Option<String>, base: Option<String>) -> Option<String> {
            top.clone().or(base)
        }

        CandidateProfile {
            political_party: pick(&top.political_party, self.political_party),
            constituency: pick(&top.constituency, self.constituency),
            education: pick(&top.education, self.education),
            profession: pick(&top.profession, self.profession),
            experience: pick(&top.experience, self.experience),
            manifesto: pick(&top.manifesto, self.manifesto),
            slogan: pick(&top.slogan, self.slogan),
            email: pick(&top.email, self.email),
            phone: pick(&top.phone, self.phone),
            previous_offices: pick(&top.previous_offices, self.previous_offices),
            achievements: pick(&top.achievements, self.achievements),
            social: SocialLinks {
                twitter: pick(&top.social.twitter, self.social.twitter),
                facebook: pick(&top.social.facebook, self.social.facebook),
                instagram: pick(&top.social.instagram, self.social.instagram),
                linkedin: pick(&top.social.linkedin, self.social.linkedin),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub vote_count: u64,
    pub address: String,
    pub image: String,
    pub age: Option<u32>,
    pub ipfs: Option<String>,
    pub provenance: Provenance,
    pub profile: CandidateProfile,
}

impl Candidate {
    pub fn registered(id: impl Into<CandidateId>, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            vote_count: 0,
            address: address.into(),
            image: String::new(),
            age: None,
            ipfs: None,
            provenance: Provenance::Registered,
            profile: CandidateProfile::default(),
        }
    }

    pub fn with_votes(mut self, votes: u64) -> Self {
        self.vote_count = votes;
        self
    }

    pub fn is_votable(&self) -> bool {
        match self.provenance {
            Provenance::Registered => true,
            Provenance::Placeholder => false,
        }
    }

    /// `0x1234...7890` style rendering of the address.
    pub fn short_address(&self) -> String {
        shorten_address(&self.address)
    }
}

pub fn shorten_address(address: &str) -> String {
    if address.is_empty() {
        return "N/A".to_string();
    }
    if address.len() <= 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Preview roster shown while nobody is registered.
pub fn placeholder_candidates() -> Vec<Candidate> {
    [
        ("demo_1", "Avery Stone", 36, "0x1234567890123456789012345678901234567890"),
        ("demo_2", "Jordan Vale", 37, "0x2345678901234567890123456789012345678901"),
        ("demo_3", "Morgan Reyes", 34, "0x3456789012345678901234567890123456789012"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (id, name, age, address))| Candidate {
        id: CandidateId::from(id),
        name: name.to_string(),
        vote_count: 0,
        address: address.to_string(),
        image: format!("/assets/{}.jpg", id),
        age: Some(age),
        ipfs: Some(format!("demo_candidate_{:03}", i + 1)),
        provenance: Provenance::Placeholder,
        profile: CandidateProfile::default(),
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    pub voter_id: u64,
    pub name: String,
    pub image: String,
    /// Id of the candidate this voter picked, 0 when none.
    pub voted_for: u64,
    pub ipfs: String,
    pub address: String,
    pub has_voted: bool,
}

/// Registration data cached locally so it can enrich contract records later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplementaryRecord {
    pub id: Uuid,
    pub registered_at: DateTime<Utc>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub candidate_id: Option<CandidateId>,
    pub age: Option<u32>,
    pub image: Option<String>,
    pub profile: CandidateProfile,
}

impl SupplementaryRecord {
    pub fn new(registered_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            registered_at,
            name: None,
            address: None,
            candidate_id: None,
            age: None,
            image: None,
            profile: CandidateProfile::default(),
        }
    }
}
