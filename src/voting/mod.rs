pub mod merge;
pub mod plurality;

use crate::models::Candidate;
use serde::Serialize;

pub use merge::{merge_candidate, merge_candidates};
pub use plurality::{determine_winner, summarize};

/// Outcome of a voting round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Classification {
    /// The round had nobody to vote for.
    NoCandidates,
    /// Every candidate finished on zero.
    NoVotes,
    Winner { candidate: Candidate, votes: u64 },
    /// Two or more candidates share the maximum, in their original order.
    Tie { candidates: Vec<Candidate>, votes: u64 },
}

impl Classification {
    pub fn headline(&self) -> String {
        match self {
            Classification::NoCandidates => "No registered candidates available for voting.".to_string(),
            Classification::NoVotes => "No votes were cast.".to_string(),
            Classification::Winner { candidate, votes } => {
                format!("{} wins with {} vote{}.", candidate.name, votes, plural(*votes))
            }
            Classification::Tie { candidates, votes } => {
                let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
                format!(
                    "{} candidates tied with {} vote{} each: {}.",
                    candidates.len(),
                    votes,
                    plural(*votes),
                    names.join(", ")
                )
            }
        }
    }

    /// Leading candidates, empty when nobody leads.
    pub fn leaders(&self) -> &[Candidate] {
        match self {
            Classification::Winner { candidate, .. } => std::slice::from_ref(candidate),
            Classification::Tie { candidates, .. } => candidates,
            Classification::NoCandidates | Classification::NoVotes => &[],
        }
    }
}

fn plural(n: u64) -> &'static str {
    if n == 1 { "" } else { "s" }
}
