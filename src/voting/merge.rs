use crate::models::{Candidate, Provenance, SupplementaryRecord};
use log::debug;

fn same_text(cached: Option<&str>, canonical: &str) -> bool {
    match cached {
        Some(cached) if !cached.is_empty() && !canonical.is_empty() => {
            cached.to_lowercase() == canonical.to_lowercase()
        }
        _ => false,
    }
}

// Name, then address, then id. A record matching any of them is taken.
fn describes(record: &SupplementaryRecord, candidate: &Candidate) -> bool {
    same_text(record.name.as_deref(), &candidate.name)
        || same_text(record.address.as_deref(), &candidate.address)
        || record.candidate_id.as_ref() == Some(&candidate.id)
}

/// Overlays the first matching supplementary record (in input order) onto a
/// canonical candidate. The id and vote count always stay canonical.
pub fn merge_candidate(canonical: Candidate, supplementary: &[SupplementaryRecord]) -> Candidate {
    let record = match supplementary.iter().find(|r| describes(r, &canonical)) {
        Some(record) => record,
        None => return canonical,
    };

    debug!(
        "Merging cached registration {} into candidate {} ({})",
        record.id, canonical.id, canonical.name
    );

    Candidate {
        id: canonical.id,
        vote_count: canonical.vote_count,
        name: record.name.clone().unwrap_or(canonical.name),
        address: record.address.clone().unwrap_or(canonical.address),
        image: record.image.clone().unwrap_or(canonical.image),
        age: record.age.or(canonical.age),
        ipfs: canonical.ipfs,
        provenance: Provenance::Registered,
        profile: canonical.profile.overlay(&record.profile),
    }
}

pub fn merge_candidates(canonical: Vec<Candidate>, supplementary: &[SupplementaryRecord]) -> Vec<Candidate> {
    if supplementary.is_empty() {
        return canonical;
    }
    canonical
        .into_iter()
        .map(|candidate| merge_candidate(candidate, supplementary))
        .collect()
}
