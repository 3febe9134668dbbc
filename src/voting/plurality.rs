use crate::models::Candidate;
use crate::voting::Classification;

/// Ranks candidates by vote count and classifies the outcome. Ties are
/// reported as ties; nothing breaks them.
pub fn determine_winner(candidates: &[Candidate]) -> Classification {
    let top = match candidates.iter().map(|c| c.vote_count).max() {
        Some(top) => top,
        None => return Classification::NoCandidates,
    };

    if top == 0 {
        return Classification::NoVotes;
    }

    let mut leaders: Vec<Candidate> = candidates
        .iter()
        .filter(|c| c.vote_count == top)
        .cloned()
        .collect();

    if leaders.len() == 1 {
        Classification::Winner {
            candidate: leaders.remove(0),
            votes: top,
        }
    } else {
        Classification::Tie {
            candidates: leaders,
            votes: top,
        }
    }
}

/// Plain-text result board: candidates by descending votes, then the headline.
pub fn summarize(candidates: &[Candidate], classification: &Classification) -> String {
    let total: u64 = candidates.iter().map(|c| c.vote_count).sum();

    // Stable sort keeps input order among equal counts
    let mut ranked: Vec<&Candidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));

    let leaders = classification.leaders();
    let mut summary = String::new();

    for candidate in ranked {
        let share = if total == 0 {
            0.0
        } else {
            (candidate.vote_count as f64 * 1000.0 / total as f64).round() / 10.0
        };
        let marker = if leaders.iter().any(|l| l.id == candidate.id) { "* " } else { "  " };

        summary.push_str(&format!(
            "{}{} (ID {}): {} votes ({}%)\n",
            marker, candidate.name, candidate.id, candidate.vote_count, share
        ));
    }

    summary.push_str(&format!("\n{} votes cast. {}", total, classification.headline()));
    summary
}
