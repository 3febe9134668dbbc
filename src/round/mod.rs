use crate::models::{Candidate, CandidateId};
use crate::voting::{Classification, determine_winner};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use thiserror::Error;

pub const DEFAULT_ROUND_SECONDS: i64 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoundError {
    #[error("No registered candidates available for voting")]
    NoCandidates,
    #[error("A voting round is already in progress")]
    AlreadyActive,
    #[error("Voting is not open")]
    NotActive,
    #[error("Candidates cannot be replaced while a round is in progress")]
    InProgress,
    #[error("The round would end outside the supported date range")]
    DeadlineOutOfRange,
}

/// The end timestamp exists only once the round has started, the
/// classification only once it has ended. `standings` is the candidate set
/// as it stood when the round closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundState {
    NotStarted,
    Active {
        ends_at: DateTime<Utc>,
    },
    Ended {
        ends_at: DateTime<Utc>,
        classification: Classification,
        standings: Vec<Candidate>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Idle,
    Running { remaining: Duration },
    /// This tick closed the round.
    Ended(Classification),
    AlreadyEnded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Counted { candidate: CandidateId, votes: u64 },
    /// Nobody in the round has this id; nothing changed.
    UnknownCandidate,
}

/// Owns the working copy of the candidates for one timed round.
#[derive(Debug, Clone)]
pub struct RoundController {
    candidates: Vec<Candidate>,
    duration: Duration,
    state: RoundState,
}

impl RoundController {
    pub fn new(duration: Duration) -> Self {
        Self {
            candidates: Vec::new(),
            duration,
            state: RoundState::NotStarted,
        }
    }

    pub fn with_candidates(duration: Duration, candidates: Vec<Candidate>) -> Self {
        let mut round = Self::new(duration);
        round.candidates = candidates.into_iter().filter(Candidate::is_votable).collect();
        round
    }

    /// Replaces the working set. Placeholders are dropped.
    pub fn load_candidates(&mut self, candidates: Vec<Candidate>) -> Result<usize, RoundError> {
        if self.is_active() {
            return Err(RoundError::InProgress);
        }
        self.candidates = candidates.into_iter().filter(Candidate::is_votable).collect();
        debug!("Loaded {} candidate(s) into the round", self.candidates.len());
        Ok(self.candidates.len())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<DateTime<Utc>, RoundError> {
        if self.is_active() {
            return Err(RoundError::AlreadyActive);
        }
        if self.candidates.is_empty() {
            warn!("Refusing to start a round without candidates");
            return Err(RoundError::NoCandidates);
        }

        let ends_at = match now.checked_add_signed(self.duration) {
            Some(ends_at) => ends_at,
            None => {
                warn!("Round of {}s starting at {} overflows the calendar", self.duration.num_seconds(), now);
                return Err(RoundError::DeadlineOutOfRange);
            }
        };
        self.state = RoundState::Active { ends_at };
        info!(
            "Voting round started with {} candidate(s), ends at {}",
            self.candidates.len(),
            ends_at.to_rfc3339()
        );
        Ok(ends_at)
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Tick {
        let ends_at = match self.state {
            RoundState::NotStarted => return Tick::Idle,
            RoundState::Ended { .. } => return Tick::AlreadyEnded,
            RoundState::Active { ends_at } => ends_at,
        };

        if now < ends_at {
            return Tick::Running { remaining: ends_at - now };
        }
        Tick::Ended(self.finish(ends_at))
    }

    /// Closes an active round immediately.
    pub fn end_now(&mut self, now: DateTime<Utc>) -> Result<Classification, RoundError> {
        match self.state {
            RoundState::Active { .. } => Ok(self.finish(now)),
            _ => Err(RoundError::NotActive),
        }
    }

    fn finish(&mut self, ends_at: DateTime<Utc>) -> Classification {
        let classification = determine_winner(&self.candidates);
        info!("Voting round ended: {}", classification.headline());
        // Snapshot the board; later loads must not touch it
        self.state = RoundState::Ended {
            ends_at,
            classification: classification.clone(),
            standings: self.candidates.clone(),
        };
        classification
    }

    pub fn cast_vote(&mut self, id: &CandidateId) -> Result<VoteOutcome, RoundError> {
        if !self.is_active() {
            return Err(RoundError::NotActive);
        }

        match self.candidates.iter_mut().find(|c| &c.id == id) {
            Some(candidate) => {
                candidate.vote_count += 1;
                debug!("Vote for {} ({}): {} vote(s)", candidate.name, id, candidate.vote_count);
                Ok(VoteOutcome::Counted {
                    candidate: id.clone(),
                    votes: candidate.vote_count,
                })
            }
            None => {
                warn!("Ignoring vote for unknown candidate {}", id);
                Ok(VoteOutcome::UnknownCandidate)
            }
        }
    }

    /// Back to NotStarted with every count at zero.
    pub fn reset(&mut self) {
        for candidate in &mut self.candidates {
            candidate.vote_count = 0;
        }
        self.state = RoundState::NotStarted;
        info!("Voting round reset");
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, RoundState::Active { .. })
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            RoundState::NotStarted => None,
            RoundState::Active { ends_at } | RoundState::Ended { ends_at, .. } => Some(*ends_at),
        }
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.state {
            RoundState::Active { ends_at } => Some((ends_at - now).max(Duration::zero())),
            _ => None,
        }
    }

    pub fn classification(&self) -> Option<&Classification> {
        match &self.state {
            RoundState::Ended { classification, .. } => Some(classification),
            _ => None,
        }
    }

    /// Candidates and counts at the moment the round ended.
    pub fn standings(&self) -> Option<&[Candidate]> {
        match &self.state {
            RoundState::Ended { standings, .. } => Some(standings),
            _ => None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn candidate(&self, id: &CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| &c.id == id)
    }

    pub fn total_votes(&self) -> u64 {
        self.candidates.iter().map(|c| c.vote_count).sum()
    }
}

impl Default for RoundController {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_ROUND_SECONDS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::placeholder_candidates;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn round_of(names: &[&str]) -> RoundController {
        let candidates = names
            .iter()
            .enumerate()
            .map(|(i, name)| Candidate::registered(i as u64 + 1, *name, format!("0x{}", i)))
            .collect();
        RoundController::with_candidates(Duration::seconds(100), candidates)
    }

    fn vote_n(round: &mut RoundController, id: u64, n: usize) {
        for _ in 0..n {
            round.cast_vote(&CandidateId::Number(id)).unwrap();
        }
    }

    #[test]
    fn start_without_candidates_is_declined() {
        let mut round = RoundController::default();
        assert_eq!(round.start(t0()), Err(RoundError::NoCandidates));
        assert_eq!(round.state(), &RoundState::NotStarted);
        assert_eq!(round.ends_at(), None);
    }

    #[test]
    fn placeholders_never_enter_a_round() {
        let mut round = RoundController::default();
        assert_eq!(round.load_candidates(placeholder_candidates()), Ok(0));
        assert_eq!(round.start(t0()), Err(RoundError::NoCandidates));
    }

    #[test]
    fn start_sets_end_timestamp() {
        let mut round = round_of(&["A"]);
        let ends_at = round.start(t0()).unwrap();
        assert_eq!(ends_at, t0() + Duration::seconds(100));
        assert_eq!(round.ends_at(), Some(ends_at));
        assert!(round.classification().is_none());
        assert_eq!(round.start(t0()), Err(RoundError::AlreadyActive));
    }

    #[test]
    fn tick_before_deadline_reports_remaining_time() {
        let mut round = round_of(&["A"]);
        assert_eq!(round.tick(t0()), Tick::Idle);
        round.start(t0()).unwrap();
        assert_eq!(
            round.tick(t0() + Duration::seconds(40)),
            Tick::Running {
                remaining: Duration::seconds(60)
            }
        );
        assert!(round.is_active());
    }

    #[test]
    fn round_ends_once_and_keeps_its_classification() {
        let mut round = round_of(&["A", "B"]);
        round.start(t0()).unwrap();
        vote_n(&mut round, 2, 3);

        let deadline = t0() + Duration::seconds(100);
        let first = match round.tick(deadline) {
            Tick::Ended(classification) => classification,
            other => panic!("expected the round to end, got {:?}", other),
        };
        assert!(matches!(&first, Classification::Winner { votes: 3, .. }));

        assert_eq!(round.tick(deadline + Duration::seconds(5)), Tick::AlreadyEnded);
        assert_eq!(round.classification(), Some(&first));
        assert_eq!(round.ends_at(), Some(deadline));
    }

    #[test]
    fn votes_only_count_while_active() {
        let mut round = round_of(&["A"]);
        let id = CandidateId::Number(1);
        assert_eq!(round.cast_vote(&id), Err(RoundError::NotActive));

        round.start(t0()).unwrap();
        assert_eq!(
            round.cast_vote(&id),
            Ok(VoteOutcome::Counted {
                candidate: id.clone(),
                votes: 1
            })
        );

        round.end_now(t0()).unwrap();
        assert_eq!(round.cast_vote(&id), Err(RoundError::NotActive));
        assert_eq!(round.total_votes(), 1);
    }

    #[test]
    fn unknown_candidate_vote_changes_nothing() {
        let mut round = round_of(&["A", "B"]);
        round.start(t0()).unwrap();
        vote_n(&mut round, 1, 2);

        let before: Vec<u64> = round.candidates().iter().map(|c| c.vote_count).collect();
        assert_eq!(
            round.cast_vote(&CandidateId::Number(42)),
            Ok(VoteOutcome::UnknownCandidate)
        );
        assert_eq!(
            round.cast_vote(&CandidateId::from("demo_1")),
            Ok(VoteOutcome::UnknownCandidate)
        );
        let after: Vec<u64> = round.candidates().iter().map(|c| c.vote_count).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn reset_zeroes_counts_from_any_state() {
        let mut round = round_of(&["A", "B"]);
        round.reset();
        assert_eq!(round.state(), &RoundState::NotStarted);

        round.start(t0()).unwrap();
        vote_n(&mut round, 1, 2);
        round.reset();
        assert_eq!(round.total_votes(), 0);
        assert_eq!(round.ends_at(), None);

        round.start(t0()).unwrap();
        vote_n(&mut round, 2, 1);
        round.end_now(t0() + Duration::seconds(1)).unwrap();
        round.reset();
        assert_eq!(round.total_votes(), 0);
        assert!(round.classification().is_none());
        assert_eq!(round.ends_at(), None);
    }

    #[test]
    fn restart_after_end_clears_classification() {
        let mut round = round_of(&["A"]);
        round.start(t0()).unwrap();
        round.end_now(t0()).unwrap();
        assert!(round.classification().is_some());

        round.start(t0() + Duration::seconds(10)).unwrap();
        assert!(round.classification().is_none());
        assert!(round.is_active());
    }

    #[test]
    fn candidates_cannot_be_replaced_mid_round() {
        let mut round = round_of(&["A"]);
        round.start(t0()).unwrap();
        assert_eq!(round.load_candidates(Vec::new()), Err(RoundError::InProgress));
        assert_eq!(round.candidates().len(), 1);
    }

    #[test]
    fn start_declines_a_deadline_past_the_calendar() {
        let mut round = RoundController::with_candidates(
            Duration::seconds(9_000_000_000_000),
            vec![Candidate::registered(1u64, "A", "0x1")],
        );
        assert_eq!(round.start(t0()), Err(RoundError::DeadlineOutOfRange));
        assert_eq!(round.state(), &RoundState::NotStarted);
    }

    #[test]
    fn standings_survive_a_later_load() {
        let mut round = round_of(&["A", "B"]);
        round.start(t0()).unwrap();
        vote_n(&mut round, 2, 1);
        round.end_now(t0()).unwrap();

        let newcomer = Candidate::registered(3u64, "C", "0x2");
        round.load_candidates(vec![newcomer]).unwrap();

        let names: Vec<&str> = round.standings().unwrap().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(round.standings().unwrap()[1].vote_count, 1);
        assert_eq!(round.candidates().len(), 1);
    }

    #[test]
    fn tie_is_reported_at_round_end() {
        let mut round = round_of(&["A", "B", "C"]);
        round.start(t0()).unwrap();
        vote_n(&mut round, 1, 5);
        vote_n(&mut round, 2, 3);
        vote_n(&mut round, 3, 5);

        let classification = round.end_now(t0()).unwrap();
        let Classification::Tie { candidates, votes } = classification else {
            panic!("expected a tie");
        };
        assert_eq!(votes, 5);
        assert_eq!(candidates.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), vec!["A", "C"]);
    }
}
