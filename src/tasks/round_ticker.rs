use crate::round::Tick;
use crate::session::Session;
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::time::{MissedTickBehavior, interval};

/// Drives the round countdown: ticks the session every `every` and reports the
/// result board the moment a round closes.
pub async fn run_round_ticker(session: Arc<Session>, every: StdDuration) {
    info!("Starting round countdown task (every {:?})", every);
    let mut interval = interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if let Some(summary) = tick_once(&session).await {
            info!("Voting ended!\n{}", summary);
        }
    }
}

/// One countdown step. Returns the result board when this step closed the round.
pub async fn tick_once(session: &Session) -> Option<String> {
    match session.tick(Utc::now()).await {
        Tick::Ended(_) => session.summary().await,
        Tick::Running { remaining } => {
            debug!("{}s left in the voting round", remaining.num_seconds());
            None
        }
        Tick::Idle | Tick::AlreadyEnded => None,
    }
}
