use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError, Receiver, Sender};
use tracing::{debug, error, info};
use warp::reply::{Reply, Response};
use warp::sse::Event;
use warp::Rejection;

use super::{AppState, SharedState};
use crate::voting::{aggregate_results, Id};

const FEED_CAPACITY: usize = 64;

/// A change to the vote table that invalidates published results.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteEvent {
    Cast(Id),
    Withdrawn(Id),
    ProjectRemoved(Id),
}

#[derive(Clone)]
pub struct VoteFeed {
    sender: Sender<VoteEvent>,
}

impl VoteFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        VoteFeed { sender }
    }

    pub fn publish(&self, event: VoteEvent) {
        match self.sender.send(event) {
            Ok(subscribers) => debug!(?event, subscribers, "published vote event"),
            Err(_) => debug!(?event, "no results subscribers"),
        }
    }

    pub fn subscribe(&self) -> Receiver<VoteEvent> {
        self.sender.subscribe()
    }
}

impl Default for VoteFeed {
    fn default() -> Self {
        VoteFeed::new()
    }
}

/// Waits for the next change. `false` once the feed is gone.
async fn next_change(rx: &mut Receiver<VoteEvent>) -> bool {
    match rx.recv().await {
        Ok(_) => true,
        // missed events only mean the next snapshot covers more of them
        Err(RecvError::Lagged(skipped)) => {
            debug!(skipped, "results subscriber lagged");
            true
        }
        Err(RecvError::Closed) => false,
    }
}

async fn results_event(state: &AppState) -> Result<Event, serde_json::Error> {
    match aggregate_results(&*state.store, None, state.config.scoring_mode).await {
        Ok(results) => Event::default().event("results").json_data(&results),
        Err(err) => {
            error!(error = %err, "Failed to refresh results for subscribers");
            Ok(Event::default().event("error").data("Failed to refresh results"))
        }
    }
}

/// Full results once on connect, then again after every vote change.
pub fn results_stream(state: SharedState) -> impl Stream<Item = Result<Event, serde_json::Error>> + Send + 'static {
    let rx = state.feed.subscribe();
    stream::unfold((state, rx, true), |(state, mut rx, first)| async move {
        if !first && !next_change(&mut rx).await {
            return None;
        }
        let event = results_event(&state).await;
        Some((event, (state, rx, false)))
    })
}

pub async fn stream(state: SharedState) -> Result<Response, Rejection> {
    info!("Results subscriber connected");
    let events = warp::sse::keep_alive().stream(results_stream(state));
    Ok(warp::sse::reply(events).into_response())
}
