use log::{debug, info};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::ApiError;
use crate::feed::{Completion, FeedSnapshot, FeedState, FetchTicket};
use crate::filter::{FilterPayload, FilterValue};
use crate::models::ListingPage;
use crate::source::SourceChain;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedCommand {
    Apply(FilterValue),
    Remove(FilterValue),
    Clear,
    SetFilter(FilterPayload),
    Refresh,
    /// The end-of-list sentinel became visible.
    LoadMore,
    Retry,
    Search(String),
}

type Outcome = (FetchTicket, Result<ListingPage, ApiError>);

/// Front-end side of a running feed session. Dropping it ends the session.
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
    snapshots: watch::Receiver<FeedSnapshot>,
}

impl FeedHandle {
    pub async fn send(&self, command: FeedCommand) -> Result<(), mpsc::error::SendError<FeedCommand>> {
        self.commands.send(command).await
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshots.clone()
    }

    /// Waits for the first snapshot satisfying `pred`. `None` once the
    /// session has ended without producing one.
    pub async fn wait_for(&mut self, pred: impl FnMut(&FeedSnapshot) -> bool) -> Option<FeedSnapshot> {
        self.snapshots.wait_for(pred).await.ok().map(|snap| snap.clone())
    }
}

/// Owns one [`FeedState`] on a tokio task. Fetches run on their own tasks
/// and report back over a channel; the state applies them through its
/// sequence guard, so completions may arrive in any order.
pub struct FeedSession {
    state: FeedState,
    sources: SourceChain,
    done_tx: mpsc::UnboundedSender<Outcome>,
    snapshot_tx: watch::Sender<FeedSnapshot>,
}

impl FeedSession {
    /// Starts the session and immediately loads page 1 of the empty filter.
    pub fn spawn(sources: SourceChain) -> (FeedHandle, JoinHandle<()>) {
        let state = FeedState::new();
        let (command_tx, command_rx) = mpsc::channel(32);
        let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot());
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let session = Self {
            state,
            sources,
            done_tx,
            snapshot_tx,
        };
        let task = tokio::spawn(session.run(command_rx, done_rx));

        let handle = FeedHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<FeedCommand>, mut done: mpsc::UnboundedReceiver<Outcome>) {
        let ticket = self.state.refresh();
        self.dispatch(ticket);
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if let Some(ticket) = self.handle(command) {
                            self.dispatch(ticket);
                        }
                        self.publish();
                    }
                    None => break,
                },
                Some((ticket, outcome)) = done.recv() => {
                    if self.state.complete(&ticket, outcome) == Completion::Applied {
                        self.publish();
                    }
                }
            }
        }
        info!("Feed session closed at epoch {}", self.state.epoch());
    }

    fn handle(&mut self, command: FeedCommand) -> Option<FetchTicket> {
        debug!("Feed command: {:?}", command);
        match command {
            FeedCommand::Apply(value) => Some(self.state.apply_filter(value)),
            FeedCommand::Remove(value) => self.state.remove_filter(&value),
            FeedCommand::Clear => self.state.clear_filters(),
            FeedCommand::SetFilter(filter) => self.state.set_filter(filter),
            FeedCommand::Refresh => Some(self.state.refresh()),
            FeedCommand::LoadMore => self.state.sentinel_visible(),
            FeedCommand::Retry => self.state.retry(),
            FeedCommand::Search(key) => {
                self.state.set_search_key(&key);
                None
            }
        }
    }

    fn dispatch(&self, ticket: FetchTicket) {
        let sources = self.sources.clone();
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let outcome = sources.fetch(&ticket.request).await;
            // the session may be gone; its result no longer matters then
            let _ = done_tx.send((ticket, outcome));
        });
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.state.snapshot());
    }
}
