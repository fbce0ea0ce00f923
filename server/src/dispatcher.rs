//! Session dispatcher: a fixed pool of worker tasks fed by a bounded job queue.
//!
//! Workers share one receiver and each runs a single session at a time, so no
//! more than `capacity` games are ever in progress. Finished sessions are
//! reported to the server loop as [`ServerEvent::SessionFinished`].

use crate::game::RandomRounds;
use crate::network::ServerEvent;
use crate::roster::Roster;
use crate::session::{GameSession, SessionId};
use crate::teams::Team;
use log::{debug, info, warn};
use shared::GameMode;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// What to do with a new session when the job queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdmissionPolicy {
    /// Wait for room in the queue.
    #[default]
    Backpressure,
    /// Hand the team straight back to the caller.
    Reject,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("session queue is full, team of {} returned", .0.len())]
    Saturated(Team),
    #[error("session workers have shut down, team of {} returned", .0.len())]
    Closed(Team),
}

impl DispatchError {
    pub fn into_team(self) -> Team {
        match self {
            DispatchError::Saturated(team) | DispatchError::Closed(team) => team,
        }
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub capacity: usize,
    pub busy_workers: usize,
    pub queued: usize,
    pub active_sessions: usize,
}

#[derive(Default)]
struct PoolCounters {
    /// Submitted and not yet finished, queued or running.
    active: AtomicUsize,
    busy: AtomicUsize,
    next_id: AtomicU64,
}

pub struct SessionDispatcher {
    jobs: mpsc::Sender<GameSession>,
    capacity: usize,
    admission: AdmissionPolicy,
    roster: Arc<Roster>,
    counters: Arc<PoolCounters>,
}

impl SessionDispatcher {
    /// Spawns `capacity` workers on the current runtime.
    pub fn start(
        capacity: usize,
        queue_bound: usize,
        admission: AdmissionPolicy,
        roster: Arc<Roster>,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        let capacity = capacity.max(1);
        let (jobs, receiver) = mpsc::channel(queue_bound.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(PoolCounters::default());

        for worker in 0..capacity {
            tokio::spawn(run_worker(
                worker,
                Arc::clone(&receiver),
                Arc::clone(&counters),
                events.clone(),
            ));
        }

        info!(
            "Session pool started: {} workers, queue bound {}, {:?} admission",
            capacity,
            queue_bound.max(1),
            admission
        );

        Self {
            jobs,
            capacity,
            admission,
            roster,
            counters,
        }
    }

    pub fn next_session_id(&self) -> SessionId {
        SessionId(self.counters.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Builds a session with random rounds for `team` and submits it.
    pub async fn dispatch(&self, team: Team, mode: GameMode) -> Result<SessionId, DispatchError> {
        let session = GameSession::new(
            self.next_session_id(),
            mode,
            team,
            Box::new(RandomRounds::from_entropy()),
            Arc::clone(&self.roster),
        );
        self.dispatch_session(session).await
    }

    /// Submits a prepared session under the configured admission policy.
    pub async fn dispatch_session(&self, session: GameSession) -> Result<SessionId, DispatchError> {
        let permit = match self.admission {
            AdmissionPolicy::Backpressure => match self.jobs.reserve().await {
                Ok(permit) => permit,
                Err(_) => return Err(DispatchError::Closed(session.into_team())),
            },
            AdmissionPolicy::Reject => match self.jobs.try_reserve() {
                Ok(permit) => permit,
                Err(mpsc::error::TrySendError::Full(())) => {
                    debug!("{} rejected, session queue is full", session.id());
                    return Err(DispatchError::Saturated(session.into_team()));
                }
                Err(mpsc::error::TrySendError::Closed(())) => {
                    return Err(DispatchError::Closed(session.into_team()))
                }
            },
        };

        let id = session.id();
        // Counted before the send so a worker can never finish it first.
        self.counters.active.fetch_add(1, Ordering::SeqCst);
        permit.send(session);
        debug!("{} queued for a worker", id);
        Ok(id)
    }

    pub fn active_session_count(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    pub fn pool_snapshot(&self) -> PoolSnapshot {
        let active_sessions = self.counters.active.load(Ordering::SeqCst);
        let busy_workers = self.counters.busy.load(Ordering::SeqCst);
        PoolSnapshot {
            capacity: self.capacity,
            busy_workers,
            queued: active_sessions.saturating_sub(busy_workers),
            active_sessions,
        }
    }
}

async fn run_worker(
    worker: usize,
    jobs: Arc<Mutex<mpsc::Receiver<GameSession>>>,
    counters: Arc<PoolCounters>,
    events: mpsc::UnboundedSender<ServerEvent>,
) {
    loop {
        let next = {
            let mut jobs = jobs.lock().await;
            jobs.recv().await
        };
        let Some(session) = next else {
            debug!("Session worker {} stopping", worker);
            break;
        };

        counters.busy.fetch_add(1, Ordering::SeqCst);
        debug!("Session worker {} picked up {}", worker, session.id());
        let report = session.run().await;
        counters.busy.fetch_sub(1, Ordering::SeqCst);
        counters.active.fetch_sub(1, Ordering::SeqCst);

        if let Err(e) = events.send(ServerEvent::SessionFinished(report)) {
            warn!("Failed to report finished session to the server loop: {}", e);
        }
    }
}
