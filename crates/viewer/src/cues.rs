//! Audio cue scheduler.
//!
//! Plays exactly one audible cue per newly observed increment: never more,
//! never for the same timestamp twice, and never before the audio backend
//! has been unlocked. Pending cues survive a failed attempt — the queue is
//! kept intact and drained again on the next trigger.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::reconciler::IncrementNotice;

/// The playback seam. `unlock` prepares the backend (and is where
/// permission-style failures surface); `play` starts one cue and resolves
/// when the attempt is settled.
#[async_trait]
pub trait CuePlayer: Send + Sync {
    async fn unlock(&self) -> Result<()>;
    async fn play(&self) -> Result<()>;
}

#[async_trait]
impl<P: CuePlayer + ?Sized> CuePlayer for Arc<P> {
    async fn unlock(&self) -> Result<()> {
        (**self).unlock().await
    }

    async fn play(&self) -> Result<()> {
        (**self).play().await
    }
}

struct SchedulerState {
    queue: VecDeque<IncrementNotice>,
    /// High-water mark: the timestamp of the most recently played cue.
    /// Anything at or below it is a duplicate and is discarded unplayed.
    last_played: u64,
    /// Single-flight guard for `drain`.
    draining: bool,
}

pub struct CueScheduler<P> {
    player: P,
    state: parking_lot::Mutex<SchedulerState>,
    /// Memoized unlock slot: `true` once the backend is ready. Concurrent
    /// unlockers serialize on the mutex and share the winner's outcome.
    unlocked: Mutex<bool>,
    wakeup: Notify,
}

impl<P: CuePlayer> CueScheduler<P> {
    pub fn new(player: P) -> Self {
        Self {
            player,
            state: parking_lot::Mutex::new(SchedulerState {
                queue: VecDeque::new(),
                last_played: 0,
                draining: false,
            }),
            unlocked: Mutex::new(false),
            wakeup: Notify::new(),
        }
    }

    /// Append a notice and trigger a drain attempt.
    pub fn enqueue(&self, notice: IncrementNotice) {
        self.state.lock().queue.push_back(notice);
        self.wakeup.notify_one();
    }

    /// Full resynchronization point (snapshot received): pending cues and
    /// the high-water mark are dropped together.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.queue.clear();
        state.last_played = 0;
    }

    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn last_played(&self) -> u64 {
        self.state.lock().last_played
    }

    /// Prepare the audio backend if it isn't already. Safe to call from a
    /// user-gesture handler and from the drain loop concurrently.
    pub async fn unlock(&self) -> Result<()> {
        let mut unlocked = self.unlocked.lock().await;
        if *unlocked {
            return Ok(());
        }
        self.player.unlock().await?;
        *unlocked = true;
        Ok(())
    }

    /// Forget the unlock so the next attempt re-runs setup.
    async fn relock(&self) {
        *self.unlocked.lock().await = false;
    }

    /// Drain the queue in order, one playback at a time. Single-flight:
    /// while one drain is in flight, further calls are no-ops. On a setup or
    /// playback failure the remaining queue is left intact for a retry.
    pub async fn drain(&self) {
        {
            let mut state = self.state.lock();
            if state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            let next = {
                let mut state = self.state.lock();
                loop {
                    match state.queue.front() {
                        None => break None,
                        Some(notice) if notice.timestamp <= state.last_played => {
                            debug!(
                                "discarding duplicate cue for {} (t={})",
                                notice.product_id, notice.timestamp
                            );
                            state.queue.pop_front();
                        }
                        Some(notice) => break Some(notice.clone()),
                    }
                }
            };
            let Some(notice) = next else { break };

            if let Err(e) = self.unlock().await {
                warn!("audio locked, keeping {} pending cues: {}", self.pending(), e);
                break;
            }

            match self.player.play().await {
                Ok(()) => {
                    let mut state = self.state.lock();
                    state.last_played = notice.timestamp;
                    state.queue.pop_front();
                }
                Err(e) => {
                    warn!("cue playback failed, re-locking audio: {}", e);
                    self.relock().await;
                    break;
                }
            }
        }

        self.state.lock().draining = false;
    }
}

impl<P: CuePlayer + Send + Sync + 'static> CueScheduler<P> {
    /// Construct the scheduler and spawn its drive task: every `enqueue`
    /// wakes the task, which drains until the queue is dry or blocked.
    pub fn start(player: P) -> Arc<Self> {
        let scheduler = Arc::new(Self::new(player));
        let worker = Arc::clone(&scheduler);
        tokio::spawn(async move {
            loop {
                worker.wakeup.notified().await;
                worker.drain().await;
            }
        });
        scheduler
    }
}
