use crate::actor::{Actor, Context};
use anyhow::Result;
use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};
use tokio::{
    sync::oneshot,
    time::{sleep, Instant},
};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RateKey(pub String);

#[derive(Debug)]
pub enum RateMsg {
    /// Set (or change) the requests-per-minute ceiling for a key.
    Upsert { key: RateKey, rpm: u32 },
    /// Block until a slot opens for `key`, then reply.
    Acquire {
        key: RateKey,
        reply: oneshot::Sender<RatePermit>,
    },
}

#[derive(Debug)]
pub struct RatePermit; // no-op token (ack)

/// Sliding window over the last 60 seconds for a single rate key.
///
/// `poll()` implements `waitForSlot()`: drop timestamps older than
/// `now - 60s`; if the remaining count is below `rpm`, record `now` and
/// return a zero wait; otherwise return the delay until the oldest
/// remaining timestamp ages out. At most `rpm` zero-wait polls occur in any
/// rolling 60-second window.
#[derive(Debug)]
struct Window {
    rpm: u32,
    timestamps: VecDeque<Instant>,
}

impl Window {
    fn new(rpm: u32) -> Self {
        Self {
            rpm,
            timestamps: VecDeque::new(),
        }
    }

    fn poll(&mut self, now: Instant) -> Duration {
        let horizon = Duration::from_secs(60);
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= horizon {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }

        if (self.timestamps.len() as u32) < self.rpm {
            self.timestamps.push_back(now);
            return Duration::ZERO;
        }

        // Commit the slot now: the caller waiting out `wait` is the one who will
        // occupy it once the oldest entry ages out, so record that future instant
        // rather than leaving the window stale until a second mutation that never
        // comes (the sleep happens off the mailbox, not another `poll` call).
        let oldest = self.timestamps.pop_front().expect("rpm > 0 implies non-empty");
        let grant_at = oldest + horizon;
        self.timestamps.push_back(grant_at);
        grant_at.saturating_duration_since(now)
    }
}

/// Sliding-window rate limiter actor, one window per [`RateKey`].
///
/// Mutation of a key's timestamp window happens exclusively on the actor's
/// single mailbox-processing task, so no lock is ever held across the
/// sleep: the wait itself happens in a detached task which replies through
/// a oneshot channel. A cancelled caller just drops the receiver.
pub struct RateLimiter {
    windows: HashMap<RateKey, Window>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: HashMap::new(),
        }
    }

    fn upsert(&mut self, key: RateKey, rpm: u32) {
        self.windows
            .entry(key)
            .and_modify(|w| w.rpm = rpm)
            .or_insert_with(|| Window::new(rpm));
    }
}

#[async_trait::async_trait]
impl Actor for RateLimiter {
    type Msg = RateMsg;

    async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            RateMsg::Upsert { key, rpm } => {
                self.upsert(key, rpm);
            }
            RateMsg::Acquire { key, reply } => {
                let now = Instant::now();
                let window = self
                    .windows
                    .entry(key)
                    .or_insert_with(|| Window::new(u32::MAX));
                let wait = window.poll(now);

                if wait.is_zero() {
                    let _ = reply.send(RatePermit);
                } else {
                    // The slot accounting already happened in `poll`'s count
                    // check above (the caller occupies the Nth slot once the
                    // oldest one ages out); only the sleep itself needs to
                    // happen off-actor so the mailbox isn't blocked.
                    tokio::spawn(async move {
                        sleep(wait).await;
                        let _ = reply.send(RatePermit);
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_grants_up_to_rpm_immediately() {
        let mut w = Window::new(2);
        let t0 = Instant::now();
        assert_eq!(w.poll(t0), Duration::ZERO);
        assert_eq!(w.poll(t0), Duration::ZERO);
        assert!(w.poll(t0) > Duration::ZERO);
    }

    #[test]
    fn window_drops_entries_older_than_horizon() {
        let mut w = Window::new(1);
        let t0 = Instant::now();
        assert_eq!(w.poll(t0), Duration::ZERO);
        let t1 = t0 + Duration::from_secs(61);
        assert_eq!(w.poll(t1), Duration::ZERO);
    }

    #[tokio::test]
    async fn acquire_serializes_through_the_actor() {
        use crate::actor::{spawn_actor, ActorHandle};

        let ActorHandle { addr, .. } = spawn_actor(RateLimiter::new(), 16);
        let key = RateKey("test".into());
        addr.send(RateMsg::Upsert {
            key: key.clone(),
            rpm: 1_000,
        })
        .await
        .unwrap();

        let (tx, rx) = oneshot::channel();
        addr.send(RateMsg::Acquire {
            key: key.clone(),
            reply: tx,
        })
        .await
        .unwrap();
        rx.await.unwrap();
    }
}
