//! One-shot timed visual effects such as the capture banner.

use std::time::Duration;

use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

pub const CAPTURE_BANNER_DURATION: Duration = Duration::from_millis(1600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    CaptureBanner { captured: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectToken(u64);

/// Sent when an armed effect's timer runs out. Stale tokens are ignored by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectExpired {
    pub token: EffectToken,
}

struct ActiveEffect {
    effect: Effect,
    token: EffectToken,
    timer: Option<JoinHandle<()>>,
}

/// Keeps at most one effect alive. Arming replaces the current effect and cancels its timer.
pub struct EffectScheduler {
    expiries: mpsc::UnboundedSender<EffectExpired>,
    next_token: u64,
    active: Option<ActiveEffect>,
}

impl EffectScheduler {
    pub fn new(expiries: mpsc::UnboundedSender<EffectExpired>) -> Self {
        Self {
            expiries,
            next_token: 0,
            active: None,
        }
    }

    /// The expiry timer runs on the current tokio runtime. Outside a runtime the effect is
    /// still armed but only ends when it is replaced or cancelled.
    pub fn arm(&mut self, effect: Effect, duration: Duration) -> EffectToken {
        self.cancel_all();
        self.next_token += 1;
        let token = EffectToken(self.next_token);
        let expiries = self.expiries.clone();
        let timer = match Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(async move {
                tokio::time::sleep(duration).await;
                let _ = expiries.send(EffectExpired { token });
            })),
            Err(_) => {
                warn!(?effect, "no tokio runtime; effect will not expire on its own");
                None
            }
        };
        debug!(?effect, ?duration, "effect armed");
        self.active = Some(ActiveEffect {
            effect,
            token,
            timer,
        });
        token
    }

    pub fn active(&self) -> Option<&Effect> {
        self.active.as_ref().map(|active| &active.effect)
    }

    pub fn cancel_all(&mut self) {
        if let Some(active) = self.active.take() {
            if let Some(timer) = active.timer {
                timer.abort();
            }
            debug!(effect = ?active.effect, "effect cancelled");
        }
    }

    /// Clears the active effect if `expired` belongs to it and returns what ended.
    pub fn expire(&mut self, expired: EffectExpired) -> Option<Effect> {
        match &self.active {
            Some(active) if active.token == expired.token => {
                self.active.take().map(|active| active.effect)
            }
            _ => None,
        }
    }
}

impl Drop for EffectScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{timeout, Instant};

    use super::*;

    fn banner(captured: &str) -> Effect {
        Effect::CaptureBanner {
            captured: captured.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn armed_effect_expires_after_exact_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = EffectScheduler::new(tx);
        let started = Instant::now();

        let token = scheduler.arm(banner("black Pawn"), CAPTURE_BANNER_DURATION);

        let early = timeout(CAPTURE_BANNER_DURATION - Duration::from_millis(1), rx.recv()).await;
        assert!(early.is_err(), "effect must not end early");
        assert!(scheduler.active().is_some());

        let expired = rx.recv().await.expect("expiry");
        assert_eq!(expired.token, token);
        let elapsed = started.elapsed();
        assert!(elapsed >= CAPTURE_BANNER_DURATION);
        assert!(elapsed < CAPTURE_BANNER_DURATION + Duration::from_millis(5));
        assert_eq!(scheduler.expire(expired), Some(banner("black Pawn")));
        assert!(scheduler.active().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_previous_effect() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = EffectScheduler::new(tx);

        let first = scheduler.arm(banner("black Pawn"), CAPTURE_BANNER_DURATION);
        tokio::time::advance(Duration::from_millis(800)).await;
        let second = scheduler.arm(banner("black Rook"), CAPTURE_BANNER_DURATION);
        assert_ne!(first, second);
        assert_eq!(scheduler.active(), Some(&banner("black Rook")));

        let expired = rx.recv().await.expect("expiry");
        assert_eq!(expired.token, second);
        assert_eq!(scheduler.expire(expired), Some(banner("black Rook")));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_prevents_any_later_expiry() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = EffectScheduler::new(tx);

        let token = scheduler.arm(banner("white Knight"), CAPTURE_BANNER_DURATION);
        scheduler.cancel_all();
        assert!(scheduler.active().is_none());

        let late = timeout(CAPTURE_BANNER_DURATION * 2, rx.recv()).await;
        assert!(late.is_err(), "cancelled effect must not fire");
        assert_eq!(scheduler.expire(EffectExpired { token }), None);
    }

    #[test]
    fn arming_outside_a_runtime_keeps_effect_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = EffectScheduler::new(tx);

        scheduler.arm(banner("black Bishop"), CAPTURE_BANNER_DURATION);
        assert_eq!(scheduler.active(), Some(&banner("black Bishop")));

        scheduler.cancel_all();
        assert!(scheduler.active().is_none());
        assert!(rx.try_recv().is_err());
    }
}
