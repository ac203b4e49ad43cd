use std::sync::Arc;

use tokio::{sync::Mutex, task::JoinHandle, time};

use crate::events::{EventSink, KioskEvent};

use super::{FeedbackDurations, FeedbackState, ScanOutcome};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

const IDLE_BANNER: &str = "Scanning...";

/// Owns the on-screen scan result and its single expiry timer.
#[derive(Clone)]
pub struct FeedbackController {
    state: Arc<Mutex<FeedbackState>>,
    expiry: Arc<Mutex<Option<JoinHandle<()>>>>,
    durations: FeedbackDurations,
    events: Arc<dyn EventSink>,
}

impl FeedbackController {
    pub fn new(durations: FeedbackDurations, events: Arc<dyn EventSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedbackState::new())),
            expiry: Arc::new(Mutex::new(None)),
            durations,
            events,
        }
    }

    pub async fn current(&self) -> Option<ScanOutcome> {
        self.state
            .lock()
            .await
            .current()
            .map(|active| active.outcome.clone())
    }

    /// Puts `outcome` on screen, replacing whatever was there, and re-arms the
    /// expiry for the new outcome's lifetime.
    pub async fn show(&self, outcome: ScanOutcome) {
        let ttl = self.durations.for_kind(outcome.kind);
        let banner = outcome.banner();

        let mut expiry = self.expiry.lock().await;
        if let Some(handle) = expiry.take() {
            handle.abort();
        }

        let generation = {
            let mut state = self.state.lock().await;
            state.show(outcome.clone(), ttl, time::Instant::now())
        };

        log_debug!("feedback {:?} for {}ms: {}", outcome.kind, ttl.as_millis(), banner);
        self.events.emit(KioskEvent::FeedbackChanged {
            outcome: Some(outcome),
            banner,
        });

        let state = self.state.clone();
        let events = self.events.clone();
        *expiry = Some(tokio::spawn(async move {
            time::sleep(ttl).await;
            let cleared = state.lock().await.expire(generation);
            if cleared {
                events.emit(KioskEvent::FeedbackChanged {
                    outcome: None,
                    banner: IDLE_BANNER.to_string(),
                });
            }
        }));
    }

    /// Drops the current outcome and its timer.
    pub async fn clear(&self) {
        let mut expiry = self.expiry.lock().await;
        if let Some(handle) = expiry.take() {
            handle.abort();
        }

        let was_showing = self.state.lock().await.clear();
        if was_showing {
            self.events.emit(KioskEvent::FeedbackChanged {
                outcome: None,
                banner: IDLE_BANNER.to_string(),
            });
        }
    }

    /// Number of expiry timers still waiting to fire (0 or 1).
    pub async fn pending_expiries(&self) -> usize {
        self.expiry
            .lock()
            .await
            .as_ref()
            .map_or(0, |handle| usize::from(!handle.is_finished()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use tokio::sync::mpsc;

    use super::*;
    use crate::feedback::OutcomeKind;
    use crate::recognition::ScanResponse;

    fn outcome(json: &str) -> ScanOutcome {
        let response: ScanResponse = serde_json::from_str(json).unwrap();
        ScanOutcome::from_response(&response, Utc::now()).unwrap()
    }

    fn controller() -> (FeedbackController, mpsc::UnboundedReceiver<KioskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (FeedbackController::new(FeedbackDurations::default(), Arc::new(tx)), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn recognized_outcome_expires_after_three_seconds() {
        let (feedback, mut events) = controller();
        feedback
            .show(outcome(r#"{"status":"success","student_name":"Ayşe Demir"}"#))
            .await;

        match events.recv().await.unwrap() {
            KioskEvent::FeedbackChanged { outcome: Some(shown), .. } => {
                assert_eq!(shown.title, "Ayşe Demir");
            }
            other => panic!("unexpected event {other:?}"),
        }

        time::sleep(Duration::from_millis(2990)).await;
        assert!(feedback.current().await.is_some());

        time::sleep(Duration::from_millis(20)).await;
        assert!(feedback.current().await.is_none());
        assert_eq!(
            events.recv().await.unwrap(),
            KioskEvent::FeedbackChanged {
                outcome: None,
                banner: "Scanning...".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn new_outcome_cancels_previous_timer() {
        let (feedback, mut events) = controller();

        feedback
            .show(outcome(r#"{"status":"success","student_name":"A"}"#))
            .await;
        time::sleep(Duration::from_millis(2500)).await;
        feedback.show(outcome(r#"{"status":"no_data"}"#)).await;
        assert_eq!(feedback.pending_expiries().await, 1);

        // A's 3000 ms deadline passes; B (2000 ms) must still be on screen.
        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(
            feedback.current().await.map(|o| o.kind),
            Some(OutcomeKind::NoEnrollmentData)
        );

        time::sleep(Duration::from_millis(1100)).await;
        assert!(feedback.current().await.is_none());
        assert_eq!(feedback.pending_expiries().await, 0);

        let mut cleared = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, KioskEvent::FeedbackChanged { outcome: None, .. }) {
                cleared += 1;
            }
        }
        assert_eq!(cleared, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_expiry() {
        let (feedback, _events) = controller();
        feedback.show(outcome(r#"{"status":"no_match"}"#)).await;
        feedback.clear().await;

        assert!(feedback.current().await.is_none());
        assert_eq!(feedback.pending_expiries().await, 0);
    }
}
