use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{sync::Mutex, task::JoinHandle, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{
    camera::VideoSink,
    capture::FrameEncoder,
    events::{EventSink, KioskEvent},
    feedback::FeedbackController,
    recognition::RecognitionClient,
};

use super::{
    loop_worker::{scan_loop, ScanContext},
    ScannerState, ScannerStatus,
};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// `Stopped -> Running -> Stopped`, gated on "stream live" and "scanning
/// enabled". Each run gets its own cancellation token; stopping cancels the
/// pending inter-cycle wait and marks any in-flight result as stale.
pub struct ScanController {
    state: Arc<Mutex<ScannerState>>,
    sink: Option<VideoSink>,
    encoder: FrameEncoder,
    client: Arc<dyn RecognitionClient>,
    feedback: FeedbackController,
    events: Arc<dyn EventSink>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl ScanController {
    pub fn new(
        encoder: FrameEncoder,
        client: Arc<dyn RecognitionClient>,
        feedback: FeedbackController,
        events: Arc<dyn EventSink>,
        interval: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScannerState::new())),
            sink: None,
            encoder,
            client,
            feedback,
            events,
            interval,
            handle: None,
            cancel_token: None,
        }
    }

    pub async fn state(&self) -> ScannerState {
        self.state.lock().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_running()
    }

    pub async fn is_enabled(&self) -> bool {
        self.state.lock().await.enabled
    }

    /// Attaches (or detaches, with `None`) the live video. A running loop
    /// samples the sink it started with, so replacing the sink restarts it.
    pub async fn set_stream(&mut self, sink: Option<VideoSink>) {
        let before = self.flags().await;
        let replaced = sink.is_some() && self.sink.is_some();
        self.state.lock().await.stream_live = sink.is_some();
        self.sink = sink;
        if replaced && self.state.lock().await.is_running() {
            self.stop().await;
        }
        self.reconcile().await;
        self.publish_if_changed(before).await;
    }

    pub async fn set_enabled(&mut self, enabled: bool) {
        let before = self.flags().await;
        self.state.lock().await.enabled = enabled;
        self.reconcile().await;
        self.publish_if_changed(before).await;
    }

    /// Stops scanning, detaches the video and waits for the loop task,
    /// including a request that was still in flight.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.set_stream(None).await;
        if let Some(handle) = self.handle.take() {
            handle.await.context("scan loop task failed to join")?;
        }
        Ok(())
    }

    async fn reconcile(&mut self) {
        let (should_run, running) = {
            let state = self.state.lock().await;
            (state.should_run(), state.is_running())
        };

        match (should_run, running) {
            (true, false) => self.start().await,
            (false, true) => self.stop().await,
            _ => {}
        }
    }

    async fn start(&mut self) {
        let Some(sink) = self.sink.clone() else {
            return;
        };

        let cancel_token = CancellationToken::new();
        let ctx = ScanContext {
            sink,
            encoder: self.encoder,
            client: self.client.clone(),
            feedback: self.feedback.clone(),
            events: self.events.clone(),
            state: self.state.clone(),
            interval: self.interval,
        };

        let previous = self.handle.take();
        self.handle = Some(tokio::spawn(scan_loop(ctx, cancel_token.clone(), previous)));
        self.cancel_token = Some(cancel_token);
        self.state.lock().await.status = ScannerStatus::Running;
        log_info!("scanning started");
    }

    async fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        // The handle is kept: a later start waits on it before its first request.
        self.state.lock().await.status = ScannerStatus::Stopped;
        log_info!("scanning stopped");
    }

    async fn flags(&self) -> (bool, bool) {
        let state = self.state.lock().await;
        (state.enabled, state.is_running())
    }

    async fn publish_if_changed(&self, before: (bool, bool)) {
        let after = self.flags().await;
        if after != before {
            let (enabled, running) = after;
            self.events
                .emit(KioskEvent::ScanningChanged { enabled, running });
        }
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}
