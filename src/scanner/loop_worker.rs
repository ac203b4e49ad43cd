use std::sync::Arc;

use chrono::Utc;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Duration, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    camera::VideoSink,
    capture::{CapturedFrame, FrameEncoder},
    events::{EventSink, KioskEvent},
    feedback::{FeedbackController, ScanOutcome},
    overlay::map_detection_box,
    recognition::{RecognitionClient, ScanResponse},
};

use super::ScannerState;

// Set to false to silence per-cycle logging
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Everything one scan run needs; cloned out of the controller at start.
pub(crate) struct ScanContext {
    pub sink: VideoSink,
    pub encoder: FrameEncoder,
    pub client: Arc<dyn RecognitionClient>,
    pub feedback: FeedbackController,
    pub events: Arc<dyn EventSink>,
    pub state: Arc<Mutex<ScannerState>>,
    pub interval: Duration,
}

/// Runs scan cycles back to back until `cancel_token` fires.
///
/// The next cycle is scheduled `interval` after the previous one completes,
/// so cycles never overlap and a slow service slows the loop down. If
/// `previous` is given (an earlier run that was stopped mid-request), it is
/// awaited first so that at most one request is ever in flight.
pub(crate) async fn scan_loop(
    ctx: ScanContext,
    cancel_token: CancellationToken,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        if let Err(err) = previous.await {
            log_warn!("previous scan loop ended abnormally: {err}");
        }
    }

    log_info!("scan loop started (interval {}ms)", ctx.interval.as_millis());

    while !cancel_token.is_cancelled() {
        run_cycle(&ctx, &cancel_token).await;

        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = time::sleep(ctx.interval) => {}
        }
    }

    log_info!("scan loop shutting down");
}

async fn run_cycle(ctx: &ScanContext, cancel_token: &CancellationToken) {
    let Some(frame) = ctx.sink.current().filter(|frame| frame.has_dimensions()) else {
        skip_cycle(ctx, "video not ready").await;
        return;
    };

    let encoder = ctx.encoder;
    let captured = match tokio::task::spawn_blocking(move || encoder.encode(&frame)).await {
        Ok(Ok(Some(captured))) => captured,
        Ok(Ok(None)) => {
            skip_cycle(ctx, "frame has no dimensions").await;
            return;
        }
        Ok(Err(err)) => {
            log_error!("frame encode failed: {err:?}");
            return;
        }
        Err(err) => {
            log_error!("frame encode worker join failed: {err}");
            return;
        }
    };

    let started = Instant::now();
    let result = ctx.client.scan(&captured).await;

    // The request is never aborted; a result that lands after stop is dropped here.
    if cancel_token.is_cancelled() {
        log_info!(
            "discarding scan result that resolved {}ms after submit, scanning stopped",
            started.elapsed().as_millis()
        );
        return;
    }

    ctx.state.lock().await.record_cycle(Utc::now());

    match result {
        Ok(response) => apply_response(ctx, cancel_token, &captured, &response).await,
        Err(err) => log_error!(
            "scan cycle failed after {}ms: {err:#}",
            started.elapsed().as_millis()
        ),
    }
}

async fn skip_cycle(ctx: &ScanContext, reason: &str) {
    ctx.state.lock().await.skipped_frames += 1;
    log_debug!("skipping scan cycle: {reason}");
}

/// Liveness is checked again after every await: a close that lands while the
/// state lock is contended must not be overwritten by this cycle.
async fn apply_response(
    ctx: &ScanContext,
    cancel_token: &CancellationToken,
    captured: &CapturedFrame,
    response: &ScanResponse,
) {
    let detection = response
        .face_box
        .and_then(|face_box| map_detection_box(face_box, captured.width, captured.height));

    {
        let mut state = ctx.state.lock().await;
        if cancel_token.is_cancelled() {
            return;
        }
        if state.replace_detection(detection) {
            ctx.events.emit(KioskEvent::DetectionBoxChanged { detection });
        }
    }

    match ScanOutcome::from_response(response, Utc::now()) {
        Some(outcome) if cancel_token.is_cancelled() => {
            log_debug!("dropping {:?} outcome, scanning stopped", outcome.kind);
        }
        Some(outcome) => {
            log_info!("scan result {:?}: {}", outcome.kind, outcome.title);
            ctx.feedback.show(outcome).await;
        }
        None => log_debug!("scan status {:?} has nothing to display", response.status),
    }
}
