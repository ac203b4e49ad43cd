#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::anyhow;
use attendance_kiosk_lib::{
    camera::{CameraDevice, CameraError, Facing, VideoFeed, VideoFrame, VideoSink, VideoStream},
    capture::CapturedFrame,
    events::KioskEvent,
    recognition::{RecognitionClient, ScanFuture, ScanResponse},
};
use image::{Rgb, RgbImage};
use tokio::{sync::mpsc, time::Instant};

pub fn response(json: &str) -> ScanResponse {
    serde_json::from_str(json).expect("valid scan response")
}

/// Recognition service double: replays scripted responses after a fixed
/// delay and records every call.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<ScanResponse, String>>>,
    fallback: ScanResponse,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    started: Mutex<Vec<Instant>>,
    frame_sizes: Mutex<Vec<(u32, u32)>>,
}

impl ScriptedClient {
    pub fn new(delay: Duration) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: response(r#"{"status":"pending"}"#),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            frame_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, json: &str) -> Self {
        self.script.lock().unwrap().push_back(Ok(response(json)));
        self
    }

    pub fn then_fail(self, reason: &str) -> Self {
        self.script.lock().unwrap().push_back(Err(reason.to_string()));
        self
    }

    pub fn repeat(mut self, json: &str) -> Self {
        self.fallback = response(json);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> Vec<Instant> {
        self.started.lock().unwrap().clone()
    }

    pub fn frame_sizes(&self) -> Vec<(u32, u32)> {
        self.frame_sizes.lock().unwrap().clone()
    }
}

impl RecognitionClient for ScriptedClient {
    fn scan<'a>(&'a self, frame: &'a CapturedFrame) -> ScanFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
            self.started.lock().unwrap().push(Instant::now());
            self.frame_sizes.lock().unwrap().push((frame.width, frame.height));

            tokio::time::sleep(self.delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(response)) => Ok(response),
                Some(Err(reason)) => Err(anyhow!(reason)),
                None => Ok(self.fallback.clone()),
            }
        })
    }
}

pub fn gray_frame(width: u32, height: u32) -> VideoFrame {
    VideoFrame::new(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
}

struct FakeStream {
    feed: VideoFeed,
    stopped: Arc<AtomicUsize>,
    done: bool,
}

impl VideoStream for FakeStream {
    fn sink(&self) -> VideoSink {
        self.feed.sink()
    }

    fn stop(&mut self) {
        if !self.done {
            self.done = true;
            self.feed.clear();
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Camera double. Publishes one frame of `frame_size` on open unless told to
/// start without video.
pub struct FakeCamera {
    pub deny: bool,
    pub frame_size: Option<(u32, u32)>,
    pub opened: AtomicUsize,
    pub stopped: Arc<AtomicUsize>,
    pub last_feed: Mutex<Option<VideoFeed>>,
}

impl FakeCamera {
    pub fn streaming(width: u32, height: u32) -> Self {
        Self {
            deny: false,
            frame_size: Some((width, height)),
            opened: AtomicUsize::new(0),
            stopped: Arc::new(AtomicUsize::new(0)),
            last_feed: Mutex::new(None),
        }
    }

    pub fn without_video() -> Self {
        Self {
            frame_size: None,
            ..Self::streaming(0, 0)
        }
    }

    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::streaming(640, 480)
        }
    }

    pub fn publish(&self, frame: VideoFrame) {
        if let Some(feed) = self.last_feed.lock().unwrap().as_ref() {
            feed.publish(frame);
        }
    }

    /// Simulates the device disappearing under a live stream.
    pub fn lose_stream(&self, reason: &str) {
        if let Some(feed) = self.last_feed.lock().unwrap().as_ref() {
            feed.end(reason);
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl CameraDevice for FakeCamera {
    fn name(&self) -> String {
        "/dev/video-fake".into()
    }

    fn open(&self, _facing: Facing) -> Result<Box<dyn VideoStream>, CameraError> {
        if self.deny {
            return Err(CameraError::PermissionDenied { device: self.name() });
        }
        self.opened.fetch_add(1, Ordering::SeqCst);

        let feed = VideoFeed::new();
        if let Some((width, height)) = self.frame_size {
            feed.publish(gray_frame(width, height));
        }
        *self.last_feed.lock().unwrap() = Some(feed.clone());

        Ok(Box::new(FakeStream {
            feed,
            stopped: self.stopped.clone(),
            done: false,
        }))
    }
}

pub fn drain(events: &mut mpsc::UnboundedReceiver<KioskEvent>) -> Vec<KioskEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}
