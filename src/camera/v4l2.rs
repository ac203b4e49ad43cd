//! V4L2 camera backend driving an `ffmpeg` child process.
//!
//! ffmpeg opens the device node and writes packed RGB24 frames of the
//! requested size to stdout; a reader thread publishes the newest frame into
//! the stream's [`VideoFeed`]. `open` only succeeds once the first frame has
//! arrived, so a busy or unsupported device fails the request instead of
//! producing a silent stream.

use std::{
    fs::OpenOptions,
    io::{self, Read},
    path::{Path, PathBuf},
    process::{Child, ChildStdout, Command, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError, SyncSender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::anyhow;
use image::RgbImage;

use super::device::{CameraDevice, CameraError, Facing, VideoFeed, VideoFrame, VideoSink, VideoStream};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(5);

pub struct V4l2Camera {
    device: PathBuf,
    size: (u32, u32),
    ffmpeg: PathBuf,
    start_timeout: Duration,
}

impl V4l2Camera {
    pub fn new(device: impl Into<PathBuf>, size: (u32, u32)) -> Self {
        Self {
            device: device.into(),
            size,
            ffmpeg: PathBuf::from("ffmpeg"),
            start_timeout: DEFAULT_START_TIMEOUT,
        }
    }

    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    /// How long `open` waits for the first frame before giving up.
    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    fn busy(&self, reason: impl Into<String>) -> CameraError {
        CameraError::Busy {
            device: self.name(),
            reason: reason.into(),
        }
    }

    fn command(&self) -> Command {
        let (width, height) = self.size;
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-f")
            .arg("video4linux2")
            .arg("-video_size")
            .arg(format!("{width}x{height}"))
            .arg("-i")
            .arg(&self.device)
            .arg("-vf")
            .arg(format!("scale={width}:{height}"))
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-f")
            .arg("rawvideo")
            .arg("-");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

/// Checks that the device node exists and is readable before ffmpeg is
/// started, so denial surfaces as a typed error instead of an early EOF.
fn probe_device(path: &Path) -> Result<(), CameraError> {
    let device = path.display().to_string();
    match OpenOptions::new().read(true).open(path) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(CameraError::NotFound { device }),
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            Err(CameraError::PermissionDenied { device })
        }
        Err(err) => Err(CameraError::Busy {
            device,
            reason: err.to_string(),
        }),
    }
}

impl CameraDevice for V4l2Camera {
    fn name(&self) -> String {
        self.device.display().to_string()
    }

    fn open(&self, facing: Facing) -> Result<Box<dyn VideoStream>, CameraError> {
        // V4L2 nodes carry no facing metadata; the configured node is the kiosk camera.
        log_debug!("opening {} (facing {:?})", self.device.display(), facing);
        probe_device(&self.device)?;

        let mut child = self.command().spawn().map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                self.busy(format!("{} is not installed", self.ffmpeg.display()))
            } else {
                CameraError::Backend(anyhow!("failed to spawn ffmpeg: {err}"))
            }
        })?;

        let Some(stdout) = child.stdout.take() else {
            shutdown_child(&mut child);
            return Err(CameraError::Backend(anyhow!("failed to capture ffmpeg stdout")));
        };

        let feed = VideoFeed::new();
        let stopping = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::sync_channel(1);
        let spawned = thread::Builder::new()
            .name("camera-reader".to_string())
            .spawn({
                let feed = feed.clone();
                let stopping = stopping.clone();
                let size = self.size;
                move || read_frames(stdout, size, feed, stopping, started_tx)
            });
        let reader = match spawned {
            Ok(reader) => reader,
            Err(err) => {
                shutdown_child(&mut child);
                return Err(CameraError::Backend(anyhow!("failed to spawn camera reader: {err}")));
            }
        };

        let mut stream = FfmpegStream {
            child: Some(child),
            reader: Some(reader),
            feed,
            stopping,
        };

        let failure = match started_rx.recv_timeout(self.start_timeout) {
            Ok(Ok(())) => return Ok(Box::new(stream)),
            Ok(Err(reason)) => reason,
            Err(RecvTimeoutError::Timeout) => format!(
                "no frame within {}ms",
                self.start_timeout.as_millis()
            ),
            Err(RecvTimeoutError::Disconnected) => "camera reader exited".to_string(),
        };

        let status = stream.exit_status();
        stream.stop();
        Err(self.busy(match status {
            Some(status) => format!("{failure} (ffmpeg {status})"),
            None => failure,
        }))
    }
}

fn shutdown_child(child: &mut Child) {
    if let Err(err) = child.kill() {
        log_debug!("ffmpeg already gone: {err}");
    }
    let _ = child.wait();
}

/// Reads fixed-size frames until EOF. The first frame (or the failure to get
/// one) is reported on `started`; a later EOF that nobody asked for marks the
/// stream as lost.
fn read_frames(
    mut stdout: ChildStdout,
    size: (u32, u32),
    feed: VideoFeed,
    stopping: Arc<AtomicBool>,
    started: SyncSender<Result<(), String>>,
) {
    let (width, height) = size;
    let frame_bytes = width as usize * height as usize * 3;
    let mut buffer = vec![0u8; frame_bytes];
    let mut started = Some(started);

    loop {
        if let Err(err) = stdout.read_exact(&mut buffer) {
            let reason = if err.kind() == io::ErrorKind::UnexpectedEof {
                "camera stream ended".to_string()
            } else {
                format!("camera stream failed: {err}")
            };

            if let Some(started) = started.take() {
                let _ = started.send(Err(format!("{reason} before the first frame")));
                feed.clear();
            } else if stopping.load(Ordering::SeqCst) {
                feed.clear();
            } else {
                log_warn!("{reason}");
                feed.end(reason);
            }
            return;
        }

        match RgbImage::from_raw(width, height, buffer.clone()) {
            Some(image) => {
                feed.publish(VideoFrame::new(image));
                if let Some(started) = started.take() {
                    let _ = started.send(Ok(()));
                }
            }
            None => {
                log_warn!("dropping malformed frame ({} bytes)", buffer.len());
            }
        }
    }
}

struct FfmpegStream {
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    feed: VideoFeed,
    stopping: Arc<AtomicBool>,
}

impl FfmpegStream {
    fn exit_status(&mut self) -> Option<std::process::ExitStatus> {
        let child = self.child.as_mut()?;
        // Give a process that closed its stdout a moment to be reaped.
        for _ in 0..10 {
            match child.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) => thread::sleep(Duration::from_millis(10)),
                Err(_) => return None,
            }
        }
        None
    }
}

impl VideoStream for FfmpegStream {
    fn sink(&self) -> VideoSink {
        self.feed.sink()
    }

    fn stop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.feed.clear();

        if let Some(mut child) = self.child.take() {
            shutdown_child(&mut child);
        }

        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                log_warn!("camera reader thread panicked");
            }
        }
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_node_is_not_found() {
        let camera = V4l2Camera::new("/dev/video-kiosk-missing", (640, 480));
        let err = camera.open(Facing::User).err().expect("open must fail");
        assert!(matches!(err, CameraError::NotFound { .. }));
    }

    #[test]
    fn backend_exiting_before_first_frame_is_busy() {
        let camera = V4l2Camera::new("/dev/null", (4, 4))
            .with_ffmpeg("false")
            .with_start_timeout(Duration::from_secs(5));
        let err = camera.open(Facing::User).err().expect("open must fail");

        match err {
            CameraError::Busy { device, reason } => {
                assert_eq!(device, "/dev/null");
                assert!(reason.contains("before the first frame"), "reason: {reason}");
            }
            other => panic!("expected Busy, got {other:?}"),
        }
    }

    #[test]
    fn missing_backend_binary_is_busy() {
        let camera = V4l2Camera::new("/dev/null", (4, 4)).with_ffmpeg("/nonexistent/kiosk-ffmpeg");
        let err = camera.open(Facing::User).err().expect("open must fail");
        assert!(matches!(err, CameraError::Busy { ref reason, .. } if reason.contains("not installed")));
    }

    #[test]
    fn command_requests_raw_rgb_at_capture_size() {
        let camera = V4l2Camera::new("/dev/video2", (1280, 720));
        let cmd = camera.command();
        let args: Vec<String> = cmd
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        assert_eq!(cmd.get_program(), "ffmpeg");
        assert!(args.windows(2).any(|w| w == ["-video_size", "1280x720"]));
        assert!(args.windows(2).any(|w| w == ["-i", "/dev/video2"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "rgb24"]));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }
}
