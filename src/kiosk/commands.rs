use std::str::FromStr;

use anyhow::{bail, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::Kiosk;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Toggle,
    Start,
    Stop,
    Retry,
    Snapshot,
    Status,
    /// "close" and "complete" both end the session.
    Close,
}

impl FromStr for OperatorCommand {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Ok(match value.trim().to_ascii_lowercase().as_str() {
            "toggle" | "t" => OperatorCommand::Toggle,
            "start" => OperatorCommand::Start,
            "stop" => OperatorCommand::Stop,
            "retry" => OperatorCommand::Retry,
            "snapshot" | "photo" => OperatorCommand::Snapshot,
            "status" => OperatorCommand::Status,
            "close" | "complete" | "quit" | "q" => OperatorCommand::Close,
            other => bail!("unknown command '{other}'"),
        })
    }
}

/// Applies one command. Returns `false` once the kiosk has been closed.
pub async fn dispatch(kiosk: &mut Kiosk, command: OperatorCommand) -> Result<bool> {
    match command {
        OperatorCommand::Toggle => {
            let enabled = kiosk.toggle_scanning().await;
            log_info!("scanning {}", if enabled { "enabled" } else { "disabled" });
        }
        OperatorCommand::Start => kiosk.set_scanning(true).await,
        OperatorCommand::Stop => kiosk.set_scanning(false).await,
        OperatorCommand::Retry => {
            let state = kiosk.retry_camera().await;
            log_info!("camera state after retry: {state:?}");
        }
        OperatorCommand::Snapshot => {
            let captured = kiosk.snapshot().await?;
            log_info!("snapshot captured ({}x{})", captured.width, captured.height);
        }
        OperatorCommand::Status => {
            let scanner = kiosk.scanner_state().await;
            log_info!(
                "camera {:?}, scanner {:?} (enabled: {}, cycles: {}, skipped: {})",
                kiosk.camera_state(),
                scanner.status,
                scanner.enabled,
                scanner.cycles,
                scanner.skipped_frames
            );
        }
        OperatorCommand::Close => {
            kiosk.close().await?;
            return Ok(false);
        }
    }
    Ok(true)
}

/// Reads operator commands line by line until `close` or end of input, and
/// reports a camera stream that dies in between. The kiosk is closed on every
/// exit path.
pub async fn run_operator_loop<R>(kiosk: &mut Kiosk, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            reason = kiosk.stream_lost() => {
                let state = kiosk.handle_stream_lost(&reason).await;
                log_warn!("camera state after stream loss: {state:?}");
                continue;
            }
            _ = tokio::signal::ctrl_c() => {
                log_info!("interrupted, closing kiosk");
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                log_error!("failed to read operator input: {err}");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<OperatorCommand>() {
            Ok(command) => match dispatch(kiosk, command).await {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(err) => log_warn!("{command:?} failed: {err:#}"),
            },
            Err(err) => log_warn!("{err}"),
        }
    }

    kiosk.close().await
}
