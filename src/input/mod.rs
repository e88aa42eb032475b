//! Input sources
//!
//! The transmission loop polls an [`InputSource`] once per tick. Device
//! drivers live outside this crate; they publish the latest state into a
//! [`SharedInput`] cell, either in-process or as JSON lines on stdin.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::control::DeviceSample;
use crate::utils::LogThrottler;
use crate::warn_throttled;

/// Supplies one device sample per tick
pub trait InputSource: Send {
    fn sample(&mut self) -> DeviceSample;
}

/// Latest-value cell shared between a producer and the loop
///
/// Reading never blocks on the producer for longer than a clone.
#[derive(Clone, Default)]
pub struct SharedInput {
    latest: Arc<Mutex<DeviceSample>>,
}

impl SharedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current sample
    pub fn set(&self, sample: DeviceSample) {
        *self.latest.lock() = sample;
    }

    /// Mark the device as gone
    pub fn clear(&self) {
        self.set(DeviceSample::None);
    }

    pub fn get(&self) -> DeviceSample {
        self.latest.lock().clone()
    }
}

impl InputSource for SharedInput {
    fn sample(&mut self) -> DeviceSample {
        self.get()
    }
}

/// Feed `input` from JSON-lines samples until EOF or cancellation
///
/// Each line is one serialized [`DeviceSample`]. Malformed lines are skipped.
/// At EOF the device is treated as disconnected.
pub async fn read_json_lines<R>(reader: R, input: SharedInput, cancel: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    let throttler = LogThrottler::default();
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<DeviceSample>(line) {
                    Ok(sample) => input.set(sample),
                    Err(e) => {
                        warn_throttled!(
                            throttler,
                            "malformed_sample",
                            "Ignoring malformed input sample: {}",
                            e
                        );
                    }
                }
            }
            Ok(None) => {
                info!("Input stream closed, device disconnected");
                input.clear();
                break;
            }
            Err(e) => {
                info!("Input stream error: {}, device disconnected", e);
                input.clear();
                break;
            }
        }
    }

    debug!("Input reader exiting");
}

/// Spawn a stdin JSON-lines reader
pub fn spawn_stdin_reader(
    input: SharedInput,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        read_json_lines(BufReader::new(tokio::io::stdin()), input, cancel).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_input_latest_wins() {
        let shared = SharedInput::new();
        let mut source = shared.clone();
        assert_eq!(source.sample(), DeviceSample::None);

        shared.set(DeviceSample::keyboard(["w"]));
        shared.set(DeviceSample::keyboard(["s"]));
        assert_eq!(source.sample(), DeviceSample::keyboard(["s"]));

        shared.clear();
        assert_eq!(source.sample(), DeviceSample::None);
    }

    #[tokio::test]
    async fn test_json_lines_reader() {
        let data = b"{\"kind\":\"keyboard\",\"keys\":[\"w\"]}\nnot json\n\n{\"kind\":\"gamepad\",\"id\":\"Xbox\",\"axes\":[0.5]}\n";
        let input = SharedInput::new();
        let mut seen = input.clone();

        let (reader, mut writer) = tokio::io::duplex(1024);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_json_lines(
            BufReader::new(reader),
            input.clone(),
            cancel.clone(),
        ));

        use tokio::io::AsyncWriteExt;
        writer.write_all(data).await.unwrap();
        writer.flush().await.unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !matches!(seen.sample(), DeviceSample::Gamepad { .. }) {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(seen.sample().identity(), "Xbox");

        drop(writer);
        task.await.unwrap();
        assert_eq!(seen.sample(), DeviceSample::None);
    }

    #[tokio::test]
    async fn test_reader_stops_on_cancel() {
        let (reader, _writer) = tokio::io::duplex(64);
        let input = SharedInput::new();
        input.set(DeviceSample::keyboard(["w"]));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_json_lines(
            BufReader::new(reader),
            input.clone(),
            cancel.clone(),
        ));
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(input.get(), DeviceSample::keyboard(["w"]));
    }

    #[tokio::test]
    async fn test_read_error_disconnects() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"kind\":\"keyboard\",\"keys\":[\"a\"]}\n")
            .read_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let input = SharedInput::new();

        read_json_lines(BufReader::new(mock), input.clone(), CancellationToken::new()).await;
        assert_eq!(input.get(), DeviceSample::None);
    }
}
