//! Status signalling through the board's LED
//!
//! The workflow posts [`StatusCode`]s into a small bounded queue. A dedicated
//! task drains it without blocking and keeps rendering the latest code as a
//! repeating blink pattern. Closing the queue is the only shutdown signal.

use crate::{
    config::{BlinkTiming, IndicatorConfig},
    services::hardening::write_attribute,
};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
#[cfg(test)]
use mockall::automock;
use std::{
    convert::Infallible,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    sync::mpsc::{self, Receiver, Sender, error::TryRecvError},
    task::JoinHandle,
    time::sleep,
};
use trait_variant::make;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Busy = 1,
    Success = 2,
    Error = 3,
    NoConfig = 4,
    NoInternet = 5,
}

impl StatusCode {
    pub fn blinks(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Busy => write!(f, "busy"),
            StatusCode::Success => write!(f, "success"),
            StatusCode::Error => write!(f, "error"),
            StatusCode::NoConfig => write!(f, "no config"),
            StatusCode::NoInternet => write!(f, "no internet"),
        }
    }
}

/// Binary on/off output
#[make(Send)]
#[cfg_attr(test, automock)]
pub trait Indicator {
    async fn set(&mut self, on: bool) -> Result<()>;
}

/// LED exposed through the kernel's LED class
pub struct SysfsLed {
    brightness: PathBuf,
}

impl SysfsLed {
    /// Take the LED over from its kernel trigger
    pub fn new(led_dir: &Path) -> Self {
        if let Err(e) = write_attribute(&led_dir.join("trigger"), "none") {
            warn!("failed to disable led trigger: {e:#}");
        }

        Self {
            brightness: led_dir.join("brightness"),
        }
    }
}

impl Indicator for SysfsLed {
    async fn set(&mut self, on: bool) -> Result<()> {
        let value = if on { "1" } else { "0" };

        tokio::fs::write(&self.brightness, value)
            .await
            .context(format!("failed to write {value:?} to {:?}", self.brightness))
    }
}

/// Producer side of the status queue
///
/// Owns the queue's only sender: consuming the context closes the queue.
pub struct StatusContext {
    tx: Sender<StatusCode>,
    final_render_delay: Duration,
}

impl StatusContext {
    pub fn new(capacity: usize, final_render_delay: Duration) -> (Self, Receiver<StatusCode>) {
        let (tx, rx) = mpsc::channel(capacity);

        (
            Self {
                tx,
                final_render_delay,
            },
            rx,
        )
    }

    /// Post a status code, waiting for queue space if necessary
    pub async fn post(&self, code: StatusCode) {
        info!("status: {code}");

        if self.tx.send(code).await.is_err() {
            error!("failed to post status {code}: status queue closed");
        }
    }

    /// Keep the current pattern rendering forever
    pub async fn idle(self) -> Infallible {
        info!("provisioning pass complete, idling");
        std::future::pending::<Infallible>().await
    }

    /// Terminal halt
    ///
    /// Posts `code`, grants the signal task time to render it, then closes
    /// the queue. The signal task ends the process once it sees the closed
    /// queue; the returned future never completes.
    pub async fn halt(self, code: StatusCode) -> Infallible {
        self.post(code).await;
        sleep(self.final_render_delay).await;

        debug!("closing status queue");
        drop(self.tx);

        std::future::pending::<Infallible>().await
    }
}

/// Consumer side of the status queue, driving an [`Indicator`]
pub struct SignalController<I> {
    indicator: I,
    rx: Receiver<StatusCode>,
    timing: BlinkTiming,
}

impl<I: Indicator> SignalController<I> {
    pub fn new(indicator: I, rx: Receiver<StatusCode>, timing: BlinkTiming) -> Self {
        Self {
            indicator,
            rx,
            timing,
        }
    }

    /// Render until the status queue is closed
    pub async fn run(mut self) {
        let mut blinks = 0;

        loop {
            match self.rx.try_recv() {
                Ok(code) => {
                    debug!("rendering status {code}");
                    blinks = code.blinks();
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return,
            }

            for _ in 0..blinks {
                self.drive(true).await;
                sleep(self.timing.on).await;
                self.drive(false).await;
                sleep(self.timing.off).await;
            }

            sleep(self.timing.idle).await;
        }
    }

    async fn drive(&mut self, on: bool) {
        if let Err(e) = self.indicator.set(on).await {
            debug!("failed to drive indicator: {e:#}");
        }
    }
}

impl<I: Indicator + Send + 'static> SignalController<I> {
    /// Spawn the signal task; the process exits with failure once the queue closes
    pub fn start(
        indicator: I,
        config: &IndicatorConfig,
        final_render_delay: Duration,
    ) -> (StatusContext, JoinHandle<()>) {
        let (status, rx) = StatusContext::new(config.queue_capacity, final_render_delay);
        let controller = Self::new(indicator, rx, config.blink);

        let handle = tokio::spawn(async move {
            controller.run().await;
            error!("status queue closed, exiting");
            std::process::exit(1);
        });

        (status, handle)
    }
}
