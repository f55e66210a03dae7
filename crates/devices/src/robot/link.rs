use crate::robot::protocol::RobotTask;
use common_cell::RobotSettings;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

const READ_BUF_BYTES: usize = 1024;

#[derive(Debug, Error)]
pub enum RobotError {
    #[error("Failed to connect to robot at {addr} after {attempts} attempt(s)")]
    ConnectFailed { addr: String, attempts: u32 },

    #[error("Robot link is not connected")]
    NotConnected,

    #[error("Timed out connecting to robot")]
    ConnectTimeout,

    #[error("Timed out waiting for robot response")]
    ResponseTimeout,

    #[error("Robot returned an empty response")]
    EmptyResponse,

    #[error("Robot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How `connect` behaves when the controller is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPolicy {
    /// Single attempt, report failure immediately.
    FailFast,
    /// Up to `attempts` tries with a fixed delay in between.
    Retry { attempts: u32, delay: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

/// Persistent request/response session with the robot controller.
///
/// Strictly one outstanding task per link (methods take `&mut self`); no
/// pipelining. Reusable across connect/disconnect cycles until dropped.
pub struct RobotLink {
    host: String,
    port: u16,
    connect_timeout: Duration,
    response_timeout: Duration,
    connect_policy: ConnectPolicy,
    task_attempts: u32,
    stream: Option<TcpStream>,
}

impl RobotLink {
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        connect_timeout: Duration,
        response_timeout: Duration,
        connect_policy: ConnectPolicy,
        task_attempts: u32,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
            response_timeout,
            connect_policy,
            task_attempts: task_attempts.max(1),
            stream: None,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &RobotSettings) -> Self {
        let policy = if settings.connect_attempts <= 1 {
            ConnectPolicy::FailFast
        } else {
            ConnectPolicy::Retry {
                attempts: settings.connect_attempts,
                delay: Duration::from_secs_f64(settings.connect_retry_delay_s),
            }
        };
        Self::new(
            settings.host.clone(),
            settings.port,
            Duration::from_secs(settings.connect_timeout_s),
            Duration::from_secs(settings.response_timeout_s),
            policy,
            settings.task_attempts,
        )
    }

    #[must_use]
    pub fn state(&self) -> LinkState {
        if self.stream.is_some() { LinkState::Connected } else { LinkState::Disconnected }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Open the session per the configured connect policy.
    ///
    /// # Errors
    ///
    /// [`RobotError::ConnectFailed`] once every attempt is exhausted.
    pub async fn connect(&mut self) -> Result<(), RobotError> {
        let (attempts, delay) = match self.connect_policy {
            ConnectPolicy::FailFast => (1, Duration::ZERO),
            ConnectPolicy::Retry { attempts, delay } => (attempts.max(1), delay),
        };

        for attempt in 1..=attempts {
            match self.connect_once().await {
                Ok(()) => return Ok(()),
                Err(e) => warn!("Robot connect attempt {attempt}/{attempts} failed: {e}"),
            }
            if attempt < attempts {
                sleep(delay).await;
            }
        }
        Err(RobotError::ConnectFailed { addr: self.addr(), attempts })
    }

    /// Close the session. Idempotent.
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            info!("Robot link closed");
        }
    }

    /// Send one task and wait for its reply.
    ///
    /// Timeouts, resets and empty replies are retried up to the per-task
    /// budget, reconnecting the socket before every retry after the first.
    /// The caller receives the last failure once the budget is spent.
    ///
    /// # Errors
    ///
    /// [`RobotError::NotConnected`] when called before `connect`; otherwise
    /// the last transport failure after budget exhaustion.
    pub async fn send_task(&mut self, task: &RobotTask) -> Result<String, RobotError> {
        if self.stream.is_none() {
            return Err(RobotError::NotConnected);
        }

        let mut last_error = RobotError::NotConnected;
        for attempt in 1..=self.task_attempts {
            if attempt > 1 {
                warn!(
                    "Retrying {} task, attempt {attempt}/{}",
                    task.kind, self.task_attempts
                );
                self.disconnect();
                if let Err(e) = self.connect_once().await {
                    last_error = e;
                    continue;
                }
            }
            match self.exchange(task).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!("Task {} attempt {attempt} failed: {e}", task.kind);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn connect_once(&mut self) -> Result<(), RobotError> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => {
                info!("Robot link open: {}", self.addr());
                self.stream = Some(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(RobotError::Io(e)),
            Err(_) => Err(RobotError::ConnectTimeout),
        }
    }

    /// One request/response round trip on the current socket.
    async fn exchange(&mut self, task: &RobotTask) -> Result<String, RobotError> {
        let stream = self.stream.as_mut().ok_or(RobotError::NotConnected)?;

        let frame = task.encode();
        info!("→ {}", frame.trim_end());
        stream.write_all(frame.as_bytes()).await?;

        let mut buf = vec![0u8; READ_BUF_BYTES];
        let n = timeout(self.response_timeout, stream.read(&mut buf))
            .await
            .map_err(|_| RobotError::ResponseTimeout)??;

        let response = String::from_utf8_lossy(&buf[..n]).trim().to_string();
        if response.is_empty() {
            // Covers both an empty line and a peer that closed the socket.
            return Err(RobotError::EmptyResponse);
        }
        info!("← {response}");
        Ok(response)
    }
}
