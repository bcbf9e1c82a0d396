//! # Network Collaborators
//!
//! Traits for the wireless link and the clock synchronisation the control
//! loop depends on, plus host implementations that drive NetworkManager
//! (`nmcli`) and an NTP client command.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, StationError};

/// Association state of the wireless link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Not associated and not trying
    Down,
    /// Association in progress
    Connecting,
    /// Associated with an address
    Connected,
    /// Association failed or the interface is unusable
    Failed,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Down => write!(f, "down"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Wireless link the station uploads over
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkLink: Send + Sync {
    /// Start associating with `ssid`
    async fn connect(&mut self, ssid: &str, password: &str) -> Result<()>;

    /// Drop the current association
    async fn disconnect(&mut self) -> Result<()>;

    /// Current link state
    async fn status(&self) -> LinkStatus;

    /// Whether the link is known to be down
    async fn is_disconnected(&self) -> bool;
}

/// System clock synchronisation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TimeSync: Send {
    /// Step the clock to network time
    async fn resync(&mut self) -> Result<()>;
}

/// Connect and wait up to `wait` for the link to come up.
///
/// Polls the status once a second; a `Failed` status ends the wait early.
///
/// # Errors
///
/// `ReconnectFailed` if the link is not connected when the wait ends
pub async fn associate(
    link: &mut dyn NetworkLink,
    ssid: &str,
    password: &str,
    wait: Duration,
) -> Result<()> {
    link.connect(ssid, password).await?;

    let mut remaining = wait.as_secs();
    loop {
        match link.status().await {
            LinkStatus::Connected => {
                info!("WiFi connected to {}", ssid);
                return Ok(());
            }
            LinkStatus::Failed => break,
            status if remaining == 0 => {
                debug!("Gave up waiting for {} (status {})", ssid, status);
                break;
            }
            status => {
                info!("Waiting for connection... ({})", status);
                remaining -= 1;
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    let status = link.status().await;
    Err(StationError::ReconnectFailed(format!(
        "could not join {} (status {})",
        ssid, status
    )))
}

/// NetworkManager-backed link
#[derive(Debug, Clone)]
pub struct NmcliLink {
    interface: String,
}

impl NmcliLink {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    async fn nmcli(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("nmcli")
            .args(args)
            .output()
            .await
            .map_err(|e| StationError::Transport(format!("failed to run nmcli: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StationError::Transport(format!(
                "nmcli {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl NetworkLink for NmcliLink {
    async fn connect(&mut self, ssid: &str, password: &str) -> Result<()> {
        let mut args = vec!["device", "wifi", "connect", ssid];
        if !password.is_empty() {
            args.extend(["password", password]);
        }
        args.extend(["ifname", self.interface.as_str()]);

        self.nmcli(&args).await.map(|_| ())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.nmcli(&["device", "disconnect", &self.interface]).await.map(|_| ())
    }

    async fn status(&self) -> LinkStatus {
        match self.nmcli(&["-t", "-f", "DEVICE,STATE", "device"]).await {
            Ok(output) => parse_device_state(&output, &self.interface),
            Err(e) => {
                warn!("Could not query link state: {}", e);
                LinkStatus::Failed
            }
        }
    }

    async fn is_disconnected(&self) -> bool {
        self.status().await != LinkStatus::Connected
    }
}

/// Map `nmcli -t -f DEVICE,STATE device` output to the state of `interface`.
pub fn parse_device_state(output: &str, interface: &str) -> LinkStatus {
    let state = output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(device, _)| *device == interface)
        .map(|(_, state)| state.trim());

    match state {
        Some("connected") => LinkStatus::Connected,
        Some(s) if s.starts_with("connecting") => LinkStatus::Connecting,
        Some("disconnected") | Some("disconnecting") => LinkStatus::Down,
        _ => LinkStatus::Failed,
    }
}

/// Runs an NTP client command, e.g. `chronyc makestep`
#[derive(Debug, Clone)]
pub struct CommandTimeSync {
    command: Vec<String>,
}

impl CommandTimeSync {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl TimeSync for CommandTimeSync {
    async fn resync(&mut self) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| StationError::Transport("empty time sync command".to_string()))?;

        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|e| StationError::Transport(format!("failed to run {}: {}", program, e)))?;

        if !status.success() {
            return Err(StationError::Transport(format!("{} exited with {}", program, status)));
        }

        info!("Clock synchronised with {}", program);
        Ok(())
    }
}
