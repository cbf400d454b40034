use std::path::Path;
use std::time::Duration;

use rotorlink_frame::StreamChannel;
use rotorlink_transport::UnixDomainSocket;
use tracing::info;

use crate::config::PortConfig;
use crate::error::Result;

/// Accepts ground-link connections on a Unix domain socket.
pub struct PortListener {
    socket: UnixDomainSocket,
    config: PortConfig,
}

impl PortListener {
    /// Bind to a Unix domain socket path.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let socket = UnixDomainSocket::bind(path)?;
        Ok(Self {
            socket,
            config: PortConfig::default(),
        })
    }

    /// Override the port config applied to accepted links.
    pub fn with_config(mut self, config: PortConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Accept the next connection as a packet channel.
    pub fn accept(&self) -> Result<StreamChannel> {
        let stream = self.socket.accept()?;
        info!(path = %self.path().display(), "ground link connected");
        Ok(StreamChannel::open(stream, self.config.frame.clone())?)
    }

    /// Accept a connection if one arrives within `timeout`.
    ///
    /// Returns `Ok(None)` on timeout so callers can check for a stop
    /// request between waits.
    pub fn accept_timeout(&self, timeout: Duration) -> Result<Option<StreamChannel>> {
        if !self.socket.poll_accept(Some(timeout))? {
            return Ok(None);
        }
        self.accept().map(Some)
    }

    /// Bound socket path.
    pub fn path(&self) -> &Path {
        self.socket.path()
    }
}
