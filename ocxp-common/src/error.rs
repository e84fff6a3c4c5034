use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error as ErrorTrait;

#[derive(Debug, Clone, ErrorTrait)]
pub struct Error {
    ctx: Kind,
}

impl Error {
    fn new(ctx: Kind) -> Self {
        Self { ctx }
    }

    pub fn kind(&self) -> &Kind {
        &self.ctx
    }

    pub fn is_malformed_input(&self) -> bool {
        matches!(&self.ctx, Kind::MalformedInput(_))
    }

    pub fn is_connect_failed(&self) -> bool {
        matches!(&self.ctx, Kind::ConnectFailed(_))
    }

    pub fn is_write_failed(&self) -> bool {
        matches!(&self.ctx, Kind::WriteFailed(_))
    }

    pub fn is_bind_failed(&self) -> bool {
        matches!(&self.ctx, Kind::BindFailed(_))
    }

    pub fn is_accept_failed(&self) -> bool {
        matches!(&self.ctx, Kind::AcceptFailed(_))
    }

    pub fn is_publish_failed(&self) -> bool {
        matches!(&self.ctx, Kind::PublishFailed(_))
    }

    pub fn malformed_input(msg: impl Into<String>) -> Self {
        Self::new(Kind::MalformedInput(msg.into()))
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(Kind::Config(msg.into()))
    }

    pub fn connect_failed(msg: impl Into<String>) -> Self {
        Self::new(Kind::ConnectFailed(msg.into()))
    }

    pub fn spawn_failed(msg: impl Into<String>) -> Self {
        Self::new(Kind::SpawnFailed(msg.into()))
    }

    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::new(Kind::WriteFailed(msg.into()))
    }

    pub fn bind_failed(msg: impl Into<String>) -> Self {
        Self::new(Kind::BindFailed(msg.into()))
    }

    pub fn accept_failed(msg: impl Into<String>) -> Self {
        Self::new(Kind::AcceptFailed(msg.into()))
    }

    pub fn publish_failed(msg: impl Into<String>) -> Self {
        Self::new(Kind::PublishFailed(msg.into()))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        Display::fmt(&self.ctx, f)
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::MalformedInput(msg) => write!(f, "malformed input: {}", msg),
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::ConnectFailed(msg) => write!(f, "connect failed: {}", msg),
            Self::SpawnFailed(msg) => write!(f, "daemon spawn failed: {}", msg),
            Self::WriteFailed(msg) => write!(f, "write failed: {}", msg),
            Self::BindFailed(msg) => write!(f, "bind failed: {}", msg),
            Self::AcceptFailed(msg) => write!(f, "accept failed: {}", msg),
            Self::PublishFailed(msg) => write!(f, "publish failed: {}", msg),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Kind {
    /// Required sender input is missing or a user variable lacks `=`.
    MalformedInput(String),
    /// Config file cannot be read, parsed or validated.
    Config(String),
    /// Loopback connect failed after the spawn-and-retry cycle.
    ConnectFailed(String),
    /// Detached daemon process could not be launched.
    SpawnFailed(String),
    /// Payload write to the daemon failed.
    WriteFailed(String),
    /// Daemon cannot claim its listen address.
    BindFailed(String),
    /// Listener returned an error from accept.
    AcceptFailed(String),
    /// Broker rejected or dropped a publication.
    PublishFailed(String),
}
