// In: src/net/config.rs

//! Communication configuration: the tagged value that selects a backend kind
//! at context-creation time, plus the backend-specific parameter blocks.
//!
//! A `CommConfig` is built once at the application boundary (e.g., from a
//! launcher's JSON) and consumed by `SelatContext::distributed`. It is
//! immutable after construction.

use crate::net::CommType;
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, TcpListener};

/// Selects the communication backend and carries its parameters.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CommConfig {
    /// The no-op local kind. Requesting distributed init with it is a caller
    /// error (`Invalid`); use `SelatContext::local` instead.
    Local,
    /// The TCP message-passing backend.
    Tcp(TcpCommConfig),
    /// RDMA transport parameters. The kind is recognized but reports
    /// `NotImplemented` at init.
    Rdma(RdmaCommConfig),
    /// Reserved stream-transport kind. Recognized, not implemented.
    Stream,
}

impl CommConfig {
    /// The backend kind tag this configuration selects.
    pub fn comm_type(&self) -> CommType {
        match self {
            CommConfig::Local => CommType::Local,
            CommConfig::Tcp(_) => CommType::Tcp,
            CommConfig::Rdma(_) => CommType::Rdma,
            CommConfig::Stream => CommType::Stream,
        }
    }
}

/// Parameters for the TCP message-passing backend.
///
/// `peers` lists one listen address per rank, in rank order; `peers.len()` is
/// the world size, and `peers[rank]` is this process's own listen address.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub struct TcpCommConfig {
    /// This process's 0-based rank.
    pub rank: i32,

    /// Listen address of every rank, in rank order.
    pub peers: Vec<SocketAddr>,

    /// How long to keep re-dialing a peer that is not up yet before giving up.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// When set, payload messages at or above the transport's size threshold
    /// are zstd-compressed on the wire at this level.
    #[serde(default)]
    pub compression_level: Option<i32>,

    /// A pre-bound listener to adopt instead of binding `peers[rank]`.
    /// Useful when ranks bind ephemeral ports first and exchange the
    /// resulting addresses out of band.
    #[serde(skip)]
    pub listener: Option<TcpListener>,
}

impl TcpCommConfig {
    pub fn new(rank: i32, peers: Vec<SocketAddr>) -> Self {
        Self {
            rank,
            peers,
            connect_timeout_ms: default_connect_timeout_ms(),
            compression_level: None,
            listener: None,
        }
    }

    /// Adopts a pre-bound listener for this rank's slot.
    pub fn with_listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = Some(level);
        self
    }

    /// The group cardinality this configuration describes.
    pub fn world_size(&self) -> i32 {
        self.peers.len() as i32
    }
}

/// Helper for `serde` to default the connect timeout.
fn default_connect_timeout_ms() -> u64 {
    10_000
}

/// Parameters for the (unimplemented) RDMA transport.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "snake_case")]
pub struct RdmaCommConfig {
    /// Device hint, e.g. "mlx5_0".
    #[serde(default)]
    pub device: Option<String>,
    /// Device port to use.
    #[serde(default)]
    pub port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comm_type_tags() {
        assert_eq!(CommConfig::Local.comm_type(), CommType::Local);
        assert_eq!(CommConfig::Stream.comm_type(), CommType::Stream);
        assert_eq!(
            CommConfig::Rdma(RdmaCommConfig::default()).comm_type(),
            CommType::Rdma
        );
        let tcp = TcpCommConfig::new(0, vec!["127.0.0.1:9000".parse().unwrap()]);
        assert_eq!(CommConfig::Tcp(tcp).comm_type(), CommType::Tcp);
    }

    #[test]
    fn test_tcp_config_from_json() {
        let json = r#"{
            "backend": "tcp",
            "rank": 1,
            "peers": ["10.0.0.1:9000", "10.0.0.2:9000"]
        }"#;
        let config: CommConfig = serde_json::from_str(json).unwrap();
        match config {
            CommConfig::Tcp(tcp) => {
                assert_eq!(tcp.rank, 1);
                assert_eq!(tcp.world_size(), 2);
                assert_eq!(tcp.connect_timeout_ms, 10_000);
                assert!(tcp.compression_level.is_none());
                assert!(tcp.listener.is_none());
            }
            other => panic!("expected tcp config, got {:?}", other),
        }
    }
}
