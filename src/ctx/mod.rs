// In: src/ctx/mod.rs

//! The per-process handle everything else in the engine receives: who am I,
//! how many peers, how do I talk to them.
//!
//! A `SelatContext` is created once at process start: either local
//! (degenerate single-process mode) or distributed, in which case it owns
//! the communication backend selected by a [`CommConfig`]. It also carries
//! process-local configuration and a monotonically increasing sequence
//! counter. The context is meant for single-threaded use; nothing here
//! locks.

use crate::error::{SelatError, SelatResult};
use crate::net::tcp::TcpCommunicator;
use crate::net::{CommConfig, CommType, Communicator};
use log::{debug, warn};
use std::collections::HashMap;

pub struct SelatContext {
    is_distributed: bool,
    communicator: Option<Box<dyn Communicator>>,
    config: HashMap<String, String>,
    sequence_no: i32,
    finalized: bool,
}

impl std::fmt::Debug for SelatContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelatContext")
            .field("is_distributed", &self.is_distributed)
            .field("communicator", &self.communicator.is_some())
            .field("config", &self.config)
            .field("sequence_no", &self.sequence_no)
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl SelatContext {
    /// Creates the degenerate single-process context: rank 0, world size 1,
    /// no communicator. Never fails.
    pub fn local() -> Self {
        Self {
            is_distributed: false,
            communicator: None,
            config: HashMap::new(),
            sequence_no: 0,
            finalized: false,
        }
    }

    /// Creates a distributed context by constructing and initializing the
    /// backend selected by `config`.
    ///
    /// Requesting the `Local` kind here is a caller error (`Invalid`); the
    /// recognized-but-unimplemented kinds fail `NotImplemented`. If backend
    /// init fails, its error is propagated unchanged and no partial context
    /// is exposed.
    pub fn distributed(config: CommConfig) -> SelatResult<Self> {
        match config {
            CommConfig::Local => Err(SelatError::Invalid(
                "distributed init requested with a non-distributed configuration".to_string(),
            )),
            CommConfig::Rdma(_) => Err(SelatError::NotImplemented(
                "rdma communication is not implemented".to_string(),
            )),
            CommConfig::Stream => Err(SelatError::NotImplemented(
                "stream communication is not implemented".to_string(),
            )),
            CommConfig::Tcp(tcp) => {
                let communicator = TcpCommunicator::connect(tcp)?;
                Ok(Self::from_communicator(Box::new(communicator)))
            }
        }
    }

    /// Wraps an already-initialized backend directly. The factory above is
    /// the normal entry point; this one is for backend implementors and test
    /// harnesses that inject their own [`Communicator`].
    pub fn from_communicator(communicator: Box<dyn Communicator>) -> Self {
        debug!(
            "context up: rank {} of {} over {:?}",
            communicator.rank(),
            communicator.world_size(),
            communicator.comm_type()
        );
        Self {
            is_distributed: true,
            communicator: Some(communicator),
            config: HashMap::new(),
            sequence_no: 0,
            finalized: false,
        }
    }

    pub fn is_distributed(&self) -> bool {
        self.is_distributed
    }

    pub fn rank(&self) -> i32 {
        match &self.communicator {
            Some(comm) => comm.rank(),
            None => 0,
        }
    }

    pub fn world_size(&self) -> i32 {
        match &self.communicator {
            Some(comm) => comm.world_size(),
            None => 1,
        }
    }

    /// The ordered ranks `0..world_size`, optionally without this rank.
    pub fn neighbours(&self, include_self: bool) -> Vec<i32> {
        let rank = self.rank();
        (0..self.world_size())
            .filter(|&r| include_self || r != rank)
            .collect()
    }

    /// The backend this context owns.
    ///
    /// # Panics
    ///
    /// Calling this on a local (non-distributed) context is a programming
    /// contract violation, not a recoverable failure: returning an absent
    /// backend would silently corrupt subsequent collective calls, so this
    /// panics instead. It must never be reached in correct code.
    pub fn communicator(&self) -> &dyn Communicator {
        match &self.communicator {
            Some(comm) => comm.as_ref(),
            None => panic!("no communicator available for local mode"),
        }
    }

    pub fn comm_type(&self) -> CommType {
        match &self.communicator {
            Some(comm) => comm.comm_type(),
            None => CommType::Local,
        }
    }

    /// Blocks until every rank has entered the barrier. A no-op when local.
    pub fn barrier(&self) -> SelatResult<()> {
        match &self.communicator {
            Some(comm) => comm.barrier(),
            None => Ok(()),
        }
    }

    /// Returns the current sequence number, then increments it.
    ///
    /// The counter is rank-local state: it is suitable for naming inside a
    /// rank's own request stream, and must never be assumed identical across
    /// ranks.
    pub fn next_sequence(&mut self) -> i32 {
        let seq = self.sequence_no;
        self.sequence_no += 1;
        seq
    }

    /// Stores a configuration value. Last write wins.
    pub fn add_config(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config.insert(key.into(), value.into());
    }

    /// Looks up a configuration value, falling back to `default`.
    pub fn get_config(&self, key: &str, default: &str) -> String {
        match self.config.get(key) {
            Some(value) => value.clone(),
            None => default.to_string(),
        }
    }

    /// Releases backend resources. Safe to call on a local context; calling
    /// it twice logs and does nothing the second time.
    pub fn finalize(&mut self) -> SelatResult<()> {
        if self.finalized {
            warn!("context finalized twice; ignoring");
            return Ok(());
        }
        self.finalized = true;
        match &mut self.communicator {
            Some(comm) => comm.finalize(),
            None => Ok(()),
        }
    }
}

//==================================================================================
// Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{RdmaCommConfig, TcpCommConfig};

    #[test]
    fn test_local_mode_degeneracy() {
        let ctx = SelatContext::local();
        assert!(!ctx.is_distributed());
        assert_eq!(ctx.rank(), 0);
        assert_eq!(ctx.world_size(), 1);
        assert_eq!(ctx.neighbours(false), Vec::<i32>::new());
        assert_eq!(ctx.neighbours(true), vec![0]);
        assert_eq!(ctx.comm_type(), CommType::Local);
        assert!(ctx.barrier().is_ok());
    }

    #[test]
    fn test_distributed_init_rejects_local_config() {
        let err = SelatContext::distributed(CommConfig::Local).unwrap_err();
        assert_eq!(err.code(), crate::error::Code::Invalid);
    }

    #[test]
    fn test_unimplemented_backend_kinds() {
        let err = SelatContext::distributed(CommConfig::Stream).unwrap_err();
        assert_eq!(err.code(), crate::error::Code::NotImplemented);
        let err =
            SelatContext::distributed(CommConfig::Rdma(RdmaCommConfig::default())).unwrap_err();
        assert_eq!(err.code(), crate::error::Code::NotImplemented);
    }

    #[test]
    fn test_tcp_init_failure_leaves_no_context() {
        // Out-of-range rank fails validation before any socket work.
        let tcp = TcpCommConfig::new(5, vec!["127.0.0.1:0".parse().unwrap()]);
        assert!(SelatContext::distributed(CommConfig::Tcp(tcp)).is_err());
    }

    #[test]
    #[should_panic(expected = "no communicator available for local mode")]
    fn test_communicator_accessor_is_fatal_in_local_mode() {
        let ctx = SelatContext::local();
        let _ = ctx.communicator();
    }

    #[test]
    fn test_sequence_counter_is_monotonic_from_zero() {
        let mut ctx = SelatContext::local();
        assert_eq!(ctx.next_sequence(), 0);
        assert_eq!(ctx.next_sequence(), 1);
        assert_eq!(ctx.next_sequence(), 2);
    }

    #[test]
    fn test_config_store_last_write_wins() {
        let mut ctx = SelatContext::local();
        assert_eq!(ctx.get_config("k", "d"), "d");
        ctx.add_config("k", "v1");
        assert_eq!(ctx.get_config("k", "d"), "v1");
        ctx.add_config("k", "v2");
        assert_eq!(ctx.get_config("k", "d"), "v2");
    }

    #[test]
    fn test_finalize_local_is_safe_and_single() {
        let mut ctx = SelatContext::local();
        assert!(ctx.finalize().is_ok());
        assert!(ctx.finalize().is_ok());
    }
}
