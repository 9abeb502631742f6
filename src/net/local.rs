// In: src/net/local.rs

//! The degenerate single-process backend. A non-distributed context
//! short-circuits before reaching its communicator, so this type is normally
//! unused directly; it exists so every backend kind has a total
//! implementation of the trait, and its native calls are the world-size-1
//! identities (copy send to recv).

use crate::error::{SelatError, SelatResult};
use crate::net::wire::{WireOp, WireType};
use crate::net::{CommType, Communicator};

#[derive(Debug, Default)]
pub struct LocalCommunicator;

impl LocalCommunicator {
    pub fn new() -> Self {
        Self
    }
}

fn copy_into(send: &[u8], recv: &mut [u8], what: &str) -> SelatResult<()> {
    if recv.len() != send.len() {
        return Err(SelatError::ExecutionError(format!(
            "local {} destination is {} bytes, expected {}",
            what,
            recv.len(),
            send.len()
        )));
    }
    recv.copy_from_slice(send);
    Ok(())
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> i32 {
        0
    }

    fn world_size(&self) -> i32 {
        1
    }

    fn comm_type(&self) -> CommType {
        CommType::Local
    }

    fn barrier(&self) -> SelatResult<()> {
        Ok(())
    }

    fn finalize(&mut self) -> SelatResult<()> {
        Ok(())
    }

    fn gather(&self, send: &[u8], _root: i32, recv: Option<&mut [u8]>) -> SelatResult<()> {
        match recv {
            Some(recv) => copy_into(send, recv, "gather"),
            None => Err(SelatError::ExecutionError(
                "local gather root supplied no destination".to_string(),
            )),
        }
    }

    fn gather_v(
        &self,
        send: &[u8],
        _root: i32,
        recv: Option<(&mut [u8], &[u32], &[u32])>,
    ) -> SelatResult<()> {
        match recv {
            Some((recv, _counts, _displs)) => copy_into(send, recv, "gatherv"),
            None => Err(SelatError::ExecutionError(
                "local gatherv root supplied no destination".to_string(),
            )),
        }
    }

    fn all_gather(&self, send: &[u8], recv: &mut [u8]) -> SelatResult<()> {
        copy_into(send, recv, "allgather")
    }

    fn all_gather_v(
        &self,
        send: &[u8],
        recv: &mut [u8],
        _counts: &[u32],
        _displs: &[u32],
    ) -> SelatResult<()> {
        copy_into(send, recv, "allgatherv")
    }

    fn all_reduce(
        &self,
        send: &[u8],
        recv: &mut [u8],
        _count: usize,
        _ty: WireType,
        _op: WireOp,
    ) -> SelatResult<()> {
        copy_into(send, recv, "allreduce")
    }

    fn broadcast(&self, _buf: &mut [u8], _root: i32) -> SelatResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_identity() {
        let comm = LocalCommunicator::new();
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.world_size(), 1);
        assert_eq!(comm.comm_type(), CommType::Local);
        assert!(comm.barrier().is_ok());
    }

    #[test]
    fn test_local_collectives_copy() {
        let comm = LocalCommunicator::new();
        let mut recv = [0u8; 3];
        comm.gather(&[7, 8, 9], 0, Some(&mut recv)).unwrap();
        assert_eq!(recv, [7, 8, 9]);

        let mut recv = [0u8; 4];
        comm.all_reduce(&[1, 2, 3, 4], &mut recv, 1, WireType::UInt32, WireOp::Sum)
            .unwrap();
        assert_eq!(recv, [1, 2, 3, 4]);
    }
}
