// In: src/net/tcp/mod.rs

//! The TCP message-passing backend: a blocking full mesh of streams over
//! which the native collectives run.
//!
//! The algorithms are linear and hub-based (the root, or rank 0 for the all-
//! variants, drains every peer in rank order and then redistributes). Under
//! the group's lock-step ordering contract this is deadlock-free for any
//! world size: senders may block in `write` on a full socket buffer, but the
//! hub always drains every peer before it sends anything that waits on them.

mod frame;
mod mesh;

use crate::error::{SelatError, SelatResult};
use crate::net::wire::{self, WireOp, WireType};
use crate::net::{CommType, Communicator, TcpCommConfig};
use log::{debug, info};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Mutex, MutexGuard};

pub struct TcpCommunicator {
    rank: i32,
    world_size: i32,
    links: Vec<Option<Mutex<TcpStream>>>,
    compression_level: Option<i32>,
}

impl TcpCommunicator {
    /// Establishes the mesh described by `config` and returns the connected
    /// communicator. Blocks until every pairwise link is up and validated, or
    /// the configured timeout expires.
    pub fn connect(config: TcpCommConfig) -> SelatResult<Self> {
        let rank = config.rank;
        let world_size = config.world_size();
        let compression_level = config.compression_level;
        let links = mesh::establish(config)?;
        info!(
            "tcp communicator up: rank {} of {} ({} link(s))",
            rank,
            world_size,
            links.iter().filter(|l| l.is_some()).count()
        );
        Ok(Self {
            rank,
            world_size,
            links,
            compression_level,
        })
    }

    fn link(&self, peer: i32) -> SelatResult<MutexGuard<'_, TcpStream>> {
        self.links
            .get(peer as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| {
                SelatError::ExecutionError(format!(
                    "rank {} has no link to rank {} (finalized or self)",
                    self.rank, peer
                ))
            })?
            .lock()
            .map_err(|_| SelatError::ExecutionError("peer link mutex poisoned".to_string()))
    }

    fn send_raw(&self, peer: i32, bytes: &[u8]) -> SelatResult<()> {
        self.link(peer)?
            .write_all(bytes)
            .map_err(|e| SelatError::ExecutionError(format!("tcp send to rank {}: {}", peer, e)))
    }

    fn recv_raw(&self, peer: i32, out: &mut [u8]) -> SelatResult<()> {
        self.link(peer)?
            .read_exact(out)
            .map_err(|e| SelatError::ExecutionError(format!("tcp recv from rank {}: {}", peer, e)))
    }

    fn send_framed(&self, peer: i32, payload: &[u8]) -> SelatResult<()> {
        frame::send_blob(&mut *self.link(peer)?, payload, self.compression_level)
    }

    fn recv_framed(&self, peer: i32, out: &mut [u8]) -> SelatResult<()> {
        frame::recv_blob(&mut *self.link(peer)?, out)
    }

    /// Ranks other than `me`, in rank order.
    fn peers(&self, me: i32) -> impl Iterator<Item = i32> {
        (0..self.world_size).filter(move |&r| r != me)
    }
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> i32 {
        self.rank
    }

    fn world_size(&self) -> i32 {
        self.world_size
    }

    fn comm_type(&self) -> CommType {
        CommType::Tcp
    }

    fn barrier(&self) -> SelatResult<()> {
        let token = [0u8; 1];
        let mut ack = [0u8; 1];
        if self.rank == 0 {
            for peer in self.peers(0) {
                self.recv_raw(peer, &mut ack)?;
            }
            for peer in self.peers(0) {
                self.send_raw(peer, &token)?;
            }
        } else {
            self.send_raw(0, &token)?;
            self.recv_raw(0, &mut ack)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> SelatResult<()> {
        for slot in self.links.iter() {
            if let Some(link) = slot {
                if let Ok(stream) = link.lock() {
                    let _ = stream.shutdown(Shutdown::Both);
                }
            }
        }
        self.links.clear();
        debug!("tcp communicator finalized: rank {}", self.rank);
        Ok(())
    }

    fn gather(&self, send: &[u8], root: i32, recv: Option<&mut [u8]>) -> SelatResult<()> {
        let chunk = send.len();
        if self.rank == root {
            let recv = recv.ok_or_else(|| {
                SelatError::Invalid("gather root requires a destination".to_string())
            })?;
            if recv.len() != chunk * self.world_size as usize {
                return Err(SelatError::Invalid(format!(
                    "gather destination is {} bytes, expected {}",
                    recv.len(),
                    chunk * self.world_size as usize
                )));
            }
            let me = self.rank as usize;
            recv[me * chunk..(me + 1) * chunk].copy_from_slice(send);
            for peer in self.peers(root) {
                let slot = peer as usize * chunk;
                self.recv_raw(peer, &mut recv[slot..slot + chunk])?;
            }
        } else {
            self.send_raw(root, send)?;
        }
        Ok(())
    }

    fn gather_v(
        &self,
        send: &[u8],
        root: i32,
        recv: Option<(&mut [u8], &[u32], &[u32])>,
    ) -> SelatResult<()> {
        if self.rank != root {
            return self.send_framed(root, send);
        }
        let (recv, counts, displs) = recv.ok_or_else(|| {
            SelatError::Invalid("gatherv root requires a destination".to_string())
        })?;
        let world = self.world_size as usize;
        if counts.len() != world || displs.len() != world {
            return Err(SelatError::Invalid(format!(
                "gatherv expects {} counts and displacements, got {} and {}",
                world,
                counts.len(),
                displs.len()
            )));
        }
        if counts[self.rank as usize] as usize != send.len() {
            return Err(SelatError::Invalid(format!(
                "gatherv root contribution is {} bytes but its count says {}",
                send.len(),
                counts[self.rank as usize]
            )));
        }
        let own = displs[self.rank as usize] as usize;
        recv[own..own + send.len()].copy_from_slice(send);
        for peer in self.peers(root) {
            let off = displs[peer as usize] as usize;
            let len = counts[peer as usize] as usize;
            if off + len > recv.len() {
                return Err(SelatError::Invalid(format!(
                    "gatherv slot for rank {} ({}..{}) exceeds destination of {} bytes",
                    peer,
                    off,
                    off + len,
                    recv.len()
                )));
            }
            self.recv_framed(peer, &mut recv[off..off + len])?;
        }
        Ok(())
    }

    fn all_gather(&self, send: &[u8], recv: &mut [u8]) -> SelatResult<()> {
        let chunk = send.len();
        let world = self.world_size as usize;
        if recv.len() != chunk * world {
            return Err(SelatError::Invalid(format!(
                "allgather destination is {} bytes, expected {}",
                recv.len(),
                chunk * world
            )));
        }
        if self.rank == 0 {
            recv[0..chunk].copy_from_slice(send);
            for peer in self.peers(0) {
                let slot = peer as usize * chunk;
                self.recv_raw(peer, &mut recv[slot..slot + chunk])?;
            }
        } else {
            self.send_raw(0, send)?;
        }
        self.broadcast(recv, 0)
    }

    fn all_gather_v(
        &self,
        send: &[u8],
        recv: &mut [u8],
        counts: &[u32],
        displs: &[u32],
    ) -> SelatResult<()> {
        let world = self.world_size as usize;
        if counts.len() != world || displs.len() != world {
            return Err(SelatError::Invalid(format!(
                "allgatherv expects {} counts and displacements, got {} and {}",
                world,
                counts.len(),
                displs.len()
            )));
        }
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        if recv.len() != total {
            return Err(SelatError::Invalid(format!(
                "allgatherv destination is {} bytes, counts sum to {}",
                recv.len(),
                total
            )));
        }
        if counts[self.rank as usize] as usize != send.len() {
            return Err(SelatError::Invalid(format!(
                "allgatherv contribution is {} bytes but this rank's count says {}",
                send.len(),
                counts[self.rank as usize]
            )));
        }
        if self.rank == 0 {
            let own = displs[0] as usize;
            recv[own..own + send.len()].copy_from_slice(send);
            for peer in self.peers(0) {
                let off = displs[peer as usize] as usize;
                let len = counts[peer as usize] as usize;
                self.recv_framed(peer, &mut recv[off..off + len])?;
            }
        } else {
            self.send_framed(0, send)?;
        }
        self.broadcast(recv, 0)
    }

    fn all_reduce(
        &self,
        send: &[u8],
        recv: &mut [u8],
        count: usize,
        ty: WireType,
        op: WireOp,
    ) -> SelatResult<()> {
        let nbytes = count * ty.size_bytes();
        if send.len() != nbytes || recv.len() != nbytes {
            return Err(SelatError::Invalid(format!(
                "allreduce of {} x {:?} needs {} bytes, got send {} / recv {}",
                count,
                ty,
                nbytes,
                send.len(),
                recv.len()
            )));
        }
        // Checked identically on every rank before any traffic, so an
        // undefined type/op pairing fails the whole group in step.
        if !wire::op_defined_for(ty, op) {
            return Err(SelatError::ExecutionError(format!(
                "reduction operator {:?} is not defined for {:?} elements",
                op, ty
            )));
        }
        if self.rank == 0 {
            recv.copy_from_slice(send);
            let mut incoming = vec![0u8; nbytes];
            for peer in self.peers(0) {
                self.recv_framed(peer, &mut incoming)?;
                wire::combine(recv, &incoming, ty, op)?;
            }
        } else {
            self.send_framed(0, send)?;
        }
        self.broadcast(recv, 0)
    }

    fn broadcast(&self, buf: &mut [u8], root: i32) -> SelatResult<()> {
        if self.rank == root {
            for peer in self.peers(root) {
                self.send_framed(peer, buf)?;
            }
            Ok(())
        } else {
            self.recv_framed(root, buf)
        }
    }
}
