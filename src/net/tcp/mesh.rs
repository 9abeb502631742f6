// In: src/net/tcp/mesh.rs

//! Full-mesh connection establishment for the TCP backend.
//!
//! Every rank listens at its own slot of the peer list. Rank `r` dials every
//! rank below it (re-trying until the peer's listener is up or the timeout
//! expires) and accepts from every rank above it, so each pair of ranks ends
//! up with exactly one stream and nobody dials anybody twice.
//!
//! A fixed little-endian handshake (magic, protocol version, world size,
//! sender rank) travels both ways on every new stream; any mismatch aborts
//! init before the communicator is exposed.

use crate::error::{SelatError, SelatResult};
use crate::net::TcpCommConfig;
use log::debug;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const HANDSHAKE_MAGIC: u32 = 0x53454C54;
const PROTOCOL_VERSION: u16 = 1;
const HELLO_LEN: usize = 4 + 2 + 4 + 4;

const DIAL_RETRY: Duration = Duration::from_millis(20);
const ACCEPT_POLL: Duration = Duration::from_millis(10);

fn exec_err(what: &str, err: impl std::fmt::Display) -> SelatError {
    SelatError::ExecutionError(format!("{}: {}", what, err))
}

fn write_hello(stream: &mut TcpStream, world_size: u32, rank: u32) -> SelatResult<()> {
    let mut hello = [0u8; HELLO_LEN];
    hello[0..4].copy_from_slice(&HANDSHAKE_MAGIC.to_le_bytes());
    hello[4..6].copy_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    hello[6..10].copy_from_slice(&world_size.to_le_bytes());
    hello[10..14].copy_from_slice(&rank.to_le_bytes());
    stream
        .write_all(&hello)
        .map_err(|e| exec_err("handshake send failed", e))
}

/// Reads and validates a peer hello, returning `(world_size, rank)`.
fn read_hello(stream: &mut TcpStream, expected_world: u32) -> SelatResult<(u32, u32)> {
    let mut hello = [0u8; HELLO_LEN];
    stream
        .read_exact(&mut hello)
        .map_err(|e| exec_err("handshake recv failed", e))?;
    let magic = u32::from_le_bytes(hello[0..4].try_into().unwrap());
    let version = u16::from_le_bytes(hello[4..6].try_into().unwrap());
    let world = u32::from_le_bytes(hello[6..10].try_into().unwrap());
    let rank = u32::from_le_bytes(hello[10..14].try_into().unwrap());

    if magic != HANDSHAKE_MAGIC {
        return Err(SelatError::ExecutionError(format!(
            "peer is not a selat worker (magic {:#x})",
            magic
        )));
    }
    if version != PROTOCOL_VERSION {
        return Err(SelatError::ExecutionError(format!(
            "peer speaks protocol version {}, this build speaks {}",
            version, PROTOCOL_VERSION
        )));
    }
    if world != expected_world {
        return Err(SelatError::Invalid(format!(
            "peer was configured with world size {}, this rank with {}",
            world, expected_world
        )));
    }
    Ok((world, rank))
}

fn dial(addr: std::net::SocketAddr, deadline: Instant) -> SelatResult<TcpStream> {
    loop {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                if Instant::now() >= deadline {
                    return Err(exec_err(
                        &format!("timed out dialing peer at {}", addr),
                        err,
                    ));
                }
                std::thread::sleep(DIAL_RETRY);
            }
        }
    }
}

/// Builds the rank-indexed link table. The slot for `config.rank` stays
/// `None`; every other slot holds one connected, validated stream.
pub(crate) fn establish(config: TcpCommConfig) -> SelatResult<Vec<Option<Mutex<TcpStream>>>> {
    let world = config.peers.len();
    let rank = config.rank;
    if world == 0 {
        return Err(SelatError::Invalid("peer list is empty".to_string()));
    }
    if rank < 0 || rank as usize >= world {
        return Err(SelatError::Invalid(format!(
            "rank {} is out of range for world size {}",
            rank, world
        )));
    }
    let me = rank as usize;
    let deadline = Instant::now() + Duration::from_millis(config.connect_timeout_ms);

    let listener = match config.listener {
        Some(listener) => listener,
        None => TcpListener::bind(config.peers[me])
            .map_err(|e| exec_err(&format!("failed to bind {}", config.peers[me]), e))?,
    };

    let mut links: Vec<Option<Mutex<TcpStream>>> = Vec::with_capacity(world);
    links.resize_with(world, || None);

    // Dial every lower rank: we write our hello first, the acceptor answers.
    for peer in 0..me {
        let mut stream = dial(config.peers[peer], deadline)?;
        stream
            .set_nodelay(true)
            .map_err(|e| exec_err("set_nodelay failed", e))?;
        write_hello(&mut stream, world as u32, me as u32)?;
        let (_, peer_rank) = read_hello(&mut stream, world as u32)?;
        if peer_rank as usize != peer {
            return Err(SelatError::Invalid(format!(
                "address {} is rank {}, expected rank {}",
                config.peers[peer], peer_rank, peer
            )));
        }
        debug!("rank {} linked to rank {} (dialed)", me, peer);
        links[peer] = Some(Mutex::new(stream));
    }

    // Accept every higher rank; they arrive in no particular order.
    let mut pending = world - 1 - me;
    listener
        .set_nonblocking(true)
        .map_err(|e| exec_err("listener setup failed", e))?;
    while pending > 0 {
        match listener.accept() {
            Ok((mut stream, _addr)) => {
                stream
                    .set_nonblocking(false)
                    .map_err(|e| exec_err("stream setup failed", e))?;
                stream
                    .set_nodelay(true)
                    .map_err(|e| exec_err("set_nodelay failed", e))?;
                let (_, peer_rank) = read_hello(&mut stream, world as u32)?;
                let peer = peer_rank as usize;
                if peer <= me || peer >= world {
                    return Err(SelatError::Invalid(format!(
                        "unexpected hello from rank {} at rank {}",
                        peer_rank, me
                    )));
                }
                if links[peer].is_some() {
                    return Err(SelatError::Invalid(format!(
                        "rank {} connected twice",
                        peer_rank
                    )));
                }
                write_hello(&mut stream, world as u32, me as u32)?;
                debug!("rank {} linked to rank {} (accepted)", me, peer);
                links[peer] = Some(Mutex::new(stream));
                pending -= 1;
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(SelatError::ExecutionError(format!(
                        "timed out waiting for {} peer(s) to dial rank {}",
                        pending, me
                    )));
                }
                std::thread::sleep(ACCEPT_POLL);
            }
            Err(err) => return Err(exec_err("accept failed", err)),
        }
    }

    Ok(links)
}
