//! Thin façade over in-process or inter-process (MPI) message passing.
//!
//! Messages are contiguous byte slices. All handles are waitable but
//! non-blocking; the halo layer calls `.wait()` before it trusts that a
//! buffer is ready. One process per domain partition, so there is no
//! intra-process concurrency to manage beyond the test mailbox.

pub mod tags;

pub use tags::{CommTag, ExchangePhase};

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Non-blocking communication interface (minimal by design).
pub trait Communicator: Send + Sync {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, len: usize) -> Self::RecvHandle;

    /// Collective barrier bracketing each step class.
    fn barrier(&self);

    /// Broadcast a fatal failure so peer ranks cannot stay blocked on a
    /// collective. Does not return on multi-rank backends.
    fn abort(&self, code: i32);
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// No-op communicator for single-rank runs and serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}

    fn irecv(&self, _peer: usize, _tag: u16, _len: usize) {}

    fn barrier(&self) {}

    fn abort(&self, code: i32) {
        log::error!("serial run aborted with code {code}");
        std::process::exit(code);
    }
}

// --- LocalComm: in-process multi-rank backend for tests ---

type Key = (usize, usize, u16); // (src, dst, tag)

static MAILBOX: Lazy<DashMap<Key, VecDeque<Bytes>>> = Lazy::new(DashMap::new);

/// Waitable receive handle backed by a polling thread.
pub struct LocalHandle {
    buf: Arc<Mutex<Option<Vec<u8>>>>,
    handle: Option<JoinHandle<()>>,
}

impl Wait for LocalHandle {
    fn wait(mut self) -> Option<Vec<u8>> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let mut guard = self.buf.lock();
        guard.take()
    }
}

/// In-process communicator: every "rank" is a thread of the same process,
/// exchanging through a global mailbox. Tests sharing the mailbox must be
/// serialized (`serial_test`).
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    barrier: Arc<std::sync::Barrier>,
}

impl LocalComm {
    /// Create communicators for an `n`-rank in-process world.
    pub fn world(n: usize) -> Vec<LocalComm> {
        let barrier = Arc::new(std::sync::Barrier::new(n));
        (0..n)
            .map(|rank| LocalComm {
                rank,
                size: n,
                barrier: Arc::clone(&barrier),
            })
            .collect()
    }

    /// Drop any messages left over from a previous in-process world.
    pub fn reset_mailbox() {
        MAILBOX.clear();
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        let key = (self.rank, peer, tag);
        MAILBOX
            .entry(key)
            .or_default()
            .push_back(Bytes::from(buf.to_vec()));
    }

    fn irecv(&self, peer: usize, tag: u16, len: usize) -> LocalHandle {
        let key = (peer, self.rank, tag);
        let buf_arc = Arc::new(Mutex::new(None));
        let buf_clone = Arc::clone(&buf_arc);
        let handle = std::thread::spawn(move || {
            loop {
                let popped = MAILBOX.get_mut(&key).and_then(|mut q| q.pop_front());
                if let Some(bytes) = popped {
                    let mut guard = buf_clone.lock();
                    *guard = Some(bytes[..len].to_vec());
                    break;
                }
                std::thread::yield_now();
            }
        });
        LocalHandle {
            buf: buf_arc,
            handle: Some(handle),
        }
    }

    fn barrier(&self) {
        self.barrier.wait();
    }

    fn abort(&self, code: i32) {
        log::error!("rank {} aborted in-process world with code {code}", self.rank);
        panic!("rank {} aborted with code {code}", self.rank);
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    pub struct MpiComm {
        _universe: mpi::environment::Universe,
        world: SimpleCommunicator,
    }

    impl MpiComm {
        /// Initialise MPI and wrap the world communicator.
        pub fn new() -> Self {
            let universe = mpi::initialize().expect("MPI initialisation failed");
            let world = universe.world();
            Self {
                _universe: universe,
                world,
            }
        }
    }

    impl Default for MpiComm {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Sends complete eagerly through MPI's own buffering of the copied
    /// payload; receives block on `wait`.
    pub struct MpiSendHandle;

    impl Wait for MpiSendHandle {
        fn wait(self) -> Option<Vec<u8>> {
            None
        }
    }

    pub struct MpiRecvHandle {
        world: SimpleCommunicator,
        peer: usize,
        tag: u16,
        len: usize,
    }

    impl Wait for MpiRecvHandle {
        fn wait(self) -> Option<Vec<u8>> {
            let mut buf = vec![0u8; self.len];
            self.world
                .process_at_rank(self.peer as i32)
                .receive_into_with_tag(&mut buf[..], self.tag as i32);
            Some(buf)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn rank(&self) -> usize {
            self.world.rank() as usize
        }

        fn size(&self) -> usize {
            self.world.size() as usize
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSendHandle {
            self.world
                .process_at_rank(peer as i32)
                .buffered_send_with_tag(buf, tag as i32);
            MpiSendHandle
        }

        fn irecv(&self, peer: usize, tag: u16, len: usize) -> MpiRecvHandle {
            MpiRecvHandle {
                world: self.world.duplicate(),
                peer,
                tag,
                len,
            }
        }

        fn barrier(&self) {
            self.world.barrier();
        }

        fn abort(&self, code: i32) {
            self.world.abort(code);
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn local_roundtrip_two_ranks() {
        LocalComm::reset_mailbox();
        let world = LocalComm::world(2);
        let (comm0, comm1) = (world[0].clone(), world[1].clone());

        // On rank 1: post the receive for data from peer 0 with tag 7
        let recv_handle = comm1.irecv(0, 7, 4);
        // On rank 0: send the 4 bytes [1,2,3,4] to peer 1 with tag 7
        comm0.isend(1, 7, &[1, 2, 3, 4]);

        let data = recv_handle.wait().expect("expected data from rank 0");
        assert_eq!(&data, &[1, 2, 3, 4]);
    }

    #[test]
    #[serial]
    fn mailbox_queues_repeated_tags_in_order(){
        LocalComm::reset_mailbox();
        let world = LocalComm::world(2);
        world[0].isend(1, 9, &[1]);
        world[0].isend(1, 9, &[2]);
        let first = world[1].irecv(0, 9, 1).wait().unwrap();
        let second = world[1].irecv(0, 9, 1).wait().unwrap();
        assert_eq!((first[0], second[0]), (1, 2));
    }

    #[test]
    #[serial]
    fn self_send_matches_self_receive() {
        LocalComm::reset_mailbox();
        let world = LocalComm::world(1);
        world[0].isend(0, 3, &[7, 7]);
        let got = world[0].irecv(0, 3, 2).wait().unwrap();
        assert_eq!(&got, &[7, 7]);
    }
}
