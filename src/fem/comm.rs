//! Collective operations across the ranks that share a mesh.
use crate::fem::mesh::ElemId;
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier, Mutex, PoisonError};

/// Collective operations needed to merge per-rank results.
///
/// Every rank must call each collective the same number of times, in the
/// same order.
pub trait Communicator {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Replaces every set with its union over all ranks. All ranks must
    /// pass the same number of sets.
    fn union_sets(&self, sets: &mut [BTreeSet<ElemId>]);

    /// True only if `flag` is true on every rank.
    fn all_true(&self, flag: bool) -> bool;
}

/// Single-process communicator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn union_sets(&self, _sets: &mut [BTreeSet<ElemId>]) {}

    fn all_true(&self, flag: bool) -> bool {
        flag
    }
}

#[derive(Debug, Clone)]
enum Payload {
    Empty,
    Sets(Vec<BTreeSet<ElemId>>),
    Flag(bool),
}

struct Shared {
    barrier: Barrier,
    slots: Mutex<Vec<Payload>>,
}

/// One rank of an in-process group of threads.
pub struct LocalComm {
    rank: usize,
    size: usize,
    shared: Arc<Shared>,
}

impl LocalComm {
    /// Creates `size` connected communicators, one per rank.
    pub fn group(size: usize) -> Vec<LocalComm> {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![Payload::Empty; size]),
        });
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Runs `f` once per rank on its own thread and returns the results in
    /// rank order.
    pub fn run<T, F>(size: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(LocalComm) -> T + Sync,
    {
        let f = &f;
        std::thread::scope(|s| {
            let handles: Vec<_> = Self::group(size)
                .into_iter()
                .map(|comm| s.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(v) => v,
                    Err(e) => std::panic::resume_unwind(e),
                })
                .collect()
        })
    }

    fn exchange(&self, payload: Payload) -> Vec<Payload> {
        {
            let mut slots = self.shared.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots[self.rank] = payload;
        }
        self.shared.barrier.wait();
        let all = self
            .shared
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        // Nobody may overwrite a slot before every rank has read it
        self.shared.barrier.wait();
        all
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn union_sets(&self, sets: &mut [BTreeSet<ElemId>]) {
        for payload in self.exchange(Payload::Sets(sets.to_vec())) {
            if let Payload::Sets(other) = payload {
                for (mine, theirs) in sets.iter_mut().zip(other) {
                    mine.extend(theirs);
                }
            }
        }
    }

    fn all_true(&self, flag: bool) -> bool {
        self.exchange(Payload::Flag(flag))
            .iter()
            .all(|p| matches!(p, Payload::Flag(true)))
    }
}
