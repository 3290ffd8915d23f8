//! Per-quality FIFO work queues (C7's sibling: the queue set)

use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::error::{ClusterError, ClusterResult};
use crate::job::EncodeJob;

/// One quality's unbounded FIFO. `put` never blocks; `get` is non-blocking
/// so a worker can exit its loop the moment the queue is empty (spec.md §5).
#[derive(Clone)]
pub struct JobQueue {
    tx: Sender<EncodeJob>,
    rx: Receiver<EncodeJob>,
}

impl JobQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn put(&self, job: EncodeJob) {
        let _ = self.tx.send(job);
    }

    pub fn get(&self) -> Option<EncodeJob> {
        match self.rx.try_recv() {
            Ok(job) => Some(job),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Quality-key → queue mapping. Queues are created lazily by the cluster as
/// it walks each enabled host's engines (spec.md §4.1); multiple workers
/// bound to the same quality key share one queue (many-to-one).
#[derive(Clone, Default)]
pub struct QueueSet {
    queues: HashMap<String, JobQueue>,
}

impl QueueSet {
    pub fn new() -> Self {
        Self {
            queues: HashMap::new(),
        }
    }

    /// Create the queue for `quality` if it doesn't already exist.
    pub fn ensure(&mut self, quality: &str) {
        self.queues
            .entry(quality.to_string())
            .or_insert_with(JobQueue::new);
    }

    pub fn get(&self, quality: &str) -> Option<&JobQueue> {
        self.queues.get(quality)
    }

    pub fn contains(&self, quality: &str) -> bool {
        self.queues.contains_key(quality)
    }

    /// Places `job` in the queue named by `quality`; errors if no host
    /// declared that quality key (spec.md §4.1's enqueue misconfiguration
    /// check).
    pub fn enqueue(&self, quality: &str, job: EncodeJob) -> ClusterResult<()> {
        match self.queues.get(quality) {
            Some(queue) => {
                queue.put(job);
                Ok(())
            }
            None => Err(ClusterError::UnmappedQuality(quality.to_string())),
        }
    }

    pub fn all_empty(&self) -> bool {
        self.queues.values().all(|q| q.is_empty())
    }
}
