use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use pedigraph_core::{CoalescerConfig, PedigraphError, RegistryId, Result};
use pedigraph_store::{GraphStore, NodeId, WriteTx};

/// A unit of graph mutation: runs inside the drain thread's open write
/// transaction and must be idempotent, since re-imports replay it.
pub type BuildFn = Box<dyn for<'t> FnOnce(&mut WriteTx<'t>) -> Result<Option<NodeId>> + Send>;

/// Failure delivered to every caller of a batch. Cloneable because one
/// batch outcome fans out to many shared futures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("batch aborted: {0}")]
    Batch(String),
    #[error("write coalescer shut down")]
    Disconnected,
}

impl From<BuildError> for PedigraphError {
    fn from(err: BuildError) -> Self {
        PedigraphError::Builder(err.to_string())
    }
}

pub type BuildOutput = std::result::Result<Option<NodeId>, BuildError>;

/// Joinable, cloneable result of a submitted build. Resolves only after
/// the owning batch has committed (or aborted).
#[derive(Clone)]
pub struct BuildHandle {
    fut: Shared<BoxFuture<'static, BuildOutput>>,
}

impl BuildHandle {
    pub async fn wait(&self) -> BuildOutput {
        self.fut.clone().await
    }
}

struct Pending {
    key: Option<RegistryId>,
    build: BuildFn,
    done: oneshot::Sender<BuildOutput>,
}

/// Single-writer batching engine.
///
/// Builders are queued from any number of async producers; one dedicated
/// thread drains the entire queue at a time into a single transaction, so
/// every builder drained together commits or fails as one unit. Keyed
/// submissions deduplicate against in-flight work until the owning batch
/// commits.
pub struct WriteCoalescer {
    queue: Sender<Pending>,
    pending: Arc<AtomicUsize>,
    in_flight: Arc<DashMap<RegistryId, BuildHandle>>,
    config: CoalescerConfig,
}

impl WriteCoalescer {
    pub fn new(store: Arc<GraphStore>, config: CoalescerConfig) -> Self {
        let (queue, receiver) = unbounded();
        let pending = Arc::new(AtomicUsize::new(0));
        let in_flight: Arc<DashMap<RegistryId, BuildHandle>> = Arc::new(DashMap::new());

        let drain_pending = Arc::clone(&pending);
        let drain_in_flight = Arc::clone(&in_flight);
        std::thread::spawn(move || drain_loop(store, receiver, drain_pending, drain_in_flight));

        Self {
            queue,
            pending,
            in_flight,
            config,
        }
    }

    /// Enqueue a build. Applies backpressure (periodic re-check, not an
    /// unbounded block) while the pending queue is above the high-water
    /// mark.
    pub async fn submit(&self, build: BuildFn) -> BuildHandle {
        self.backpressure().await;
        self.enqueue(None, build)
    }

    /// Enqueue a build under a dedup key. If a build for `key` is already
    /// queued or executing, the existing handle is returned together with
    /// `true` and the given builder is dropped unexecuted.
    pub async fn submit_keyed(&self, key: RegistryId, build: BuildFn) -> (BuildHandle, bool) {
        self.backpressure().await;
        // The entry guard makes check-and-insert atomic; two concurrent
        // submitters for one key cannot both enqueue.
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), true),
            Entry::Vacant(slot) => {
                let handle = self.enqueue(Some(key), build);
                slot.insert(handle.clone());
                (handle, false)
            }
        }
    }

    /// The in-flight handle for `key`, if a build is queued or executing.
    pub fn existing(&self, key: &RegistryId) -> Option<BuildHandle> {
        self.in_flight.get(key).map(|entry| entry.value().clone())
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn enqueue(&self, key: Option<RegistryId>, build: BuildFn) -> BuildHandle {
        let (done, result) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.queue.send(Pending { key, build, done }).is_err() {
            // Drain thread gone; the dropped sender resolves the handle
            // to Disconnected below.
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        let fut = async move { result.await.unwrap_or(Err(BuildError::Disconnected)) }
            .boxed()
            .shared();
        BuildHandle { fut }
    }

    async fn backpressure(&self) {
        while self.pending.load(Ordering::SeqCst) > self.config.high_water_mark {
            tokio::time::sleep(self.config.backpressure_poll).await;
        }
    }
}

/// The drain loop: the only writer of pipeline-originated mutations.
///
/// Blocks until the queue is non-empty, takes the entire current queue,
/// runs every builder in one transaction and resolves every handle after
/// commit. A builder failure aborts the whole batch; every handle in it
/// observes the same error.
fn drain_loop(
    store: Arc<GraphStore>,
    receiver: Receiver<Pending>,
    pending: Arc<AtomicUsize>,
    in_flight: Arc<DashMap<RegistryId, BuildHandle>>,
) {
    while let Ok(first) = receiver.recv() {
        let mut batch = vec![first];
        while let Ok(next) = receiver.try_recv() {
            batch.push(next);
        }
        let size = batch.len();

        let mut outcomes: Vec<(Option<RegistryId>, oneshot::Sender<BuildOutput>, BuildOutput)> =
            Vec::with_capacity(size);
        let mut failure: Option<BuildError> = None;
        {
            let mut tx = store.write();
            for item in batch {
                if failure.is_some() {
                    outcomes.push((item.key, item.done, Err(BuildError::Disconnected)));
                    continue;
                }
                match (item.build)(&mut tx) {
                    Ok(value) => outcomes.push((item.key, item.done, Ok(value))),
                    Err(err) => {
                        warn!(error = %err, "builder failed; aborting batch");
                        let err = BuildError::Batch(err.to_string());
                        outcomes.push((item.key, item.done, Err(err.clone())));
                        failure = Some(err);
                    }
                }
            }
            if failure.is_none() {
                if let Err(err) = tx.commit() {
                    failure = Some(BuildError::Batch(err.to_string()));
                }
            }
            // An uncommitted transaction rolls back when dropped here.
        }

        match failure {
            Some(err) => {
                for outcome in &mut outcomes {
                    outcome.2 = Err(err.clone());
                }
            }
            None => debug!(builders = size, "committed write batch"),
        }

        for (key, done, result) in outcomes {
            if let Some(key) = key {
                in_flight.remove(&key);
            }
            pending.fetch_sub(1, Ordering::SeqCst);
            let _ = done.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pedigraph_core::{props, Label};
    use std::sync::mpsc;
    use std::time::Duration;

    fn dog_builder(id: &str, counter: Arc<AtomicUsize>) -> BuildFn {
        let id = id.to_string();
        Box::new(move |tx| {
            counter.fetch_add(1, Ordering::SeqCst);
            let node = tx.find_or_create_node(Label::Dog, props::REGISTRY_ID, id.into())?;
            Ok(Some(node))
        })
    }

    /// A builder that blocks the drain thread until the returned sender
    /// fires, letting tests pin work into a single generation.
    fn gate_builder() -> (BuildFn, mpsc::Sender<()>) {
        let (open, wait) = mpsc::channel();
        let build: BuildFn = Box::new(move |_tx| {
            wait.recv().ok();
            Ok(None)
        });
        (build, open)
    }

    #[tokio::test]
    async fn keyed_submissions_coalesce_to_one_build() {
        let store = Arc::new(GraphStore::new());
        let coalescer = WriteCoalescer::new(Arc::clone(&store), CoalescerConfig::default());
        let executed = Arc::new(AtomicUsize::new(0));

        // Stall the drain thread so all keyed submissions race each other.
        let (gate, open) = gate_builder();
        let gate_handle = coalescer.submit(gate).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let key = RegistryId::from("NO/1/01");
        let mut handles = Vec::new();
        let mut dedup_hits = 0;
        for _ in 0..8 {
            let (handle, already) = coalescer
                .submit_keyed(key.clone(), dog_builder("NO/1/01", Arc::clone(&executed)))
                .await;
            if already {
                dedup_hits += 1;
            }
            handles.push(handle);
        }
        open.send(()).unwrap();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.wait().await.unwrap());
        }
        assert_eq!(gate_handle.wait().await, Ok(None));
        assert_eq!(executed.load(Ordering::SeqCst), 1);
        assert_eq!(dedup_hits, 7);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.read().nodes_with_label(Label::Dog).len(), 1);
    }

    #[tokio::test]
    async fn key_released_after_commit() {
        let store = Arc::new(GraphStore::new());
        let coalescer = WriteCoalescer::new(Arc::clone(&store), CoalescerConfig::default());
        let executed = Arc::new(AtomicUsize::new(0));
        let key = RegistryId::from("NO/1/01");

        let (handle, _) = coalescer
            .submit_keyed(key.clone(), dog_builder("NO/1/01", Arc::clone(&executed)))
            .await;
        handle.wait().await.unwrap();
        assert!(coalescer.existing(&key).is_none());

        // A later submission under the same key runs again (idempotently).
        let (handle, already) = coalescer
            .submit_keyed(key.clone(), dog_builder("NO/1/01", Arc::clone(&executed)))
            .await;
        assert!(!already);
        handle.wait().await.unwrap();
        assert_eq!(executed.load(Ordering::SeqCst), 2);
        assert_eq!(store.read().nodes_with_label(Label::Dog).len(), 1);
    }

    #[tokio::test]
    async fn failing_builder_aborts_the_whole_batch() {
        let store = Arc::new(GraphStore::new());
        let coalescer = WriteCoalescer::new(Arc::clone(&store), CoalescerConfig::default());
        let executed = Arc::new(AtomicUsize::new(0));

        let (gate, open) = gate_builder();
        let _gate_handle = coalescer.submit(gate).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Both of these land in the same generation.
        let good = coalescer
            .submit(dog_builder("NO/1/01", Arc::clone(&executed)))
            .await;
        let bad: BuildFn =
            Box::new(|_tx| Err(PedigraphError::Builder("missing required field".into())));
        let bad = coalescer.submit(bad).await;
        open.send(()).unwrap();

        assert!(good.wait().await.is_err());
        assert!(bad.wait().await.is_err());
        // The good builder's write was rolled back with the batch.
        assert_eq!(store.read().nodes_with_label(Label::Dog).len(), 0);
    }

    #[tokio::test]
    async fn backpressure_holds_submitters_above_high_water() {
        let store = Arc::new(GraphStore::new());
        let config = CoalescerConfig {
            high_water_mark: 1,
            backpressure_poll: Duration::from_millis(5),
        };
        let coalescer = Arc::new(WriteCoalescer::new(Arc::clone(&store), config));
        let executed = Arc::new(AtomicUsize::new(0));

        let (gate, open) = gate_builder();
        let _gate = coalescer.submit(gate).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _queued = coalescer
            .submit(dog_builder("NO/1/01", Arc::clone(&executed)))
            .await;
        assert!(coalescer.pending() > 1);

        // Above the mark: a further submit must not complete yet.
        let blocked = {
            let coalescer = Arc::clone(&coalescer);
            let executed = Arc::clone(&executed);
            tokio::spawn(async move { coalescer.submit(dog_builder("NO/2/01", executed)).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!blocked.is_finished());

        open.send(()).unwrap();
        let handle = blocked.await.unwrap();
        handle.wait().await.unwrap();
        assert_eq!(store.read().nodes_with_label(Label::Dog).len(), 2);
    }
}
