use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, FutureExt};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use pedigraph_core::{
    props, CoalescerConfig, DogRecord, Gender, ImportConfig, Label, LitterRecord, ParentRole,
    PedigraphError, PedigreeSource, RegistryId, Result,
};
use pedigraph_store::{GraphStore, NodeId};

use crate::builders;
use crate::coalescer::WriteCoalescer;

/// Result of one recursive build step.
enum Outcome {
    /// The source has no record for the id: a normal pedigree boundary.
    Missing,
    /// The resolved id is already on the current root-to-node recursion
    /// path; the caller must quarantine the edge instead of recursing.
    OnPath(RegistryId),
    /// The dog (and, for the owning task, its subtree) is in the graph.
    Built(RegistryId),
}

/// Recursive, concurrent importer of a dog's ancestry and one level of
/// offspring.
///
/// Dedup happens at two levels: a process-wide query-id to canonical-id
/// map avoids repeated source lookups for aliasing ids, and the coalescer's
/// keyed submission guarantees at most one in-flight node build per
/// canonical id. A task's future resolves only after its own write and all
/// spawned parent/offspring subtasks have completed (deep join).
pub struct PedigreeImporter {
    store: Arc<GraphStore>,
    source: Arc<dyn PedigreeSource>,
    coalescer: Arc<WriteCoalescer>,
    resolved: DashMap<RegistryId, RegistryId>,
    limiter: Arc<Semaphore>,
    config: ImportConfig,
}

impl PedigreeImporter {
    pub fn new(
        store: Arc<GraphStore>,
        source: Arc<dyn PedigreeSource>,
        config: ImportConfig,
        coalescer_config: CoalescerConfig,
    ) -> Arc<Self> {
        let coalescer = Arc::new(WriteCoalescer::new(Arc::clone(&store), coalescer_config));
        Arc::new(Self {
            store,
            source,
            coalescer,
            resolved: DashMap::new(),
            limiter: Arc::new(Semaphore::new(config.max_concurrent_lookups)),
            config,
        })
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn coalescer(&self) -> &Arc<WriteCoalescer> {
        &self.coalescer
    }

    /// Import a dog and its full known ancestry plus one level of
    /// offspring, waiting at most the configured timeout. On timeout the
    /// background import keeps running; a later call may find the data
    /// present.
    pub async fn import(self: &Arc<Self>, id: &RegistryId) -> Result<Option<NodeId>> {
        let this = Arc::clone(self);
        let query = id.clone();
        let task = tokio::spawn(async move { this.build(query, Arc::new(HashSet::new())).await });

        let outcome = match tokio::time::timeout(self.config.wait_timeout, task).await {
            Ok(joined) => {
                joined.map_err(|e| PedigraphError::Builder(format!("import task failed: {e}")))??
            }
            Err(_) => {
                warn!(%id, "import wait timed out; background import continues");
                return Err(PedigraphError::Timeout(self.config.wait_timeout));
            }
        };

        match outcome {
            Outcome::Missing => Ok(None),
            Outcome::Built(canonical) | Outcome::OnPath(canonical) => Ok(self
                .store
                .read()
                .find_node(Label::Dog, props::REGISTRY_ID, &(&canonical).into())),
        }
    }

    /// One recursive build step for `query` with `path` holding the
    /// canonical ids on the current root-to-here recursion path.
    fn build(
        self: &Arc<Self>,
        query: RegistryId,
        path: Arc<HashSet<RegistryId>>,
    ) -> BoxFuture<'static, Result<Outcome>> {
        let this = Arc::clone(self);
        async move {
            // Ids already resolved this run skip the source round-trip;
            // if a build is still in flight, join it instead of rebuilding.
            if let Some(canonical) = this.resolved.get(&query).map(|e| e.value().clone()) {
                if path.contains(&canonical) {
                    return Ok(Outcome::OnPath(canonical));
                }
                if let Some(handle) = this.coalescer.existing(&canonical) {
                    handle.wait().await?;
                }
                return Ok(Outcome::Built(canonical));
            }

            let Some(record) = this.lookup(&query).await? else {
                debug!(id = %query, "no source record; pedigree boundary reached");
                return Ok(Outcome::Missing);
            };
            let canonical = record.id.clone();
            this.resolved.insert(query.clone(), canonical.clone());
            if query != canonical {
                this.resolved.insert(canonical.clone(), canonical.clone());
            }

            if path.contains(&canonical) {
                return Ok(Outcome::OnPath(canonical));
            }

            let (handle, in_progress) = this
                .coalescer
                .submit_keyed(canonical.clone(), builders::upsert_dog(record.clone()))
                .await;
            if in_progress {
                // Another task owns this subtree; join its write only.
                handle.wait().await?;
                return Ok(Outcome::Built(canonical));
            }
            handle.wait().await?;

            let mut child_path: HashSet<RegistryId> = path.as_ref().clone();
            child_path.insert(canonical.clone());
            let child_path = Arc::new(child_path);

            // Father side, mother side and offspring progress concurrently;
            // one branch's failure never cancels its siblings.
            let mut subtasks = Vec::new();
            for role in ParentRole::ALL {
                let task = Arc::clone(&this);
                let child = canonical.clone();
                match record.parent(role).cloned() {
                    Some(parent_id) => {
                        let branch_path = Arc::clone(&child_path);
                        subtasks.push(tokio::spawn(async move {
                            task.import_parent(child, role, parent_id, branch_path).await;
                        }));
                    }
                    None => {
                        subtasks.push(tokio::spawn(async move {
                            task.clear_stale_parent(child, role).await;
                        }));
                    }
                }
            }
            for litter in record.litters.clone() {
                let task = Arc::clone(&this);
                let dog = canonical.clone();
                let gender = record.gender;
                subtasks.push(tokio::spawn(async move {
                    task.import_litter(dog, gender, litter).await;
                }));
            }
            for joined in join_all(subtasks).await {
                if let Err(e) = joined {
                    warn!(error = %e, "pedigree subtask panicked");
                }
            }

            Ok(Outcome::Built(canonical))
        }
        .boxed()
    }

    async fn import_parent(
        self: Arc<Self>,
        child: RegistryId,
        role: ParentRole,
        parent: RegistryId,
        path: Arc<HashSet<RegistryId>>,
    ) {
        match self.build(parent.clone(), path).await {
            Ok(Outcome::Built(parent_canonical)) => {
                let handle = self
                    .coalescer
                    .submit(builders::set_parent(
                        child.clone(),
                        parent_canonical,
                        role,
                        false,
                    ))
                    .await;
                if let Err(e) = handle.wait().await {
                    warn!(%child, %role, error = %e, "parent edge write failed");
                }
            }
            Ok(Outcome::OnPath(parent_canonical)) => {
                warn!(
                    %child,
                    parent = %parent_canonical,
                    %role,
                    "candidate parent is its own ancestor; writing quarantine edge"
                );
                let handle = self
                    .coalescer
                    .submit(builders::set_parent(
                        child.clone(),
                        parent_canonical,
                        role,
                        true,
                    ))
                    .await;
                if let Err(e) = handle.wait().await {
                    warn!(%child, %role, error = %e, "quarantine edge write failed");
                }
            }
            Ok(Outcome::Missing) => {
                // The record names a parent the source cannot resolve;
                // leave whatever edge exists untouched.
                debug!(%child, %role, parent = %parent, "parent reference unresolvable");
            }
            Err(e) => warn!(%child, %role, parent = %parent, error = %e, "parent import failed"),
        }
    }

    async fn clear_stale_parent(self: Arc<Self>, child: RegistryId, role: ParentRole) {
        let handle = self
            .coalescer
            .submit(builders::clear_parent(child.clone(), role))
            .await;
        if let Err(e) = handle.wait().await {
            warn!(%child, %role, error = %e, "stale parent cleanup failed");
        }
    }

    /// Import one litter, one level deep: puppies are reused when already
    /// graphed, stubbed when their id is well formed, and otherwise
    /// resolved through the source.
    async fn import_litter(self: Arc<Self>, dog: RegistryId, gender: Gender, litter: LitterRecord) {
        let mut members: Vec<RegistryId> = Vec::new();
        let mut writes = Vec::new();

        for puppy in &litter.puppies {
            let graphed = self
                .store
                .read()
                .find_node(Label::Dog, props::REGISTRY_ID, &(&puppy.id).into())
                .is_some();
            if graphed {
                members.push(puppy.id.clone());
                continue;
            }
            if puppy.id.is_well_formed() {
                let (handle, _) = self
                    .coalescer
                    .submit_keyed(puppy.id.clone(), builders::stub_dog(puppy.clone()))
                    .await;
                writes.push(handle);
                members.push(puppy.id.clone());
                continue;
            }
            match self.lookup(&puppy.id).await {
                Ok(Some(record)) => {
                    let canonical = record.id.clone();
                    self.resolved.insert(puppy.id.clone(), canonical.clone());
                    let (handle, _) = self
                        .coalescer
                        .submit_keyed(canonical.clone(), builders::upsert_dog(record))
                        .await;
                    writes.push(handle);
                    members.push(canonical);
                }
                Ok(None) => debug!(puppy = %puppy.id, "puppy unresolvable; skipping"),
                Err(e) => warn!(puppy = %puppy.id, error = %e, "puppy lookup failed; skipping"),
            }
        }

        for handle in writes {
            if let Err(e) = handle.wait().await {
                warn!(%dog, error = %e, "puppy write failed");
            }
        }
        let handle = self
            .coalescer
            .submit(builders::link_litter(
                dog.clone(),
                gender,
                litter.clone(),
                members,
            ))
            .await;
        if let Err(e) = handle.wait().await {
            warn!(%dog, error = %e, "litter write failed");
        }
    }

    /// Source lookup bounded by the lookup semaphore, with one retry for
    /// transient failures.
    async fn lookup(&self, id: &RegistryId) -> Result<Option<DogRecord>> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| PedigraphError::Source("importer shut down".into()))?;
        match self.source.find_by_id(id).await {
            Ok(found) => Ok(found),
            Err(first) => {
                debug!(%id, error = %first, "source lookup failed; retrying once");
                tokio::time::sleep(self.config.lookup_retry_backoff).await;
                self.source.find_by_id(id).await
            }
        }
    }
}
