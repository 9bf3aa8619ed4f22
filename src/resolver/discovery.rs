//! Discovery phase (§4.5): concurrent transitive-dependency discovery
//! feeding a two-level `depGraph`, bounded by a fixed-size fan-out.
//!
//! Grounded on the teacher's `lib.rs` `Scanner::scan_repositories`
//! fan-out, adapted from unbounded `try_join_all` to a `Semaphore`-bounded
//! spawn per discovered `(name, version)` pair since the design calls for
//! fan-out capped at a fixed width rather than one task per item.
//!
//! A single task owns the `mpsc::Receiver` and dispatches each item to its
//! own spawned fetch task, so no two tasks ever contend for the same
//! receiver lock. Termination can't rely on every `Sender` dropping — the
//! sender lives behind the `Arc<DiscoveryState>` that in-flight fetch
//! tasks hold so they can enqueue the children they discover, which is
//! exactly what keeps it alive — so an outstanding-work counter tracks
//! every enqueued-but-not-yet-processed item and wakes the dispatcher once
//! it reaches zero.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::{mpsc, Mutex, Notify, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ResolutionOptions;
use crate::error::{ResolveError, Result};
use crate::registry::{build_source, RegistryChain, RegistrySource};
use crate::types::{DepGraph, DepRequest, Dependency, ModuleInfo, Override};
use crate::version::Version;

struct DiscoveryState {
    graph: Mutex<DepGraph>,
    visiting: DashSet<String>,
    sender: mpsc::Sender<(String, Version)>,
    pending: AtomicUsize,
    done: Notify,
    root_overrides: HashMap<String, Override>,
    override_snapshots: HashMap<String, ModuleInfo>,
    dedicated_sources: HashMap<String, Arc<dyn RegistrySource>>,
    options: ResolutionOptions,
}

fn visiting_key(name: &str, version: &Version) -> String {
    format!("{name}@{}", version.as_str())
}

async fn merge_request(state: &DiscoveryState, name: &str, version: &Version, dev_dependency: bool, required_by: &str) {
    let mut graph = state.graph.lock().await;
    let versions = graph.entry(name.to_string()).or_default();
    let entry = versions.entry(version.as_str().to_string()).or_insert_with(|| DepRequest {
        version: version.clone(),
        dev_dependency,
        required_by: Vec::new(),
    });
    entry.required_by.push(required_by.to_string());
    if !dev_dependency {
        entry.dev_dependency = false;
    }
}

/// Marks one unit of outstanding work complete; wakes the dispatcher if
/// that was the last one.
fn retire(state: &DiscoveryState) {
    if state.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
        state.done.notify_one();
    }
}

async fn enqueue(state: &Arc<DiscoveryState>, name: &str, version: Version, dev_dependency: bool, required_by: &str) {
    merge_request(state, name, &version, dev_dependency, required_by).await;
    let key = visiting_key(name, &version);
    if state.visiting.insert(key) {
        state.pending.fetch_add(1, Ordering::SeqCst);
        if state.sender.send((name.to_string(), version)).await.is_err() {
            // The dispatcher has already stopped listening; nothing left
            // to drive this item, so undo the count it was holding open.
            retire(state);
        }
    }
}

async fn record_non_registry(state: &Arc<DiscoveryState>, name: &str, dev_dependency: bool, required_by: &str) {
    merge_request(state, name, &Version::empty(), dev_dependency, required_by).await;
}

fn process_dependency<'a>(
    state: &'a Arc<DiscoveryState>,
    dep: &'a Dependency,
    required_by: &'a str,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        if dep.dev_dependency && !state.options.include_dev_deps {
            return;
        }

        match state.root_overrides.get(dep.name.as_str()) {
            Some(Override::SingleVersion { version, .. }) if !version.is_empty() => {
                enqueue(state, &dep.name, version.clone(), dep.dev_dependency, required_by).await;
            }
            Some(ov @ (Override::Git { .. } | Override::LocalPath { .. } | Override::Archive { .. })) => {
                let module_name = ov.module_name().to_string();
                record_non_registry(state, &module_name, dep.dev_dependency, required_by).await;
                if let Some(snapshot) = state.override_snapshots.get(&module_name).cloned() {
                    for child in &snapshot.dependencies {
                        process_dependency(state, child, &module_name).await;
                    }
                }
            }
            _ => {
                enqueue(state, &dep.name, dep.version.clone(), dep.dev_dependency, required_by).await;
            }
        }
    })
}

/// Fetch one `(name, version)` pair and fold its result into `state`,
/// enqueuing any further children it names.
async fn process_one(
    state: Arc<DiscoveryState>,
    chain: Arc<RegistryChain>,
    name: String,
    version: Version,
    seq: usize,
    cancel: CancellationToken,
    first_error: Arc<Mutex<Option<ResolveError>>>,
) {
    if cancel.is_cancelled() {
        retire(&state);
        return;
    }

    debug!(seq, module = %name, version = %version.as_str(), "fetching module");

    let fetch_result = if let Some(src) = state.dedicated_sources.get(&name) {
        src.get_module_file(&name, version.as_str()).await
    } else {
        chain.get_module_file(&name, version.as_str()).await
    };

    match fetch_result {
        Ok(info) => {
            for child in &info.dependencies {
                process_dependency(&state, child, &name).await;
            }
        }
        Err(ResolveError::NotFound { .. }) => {
            warn!(module = %name, version = %version.as_str(), "module not found, pruning subtree");
            let mut graph = state.graph.lock().await;
            if let Some(versions) = graph.get_mut(&name) {
                versions.remove(version.as_str());
                if versions.is_empty() {
                    graph.remove(&name);
                }
            }
        }
        Err(e) => {
            let mut slot = first_error.lock().await;
            if slot.is_none() {
                *slot = Some(e);
            }
            cancel.cancel();
        }
    }

    retire(&state);
}

/// Run the discovery phase to completion, returning the populated
/// `depGraph`.
pub async fn discover(
    root: &ModuleInfo,
    chain: Arc<RegistryChain>,
    override_snapshots: HashMap<String, ModuleInfo>,
    options: &ResolutionOptions,
    cancel: CancellationToken,
) -> Result<DepGraph> {
    let root_overrides: HashMap<String, Override> = root
        .overrides
        .iter()
        .map(|o| (o.module_name().to_string(), o.clone()))
        .collect();

    let mut dedicated_sources = HashMap::new();
    for ov in &root.overrides {
        if let Override::SingleVersion { module_name, registry: Some(url), .. } = ov {
            let src = build_source(url, options.timeout, options.cache.clone())?;
            dedicated_sources.insert(module_name.clone(), src);
        }
    }

    let buffer = options.discovery_buffer(root.dependencies.len());
    let (tx, mut rx) = mpsc::channel(buffer);

    let state = Arc::new(DiscoveryState {
        graph: Mutex::new(DepGraph::new()),
        visiting: DashSet::new(),
        sender: tx,
        pending: AtomicUsize::new(0),
        done: Notify::new(),
        root_overrides,
        override_snapshots,
        dedicated_sources,
        options: options.clone(),
    });

    for dep in &root.dependencies {
        process_dependency(&state, dep, "<root>").await;
    }
    // Nothing was ever enqueued (root has no registry deps): no fetch task
    // will ever retire work, so wake the dispatcher ourselves.
    if state.pending.load(Ordering::SeqCst) == 0 {
        state.done.notify_one();
    }

    let first_error: Arc<Mutex<Option<ResolveError>>> = Arc::new(Mutex::new(None));
    let semaphore = Arc::new(Semaphore::new(options.discovery_concurrency.max(1)));
    let mut tasks: JoinSet<()> = JoinSet::new();
    let mut seq = 0usize;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        tokio::select! {
            biased;
            () = state.done.notified(), if state.pending.load(Ordering::SeqCst) == 0 => {
                break;
            }
            item = rx.recv() => {
                let Some((name, version)) = item else { break };
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                seq = seq.wrapping_add(1);
                let state = Arc::clone(&state);
                let chain = Arc::clone(&chain);
                let cancel = cancel.clone();
                let first_error = Arc::clone(&first_error);
                tasks.spawn(async move {
                    let _permit = permit;
                    process_one(state, chain, name, version, seq, cancel, first_error).await;
                });
            }
        }
    }

    while tasks.join_next().await.is_some() {}

    if let Some(err) = first_error.lock().await.take() {
        return Err(err);
    }
    if cancel.is_cancelled() {
        return Err(ResolveError::Cancelled {
            reason: "resolution cancelled by caller".to_string(),
        });
    }

    let mut graph = state.graph.lock().await;
    Ok(std::mem::take(&mut *graph))
}
