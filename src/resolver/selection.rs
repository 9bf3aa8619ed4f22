//! Selection phase (§4.5): override application, per-name maximum
//! selection, yanked substitution, and the post-selection checks.
//!
//! Grounded on the teacher's `analyzer/conflict.rs` phase-numbered
//! `analyze()` (phase comments + `tracing::debug!` per phase) and
//! `analyzer/deprecation.rs`'s deprecation-flagging pass.

use std::collections::{HashMap, VecDeque};

use futures::future::join_all;
use tracing::{debug, warn};

use super::compat;
use crate::config::{DirectDepsMode, ResolutionOptions, YankedBehavior};
use crate::error::{ResolveError, Result};
use crate::registry::RegistryChain;
use crate::types::{DepGraph, DepRequest, ModuleInfo, Override, ResolutionList, ResolutionWarning, ResolvedModule};
use crate::version::Version;

/// Replace each `SingleVersion`-overridden module's entire version map
/// with a single entry pinned at the override version (§4.5
/// "Override-application phase").
fn apply_overrides(graph: &mut DepGraph, root: &ModuleInfo) {
    for ov in &root.overrides {
        let Override::SingleVersion { module_name, version, .. } = ov else {
            continue;
        };
        if version.is_empty() {
            continue;
        }
        let version_key = version.as_str().to_string();
        let existing = graph.get(module_name).and_then(|m| m.get(&version_key)).cloned();
        let request = existing.unwrap_or_else(|| DepRequest {
            version: version.clone(),
            dev_dependency: false,
            required_by: vec!["<override>".to_string()],
        });
        let mut versions = HashMap::new();
        versions.insert(version_key, request);
        graph.insert(module_name.clone(), versions);
    }
}

/// Pick the maximum version (§4.1 ordering) for each module name.
fn select_maxima(graph: &DepGraph) -> HashMap<String, DepRequest> {
    graph
        .iter()
        .filter_map(|(name, versions)| {
            versions
                .values()
                .max_by(|a, b| a.version.cmp(&b.version))
                .map(|req| (name.clone(), req.clone()))
        })
        .collect()
}

/// For each yanked selected version, replace it with the lowest
/// not-yanked version `>= requested` sharing the same `compatibility_level`
/// (§4.5 "Yanked substitution"). Network/parse failures leave the entry
/// untouched.
async fn substitute_yanked(selected: &mut HashMap<String, DepRequest>, chain: &RegistryChain) {
    let names: Vec<String> = selected.keys().cloned().collect();
    for name in names {
        let requested_version = selected[&name].version.clone();
        if requested_version.is_empty() {
            continue;
        }
        let Ok(meta) = chain.get_module_metadata(&name).await else {
            continue;
        };
        if !meta.yanked_versions.contains_key(requested_version.as_str()) {
            continue;
        }
        let Ok(requested_info) = chain.get_module_file(&name, requested_version.as_str()).await else {
            continue;
        };
        let requested_compat = requested_info.compatibility_level;

        let mut candidates: Vec<Version> = meta
            .versions
            .iter()
            .filter_map(|v| Version::parse(v).ok())
            .filter(|v| *v >= requested_version && !meta.yanked_versions.contains_key(v.as_str()))
            .collect();
        candidates.sort();

        for candidate in candidates {
            let Ok(info) = chain.get_module_file(&name, candidate.as_str()).await else {
                continue;
            };
            if info.compatibility_level == requested_compat {
                debug!(module = %name, from = %requested_version.as_str(), to = %candidate.as_str(), "substituted yanked version");
                if let Some(req) = selected.get_mut(&name) {
                    req.version = candidate;
                }
                break;
            }
        }
    }
}

fn resolve_registry_url(name: &str, root: &ModuleInfo, chain: &RegistryChain) -> String {
    if let Some(Override::SingleVersion { registry: Some(url), .. }) = root.override_for(name) {
        return url.clone();
    }
    if let Some(url) = chain.sticky_base_url(name) {
        return url;
    }
    chain.primary_base_url().to_string()
}

async fn build_resolved_modules(
    selected: &HashMap<String, DepRequest>,
    root: &ModuleInfo,
    chain: &RegistryChain,
) -> Vec<ResolvedModule> {
    let mut modules = Vec::with_capacity(selected.len());
    for (name, req) in selected {
        let own_info = if req.version.is_empty() {
            None
        } else {
            chain.get_module_file(name, req.version.as_str()).await.ok()
        };
        let (dependencies, bazel_compatibility) = match &own_info {
            Some(info) => (info.dependencies.clone(), info.bazel_compatibility.clone()),
            None => (Vec::new(), Vec::new()),
        };
        modules.push(ResolvedModule {
            name: name.clone(),
            version: req.version.clone(),
            registry_url: resolve_registry_url(name, root, chain),
            dev_dependency: req.dev_dependency,
            required_by: req.required_by.clone(),
            depth: 0,
            dependencies,
            yanked: false,
            yank_reason: None,
            deprecated: false,
            deprecation_reason: None,
            bazel_compatibility,
            is_bazel_incompatible: false,
            incompatibility_reason: None,
        });
    }
    modules
}

fn assign_depths(modules: &mut [ResolvedModule]) {
    let by_name: HashMap<String, usize> = modules.iter().enumerate().map(|(i, m)| (m.name.clone(), i)).collect();
    let mut depth: HashMap<String, u32> = HashMap::new();
    let mut queue: VecDeque<String> = VecDeque::new();

    for m in modules.iter() {
        if m.required_by.iter().any(|r| r == "<root>") {
            depth.entry(m.name.clone()).or_insert(1);
        }
    }
    queue.extend(depth.keys().cloned());

    while let Some(name) = queue.pop_front() {
        let current = depth[&name];
        let Some(&idx) = by_name.get(&name) else { continue };
        for dep in modules[idx].dependencies.clone() {
            let candidate = current + 1;
            let better = depth.get(&dep.name).is_none_or(|&existing| candidate < existing);
            if better {
                depth.insert(dep.name.clone(), candidate);
                queue.push_back(dep.name.clone());
            }
        }
    }

    for m in modules.iter_mut() {
        m.depth = depth.get(&m.name).copied().unwrap_or(0);
    }
}

async fn apply_yanked_and_deprecated(
    modules: &mut [ResolvedModule],
    warnings: &mut Vec<ResolutionWarning>,
    options: &ResolutionOptions,
    chain: &RegistryChain,
) -> Result<()> {
    if !options.check_yanked && !options.warn_deprecated {
        return Ok(());
    }

    let fetches = join_all(modules.iter().map(|m| {
        let name = m.name.clone();
        async move { (name.clone(), chain.get_module_metadata(&name).await) }
    }))
    .await;
    let metadata: HashMap<String, crate::registry::ModuleMetadata> =
        fetches.into_iter().filter_map(|(name, res)| res.ok().map(|m| (name, m))).collect();

    let mut yanked_names = Vec::new();
    for module in modules.iter_mut() {
        let Some(meta) = metadata.get(&module.name) else {
            continue;
        };
        if options.check_yanked {
            if let Some(reason) = meta.yanked_versions.get(module.version.as_str()) {
                if !options.allows_yanked(&module.name, module.version.as_str()) {
                    module.yanked = true;
                    module.yank_reason = Some(reason.clone());
                    yanked_names.push(format!("{}@{}", module.name, module.version.as_str()));
                }
            }
        }
        if options.warn_deprecated {
            if let Some(reason) = &meta.deprecated {
                module.deprecated = true;
                module.deprecation_reason = Some(reason.clone());
                warnings.push(ResolutionWarning {
                    module: module.name.clone(),
                    message: format!("module '{}' is deprecated: {reason}", module.name),
                });
            }
        }
    }

    if !yanked_names.is_empty() {
        match options.yanked_behavior {
            YankedBehavior::Allow => {}
            YankedBehavior::Warn => {
                for n in &yanked_names {
                    warnings.push(ResolutionWarning {
                        module: n.clone(),
                        message: format!("selected yanked version '{n}'"),
                    });
                }
            }
            YankedBehavior::Error => {
                return Err(ResolveError::YankedVersionsError { modules: yanked_names });
            }
        }
    }

    Ok(())
}

fn check_direct_deps(
    modules: &[ResolvedModule],
    root: &ModuleInfo,
    warnings: &mut Vec<ResolutionWarning>,
    options: &ResolutionOptions,
) -> Result<()> {
    if matches!(options.direct_deps_mode, DirectDepsMode::Off) {
        return Ok(());
    }

    let mut mismatches = Vec::new();
    for dep in &root.dependencies {
        let Some(selected) = modules.iter().find(|m| m.name == dep.name) else {
            continue;
        };
        if selected.version != dep.version {
            mismatches.push(format!(
                "{} (declared {}, selected {})",
                dep.name,
                dep.version.as_str(),
                selected.version.as_str()
            ));
        }
    }

    if mismatches.is_empty() {
        return Ok(());
    }

    match options.direct_deps_mode {
        DirectDepsMode::Off => unreachable!(),
        DirectDepsMode::Warn => {
            for m in &mismatches {
                warnings.push(ResolutionWarning {
                    module: m.clone(),
                    message: format!("direct dependency mismatch: {m}"),
                });
            }
            Ok(())
        }
        DirectDepsMode::Error => Err(ResolveError::DirectDepsMismatchError(mismatches)),
    }
}

fn check_bazel_compatibility(modules: &mut [ResolvedModule], options: &ResolutionOptions) {
    let Some(bazel_version) = &options.bazel_version else {
        return;
    };
    for module in modules.iter_mut() {
        let (compatible, reason) = compat::check_compatibility(&module.bazel_compatibility, bazel_version);
        module.is_bazel_incompatible = !compatible;
        module.incompatibility_reason = reason;
    }
}

/// Run the full selection phase against an already-discovered `depGraph`.
pub async fn select(
    mut graph: DepGraph,
    root: &ModuleInfo,
    chain: &RegistryChain,
    options: &ResolutionOptions,
) -> Result<ResolutionList> {
    debug!("phase: applying overrides");
    apply_overrides(&mut graph, root);

    debug!("phase: selecting per-name maxima");
    let mut selected = select_maxima(&graph);

    if options.substitute_yanked {
        debug!("phase: substituting yanked versions");
        substitute_yanked(&mut selected, chain).await;
    }

    debug!("phase: building resolved modules");
    let mut modules = build_resolved_modules(&selected, root, chain).await;
    assign_depths(&mut modules);
    modules.sort_by(|a, b| a.name.cmp(&b.name));

    let mut warnings = Vec::new();

    debug!("phase: post-selection checks");
    apply_yanked_and_deprecated(&mut modules, &mut warnings, options, chain).await?;
    check_direct_deps(&modules, root, &mut warnings, options)?;
    check_bazel_compatibility(&mut modules, options);

    if modules.iter().any(|m| m.is_bazel_incompatible) {
        warn!("one or more selected modules are incompatible with the configured bazel_version");
    }

    Ok(ResolutionList { modules, warnings })
}
