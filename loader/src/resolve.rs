//! Transitive dependency resolution.
//!
//! Pure function over its inputs: a load request, the dependency
//! manifest, and the already-loaded map. Computes the set of packages
//! that must be fetched, rejecting inconsistent or unknown requests
//! before any network activity starts.

use std::collections::BTreeMap;

use pyrite_types::{
    ConflictSite, DependencyManifest, PackageName, PackageSource, ResolveError,
    canonical_package_name,
};

/// Compute the full load set for `requested`.
///
/// Work-queue traversal: each popped identifier is canonicalized (a bare
/// name loads from the default channel, anything else from its URI),
/// checked for source conflicts against the loaded map and the staged
/// set, staged, and its manifest dependencies pushed. Each name is staged
/// at most once, so traversal terminates; order within the queue is not
/// significant.
pub fn resolve<S: AsRef<str>>(
    requested: &[S],
    manifest: &DependencyManifest,
    loaded: &BTreeMap<PackageName, PackageSource>,
) -> Result<BTreeMap<PackageName, PackageSource>, ResolveError> {
    let mut queue: Vec<String> = requested.iter().map(|s| s.as_ref().to_string()).collect();
    let mut to_load: BTreeMap<PackageName, PackageSource> = BTreeMap::new();

    while let Some(identifier) = queue.pop() {
        let Some(name) = canonical_package_name(&identifier) else {
            return Err(ResolveError::InvalidPackageIdentifier(identifier));
        };
        let source = if name.as_str() == identifier {
            PackageSource::DefaultChannel
        } else {
            PackageSource::Uri(identifier)
        };

        if let Some(existing) = loaded.get(&name) {
            if *existing != source {
                return Err(ResolveError::UriConflict {
                    name,
                    requested: source,
                    existing: existing.clone(),
                    site: ConflictSite::Loaded,
                });
            }
        } else if let Some(staged) = to_load.get(&name) {
            if *staged != source {
                return Err(ResolveError::UriConflict {
                    name,
                    requested: source,
                    existing: staged.clone(),
                    site: ConflictSite::Staged,
                });
            }
            // Same name, same source twice in one request: duplicate, not
            // a conflict.
        } else {
            let Some(deps) = manifest.dependencies_of(name.as_str()) else {
                return Err(ResolveError::UnknownPackage(name));
            };
            to_load.insert(name, source);
            for dep in deps {
                if !loaded.contains_key(dep.as_str()) && !to_load.contains_key(dep.as_str()) {
                    queue.push(dep.clone());
                }
            }
        }
    }

    Ok(to_load)
}
