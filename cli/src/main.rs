//! Pyrite CLI - package repository diagnostics.
//!
//! Two commands, both read-only against a runtime package repository:
//!
//! - `pyrite manifest <base-url>` prints the dependency manifest served
//!   at the base location.
//! - `pyrite resolve <base-url> <package|uri>...` dry-runs dependency
//!   resolution for a load request, printing the load set (or the
//!   resolution error) without fetching any package asset.

use std::collections::BTreeMap;
use std::env;
use std::io;

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;
use url::Url;

use pyrite_loader::resolve;

const USAGE: &str = "\
Usage:
  pyrite manifest <base-url>
  pyrite resolve <base-url> <package|uri>...

Inspect a runtime package repository: print its dependency manifest, or
dry-run dependency resolution for a load request against it.";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.split_first().map(|(cmd, rest)| (cmd.as_str(), rest)) {
        Some(("manifest", rest)) => manifest_command(rest).await,
        Some(("resolve", rest)) => resolve_command(rest).await,
        _ => {
            eprintln!("{USAGE}");
            bail!("expected a command: manifest | resolve");
        }
    }
}

async fn manifest_command(args: &[String]) -> Result<()> {
    let [base] = args else {
        bail!("manifest takes exactly one <base-url>");
    };
    let base = parse_base(base)?;
    let manifest = pyrite_fetch::fetch_manifest(&base)
        .await
        .with_context(|| format!("cannot fetch manifest from {base}"))?;

    for name in manifest.package_names() {
        let deps = manifest.dependencies_of(name).unwrap_or(&[]);
        if deps.is_empty() {
            println!("{name}");
        } else {
            println!("{name} -> {}", deps.join(", "));
        }
    }
    Ok(())
}

async fn resolve_command(args: &[String]) -> Result<()> {
    let Some((base, names)) = args.split_first() else {
        bail!("resolve takes a <base-url> and at least one package");
    };
    if names.is_empty() {
        bail!("resolve takes at least one package name or URI");
    }
    let base = parse_base(base)?;
    tracing::debug!(%base, "fetching manifest for dry-run resolution");
    let manifest = pyrite_fetch::fetch_manifest(&base)
        .await
        .with_context(|| format!("cannot fetch manifest from {base}"))?;

    let load_set = resolve(names, &manifest, &BTreeMap::new())
        .context("resolution failed")?;
    if load_set.is_empty() {
        println!("nothing to load");
        return Ok(());
    }
    for (name, source) in &load_set {
        println!("{name} <- {source}");
    }
    Ok(())
}

/// Base locations always end with a slash so relative joins resolve
/// under them rather than replacing the final segment.
fn parse_base(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).with_context(|| format!("invalid base URL '{raw}'"))
}
