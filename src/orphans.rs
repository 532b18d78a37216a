use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path};

use globset::GlobSet;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{Result, VerifyError};
use crate::types::AssetRecord;
use crate::utils::{build_globset, key_under_root, relative_key};

/// Files that legitimately live in an installation without being listed in
/// the manifest.
pub struct ExclusionRules {
    path_rules: GlobSet,
    name_rules: GlobSet,
    delta_patch_prefix: Option<String>,
}

impl ExclusionRules {
    pub fn new(config: &Config) -> Result<Self> {
        let (major, minor) = config.game_version;
        let block_ext = config.block_extension.trim_start_matches('.');
        let path_patterns = [
            // captures and logs
            "*screenshot*".to_string(),
            "*.log".to_string(),
            "*.sys".to_string(),
            // launcher and SDK state
            "*webcaches*".to_string(),
            "*sdkcaches*".to_string(),
            "*version.txt".to_string(),
            "*.ini".to_string(),
            // audio sidecars
            "*manifest.m".to_string(),
            "*wwise_ids.h".to_string(),
            // video
            "*.usm".to_string(),
            // block indexes and pending block patches
            "*blocks.xmf".to_string(),
            format!("*blocks_{major}_{minor}.xmf"),
            "*blockmeta.xmf".to_string(),
            format!("*patch*.{block_ext}"),
        ];
        let name_patterns = ["@*", "*.zip*", "*.7z*", "d3d*.dll", "dxgi.dll*"];

        let path_rules = build_globset(&path_patterns, true)
            .map_err(|e| VerifyError::Config(format!("exclusion rules: {e}")))?;
        let name_rules = build_globset(&name_patterns, true)
            .map_err(|e| VerifyError::Config(format!("exclusion rules: {e}")))?;

        Ok(Self {
            path_rules,
            name_rules,
            delta_patch_prefix: config.profile_name.clone().filter(|p| !p.is_empty()),
        })
    }

    /// `relative` is the install-relative path with `/` separators.
    pub fn is_excluded(&self, relative: &str, file_name: &str) -> bool {
        if self.path_rules.is_match(relative) || self.name_rules.is_match(file_name) {
            return true;
        }
        self.delta_patch_prefix
            .as_deref()
            .is_some_and(|prefix| file_name.starts_with(prefix) && relative.ends_with(".patch"))
    }
}

/// User-maintained list of paths never to report as unused.
#[derive(Debug, Default)]
pub struct IgnoreList {
    keys: HashSet<String>,
}

impl IgnoreList {
    /// Reads the sidecar once. An unreadable sidecar is logged and treated as
    /// empty.
    pub fn load(config: &Config) -> Self {
        let root = config.install_path.as_path();
        let mut list = Self::default();
        for entry in &config.ignored_unused_files {
            list.insert(root, entry);
        }

        let sidecar = root.join(&config.ignored_files_name);
        if !sidecar.is_file() {
            return list;
        }
        match fs::read_to_string(&sidecar) {
            Ok(contents) => {
                info!("Found ignore file settings at {}", sidecar.display());
                for line in contents.lines() {
                    list.insert(root, line);
                }
            }
            Err(e) => {
                error!(
                    "Failed when reading ignore file setting {}! Ignoring...: {e}",
                    sidecar.display()
                );
            }
        }
        list
    }

    fn insert(&mut self, root: &Path, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        let path = Path::new(trimmed);
        let key = if path.is_absolute() {
            match key_under_root(root, path) {
                Some(key) => key,
                None => return,
            }
        } else {
            relative_key(trimmed)
        };
        self.keys.insert(key);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn relative_display(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
    )
}

/// Walk the install tree and return an Unused record for every file that is
/// neither catalogued, excluded nor ignored.
pub fn scan_unused(
    catalog: &Catalog,
    config: &Config,
    cancel: &CancelToken,
) -> Result<Vec<AssetRecord>> {
    let root = config.install_path.as_path();
    let rules = ExclusionRules::new(config)?;
    let ignored = IgnoreList::load(config);
    let mut unused = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        cancel.check()?;
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            VerifyError::io(path, io::Error::from(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = relative_display(root, entry.path()) else {
            continue;
        };
        let key = relative.to_lowercase();
        if catalog.contains_key(&key) || ignored.contains_key(&key) {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if rules.is_excluded(&relative, &file_name) {
            debug!("Excluded from unused scan: {relative}");
            continue;
        }
        let size = entry
            .metadata()
            .map_err(|e| VerifyError::io(entry.path(), io::Error::from(e)))?
            .len();
        unused.push(AssetRecord::unused(relative, size));
    }

    Ok(unused)
}
