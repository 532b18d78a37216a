use std::collections::HashSet;
use crate::config::Config;
use crate::types::{AssetRecord, FileType};
use crate::utils::{normalize_separators, relative_key};

/// Every path the manifest expects under the install root.
///
/// Paths are held as case-insensitive install-relative keys.
#[derive(Debug, Clone)]
pub struct Catalog {
    keys: HashSet<String>,
}

impl Catalog {
    pub fn build(records: &[AssetRecord], config: &Config) -> Self {
        let block_base = normalize_separators(&config.block_base_path);
        let block_base = block_base.trim_matches('/');
        let mut keys = HashSet::with_capacity(records.len());

        for record in records {
            match record.file_type {
                FileType::Block => {
                    keys.insert(relative_key(&record.name));
                    if let Some(patch) = &record.block_patch {
                        for pair in &patch.pairs {
                            keys.insert(relative_key(&old_block_relative(
                                block_base,
                                &pair.old_hash_str,
                                &config.block_extension,
                            )));
                        }
                    }
                }
                FileType::Generic | FileType::Audio | FileType::Video => {
                    keys.insert(relative_key(&record.name));
                }
                FileType::Unused => {}
            }
        }

        Self { keys }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn contains(&self, relative: &str) -> bool {
        self.keys.contains(&relative_key(relative))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub fn old_block_relative(block_base: &str, old_hash_str: &str, extension: &str) -> String {
    let file = format!("{old_hash_str}.{}", extension.trim_start_matches('.'));
    if block_base.is_empty() {
        file
    } else {
        format!("{block_base}/{file}")
    }
}
