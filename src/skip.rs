use tracing::{debug, warn};

use crate::types::{AssetRecord, FileType};

/// One `"<name>$<type>"` entry of the skippable-asset list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipToken {
    pub name: String,
    pub file_type: FileType,
}

impl SkipToken {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (name, kind) = raw
            .split_once('$')
            .ok_or_else(|| "expected NAME$TYPE".to_string())?;
        if name.is_empty() {
            return Err("name part is empty".to_string());
        }
        let file_type = kind.parse::<FileType>()?;
        Ok(Self {
            name: name.to_string(),
            file_type,
        })
    }

    pub fn matches(&self, record: &AssetRecord) -> bool {
        record.file_type == self.file_type && ends_with_ignore_case(&record.name, &self.name)
    }
}

/// Case folding follows the same Unicode lowering as the orphan keys.
fn ends_with_ignore_case(haystack: &str, suffix: &str) -> bool {
    haystack.to_lowercase().ends_with(&suffix.to_lowercase())
}

/// Drop every record matching one of `tokens`, returning how many were removed.
///
/// Tokens that fail to parse are logged and ignored.
pub fn remove_skippable(records: &mut Vec<AssetRecord>, tokens: &[String]) -> usize {
    let parsed: Vec<SkipToken> = tokens
        .iter()
        .filter_map(|raw| match SkipToken::parse(raw) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring skippable asset {raw:?}: {e}");
                None
            }
        })
        .collect();
    if parsed.is_empty() {
        return 0;
    }

    let before = records.len();
    records.retain(|record| {
        let skip = parsed.iter().any(|token| token.matches(record));
        if skip {
            debug!("Skipping {} [T: {}]", record.name, record.file_type);
        }
        !skip
    });
    before - records.len()
}
