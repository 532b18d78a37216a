use std::path::{Component, Path};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Manifest names use either separator; the filesystem side always sees `/`.
pub fn normalize_separators(name: &str) -> String {
    name.replace('\\', "/")
}

/// Case-insensitive comparison key for a path relative to the install root.
pub fn relative_key(relative: &str) -> String {
    normalize_separators(relative)
        .trim_start_matches('/')
        .to_lowercase()
}

/// Key for `path` if it lies under `root`, otherwise `None`.
pub fn key_under_root(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let joined = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    Some(joined.to_lowercase())
}

pub fn build_globset<S: AsRef<str>>(
    patterns: &[S],
    case_insensitive: bool,
) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern.as_ref())
            .case_insensitive(case_insensitive)
            .literal_separator(false)
            .build()?;
        builder.add(glob);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_ignore_case_and_separator_style() {
        assert_eq!(relative_key("BH3_Data\\Sub/File.BIN"), "bh3_data/sub/file.bin");
        assert_eq!(
            key_under_root(Path::new("/g"), Path::new("/g/BH3_Data/File.bin")).as_deref(),
            Some("bh3_data/file.bin")
        );
        assert!(key_under_root(Path::new("/g"), Path::new("/other/x")).is_none());
    }

    #[test]
    fn star_crosses_directories_when_case_insensitive() {
        let set = build_globset(&["*screenshot*", "*.log"], true).unwrap();
        assert!(set.is_match("ScreenShot/2024/a.png"));
        assert!(set.is_match("logs/Output.LOG"));
        assert!(!set.is_match("data/a.bin"));
    }
}
