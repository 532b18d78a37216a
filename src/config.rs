use std::path::PathBuf;

use crate::{cli::Cli, skip::SkipToken, types::DigestAlgorithm, utils::normalize_separators};

pub const DEFAULT_BLOCK_BASE: &str = "BH3_Data/StreamingAssets/Asb/pc/HD";
pub const DEFAULT_BLOCK_EXTENSION: &str = "wmv";
pub const DEFAULT_IGNORED_FILES_NAME: &str = "@IgnoredFiles";

#[derive(Debug, Clone, serde::Serialize)]
pub struct Config {
    pub install_path: PathBuf,
    pub block_base_path: String,
    pub block_extension: String,
    pub game_version: (u32, u32),
    pub profile_name: Option<String>,
    pub fast_mode: bool,
    pub main_package_only: bool,
    pub concurrency: usize,
    pub skippable_assets: Vec<String>,
    pub ignored_files_name: String,
    pub ignored_unused_files: Vec<String>,
    pub digest_algorithm: DigestAlgorithm,
    pub verbose: u8,
    pub quiet: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            install_path: PathBuf::from("."),
            block_base_path: DEFAULT_BLOCK_BASE.to_string(),
            block_extension: DEFAULT_BLOCK_EXTENSION.to_string(),
            game_version: (0, 0),
            profile_name: None,
            fast_mode: false,
            main_package_only: false,
            concurrency: num_cpus::get().max(1),
            skippable_assets: Vec::new(),
            ignored_files_name: DEFAULT_IGNORED_FILES_NAME.to_string(),
            ignored_unused_files: Vec::new(),
            digest_algorithm: DigestAlgorithm::default(),
            verbose: 0,
            quiet: 0,
        }
    }
}

impl Config {
    pub fn for_install(install_path: impl Into<PathBuf>) -> Self {
        Self {
            install_path: install_path.into(),
            ..Self::default()
        }
    }

    /// Absolute directory that holds block files.
    pub fn block_dir(&self) -> PathBuf {
        self.install_path
            .join(normalize_separators(&self.block_base_path))
    }

    fn validate_concurrency(&self) -> anyhow::Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("threads must be a positive number");
        }
        Ok(())
    }

    fn validate_block_layout(&self) -> anyhow::Result<()> {
        if self.block_extension.trim_start_matches('.').is_empty() {
            anyhow::bail!("block-ext cannot be empty");
        }
        Ok(())
    }

    fn validate_skippable_assets(&self) -> anyhow::Result<()> {
        for token in &self.skippable_assets {
            SkipToken::parse(token)
                .map_err(|e| anyhow::anyhow!("invalid skippable asset {token:?}: {e}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_concurrency()?;
        self.validate_block_layout()?;
        self.validate_skippable_assets()?;
        Ok(())
    }
}

fn parse_game_version(raw: &str) -> anyhow::Result<(u32, u32)> {
    let mut parts = raw.trim().split('.');
    let major = parts.next().unwrap_or_default().parse::<u32>();
    let minor = parts.next().unwrap_or("0").parse::<u32>();
    match (major, minor) {
        (Ok(major), Ok(minor)) => Ok((major, minor)),
        _ => anyhow::bail!("game-version must look like MAJOR.MINOR, got {raw:?}"),
    }
}

impl TryFrom<Cli> for Config {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let defaults = Config::default();
        let config = Self {
            install_path: cli.game_path,
            block_base_path: cli.block_base.unwrap_or(defaults.block_base_path),
            block_extension: cli
                .block_ext
                .map(|e| e.trim_start_matches('.').to_string())
                .unwrap_or(defaults.block_extension),
            game_version: match cli.game_version.as_deref() {
                Some(raw) => parse_game_version(raw)?,
                None => defaults.game_version,
            },
            profile_name: cli.profile.filter(|p| !p.is_empty()),
            fast_mode: cli.fast,
            main_package_only: cli.main_only,
            concurrency: cli.threads.unwrap_or(defaults.concurrency),
            skippable_assets: cli.skip,
            ignored_files_name: defaults.ignored_files_name,
            ignored_unused_files: cli.ignore,
            digest_algorithm: cli.algorithm,
            verbose: cli.verbose,
            quiet: cli.quiet,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> anyhow::Result<Config> {
        let mut argv = vec!["assetcheck", "--game-path", "/games/hi3", "--manifest", "m.json"];
        argv.extend_from_slice(args);
        Config::try_from(Cli::parse_from(argv))
    }

    #[test]
    fn defaults_follow_host_parallelism() {
        let config = parse(&[]).expect("config should parse");
        assert_eq!(config.concurrency, num_cpus::get().max(1));
        assert_eq!(config.block_extension, "wmv");
        assert_eq!(config.ignored_files_name, "@IgnoredFiles");
        assert!(!config.fast_mode);
    }

    #[test]
    fn errors_when_threads_is_zero() {
        let err = parse(&["--threads", "0"]).unwrap_err();
        assert!(err.to_string().contains("threads must be a positive"));
    }

    #[test]
    fn errors_on_malformed_skip_token() {
        let err = parse(&["--skip", "Video/intro.usm"]).unwrap_err();
        assert!(err.to_string().contains("invalid skippable asset"));

        let err = parse(&["--skip", "intro.usm$Movie"]).unwrap_err();
        assert!(err.to_string().contains("invalid skippable asset"));
    }

    #[test]
    fn parses_game_version_and_block_extension() {
        let config = parse(&["--game-version", "7.3", "--block-ext", ".wmv"]).unwrap();
        assert_eq!(config.game_version, (7, 3));
        assert_eq!(config.block_extension, "wmv");

        let err = parse(&["--game-version", "seven"]).unwrap_err();
        assert!(err.to_string().contains("MAJOR.MINOR"));
    }

    #[test]
    fn block_dir_is_under_install_path() {
        let config = Config {
            block_base_path: "Data\\Blocks".into(),
            ..Config::for_install("/games/hi3")
        };
        assert_eq!(config.block_dir(), PathBuf::from("/games/hi3/Data/Blocks"));
    }
}
