use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::types::DigestAlgorithm;

#[derive(Parser, Debug, serde::Serialize)]
#[command(
    name = "assetcheck",
    version,
    about = "Verify a game installation against its asset manifest",
    long_about = "Checks every manifest entry for missing, size-mismatched or corrupted files, detects entries that can be repaired with an incremental patch, and lists files on disk the manifest does not know about. The broken-asset manifest is printed as JSON on stdout."
)]
pub struct Cli {
    /// Root of the game installation
    #[arg(short = 'g', long = "game-path", value_name = "DIR")]
    pub game_path: PathBuf,

    /// Asset manifest (JSON array of asset records)
    #[arg(short = 'm', long = "manifest", value_name = "FILE")]
    pub manifest: PathBuf,

    /// Trust file sizes and skip digest computation
    #[arg(long = "fast")]
    pub fast: bool,

    /// Only check the main package: no orphan scan, no skippable assets
    #[arg(long = "main-only")]
    pub main_only: bool,

    /// Number of worker threads (defaults to logical CPU count)
    #[arg(short = 't', long = "threads", value_name = "N")]
    pub threads: Option<usize>,

    /// Assets to skip, as NAME$TYPE (can specify multiple)
    #[arg(short = 's', long = "skip", value_name = "NAME$TYPE", action = ArgAction::Append)]
    pub skip: Vec<String>,

    /// Directory holding block files, relative to the game path
    #[arg(long = "block-base", value_name = "PATH")]
    pub block_base: Option<String>,

    /// Extension of block files
    #[arg(long = "block-ext", value_name = "EXT")]
    pub block_ext: Option<String>,

    /// Installed game version (MAJOR.MINOR), used to recognise the versioned block index
    #[arg(long = "game-version", value_name = "MAJOR.MINOR")]
    pub game_version: Option<String>,

    /// Profile name prefixing delta-patch files left in the game folder
    #[arg(long = "profile", value_name = "NAME")]
    pub profile: Option<String>,

    /// Extra paths to never report as unused (can specify multiple)
    #[arg(long = "ignore", value_name = "PATH", action = ArgAction::Append)]
    pub ignore: Vec<String>,

    /// Digest algorithm the manifest checksums were produced with
    #[arg(long = "algorithm", value_enum, default_value_t = DigestAlgorithm::Md5)]
    pub algorithm: DigestAlgorithm,

    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,
}
