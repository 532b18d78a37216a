use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FileType {
    Generic,
    Audio,
    Video,
    Block,
    Unused,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Generic => "Generic",
            FileType::Audio => "Audio",
            FileType::Video => "Video",
            FileType::Block => "Block",
            FileType::Unused => "Unused",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        [
            FileType::Generic,
            FileType::Audio,
            FileType::Video,
            FileType::Block,
            FileType::Unused,
        ]
        .into_iter()
        .find(|ft| ft.as_str().eq_ignore_ascii_case(trimmed))
        .ok_or_else(|| format!("unknown file type: {trimmed}"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    #[serde(rename = "CRC32")]
    Crc32,
    #[default]
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA1")]
    Sha1,
    #[serde(rename = "SHA256")]
    Sha256,
}

impl DigestAlgorithm {
    pub fn digest_len(&self) -> usize {
        match self {
            DigestAlgorithm::Crc32 => 4,
            DigestAlgorithm::Md5 => 16,
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
        }
    }
}

/// Incremental patch metadata for an audio bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioPatchInfo {
    #[serde(with = "hex_bytes")]
    pub old_digest: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub new_digest: Vec<u8>,
    pub patch_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockPatchPair {
    /// Hash string naming the old block file on disk (`<old_hash_str>.<ext>`).
    pub old_hash_str: String,
    #[serde(with = "hex_bytes")]
    pub old_hash: Vec<u8>,
    pub patch_hash_str: String,
    pub patch_size: u64,
    #[serde(default)]
    pub old_version: Vec<u32>,
}

impl BlockPatchPair {
    pub fn version_label(&self) -> String {
        self.old_version
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BlockPatchInfo {
    pub pairs: Vec<BlockPatchPair>,
}

/// One manifest entry plus the flags mutated while it is checked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetRecord {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub file_type: FileType,
    #[serde(default, with = "hex_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_patch: Option<AudioPatchInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_patch: Option<BlockPatchInfo>,
    #[serde(default)]
    pub used: bool,
    #[serde(default)]
    pub patch_applicable: bool,
    #[serde(default)]
    pub block_needs_repair: bool,
}

impl AssetRecord {
    pub fn new(name: impl Into<String>, size: u64, file_type: FileType, checksum: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size,
            file_type,
            checksum: Some(checksum),
            audio_patch: None,
            block_patch: None,
            used: false,
            patch_applicable: false,
            block_needs_repair: false,
        }
    }

    /// Record synthesized for a file found on disk but absent from the manifest.
    pub fn unused(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            file_type: FileType::Unused,
            checksum: None,
            audio_patch: None,
            block_patch: None,
            used: false,
            patch_applicable: false,
            block_needs_repair: false,
        }
    }

    pub fn with_audio_patch(mut self, patch: AudioPatchInfo) -> Self {
        self.audio_patch = Some(patch);
        self
    }

    pub fn with_block_patch(mut self, patch: BlockPatchInfo) -> Self {
        self.block_patch = Some(patch);
        self
    }

    pub fn checksum_hex(&self) -> String {
        self.checksum.as_deref().map(hex::encode).unwrap_or_default()
    }

    /// File name component of the manifest name, accepting either separator.
    pub fn file_name(&self) -> &str {
        self.name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.name.as_str())
    }

    /// Directory component of the manifest name, empty for top-level files.
    pub fn directory(&self) -> &str {
        match self.name.rfind(['/', '\\']) {
            Some(idx) => &self.name[..idx],
            None => "",
        }
    }
}

/// Category shown next to a finding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RepairAssetType {
    Generic,
    Audio,
    AudioUpdate,
    Video,
    Block,
    BlockUpdate,
    Unused,
}

impl fmt::Display for RepairAssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RepairAssetType::Generic => "Generic",
            RepairAssetType::Audio => "Audio",
            RepairAssetType::AudioUpdate => "AudioUpdate",
            RepairAssetType::Video => "Video",
            RepairAssetType::Block => "Block",
            RepairAssetType::BlockUpdate => "BlockUpdate",
            RepairAssetType::Unused => "Unused",
        };
        f.write_str(label)
    }
}

/// A UI-facing description of one broken, patchable or unused asset.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AssetFinding {
    pub name: String,
    pub category: RepairAssetType,
    pub directory: String,
    pub size: u64,
    #[serde(with = "hex_bytes_opt")]
    pub local_digest: Option<Vec<u8>>,
    #[serde(with = "hex_bytes_opt")]
    pub expected_digest: Option<Vec<u8>>,
}

impl AssetFinding {
    pub fn for_record(record: &AssetRecord, category: RepairAssetType, size: u64) -> Self {
        Self {
            name: record.file_name().to_string(),
            category,
            directory: record.directory().to_string(),
            size,
            local_digest: None,
            expected_digest: record.checksum.clone(),
        }
    }

    pub fn with_local_digest(mut self, digest: Option<Vec<u8>>) -> Self {
        self.local_digest = digest;
        self
    }

    pub fn with_expected_digest(mut self, digest: Option<Vec<u8>>) -> Self {
        self.expected_digest = digest;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub checked: usize,
    pub skipped: usize,
    pub broken: usize,
    pub unused: usize,
    pub patch_applicable: usize,
    pub bytes_found: u64,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim()).map_err(serde::de::Error::custom)
    }
}

mod hex_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        match s {
            Some(s) if !s.trim().is_empty() => hex::decode(s.trim())
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}
