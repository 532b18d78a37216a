use std::path::PathBuf;

use tracing::{debug, warn};

use super::{CheckContext, local_length};
use crate::checksum::digests_match;
use crate::error::Result;
use crate::types::{AssetFinding, AssetRecord, BlockPatchPair, RepairAssetType};

/// Find the first patch pair whose old block is still on disk.
///
/// When one is found and it names a patch, the record's pair list is pruned
/// down to that pair so later stages only ever see the linked one.
fn link_old_block(record: &mut AssetRecord, ctx: &CheckContext<'_>) -> Option<(PathBuf, BlockPatchPair)> {
    let patch = record.block_patch.as_mut()?;
    let ext = ctx.config.block_extension.trim_start_matches('.');
    let (path, pair) = patch.pairs.iter().find_map(|pair| {
        let path = ctx.block_dir.join(format!("{}.{ext}", pair.old_hash_str));
        path.is_file().then(|| (path, pair.clone()))
    })?;
    if pair.patch_hash_str.is_empty() {
        return None;
    }
    patch.pairs = vec![pair.clone()];
    Some((path, pair))
}

/// Block assets prefer an incremental patch from a surviving old block over
/// a full download of the current one.
pub fn check(record: &mut AssetRecord, ctx: &CheckContext<'_>) -> Result<()> {
    ctx.progress.begin_file(&record.name, record.size);
    let path = ctx.path_for(&record.name);
    let linked = link_old_block(record, ctx);
    let local_len = local_length(&path)?;

    if local_len.is_none() {
        if let Some((old_path, pair)) = linked {
            let old_digest = ctx.hash_companion(&old_path)?;
            if old_digest == pair.old_hash {
                ctx.progress.complete_unhashed(record.size);
                record.patch_applicable = true;
                warn!(
                    "File [T: {}]: {} has an update! Orig CRC: {} <--> New CRC: {}",
                    record.file_type,
                    record.name,
                    hex::encode(&old_digest),
                    record.checksum_hex()
                );
                let mut finding =
                    AssetFinding::for_record(record, RepairAssetType::BlockUpdate, pair.patch_size)
                        .with_local_digest(Some(old_digest));
                finding.directory = format!("{} (MetaVer: {})", finding.directory, pair.version_label());
                ctx.report(record, finding, pair.patch_size);
                return Ok(());
            }
            debug!(
                "old block {} does not match its recorded digest",
                old_path.display()
            );
        }
    }

    if local_len != Some(record.size) {
        ctx.progress.complete_unhashed(record.size);
        match local_len {
            None => warn!("File [T: {}]: {} is not found", record.file_type, record.name),
            Some(len) => warn!(
                "File [T: {}]: {} has unmatched size (expected {}, got {len})",
                record.file_type, record.name, record.size
            ),
        }
        let finding = AssetFinding::for_record(record, RepairAssetType::Block, record.size)
            .with_expected_digest(None);
        ctx.report(record, finding, record.size);
        return Ok(());
    }

    if ctx.config.fast_mode {
        ctx.progress.complete_unhashed(record.size);
        return Ok(());
    }

    let local = ctx.hash(&path)?;
    if !digests_match(&local, record.checksum.as_deref()) {
        record.block_needs_repair = true;
        warn!(
            "File [T: {}]: {} is broken! Index CRC: {} <--> File CRC: {}",
            record.file_type,
            record.name,
            record.checksum_hex(),
            hex::encode(&local)
        );
        let finding = AssetFinding::for_record(record, RepairAssetType::Block, record.size)
            .with_local_digest(Some(local));
        ctx.report(record, finding, record.size);
    }
    Ok(())
}
