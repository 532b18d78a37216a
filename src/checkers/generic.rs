use tracing::warn;

use super::{CheckContext, local_length};
use crate::checksum::digests_match;
use crate::error::Result;
use crate::types::{AssetFinding, AssetRecord, FileType, RepairAssetType};

fn category(record: &AssetRecord) -> RepairAssetType {
    match record.file_type {
        FileType::Unused => RepairAssetType::Unused,
        FileType::Audio => RepairAssetType::Audio,
        _ => RepairAssetType::Generic,
    }
}

/// Missing or wrong-sized files are broken; otherwise the digest decides
/// unless fast mode trusts the size.
pub fn check(record: &mut AssetRecord, ctx: &CheckContext<'_>) -> Result<()> {
    ctx.progress.begin_file(&record.name, record.size);
    let path = ctx.path_for(&record.name);
    let local_len = local_length(&path)?;

    if local_len != Some(record.size) {
        ctx.progress.complete_unhashed(record.size);
        match local_len {
            None => warn!("File [T: {}]: {} is not found", record.file_type, record.name),
            Some(len) => warn!(
                "File [T: {}]: {} has unmatched size (expected {}, got {len})",
                record.file_type, record.name, record.size
            ),
        }
        let finding = AssetFinding::for_record(record, category(record), record.size);
        ctx.report(record, finding, record.size);
        return Ok(());
    }

    if ctx.config.fast_mode {
        ctx.progress.complete_unhashed(record.size);
        return Ok(());
    }

    let local = ctx.hash(&path)?;
    if !digests_match(&local, record.checksum.as_deref()) {
        warn!(
            "File [T: {}]: {} is broken! Index CRC: {} <--> File CRC: {}",
            record.file_type,
            record.name,
            record.checksum_hex(),
            hex::encode(&local)
        );
        let finding = AssetFinding::for_record(record, category(record), record.size)
            .with_local_digest(Some(local));
        ctx.report(record, finding, record.size);
    }
    Ok(())
}
