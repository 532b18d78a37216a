use tracing::warn;

use super::{CheckContext, local_length};
use crate::error::Result;
use crate::types::{AssetFinding, AssetRecord, RepairAssetType};

/// Existence only; video content is never hashed.
pub fn check(record: &mut AssetRecord, ctx: &CheckContext<'_>) -> Result<()> {
    ctx.progress.begin_file(&record.name, record.size);
    let path = ctx.path_for(&record.name);
    let present = local_length(&path)?.is_some();
    ctx.progress.complete_unhashed(record.size);

    if !present {
        warn!("File [T: {}]: {} is not found", record.file_type, record.name);
        let finding = AssetFinding::for_record(record, RepairAssetType::Video, record.size);
        ctx.report(record, finding, record.size);
    }
    Ok(())
}
