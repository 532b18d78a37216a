use tracing::warn;

use super::{CheckContext, local_length};
use crate::checksum::digests_match;
use crate::error::Result;
use crate::types::{AssetFinding, AssetRecord, RepairAssetType};

/// Like the generic check, but a local file matching the patch's old digest
/// can be updated with the audio patch instead of a full download.
///
/// A size mismatch is forgiven when a patch exists.
pub fn check(record: &mut AssetRecord, ctx: &CheckContext<'_>) -> Result<()> {
    ctx.progress.begin_file(&record.name, record.size);
    let path = ctx.path_for(&record.name);
    let has_patch = record.audio_patch.is_some();

    let local_len = match local_length(&path)? {
        Some(len) if len == record.size || has_patch => len,
        other => {
            ctx.progress.complete_unhashed(record.size);
            match other {
                None => warn!(
                    "File [T: {}]: {} is not found locally",
                    record.file_type, record.name
                ),
                Some(len) => warn!(
                    "File [T: {}]: {} has unmatched size (expected {}, got {len})",
                    record.file_type, record.name, record.size
                ),
            }
            let finding = AssetFinding::for_record(record, RepairAssetType::Audio, record.size);
            ctx.report(record, finding, record.size);
            return Ok(());
        }
    };

    if ctx.config.fast_mode {
        if has_patch && local_len == record.size {
            record.patch_applicable = true;
        }
        ctx.progress.complete_unhashed(record.size);
        return Ok(());
    }

    let local = ctx.hash(&path)?;
    ctx.progress
        .adjust_size_current(record.size as i64 - local_len as i64);

    if let Some(patch) = &record.audio_patch {
        if local == patch.old_digest {
            record.patch_applicable = true;
        }
    }

    if digests_match(&local, record.checksum.as_deref()) {
        return Ok(());
    }

    let finding = match (&record.audio_patch, record.patch_applicable) {
        (Some(patch), true) => {
            warn!(
                "File [T: {}]: {} has an update and patch applicable",
                record.file_type, record.name
            );
            AssetFinding::for_record(record, RepairAssetType::AudioUpdate, patch.patch_size)
                .with_expected_digest(Some(patch.new_digest.clone()))
        }
        _ => {
            warn!(
                "File [T: {}]: {} is broken! Index CRC: {} <--> File CRC: {}",
                record.file_type,
                record.name,
                record.checksum_hex(),
                hex::encode(&local)
            );
            AssetFinding::for_record(record, RepairAssetType::Audio, record.size)
        }
    }
    .with_local_digest(Some(local));
    let found_size = finding.size;
    ctx.report(record, finding, found_size);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::checkers::test_support::{Harness, md5};
    use crate::types::{AssetRecord, AudioPatchInfo, FileType, RepairAssetType};

    fn patched(name: &str, size: u64, current: &[u8], old: &[u8]) -> AssetRecord {
        AssetRecord::new(name, size, FileType::Audio, md5(current)).with_audio_patch(
            AudioPatchInfo {
                old_digest: md5(old),
                new_digest: md5(current),
                patch_size: 12,
            },
        )
    }

    #[test]
    fn old_bank_is_reported_as_patchable_with_patch_size() {
        let h = Harness::new();
        h.write("Audio/bank.pck", b"old bank bytes");
        let mut record = patched("Audio/bank.pck", 400, b"new bank", b"old bank bytes");
        h.run(&mut record).unwrap();

        let broken = h.broken();
        assert_eq!(broken.len(), 1);
        assert!(broken[0].patch_applicable);
        let finding = &h.sink.snapshot()[0];
        assert_eq!(finding.category, RepairAssetType::AudioUpdate);
        assert_eq!(finding.size, 12);
        assert_eq!(finding.expected_digest, Some(md5(b"new bank")));
        assert_eq!(h.progress.snapshot().size_found, 12);
    }

    #[test]
    fn size_mismatch_without_patch_is_broken() {
        let h = Harness::new();
        h.write("bank.pck", b"abc");
        let mut record = AssetRecord::new("bank.pck", 4, FileType::Audio, md5(b"abcd"));
        h.run(&mut record).unwrap();
        assert_eq!(h.broken().len(), 1);
        assert!(!h.broken()[0].patch_applicable);
    }

    #[test]
    fn unknown_content_with_patch_is_broken_at_full_size() {
        let h = Harness::new();
        h.write("bank.pck", b"something else");
        let mut record = patched("bank.pck", 99, b"new bank", b"old bank");
        h.run(&mut record).unwrap();
        let finding = &h.sink.snapshot()[0];
        assert_eq!(finding.category, RepairAssetType::Audio);
        assert_eq!(finding.size, 99);
        assert!(!h.broken()[0].patch_applicable);
    }

    #[test]
    fn current_bank_is_clean() {
        let h = Harness::new();
        h.write("bank.pck", b"new bank");
        let mut record = patched("bank.pck", 8, b"new bank", b"old bank");
        h.run(&mut record).unwrap();
        assert!(h.broken().is_empty());
        assert!(!record.patch_applicable);
    }

    #[test]
    fn fast_mode_flags_patch_on_matching_size_without_reporting() {
        let h = Harness::new().fast();
        h.write("bank.pck", b"12345678");
        let mut record = patched("bank.pck", 8, b"new bank", b"old bank");
        h.run(&mut record).unwrap();
        assert!(record.patch_applicable);
        assert!(h.broken().is_empty());
    }
}
