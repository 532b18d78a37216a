use std::fs;
use std::path::Path;

use assetcheck::cancel::CancelToken;
use assetcheck::catalog::Catalog;
use assetcheck::config::Config;
use assetcheck::findings::FindingCollector;
use assetcheck::orphans::scan_unused;
use assetcheck::types::{AssetRecord, FileType, RepairAssetType};
use assetcheck::verify;

fn write(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn stray_file_is_reported_once_with_its_disk_size() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "BH3_Data/known.bin", b"known");
    write(dir.path(), "BH3_Data/Sub/stray.bin", b"0123456789");
    write(dir.path(), "BH3_Data/output.log", b"log line");
    write(dir.path(), "Video/intro.usm", b"movie");
    write(dir.path(), "d3dcompiler_47.dll", b"dll");

    let records = vec![AssetRecord::new("BH3_Data/known.bin", 5, FileType::Generic, vec![])];
    let config = Config::for_install(dir.path());
    let catalog = Catalog::build(&records, &config);

    let unused = scan_unused(&catalog, &config, &CancelToken::new()).unwrap();

    assert_eq!(unused.len(), 1);
    assert_eq!(unused[0].name, "BH3_Data/Sub/stray.bin");
    assert_eq!(unused[0].size, 10);
    assert_eq!(unused[0].file_type, FileType::Unused);
    assert!(unused[0].checksum.is_none());
}

#[test]
fn catalog_match_ignores_case() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "bh3_data/KNOWN.BIN", b"known");
    let records = vec![AssetRecord::new("BH3_Data\\known.bin", 5, FileType::Generic, vec![])];
    let config = Config::for_install(dir.path());
    let catalog = Catalog::build(&records, &config);

    let unused = scan_unused(&catalog, &config, &CancelToken::new()).unwrap();
    assert!(unused.is_empty());
}

#[test]
fn sidecar_entries_are_never_reported() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "@IgnoredFiles", b"mods/custom.pak\n");
    write(dir.path(), "mods/custom.pak", b"mod");
    write(dir.path(), "mods/other.pak", b"other mod");
    let config = Config::for_install(dir.path());
    let catalog = Catalog::build(&[], &config);

    let unused = scan_unused(&catalog, &config, &CancelToken::new()).unwrap();

    let names: Vec<_> = unused.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["mods/other.pak"]);
}

#[test]
fn main_package_only_skips_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "stray_one.bin", b"1");
    write(dir.path(), "nested/stray_two.bin", b"22");
    let config = Config {
        main_package_only: true,
        ..Config::for_install(dir.path())
    };
    let collector = FindingCollector::new();
    let mut manifest = Vec::new();

    let summary = verify(config, &collector, &mut manifest).unwrap();

    assert_eq!(summary.unused, 0);
    assert!(manifest.is_empty());
    assert!(collector.into_inner().is_empty());
}

#[test]
fn unused_findings_count_but_carry_no_found_size() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "stray.bin", b"0123456789");
    let collector = FindingCollector::new();
    let mut manifest = Vec::new();

    let summary = verify(Config::for_install(dir.path()), &collector, &mut manifest).unwrap();

    assert_eq!(summary.unused, 1);
    assert_eq!(summary.broken, 0);
    assert_eq!(summary.bytes_found, 0);
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0].file_type, FileType::Unused);
    let findings = collector.into_inner();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].category, RepairAssetType::Unused);
    assert_eq!(findings[0].size, 10);
}
