use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::tempdir;

use crate::{parse_idx_line, read_index, resolve_shard_path, IdxEntry, LocMap};

#[test]
fn parses_well_formed_entries() {
    let entry = parse_idx_line("com,example)/ 20230101000000\tarch-01\t186\t193\t1\n").unwrap();
    assert_eq!(
        entry,
        IdxEntry {
            first_key: "com,example)/ 20230101000000".to_string(),
            shard_name: "arch-01".to_string(),
            offset: 186,
            length: 193,
            shard_num: 1,
        }
    );
}

#[test]
fn format_round_trips() {
    let entry = IdxEntry {
        first_key: "com,example)/ 20230101000000".to_string(),
        shard_name: "arch".to_string(),
        offset: 0,
        length: 57,
        shard_num: 1,
    };
    assert_eq!(parse_idx_line(&entry.format()), Some(entry));
}

#[test]
fn skips_blanks_comments_and_short_lines() {
    assert!(parse_idx_line("").is_none());
    assert!(parse_idx_line("# comment").is_none());
    assert!(parse_idx_line("key\tshard\t10").is_none());
    assert!(parse_idx_line("key\tshard\tnot-a-number\t5\t1").is_none());
}

#[test]
fn read_index_collects_entries_in_order() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.idx");
    fs::write(
        &path,
        "# header comment\n\
         a)/ 20230101000000\tarch\t0\t10\t1\n\
         \n\
         b)/ 20230101000000\tarch\t10\t12\t1\n",
    )?;

    let entries = read_index(path.to_str().unwrap())?;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].offset, 0);
    assert_eq!(entries[1].offset, 10);
    Ok(())
}

#[test]
fn shard_resolution_prefers_loc_entries() -> Result<()> {
    let dir = tempdir()?;
    let loc_path = dir.path().join("arch.loc");
    fs::write(&loc_path, "arch-01\tdata/arch-01.cdx.gz\narch-02\t/abs/arch-02.cdx.gz\n")?;
    let loc = LocMap::load(&loc_path)?;

    let base = Path::new("/idx");
    assert_eq!(
        resolve_shard_path("arch-01", base, Some(&loc)),
        Path::new("/idx/data/arch-01.cdx.gz")
    );
    assert_eq!(
        resolve_shard_path("arch-02", base, Some(&loc)),
        Path::new("/abs/arch-02.cdx.gz")
    );
    // Not in the map: directory convention.
    assert_eq!(
        resolve_shard_path("arch-03", base, Some(&loc)),
        Path::new("/idx/arch-03.cdx.gz")
    );
    assert_eq!(
        resolve_shard_path("arch-03", base, None),
        Path::new("/idx/arch-03.cdx.gz")
    );
    Ok(())
}

#[test]
fn loc_lookup_next_to_index() -> Result<()> {
    let dir = tempdir()?;
    let idx = dir.path().join("arch.idx");
    fs::write(&idx, "")?;
    assert!(LocMap::find_for_index(&idx).is_none());

    fs::write(dir.path().join("arch.loc"), "arch\tarch.cdx.gz\n")?;
    assert_eq!(
        LocMap::find_for_index(&idx),
        Some(dir.path().join("arch.loc"))
    );
    Ok(())
}
