mod common;

use std::fs;
use std::path::Path;

use common::*;
use pathmod_core::save::{has_real_save, MigrationPath, SaveBridge, SaveSetup};
use pathmod_core::PatchError;

struct Stores {
    _dir: tempfile::TempDir,
    saves: JsonSaves,
    sentinel: std::path::PathBuf,
}

fn stores(fail_export: bool) -> Stores {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    Stores {
        saves: JsonSaves {
            original: root.join("pokePathTD_Electron/Local Storage/leveldb"),
            modified: root.join("pokePathTD_Electron_modded/Local Storage/leveldb"),
            transfer: root.join("current_save.json"),
            fail_export,
        },
        sentinel: root.join(".modded"),
        _dir: dir,
    }
}

fn seed_progress(store: &Path) {
    fs::create_dir_all(store).unwrap();
    fs::write(store.join("000003.log"), "wal").unwrap();
    fs::write(store.join("000005.ldb"), "player:gold=1200").unwrap();
    fs::write(store.join("MANIFEST-000004"), "manifest").unwrap();
}

fn bridge<'a>(s: &'a Stores, probe: &'a Probe) -> SaveBridge<'a> {
    SaveBridge {
        original_store: s.saves.original.clone(),
        modified_store: s.saves.modified.clone(),
        sentinel: s.sentinel.clone(),
        executable: "pokePathTD_Electron.exe".into(),
        helper: &s.saves,
        probe,
    }
}

#[test]
fn progress_is_migrated_once() {
    let s = stores(false);
    seed_progress(&s.saves.original);
    fs::create_dir_all(&s.saves.modified).unwrap();
    fs::write(s.saves.modified.join("LOG"), "").unwrap();
    let probe = Probe(false);

    let first = bridge(&s, &probe).setup_modified_save().unwrap();
    assert_eq!(first, SaveSetup::Migrated(MigrationPath::Api));
    assert!(has_real_save(&s.saves.modified));
    assert_eq!(
        fs::read_to_string(s.saves.modified.join("000005.ldb")).unwrap(),
        "player:gold=1200"
    );
    assert_eq!(fs::read_to_string(&s.sentinel).unwrap(), "modded");
    assert!(!s.saves.transfer.exists());

    let before = snapshot(&s.saves.modified);
    let second = bridge(&s, &probe).setup_modified_save().unwrap();
    assert_eq!(second, SaveSetup::AlreadyPresent);
    assert_eq!(second.to_string(), "modified save already exists");
    assert_eq!(snapshot(&s.saves.modified), before);
}

#[test]
fn helper_failure_falls_back_to_copy() {
    let s = stores(true);
    seed_progress(&s.saves.original);
    let probe = Probe(false);

    match bridge(&s, &probe).setup_modified_save().unwrap() {
        SaveSetup::Migrated(MigrationPath::RawCopy { helper_error }) => {
            assert!(helper_error.contains("LEVEL_LOCKED"))
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(snapshot(&s.saves.modified), snapshot(&s.saves.original));
    assert!(s.sentinel.exists());
}

#[test]
fn fresh_install_just_creates_the_store() {
    let s = stores(false);
    let probe = Probe(false);
    assert_eq!(
        bridge(&s, &probe).setup_modified_save().unwrap(),
        SaveSetup::FreshInstall
    );
    assert!(s.saves.modified.is_dir());
    assert!(s.sentinel.exists());
}

#[test]
fn running_game_blocks_migration() {
    let s = stores(false);
    seed_progress(&s.saves.original);
    let probe = Probe(true);
    assert!(matches!(
        bridge(&s, &probe).setup_modified_save(),
        Err(PatchError::GameRunning)
    ));
    assert!(!s.saves.modified.exists());
    assert!(!s.sentinel.exists());
}

#[test]
fn blocked_modified_store_reports_io_errors() {
    let s = stores(false);
    seed_progress(&s.saves.original);
    let variant_root = s.saves.modified.parent().unwrap().parent().unwrap();
    fs::write(variant_root, "not a folder").unwrap();
    let probe = Probe(false);

    match bridge(&s, &probe).setup_modified_save() {
        Err(PatchError::SaveMigration { helper, .. }) => {
            assert!(helper.starts_with("IO error"), "{helper}");
        }
        other => panic!("expected migration failure, got {other:?}"),
    }
    assert!(!s.sentinel.exists());
}
