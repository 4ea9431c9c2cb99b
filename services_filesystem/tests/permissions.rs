//! Permission enforcement tests
//!
//! Every operation is checked against the owner/group/other triple of its
//! target, one class per check, with the superuser flag applied uniformly.

use core_types::Identity;
use fs_tree::FileKind;
use hal::ManualClock;
use services_filesystem::{EngineConfig, FileSystemOperations, FilesystemEngine, OperationError};

fn engine_with_bypass(superuser_bypass: bool) -> FilesystemEngine {
    let config = EngineConfig {
        superuser_bypass,
        ..EngineConfig::default()
    };
    FilesystemEngine::with_clock(config, ManualClock::new(0)).unwrap()
}

fn engine() -> FilesystemEngine {
    engine_with_bypass(false)
}

fn denied(name: &str) -> OperationError {
    OperationError::PermissionDenied(name.to_string())
}

#[test]
fn test_other_user_needs_other_bits() {
    let mut fs = engine();
    fs.write_file("secret", b"classified").unwrap();
    fs.change_mode("secret", 700).unwrap();

    fs.set_identity(2, Some(2));
    assert_eq!(fs.read_file("secret"), Err(denied("secret")));

    // Only the owner may change the mode
    assert_eq!(fs.change_mode("secret", 707), Err(denied("secret")));

    fs.set_identity(1, Some(1));
    fs.change_mode("secret", 707).unwrap();

    fs.set_identity(2, Some(2));
    assert_eq!(fs.read_file("secret").unwrap(), b"classified".to_vec());
}

#[test]
fn test_group_class_applies_to_group_members() {
    let mut fs = engine();
    fs.write_file("shared", b"team notes").unwrap();
    fs.change_mode("shared", 640).unwrap();

    fs.set_identity(3, Some(1));
    assert_eq!(fs.read_file("shared").unwrap(), b"team notes".to_vec());
    assert_eq!(fs.write_file("shared", b"edit"), Err(denied("shared")));

    fs.set_identity(3, Some(9));
    assert_eq!(fs.read_file("shared"), Err(denied("shared")));
}

#[test]
fn test_only_one_class_is_consulted() {
    let mut fs = engine();
    fs.write_file("f", b"data").unwrap();
    fs.change_mode("f", 77).unwrap();

    // Owner bits are 0 even though group and other allow everything
    assert_eq!(fs.read_file("f"), Err(denied("f")));

    fs.set_identity(5, Some(5));
    assert_eq!(fs.read_file("f").unwrap(), b"data".to_vec());
}

#[test]
fn test_superuser_is_ordinary_without_bypass() {
    let mut fs = engine();
    fs.write_file("f", b"data").unwrap();
    fs.change_mode("f", 0).unwrap();

    fs.set_identity(0, Some(0));
    assert_eq!(fs.read_file("f"), Err(denied("f")));
    assert_eq!(fs.write_file("f", b"x"), Err(denied("f")));
    assert_eq!(fs.change_mode("f", 644), Err(denied("f")));
}

#[test]
fn test_superuser_bypass_applies_everywhere() {
    let mut fs = engine_with_bypass(true);
    fs.create_directory("locked").unwrap();
    fs.write_file("locked/f", b"data").unwrap();
    fs.change_mode("locked/f", 0).unwrap();
    fs.change_mode("locked", 0).unwrap();

    fs.set_identity(0, Some(0));
    assert_eq!(fs.read_file("locked/f").unwrap(), b"data".to_vec());
    fs.write_file("locked/f", b"root was here").unwrap();
    fs.execute("locked/f").unwrap();
    fs.change_directory("locked").unwrap();
    assert_eq!(fs.list_directory().unwrap().len(), 1);
    fs.change_mode("f", 600).unwrap();
    fs.remove("f", false).unwrap();

    // Other users are still held to the bits
    fs.change_directory("/").unwrap();
    fs.set_identity(4, Some(0));
    assert_eq!(fs.change_directory("locked"), Err(denied("locked")));
}

#[test]
fn test_create_in_read_only_directory() {
    let mut fs = engine();
    fs.create_directory("ro").unwrap();
    fs.change_mode("ro", 555).unwrap();

    let before = fs.usage();
    assert_eq!(fs.create_file("ro/x", FileKind::Text), Err(denied("ro")));
    assert_eq!(fs.create_directory("ro/d"), Err(denied("ro")));
    assert_eq!(fs.write_file("ro/y", b"data"), Err(denied("ro")));
    assert_eq!(fs.usage(), before);
    assert_eq!(fs.tree().len(), 2);
}

#[test]
fn test_traversal_requires_execute() {
    let mut fs = engine();
    fs.create_directory("dir").unwrap();
    fs.write_file("dir/f", b"data").unwrap();
    fs.change_mode("dir", 600).unwrap();

    assert_eq!(fs.read_file("dir/f"), Err(denied("dir")));
    assert_eq!(fs.file_status("dir/f"), Err(denied("dir")));
    assert_eq!(fs.change_directory("dir"), Err(denied("dir")));
    assert_eq!(fs.current_path(), "/");

    // The directory itself can still be inspected from its parent
    assert_eq!(fs.file_status("dir").unwrap().mode, 600);
}

#[test]
fn test_ascending_requires_execute_on_parent() {
    let mut fs = engine();
    fs.create_directory("a").unwrap();
    fs.create_directory("a/b").unwrap();

    fs.set_identity(2, Some(2));
    fs.change_directory("a/b").unwrap();

    // The owner closes a while user 2 sits below it
    fs.set_identity(1, Some(1));
    fs.change_mode("/a", 700).unwrap();

    fs.set_identity(2, Some(2));
    assert_eq!(fs.change_directory(".."), Err(denied("a")));
    assert_eq!(fs.change_directory("/a"), Err(denied("a")));
    assert_eq!(fs.current_path(), "/a/b");

    // An absolute path to root needs no check
    fs.change_directory("/").unwrap();
    assert_eq!(fs.current_path(), "/");
}

#[test]
fn test_list_requires_read() {
    let mut fs = engine();
    fs.create_directory("d").unwrap();
    fs.change_directory("d").unwrap();
    fs.change_mode("/d", 311).unwrap();

    assert_eq!(fs.list_directory(), Err(denied("d")));
}

#[test]
fn test_execute_rules() {
    let mut fs = engine();
    fs.create_file("run", FileKind::Program).unwrap();
    fs.create_directory("bin").unwrap();

    assert_eq!(fs.execute("run"), Err(denied("run")));
    fs.change_mode("run", 755).unwrap();
    fs.execute("run").unwrap();

    assert_eq!(
        fs.execute("bin"),
        Err(OperationError::IsADirectory("bin".to_string()))
    );
    assert!(matches!(fs.execute("missing"), Err(OperationError::NotFound(_))));
}

#[test]
fn test_remove_needs_write_on_directory() {
    let mut fs = engine();
    fs.create_directory("d").unwrap();
    fs.write_file("d/f", b"data").unwrap();
    fs.change_mode("d", 555).unwrap();

    let before = fs.usage();
    assert_eq!(fs.remove("d/f", false), Err(denied("d")));
    assert_eq!(fs.usage(), before);
    assert_eq!(fs.read_file("d/f").unwrap(), b"data".to_vec());
}

#[test]
fn test_remove_file_needs_write_on_file() {
    let mut fs = engine();
    fs.write_file("f", b"data").unwrap();
    fs.change_mode("f", 444).unwrap();

    assert_eq!(fs.remove("f", false), Err(denied("f")));
    fs.change_mode("f", 644).unwrap();
    fs.remove("f", false).unwrap();
}

#[test]
fn test_rename_needs_write_on_entry() {
    let mut fs = engine();
    fs.write_file("f", b"data").unwrap();
    fs.change_mode("f", 444).unwrap();

    assert_eq!(fs.rename("f", "g"), Err(denied("f")));
    assert!(fs.file_status("f").is_ok());
}

#[test]
fn test_stat_needs_no_permission() {
    let mut fs = engine();
    fs.write_file("f", b"data").unwrap();
    fs.change_mode("f", 0).unwrap();

    fs.set_identity(9, Some(9));
    let stat = fs.file_status("f").unwrap();
    assert_eq!(stat.permissions, "---------");
    assert_eq!(stat.size, 4);
}

#[test]
fn test_copy_needs_read_on_source() {
    let mut fs = engine();
    fs.write_file("f", b"data").unwrap();
    fs.change_mode("f", 200).unwrap();

    let before = fs.usage();
    assert_eq!(fs.copy("f", "g"), Err(denied("f")));
    assert_eq!(fs.usage(), before);
}

#[test]
fn test_new_entries_belong_to_current_identity() {
    let mut fs = engine();
    fs.create_directory("pub").unwrap();
    fs.change_mode("pub", 777).unwrap();

    fs.set_identity(6, Some(8));
    assert_eq!(fs.current_identity(), Identity::new(6, 8));
    fs.write_file("pub/mine", b"x").unwrap();

    let stat = fs.file_status("pub/mine").unwrap();
    assert_eq!(stat.uid.0, 6);
    assert_eq!(stat.gid.0, 8);
    assert_eq!(stat.mode, 644);
}
