use super::*;
use crate::data::build_install_extension_command;
use crate::package::{effective_root, read_package_version};
use codepin_core::{CodepinError, ErrorKind};
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::atomic::{AtomicU64, Ordering};

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "codepin-installer-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::create_dir_all(&path).expect("must create test root");
    path
}

fn install_spec() -> InstallSpec {
    InstallSpec {
        executable_name: "Code.exe".to_string(),
        metadata_path: "resources/app/package.json".to_string(),
    }
}

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .expect("must start entry");
        writer.write_all(contents).expect("must write entry");
    }
    let bytes = writer.finish().expect("must finish zip").into_inner();
    fs::write(path, bytes).expect("must write zip");
}

fn editor_archive(root: &Path, version: &str, wrapper: Option<&str>) -> PathBuf {
    let prefix = wrapper.map(|w| format!("{w}/")).unwrap_or_default();
    let metadata = format!("{{\"name\":\"code-oss-dev\",\"version\":\"{version}\"}}");
    let executable = format!("{prefix}Code.exe");
    let package_json = format!("{prefix}resources/app/package.json");
    let main_js = format!("{prefix}resources/app/out/main.js");
    let entries: [(&str, &[u8]); 3] = [
        (executable.as_str(), b"MZ"),
        (package_json.as_str(), metadata.as_bytes()),
        (main_js.as_str(), b"// main"),
    ];
    let archive = root.join(format!("editor-{version}.zip"));
    write_zip(&archive, &entries);
    archive
}

fn assert_trees_equal(left: &Path, right: &Path) {
    let mut left_entries: Vec<_> = fs::read_dir(left)
        .expect("must read left")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    let mut right_entries: Vec<_> = fs::read_dir(right)
        .expect("must read right")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    left_entries.sort();
    right_entries.sort();
    assert_eq!(left_entries, right_entries, "entries differ under {}", left.display());

    for name in left_entries {
        let left_path = left.join(&name);
        let right_path = right.join(&name);
        if left_path.is_dir() {
            assert_trees_equal(&left_path, &right_path);
        } else {
            assert_eq!(
                fs::read(&left_path).expect("must read"),
                fs::read(&right_path).expect("must read"),
                "contents differ for {}",
                left_path.display()
            );
        }
    }
}

#[cfg(unix)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}

fn fake_output(code: i32, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

#[test]
fn pointer_round_trip_leaves_no_tmp_sibling() {
    let root = test_root();
    let pointer = root.join("current.txt");

    write_current_version(&pointer, "1.107.1").expect("must write pointer");
    assert_eq!(
        read_current_version(&pointer).expect("must read").as_deref(),
        Some("1.107.1")
    );
    assert_eq!(fs::read(&pointer).expect("must read raw"), b"1.107.1");
    assert!(!root.join("current.txt.tmp").exists());

    write_current_version(&pointer, "1.108.0").expect("must overwrite pointer");
    assert_eq!(
        read_current_version(&pointer).expect("must read").as_deref(),
        Some("1.108.0")
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn pointer_absent_or_blank_is_uninitialised() {
    let root = test_root();
    let pointer = root.join("current.txt");
    assert_eq!(read_current_version(&pointer).expect("absent is ok"), None);

    fs::write(&pointer, "  \n\t\n").expect("must write blank");
    assert_eq!(read_current_version(&pointer).expect("blank is ok"), None);

    fs::write(&pointer, " 1.2.3 \nignored").expect("must write");
    assert_eq!(
        read_current_version(&pointer).expect("must read").as_deref(),
        Some("1.2.3")
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn pointer_ignores_byte_order_mark_and_crlf() {
    let root = test_root();
    let pointer = root.join("current.txt");
    fs::create_dir_all(&root).expect("must create root");

    fs::write(&pointer, "\u{feff}1.107.1\r\n").expect("must write");
    assert_eq!(
        read_current_version(&pointer).expect("must read").as_deref(),
        Some("1.107.1")
    );

    fs::write(&pointer, "\u{feff}\r\n").expect("must write");
    assert_eq!(read_current_version(&pointer).expect("bom only is ok"), None);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_is_idempotent_for_same_archive() {
    let root = test_root();
    let versions = root.join("versions");
    let tmp = root.join("_tmp");
    let archive = editor_archive(&root, "1.107.1", Some("VSCode-win32-x64"));

    let first = install_package(&archive, &versions, &tmp, &install_spec()).expect("first install");
    assert!(first.is_new);
    assert_eq!(first.version, "1.107.1");
    assert_eq!(first.path, versions.join("1.107.1"));
    assert!(first.path.join("Code.exe").is_file());
    assert!(first.path.join("resources/app/out/main.js").is_file());

    let second =
        install_package(&archive, &versions, &tmp, &install_spec()).expect("second install");
    assert!(!second.is_new);
    assert_eq!(second.path, first.path);

    let leftovers: Vec<_> = fs::read_dir(&tmp).expect("must read tmp").collect();
    assert!(leftovers.is_empty(), "extraction dirs must be discarded");
    let staging: Vec<_> = fs::read_dir(&versions)
        .expect("must read versions")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with('.'))
        .collect();
    assert!(staging.is_empty(), "no staging dirs may remain");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_accepts_flat_archive() {
    let root = test_root();
    let versions = root.join("versions");
    let archive = editor_archive(&root, "1.90.0", None);

    let installed = install_package(&archive, &versions, &root.join("_tmp"), &install_spec())
        .expect("must install");
    assert!(installed.is_new);
    assert!(versions.join("1.90.0").join("Code.exe").is_file());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_version_comes_from_metadata_not_archive_name() {
    let root = test_root();
    let versions = root.join("versions");
    let archive = editor_archive(&root, "1.99.3", Some("wrapper"));
    let renamed = root.join("vscode-latest.zip");
    fs::rename(&archive, &renamed).expect("must rename");

    let installed = install_package(&renamed, &versions, &root.join("_tmp"), &install_spec())
        .expect("must install");
    assert_eq!(installed.version, "1.99.3");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_without_executable_is_incomplete_and_leaves_nothing() {
    let root = test_root();
    let versions = root.join("versions");
    let archive = root.join("partial.zip");
    write_zip(
        &archive,
        &[
            ("LICENSE.txt", b"MIT"),
            ("resources/app/package.json", br#"{"version":"1.50.0"}"#),
        ],
    );

    let err = install_package(&archive, &versions, &root.join("_tmp"), &install_spec())
        .expect_err("must reject");
    assert_eq!(err.kind(), ErrorKind::IncompleteInstall);
    assert!(!versions.join("1.50.0").exists());
    let remaining: Vec<_> = fs::read_dir(&versions)
        .map(|entries| entries.filter_map(|entry| entry.ok()).collect())
        .unwrap_or_default();
    assert!(remaining.is_empty(), "staging must be removed");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn wrapped_install_without_executable_is_incomplete() {
    let root = test_root();
    let versions = root.join("versions");
    let tmp = root.join("_tmp");
    let archive = root.join("partial-wrapped.zip");
    write_zip(
        &archive,
        &[("VSCode/resources/app/package.json", br#"{"version":"1.51.0"}"#)],
    );

    let err = install_package(&archive, &versions, &tmp, &install_spec())
        .expect_err("must reject");
    assert_eq!(err.kind(), ErrorKind::IncompleteInstall);
    assert!(!versions.join("1.51.0").exists());
    let remaining: Vec<_> = fs::read_dir(&versions)
        .map(|entries| entries.filter_map(|entry| entry.ok()).collect())
        .unwrap_or_default();
    assert!(remaining.is_empty(), "staging must be removed");
    let leftovers: Vec<_> = fs::read_dir(&tmp).expect("must read tmp").collect();
    assert!(leftovers.is_empty());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_distinguishes_metadata_failures() {
    let root = test_root();
    let versions = root.join("versions");
    let tmp = root.join("_tmp");

    let missing = root.join("missing.zip");
    write_zip(&missing, &[("Code.exe", b"MZ")]);
    let err = install_package(&missing, &versions, &tmp, &install_spec()).expect_err("missing");
    assert!(matches!(err, CodepinError::MetadataMissing { .. }), "got {err}");

    let no_field = root.join("nofield.zip");
    write_zip(
        &no_field,
        &[("Code.exe", b"MZ"), ("resources/app/package.json", br#"{"name":"x"}"#)],
    );
    let err = install_package(&no_field, &versions, &tmp, &install_spec()).expect_err("no field");
    assert!(
        matches!(err, CodepinError::MetadataFieldMissing { field: "version", .. }),
        "got {err}"
    );

    let garbage = root.join("garbage.zip");
    write_zip(
        &garbage,
        &[("Code.exe", b"MZ"), ("resources/app/package.json", b"{not json")],
    );
    let err = install_package(&garbage, &versions, &tmp, &install_spec()).expect_err("garbage");
    assert!(matches!(err, CodepinError::MetadataUnparsable { .. }), "got {err}");
    assert_eq!(err.kind(), ErrorKind::Metadata);

    assert!(!versions.exists() || fs::read_dir(&versions).expect("read").next().is_none());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_of_non_zip_is_extraction_error() {
    let root = test_root();
    let archive = root.join("broken.zip");
    fs::write(&archive, b"definitely not a zip").expect("must write");

    let err = install_package(&archive, &root.join("versions"), &root.join("_tmp"), &install_spec())
        .expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::Extraction);
    let leftovers: Vec<_> = fs::read_dir(root.join("_tmp")).expect("read tmp").collect();
    assert!(leftovers.is_empty());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn effective_root_unwraps_single_directory_only() {
    let root = test_root();
    let wrapped = root.join("wrapped");
    fs::create_dir_all(wrapped.join("inner")).expect("must create");
    assert_eq!(effective_root(&wrapped).expect("root"), wrapped.join("inner"));

    let single_file = root.join("single-file");
    fs::create_dir_all(&single_file).expect("must create");
    fs::write(single_file.join("Code.exe"), b"MZ").expect("must write");
    assert_eq!(effective_root(&single_file).expect("root"), single_file);

    let flat = root.join("flat");
    fs::create_dir_all(flat.join("resources")).expect("must create");
    fs::write(flat.join("Code.exe"), b"MZ").expect("must write");
    assert_eq!(effective_root(&flat).expect("root"), flat);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn metadata_version_must_be_directory_safe() {
    let root = test_root();
    fs::create_dir_all(root.join("resources/app")).expect("must create");
    fs::write(
        root.join("resources/app/package.json"),
        r#"{"version":"../../escape"}"#,
    )
    .expect("must write");
    let err = read_package_version(&root, "resources/app/package.json").expect_err("unsafe");
    assert!(matches!(err, CodepinError::MetadataUnparsable { .. }));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn backup_skips_empty_or_absent_data() {
    let root = test_root();
    let current = root.join("data/current");
    let backups = root.join("data/backups");

    assert_eq!(backup_current_data(&current, &backups).expect("absent ok"), None);

    fs::create_dir_all(current.join("user-data")).expect("must create");
    fs::create_dir_all(current.join("extensions")).expect("must create");
    fs::write(current.join("extension-list.txt"), "").expect("untracked file");
    assert_eq!(backup_current_data(&current, &backups).expect("empty ok"), None);
    assert!(!backups.exists(), "backup dir must not be created");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn backup_copies_tree_byte_for_byte() {
    let root = test_root();
    let current = root.join("data/current");
    let backups = root.join("data/backups");
    fs::create_dir_all(current.join("user-data/User")).expect("must create");
    fs::write(current.join("user-data/User/settings.json"), b"{\"editor.fontSize\":14}")
        .expect("must write");
    fs::create_dir_all(current.join("extensions/ms-python.python-2025.1.0")).expect("must create");
    fs::write(
        current.join("extensions/ms-python.python-2025.1.0/package.json"),
        [0u8, 159, 146, 150],
    )
    .expect("must write");
    fs::write(current.join("extension-list.txt"), "ms-python.python").expect("must write");

    let snapshot = backup_current_data(&current, &backups)
        .expect("must back up")
        .expect("snapshot expected");
    assert!(snapshot.starts_with(&backups));
    assert_trees_equal(&current, &snapshot);

    let second = backup_current_data(&current, &backups)
        .expect("must back up again")
        .expect("snapshot expected");
    assert_ne!(second, snapshot, "snapshots are append-only");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn extension_ids_strip_version_suffix() {
    assert_eq!(derive_extension_id("ms-python.python-2025.1.0"), "ms-python.python");
    assert_eq!(
        derive_extension_id("extension-without-version"),
        "extension-without-version"
    );
    assert_eq!(
        derive_extension_id("ms-vscode.cpptools-1.22.11-win32-x64"),
        "ms-vscode.cpptools"
    );
    assert_eq!(derive_extension_id("-1.0.0"), "-1.0.0");
}

#[test]
fn export_collapses_versions_sorts_and_omits_final_newline() {
    let root = test_root();
    let extensions = root.join("extensions");
    for folder in [
        "ms-python.python-2025.1.0",
        "ms-python.python-2025.2.0",
        "esbenp.prettier-vscode-11.0.0",
        "extension-without-version",
        ".obsolete-dir",
    ] {
        fs::create_dir_all(extensions.join(folder)).expect("must create");
    }
    fs::write(extensions.join("extensions.json"), "[]").expect("files are ignored");
    let list = root.join("extension-list.txt");

    let ids = export_extension_list(&extensions, &list).expect("must export");
    assert_eq!(
        ids,
        vec![
            "esbenp.prettier-vscode",
            "extension-without-version",
            "ms-python.python"
        ]
    );
    assert_eq!(
        fs::read_to_string(&list).expect("must read"),
        "esbenp.prettier-vscode\nextension-without-version\nms-python.python"
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn export_of_missing_dir_writes_empty_file() {
    let root = test_root();
    let list = root.join("nested/extension-list.txt");
    let ids = export_extension_list(&root.join("absent"), &list).expect("must export");
    assert!(ids.is_empty());
    assert_eq!(fs::read_to_string(&list).expect("must read"), "");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn restore_skips_blank_lines_and_continues_after_failures() {
    let root = test_root();
    let list = root.join("extension-list.txt");
    fs::write(&list, "a.b\n\nc.d").expect("must write list");
    let extensions = root.join("extensions");
    fs::create_dir_all(extensions.join("stale-1.0.0")).expect("must create stale");

    let mut invoked = Vec::new();
    let outcomes = restore_extensions_with_runner(
        Path::new("Code.exe"),
        &list,
        &root.join("user-data"),
        &extensions,
        |command| {
            let args: Vec<String> = command
                .get_args()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            invoked.push(args[1].clone());
            if args[1] == "a.b" {
                Ok(fake_output(1, "not found in marketplace\n"))
            } else {
                Ok(fake_output(0, ""))
            }
        },
    )
    .expect("restore never fails on per-id errors");

    assert_eq!(invoked, vec!["a.b", "c.d"]);
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].exit_code, Some(1));
    assert_eq!(outcomes[0].stderr, "not found in marketplace");
    assert_eq!(
        outcomes[0].failure().map(|err| err.kind()),
        Some(ErrorKind::Subprocess)
    );
    assert!(outcomes[1].succeeded());
    assert!(extensions.is_dir());
    assert!(!extensions.join("stale-1.0.0").exists(), "extensions dir is rebuilt empty");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn restore_records_spawn_failures() {
    let root = test_root();
    let list = root.join("extension-list.txt");
    fs::write(&list, "a.b").expect("must write list");

    let outcomes = restore_extensions_with_runner(
        Path::new("missing-editor"),
        &list,
        &root.join("user-data"),
        &root.join("extensions"),
        |_command| Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
    )
    .expect("spawn failures are recorded");
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].exit_code, None);
    assert!(!outcomes[0].succeeded());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn restore_refuses_missing_list() {
    let root = test_root();
    let extensions = root.join("extensions");
    fs::create_dir_all(extensions.join("keep-me-1.0.0")).expect("must create");

    let mut calls = 0;
    let err = restore_extensions_with_runner(
        Path::new("Code.exe"),
        &root.join("absent.txt"),
        &root.join("user-data"),
        &extensions,
        |_command| {
            calls += 1;
            Ok(fake_output(0, ""))
        },
    )
    .expect_err("must refuse");
    assert!(err.to_string().contains("refusing"), "unexpected: {err}");
    assert_eq!(calls, 0);
    assert!(extensions.join("keep-me-1.0.0").exists(), "nothing is cleared");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_extension_command_targets_portable_dirs() {
    let command = build_install_extension_command(
        Path::new("/opt/editor/versions/1.0.0/Code.exe"),
        "a.b",
        Path::new("/opt/editor/data/current/user-data"),
        Path::new("/opt/editor/data/current/extensions"),
    );
    let args: Vec<_> = command
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        args,
        vec![
            "--install-extension",
            "a.b",
            "--user-data-dir",
            "/opt/editor/data/current/user-data",
            "--extensions-dir",
            "/opt/editor/data/current/extensions",
        ]
    );
}

#[test]
fn installed_versions_sorted_semantically() {
    let root = test_root();
    let versions = root.join("versions");
    for name in ["1.9.0", "1.107.1", "1.10.2", ".staging-1.2.0-x", "notes"] {
        fs::create_dir_all(versions.join(name)).expect("must create");
    }
    fs::write(versions.join("2.0.0"), "file, not dir").expect("must write");

    let listed: Vec<_> = list_installed_versions(&versions)
        .expect("must list")
        .into_iter()
        .map(|installed| installed.version)
        .collect();
    assert_eq!(listed, vec!["1.9.0", "1.10.2", "1.107.1"]);
    assert!(is_version_installed(&versions, "1.9.0"));
    assert!(!is_version_installed(&versions, "2.0.0"));
    assert!(list_installed_versions(&root.join("none"))
        .expect("absent ok")
        .is_empty());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn unique_tokens_do_not_repeat() {
    assert_ne!(unique_token(), unique_token());
}
