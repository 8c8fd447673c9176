use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn test_root(name: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    std::env::temp_dir().join(format!("tome-rs-cli-{name}-{nonce}"))
}

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tome"))
}

fn run_tome(root: &Path, args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .arg("--state-dir")
        .arg(root.join("state"))
        .env_remove("RUST_LOG")
        .output()
        .expect("run cli")
}

fn write_book(root: &Path) -> PathBuf {
    fs::create_dir_all(root).expect("create root");
    let file = root.join("book.txt");
    let mut body = String::new();
    for chapter in 1..=3 {
        body.push_str(&format!("Chapter {chapter}\n"));
        for line in 0..20 {
            body.push_str(&format!("text {chapter}-{line}\n"));
        }
    }
    fs::write(&file, body).expect("write book");
    file
}

#[test]
fn cli_prints_requested_window() {
    let root = test_root("window");
    let file = write_book(&root);

    let output = run_tome(
        &root,
        &[file.to_string_lossy().as_ref(), "--line", "1", "--count", "3"],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].trim_start().starts_with('1'));
    assert!(lines[0].ends_with("text 1-0"));
    assert!(lines[2].ends_with("text 1-2"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn cli_lists_chapters_and_search_results() {
    let root = test_root("chapters");
    let file = write_book(&root);

    let output = run_tome(
        &root,
        &[
            file.to_string_lossy().as_ref(),
            "--count",
            "0",
            "--chapters",
            "--search",
            "text 2-1",
        ],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Chapter 2"));
    assert!(stdout.contains("3 chapters"));
    // "text 2-1" and "text 2-10".."text 2-19"
    assert!(stdout.contains("11 matches"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn cli_remembers_reading_position() {
    let root = test_root("position");
    let file = write_book(&root);
    let path = file.to_string_lossy().to_string();

    let first = run_tome(&root, &[path.as_str(), "--line", "22", "--count", "1"]);
    assert!(first.status.success());

    let second = run_tome(&root, &[path.as_str(), "--count", "1"]);
    assert!(second.status.success());
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(stdout.trim_start().starts_with("22"));
    assert!(stdout.trim_end().ends_with("text 2-0"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn cli_json_emits_one_event_per_line() {
    let root = test_root("json");
    let file = write_book(&root);

    let output = run_tome(
        &root,
        &[file.to_string_lossy().as_ref(), "--count", "2", "--json"],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next().expect("one event");
    assert!(first.contains(r#""event":"chunkUpdate""#));
    assert!(first.contains(r#""lines":["Chapter 1","text 1-0"]"#));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn cli_returns_non_zero_when_document_does_not_exist() {
    let root = test_root("missing");
    let missing = root.join("missing.txt");
    let output = run_tome(&root, &[missing.to_string_lossy().as_ref()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to open document"));
}

#[test]
fn cli_rejects_invalid_chapter_pattern() {
    let root = test_root("pattern");
    let file = write_book(&root);

    let output = run_tome(
        &root,
        &[file.to_string_lossy().as_ref(), "--count", "0", "--pattern", "(open"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to set chapter pattern"));

    let _ = fs::remove_dir_all(&root);
}
