use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const PAGE: &str = r#"<html><body>
<nav class="top">Home</nav>
<main><article data-testid="post">Post</article></main>
<aside id="promo">Buy now</aside>
</body></html>"#;

fn veil(store: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_veil"))
        .arg("--store")
        .arg(store)
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "veil failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// The id printed after `prefix` on a "Saved ..." line.
fn saved_id(text: &str, prefix: &str) -> String {
    text.lines()
        .find_map(|line| line.strip_prefix(prefix))
        .map(|id| id.trim().to_string())
        .unwrap()
}

#[test]
fn test_match_command() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");

    let out = stdout(&veil(&store, &["match", "https://www.youtube.com/shorts/1", "youtube.com"]));
    assert_eq!(out.trim(), "match");

    let out = stdout(&veil(
        &store,
        &["match", "https://youtube.com/feed", "youtube.com/shorts/*", "--type", "path_pattern"],
    ));
    assert_eq!(out.trim(), "no match");

    let failed = veil(&store, &["match", "not a url", "youtube.com"]);
    assert!(!failed.status.success());
}

#[test]
fn test_rules_round_trip_through_store_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");
    let page = dir.path().join("page.html");
    fs::write(&page, PAGE).unwrap();

    let out = stdout(&veil(
        &store,
        &["elements", "add", "Promo", "-s", "#promo", "--pattern", "example.com"],
    ));
    let element = saved_id(&out, "Saved block element ");
    assert!(element.starts_with("be_"));

    let out = stdout(&veil(&store, &["presets", "add", "Focus", "-e", &element]));
    let preset = saved_id(&out, "Saved preset ");

    let out = stdout(&veil(&store, &["resolve", "https://www.example.com/"]));
    assert!(out.starts_with("No active block elements"));

    let out = stdout(&veil(&store, &["presets", "toggle", &preset, "--on"]));
    assert!(out.contains("is now on"));

    let out = stdout(&veil(&store, &["resolve", "https://www.example.com/"]));
    assert!(out.contains(&element));

    let out = stdout(&veil(
        &store,
        &["preview", "--input", page.to_str().unwrap(), "https://www.example.com/"],
    ));
    assert!(out.contains("Hidden:        1"));

    let out = stdout(&veil(&store, &["elements", "delete", &element]));
    assert!(out.contains(&format!("Presets removed: {}", preset)));

    let out = stdout(&veil(&store, &["presets", "list"]));
    assert!(out.starts_with("0 presets"));

    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&store).unwrap()).unwrap();
    assert_eq!(saved["veil_block_elements"], serde_json::json!([]));
}

#[test]
fn test_select_prefers_stable_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");
    let page = dir.path().join("page.html");
    fs::write(&page, PAGE).unwrap();

    let out = stdout(&veil(&store, &["select", "--input", page.to_str().unwrap(), "aside"]));
    assert_eq!(out.lines().next(), Some("#promo"));

    let out = stdout(&veil(&store, &["select", "--input", page.to_str().unwrap(), "article"]));
    assert_eq!(out.lines().next(), Some("[data-testid=\"post\"]"));

    let failed = veil(&store, &["select", "--input", page.to_str().unwrap(), "body"]);
    assert!(!failed.status.success());
}

#[test]
fn test_invalid_element_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");

    let failed = veil(
        &store,
        &["elements", "add", "Bad", "-s", "javascript:alert(1)", "--pattern", "example.com"],
    );
    assert!(!failed.status.success());
    assert!(String::from_utf8_lossy(&failed.stderr).contains("Invalid selector pattern"));
    assert!(!store.exists());
}
