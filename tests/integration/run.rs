use grdep::test_utils::{ConfigFixture, TreeFixture};
use predicates::prelude::*;

use super::{config_file, grdep, records};

fn relative(tree: &TreeFixture, record: &serde_json::Value) -> String {
    let path = record["line"]["path"].as_str().unwrap();
    std::path::Path::new(path).strip_prefix(tree.path()).unwrap().to_string_lossy().to_string()
}

/// Every (line, category, node) combination is written, in walk order
#[test]
fn test_run_writes_node_records() {
    let tree = TreeFixture::shell_project().unwrap();
    let (_dir, config) = config_file(&ConfigFixture::shell());

    let output = grdep()
        .arg("run")
        .arg(&config)
        .write_stdin(tree.root_line())
        .assert()
        .success();
    let records = records(&output.get_output().stdout);

    let got: Vec<(String, String, String)> = records
        .iter()
        .map(|r| {
            (
                relative(&tree, r),
                r["category"]["origin"]["name"].as_str().unwrap().to_string(),
                r["node"]["normalized"]["result"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    let expected: Vec<(String, String, String)> = [
        ("bin/tool", "shebang", "run"),
        ("lib.sh", "ext", "util"),
        ("run.sh", "ext", "lib"),
        ("run.sh", "shebang", "lib"),
        ("run.sh", "ext", "util"),
        ("run.sh", "shebang", "util"),
    ]
    .iter()
    .map(|(p, c, n)| (p.to_string(), c.to_string(), n.to_string()))
    .collect();
    assert_eq!(got, expected);

    let first = &records[0];
    assert_eq!(first["path"]["linum"], 1);
    assert_eq!(first["line"]["linum"], 2);
    assert_eq!(first["line"]["content"], ". run.sh");
    assert_eq!(first["category"]["normalized"]["index"], -1);
    assert_eq!(first["node"]["origin"]["result"], "run.sh");
    assert_eq!(first["node"]["normalized"]["name"], "strip extension");
}

/// Ignored directories contribute nothing
#[test]
fn test_run_skips_ignored_directories() {
    let tree = TreeFixture::shell_project().unwrap();
    let (_dir, config) = config_file(&ConfigFixture::shell());

    grdep()
        .arg("run")
        .arg(&config)
        .write_stdin(tree.root_line())
        .assert()
        .success()
        .stdout(predicate::str::contains("vendor").not())
        .stdout(predicate::str::contains("hidden").not());
}

/// --category stops after category normalization
#[test]
fn test_run_category_only() {
    let tree = TreeFixture::shell_project().unwrap();
    let (_dir, config) = config_file(&ConfigFixture::shell());

    let output = grdep()
        .args(["run", "--category"])
        .arg(&config)
        .write_stdin(tree.root_line())
        .assert()
        .success();
    let records = records(&output.get_output().stdout);

    // README.md: 1, bin/tool: 2, lib.sh: 1, run.sh: 4 lines x 2 categories
    assert_eq!(records.len(), 12);
    assert!(records.iter().all(|r| r.get("node").is_none()));
    assert!(
        records
            .iter()
            .filter(|r| relative(&tree, r) == "run.sh")
            .all(|r| r["category"]["normalized"]["result"] == "bash")
    );
}

/// Running twice over an unchanged tree gives identical output
#[test]
fn test_run_is_repeatable() {
    let tree = TreeFixture::shell_project().unwrap();
    let (_dir, config) = config_file(&ConfigFixture::shell());

    let run = || {
        grdep()
            .arg("run")
            .arg(&config)
            .write_stdin(tree.root_line())
            .assert()
            .success()
            .get_output()
            .stdout
            .clone()
    };
    let first = run();
    assert!(!first.is_empty());
    assert_eq!(first, run());
}

/// Inline configuration text works in place of a file
#[test]
fn test_run_inline_config() {
    let tree = TreeFixture::new().unwrap();
    tree.file("main.go", "package main\nimport \"fmt\"\n").unwrap();

    let output = grdep()
        .arg("run")
        .arg(r#"{"category": [{"name": "go", "filename": [{"r": "\\.go$", "val": ["go"]}]}]}"#)
        .arg(r#"node: [{name: import, category: go, matcher: [{r: 'import "(?P<v>[^"]+)"', tmpl: "$v"}]}]"#)
        .write_stdin(tree.root_line())
        .assert()
        .success();
    let records = records(&output.get_output().stdout);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["node"]["origin"]["result"], "fmt");
}

/// An invalid matcher combination fails before reading any input
#[test]
fn test_run_invalid_config_fails() {
    let tree = TreeFixture::new().unwrap();
    let (_dir, config) = config_file(&ConfigFixture::invalid_matcher());

    grdep()
        .arg("run")
        .arg(&config)
        .write_stdin(tree.root_line())
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("tmpl requires r"))
        .stderr(predicate::str::contains("configcheck"));
}

/// A hard matcher error aborts the run
#[test]
fn test_run_lua_type_error_aborts() {
    let tree = TreeFixture::new().unwrap();
    tree.file("a.txt", "x\n").unwrap();

    grdep()
        .arg("run")
        .arg("category: [{name: bad, filename: [{lua: {src: 'function f(s) return 1 end', entry: f}}]}]")
        .write_stdin(tree.root_line())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("should return string"));
}

/// --metrics logs aggregates on stderr
#[test]
fn test_run_metrics() {
    let tree = TreeFixture::shell_project().unwrap();
    let (_dir, config) = config_file(&ConfigFixture::shell());

    grdep()
        .args(["--metrics", "run"])
        .arg(&config)
        .write_stdin(tree.root_line())
        .assert()
        .success()
        .stderr(predicate::str::contains("named-category-selector-ext-call"))
        .stderr(predicate::str::contains("named-node-selector-source-success"));
}

/// No configuration argument is a usage error
#[test]
fn test_run_requires_config() {
    grdep().arg("run").assert().failure();
}
