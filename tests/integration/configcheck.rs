use grdep::test_utils::ConfigFixture;
use predicates::prelude::*;

use super::{config_file, grdep};

#[test]
fn test_configcheck_prints_merged_yaml() {
    let (_dir, config) = config_file(&ConfigFixture::shell());

    grdep()
        .arg("configcheck")
        .arg(&config)
        .arg("category: [{name: extra, filename: [{glob: '*.mk'}]}]")
        .assert()
        .success()
        .stdout(predicate::str::contains("name: ext"))
        .stdout(predicate::str::contains("name: extra"))
        .stdout(predicate::str::contains("strip extension"));
}

#[test]
fn test_configcheck_json() {
    let output = grdep()
        .args(["configcheck", "--json", "node: [{name: n, category: go, matcher: [{r: import}]}]"])
        .assert()
        .success();
    let value: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(value["node"][0]["category"], "go");
    assert_eq!(value["node"][0]["matcher"][0]["r"], "import");
}

#[test]
fn test_configcheck_unparseable() {
    let (_dir, config) = config_file(&ConfigFixture::unparseable());

    grdep()
        .arg("configcheck")
        .arg(&config)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to parse config"))
        .stderr(predicate::str::contains("config[0]"));
}

#[test]
fn test_configcheck_rejects_invalid_regex() {
    grdep()
        .args(["configcheck", "{}", "ignore: [{r: '('}]"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config[1]"));
}
