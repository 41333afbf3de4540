use grdep::test_utils::TreeFixture;
use predicates::prelude::*;

use super::{grdep, records};

/// The skeleton validates and finds what its comments promise
#[test]
fn test_skeleton_is_runnable() {
    let skeleton = grdep().arg("skeleton").assert().success().get_output().stdout.clone();
    let skeleton = String::from_utf8(skeleton).unwrap();
    assert!(skeleton.starts_with("---\n"));

    let config_dir = tempfile::tempdir().unwrap();
    let config = config_dir.path().join("grdep.yml");
    std::fs::write(&config, &skeleton).unwrap();

    grdep()
        .arg("configcheck")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("sh to bash"));

    let tree = TreeFixture::new().unwrap();
    tree.file("install.sh", "#!/bin/bash\n. lib.sh\n/usr/bin/env true\n").unwrap();

    let output = grdep()
        .arg("run")
        .arg(&config)
        .write_stdin(tree.root_line())
        .assert()
        .success();
    let nodes: Vec<String> = records(&output.get_output().stdout)
        .iter()
        .map(|r| r["node"]["normalized"]["result"].as_str().unwrap().to_string())
        .collect();
    assert!(nodes.contains(&"lib.sh".to_string()));
    assert!(nodes.contains(&"env".to_string()));
}
