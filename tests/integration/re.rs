use predicates::prelude::*;

use super::{grdep, records};

#[test]
fn test_re_groups() {
    let output = grdep()
        .args(["re", r"/bin/(\w+)"])
        .write_stdin("#!/bin/bash\nnothing\n/bin/a /bin/b\n")
        .assert()
        .success();
    let lines = records(&output.get_output().stdout);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["linum"], 1);
    assert_eq!(lines[0]["matches"], serde_json::json!([["/bin/bash", "bash"]]));
    assert_eq!(lines[1]["linum"], 3);
    assert_eq!(lines[1]["matches"][1][1], "b");
}

#[test]
fn test_re_template() {
    grdep()
        .args(["re", r"^#!/bin/(?P<sh>\w+)", "$sh"])
        .write_stdin("#!/bin/zsh\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""matches":"zsh""#));
}

#[test]
fn test_re_invalid_regex() {
    grdep().args(["re", "("]).write_stdin("x\n").assert().failure().code(1);
}
