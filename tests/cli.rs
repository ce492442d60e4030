// Copyright 2025 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

//! Command line runs of the double-well example.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn input_file() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/files/double_well.yaml")
}

fn run(dir: &Path, input: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_legendre-bias"))
        .current_dir(dir)
        .arg("run")
        .arg("-i")
        .arg(input)
        .args(extra)
        .output()
        .unwrap()
}

#[test]
fn single_walker() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &input_file(), &[]);
    assert!(output.status.success(), "{:?}", output);

    let coeff = std::fs::read_to_string(dir.path().join("coeff.out")).unwrap();
    // 2000 steps with a sweep every 200, then order 0..=6
    assert_eq!(coeff.lines().next(), Some("10"));
    assert_eq!(coeff.lines().count(), 8);
    assert!(dir.path().join("basis.out").is_file());

    let yaml = std::fs::read_to_string(dir.path().join("output.yaml")).unwrap();
    let report: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(report["walkers"][0]["method"]["sweeps"].as_u64(), Some(10));
    assert_eq!(report["walkers"][0]["summary"]["steps"].as_u64(), Some(2000));
    assert_eq!(report["method"]["cycle_frequency"].as_u64(), Some(200));
}

#[test]
fn several_walkers() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &input_file(), &["--walkers", "3", "-o", "walkers.yaml"]);
    assert!(output.status.success(), "{:?}", output);
    let yaml = std::fs::read_to_string(dir.path().join("walkers.yaml")).unwrap();
    let report: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
    let walkers = report["walkers"].as_sequence().unwrap();
    assert_eq!(walkers.len(), 3);
    for walker in walkers {
        assert_eq!(walker["method"]["walkers"].as_u64(), Some(3));
        assert_eq!(walker["method"]["sweeps"].as_u64(), Some(10));
    }
}

#[test]
fn missing_temperature_fails() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = std::fs::read_to_string(input_file())
        .unwrap()
        .replace("  temperature: 1.0\n", "");
    let input = dir.path().join("input.yaml");
    std::fs::write(&input, yaml).unwrap();

    let output = run(dir.path(), &input, &["--walkers", "2"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("temperature is undefined"), "{}", stderr);
}
