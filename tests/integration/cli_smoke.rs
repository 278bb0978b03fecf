//! Binary-level smoke tests (no network required)

use assert_cmd::Command;

fn airqdl() -> Command {
    Command::cargo_bin("airqdl").unwrap()
}

#[test]
fn help_lists_dataset_subcommands() {
    let assert = airqdl().arg("--help").assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(output.contains("historical"));
    assert!(output.contains("verified"));
    assert!(output.contains("unverified"));
    assert!(output.contains("metadata"));
    assert!(output.contains("catalog"));
}

#[test]
fn catalog_countries_prints_known_codes() {
    let assert = airqdl().args(["catalog", "countries"]).assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(output.contains("NL"));
    assert!(output.contains("DE"));
    assert!(output.contains("XK"));
}

#[test]
fn catalog_countries_json_is_valid_json() {
    let assert = airqdl()
        .args(["--output-format", "json", "catalog", "countries"])
        .assert()
        .success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let parsed: Vec<String> = serde_json::from_str(output.trim()).unwrap();
    assert!(parsed.contains(&"NL".to_string()));
}

#[test]
fn catalog_pollutants_search_filters() {
    let assert = airqdl()
        .args(["catalog", "pollutants", "--search", "pm"])
        .assert()
        .success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(output.contains("PM10"));
    assert!(!output.contains("SO2"));
}

#[test]
fn unknown_country_fails_before_any_download() {
    airqdl()
        .args(["verified", "-c", "ZZ", "--summary"])
        .assert()
        .failure();
}

#[test]
fn city_and_country_together_are_rejected() {
    airqdl()
        .args(["verified", "-c", "NL", "-C", "Amsterdam", "--summary"])
        .assert()
        .failure();
}

#[test]
fn zero_concurrency_is_rejected_by_the_parser() {
    airqdl()
        .args(["--concurrency", "0", "catalog", "countries"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn invalid_frequency_is_rejected_by_the_parser() {
    airqdl()
        .args(["verified", "-F", "weekly", "--summary"])
        .assert()
        .failure()
        .code(2);
}
