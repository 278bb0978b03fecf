//! Unit tests for CLI argument parsing

use airquality_data_downloader::cli::download::{Cli, Commands, OutputFormat};
use airquality_data_downloader::Frequency;
use clap::Parser;
use std::path::PathBuf;

#[test]
fn defaults_match_the_documented_surface() {
    let cli = Cli::parse_from(["airqdl", "verified"]);

    assert_eq!(cli.path, PathBuf::from("data"));
    assert!(!cli.overwrite);
    assert_eq!(cli.concurrency, 50);
    assert_eq!(cli.resolver_concurrency, 10);
    assert_eq!(cli.max_retries, 3);
    assert_eq!(cli.output_format, OutputFormat::Human);
    assert!(!cli.quiet);

    let Commands::Verified(args) = cli.command else {
        panic!("expected the verified subcommand");
    };
    assert!(args.countries.is_empty());
    assert!(args.pollutants.is_empty());
    assert!(args.cities.is_empty());
    assert_eq!(args.frequency, None);
    assert!(!args.summary);
    assert!(!args.metadata);
    assert!(!args.flat);
}

#[test]
fn all_selection_flags_parse() {
    let cli = Cli::parse_from([
        "airqdl",
        "--path",
        "downloads",
        "-O",
        "--concurrency",
        "8",
        "--resolver-concurrency",
        "2",
        "--max-retries",
        "5",
        "--output-format",
        "json",
        "-q",
        "historical",
        "-c",
        "NL",
        "-c",
        "DE",
        "-p",
        "PM10",
        "-p",
        "SO2",
        "-F",
        "daily",
        "--summary",
        "-M",
        "--flat",
    ]);

    assert_eq!(cli.path, PathBuf::from("downloads"));
    assert!(cli.overwrite);
    assert_eq!(cli.concurrency, 8);
    assert_eq!(cli.resolver_concurrency, 2);
    assert_eq!(cli.max_retries, 5);
    assert_eq!(cli.output_format, OutputFormat::Json);
    assert!(cli.quiet);

    let Commands::Historical(args) = cli.command else {
        panic!("expected the historical subcommand");
    };
    assert_eq!(args.countries, vec!["NL".to_string(), "DE".to_string()]);
    assert_eq!(args.pollutants, vec!["PM10".to_string(), "SO2".to_string()]);
    assert_eq!(args.frequency, Some(Frequency::Daily));
    assert!(args.summary);
    assert!(args.metadata);
    assert!(args.flat);
}

#[test]
fn city_selection_parses() {
    let cli = Cli::parse_from(["airqdl", "unverified", "-C", "Oslo", "-C", "Bergen"]);

    let Commands::Unverified(args) = cli.command else {
        panic!("expected the unverified subcommand");
    };
    assert_eq!(args.cities, vec!["Oslo".to_string(), "Bergen".to_string()]);
    assert!(args.countries.is_empty());
}

#[test]
fn metadata_subcommand_parses() {
    let cli = Cli::parse_from(["airqdl", "--path", "out", "metadata"]);
    assert!(matches!(cli.command, Commands::Metadata));
    assert_eq!(cli.path, PathBuf::from("out"));
}

#[test]
fn catalog_subcommand_parses() {
    let cli = Cli::parse_from(["airqdl", "catalog", "pollutants", "--search", "no"]);
    assert!(matches!(cli.command, Commands::Catalog(_)));

    let cli = Cli::parse_from(["airqdl", "catalog", "cities", "NO", "SE"]);
    assert!(matches!(cli.command, Commands::Catalog(_)));
}

#[test]
fn globals_apply_after_the_subcommand_too() {
    let cli = Cli::parse_from(["airqdl", "verified", "--concurrency", "12", "-q"]);
    assert_eq!(cli.concurrency, 12);
    assert!(cli.quiet);
}

#[test]
fn out_of_range_values_are_rejected() {
    assert!(Cli::try_parse_from(["airqdl", "--concurrency", "0", "verified"]).is_err());
    assert!(Cli::try_parse_from(["airqdl", "--concurrency", "huge", "verified"]).is_err());
    assert!(Cli::try_parse_from(["airqdl", "--max-retries", "0", "verified"]).is_err());
    assert!(Cli::try_parse_from(["airqdl", "--max-retries", "11", "verified"]).is_err());
    assert!(Cli::try_parse_from(["airqdl", "--output-format", "yaml", "verified"]).is_err());
    assert!(Cli::try_parse_from(["airqdl", "verified", "-F", "weekly"]).is_err());
}

#[test]
fn a_subcommand_is_required() {
    assert!(Cli::try_parse_from(["airqdl"]).is_err());
}
