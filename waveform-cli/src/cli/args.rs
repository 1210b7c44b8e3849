//! CLI argument definitions for `waveformgen`.

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, Command};
use waveform_lib::FlushPolicy;

/// Build the CLI argument parser.
pub fn build_cli() -> Command {
    Command::new("waveformgen")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Render waveform peak JSON for an audio file and re-encode it")
        .arg_required_else_help(true)
        .arg(
            Arg::new("INPUT")
                .help("The audio file to measure")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .index(1),
        )
        .arg(
            Arg::new("OUTPUT")
                .help("Where to write the re-encoded audio (.wav)")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .index(2),
        )
        .arg(
            Arg::new("json-dir")
                .long("json-dir")
                .short('j')
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Directory for the <input>_m.json and <input>_s.json files [default: current directory]"),
        )
        .arg(
            Arg::new("flush")
                .long("flush")
                .value_name("POLICY")
                .value_parser(parse_flush_policy)
                .help("When to rewrite the JSON files: complete, sample or columns:<N> [default: columns:256]"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Only log warnings and errors"),
        )
}

fn parse_flush_policy(value: &str) -> Result<FlushPolicy, String> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_paths_and_options() {
        let matches = build_cli()
            .try_get_matches_from([
                "waveformgen",
                "in.flac",
                "out.wav",
                "--json-dir",
                "peaks",
                "--flush",
                "columns:8",
                "-q",
            ])
            .unwrap();

        assert_eq!(
            matches.get_one::<PathBuf>("INPUT"),
            Some(&PathBuf::from("in.flac"))
        );
        assert_eq!(
            matches.get_one::<PathBuf>("json-dir"),
            Some(&PathBuf::from("peaks"))
        );
        assert_eq!(
            matches.get_one::<FlushPolicy>("flush"),
            Some(&FlushPolicy::EveryColumns(8))
        );
        assert!(matches.get_flag("quiet"));
    }

    #[test]
    fn rejects_unknown_flush_policy() {
        let result = build_cli().try_get_matches_from(["waveformgen", "a.wav", "b.wav", "--flush", "never"]);
        assert!(result.is_err());
    }

    #[test]
    fn requires_both_paths() {
        assert!(build_cli()
            .try_get_matches_from(["waveformgen", "a.wav"])
            .is_err());
    }
}
