use std::path::PathBuf;

use clap::ArgMatches;
use log::{debug, error};
use waveform_lib::{generate_image_with_config, FlushPolicy, WaveformConfig};

/// Map the parsed arguments onto a run configuration and execute it.
pub fn run(args: &ArgMatches) -> i32 {
    let (Some(input), Some(output)) = (
        args.get_one::<PathBuf>("INPUT"),
        args.get_one::<PathBuf>("OUTPUT"),
    ) else {
        error!("input and output paths are required");
        return 1;
    };

    let config = config_from(args);
    debug!("{:?}", config);

    generate_image_with_config(input, output, &config)
}

fn config_from(args: &ArgMatches) -> WaveformConfig {
    let mut config = WaveformConfig::default();
    if let Some(dir) = args.get_one::<PathBuf>("json-dir") {
        config = config.with_json_dir(dir);
    }
    if let Some(policy) = args.get_one::<FlushPolicy>("flush") {
        config = config.with_flush_policy(*policy);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::build_cli;
    use std::path::Path;

    #[test]
    fn defaults_match_library_configuration() {
        let args = build_cli()
            .try_get_matches_from(["waveformgen", "in.wav", "out.wav"])
            .unwrap();
        let config = config_from(&args);
        assert_eq!(config.json_dir, Path::new("."));
        assert_eq!(config.flush_policy, FlushPolicy::default());
        assert_eq!(config.large_width, waveform_lib::constants::LARGE_WIDTH);
    }

    #[test]
    fn flags_override_defaults() {
        let args = build_cli()
            .try_get_matches_from([
                "waveformgen",
                "in.wav",
                "out.wav",
                "--json-dir",
                "/tmp/peaks",
                "--flush",
                "complete",
            ])
            .unwrap();
        let config = config_from(&args);
        assert_eq!(config.json_dir, Path::new("/tmp/peaks"));
        assert_eq!(config.flush_policy, FlushPolicy::OnComplete);
    }
}
