//! # waveformgen
//!
//! Renders the large and small waveform datasets of an audio file as JSON
//! and writes a re-encoded copy of the audio.

mod cli;
mod logging;
mod runner;

fn main() {
    dotenv::dotenv().ok();

    let args = cli::args::build_cli().get_matches();
    logging::init(args.get_flag("quiet"));

    std::process::exit(runner::run(&args))
}
