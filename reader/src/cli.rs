use std::path::PathBuf;

use clap::Parser;

use crate::config::OutputKind;

/// Read generated stories aloud, sentence by sentence.
#[derive(Parser, Debug)]
#[command(name = "reader", version, about)]
pub struct Args {
    /// Story file (JSON) to load at startup
    pub story: Option<PathBuf>,

    /// Audio output
    #[arg(long, value_enum, ignore_case = true, env = "AUDIO_OUTPUT")]
    pub output: Option<OutputKind>,

    /// Output device name (sound card output only)
    #[arg(long, env = "AUDIO_DEVICE")]
    pub device: Option<String>,

    /// Do not warm the speech cache when a story is loaded
    #[arg(long)]
    pub no_prefetch: bool,

    /// Log filter, overrides RUST_LOG
    #[arg(long)]
    pub log_level: Option<String>,
}
