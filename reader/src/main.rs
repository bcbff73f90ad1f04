use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use speech_client::SpeechClient;
use speech_core::{NullOutput, PlaybackEngine};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use reader::app::{describe_outcomes, Reader, Reply};
use reader::cli::Args;
use reader::commands;
use reader::config::{OutputKind, ReaderConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => tracing_subscriber::EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level: {level}"))?,
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    async_main(args).await
}

fn build_engine(config: &ReaderConfig) -> PlaybackEngine {
    match config.audio_output {
        OutputKind::Null => {
            info!("Using silent audio output");
            PlaybackEngine::with_output(Arc::new(NullOutput::new()))
        }
        #[cfg(feature = "device")]
        OutputKind::Device => {
            let device = config.audio_device.clone();
            PlaybackEngine::new(move || {
                let output: Arc<dyn speech_core::AudioOutput> =
                    speech_core::DeviceOutput::open(device.clone())?;
                Ok(output)
            })
        }
        #[cfg(not(feature = "device"))]
        OutputKind::Device => {
            warn!("Built without sound card support, using silent audio output");
            PlaybackEngine::with_output(Arc::new(NullOutput::new()))
        }
    }
}

async fn async_main(args: Args) -> anyhow::Result<()> {
    let mut config = ReaderConfig::from_env();
    if let Some(output) = args.output {
        config.audio_output = output;
    }
    if args.device.is_some() {
        config.audio_device = args.device.clone();
    }
    config.prefetch = !args.no_prefetch;

    info!(
        "Reader configuration loaded: model={}, voice={}, output={:?}, prefetch={}",
        config.model, config.voice, config.audio_output, config.prefetch
    );
    if config.api_key.is_none() {
        warn!("GEMINI_API_KEY not set, stories will stay silent");
    }

    let client = SpeechClient::new(config.speech_client_config())?;
    let engine = Arc::new(build_engine(&config));
    let mut reader = Reader::new(Arc::new(client), engine, config.prefetch);

    // Mirror the loading/speaking indicators in the log
    let mut indicators = reader.narrator().subscribe();
    tokio::spawn(async move {
        while indicators.changed().await.is_ok() {
            let session = indicators.borrow_and_update().clone();
            if let Some(token) = &session.loading {
                info!("Loading {}", token);
            } else if let Some(token) = &session.speaking {
                info!("Speaking {}", token);
            }
        }
    });

    if let Some(path) = &args.story {
        match reader.load_story(path) {
            Ok(msg) => println!("{msg}"),
            Err(e) => eprintln!("{e}"),
        }
    }
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match reader.execute(command).await {
            Ok(Reply::Message(msg)) => println!("{msg}"),
            Ok(Reply::Playing { label, task }) => {
                tokio::spawn(async move {
                    match task.await {
                        Ok(result) => println!("{}", describe_outcomes(&label, &result)),
                        Err(e) => warn!("Speech task for {} ended abnormally: {}", label, e),
                    }
                });
            }
            Ok(Reply::Quit) => break,
            Err(e) if e.is_busy() => println!("Still reading, try again in a moment"),
            Err(e) => eprintln!("{e}"),
        }
    }

    info!("Reader exiting");
    Ok(())
}
