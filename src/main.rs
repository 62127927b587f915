use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lyra_pipeline::audio::{CpalPlayback, NullPlayback, Playback};
use lyra_pipeline::{Config, Pipeline, PipelineBuilder};

/// Lyra - streaming voice response pipeline
#[derive(Parser)]
#[command(name = "lyra", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable audio output (text-only responses)
    #[arg(long, env = "LYRA_NO_AUDIO")]
    no_audio: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat (reads turns from stdin)
    Chat,
    /// Answer a single turn and exit
    Ask {
        /// The user's message
        text: String,
    },
    /// Synthesize and play a text without generation
    Say {
        /// Text to speak
        text: String,
    },
    /// Check provider availability
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,lyra_pipeline=info",
        1 => "info,lyra_pipeline=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env();
    let pipeline = build_pipeline(&config, cli.no_audio)?;

    match cli.command {
        Command::Chat => chat_loop(&pipeline).await,
        Command::Ask { text } => {
            let result = pipeline.handle_turn(&text).await;
            println!("{}", result.text);
            tracing::debug!(elapsed = ?result.elapsed, "turn finished");
            Ok(())
        }
        Command::Say { text } => {
            pipeline.say(&text).await;
            Ok(())
        }
        Command::Check => {
            for (provider, available) in pipeline.check_providers().await {
                let status = if available { "ok" } else { "unavailable" };
                println!("{provider:<24} {status}");
            }
            Ok(())
        }
    }
}

fn build_pipeline(config: &Config, no_audio: bool) -> anyhow::Result<Pipeline> {
    let playback: Arc<dyn Playback> = if no_audio {
        Arc::new(NullPlayback)
    } else {
        match CpalPlayback::new() {
            Ok(playback) => Arc::new(playback),
            Err(e) => {
                tracing::warn!(error = %e, "audio output unavailable, responses will be text-only");
                Arc::new(NullPlayback)
            }
        }
    };

    let pipeline = PipelineBuilder::from_config(config)?
        .with_playback(playback)
        .build()?;
    Ok(pipeline)
}

async fn chat_loop(pipeline: &Pipeline) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/quit" || input == "/exit" {
            break;
        }

        let result = pipeline.handle_turn(input).await;
        println!("{}", result.text);
    }

    Ok(())
}
