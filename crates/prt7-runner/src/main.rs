//! `prt7` command line interface.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use prt7_runner::{
    generate_script, open_source, write_script, ConsoleSink, Decoder, EventSink, LineSource, MultiSink,
    OutputFormat, RunConfig, RunnerResult, ScriptOptions, SourceConfig, TracingSink,
};

#[derive(Parser, Debug)]
#[command(name = "prt7", version, about = "Decode hidden messages from PRT-7 frame streams")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read frames and print the decoded message.
    Decode(DecodeArgs),
    /// Turn a message into a frame script.
    Encode(EncodeArgs),
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// YAML run configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read frames from a file instead of stdin.
    #[arg(short, long, conflicts_with_all = ["connect", "serial"])]
    input: Option<PathBuf>,

    /// Read frames from a serial-over-TCP bridge (host:port).
    #[arg(long, conflicts_with = "serial")]
    connect: Option<String>,

    /// Read frames from a serial device (e.g. /dev/ttyUSB0).
    #[arg(long)]
    serial: Option<PathBuf>,

    /// Serial line speed.
    #[arg(long)]
    baud: Option<u32>,

    /// Read timeout in milliseconds for stdin, serial and socket sources.
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Consecutive empty reads that end the session.
    #[arg(long)]
    idle_threshold: Option<u32>,

    /// Reject map frames whose rotation is not a valid integer.
    #[arg(long)]
    strict: bool,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,

    /// Do not print a line per frame.
    #[arg(short, long)]
    quiet: bool,

    /// Also write the JSON summary to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Message to encode.
    message: String,

    /// RNG seed for rotations.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Largest rotation magnitude (0 disables rotations).
    #[arg(long, default_value_t = 25)]
    max_rotation: u32,

    /// Rotate before every n-th character (0 disables rotations).
    #[arg(long, default_value_t = 4)]
    rotate_every: usize,

    /// Write the script to a file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Decode(args) => decode(args),
        Commands::Encode(args) => encode(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_config(args: &DecodeArgs) -> RunnerResult<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    if let Some(path) = &args.input {
        config.source = SourceConfig::File(path.clone());
    }
    if let Some(addr) = &args.connect {
        config.source = SourceConfig::Tcp(addr.clone());
    }
    if let Some(path) = &args.serial {
        config.source = SourceConfig::Serial(path.clone());
    }
    if let Some(baud) = args.baud {
        config.baud = baud;
    }
    if let Some(ms) = args.read_timeout_ms {
        config.read_timeout_ms = ms;
    }
    if let Some(threshold) = args.idle_threshold {
        config.idle_threshold = threshold;
    }
    if args.strict {
        config.strict_numeric = true;
    }
    if args.json {
        config.output = OutputFormat::Json;
    }
    if args.quiet {
        config.echo_frames = false;
    }

    config.validate()?;
    Ok(config)
}

fn decode(args: DecodeArgs) -> RunnerResult<ExitCode> {
    let config = run_config(&args)?;
    let text_output = config.output == OutputFormat::Text;

    if text_output {
        println!();
        println!("====================================================");
        println!("            PRT-7 PROTOCOL FRAME DECODER            ");
        println!("====================================================");
        println!();
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        warn!("failed to install Ctrl-C handler: {e}");
    }

    let mut source = open_source(&config, Some(stop.clone()))?;
    info!(source = %source.describe(), "frame source opened");
    prt7_metrics::describe_metrics();

    let mut decoder = Decoder::new(config.decoder_config()).with_stop_flag(stop);
    let mut tracing_sink = TracingSink;
    let mut console = ConsoleSink::stdout();
    let mut sinks: Vec<&mut dyn EventSink> = vec![&mut tracing_sink];
    if text_output && config.echo_frames {
        sinks.push(&mut console);
    }
    let termination = decoder.run(&mut *source, &mut MultiSink::new(sinks));

    let summary = decoder.summary();
    match config.output {
        OutputFormat::Text => println!("\n{}", summary.render_text()),
        OutputFormat::Json => println!("{}", summary.to_json()?),
    }
    if let Some(path) = &args.output {
        std::fs::write(path, summary.to_json()?)?;
    }

    Ok(if termination.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn encode(args: EncodeArgs) -> RunnerResult<ExitCode> {
    let options = ScriptOptions::default()
        .with_seed(args.seed)
        .with_max_rotation(args.max_rotation)
        .with_rotate_every(args.rotate_every);
    let frames = generate_script(&args.message, &options)?;

    match &args.output {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            write_script(&frames, &mut file)?;
            info!(frames = frames.len(), path = %path.display(), "frame script written");
        }
        None => write_script(&frames, &mut std::io::stdout().lock())?,
    }
    Ok(ExitCode::SUCCESS)
}
