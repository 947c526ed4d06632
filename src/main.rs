use anyhow::Result;
use clap::Parser;
use std::io::Read;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dsn::{options::Options, Context};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Source file, or pass "-" to read from stdin
    #[clap(short, long, value_parser, default_value = "-")]
    file: clio::Input,

    /// Output file, or pass "-" to write to stdout
    #[clap(short, long, value_parser, default_value = "-")]
    output: clio::Output,

    /// Overlay name written into the intermediate code
    #[clap(long, default_value = "default")]
    overlay: String,

    /// Pretty-print the intermediate code
    #[clap(long)]
    pretty: bool,

    /// Log compilation progress
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let mut args = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let mut source = String::new();
    args.file.read_to_string(&mut source)?;

    let context = Context::new().set_options(Options {
        overlay: args.overlay,
        pretty: args.pretty,
    });
    let code = match context.compile(&source) {
        Ok(code) => code,
        Err(e) => anyhow::bail!("{}", e.to_snippet(None, true)),
    };

    context.write(&code, &mut args.output)?;
    Ok(())
}
