use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use opencan_dbc::{DbcTranslator, Network, ParseReport, TranslationToOpencan};
use textwrap::indent;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod decode;

#[derive(clap::Parser)]
#[command(version)]
struct PrimaryArgs {
    #[clap(subcommand)]
    subcommand: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Parse a DBC file and list everything that had to be skipped
    Check { in_file: PathBuf },
    /// Print a DBC file in canonical form
    Fmt { in_file: PathBuf },
    /// Print a DBC file as JSON
    Json { in_file: PathBuf },
    /// Print messages and their signals in a readable form
    Show {
        in_file: PathBuf,
        /// Only this message (by name)
        message: Option<String>,
    },
    /// Decode one frame
    Decode {
        in_file: PathBuf,
        /// Message id, decimal or 0x-prefixed hex
        id: String,
        /// Payload as hex, e.g. `01ff00`
        payload: String,
    },
}

fn load(path: &Path) -> Result<(Network, ParseReport)> {
    let file = File::open(path).context(format!("Failed to open {}", path.display()))?;

    let mut net = Network::new();
    let report = DbcTranslator::import_network(BufReader::new(file), &mut net)
        .context(format!("Failed to parse {}", path.display()))?;

    debug!(path = %path.display(), warnings = report.warnings.len(), "loaded network");
    Ok((net, report))
}

fn parse_id(id: &str) -> Result<u32> {
    let parsed = match id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => id.parse(),
    };

    parsed.context(format!("Invalid message id `{id}`"))
}

fn check(path: &Path) -> Result<()> {
    let (net, report) = load(path)?;

    for warning in &report.warnings {
        println!("{warning}");
    }
    println!(
        "{} messages, {} nodes, {} warnings",
        net.messages.len(),
        net.nodes.len(),
        report.warnings.len()
    );

    if !net.successfully_parsed {
        bail!("{} was not parsed cleanly", path.display());
    }
    Ok(())
}

fn show(path: &Path, message: Option<String>) -> Result<()> {
    let (net, _) = load(path)?;

    match message {
        Some(name) => net
            .message_by_name(&name)
            .context(format!("No message named `{name}`"))?
            .print_human(),
        None => net.iter_messages().for_each(|msg| msg.print_human()),
    }
    Ok(())
}

fn decode(path: &Path, id: &str, payload: &str) -> Result<()> {
    let (net, _) = load(path)?;

    let id = parse_id(id)?;
    let msg = net
        .message(id)
        .context(format!("No message with id 0x{id:x}"))?;
    let payload = hex::decode(payload).context("Payload is not valid hex")?;

    if payload.len() < msg.size as usize {
        bail!(
            "Payload is {} bytes; message `{}` needs {}",
            payload.len(),
            msg.name,
            msg.size
        );
    }

    println!("{} (0x{:x}):", msg.name, msg.id);
    print!("{}", indent(&decode::decode_message(msg, &payload), "  "));
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = PrimaryArgs::parse();

    match args.subcommand {
        Command::Check { in_file } => check(&in_file),
        Command::Fmt { in_file } => {
            let (net, _) = load(&in_file)?;
            DbcTranslator::write_network(&net, io::stdout().lock())
                .context("Failed to write DBC text")
        }
        Command::Json { in_file } => {
            let (net, _) = load(&in_file)?;
            println!("{}", serde_json::to_string_pretty(&net)?);
            Ok(())
        }
        Command::Show { in_file, message } => show(&in_file, message),
        Command::Decode {
            in_file,
            id,
            payload,
        } => decode(&in_file, &id, &payload),
    }
}
