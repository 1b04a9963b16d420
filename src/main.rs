use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;
use std::path::PathBuf;

use stone::codec::Compression;
use stone::payload::{LayoutEntry, Payload, PayloadHeader};
use stone::reader::Reader;
use stone::writer::{Writer, WriterOptions};

#[derive(Parser)]
#[command(name = "stone", about = "Inspect and rewrite stone package archives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the archive header
    Info {
        input: PathBuf,
    },
    /// List every payload and its records
    Inspect {
        input: PathBuf,
        /// Print a JSON summary instead of text
        #[arg(long)]
        json: bool,
    },
    /// Decode every payload and check all checksums
    Verify {
        input: PathBuf,
    },
    /// Re-encode an archive with a different compression policy
    Repack {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Compression: zstd, zlib, lz4, none
        #[arg(short, long)]
        compression: Option<String>,
        /// Compression level (zstd 1-22, zlib 0-9; ignored for lz4/none)
        #[arg(short, long)]
        level: Option<i32>,
        /// JSON file with writer options; flags override it
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    match Cli::parse().command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let reader = Reader::open(&input)?;
            let h = reader.header();
            println!("── stone archive ────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Magic          {:#010x}", h.magic);
            println!("  File type      {}", h.file_type.name());
            println!("  Format version {}", h.format_version);
            println!("  Payloads       {}", h.num_payloads);
        }

        // ── Inspect ──────────────────────────────────────────────────────────
        Commands::Inspect { input, json } => {
            let mut reader = Reader::open(&input)?;
            let header = *reader.header();
            let mut blocks = Vec::new();
            for block in reader.payloads() {
                blocks.push(block?);
            }

            if json {
                let payloads: Vec<_> = blocks.iter().map(|(h, p)| payload_json(h, p)).collect();
                let summary = json!({
                    "file_type":      header.file_type,
                    "format_version": header.format_version,
                    "num_payloads":   header.num_payloads,
                    "payloads":       payloads,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Archive: {} ({} v{})", input.display(), header.file_type.name(), header.format_version);
                for (h, p) in &blocks {
                    println!("{:<11} {:>5} records {:>10} -> {:>10} B  {:<5} {}",
                        h.kind.name(), h.num_records, h.plain_size, h.stored_size,
                        h.compression.name(), hex::encode(h.checksum));
                    for line in record_lines(p) {
                        println!("    {line}");
                    }
                }
            }
        }

        // ── Verify ───────────────────────────────────────────────────────────
        Commands::Verify { input } => {
            let mut reader = Reader::open(&input)?;
            let mut count = 0usize;
            for block in reader.payloads() {
                let (h, _) = block?;
                info!("{} payload ok ({} records)", h.kind, h.num_records);
                count += 1;
            }
            println!("OK: {} payload(s) verified in {}", count, input.display());
        }

        // ── Repack ───────────────────────────────────────────────────────────
        Commands::Repack { input, output, compression, level, config } => {
            let mut options = match config {
                Some(path) => WriterOptions::from_json(&std::fs::read_to_string(path)?)?,
                None       => WriterOptions::default(),
            };
            if let Some(name) = compression {
                options.compression = Compression::from_name(&name)
                    .ok_or_else(|| format!("unknown compression '{name}'"))?;
            }
            if let Some(level) = level {
                options.level = level;
            }

            let mut reader = Reader::open(&input)?;
            options.file_type = reader.header().file_type;
            let mut writer = Writer::create(&output, options)?;
            for block in reader.payloads() {
                let (_, payload) = block?;
                writer.add_payload(&payload)?;
            }
            let count = writer.num_payloads();
            writer.finish()?;
            println!("Repacked {count} payload(s) → {}", output.display());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn record_lines(payload: &Payload) -> Vec<String> {
    match payload {
        Payload::Meta(records) => records
            .iter()
            .map(|r| format!("{:<14} {}", r.tag.name(), r.value))
            .collect(),
        Payload::Content(data) => vec![format!("{} bytes of content", data.len())],
        Payload::Layout(records) => records
            .iter()
            .map(|r| {
                let extra = match &r.entry {
                    LayoutEntry::Regular(digest, _) => format!(" [{digest:032x}]"),
                    LayoutEntry::Symlink(source, _) => format!(" -> {source}"),
                    _ => String::new(),
                };
                format!("{:06o} {}:{} {}{}", r.mode, r.uid, r.gid, r.path_definition(), extra)
            })
            .collect(),
        Payload::Index(records) => records
            .iter()
            .map(|r| format!("{:032x} {}..{}", r.digest, r.start, r.end))
            .collect(),
        Payload::Attributes(records) => records
            .iter()
            .map(|r| format!("{} = {}", String::from_utf8_lossy(&r.key), String::from_utf8_lossy(&r.value)))
            .collect(),
    }
}

fn payload_json(header: &PayloadHeader, payload: &Payload) -> serde_json::Value {
    json!({
        "kind":        header.kind,
        "compression": header.compression,
        "stored_size": header.stored_size,
        "plain_size":  header.plain_size,
        "num_records": header.num_records,
        "checksum":    hex::encode(header.checksum),
        "records":     record_lines(payload),
    })
}
