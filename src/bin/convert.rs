//! Spec Conversion CLI
//!
//! Converts API description documents between Swagger 2.0 and OpenAPI 3.x,
//! inspects them, or pushes them through an in-memory project store and back.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use spec_interchange::config::OutputFormat;
use spec_interchange::dialect::{self, Dialect, DialectVersion};
use spec_interchange::model::CollectItem;
use spec_interchange::storage::Project;
use spec_interchange::{Interchange, InterchangeConfig, MemoryStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spec-convert")]
#[command(about = "Convert and inspect Swagger / OpenAPI documents")]
struct Cli {
    /// Configuration file (defaults to interchange.toml lookup)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Compact,
    Yaml,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Pretty => OutputFormat::Pretty,
            Format::Compact => OutputFormat::Compact,
            Format::Yaml => OutputFormat::Yaml,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a document to another dialect version
    Convert {
        /// Input document (JSON or YAML)
        input: PathBuf,
        /// Target version: 2.0, 3.0.0, 3.0.1 or 3.1.x
        #[arg(short, long)]
        to: Option<String>,
        /// Require the input to declare this dialect (swagger, 3.0, 3.1)
        #[arg(short, long)]
        from: Option<String>,
        /// Output layout
        #[arg(long, value_enum)]
        format: Option<Format>,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the dialect, shared definitions and operation tree of a document
    Inspect {
        /// Input document (JSON or YAML)
        input: PathBuf,
    },

    /// Import a document into an in-memory project and export it again
    Roundtrip {
        /// Input document (JSON or YAML)
        input: PathBuf,
        /// Target version of the exported document
        #[arg(short, long)]
        to: Option<String>,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref().map(|p| p.to_string_lossy().into_owned());
    let mut config = InterchangeConfig::load_from(config_path.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Convert {
            input,
            to,
            from,
            format,
            output,
        } => {
            let bytes = read_input(&input)?;
            let hint = from.map(|f| f.parse::<Dialect>()).transpose()?;
            let target = target_version(&config, to.as_deref())?;
            let format = format.map(OutputFormat::from).unwrap_or(config.codec.output);

            let document = dialect::decode(&bytes, hint)
                .with_context(|| format!("decoding {}", input.display()))?;
            let encoded = dialect::encode_as(&document, target, format)?;
            write_output(output.as_deref(), &encoded)?;
        }

        Commands::Inspect { input } => {
            let bytes = read_input(&input)?;
            let parsed = dialect::parse_document(&bytes)?;
            let detected = Dialect::detect(&parsed)?;
            let document = dialect::decode_value(&parsed, Some(detected))?;

            println!("📄 {} {} ({})", document.info.title, document.info.version, detected);
            for server in &document.servers {
                println!("   server: {}", server.url);
            }
            println!();
            println!("📦 Schemas ({})", document.definitions.schemas.len());
            for schema in &document.definitions.schemas {
                println!("   {}", schema.name);
            }
            println!("📦 Common responses ({})", document.definitions.responses.len());
            for response in &document.definitions.responses {
                println!("   {}", response.name);
            }
            println!("📦 Global parameters ({})", document.globals.len());
            for global in &document.globals {
                println!("   {} ({})", global.name, global.location);
            }
            println!();
            println!("🌳 Operations ({})", document.documents().len());
            print_tree(&document.collections, 1);
        }

        Commands::Roundtrip { input, to, output } => {
            let bytes = read_input(&input)?;
            let target = target_version(&config, to.as_deref())?;
            let document = dialect::decode(&bytes, None)?;

            let store = MemoryStore::new();
            store.add_project(Project {
                id: 1,
                info: document.info.clone(),
                servers: document.servers.clone(),
            })?;

            config.codec.default_target = target.declaration();
            let interchange = Interchange::new(&store, config);
            let report = interchange.import_document(1, 0, &document)?;
            for skipped in &report.tree.skipped {
                eprintln!("⚠️  skipped '{}': {}", skipped.title, skipped.reason);
            }
            eprintln!(
                "✅ {} definitions, {} nodes imported",
                report.created_definitions + report.updated_definitions,
                report.tree.nodes.len()
            );

            let encoded = interchange.export_spec(1, None)?;
            write_output(output.as_deref(), &encoded)?;
        }
    }

    Ok(())
}

fn target_version(config: &InterchangeConfig, requested: Option<&str>) -> Result<DialectVersion> {
    let version = match requested {
        Some(raw) => raw.parse()?,
        None => config.default_target()?,
    };
    Ok(version)
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("✅ Written to {}", path.display());
        }
        None => {
            println!("{}", String::from_utf8_lossy(bytes));
        }
    }
    Ok(())
}

fn print_tree(items: &[CollectItem], depth: usize) {
    let indent = "   ".repeat(depth);
    for item in items {
        if item.is_category() {
            println!("{}📁 {}", indent, item.title);
            print_tree(&item.items, depth + 1);
        } else {
            match item.operation() {
                Some(op) => println!("{}{} {}  {}", indent, op.method.to_uppercase(), op.path, item.title),
                None => println!("{}{}", indent, item.title),
            }
        }
    }
}
