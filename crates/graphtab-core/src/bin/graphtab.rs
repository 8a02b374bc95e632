//! # graphtab
//!
//! Round-trips GraphML diagram data through a CSV sheet.
//!
//! ```bash
//! # Export node/edge fields (built-in yEd schema unless --schema is given)
//! graphtab export diagram.graphml -o diagram.csv
//!
//! # Merge edited cells back; writes diagram.merged.graphml by default
//! graphtab import diagram.graphml diagram.csv
//!
//! # Inspect the tree to author schema paths
//! graphtab dump diagram.graphml
//! ```
//!
//! Logging: `GRAPHTAB_LOG` (EnvFilter syntax, default `graphtab=info`),
//! `GRAPHTAB_LOG_FORMAT=json` for machine-readable output.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use graphtab_core::{
    FieldSchema, KeyPurpose, SheetMetadata, check_provenance, collect_all, content_hash, extract,
    merge_document, parse_tree, read_rows, records_from_rows, serialize_tree, write_rows,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "graphtab")]
#[command(version, about = "Edit GraphML diagram data as a flat sheet", long_about = None)]
struct Cli {
    /// Attribute on <key> declarations that names their purpose
    #[arg(long, global = true, default_value = "yfiles.type")]
    key_attribute: String,

    /// Purpose value of the node visual-data key
    #[arg(long, global = true, default_value = "nodegraphics")]
    node_key: String,

    /// Purpose value of the edge visual-data key
    #[arg(long, global = true, default_value = "edgegraphics")]
    edge_key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export node and edge fields to a CSV sheet
    Export {
        /// GraphML document
        input: PathBuf,

        /// Field schema JSON (default: built-in yEd schema)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Output sheet (default: <input>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge an edited sheet back into the document
    Import {
        /// GraphML document the sheet was exported from
        input: PathBuf,

        /// Edited CSV sheet
        sheet: PathBuf,

        /// Field schema JSON overriding the one stored in the sheet
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Output document (default: <input>.merged.graphml)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail instead of writing when the merge produced warnings
        #[arg(long)]
        strict: bool,
    },

    /// Print the parsed document tree as JSON
    Dump {
        /// GraphML document
        input: PathBuf,
    },

    /// Print the built-in yEd field schema
    Schema,
}

impl Cli {
    fn key_purpose(&self) -> KeyPurpose {
        KeyPurpose {
            attribute: self.key_attribute.clone(),
            node: self.node_key.clone(),
            edge: self.edge_key.clone(),
        }
    }
}

fn init_tracing() {
    let log_format = std::env::var("GRAPHTAB_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = tracing_subscriber::EnvFilter::try_from_env("GRAPHTAB_LOG")
        .unwrap_or_else(|_| "graphtab=info,graphtab_core=info".into());

    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(fmt.json())
            .init(),
        _ => tracing_subscriber::registry().with(filter).with(fmt).init(),
    }
}

fn read_document(path: &Path) -> anyhow::Result<(String, String)> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let hash = content_hash(&bytes);
    let text = String::from_utf8(bytes)
        .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
    Ok((text, hash))
}

fn load_schema(path: &Path) -> anyhow::Result<FieldSchema> {
    let json =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    FieldSchema::from_json(&json).with_context(|| format!("schema {}", path.display()))
}

fn run_export(
    purpose: &KeyPurpose,
    input: &Path,
    schema: Option<&Path>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (xml, hash) = read_document(input)?;
    let schema = match schema {
        Some(path) => load_schema(path)?,
        None => FieldSchema::yed_default(),
    };

    let tree = parse_tree(&xml).with_context(|| format!("parsing {}", input.display()))?;
    let entities = collect_all(&tree, purpose)?;
    let records = extract(&tree, &entities, &schema)?;

    let mut metadata = SheetMetadata::new(schema.to_json()?);
    metadata.source_hash = Some(hash);
    metadata.source_name = input.file_name().map(|name| name.to_string_lossy().into_owned());

    let output = output.unwrap_or_else(|| input.with_extension("csv"));
    fs::write(&output, write_rows(&records, &metadata)?)
        .with_context(|| format!("writing {}", output.display()))?;

    tracing::info!(
        rows = records.len(),
        output = %output.display(),
        "export complete"
    );
    Ok(())
}

fn run_import(
    purpose: &KeyPurpose,
    input: &Path,
    sheet: &Path,
    schema: Option<&Path>,
    output: Option<PathBuf>,
    strict: bool,
) -> anyhow::Result<()> {
    let (xml, hash) = read_document(input)?;
    let bytes = fs::read(sheet).with_context(|| format!("reading {}", sheet.display()))?;
    let workbook = read_rows(&bytes).with_context(|| format!("sheet {}", sheet.display()))?;

    let stored_hash = workbook
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.source_hash.as_deref());
    let provenance = check_provenance(&hash, stored_hash);

    let schema = match (schema, workbook.metadata.as_ref()) {
        (Some(path), _) => load_schema(path)?,
        (None, Some(metadata)) => FieldSchema::from_json(&metadata.field_schema)
            .context("field schema stored in the sheet")?,
        (None, None) => bail!(
            "{} has no metadata line; pass --schema to say which paths the columns map to",
            sheet.display()
        ),
    };

    let records = records_from_rows(&workbook.rows)?;
    let mut tree = parse_tree(&xml).with_context(|| format!("parsing {}", input.display()))?;
    let report = merge_document(&mut tree, &records, &schema, purpose)?;

    if strict && (provenance.is_some() || !report.warnings.is_empty()) {
        bail!(
            "--strict: {} merge warning(s){}; nothing written",
            report.warnings.len(),
            if provenance.is_some() {
                " and a provenance warning"
            } else {
                ""
            }
        );
    }

    let output = output.unwrap_or_else(|| input.with_extension("merged.graphml"));
    fs::write(&output, serialize_tree(&tree)?)
        .with_context(|| format!("writing {}", output.display()))?;

    tracing::info!(
        entities = report.entities_updated,
        fields = report.fields_written,
        warnings = report.warnings.len(),
        output = %output.display(),
        "import complete"
    );
    Ok(())
}

fn run_dump(input: &Path) -> anyhow::Result<()> {
    let (xml, _) = read_document(input)?;
    let tree = parse_tree(&xml).with_context(|| format!("parsing {}", input.display()))?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let purpose = cli.key_purpose();
    match cli.command {
        Commands::Export {
            input,
            schema,
            output,
        } => run_export(&purpose, &input, schema.as_deref(), output),
        Commands::Import {
            input,
            sheet,
            schema,
            output,
            strict,
        } => run_import(&purpose, &input, &sheet, schema.as_deref(), output, strict),
        Commands::Dump { input } => run_dump(&input),
        Commands::Schema => {
            println!("{}", FieldSchema::yed_default().to_json_pretty()?);
            Ok(())
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
