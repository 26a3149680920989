//! CLI binary for snote-convert.
//!
//! A thin shim over the library crate: inspect a container, render its pages
//! to PNG, or classify what changed against a saved metadata file.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use snote_convert::pipeline::encode::content_hash;
use snote_convert::{
    classify, decode_stream, ConversionMetadata, DocumentParser, NoteContainer, NoteParser, ParseOptions,
};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Show signature, device generation and page layout
  snote inspect meeting.note

  # Render every page to PNG
  snote render meeting.note -o pages/

  # What changed since the last run? Update the record afterwards.
  snote diff meeting.note --metadata meeting.json --write

ENVIRONMENT VARIABLES:
  RUST_LOG                Override the log filter (e.g. snote_convert=debug)
  SNOTE_MAX_INFLATE       Ceiling on one inflated layer, in bytes
"#;

/// Decode handwritten-note containers and track page changes.
#[derive(Parser, Debug)]
#[command(
    name = "snote",
    version,
    about = "Decode handwritten-note containers and track page changes",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Ceiling on one inflated layer, in bytes.
    #[arg(long, global = true, env = "SNOTE_MAX_INFLATE", default_value_t = 20 * 1024 * 1024)]
    max_inflate: usize,

    /// Decode pages one at a time.
    #[arg(long, global = true)]
    sequential: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SNOTE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SNOTE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the container summary without decoding any bitmap.
    Inspect {
        input: PathBuf,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Decode every page and write `<order>-<id>.png` files.
    Render {
        input: PathBuf,
        /// Output directory.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Classify page changes against a saved metadata JSON file.
    Diff {
        input: PathBuf,
        /// Metadata from the previous run. Missing file means no history.
        #[arg(short, long)]
        metadata: PathBuf,
        /// Overwrite the metadata file with the current page hashes.
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let options = ParseOptions {
        max_inflate_bytes: cli.max_inflate,
        parallel_pages: !cli.sequential,
    };

    match &cli.command {
        Command::Inspect { input, json } => inspect(input, *json),
        Command::Render { input, output } => render(input, output, options, cli.quiet).await,
        Command::Diff {
            input,
            metadata,
            write,
        } => diff(input, metadata, *write, options).await,
    }
}

/// `<order>-<id>.png`, with anything outside `[A-Za-z0-9_-]` in the page id
/// replaced so the name cannot leave the output directory.
fn page_file_name(order: usize, id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{order:03}-{safe}.png")
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn inspect(input: &Path, json: bool) -> Result<()> {
    let bytes = read_input(input)?;
    let container = NoteContainer::open(&bytes).context("Not a readable note container")?;

    if json {
        let pages: Vec<_> = container
            .pages
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id,
                    "order": p.order,
                    "style": p.style,
                    "orientation": p.orientation,
                    "width": p.width,
                    "height": p.height,
                    "layers": p.layer_order,
                    "visibility": p.visibility,
                })
            })
            .collect();
        let summary = serde_json::json!({
            "signature": container.signature,
            "firmware": container.firmware,
            "generation": container.generation,
            "pageWidth": container.page_width,
            "pageHeight": container.page_height,
            "pages": pages,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{} {}", cyan("◆"), bold(&input.display().to_string()));
    println!("  signature   {}", container.signature);
    println!("  generation  {:?} (firmware {})", container.generation, container.firmware);
    println!("  page size   {}x{}", container.page_width, container.page_height);
    println!("  pages       {}", container.pages.len());
    for page in &container.pages {
        let visible: Vec<&str> = page
            .layer_order
            .iter()
            .filter(|l| page.is_layer_visible(l) && page.layer_offset(l).is_some())
            .map(String::as_str)
            .collect();
        println!(
            "  {:>4}  {:<28} {}  {}",
            page.order,
            page.id,
            dim(&format!("{}x{} {}", page.width, page.height, page.style)),
            visible.join(",")
        );
    }
    Ok(())
}

async fn render(input: &Path, output: &Path, options: ParseOptions, quiet: bool) -> Result<()> {
    let bytes = read_input(input)?;
    let total = NoteContainer::open(&bytes)
        .context("Not a readable note container")?
        .pages
        .len();
    tokio::fs::create_dir_all(output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Decoding");
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    };

    let mut pages = decode_stream(bytes, options).context("Not a readable note container")?;
    let mut written = 0usize;
    while let Some(page) = pages.next().await {
        let page = page.context("Page decode failed")?;
        let path = output.join(page_file_name(page.order, &page.id));
        tokio::fs::write(&path, &page.png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        bar.println(format!(
            "  {} page {:>3}  {}",
            green("✓"),
            page.order,
            dim(&path.display().to_string())
        ));
        bar.inc(1);
        written += 1;
    }
    bar.finish_and_clear();

    if !quiet {
        eprintln!(
            "{} {} of {} page(s) written to {}",
            green("✔"),
            bold(&written.to_string()),
            total,
            output.display()
        );
    }
    Ok(())
}

async fn diff(input: &Path, metadata_path: &Path, write: bool, options: ParseOptions) -> Result<()> {
    let bytes = read_input(input)?;
    let file_hash = content_hash(&bytes);

    let saved: Option<ConversionMetadata> = match tokio::fs::read_to_string(metadata_path).await {
        Ok(text) => Some(
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid metadata file {}", metadata_path.display()))?,
        ),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", metadata_path.display()))
        }
    };

    let parser = NoteParser::new(options);
    let document = tokio::task::spawn_blocking(move || parser.parse(&bytes))
        .await
        .context("Decode task failed")?
        .context("Not a readable note container")?;

    let page_hashes = document.page_hashes();
    let saved_hashes = saved
        .as_ref()
        .map(|m| m.page_hashes.as_slice())
        .filter(|h| !h.is_empty());
    let diff = classify(&page_hashes, saved_hashes);
    println!("{}", serde_json::to_string_pretty(&diff)?);

    if write {
        let source = input
            .to_str()
            .map(str::to_string)
            .unwrap_or_else(|| input.display().to_string());
        let keep = saved.as_ref().is_some_and(|m| m.keep);
        if document.pages.is_empty() {
            bail!("No decodable pages; refusing to overwrite {}", metadata_path.display());
        }
        let updated = ConversionMetadata {
            source: Some(source),
            parser: Some(snote_convert::parser::NOTE_PARSER_ID.to_string()),
            file_hash: Some(file_hash),
            page_hashes,
            keep,
        };
        tokio::fs::write(metadata_path, serde_json::to_string_pretty(&updated)?)
            .await
            .with_context(|| format!("Failed to write {}", metadata_path.display()))?;
        eprintln!("{} metadata updated: {}", green("✔"), metadata_path.display());
    }
    Ok(())
}
