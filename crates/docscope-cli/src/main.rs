use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docscope_core::{DocumentRecord, RankingPolicy, TargetFormat, TokenizerMode};
use docscope_local::config::{load_env_file, ViewerConfig};
use docscope_local::ingest::{convert_bytes, extract_file, DocOptions};
use docscope_local::{JobConversionClient, MarkupTree, Session};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "docscope")]
#[command(about = "Document viewer core: extract, search and highlight PDF/DOCX/DOC/XLSX", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest files, apply a query, and print the ranked list plus the highlighted preview.
    View(ViewCmd),
    /// Extract one file and print its document record.
    Extract(ExtractCmd),
    /// Convert a legacy document through the conversion service and download the result.
    Convert(ConvertCmd),
    /// Print configuration presence (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct ViewCmd {
    /// Files to ingest, in order.
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Free-text search query.
    #[arg(long, default_value = "")]
    query: String,
    /// Query tokenizer: multi-term|exact-phrase
    #[arg(long, env = "DOCSCOPE_TOKENIZER")]
    tokenizer: Option<TokenizerMode>,
    /// Ranking policy: ranked|boolean
    #[arg(long, env = "DOCSCOPE_RANKING")]
    ranking: Option<RankingPolicy>,
    /// Select the document with this file name instead of the default.
    #[arg(long)]
    select: Option<String>,
    /// Send legacy .doc files to the conversion service.
    #[arg(long, action = clap::ArgAction::Set)]
    doc_conversion: Option<bool>,
    /// Output format: json|text|html
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct ExtractCmd {
    file: PathBuf,
    /// Send a legacy .doc file to the conversion service.
    #[arg(long, action = clap::ArgAction::Set)]
    doc_conversion: Option<bool>,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct ConvertCmd {
    file: PathBuf,
    /// Target format: docx|pdf
    #[arg(long, default_value = "docx")]
    to: TargetFormat,
    /// Where to write the converted file (default: next to the input).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(Serialize)]
struct ListEntry<'a> {
    selected: bool,
    #[serde(flatten)]
    record: ListRecord<'a>,
}

#[derive(Serialize)]
struct ListRecord<'a> {
    id: String,
    name: &'a str,
    format: &'a str,
    error: Option<&'a str>,
}

impl<'a> ListRecord<'a> {
    fn from_record(d: &'a DocumentRecord) -> Self {
        Self {
            id: d.id().to_string(),
            name: d.name(),
            format: d.format().as_str(),
            error: d.error().map(|c| c.as_str()),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn converter(cfg: &ViewerConfig) -> Option<Arc<JobConversionClient>> {
    if !cfg.convert.is_configured() {
        return None;
    }
    match JobConversionClient::new(&cfg.convert) {
        Ok(c) => Some(Arc::new(c)),
        Err(e) => {
            tracing::warn!(error = %e, "conversion client unavailable");
            None
        }
    }
}

async fn run_view(args: ViewCmd) -> Result<()> {
    let mut cfg = ViewerConfig::from_env();
    if let Some(t) = args.tokenizer {
        cfg.tokenizer = t;
    }
    if let Some(r) = args.ranking {
        cfg.ranking = r;
    }
    if let Some(d) = args.doc_conversion {
        cfg.doc_conversion = d;
    }
    let client = converter(&cfg);
    let mut session = Session::new(cfg);
    if let Some(c) = client {
        session = session.with_converter(c);
    }

    session.ingest_paths(&args.files).await;
    session.set_query(&args.query);
    if let Some(name) = args.select.as_deref() {
        if session.select_by_name(name).is_none() {
            tracing::warn!(name, "no document with that name in the filtered list; keeping default selection");
        }
    }
    let (html, markers) = match session.load_preview().await? {
        Some(p) => (Some(p.to_html()), p.marker_count()),
        None => (None, 0),
    };

    let selected = session.selected().map(DocumentRecord::id);
    let keywords: Vec<String> = session.keywords().terms().to_vec();
    let summary = session.summary();
    let notices = session.notices().to_vec();
    let view = session.view();

    match args.output.to_ascii_lowercase().as_str() {
        "html" => println!("{}", html.unwrap_or_default()),
        "text" => {
            for n in &notices {
                println!("! {}", n.message);
            }
            println!("{summary}");
            for d in &view {
                let mark = if Some(d.id()) == selected { '*' } else { ' ' };
                match d.error() {
                    Some(code) => println!("{mark} {} ({}) [{code}]", d.name(), d.format()),
                    None => println!("{mark} {} ({})", d.name(), d.format()),
                }
            }
            if let Some(html) = html {
                println!();
                println!("{}", MarkupTree::parse(&html).plain_text());
            }
        }
        _ => {
            let documents: Vec<ListEntry<'_>> = view
                .iter()
                .map(|d| ListEntry {
                    selected: Some(d.id()) == selected,
                    record: ListRecord::from_record(d),
                })
                .collect();
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "view",
                "ok": true,
                "query": args.query,
                "keywords": keywords,
                "summary": summary,
                "notices": notices,
                "documents": documents,
                "preview": html.map(|h| serde_json::json!({ "html": h, "markers": markers })),
            });
            println!("{v}");
        }
    }
    Ok(())
}

async fn run_extract(args: ExtractCmd) -> Result<()> {
    let mut cfg = ViewerConfig::from_env();
    if let Some(d) = args.doc_conversion {
        cfg.doc_conversion = d;
    }
    let client = converter(&cfg);
    let name = file_name(&args.file);
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("read {}", args.file.display()))?;
    let doc = DocOptions {
        conversion_enabled: cfg.doc_conversion,
        converter: client.as_deref().map(|c| c as &dyn docscope_core::ConversionBackend),
    };
    let (format, content) = extract_file(&name, &bytes, doc)
        .await
        .map_err(|n| anyhow::anyhow!(n.message))?;
    let record = DocumentRecord::new(name, format, content, None);
    match args.output.to_ascii_lowercase().as_str() {
        "text" => println!("{}", record.plain_text()),
        _ => println!("{}", serde_json::to_string(&record)?),
    }
    Ok(())
}

async fn run_convert(args: ConvertCmd) -> Result<()> {
    let cfg = ViewerConfig::from_env();
    let client = JobConversionClient::new(&cfg.convert)?;
    let name = file_name(&args.file);
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("read {}", args.file.display()))?;
    let (outcome, converted) = convert_bytes(&name, &bytes, args.to, &client).await?;
    let ext = match args.to {
        TargetFormat::Docx => "docx",
        TargetFormat::Pdf => "pdf",
    };
    let out = args.out.unwrap_or_else(|| args.file.with_extension(ext));
    tokio::fs::write(&out, &converted)
        .await
        .with_context(|| format!("write {}", out.display()))?;
    tracing::info!(file = %name, out = %out.display(), bytes = converted.len(), "converted");
    let v = serde_json::json!({
        "schema_version": 1,
        "kind": "convert",
        "ok": true,
        "url": outcome.url,
        "output": outcome.output,
        "out_path": out.display().to_string(),
        "bytes": converted.len(),
    });
    println!("{v}");
    Ok(())
}

fn run_doctor(args: DoctorCmd) {
    let cfg = ViewerConfig::from_env();
    let v = serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": true,
        "name": "docscope",
        "version": env!("CARGO_PKG_VERSION"),
        "configured": {
            // Presence only; never print values.
            "convert_endpoint": cfg.convert.endpoint.is_some(),
            "convert_api_key": cfg.convert.api_key.is_some(),
            "doc_conversion": cfg.doc_conversion,
        },
        "settings": {
            "tokenizer": cfg.tokenizer,
            "ranking": cfg.ranking,
            "debounce_ms": cfg.debounce.as_millis() as u64,
            "notice_ttl_ms": cfg.notice_ttl.as_millis() as u64,
            "convert_poll_ms": cfg.convert.poll_interval.as_millis() as u64,
            "convert_timeout_ms": cfg.convert.timeout.as_millis() as u64,
        },
    });
    match args.output.to_ascii_lowercase().as_str() {
        "text" => {
            println!("docscope {}", env!("CARGO_PKG_VERSION"));
            println!("conversion service configured: {}", cfg.convert.is_configured());
            println!("doc conversion enabled: {}", cfg.doc_conversion);
        }
        _ => println!("{v}"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("docscope=info")),
        )
        .init();
    load_env_file();

    let cli = Cli::parse();
    match cli.command {
        Commands::View(args) => run_view(args).await?,
        Commands::Extract(args) => run_extract(args).await?,
        Commands::Convert(args) => run_convert(args).await?,
        Commands::Doctor(args) => run_doctor(args),
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "docscope",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("docscope {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }
    Ok(())
}
