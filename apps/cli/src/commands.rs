//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use yuque_export_api::YuqueClient;
use yuque_export_core::{
    DocSelection, DocumentListing, ExportRequest, ExportSummary, ExportedDocument, Exporter,
    IdSelection, ProgressReporter, RepositorySummary, list_documents, plan_targets, select_repos,
};
use yuque_export_fetcher::AssetFetcher;
use yuque_export_markdown::RegexRewriter;
use yuque_export_shared::{
    AppConfig, ClientConfig, DocId, ExportConfig, ExportError, Repository, init_config,
    load_config, resolve_token,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// yuque-export: export Yuque knowledge bases to local markdown.
#[derive(Parser)]
#[command(
    name = "yuque-export",
    version,
    about = "Export Yuque knowledge bases to local markdown with images and attachments.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Access token; overrides the env var named by `api.token_env`.
    #[arg(long, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Export repositories to markdown.
    Export {
        /// Export every document of every repository.
        #[arg(long, conflicts_with_all = ["repo", "doc"])]
        all: bool,

        /// Repository ids (comma-separated) or ALL.
        #[arg(long)]
        repo: Option<IdSelection>,

        /// Documents to export as `[REPO_ID:]IDS|ALL`; repeat once per repository.
        /// The `REPO_ID:` prefix is required when several repositories are selected.
        #[arg(long)]
        doc: Vec<DocSelection>,

        /// Output directory (defaults to `export.output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List the repositories of the authenticated user.
    Repos,

    /// List the documents of one repository with their TOC paths.
    Docs {
        /// Repository id.
        #[arg(long)]
        repo: u64,
    },

    /// Show the remaining API quota for this hour.
    Quota,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "yuque_export=info",
        1 => "yuque_export=debug",
        _ => "yuque_export=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let token = cli.token;
    match cli.command {
        Command::Export {
            all,
            repo,
            doc,
            out,
        } => cmd_export(token, all, repo, doc, out).await,
        Command::Repos => cmd_repos(token).await,
        Command::Docs { repo } => cmd_docs(token, repo).await,
        Command::Quota => cmd_quota(token).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Load config and build an API client, preferring `--token` over the env var.
fn connect(token: Option<String>) -> Result<(AppConfig, ClientConfig, YuqueClient)> {
    let config = load_config()?;
    let token = match token {
        Some(t) if !t.trim().is_empty() => t.trim().to_string(),
        _ => resolve_token(&config)?,
    };
    let client_config = ClientConfig::from_app(&config, token)?;
    let api = YuqueClient::new(&client_config)?;
    Ok((config, client_config, api))
}

/// Log the remaining quota. Lookup errors are logged, never returned.
async fn log_quota(api: &YuqueClient, when: &str) {
    match api.rate_limit_remaining().await {
        Ok(Some(remaining)) => info!(remaining, when, "API quota"),
        Ok(None) => info!(when, "API quota not reported"),
        Err(e) => warn!(error = %e, when, "could not read API quota"),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_export(
    token: Option<String>,
    all: bool,
    repo: Option<IdSelection>,
    doc: Vec<DocSelection>,
    out: Option<PathBuf>,
) -> Result<()> {
    let repo_selection = match (all, repo) {
        (true, _) => IdSelection::All,
        (false, Some(selection)) => selection,
        (false, None) => return Err(eyre!("nothing to export: pass --all or --repo <IDS|ALL>")),
    };

    let (config, client_config, api) = connect(token)?;
    log_quota(&api, "before export").await;

    let user = api.current_user().await?;
    info!(user = %user.login, id = user.id, "authenticated");

    let owned = api.list_repos(user.id).await?;
    let repositories = select_repos(&owned, &repo_selection)?;
    if repositories.is_empty() {
        println!("No repositories to export.");
        return Ok(());
    }

    let targets = plan_targets(repositories, &doc)?;

    let mut export_config = ExportConfig::from(&config);
    if let Some(out) = out {
        export_config.output_root = out;
    }
    let output_root = export_config.output_root.clone();

    let rewriter =
        RegexRewriter::with_origins(&config.export.image_origin, &config.export.attachment_origin)?;
    let exporter = Exporter::new(
        api.clone(),
        AssetFetcher::new(&client_config)?,
        Box::new(rewriter),
        export_config,
    );

    let request = ExportRequest { targets };

    let reporter = CliProgress::new();
    let summary = exporter.export(&request, &reporter).await?;
    reporter.finish();

    print_summary(&summary, &output_root);
    log_quota(&api, "after export").await;

    Ok(())
}

fn print_summary(summary: &ExportSummary, output_root: &std::path::Path) {
    println!();
    println!("  Export finished.");
    println!("  Output:    {}", output_root.display());
    println!("  Exported:  {}", summary.exported_count());
    println!("  Failed:    {}", summary.failed_count());
    println!("  Not found: {}", summary.not_found_count());
    println!("  Time:      {:.1}s", summary.elapsed.as_secs_f64());

    for repo in summary.failed_repositories() {
        if let Some(error) = &repo.error {
            println!("  ! {} ({}): {error}", repo.repository.name, repo.repository.id);
        }
    }
    for repo in &summary.repositories {
        for failed in &repo.failed {
            println!("  ! {} ({}): {}", failed.title, failed.doc_id, failed.error);
        }
    }
    println!();
}

async fn cmd_repos(token: Option<String>) -> Result<()> {
    let (_, _, api) = connect(token)?;
    let user = api.current_user().await?;
    let repos = api.list_repos(user.id).await?;

    println!("{:<12} {}", "ID", "NAME");
    for repo in &repos {
        match &repo.namespace {
            Some(ns) => println!("{:<12} {} ({ns})", repo.id, repo.name),
            None => println!("{:<12} {}", repo.id, repo.name),
        }
    }
    Ok(())
}

async fn cmd_docs(token: Option<String>, repo_id: u64) -> Result<()> {
    let (_, _, api) = connect(token)?;
    let listing = list_documents(&api, repo_id).await?;

    println!("{:<12} {:<40} {}", "ID", "TITLE", "PATH");
    for doc in &listing.documents {
        println!("{:<12} {:<40} {}", doc.id, doc.title, doc.path);
    }
    println!();
    println!("{} documents (reported total {})", listing.documents.len(), listing.reported_total);
    Ok(())
}

async fn cmd_quota(token: Option<String>) -> Result<()> {
    let (_, _, api) = connect(token)?;
    match api.rate_limit_remaining().await? {
        Some(remaining) => println!("Remaining API requests this hour: {remaining}"),
        None => println!("The server did not report a remaining quota."),
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn repository_started(&self, repo: &Repository, documents: usize) {
        self.spinner
            .set_message(format!("{}: {documents} documents", repo.name));
    }

    fn document_started(&self, doc: &DocumentListing, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Exporting [{current}/{total}] {}", doc.title));
    }

    fn document_exported(&self, doc: &ExportedDocument) {
        self.spinner.println(format!("  ✓ {}", doc.markdown_path.display()));
    }

    fn document_failed(&self, doc: &DocumentListing, error: &ExportError) {
        self.spinner.println(format!("  ✗ {} ({}): {error}", doc.title, doc.id));
    }

    fn document_not_found(&self, repo: &Repository, doc_id: DocId) {
        self.spinner
            .println(format!("  ? document {doc_id} not found in {}", repo.name));
    }

    fn repository_finished(&self, summary: &RepositorySummary) {
        let line = match &summary.error {
            Some(error) => format!("{}: skipped ({error})", summary.repository.name),
            None => format!(
                "{}: {} exported, {} failed",
                summary.repository.name,
                summary.exported.len(),
                summary.failed.len()
            ),
        };
        self.spinner.println(line);
    }
}
