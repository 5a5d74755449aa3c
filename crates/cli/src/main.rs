use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use repoguard_codehost::{HostClient, RepoCoordinates};
use repoguard_detect::{
    recommendation, Comparator, ComparisonReport, Discoverer, OpenAiCompatProvider, RepoSearch,
    ScanFinding, ScanRunner,
};
use repoguard_ledger::digest::{self, RepoDigestInput};
use repoguard_ledger::{
    Ledger, LedgerEvent, LedgerRequest, RepositoryRecord, ViolationRecord, ViolationStatus,
};

use crate::config::AppConfig;

mod config;

#[derive(Parser)]
#[command(name = "repoguard")]
#[command(about = "Register repositories and track unauthorized copies", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for data)
    #[arg(long, global = true)]
    quiet: bool,

    /// Output JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// Config file path (default: ~/.config/repoguard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ledger snapshot path (default: REPOGUARD_LEDGER, else the user data dir)
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a repository you own for protection
    Register(RegisterArgs),

    /// Compare two repositories and print a similarity report
    Compare(CompareArgs),

    /// Discover and compare candidate copies of a registered repository
    Scan(ScanArgs),

    /// File a violation claim against a registered repository
    Report(ReportArgs),

    /// Move a violation claim through its review lifecycle
    #[command(name = "update-status")]
    UpdateStatus(UpdateStatusArgs),

    /// Change the license recorded for a repository you own
    #[command(name = "update-license")]
    UpdateLicense(UpdateLicenseArgs),

    /// Retire a repository registration (its violations stay on file)
    Deactivate(DeactivateArgs),

    /// Show one repository and every violation filed against it
    Show(ShowArgs),

    /// List registered repositories or violation claims
    List(ListArgs),

    /// Print ledger-wide counts
    Status,
}

#[derive(Args)]
struct RegisterArgs {
    /// Repository URL (github.com, gitlab.com, bitbucket.org)
    url: String,

    /// Owning account recorded in the ledger (default: `actor` from config)
    #[arg(long)]
    owner: Option<String>,

    /// License the repository is published under
    #[arg(long, default_value = "UNLICENSED")]
    license: String,

    /// Key features to register (comma-separated; default: derived from the description)
    #[arg(long, value_delimiter = ',')]
    features: Vec<String>,
}

#[derive(Args)]
struct CompareArgs {
    /// The repository you believe was copied
    original: String,

    /// The suspected copy
    candidate: String,
}

#[derive(Args)]
struct ScanArgs {
    /// Ledger id of the repository to scan for
    #[arg(long)]
    repo_id: u64,

    /// File violation claims for findings above the report threshold
    #[arg(long)]
    submit: bool,

    /// Reporter recorded on filed claims (default: `actor` from config)
    #[arg(long)]
    reporter: Option<String>,
}

#[derive(Args)]
struct ReportArgs {
    /// URL of the violating repository
    url: String,

    /// Ledger id of the repository that was copied
    #[arg(long)]
    repo_id: u64,

    /// Similarity score as an integer percentage; 70 or higher is admitted
    #[arg(long)]
    score: u8,

    /// Evidence line backing the claim (repeatable)
    #[arg(long)]
    evidence: Vec<String>,

    /// Reporter recorded on the claim (default: `actor` from config)
    #[arg(long)]
    reporter: Option<String>,
}

#[derive(Args)]
struct UpdateStatusArgs {
    /// Violation id
    violation_id: u64,

    /// New status
    #[arg(value_enum)]
    status: StatusFlag,

    /// External case or takedown reference recorded with the change
    #[arg(long)]
    reference: Option<String>,

    /// Acting account (default: `actor` from config)
    #[arg(long)]
    actor: Option<String>,
}

#[derive(Args)]
struct UpdateLicenseArgs {
    /// Repository id
    repo_id: u64,

    /// New license
    license: String,

    /// Acting account (default: `actor` from config)
    #[arg(long)]
    actor: Option<String>,
}

#[derive(Args)]
struct DeactivateArgs {
    /// Repository id
    repo_id: u64,

    /// Acting account (default: `actor` from config)
    #[arg(long)]
    actor: Option<String>,
}

#[derive(Args)]
struct ShowArgs {
    /// Repository id
    repo_id: u64,
}

#[derive(Args)]
struct ListArgs {
    /// What to list
    #[arg(value_enum)]
    what: ListKind,

    /// Only repositories registered to this owner (repos)
    #[arg(long)]
    owner: Option<String>,

    /// Only violations filed against this repository (violations)
    #[arg(long)]
    repo_id: Option<u64>,
}

#[derive(Copy, Clone, ValueEnum)]
enum ListKind {
    Repos,
    Violations,
}

#[derive(Copy, Clone, ValueEnum)]
enum StatusFlag {
    Verified,
    Disputed,
    Resolved,
    Rejected,
}

impl StatusFlag {
    const fn as_domain(self) -> ViolationStatus {
        match self {
            StatusFlag::Verified => ViolationStatus::Verified,
            StatusFlag::Disputed => ViolationStatus::Disputed,
            StatusFlag::Resolved => ViolationStatus::Resolved,
            StatusFlag::Rejected => ViolationStatus::Rejected,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON parsing.
    if cli.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Register(args) => run_register(args, &config, cli.ledger, cli.json).await,
        Commands::Compare(args) => run_compare(args, &config, cli.json).await,
        Commands::Scan(args) => run_scan(args, &config, cli.ledger, cli.json).await,
        Commands::Report(args) => run_report(args, &config, cli.ledger, cli.json).await,
        Commands::UpdateStatus(args) => {
            run_update_status(args, &config, cli.ledger, cli.json).await
        }
        Commands::UpdateLicense(args) => {
            run_update_license(args, &config, cli.ledger, cli.json).await
        }
        Commands::Deactivate(args) => run_deactivate(args, &config, cli.ledger, cli.json).await,
        Commands::Show(args) => run_show(args, &config, cli.ledger, cli.json).await,
        Commands::List(args) => run_list(args, &config, cli.ledger, cli.json).await,
        Commands::Status => run_status(&config, cli.ledger, cli.json).await,
    }
}

async fn open_ledger(config: &AppConfig, flag: Option<PathBuf>) -> Result<Ledger> {
    let path = config.ledger_path(flag);
    log::debug!("ledger snapshot: {}", path.display());
    Ledger::open(config.ledger_config(path))
        .await
        .context("opening the ledger")
}

fn build_client(config: &AppConfig) -> Result<Arc<HostClient>> {
    Ok(Arc::new(HostClient::new(&config.host_config())?))
}

fn make_comparator(config: &AppConfig, client: Arc<HostClient>) -> Result<Comparator> {
    let mut comparator = Comparator::new(client, config.weights);
    if config.reasoning.enabled {
        let provider = OpenAiCompatProvider::new(&config.reasoning.provider)?;
        comparator = comparator.with_reasoning(Arc::new(provider));
    }
    Ok(comparator)
}

fn resolve_actor(flag: Option<String>, config: &AppConfig, role: &str) -> Result<String> {
    flag.or_else(|| config.actor.clone()).with_context(|| {
        format!("no {role} given; pass --{role} or set `actor` in the config file")
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Analyze the repository, derive its digests, and record it in the ledger.
async fn run_register(
    args: RegisterArgs,
    config: &AppConfig,
    ledger_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let owner = resolve_actor(args.owner, config, "owner")?;
    let coords = RepoCoordinates::parse(&args.url)?;
    let client = build_client(config)?;
    let analysis = client
        .analyze(&coords)
        .await
        .with_context(|| format!("analyzing {coords}"))?;

    let key_features = if args.features.is_empty() {
        digest::key_features_from_text(analysis.description.as_deref().unwrap_or_default())
    } else {
        args.features
    };
    let content_hash = digest::content_hash(&RepoDigestInput {
        url: &analysis.canonical_url,
        name: &analysis.name,
        description: analysis.description.as_deref().unwrap_or_default(),
        language: analysis.language.as_deref().unwrap_or_default(),
        created_at: analysis.created_at.as_deref().unwrap_or_default(),
        files: &analysis.top_level_files,
    });
    let code_fingerprint = digest::code_fingerprint(
        &analysis.canonical_url,
        analysis.created_at.as_deref().unwrap_or_default(),
        analysis.size_kb,
    );

    let ledger = open_ledger(config, ledger_path).await?;
    let event = ledger
        .submit(LedgerRequest::RegisterRepository {
            owner,
            url: analysis.canonical_url.clone(),
            content_hash,
            code_fingerprint,
            key_features,
            license_type: args.license,
        })
        .await?;
    let LedgerEvent::RepositoryRegistered { id, .. } = event else {
        anyhow::bail!("unexpected ledger event: {event:?}");
    };
    let record = ledger
        .repository(id)
        .await
        .context("reading back the new record")?;

    if json {
        print_json(&record)
    } else {
        println!("Registered repository #{id}: {}", record.canonical_url);
        print_repository_details(&record);
        Ok(())
    }
}

async fn run_compare(args: CompareArgs, config: &AppConfig, json: bool) -> Result<()> {
    let original = RepoCoordinates::parse(&args.original)?;
    let candidate = RepoCoordinates::parse(&args.candidate)?;
    let client = build_client(config)?;
    let comparator = make_comparator(config, client)?;
    let report = comparator.compare(&original, &candidate).await;

    if json {
        print_json(&serde_json::json!({
            "original": original.canonical_url(),
            "candidate": candidate.canonical_url(),
            "report": report,
            "recommendation": recommendation(report.composite),
        }))
    } else {
        println!(
            "{} vs {}",
            original.canonical_url(),
            candidate.canonical_url()
        );
        print_report(&report);
        println!("Recommendation: {}", recommendation(report.composite));
        Ok(())
    }
}

#[derive(Serialize)]
struct ScanOutput {
    repository_id: u64,
    target: String,
    findings: Vec<ScanFinding>,
    filed: Vec<u64>,
}

/// Scan for copies of a registered repository, optionally filing claims for
/// findings above the configured report threshold.
async fn run_scan(
    args: ScanArgs,
    config: &AppConfig,
    ledger_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let ledger = open_ledger(config, ledger_path).await?;
    let record = ledger
        .repository(args.repo_id)
        .await
        .with_context(|| format!("repository #{} is not registered", args.repo_id))?;
    anyhow::ensure!(record.active, "repository #{} is deactivated", record.id);

    let client = build_client(config)?;
    let discoverer = Discoverer::new(
        Arc::clone(&client) as Arc<dyn RepoSearch>,
        config.discovery_config(),
    );
    let comparator = make_comparator(config, Arc::clone(&client))?;
    let mut runner = ScanRunner::new(client, discoverer, comparator);

    let feature_text = record.key_features.join("\n");
    let findings = runner.scan(&record.canonical_url, &feature_text).await?;

    let mut filed = Vec::new();
    if args.submit {
        let reporter = resolve_actor(args.reporter, config, "reporter")?;
        let now = unix_now();
        for finding in &findings {
            if finding.report.composite <= config.scan.report_threshold {
                continue;
            }
            let score = digest::score_to_int(finding.report.composite);
            let evidence_hash =
                digest::evidence_hash(&finding.candidate.url, score, now, &finding.report.evidence);
            let request = LedgerRequest::ReportViolation {
                reporter: reporter.clone(),
                repository_id: record.id,
                violating_url: finding.candidate.url.clone(),
                evidence_hash,
                similarity_score: score,
            };
            match ledger.submit(request).await {
                Ok(LedgerEvent::ViolationReported { id, .. }) => filed.push(id),
                Ok(event) => log::warn!("unexpected ledger event: {event:?}"),
                Err(err) => log::warn!("claim for {} not filed: {err}", finding.candidate.url),
            }
        }
    }

    if json {
        print_json(&ScanOutput {
            repository_id: record.id,
            target: record.canonical_url,
            findings,
            filed,
        })
    } else {
        println!(
            "Scanned {}: {} candidate(s) compared",
            record.canonical_url,
            findings.len()
        );
        for (i, finding) in findings.iter().enumerate() {
            println!();
            println!(
                "{}. {} ({} stars)",
                i + 1,
                finding.candidate.url,
                finding.candidate.stars
            );
            print_report(&finding.report);
            println!(
                "  Recommendation: {}",
                recommendation(finding.report.composite)
            );
        }
        if args.submit {
            println!();
            if filed.is_empty() {
                println!(
                    "No finding cleared the report threshold of {:.2}",
                    config.scan.report_threshold
                );
            } else {
                let ids: Vec<String> = filed.iter().map(|id| format!("#{id}")).collect();
                println!("Filed violation claim(s): {}", ids.join(", "));
            }
        }
        Ok(())
    }
}

async fn run_report(
    args: ReportArgs,
    config: &AppConfig,
    ledger_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let reporter = resolve_actor(args.reporter, config, "reporter")?;
    let violating = RepoCoordinates::parse(&args.url)?;
    let evidence_hash = digest::evidence_hash(
        &violating.canonical_url(),
        args.score,
        unix_now(),
        &args.evidence,
    );

    let ledger = open_ledger(config, ledger_path).await?;
    let event = ledger
        .submit(LedgerRequest::ReportViolation {
            reporter,
            repository_id: args.repo_id,
            violating_url: violating.canonical_url(),
            evidence_hash,
            similarity_score: args.score,
        })
        .await?;
    let LedgerEvent::ViolationReported { id, .. } = event else {
        anyhow::bail!("unexpected ledger event: {event:?}");
    };
    let record = ledger
        .violation(id)
        .await
        .context("reading back the new claim")?;

    if json {
        print_json(&record)
    } else {
        println!(
            "Filed violation #{id} against repository #{}",
            record.original_repo_id
        );
        println!(
            "  {} scored {}",
            record.violating_url, record.similarity_score
        );
        Ok(())
    }
}

async fn run_update_status(
    args: UpdateStatusArgs,
    config: &AppConfig,
    ledger_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let actor = resolve_actor(args.actor, config, "actor")?;
    let ledger = open_ledger(config, ledger_path).await?;
    ledger
        .submit(LedgerRequest::UpdateStatus {
            actor,
            violation_id: args.violation_id,
            status: args.status.as_domain(),
            resolution_reference: args.reference,
        })
        .await?;
    let record = ledger
        .violation(args.violation_id)
        .await
        .context("reading back the claim")?;

    if json {
        print_json(&record)
    } else {
        println!("Violation #{} is now {}", record.id, record.status);
        if let Some(reference) = &record.resolution_reference {
            println!("  reference: {reference}");
        }
        Ok(())
    }
}

async fn run_update_license(
    args: UpdateLicenseArgs,
    config: &AppConfig,
    ledger_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let actor = resolve_actor(args.actor, config, "actor")?;
    let ledger = open_ledger(config, ledger_path).await?;
    ledger
        .submit(LedgerRequest::UpdateLicense {
            actor,
            repository_id: args.repo_id,
            license_type: args.license,
        })
        .await?;
    let record = ledger
        .repository(args.repo_id)
        .await
        .context("reading back the record")?;

    if json {
        print_json(&record)
    } else {
        println!(
            "Repository #{} is now licensed {}",
            record.id, record.license_type
        );
        Ok(())
    }
}

async fn run_deactivate(
    args: DeactivateArgs,
    config: &AppConfig,
    ledger_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let actor = resolve_actor(args.actor, config, "actor")?;
    let ledger = open_ledger(config, ledger_path).await?;
    ledger
        .submit(LedgerRequest::Deactivate {
            actor,
            repository_id: args.repo_id,
        })
        .await?;
    let record = ledger
        .repository(args.repo_id)
        .await
        .context("reading back the record")?;

    if json {
        print_json(&record)
    } else {
        println!("Repository #{} deactivated", record.id);
        Ok(())
    }
}

#[derive(Serialize)]
struct ShowOutput {
    repository: RepositoryRecord,
    violations: Vec<ViolationRecord>,
}

async fn run_show(
    args: ShowArgs,
    config: &AppConfig,
    ledger_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let ledger = open_ledger(config, ledger_path).await?;
    let repository = ledger
        .repository(args.repo_id)
        .await
        .with_context(|| format!("repository #{} is not registered", args.repo_id))?;
    let violations = ledger.violations_for_repository(args.repo_id).await;

    if json {
        print_json(&ShowOutput {
            repository,
            violations,
        })
    } else {
        let state = if repository.active { "active" } else { "inactive" };
        println!("#{} {} ({state})", repository.id, repository.canonical_url);
        print_repository_details(&repository);
        if violations.is_empty() {
            println!("No violations on file");
        } else {
            println!("Violations:");
            for violation in &violations {
                print_violation_line(violation);
            }
        }
        Ok(())
    }
}

async fn run_list(
    args: ListArgs,
    config: &AppConfig,
    ledger_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let ledger = open_ledger(config, ledger_path).await?;
    match args.what {
        ListKind::Repos => {
            let repositories = match &args.owner {
                Some(owner) => ledger.repositories_for_owner(owner).await,
                None => ledger.repositories().await,
            };
            if json {
                return print_json(&repositories);
            }
            if repositories.is_empty() {
                println!("No repositories registered");
            }
            for record in &repositories {
                let state = if record.active { "active" } else { "inactive" };
                println!(
                    "#{:<4} {:<50} {:<14} {:<12} {state}",
                    record.id, record.canonical_url, record.owner, record.license_type
                );
            }
        }
        ListKind::Violations => {
            let violations = match args.repo_id {
                Some(id) => ledger.violations_for_repository(id).await,
                None => ledger.violations().await,
            };
            if json {
                return print_json(&violations);
            }
            if violations.is_empty() {
                println!("No violations on file");
            }
            for record in &violations {
                print_violation_line(record);
            }
        }
    }
    Ok(())
}

async fn run_status(config: &AppConfig, ledger_path: Option<PathBuf>, json: bool) -> Result<()> {
    let ledger = open_ledger(config, ledger_path).await?;
    let summary = ledger.summary().await;

    if json {
        print_json(&summary)
    } else {
        println!(
            "{} repositories registered ({} active), {} violations on file",
            summary.repositories, summary.active_repositories, summary.violations
        );
        for (status, count) in &summary.by_status {
            println!("  {status:<9} {count}");
        }
        Ok(())
    }
}

fn print_repository_details(record: &RepositoryRecord) {
    println!(
        "  owner: {}  license: {}",
        record.owner, record.license_type
    );
    println!("  content hash: {}", record.content_hash);
    if !record.key_features.is_empty() {
        println!("  key features: {}", record.key_features.join(", "));
    }
}

fn print_report(report: &ComparisonReport) {
    println!(
        "  composite {:.2}  (structure {:.2}, content {:.2}, language {:.0}, size {:.2})",
        report.composite,
        report.structure_similarity,
        report.content_similarity,
        report.language_match,
        report.size_ratio
    );
    for line in &report.evidence {
        println!("  - {line}");
    }
}

fn print_violation_line(record: &ViolationRecord) {
    let mut line = format!(
        "#{} [{}] {} score {} by {}",
        record.id, record.status, record.violating_url, record.similarity_score, record.reporter
    );
    if let Some(reference) = &record.resolution_reference {
        line.push_str(&format!(" ({reference})"));
    }
    println!("{line}");
}
