//! CLI binary for clsplit: split a large change into reviewable CLs with
//! owner-aware reviewer suggestions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use clsplit_core::change::ChangedFile;
use clsplit_core::config::SplitConfig;
use clsplit_owners::approval::{ApprovalStatus, files_approval_status};
use clsplit_owners::client::{
    LocalRuleClient, OwnersClient, RemoteRankingClient, validate_rules,
};
use clsplit_owners::suggest::ReviewerSuggester;
use clsplit_plan::cluster::cluster_files;
use clsplit_plan::compose::compose_plan;
use clsplit_plan::serialize::{format_splittings, load_splitting_from_file};

mod scm;

const DEFAULT_PLAN_FILE: &str = "clsplit-plan.txt";
const DEFAULT_TEMPLATE: &str = "Prepare $directory for review.";

#[derive(Parser)]
#[command(name = "clsplit", about = "Split large changes into reviewable CLs")]
struct Cli {
    /// Repository root (defaults to current directory)
    #[arg(short, long, global = true)]
    repo: Option<PathBuf>,

    /// Upstream revision the change is measured against
    #[arg(long, global = true, default_value = "@{u}")]
    upstream: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster the current change and write a reviewer-annotated plan file
    Split {
        /// Description template file; `$directory` expands per CL
        #[arg(short, long)]
        description: Option<PathBuf>,

        /// Where to write the plan
        #[arg(long, default_value = DEFAULT_PLAN_FILE)]
        plan: PathBuf,

        /// Print the plan instead of writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show per-file approval status for the current change
    Status {
        /// Reviewers who have approved (repeatable)
        #[arg(long = "approver")]
        approvers: Vec<String>,

        /// Reviewers on the change (repeatable)
        #[arg(long = "reviewer")]
        reviewers: Vec<String>,
    },

    /// Suggest a covering reviewer set for explicit paths
    Suggest {
        /// Paths to cover
        paths: Vec<String>,

        /// Use a remote ranking endpoint instead of local rule files
        #[arg(long)]
        ranking_url: Option<String>,

        /// Project name for the remote endpoint
        #[arg(long, default_value = "main")]
        project: String,

        /// Branch name for the remote endpoint
        #[arg(long, default_value = "main")]
        branch: String,
    },

    /// Validate a plan file against the current change
    CheckPlan {
        /// Plan file to check
        #[arg(default_value = DEFAULT_PLAN_FILE)]
        plan: PathBuf,
    },

    /// Lint every ownership rule file in the repository
    Validate,
}

fn repo_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.repo {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let root = repo_root(&cli)?;

    match &cli.command {
        Commands::Split {
            description,
            plan,
            dry_run,
        } => cmd_split(
            &root,
            &cli.upstream,
            description.as_deref(),
            plan,
            *dry_run,
        ),
        Commands::Status {
            approvers,
            reviewers,
        } => cmd_status(&root, &cli.upstream, approvers, reviewers),
        Commands::Suggest {
            paths,
            ranking_url,
            project,
            branch,
        } => cmd_suggest(&root, paths, ranking_url.as_deref(), project, branch),
        Commands::CheckPlan { plan } => cmd_check_plan(&root, &cli.upstream, plan),
        Commands::Validate => cmd_validate(&root),
    }
}

/// Changed files plus a local client pinned to the committed rule state.
fn change_context(
    root: &Path,
    upstream: &str,
    config: &SplitConfig,
) -> Result<(Vec<ChangedFile>, LocalRuleClient<clsplit_owners::index::DiskRuleSource>)> {
    let repo = scm::open_repository(root)?;
    let changed = scm::changed_files(&repo, upstream)?;
    let overrides = scm::rules_overrides(&repo, upstream, &changed)?;
    let client = LocalRuleClient::with_overrides(root, overrides)
        .with_batch_workers(config.batch_workers);
    Ok((changed, client))
}

fn cmd_split(
    root: &Path,
    upstream: &str,
    description: Option<&Path>,
    plan_path: &Path,
    dry_run: bool,
) -> Result<()> {
    let config = SplitConfig::load(root)?;
    let (changed, client) = change_context(root, upstream, &config)?;
    if changed.is_empty() {
        tracing::warn!("no files changed against {upstream}; nothing to split");
        return Ok(());
    }

    let template = match description {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read description template {}", path.display()))?
            .trim()
            .to_string(),
        None => DEFAULT_TEMPLATE.to_string(),
    };

    let bins = cluster_files(&changed, config.min_files, config.max_files);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.green} {msg}")
            .expect("valid template"),
    );
    spinner.set_message(format!(
        "resolving owners for {} files in {} CLs",
        changed.len(),
        bins.len()
    ));
    let (plan, warnings) =
        compose_plan(&client, &bins, &template, config.max_combinations)?;
    spinner.finish_and_clear();

    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    let rendered = format_splittings(&plan);
    if dry_run {
        print!("{rendered}");
        return Ok(());
    }

    let preamble = format!(
        "# clsplit plan generated at {}\n\
         # {} files across {} CLs; edit freely, then run `clsplit check-plan`.\n",
        chrono::Utc::now().to_rfc3339(),
        changed.len(),
        plan.cls.len(),
    );
    std::fs::write(plan_path, format!("{preamble}{rendered}"))
        .with_context(|| format!("failed to write plan to {}", plan_path.display()))?;
    println!(
        "wrote {} CLs covering {} files to {}",
        plan.cls.len(),
        changed.len(),
        plan_path.display()
    );
    Ok(())
}

fn cmd_status(
    root: &Path,
    upstream: &str,
    approvers: &[String],
    reviewers: &[String],
) -> Result<()> {
    let config = SplitConfig::load(root)?;
    let (changed, client) = change_context(root, upstream, &config)?;
    let paths: Vec<String> = changed.iter().map(|f| f.path.clone()).collect();

    let status = files_approval_status(&client, &paths, approvers, reviewers)?;
    let mut insufficient = 0usize;
    for (path, verdict) in &status {
        if *verdict == ApprovalStatus::InsufficientReviewers {
            insufficient += 1;
        }
        println!("{:<24} {path}", verdict.to_string());
    }
    if insufficient > 0 {
        anyhow::bail!("{insufficient} file(s) have no owner among the reviewers");
    }
    Ok(())
}

fn cmd_suggest(
    root: &Path,
    paths: &[String],
    ranking_url: Option<&str>,
    project: &str,
    branch: &str,
) -> Result<()> {
    if paths.is_empty() {
        anyhow::bail!("no paths given");
    }
    let config = SplitConfig::load(root)?;

    let remote;
    let local;
    let client: &dyn OwnersClient = match ranking_url {
        Some(url) => {
            remote = RemoteRankingClient::new(url, project, branch);
            &remote
        }
        None => {
            local = LocalRuleClient::from_root(root);
            &local
        }
    };

    let suggestion = ReviewerSuggester::new(client)
        .with_max_combinations(config.max_combinations)
        .suggest_owners(paths)?;

    if suggestion.owners.is_empty() {
        println!("no owners found");
    } else {
        println!("{}", suggestion.owners.join(", "));
    }
    for path in &suggestion.uncovered {
        tracing::warn!("no suggested owner covers {path}");
    }
    if !suggestion.is_complete() {
        anyhow::bail!("suggested set does not cover every path");
    }
    Ok(())
}

fn cmd_check_plan(root: &Path, upstream: &str, plan_path: &Path) -> Result<()> {
    let config = SplitConfig::load(root)?;
    let (changed, _) = change_context(root, upstream, &config)?;

    let loaded = load_splitting_from_file(plan_path, &changed)?;
    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }
    println!(
        "{}: {} CLs covering {} files ({} warnings)",
        plan_path.display(),
        loaded.plan.cls.len(),
        loaded.plan.all_files().count(),
        loaded.warnings.len()
    );
    Ok(())
}

fn cmd_validate(root: &Path) -> Result<()> {
    let findings = validate_rules(root)?;
    if findings.is_empty() {
        println!("all ownership rule files parse cleanly");
        return Ok(());
    }
    for finding in &findings {
        eprintln!("{finding}");
    }
    anyhow::bail!("{} malformed rule file(s)", findings.len());
}
