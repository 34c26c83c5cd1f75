//! twig CLI: the command-line front end to twig-core.

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use twig_core::commit::Commit;
use twig_core::merge::MergeOutcome;
use twig_core::state::Unstaged;
use twig_core::{ErrorKind, Repository, TwigError};

#[derive(Parser)]
#[command(name = "twig", about = "twig: a content-addressed version control system", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new repository in the current directory.
    Init,

    /// Stage a file for the next commit.
    Add { file: String },

    /// Record the stage as a new commit.
    Commit { message: String },

    /// Unstage a file, or stage its removal and delete it.
    Rm { file: String },

    /// Show first-parent history of the current branch.
    Log {
        /// Output format: "human" (default) or "json".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// Show every commit ever made.
    GlobalLog {
        /// Output format: "human" (default) or "json".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// Print the ids of commits with the given message.
    Find { message: String },

    /// Show branches, staged changes and working directory state.
    Status {
        /// Output format: "human" (default) or "json".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// `checkout -- <file>`, `checkout <commit> -- <file>` or `checkout <branch>`.
    Checkout {
        /// Branch name, or commit id when a file follows `--`.
        target: Option<String>,

        /// File to restore.
        #[arg(last = true)]
        file: Option<String>,
    },

    /// Create a branch at the current commit.
    Branch { name: String },

    /// Delete a branch.
    RmBranch { name: String },

    /// Check out a commit and move the current branch to it.
    Reset { commit: String },

    /// Merge a branch into the current branch.
    Merge { branch: String },

    /// Register another repository's `.twig` directory as a remote.
    AddRemote { name: String, path: String },

    /// Forget a remote.
    RmRemote { name: String },

    /// Send the current branch to a remote branch.
    Push { remote: String, branch: String },

    /// Copy a remote branch into `<remote>/<branch>`.
    Fetch { remote: String, branch: String },

    /// Fetch a remote branch and merge it.
    Pull { remote: String, branch: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TWIG_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("error: cannot determine current directory: {e}");
        process::exit(1);
    });

    let result = match cli.command {
        Commands::Init => cmd_init(&cwd),
        Commands::Add { file } => cmd_add(&cwd, &file),
        Commands::Commit { message } => cmd_commit(&cwd, &message),
        Commands::Rm { file } => cmd_rm(&cwd, &file),
        Commands::Log { format } => cmd_log(&cwd, &format, false),
        Commands::GlobalLog { format } => cmd_log(&cwd, &format, true),
        Commands::Find { message } => cmd_find(&cwd, &message),
        Commands::Status { format } => cmd_status(&cwd, &format),
        Commands::Checkout { target, file } => cmd_checkout(&cwd, target, file),
        Commands::Branch { name } => cmd_branch(&cwd, &name),
        Commands::RmBranch { name } => cmd_rm_branch(&cwd, &name),
        Commands::Reset { commit } => cmd_reset(&cwd, &commit),
        Commands::Merge { branch } => cmd_merge(&cwd, &branch),
        Commands::AddRemote { name, path } => cmd_add_remote(&cwd, &name, &path),
        Commands::RmRemote { name } => cmd_rm_remote(&cwd, &name),
        Commands::Push { remote, branch } => cmd_push(&cwd, &remote, &branch),
        Commands::Fetch { remote, branch } => cmd_fetch(&cwd, &remote, &branch),
        Commands::Pull { remote, branch } => cmd_pull(&cwd, &remote, &branch),
    };

    if let Err(e) = result {
        report_error(e.as_ref());
        process::exit(1);
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Refused commands print their message as is; anything else is a failure
/// of the repository or the machine and is also logged.
fn report_error(e: &(dyn std::error::Error + 'static)) {
    match e.downcast_ref::<TwigError>().map(TwigError::kind) {
        Some(ErrorKind::Precondition) | None => eprintln!("{e}"),
        Some(ErrorKind::Integrity) => {
            tracing::error!(error = %e, "repository integrity check failed");
            eprintln!("error: {e}");
        }
        Some(ErrorKind::Io) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
        }
    }
}

fn cmd_init(cwd: &Path) -> CmdResult {
    Repository::init(cwd)?;
    Ok(())
}

fn cmd_add(cwd: &Path, file: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    repo.add(file)?;
    Ok(())
}

fn cmd_commit(cwd: &Path, message: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    repo.commit(message)?;
    Ok(())
}

fn cmd_rm(cwd: &Path, file: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    repo.remove(file)?;
    Ok(())
}

fn print_commit(commit: &Commit) {
    println!("===");
    println!("commit {}", commit.id);
    if commit.is_merge() {
        println!("Merge: {} {}", short(&commit.parents[0]), short(&commit.parents[1]));
    }
    let local = commit.timestamp.with_timezone(&chrono::Local);
    println!("Date: {}", local.format("%a %b %-d %H:%M:%S %Y %z"));
    println!("{}", commit.message);
    println!();
}

fn short(id: &str) -> &str {
    &id[..id.len().min(7)]
}

fn cmd_log(cwd: &Path, format: &str, global: bool) -> CmdResult {
    let repo = Repository::open(cwd)?;
    let commits = if global {
        repo.global_log()?
    } else {
        repo.log()?
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&commits)?),
        _ => commits.iter().for_each(print_commit),
    }
    Ok(())
}

fn cmd_find(cwd: &Path, message: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    for id in repo.find(message)? {
        println!("{id}");
    }
    Ok(())
}

fn cmd_status(cwd: &Path, format: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    let status = repo.status()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("=== Branches ===");
    for branch in &status.branches {
        if *branch == status.current_branch {
            println!("*{branch}");
        } else {
            println!("{branch}");
        }
    }
    println!();

    println!("=== Staged Files ===");
    status.staged.iter().for_each(|p| println!("{p}"));
    println!();

    println!("=== Removed Files ===");
    status.removed.iter().for_each(|p| println!("{p}"));
    println!();

    println!("=== Modifications Not Staged For Commit ===");
    for change in &status.not_staged {
        let label = match change.kind {
            Unstaged::Modified => "modified",
            Unstaged::Deleted => "deleted",
        };
        println!("{} ({label})", change.path);
    }
    println!();

    println!("=== Untracked Files ===");
    status.untracked.iter().for_each(|p| println!("{p}"));
    println!();

    Ok(())
}

fn cmd_checkout(cwd: &Path, target: Option<String>, file: Option<String>) -> CmdResult {
    let repo = Repository::open(cwd)?;
    match (target, file) {
        (None, Some(file)) => repo.checkout_file(&file)?,
        (Some(commit), Some(file)) => repo.checkout_file_from(&commit, &file)?,
        (Some(branch), None) => repo.checkout_branch(&branch)?,
        (None, None) => return Err("Incorrect operands.".into()),
    }
    Ok(())
}

fn cmd_branch(cwd: &Path, name: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    repo.branch(name)?;
    Ok(())
}

fn cmd_rm_branch(cwd: &Path, name: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    repo.remove_branch(name)?;
    Ok(())
}

fn cmd_reset(cwd: &Path, commit: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    repo.reset(commit)?;
    Ok(())
}

fn report_merge(outcome: &MergeOutcome) {
    match outcome {
        MergeOutcome::FastForward { .. } => println!("Current branch fast-forwarded."),
        MergeOutcome::Merged { conflicts, .. } if !conflicts.is_empty() => {
            println!("Encountered a merge conflict.")
        }
        MergeOutcome::Merged { .. } => {}
    }
}

fn cmd_merge(cwd: &Path, branch: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    report_merge(&repo.merge(branch)?);
    Ok(())
}

fn cmd_add_remote(cwd: &Path, name: &str, path: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    repo.add_remote(name, path)?;
    Ok(())
}

fn cmd_rm_remote(cwd: &Path, name: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    repo.remove_remote(name)?;
    Ok(())
}

fn cmd_push(cwd: &Path, remote: &str, branch: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    let result = repo.push(remote, branch)?;
    tracing::info!(
        commits = result.commits_pushed,
        blobs = result.blobs_pushed,
        "push complete"
    );
    Ok(())
}

fn cmd_fetch(cwd: &Path, remote: &str, branch: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    let result = repo.fetch(remote, branch)?;
    tracing::info!(
        commits = result.commits_fetched,
        blobs = result.blobs_fetched,
        "fetch complete"
    );
    Ok(())
}

fn cmd_pull(cwd: &Path, remote: &str, branch: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    let (_, outcome) = repo.pull(remote, branch)?;
    report_merge(&outcome);
    Ok(())
}
