use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use wtx::cleanup;
use wtx::config::{self, Config};
use wtx::context::AppContext;
use wtx::editor::EditorKind;
use wtx::git::repo::is_git_installed;
use wtx::logging;
use wtx::metadata::WorktreeMetadata;
use wtx::ports;

#[derive(Parser, Debug)]
#[command(name = "wtx", version, about = "Git worktree workspace manager")]
struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all worktrees with their status
    List,
    /// Create a new worktree
    Add {
        name: String,
        /// Branch to check out (defaults to the name)
        branch: Option<String>,
        /// Base branch for a newly created branch
        #[arg(short, long, default_value = "main")]
        from: String,
        /// Open the new worktree in the editor right away
        #[arg(short, long)]
        open: bool,
    },
    /// Remove a worktree, asking before discarding uncommitted changes
    Rm {
        name: String,
        #[arg(short, long)]
        force: bool,
    },
    /// Remove clean worktrees that have not been opened recently
    Prune {
        /// Days without opening before a worktree counts as stale
        #[arg(short, long)]
        days: Option<u32>,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Let git forget deleted worktree directories and drop their metadata
    Gc,
    /// Show status and metadata of one worktree
    Status { name: String },
    /// Open a worktree in the configured editor
    Open {
        name: String,
        #[arg(short, long, value_enum)]
        editor: Option<EditorKind>,
    },
    /// Record the dev command and ports of a worktree
    Annotate {
        name: String,
        #[arg(long)]
        dev_command: Option<String>,
        #[arg(short, long = "port")]
        ports: Vec<u16>,
    },
    /// Show the configuration, or change it with a subcommand
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Set editor, reuse_window, worktree_dir, auto_start_dev or stale_days
    Set { key: String, value: String },
    /// Register a custom launch command under a name
    Command { name: String, command: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if !is_git_installed() {
        bail!("git is not installed or not in PATH");
    }

    let command = cli.command.unwrap_or(Commands::List);
    if let Commands::Config {
        action: Some(action),
    } = &command
    {
        return update_config(action);
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let mut ctx = AppContext::discover(&cwd)?;

    match command {
        Commands::List => list(&ctx),
        Commands::Add {
            name,
            branch,
            from,
            open,
        } => add(&mut ctx, &name, branch.as_deref().unwrap_or(""), &from, open),
        Commands::Rm { name, force } => remove(&mut ctx, &name, force),
        Commands::Prune { days, yes } => prune(&mut ctx, days, yes),
        Commands::Gc => gc(&mut ctx),
        Commands::Status { name } => status(&ctx, &name),
        Commands::Open { name, editor } => open(&mut ctx, &name, editor),
        Commands::Annotate {
            name,
            dev_command,
            ports,
        } => annotate(&mut ctx, &name, dev_command, ports),
        Commands::Config { action: None } => show_config(&ctx),
        Commands::Config {
            action: Some(action),
        } => update_config(&action),
    }
}

fn list(ctx: &AppContext) -> Result<()> {
    let worktrees = ctx.manager.list()?;
    if worktrees.is_empty() {
        println!("No worktrees found");
        return Ok(());
    }

    let statuses = ctx.manager.probe_all(&worktrees);

    println!("{:<20} {:<30} {:<10} {}", "NAME", "BRANCH", "STATUS", "PATH");
    println!("{}", "─".repeat(76));
    for wt in &worktrees {
        let (marker, text) = match statuses.get(&wt.path) {
            None => ("?", "error".to_string()),
            Some(status) => {
                let mut text = status.label().to_string();
                if status.ahead > 0 {
                    text.push_str(&format!(" ↑{}", status.ahead));
                }
                if status.behind > 0 {
                    text.push_str(&format!(" ↓{}", status.behind));
                }
                (if status.clean { "●" } else { "✗" }, text)
            }
        };
        let main = if wt.is_main { " ⭐" } else { "" };
        println!(
            "{:<20} {:<30} {} {:<8} {}{}",
            wt.name,
            wt.branch,
            marker,
            text,
            wt.path.display(),
            main
        );
    }
    Ok(())
}

fn add(ctx: &mut AppContext, name: &str, branch: &str, base: &str, open_now: bool) -> Result<()> {
    let name = name.trim();
    let branch = if branch.trim().is_empty() { name } else { branch.trim() };
    println!("Creating worktree '{name}' for branch '{branch}'...");

    let path = ctx.manager.add(name, branch, base)?;
    println!("✓ Created worktree: {name}");
    println!("  Path: {}", path.display());
    println!("  Branch: {branch}");

    ctx.store
        .add(WorktreeMetadata::new(name, path.to_string_lossy(), branch));
    if let Err(err) = ctx.store.save() {
        eprintln!("Warning: failed to save metadata: {err}");
    }

    if open_now {
        open_path(ctx, name, path, None)?;
    }
    Ok(())
}

fn remove(ctx: &mut AppContext, name: &str, force: bool) -> Result<()> {
    let wt = ctx.manager.require(name)?;
    let mut force = force;

    if !force && !ctx.manager.is_clean(&wt.path).context("failed to check status")? {
        println!("⚠  Worktree '{name}' has uncommitted changes\n");
        let answer = prompt("Force delete and lose changes? [y/N]: ")?;
        if !answer.eq_ignore_ascii_case("y") {
            println!("Cancelled");
            return Ok(());
        }
        force = true;
    }

    println!("Removing worktree '{name}'...");
    ctx.manager.remove(name, force)?;

    ctx.store.remove(name);
    if let Err(err) = ctx.store.save() {
        eprintln!("Warning: failed to update metadata: {err}");
    }
    println!("✓ Removed worktree: {name}");
    Ok(())
}

fn prune(ctx: &mut AppContext, days: Option<u32>, yes: bool) -> Result<()> {
    let days = days.unwrap_or(ctx.config.stale_days);
    let candidates = cleanup::plan_stale(&ctx.manager, &ctx.store, days)?;
    if candidates.is_empty() {
        println!("No clean stale worktrees found (>{days} days old)");
        return Ok(());
    }

    println!("Stale worktrees (clean, >{days} days old):\n");
    for candidate in &candidates {
        match ctx.store.get(&candidate.name) {
            Some(meta) => println!(
                "  • {} (last opened: {})",
                candidate.name,
                format_date(meta.last_opened)
            ),
            None => println!("  • {}", candidate.name),
        }
    }

    if !yes {
        let answer = prompt("\nDelete all? [y/N]: ")?;
        if !answer.eq_ignore_ascii_case("y") {
            println!("Cancelled");
            return Ok(());
        }
    }

    let report = cleanup::remove_all(
        &ctx.manager,
        &mut ctx.store,
        candidates.iter().map(|c| c.name.as_str()),
    );
    for name in &report.removed {
        println!("✓ Removed {name}");
    }
    for (name, err) in &report.failed {
        println!("⚠  Failed to remove {name}: {err}");
    }
    if let Err(err) = ctx.store.save() {
        eprintln!("Warning: failed to update metadata: {err}");
    }
    println!("\n✓ Removed {} worktree(s)", report.removed_count());
    Ok(())
}

fn gc(ctx: &mut AppContext) -> Result<()> {
    ctx.manager.prune()?;
    let live = ctx.manager.list()?;
    let dropped = cleanup::forget_orphans(&mut ctx.store, &live);
    if !dropped.is_empty() {
        ctx.store.save()?;
    }
    println!(
        "✓ Pruned git worktree records; dropped {} orphaned metadata entr{}",
        dropped.len(),
        if dropped.len() == 1 { "y" } else { "ies" }
    );
    Ok(())
}

fn status(ctx: &AppContext, name: &str) -> Result<()> {
    let wt = ctx.manager.require(name)?;
    let status = ctx
        .manager
        .status(&wt.path)
        .context("failed to get status")?;

    println!("\nWorktree: {name}");
    println!("{}", "─".repeat(37));
    println!("Path:     {}", wt.path.display());
    println!("Branch:   {}", wt.branch);
    println!("HEAD:     {}", wt.head);
    if wt.is_main {
        println!("Type:     Main worktree ⭐");
    } else {
        println!("Type:     Linked worktree");
    }

    println!("\nGit Status:");
    if status.clean {
        println!("  ● Working tree clean");
    } else {
        println!("  ✗ Uncommitted changes");
    }
    if status.ahead > 0 {
        println!("  ↑ {} commit(s) ahead of upstream", status.ahead);
    }
    if status.behind > 0 {
        println!("  ↓ {} commit(s) behind upstream", status.behind);
    }

    if let Some(meta) = ctx.store.get(name) {
        println!("\nMetadata:");
        println!("  Created:     {}", format_date(meta.created_at));
        println!("  Last opened: {}", format_date(meta.last_opened));
        if let Some(command) = &meta.dev_command {
            println!("  Dev command: {command}");
        }
        if !meta.ports.is_empty() {
            let live = ports::scan(&meta.ports);
            let rendered: Vec<String> = meta
                .ports
                .iter()
                .map(|port| {
                    if live.contains(port) {
                        format!("{port} (listening)")
                    } else {
                        port.to_string()
                    }
                })
                .collect();
            println!("  Ports:       {}", rendered.join(", "));
        }
    }
    println!();
    Ok(())
}

fn open(ctx: &mut AppContext, name: &str, editor: Option<EditorKind>) -> Result<()> {
    let wt = ctx.manager.require(name)?;
    open_path(ctx, name, wt.path, editor)
}

fn open_path(
    ctx: &mut AppContext,
    name: &str,
    path: PathBuf,
    editor: Option<EditorKind>,
) -> Result<()> {
    let editor = editor.unwrap_or_else(|| ctx.editor());
    if editor == EditorKind::Terminal {
        println!("\nWorktree path: {}", path.display());
        println!("cd {}", path.display());
    } else {
        println!("Opening {name} in {editor}...");
        editor
            .open(&path, ctx.config.reuse_window)
            .context("failed to open editor")?;
    }

    ctx.store.touch(name);
    ctx.store.save()?;
    Ok(())
}

fn annotate(
    ctx: &mut AppContext,
    name: &str,
    dev_command: Option<String>,
    ports: Vec<u16>,
) -> Result<()> {
    if !ctx.store.contains(name) {
        let wt = ctx.manager.require(name)?;
        ctx.store.add(WorktreeMetadata::new(
            name,
            wt.path.to_string_lossy(),
            wt.branch.as_str(),
        ));
    }
    if dev_command.is_some() {
        ctx.store.set_dev_command(name, dev_command);
    }
    if !ports.is_empty() {
        ctx.store.set_ports(name, ports);
    }
    ctx.store.save()?;
    println!("✓ Updated metadata for {name}");
    Ok(())
}

fn show_config(ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;
    println!("Current configuration:");
    println!("{}", "─".repeat(34));
    match config.editor {
        Some(editor) => println!("Editor:         {editor}"),
        None => println!("Editor:         (auto-detected: {})", ctx.editor()),
    }
    println!("Reuse window:   {}", config.reuse_window);
    println!(
        "Worktree dir:   {} ({})",
        config.worktree_dir,
        ctx.manager.worktree_root().display()
    );
    println!("Auto start dev: {}", config.auto_start_dev);
    println!("Stale after:    {} days", config.stale_days);

    if !config.custom_commands.is_empty() {
        println!("\nCustom commands:");
        for (key, value) in &config.custom_commands {
            println!("  {key}: {value}");
        }
    }

    println!("\nDetected editors:");
    for editor in EditorKind::installed() {
        println!("  • {editor}");
    }

    if let Some(path) = &ctx.config_path {
        let note = if ctx.first_run { " (not created yet)" } else { "" };
        println!("\nConfig file: {}{note}", path.display());
    }
    println!("Log file:    {}", logging::log_path().display());
    Ok(())
}

fn update_config(action: &ConfigAction) -> Result<()> {
    let path = config::config_path().context("could not determine the config directory")?;
    let mut config = Config::load(&path)?;

    match action {
        ConfigAction::Set { key, value } => {
            config.set(key, value)?;
            config.save(&path)?;
            println!("✓ Set {key} to '{}'", value.trim());
        }
        ConfigAction::Command { name, command } => {
            config.set_custom_command(name, command)?;
            config.save(&path)?;
            println!("✓ Set custom command '{}' to '{}'", name.trim(), command.trim());
        }
    }
    println!("Config file: {}", path.display());
    Ok(())
}

fn prompt(question: &str) -> Result<String> {
    print!("{question}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn format_date(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.unix_timestamp().to_string())
}
