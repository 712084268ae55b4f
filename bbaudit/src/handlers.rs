use anyhow::{Context, Result, bail};
use bbaudit_core::audit::{
    AuditOptions, AuditSession, execute_force_completion_audit, execute_hardlink_audit,
    execute_library_movie_audit, locate_content,
};
use bbaudit_core::config::{Config, expand_path};
use bbaudit_core::data::Database;
use bbaudit_core::report::{
    ReportFormat, file_timestamp, force_completion_report_filename, format_failures,
    hardlink_report_filename, library_movies_report_filename, render_force_completion_report,
    render_hardlink_report, render_library_movie_report, resolve_report_path, save_report,
};
use bbaudit_scanner::{PartitionFailure, TermCode};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "bbaudit.toml";
pub const DATABASE_FILE_NAME: &str = "snapshot.sqlite3";

/// Process exit code for a run that skipped at least one partition.
pub const EXIT_INCOMPLETE: i32 = 1;

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

/// Settings shared by every subcommand of one invocation.
pub struct RunContext {
    pub config: Config,
    pub quiet: bool,
}

impl RunContext {
    pub fn new(config: Config, quiet: bool) -> Self {
        Self { config, quiet }
    }

    fn status(&self, line: String) {
        if !self.quiet {
            println!("{}", line);
        }
    }
}

/// Loads the config file named by `--config`.
pub fn load_config(matches: &ArgMatches) -> Result<Config> {
    let path = matches
        .get_one::<String>("config")
        .map(|p| expand_path(p))
        .context("No configuration path given")?;

    Config::load(&path).with_context(|| format!("Failed to load config {}", path.display()))
}

pub fn parse_term(args: &ArgMatches, config: &Config) -> Result<TermCode> {
    let raw = args
        .get_one::<String>("term")
        .context("--term is required")?;
    config
        .parse_term(raw)
        .with_context(|| format!("'{}' is not a valid term code", raw))
}

pub fn parse_format(args: &ArgMatches) -> Result<ReportFormat> {
    let raw = args.get_one::<String>("format").map(String::as_str).unwrap_or("text");
    match ReportFormat::from_str(raw) {
        Some(format) => Ok(format),
        None => bail!("Unknown report format '{}'", raw),
    }
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    let dir = args
        .get_one::<String>("PATH")
        .map(|p| expand_path(p))
        .context("No target directory given")?;
    let force = args.get_flag("force");

    init_workspace(&dir, force)?;
    Ok(())
}

/// Creates `dir` with a default config file and an empty snapshot.
///
/// Existing files are kept unless `force` is set. Returns the config file path.
pub fn init_workspace(dir: &Path, force: bool) -> Result<PathBuf> {
    print_divider();
    println!("{}", "  BBAUDIT INITIALIZATION".bright_white().bold());
    print_divider();
    println!();
    println!(
        "{} Target: {}",
        "→".blue(),
        dir.display().to_string().bright_white()
    );

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let config_path = dir.join(CONFIG_FILE_NAME);
    let db_path = dir.join(DATABASE_FILE_NAME);

    if config_path.exists() && !force {
        println!(
            "{} Keeping existing config {} (use --force to overwrite)",
            "⚠".yellow().bold(),
            config_path.display().to_string().bright_white()
        );
    } else {
        let mut config = Config::default();
        config.database.path = db_path.to_string_lossy().to_string();
        config.reports.directory = dir.join("reports").to_string_lossy().to_string();
        config
            .save(&config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        println!(
            "{} Config written: {}",
            "✓".green().bold(),
            config_path.display().to_string().bright_white()
        );
    }

    if Database::exists(&db_path) {
        if !force {
            println!(
                "{} Keeping existing snapshot {} (use --force to overwrite)",
                "⚠".yellow().bold(),
                db_path.display().to_string().bright_white()
            );
            println!();
            return Ok(config_path);
        }
        println!(
            "{} Deleting existing snapshot (force mode)",
            "→".yellow().bold()
        );
        Database::remove(&db_path)
            .with_context(|| format!("Failed to remove {}", db_path.display()))?;
    }

    Database::new(&db_path)
        .and_then(Database::close)
        .with_context(|| format!("Failed to create {}", db_path.display()))?;
    info!("Created snapshot schema at {}", db_path.display());
    println!(
        "{} Snapshot initialized: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();

    Ok(config_path)
}

fn write_report(
    ctx: &RunContext,
    content: &str,
    explicit: Option<&PathBuf>,
    default_name: &str,
) -> Result<PathBuf> {
    let path = resolve_report_path(
        explicit.map(PathBuf::as_path),
        &ctx.config.reports_dir(),
        default_name,
    );
    save_report(content, &path)
        .with_context(|| format!("Failed to save report to {}", path.display()))?;
    ctx.status(format!(
        "{} Report saved to: {}",
        "✓".green().bold(),
        path.display().to_string().bright_white()
    ));
    Ok(path)
}

fn report_failures(ctx: &RunContext, failures: &[PartitionFailure]) -> i32 {
    if failures.is_empty() {
        return 0;
    }

    warn!("{} partition(s) failed, results are incomplete", failures.len());
    if !ctx.quiet {
        eprint!("{}", format_failures(failures).yellow());
    }
    EXIT_INCOMPLETE
}

/// Runs the hardlink audit and returns the process exit code.
pub fn handle_hardlinks(args: &ArgMatches, ctx: &RunContext) -> Result<i32> {
    let term = parse_term(args, &ctx.config)?;
    let format = parse_format(args)?;
    let aggressive = args.get_flag("aggressive");

    ctx.status(format!(
        "\n{} Checking term {} for hardlinks ({} mode)\n",
        "→".blue(),
        term.to_string().bright_white(),
        if aggressive { "aggressive" } else { "unaggressive" }
    ));

    let session = AuditSession::open(&ctx.config).context("Failed to open audit session")?;
    let options = AuditOptions {
        term,
        aggressive,
        show_progress_bars: !ctx.quiet,
    };
    let outcome = execute_hardlink_audit(&session, &options, None);
    session.close().context("Failed to close audit session")?;

    let report = render_hardlink_report(&outcome, format)?;
    let default_name = hardlink_report_filename(
        term,
        aggressive,
        format,
        &file_timestamp(chrono::Local::now()),
    );
    write_report(ctx, &report, args.get_one::<PathBuf>("output"), &default_name)?;

    ctx.status(format!(
        "{} {} course(s) flagged",
        "✓".green().bold(),
        outcome.flagged.len().to_string().cyan()
    ));

    Ok(report_failures(ctx, &outcome.failures))
}

/// Runs the force-completion audit and returns the process exit code.
pub fn handle_force_completion(args: &ArgMatches, ctx: &RunContext) -> Result<i32> {
    let term = parse_term(args, &ctx.config)?;
    let format = parse_format(args)?;

    ctx.status(format!(
        "\n{} Looking for Force Completion tests in term {}\n",
        "→".blue(),
        term.to_string().bright_white()
    ));

    let session = AuditSession::open(&ctx.config).context("Failed to open audit session")?;
    let options = AuditOptions {
        term,
        aggressive: false,
        show_progress_bars: !ctx.quiet,
    };
    let outcome = execute_force_completion_audit(&session, &options, None);
    session.close().context("Failed to close audit session")?;

    let report = render_force_completion_report(&outcome, format)?;
    let default_name =
        force_completion_report_filename(term, format, &file_timestamp(chrono::Local::now()));
    write_report(ctx, &report, args.get_one::<PathBuf>("output"), &default_name)?;

    ctx.status(format!(
        "{} {} test(s) found",
        "✓".green().bold(),
        outcome.items.len().to_string().cyan()
    ));

    Ok(report_failures(ctx, &outcome.failures))
}

/// Runs the library e-reserve audit and returns the process exit code.
pub fn handle_library_movies(args: &ArgMatches, ctx: &RunContext) -> Result<i32> {
    let term = parse_term(args, &ctx.config)?;
    let format = parse_format(args)?;

    ctx.status(format!(
        "\n{} Looking for library e-reserve files in term {}\n",
        "→".blue(),
        term.to_string().bright_white()
    ));

    let session = AuditSession::open(&ctx.config).context("Failed to open audit session")?;
    let options = AuditOptions {
        term,
        aggressive: false,
        show_progress_bars: !ctx.quiet,
    };
    let outcome = execute_library_movie_audit(&session, &options, None);
    session.close().context("Failed to close audit session")?;

    let report = render_library_movie_report(&outcome, format)?;
    let default_name =
        library_movies_report_filename(term, format, &file_timestamp(chrono::Local::now()));
    write_report(ctx, &report, args.get_one::<PathBuf>("output"), &default_name)?;

    ctx.status(format!(
        "{} {} file(s) found",
        "✓".green().bold(),
        outcome.files.len().to_string().cyan()
    ));

    Ok(report_failures(ctx, &outcome.failures))
}

/// Prints the breadcrumb for one content item.
pub fn handle_path(args: &ArgMatches, ctx: &RunContext) -> Result<String> {
    let node = *args.get_one::<i64>("node").context("--node is required")?;

    let session = AuditSession::open(&ctx.config).context("Failed to open audit session")?;
    let path = locate_content(&session, node)
        .with_context(|| format!("Failed to resolve path to content {}", node))?;
    session.close().context("Failed to close audit session")?;

    let rendered = path.to_string();
    if path.is_empty() {
        ctx.status(format!(
            "{} Content {} sits directly under the course root",
            "ℹ".blue(),
            node
        ));
    } else {
        println!("{}", rendered);
    }
    Ok(rendered)
}
