use bbaudit::commands::command_argument_builder;
use bbaudit::handlers::{
    RunContext, handle_force_completion, handle_hardlinks, handle_init, handle_library_movies,
    handle_path, load_config,
};
use bbaudit_core::logging::{Verbosity, init_logging};
use clap::ArgMatches;
use colored::Colorize;

fn main() {
    let matches = command_argument_builder().get_matches();

    let code = match run(&matches) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            1
        }
    };

    std::process::exit(code);
}

fn run(matches: &ArgMatches) -> anyhow::Result<i32> {
    let quiet = matches.get_flag("quiet");
    let verbosity = Verbosity::from_flags(quiet, matches.get_flag("verbose"));

    // init runs before a config exists
    if let Some(("init", primary_command)) = matches.subcommand() {
        init_logging(verbosity, None)?;
        handle_init(primary_command)?;
        return Ok(0);
    }

    let config = load_config(matches)?;
    init_logging(verbosity, config.log_file().as_deref())?;
    let ctx = RunContext::new(config, quiet);

    match matches.subcommand() {
        Some(("hardlinks", primary_command)) => handle_hardlinks(primary_command, &ctx),
        Some(("force-completion", primary_command)) => {
            handle_force_completion(primary_command, &ctx)
        }
        Some(("library-movies", primary_command)) => handle_library_movies(primary_command, &ctx),
        Some(("path", primary_command)) => handle_path(primary_command, &ctx).map(|_| 0),
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
