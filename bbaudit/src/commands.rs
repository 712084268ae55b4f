use bbaudit_core::config::DEFAULT_CONFIG_PATH;
use clap::{arg, command};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

fn term_arg() -> clap::Arg {
    arg!(-t --"term" <TERM>)
        .required(true)
        .help("Academic term code, e.g. 1157")
}

fn format_arg() -> clap::Arg {
    arg!(-f --"format" <FORMAT>)
        .required(false)
        .help("Report format: text, tsv, json")
        .value_parser(["text", "tsv", "json"])
        .default_value("text")
}

fn output_arg() -> clap::Arg {
    arg!(-o --"output" <PATH>)
        .required(false)
        .help("Save report to this file (default: a timestamped file in the reports directory)")
        .value_parser(clap::value_parser!(std::path::PathBuf))
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("bbaudit")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("bbaudit")
        .about("Audits LMS course content for hardlinks ahead of a platform migration")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .help("Path to the configuration file")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(arg!(-q --"quiet" "Suppress progress and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log debug output")
                .required(false)
                .conflicts_with("quiet"),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("init")
                .about("Writes a default configuration and an empty snapshot database")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Directory to store the configuration and snapshot in")
                        .default_value("~/.config/bbaudit/"),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing configuration and snapshot")
                        .required(false),
                ),
        )
        .subcommand(
            command!("hardlinks")
                .about("Lists every course in a term whose content links to LMS-internal paths")
                .arg(term_arg())
                .arg(
                    arg!(-a --"aggressive")
                        .required(false)
                        .help(
                            "Also flag relative links and deployed HTML files that break the \
                        naming convention",
                        )
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(format_arg())
                .arg(output_arg()),
        )
        .subcommand(
            command!("force-completion")
                .about("Lists deployed tests with Force Completion turned on, with their location")
                .arg(term_arg())
                .arg(format_arg())
                .arg(output_arg()),
        )
        .subcommand(
            command!("library-movies")
                .about("Lists library e-reserve movie pages deployed in a term")
                .arg(term_arg())
                .arg(format_arg())
                .arg(output_arg()),
        )
        .subcommand(
            command!("path")
                .about("Prints the breadcrumb to a single content item")
                .arg(
                    arg!(-n --"node" <ID>)
                        .required(true)
                        .help("Content item id (course_contents.pk1)")
                        .value_parser(clap::value_parser!(i64)),
                ),
        )
}
