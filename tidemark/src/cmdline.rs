use std::path::PathBuf;

use clap::{Arg, ArgAction, Command};

pub(super) const VENDORS: [&str; 3] = ["harfanglab", "google-reports", "bitsight"];

pub(super) fn root_cli() -> Command {
    Command::new("tidemark")
        .about("Incremental checkpointed collection of security vendor APIs")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(add_collect_subcommand())
}

fn add_collect_subcommand() -> Command {
    Command::new("collect")
        .about("Polls a vendor and writes every new record to stdout as a JSON line")
        .arg_required_else_help(true)
        .arg(
            Arg::new("vendor")
                .help("Vendor to collect from")
                .required(true)
                .value_parser(VENDORS),
        )
        .arg(
            Arg::new("data-path")
                .long("data-path")
                .help("Directory holding the watermarks")
                .required(true)
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("instance")
                .long("instance")
                .help("Name of this collector instance, part of its watermark key")
                .action(ArgAction::Set)
                .default_value("default"),
        )
}
