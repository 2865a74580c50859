mod agents;
mod cli;
mod config;
mod credentials;
mod error;
mod feed;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process;
use workflow::{RunStatus, UpdateRequest};

/// Exit code for runs that finished but skipped some packages or files.
const EXIT_PARTIAL: i32 = 2;

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        unsafe {
            std::env::set_var(utils::log::VERBOSE_ENV, "1");
        }
    }

    let config = cli.config;
    let result = match cli.command {
        Commands::Update {
            repo_path,
            user,
            secret,
            branch,
            feed_url,
            options,
            no_git,
        } => workflow::execute_update(&UpdateRequest {
            repo_path,
            user,
            secret,
            branch: (!no_git).then_some(branch),
            feed_url,
            options,
            config,
        }),
        Commands::Check {
            repo_path,
            user,
            secret,
            feed_url,
            options,
        } => workflow::execute_check(&UpdateRequest {
            repo_path,
            user,
            secret,
            branch: None,
            feed_url,
            options,
            config,
        }),
        Commands::Push {
            repo_path,
            secret,
            branch,
            user,
        } => workflow::execute_push(&repo_path, &secret, &branch, &user, config.as_deref()),
        Commands::Sync {
            repo_path,
            user,
            secret,
            branch,
            feed_url,
            options,
        } => workflow::execute_sync(&UpdateRequest {
            repo_path,
            user,
            secret,
            branch: Some(branch),
            feed_url,
            options,
            config,
        }),
    };

    match result {
        Ok(RunStatus::Clean) => {}
        Ok(RunStatus::Partial) => process::exit(EXIT_PARTIAL),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}
