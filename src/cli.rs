use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "nupd",
    about = "Keep internal NuGet package references current and push the result to git",
    version,
    author
)]
pub struct Cli {
    /// Settings file (defaults to nupd.toml in the repository, if present)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that talks to the feed.
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Package name prefix to manage (case-insensitive)
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Only move to versions that order after the declared one
    #[arg(long)]
    pub semantic: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull the branch and rewrite outdated package references
    Update {
        /// Local repository path
        repo_path: PathBuf,
        /// Git and feed user name
        user: String,
        /// Personal access token or password
        secret: String,
        /// Branch to update (empty means master)
        branch: String,
        /// NuGet v3 feed URL (service index or search endpoint)
        feed_url: String,

        #[command(flatten)]
        options: ResolveOptions,

        /// Skip fetching and pulling the branch
        #[arg(long)]
        no_git: bool,
    },

    /// Report outdated package references without changing anything
    Check {
        /// Local repository path
        repo_path: PathBuf,
        /// Feed user name
        user: String,
        /// Personal access token or password
        secret: String,
        /// NuGet v3 feed URL (service index or search endpoint)
        feed_url: String,

        #[command(flatten)]
        options: ResolveOptions,
    },

    /// Pull the branch, commit modified build files and push
    Push {
        /// Local repository path
        repo_path: PathBuf,
        /// Personal access token or password
        secret: String,
        /// Branch to push (empty means master)
        branch: String,
        /// Git user id, also used as the commit email unless configured
        user: String,
    },

    /// Update then push in one run
    Sync {
        /// Local repository path
        repo_path: PathBuf,
        /// Git and feed user name
        user: String,
        /// Personal access token or password
        secret: String,
        /// Branch to update and push (empty means master)
        branch: String,
        /// NuGet v3 feed URL (service index or search endpoint)
        feed_url: String,

        #[command(flatten)]
        options: ResolveOptions,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_update_positionals() {
        let cli = Cli::try_parse_from([
            "nupd",
            "update",
            "/src/repo",
            "jdoe",
            "pat",
            "develop",
            "https://example.com/v3/index.json",
            "--semantic",
        ])
        .unwrap();

        match cli.command {
            Commands::Update {
                repo_path,
                branch,
                options,
                no_git,
                ..
            } => {
                assert_eq!(repo_path, PathBuf::from("/src/repo"));
                assert_eq!(branch, "develop");
                assert!(options.semantic);
                assert!(!no_git);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn push_keeps_secret_before_branch() {
        let cli = Cli::try_parse_from(["nupd", "push", "/src/repo", "pat", "master", "jdoe", "-v"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Push {
                secret, branch, user, ..
            } => {
                assert_eq!(secret, "pat");
                assert_eq!(branch, "master");
                assert_eq!(user, "jdoe");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn missing_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["nupd", "check", "/src/repo"]).is_err());
    }
}
