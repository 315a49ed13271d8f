use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use distpkg::commands::{self, CommandContext, CommandError, CommandOutcome};
use distpkg::config::{LaneConfig, DEFAULT_CONFIG_PATH};
use distpkg::srpm::MockOptions;
use distpkg::submit::{BuildParams, ContainerParams};

const SUPPORTED_COMMANDS: &[&str] = &[
    "build",
    "clone",
    "container-build",
    "mockbuild",
    "new-sources",
    "search",
];

#[derive(Parser)]
#[command(
    name = "distpkg",
    version,
    about = "Dist-git package build client",
    long_about = "Manages per-package dist-git checkouts and submits builds \
                  to a Koji-style build hub."
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Package name; defaults to the current directory name
    #[arg(short, long, global = true)]
    module: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a build to the hub
    Build {
        /// Commit hash to build; defaults to the local HEAD
        commit: Option<String>,

        /// Build target; defaults to the configured one
        #[arg(long)]
        target: Option<String>,

        /// Scratch build: no tagging, results are discarded
        #[arg(long)]
        scratch: bool,

        /// Submit at low priority
        #[arg(long)]
        background: bool,

        /// Do not tag the finished build
        #[arg(long)]
        skip_tag: bool,

        /// Submit even when the package NVR cannot be determined
        #[arg(long)]
        skip_nvr_check: bool,

        /// Do not wait for the task to finish
        #[arg(long)]
        nowait: bool,

        /// Build this SRPM URL instead of a git reference
        #[arg(long)]
        srpm: Option<String>,

        /// Restrict a scratch build to these architectures
        #[arg(long = "arches", value_delimiter = ',')]
        arches: Vec<String>,

        /// Earlier chain links to build before this package
        #[arg(long = "chain")]
        chain: Vec<String>,

        /// Merge the chain links into one build set
        #[arg(long)]
        sets: bool,
    },

    /// Fetch a package's upstream source into the current directory
    Clone {
        package: String,

        /// Branch to check out when git-cloning
        branch: Option<String>,
    },

    /// Submit a container build to the hub
    ContainerBuild {
        #[arg(long)]
        target: Option<String>,

        #[arg(long)]
        scratch: bool,

        /// Extra yum repo files for the container build root
        #[arg(long = "repo-url")]
        repo_urls: Vec<String>,

        /// Branch recorded in the container build request
        #[arg(long)]
        branch: Option<String>,

        #[arg(long)]
        nowait: bool,
    },

    /// Build the package SRPM locally in mock
    Mockbuild {
        /// Mock chroot configuration
        #[arg(long)]
        root: Option<String>,

        #[arg(long)]
        no_clean: bool,

        #[arg(long)]
        no_cleanup_after: bool,
    },

    /// Upload source files to the lookaside and retrack them
    NewSources {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Search the package index
    Search { word: String },

    #[command(external_subcommand)]
    Other(Vec<String>),
}

fn load_config(path: &Path) -> Result<LaneConfig, CommandError> {
    // The default path may legitimately not exist; an explicit one must.
    let config = if path == Path::new(DEFAULT_CONFIG_PATH) {
        LaneConfig::load_or_default(path)?
    } else {
        LaneConfig::load(path)?
    };
    Ok(config)
}

fn run(cli: Cli) -> Result<CommandOutcome, CommandError> {
    let config = load_config(&cli.config)?;
    let mut ctx = CommandContext::from_config(config);

    let module = match cli.module {
        Some(module) => module,
        None => commands::module_from_cwd()?,
    };

    match cli.command {
        Command::Build {
            commit,
            target,
            scratch,
            background,
            skip_tag,
            skip_nvr_check,
            nowait,
            srpm,
            arches,
            chain,
            sets,
        } => {
            let params = BuildParams {
                target,
                scratch,
                background,
                skip_tag,
                skip_nvr_check,
                nowait,
                arches,
                srpm_url: srpm,
                commit,
                chain,
                sets,
            };
            commands::build::run(&ctx, &module, &params)
        }
        Command::Clone { package, branch } => {
            let cwd = std::env::current_dir().map_err(|_| CommandError::NoModule)?;
            commands::clone::run(&ctx, &package, branch.as_deref(), &cwd)
        }
        Command::ContainerBuild {
            target,
            scratch,
            repo_urls,
            branch,
            nowait,
        } => {
            let params = ContainerParams {
                target,
                scratch,
                repo_urls,
                branch,
                nowait,
            };
            commands::container::run(&mut ctx, &module, &params)
        }
        Command::Mockbuild {
            root,
            no_clean,
            no_cleanup_after,
        } => {
            let options = MockOptions {
                root,
                no_clean,
                no_cleanup_after,
            };
            commands::mockbuild::run(&ctx, &module, &options)
        }
        Command::NewSources { files } => commands::new_sources::run(&ctx, &module, &files),
        Command::Search { word } => commands::search::run(&ctx, &word),
        Command::Other(args) => {
            let name = args.first().map(String::as_str).unwrap_or("");
            Ok(CommandOutcome::NothingToDo(format!(
                "{name} is not handled here; supported commands: {}",
                SUPPORTED_COMMANDS.join(", ")
            )))
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // An interrupt at any point is a clean, silent stop.
    if let Err(err) = ctrlc::set_handler(|| std::process::exit(0)) {
        tracing::warn!(error = %err, "could not install interrupt handler");
    }

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(CommandOutcome::Done) => 0,
        Ok(CommandOutcome::NothingToDo(message)) => {
            println!("{message}");
            0
        }
        Err(err) => {
            eprintln!("Error: {err}");
            err.exit_code()
        }
    };
    std::process::exit(code);
}
