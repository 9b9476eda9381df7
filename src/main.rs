use anyhow::{Context, Result};
use cabin::build::{Builder, ScheduleOptions, clean};
use cabin::diag;
use cabin::manifest::{BuildProfile, Manifest};
use cabin::parallel;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::env;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cabin")]
#[command(about = "A package manager and build system for C++", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use verbose output (-vv for very verbose)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Do not print cabin log messages
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Coloring: always, auto, never
    #[arg(long, value_name = "WHEN", global = true)]
    color: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a local package and all of its dependencies
    #[command(visible_alias = "b")]
    Build {
        /// Build artifacts in release mode, with optimizations
        #[arg(short, long)]
        release: bool,
        /// Generate the compilation database instead of building
        #[arg(long)]
        compdb: bool,
        /// Number of parallel jobs
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Build and execute src/main.cc
    #[command(visible_alias = "r")]
    Run {
        /// Build artifacts in release mode, with optimizations
        #[arg(short, long)]
        release: bool,
        /// Number of parallel jobs
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Arguments passed to the program
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run the tests of a local package
    #[command(visible_alias = "t")]
    Test {
        /// Only run test targets whose name contains this string
        testname: Option<String>,
        /// Enable code coverage analysis
        #[arg(long)]
        coverage: bool,
        /// Number of parallel jobs
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Remove dependencies from cabin.toml
    Remove {
        /// Dependencies to remove
        #[arg(required = true)]
        deps: Vec<String>,
    },
    /// Remove the built directory
    Clean {
        /// Clean artifacts of the specified profile
        #[arg(short, long, value_name = "PROFILE")]
        profile: Option<String>,
    },
    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn init_jobs(jobs: Option<usize>) {
    if let Some(jobs) = jobs {
        parallel::set_parallelism(jobs);
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(parallel::parallelism())
            .build_global();
    }
}

fn project_root() -> Result<PathBuf> {
    let cwd = env::current_dir().context("failed to determine the current directory")?;
    let manifest_path = Manifest::find_path(&cwd)?;
    Ok(manifest_path
        .parent()
        .context("manifest path has no parent directory")?
        .to_path_buf())
}

fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Build { release, compdb, jobs } => {
            init_jobs(jobs);
            let profile = if release { BuildProfile::Release } else { BuildProfile::Dev };
            let mut builder = Builder::new(project_root()?, profile);
            builder.schedule(ScheduleOptions::default())?;
            if compdb {
                let out_root = builder
                    .out_dir()
                    .parent()
                    .context("out directory has no parent")?
                    .to_path_buf();
                diag::status(
                    "Generated",
                    format!("{}/compile_commands.json", out_root.display()),
                );
                return Ok(());
            }
            builder.build()
        }
        Commands::Run { release, jobs, args } => {
            init_jobs(jobs);
            let profile = if release { BuildProfile::Release } else { BuildProfile::Dev };
            let mut builder = Builder::new(project_root()?, profile);
            builder.schedule(ScheduleOptions::default())?;
            builder.run(&args)
        }
        Commands::Test { testname, coverage, jobs } => {
            init_jobs(jobs);
            let mut builder = Builder::new(project_root()?, BuildProfile::Test);
            builder.schedule(ScheduleOptions {
                include_dev_deps: true,
                enable_coverage: coverage,
                ..Default::default()
            })?;
            builder.test(testname.as_deref())
        }
        Commands::Remove { deps } => cabin::deps::remove_dependencies(&deps),
        Commands::Clean { profile } => clean(profile.as_deref()),
        Commands::Completion { shell } => {
            generate(shell, &mut Cli::command(), "cabin", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.quiet {
        diag::set_level(diag::Level::Off);
    } else {
        match cli.verbose {
            0 => diag::set_level(diag::Level::Info),
            1 => diag::set_level(diag::Level::Debug),
            _ => diag::set_level(diag::Level::Trace),
        }
    }
    if let Err(err) = diag::init_color(cli.color.as_deref()) {
        diag::error(format!("{err:#}"));
        std::process::exit(1);
    }

    if let Err(err) = run_command(cli.command) {
        diag::error(format!("{err:#}"));
        std::process::exit(1);
    }
}
