//! bitflow command line entry point.

use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use bitflow::boards;
use bitflow::config::loader::{load_profile_from_file, PROFILE_FILE_NAME};
use bitflow::config::validator::validate_profile;
use bitflow::config::{load_settings, Settings};
use bitflow::error::BuildError;
use bitflow::log_collector::{get_global_logs_path, BuildLog};
use bitflow::models::{BuildProfile, BuildRequest};
use bitflow::orchestrator::BuildOrchestrator;
use bitflow::scaffold::{create_project_skeleton, ScaffoldRequest};
use bitflow::toolchain::{StubToolchain, Toolchain, VivadoToolchain};

/// FPGA bitstream build pipeline driver
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive synthesis and implementation, then emit the bitstream
    Build {
        /// Project name, also the artifact base name
        project_name: String,

        /// Target part identifier (e.g. xc7a35tcpg236-1) or a board key
        target_part: String,

        /// Directory scanned recursively for RTL sources
        rtl_dir: PathBuf,

        /// Constraints file; pass "" to build without constraints
        xdc_file: String,

        /// Output directory for the generated project and artifact
        proj_dir: PathBuf,

        /// Top module override
        #[arg(long)]
        top: Option<String>,

        /// Stage parallelism override (0 = all logical CPUs)
        #[arg(long)]
        jobs: Option<usize>,

        /// Build profile path (default: bitflow.json next to rtl_dir)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Run the pipeline on the in-process stub instead of Vivado
        #[arg(long)]
        dry_run: bool,

        /// Vivado executable override
        #[arg(long)]
        vivado: Option<PathBuf>,
    },

    /// Create a new project skeleton
    New {
        /// Project name
        name: String,

        /// Target board
        #[arg(long, default_value = "basys3")]
        board: String,

        /// Top module name
        #[arg(long, default_value = "top")]
        top: String,

        /// Parent directory for the project
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// List the built-in board catalog
    Boards,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let collector = match initialize_logging() {
        Ok(collector) => collector,
        Err(message) => {
            eprintln!("[Main] ERROR: {}", message);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Build {
            project_name,
            target_part,
            rtl_dir,
            xdc_file,
            proj_dir,
            top,
            jobs,
            profile,
            dry_run,
            vivado,
        } => {
            run_build(
                BuildInvocation {
                    project_name,
                    target_part,
                    rtl_dir,
                    xdc_file,
                    proj_dir,
                    top,
                    jobs,
                    profile,
                    dry_run,
                    vivado,
                },
                collector.clone(),
            )
            .await
        }
        Commands::New {
            name,
            board,
            top,
            dir,
        } => run_new(name, board, top, dir),
        Commands::Boards => {
            print_boards();
            Ok(())
        }
    };

    let exit = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{} failed: {}", e.step_name(), e);
            eprintln!("[Error] {}", e.user_message());
            ExitCode::FAILURE
        }
    };

    // Make sure the final lines reach the session log before exiting.
    if let Err(e) = collector.wait_for_empty().await {
        eprintln!("[Main] WARNING: Failed to flush logs: {}", e);
    }
    exit
}

/// Wire the session logger before anything else writes output.
fn initialize_logging() -> Result<Arc<BuildLog>, String> {
    let log_dir = get_global_logs_path()?;
    let collector = Arc::new(BuildLog::new(log_dir)?);
    if let Err(e) = log::set_boxed_logger(Box::new((*collector).clone()))
        .map(|()| log::set_max_level(log::LevelFilter::Info))
    {
        eprintln!("[Main] WARNING: Failed to register global logger: {}", e);
    }
    info!(
        "bitflow {} session log: {}",
        bitflow::VERSION,
        collector.session_log_path().display()
    );
    Ok(collector)
}

/// All knobs of one `build` invocation.
struct BuildInvocation {
    project_name: String,
    target_part: String,
    rtl_dir: PathBuf,
    xdc_file: String,
    proj_dir: PathBuf,
    top: Option<String>,
    jobs: Option<usize>,
    profile: Option<PathBuf>,
    dry_run: bool,
    vivado: Option<PathBuf>,
}

async fn run_build(
    invocation: BuildInvocation,
    collector: Arc<BuildLog>,
) -> Result<(), BuildError> {
    let settings = load_settings();

    let args = [
        invocation.project_name,
        invocation.target_part,
        invocation.rtl_dir.to_string_lossy().into_owned(),
        invocation.xdc_file,
        invocation.proj_dir.to_string_lossy().into_owned(),
    ];
    let mut request = BuildRequest::from_args(&args)?;

    // Board keys are accepted wherever a part is expected.
    if let Some(board) = boards::get_board(&request.part) {
        info!("Resolved board '{}' to part {}", request.part, board.part);
        request.part = board.part;
    }

    let profile = resolve_profile(
        invocation.top,
        invocation.jobs,
        invocation.profile.as_deref(),
        &request.rtl_dir,
        &settings,
    )?;

    let toolchain: Arc<dyn Toolchain> = if invocation.dry_run {
        info!("Dry run: stages execute on the in-process stub toolchain");
        Arc::new(StubToolchain::new())
    } else {
        let engine = match invocation.vivado.or(settings.vivado_path) {
            Some(path) => VivadoToolchain::with_executable(&path),
            None => VivadoToolchain::new(),
        };
        Arc::new(engine.with_collector(collector))
    };

    let orchestrator = BuildOrchestrator::new(toolchain, request, profile);
    let artifact = orchestrator.run().await?;
    println!("Bitstream written to {}", artifact.path.display());
    Ok(())
}

/// Merge CLI overrides with the project profile and machine settings.
///
/// An explicit `--profile` must load; the implicit `bitflow.json` next to
/// the RTL directory is only used when present.
fn resolve_profile(
    top: Option<String>,
    jobs: Option<usize>,
    profile_path: Option<&Path>,
    rtl_dir: &Path,
    settings: &Settings,
) -> Result<BuildProfile, BuildError> {
    let mut profile = match profile_path {
        Some(path) => load_profile_from_file(path)?,
        None => {
            let implicit = rtl_dir.parent().map(|dir| dir.join(PROFILE_FILE_NAME));
            match implicit {
                Some(path) if path.is_file() => {
                    info!("Using project profile {}", path.display());
                    load_profile_from_file(&path)?
                }
                _ => BuildProfile {
                    jobs: settings.default_jobs,
                    ..BuildProfile::default()
                },
            }
        }
    };
    if let Some(top) = top {
        profile.top_module = top;
    }
    if let Some(jobs) = jobs {
        profile.jobs = jobs;
    }
    validate_profile(&profile)?;
    Ok(profile)
}

fn run_new(name: String, board: String, top: String, dir: PathBuf) -> Result<(), BuildError> {
    let request = ScaffoldRequest {
        project_name: name,
        top_module: top,
        board,
        parent_dir: dir,
    };
    let root = create_project_skeleton(&request)?;
    println!("Project created at {}", root.display());
    println!("Next steps:");
    println!("  1. Put your RTL under {}/rtl", root.display());
    println!(
        "  2. bitflow build {} {} {}/rtl \"\" {}/build",
        request.project_name,
        request.board,
        root.display(),
        root.display()
    );
    Ok(())
}

fn print_boards() {
    println!("{:<10} {:<22} DESCRIPTION", "BOARD", "PART");
    for key in boards::board_names() {
        if let Some(board) = boards::get_board(&key) {
            println!("{:<10} {:<22} {}", key, board.part, board.description);
        }
    }
}
