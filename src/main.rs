mod app_logic;
mod core;

use crate::app_logic::{APP_NAME, HandlerOutcome, PickerCommandHandler};
use crate::core::path_utils::get_base_app_config_local_dir;
use crate::core::{
    Cl100kTokenEstimator, ConfigManagerOperations, CoreArchiver, CoreConfigManager,
    CoreDirectoryIndex, DirectoryPolicy, PickerConfig, SelectionTree,
};

use clap::{Parser, ValueEnum};
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::{self, File};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

const LOG_FILENAME: &str = "source_picker.log";

#[derive(Parser, Debug)]
#[command(name = "source_picker", version)]
#[command(
    about = "Select files and directories under a root and export them as one text archive",
    long_about = None
)]
struct Args {
    /// Directory to browse (default: the last root used, then the current directory)
    #[arg(value_name = "ROOT")]
    root: Option<PathBuf>,

    /// How toggling a directory treats its contents, for this session only
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    /// A directory flips together with everything beneath it
    Deep,
    /// Only the directory itself flips
    Shallow,
}

impl From<PolicyArg> for DirectoryPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Deep => DirectoryPolicy::Deep,
            PolicyArg::Shallow => DirectoryPolicy::Shallow,
        }
    }
}

/*
 * Warnings and errors go to stderr; everything from debug up goes to a log
 * file in the per-user config directory when that directory is available.
 */
fn init_logging() {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Warn,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(dir) = get_base_app_config_local_dir(APP_NAME) {
        match File::create(dir.join(LOG_FILENAME)) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file)),
            Err(e) => eprintln!("Could not create log file in {}: {e}", dir.display()),
        }
    }

    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Failed to initialize logger: {e}");
    }
}

/*
 * The root comes from the command line, then from the last session, then the
 * current directory. It must exist and be a directory.
 */
fn choose_root(requested: Option<&Path>, config: &PickerConfig) -> Result<PathBuf, String> {
    let candidate = requested
        .map(Path::to_path_buf)
        .or_else(|| config.last_root.clone())
        .map_or_else(std::env::current_dir, Ok)
        .map_err(|e| format!("Cannot determine the current directory: {e}"))?;

    let root = fs::canonicalize(&candidate)
        .map_err(|e| format!("Cannot open {}: {e}", candidate.display()))?;
    if !root.is_dir() {
        return Err(format!("Not a directory: {}", root.display()));
    }
    Ok(root)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();
    log::info!("Application starting up.");

    let config_manager = CoreConfigManager::new();
    let mut config = config_manager.load_config(APP_NAME).unwrap_or_else(|e| {
        log::warn!("Main: Could not load configuration, using defaults: {e}");
        PickerConfig::default()
    });

    let root = match choose_root(args.root.as_deref(), &config) {
        Ok(root) => root,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    config.last_root = Some(root.clone());
    if let Err(e) = config_manager.save_config(APP_NAME, &config) {
        log::warn!("Main: Could not save configuration: {e}");
    }

    let index = CoreDirectoryIndex::with_exclude_patterns(&root, &config.exclude_patterns);
    let policy = args.policy.map_or(config.directory_policy, DirectoryPolicy::from);
    let tree = Arc::new(SelectionTree::new(&root, policy, Arc::new(index)));
    println!(
        "Browsing {} ({:?} directory selection). Type 'help' for commands.",
        tree.root().display(),
        tree.policy()
    );
    let handler = PickerCommandHandler::new(
        tree,
        Arc::new(CoreArchiver::new()),
        Arc::new(Cl100kTokenEstimator::new()),
        config.archive_path.clone(),
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        print!("> ");
        if let Err(e) = stdout.flush() {
            log::error!("Main: Failed to flush stdout: {e}");
            break;
        }
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::error!("Main: Failed to read input: {e}");
                break;
            }
        }
        match handler.handle_line(&line) {
            HandlerOutcome::Continue(lines) => {
                for output in lines {
                    println!("{output}");
                }
            }
            HandlerOutcome::Quit => break,
        }
    }

    log::info!("Application shutting down.");
    ExitCode::SUCCESS
}
