mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, sprint::SprintSubcommand};
use ledger_core::types::{Priority, TaskStatus};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "scrum",
    about = "Sprint task ledger: track task status, keep sprint metrics honest, audit every change",
    version,
    propagate_version = true,
    arg_required_else_help = true
)]
struct Cli {
    /// Ledger root (default: auto-detect from .scrum/ or .git/)
    #[arg(long, global = true, env = "SCRUM_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a ledger in the current project
    Init {
        /// Project name recorded in .scrum/config.yaml
        #[arg(long)]
        project: Option<String>,
    },

    /// Create a task in the current sprint
    Create {
        title: String,
        agent: String,
        /// P0, P1 or P2 (default from config)
        priority: Option<Priority>,
        /// Story point estimate (default from config)
        points: Option<u32>,
        /// Background for whoever picks the task up
        #[arg(long)]
        context: Option<String>,
        /// Acceptance criterion; may be repeated
        #[arg(long = "criteria")]
        criteria: Vec<String>,
        /// Task ids this one depends on, comma-separated
        #[arg(long, value_delimiter = ',')]
        depends: Vec<String>,
    },

    /// Move a task to a new status
    Update {
        task_id: String,
        /// TODO, IN_PROGRESS, DONE or BLOCKED
        status: TaskStatus,
        notes: Vec<String>,
    },

    /// Show sprint progress
    Status,

    /// List tasks, optionally only those with one status
    List { status: Option<TaskStatus> },

    /// Show every field of one task
    Details { task_id: String },

    /// List the tasks owned by an agent
    Agent { name: String },

    /// Check the ledger files and repair drifted metrics
    Validate,

    /// Start or complete a sprint
    Sprint {
        #[command(subcommand)]
        subcommand: SprintSubcommand,
    },

    /// Show recent event log entries
    Log {
        /// Number of entries to show
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },

    /// Rebuild the sprint's tasks from the event log and compare
    Rebuild {
        /// Replace the stored tasks and metrics with the rebuilt projection
        #[arg(long)]
        write: bool,
    },

    /// Inspect the ledger configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { project } => cmd::init::run(&root, project.as_deref(), cli.json),
        Commands::Create {
            title,
            agent,
            priority,
            points,
            context,
            criteria,
            depends,
        } => cmd::task::create(
            &root,
            cmd::task::CreateArgs {
                title,
                agent,
                priority,
                points,
                context,
                criteria,
                depends,
            },
            cli.json,
        ),
        Commands::Update {
            task_id,
            status,
            notes,
        } => cmd::task::update(&root, &task_id, status, &notes.join(" "), cli.json),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::List { status } => cmd::task::list(&root, status, cli.json),
        Commands::Details { task_id } => cmd::task::details(&root, &task_id, cli.json),
        Commands::Agent { name } => cmd::task::by_agent(&root, &name, cli.json),
        Commands::Validate => cmd::validate::run(&root, cli.json),
        Commands::Sprint { subcommand } => cmd::sprint::run(&root, subcommand, cli.json),
        Commands::Log { limit } => cmd::log::run(&root, limit, cli.json),
        Commands::Rebuild { write } => cmd::rebuild::run(&root, write, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
