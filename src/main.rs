use agentpack::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;

#[derive(Parser)]
#[command(name = "agentpack")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Installer and updater for modular agent packs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the agent pack into a project
    Install {
        /// Target project directory (default: current directory)
        dir: Option<String>,

        /// Install root folder name inside the project
        #[arg(long, default_value = "agentpack")]
        folder: String,

        /// Modules to install ("core" is always included)
        #[arg(short, long)]
        module: Vec<String>,

        /// IDEs to configure (claude-code, cursor, codex)
        #[arg(short, long)]
        ide: Vec<String>,

        /// Optional features to enable (e.g. voice)
        #[arg(long)]
        feature: Vec<String>,

        /// Module answers as module.key=value
        #[arg(long)]
        answer: Vec<String>,

        /// Delete any existing installation first
        #[arg(short, long)]
        force: bool,
    },

    /// Update an existing installation to this installer's content
    Update {
        /// Target project directory (default: current directory)
        dir: Option<String>,

        /// Install root folder name inside the project
        #[arg(long, default_value = "agentpack")]
        folder: String,

        /// Refresh manifests and compiled agents only, skip content copy
        #[arg(short, long)]
        quick: bool,
    },

    /// Show what is installed
    Status {
        /// Target project directory (default: current directory)
        dir: Option<String>,

        /// Install root folder name inside the project
        #[arg(long, default_value = "agentpack")]
        folder: String,

        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },

    /// Recompile agents and refresh IDE command files
    Compile {
        /// Target project directory (default: current directory)
        dir: Option<String>,

        /// Install root folder name inside the project
        #[arg(long, default_value = "agentpack")]
        folder: String,
    },

    /// Remove the installation
    Uninstall {
        /// Target project directory (default: current directory)
        dir: Option<String>,

        /// Install root folder name inside the project
        #[arg(long, default_value = "agentpack")]
        folder: String,
    },

    /// Custom-module registry operations
    #[command(subcommand)]
    Module(agentpack::cli::module::ModuleCommands),

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    if let Err(e) = runtime.block_on(run_async(cli)) {
        eprintln!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

async fn run_async(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Install {
            dir,
            folder,
            module,
            ide,
            feature,
            answer,
            force,
        } => {
            agentpack::cli::install::run(
                dir.as_deref(),
                &folder,
                &module,
                &ide,
                &feature,
                &answer,
                force,
            )
            .await
        }
        Commands::Update { dir, folder, quick } => {
            agentpack::cli::update::run(dir.as_deref(), &folder, quick).await
        }
        Commands::Status { dir, folder, json } => {
            agentpack::cli::status::run(dir.as_deref(), &folder, json).await
        }
        Commands::Compile { dir, folder } => {
            agentpack::cli::compile::run(dir.as_deref(), &folder).await
        }
        Commands::Uninstall { dir, folder } => {
            agentpack::cli::uninstall::run(dir.as_deref(), &folder).await
        }
        Commands::Module(cmd) => {
            // Module commands act on the current directory's installation
            agentpack::cli::module::run(cmd, None, "agentpack").await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
