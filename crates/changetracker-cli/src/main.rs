use anyhow::Result;
use changetracker_cli::{ViewArg, commands};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "changetracker")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Scrape Microsoft Entra change tracking views and publish them to SharePoint lists",
    long_about = "changetracker walks the Roadmap and Change announcements views of the Entra \
                  admin portal in a real browser, reads the What's new documentation page, \
                  saves everything as JSON and uploads new items to SharePoint lists."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "CHANGETRACKER_CONFIG",
        default_value = "config.json"
    )]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every source, save the results and upload them
    Run {
        /// Skip the SharePoint upload even when it is configured
        #[arg(long)]
        no_upload: bool,
    },

    /// Scrape the portal views and save them as JSON
    Scrape {
        /// Directory for the JSON dumps (defaults to outputDir from the config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch the What's new documentation page and save it as JSON
    WhatsNew {
        /// Directory for the JSON dump (defaults to outputDir from the config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also upload the entries to SharePoint
        #[arg(long)]
        upload: bool,
    },

    /// Upload a previously saved JSON dump to SharePoint
    Upload {
        /// Path to the JSON dump
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// View the dump belongs to (inferred from the file name when omitted)
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
    },

    /// Validate the configuration file and summarize it
    Config,

    /// Generate shell completion scripts
    #[command(after_help = "SUPPORTED SHELLS:
    bash, zsh, fish, powershell, elvish

INSTALLATION:
    Bash:  changetracker completion --shell bash >> ~/.bashrc
    Zsh:   changetracker completion --shell zsh > ~/.zfunc/_changetracker
           (add `fpath+=~/.zfunc` to ~/.zshrc before compinit)
    Fish:  changetracker completion --shell fish > ~/.config/fish/completions/changetracker.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(long, value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Run { no_upload } => commands::run::execute(&cli.config, no_upload),
        Commands::Scrape { output } => commands::scrape::execute(&cli.config, output),
        Commands::WhatsNew { output, upload } => {
            commands::whats_new::execute(&cli.config, output, upload)
        }
        Commands::Upload { file, view } => {
            commands::upload::execute(&cli.config, &file, view.map(Into::into))
        }
        Commands::Config => commands::config::execute(&cli.config),
        Commands::Completion { shell } => commands::completion::execute(shell, &mut Cli::command()),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(
            "changetracker=debug,changetracker_cli=debug,changetracker_core=debug,\
             changetracker_browser=debug,changetracker_graph=debug",
        )
    } else {
        EnvFilter::new(
            "changetracker=info,changetracker_cli=info,changetracker_core=info,\
             changetracker_browser=info,changetracker_graph=info",
        )
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
