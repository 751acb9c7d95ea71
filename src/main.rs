use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use cfgweave::cli::{self, CliError, ExpandRequest};
use cfgweave::{Tree, output::Format};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cfgweave")]
#[command(
    about = "cfgweave - expand configuration templates with variables, conditionals and imports"
)]
#[command(version)]
struct Cli {
    /// Log expansion passes to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a template to a fixed point
    Expand {
        /// Template file (reads from stdin if not provided)
        file: Option<PathBuf>,

        /// Fallback document for references the template does not define
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Comma-separated transformer order, e.g. `values,conditionals`
        #[arg(short, long, value_delimiter = ',')]
        transformers: Option<Vec<String>>,

        /// Output format: yaml or json
        #[arg(short, long, default_value = "yaml")]
        format: Format,

        /// Expand even when validation reports issues
        #[arg(long)]
        no_validate: bool,
    },

    /// Report undefined and circular references
    Validate {
        file: Option<PathBuf>,

        #[arg(short, long)]
        context: Option<PathBuf>,
    },

    /// List the references each key makes
    Deps {
        file: Option<PathBuf>,

        /// Group by referenced variable instead
        #[arg(short, long)]
        inverted: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let result = match cli.command {
        Commands::Expand {
            file,
            context,
            transformers,
            format,
            no_validate,
        } => run_expand(file, context, transformers, format, !no_validate),
        Commands::Validate { file, context } => run_validate(file, context),
        Commands::Deps { file, inverted } => {
            read_document(file.as_deref())
                .map(|(document, _)| cli::execute_deps(&document, inverted))
        }
    };

    match result {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Read and parse the template, returning it with the directory its
/// relative imports resolve against.
fn read_document(file: Option<&Path>) -> Result<(Tree, PathBuf), CliError> {
    match file {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let base_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            Ok((cli::parse_document(&text, Some(path))?, base_dir))
        }
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok((cli::parse_document(&buffer, None)?, PathBuf::from(".")))
        }
        None => Err(CliError::NoInput),
    }
}

fn read_context(file: Option<PathBuf>) -> Result<Option<Tree>, CliError> {
    file.map(|path| -> Result<Tree, CliError> {
        let text = fs::read_to_string(&path)?;
        cli::parse_document(&text, Some(&path))
    })
    .transpose()
}

fn run_expand(
    file: Option<PathBuf>,
    context: Option<PathBuf>,
    transformers: Option<Vec<String>>,
    format: Format,
    validate: bool,
) -> Result<String, CliError> {
    let (document, base_dir) = read_document(file.as_deref())?;
    let request = ExpandRequest {
        document,
        base_dir,
        context: read_context(context)?,
        transformers,
        format,
        validate,
    };
    cli::execute_expand(&request)
}

fn run_validate(file: Option<PathBuf>, context: Option<PathBuf>) -> Result<String, CliError> {
    let (document, _) = read_document(file.as_deref())?;
    let context = read_context(context)?;
    cli::execute_validate(&document, context.as_ref())
}
