mod config;
mod fmt_cmd;
mod languages_cmd;
mod run_cmd;
mod serve_cmd;
mod source;

use clap::{Parser, Subcommand};

use glyph_core::{Dispatcher, LanguageId};

use config::{CliOverrides, GlyphConfig};
use source::CodeSource;

#[derive(Parser)]
#[command(name = "glyph", about = "Run and verify array-language snippets")]
struct Cli {
    /// Execution timeout per test case in milliseconds (overrides GLYPH_EXEC_TIMEOUT_MS)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default glyph config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Apply code to one input and print the result
    Run {
        /// Language: bqn, apl, j, uiua, kap, tinyapl
        #[arg(long, short)]
        lang: LanguageId,
        #[command(flatten)]
        code: CodeSource,
        /// Right argument, in the language's literal syntax
        #[arg(long, short)]
        input: String,
        /// Left argument; makes the call dyadic
        #[arg(long)]
        left: Option<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run code against a file of test cases
    Test {
        #[arg(long, short)]
        lang: LanguageId,
        #[command(flatten)]
        code: CodeSource,
        /// JSON array of cases or TOML with [[case]] tables
        #[arg(long)]
        cases: String,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which interpreters are installed
    Languages {
        /// Print availability as JSON
        #[arg(long)]
        json: bool,
    },
    /// Format code with the language's canonical formatter
    Fmt {
        #[arg(long, short)]
        lang: LanguageId,
        #[command(flatten)]
        code: CodeSource,
    },
    /// Serve the harness over HTTP
    Serve {
        /// Address to bind (overrides GLYPH_BIND)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides GLYPH_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Execute the `glyph init` command: write config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile::default();
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  execution.timeout_ms = {}", cfg.execution.timeout_ms);
    println!("  server = {}:{}", cfg.server.bind, cfg.server.port);
    println!();
    println!("Add [languages.<id>] tables to pin interpreter paths.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut overrides = CliOverrides {
        timeout_ms: cli.timeout_ms,
        ..CliOverrides::default()
    };

    let passed = match cli.command {
        Commands::Init { force } => {
            cmd_init(force)?;
            true
        }
        Commands::Run {
            lang,
            code,
            input,
            left,
            json,
        } => {
            let resolved = GlyphConfig::resolve(&overrides)?;
            let dispatcher = Dispatcher::new(resolved.harness);
            let code = code.read()?;
            run_cmd::run_single(&dispatcher, lang, &code, &input, left, json).await?
        }
        Commands::Test {
            lang,
            code,
            cases,
            json,
        } => {
            let resolved = GlyphConfig::resolve(&overrides)?;
            let dispatcher = Dispatcher::new(resolved.harness);
            let code = code.read()?;
            run_cmd::run_tests(&dispatcher, lang, &code, &cases, json).await?
        }
        Commands::Languages { json } => {
            let resolved = GlyphConfig::resolve(&overrides)?;
            let dispatcher = Dispatcher::new(resolved.harness);
            languages_cmd::run_languages(&dispatcher, json).await?;
            true
        }
        Commands::Fmt { lang, code } => {
            let resolved = GlyphConfig::resolve(&overrides)?;
            let dispatcher = Dispatcher::new(resolved.harness);
            let code = code.read()?;
            fmt_cmd::run_fmt(&dispatcher, lang, &code).await
        }
        Commands::Serve { bind, port } => {
            overrides.bind = bind;
            overrides.port = port;
            let resolved = GlyphConfig::resolve(&overrides)?;
            let dispatcher = Dispatcher::new(resolved.harness);
            serve_cmd::run_serve(dispatcher, &resolved.server.bind, resolved.server.port).await?;
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that read or write process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
