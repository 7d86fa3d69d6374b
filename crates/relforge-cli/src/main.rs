//! relforge - compile a release against a stemcell via a director.
//!
//! One-shot invocation: the run clears prior director state, uploads both
//! artifacts, deploys a generated manifest to trigger compilation, downloads
//! the exported result into the output directory, and tears down after
//! itself. The first failing step aborts the run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relforge_core::{Compiler, ManifestGenerator, TracingReporter, UuidTokenGenerator};
use relforge_director::{DirectorClient, DirectorConfig};

#[derive(Parser)]
#[command(name = "relforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile a release against a stemcell via a director", long_about = None)]
struct Cli {
    /// Director API endpoint, e.g. https://192.168.50.6:25555
    #[arg(long, env = "RELFORGE_DIRECTOR_URL")]
    director_url: String,

    /// Director username
    #[arg(long, env = "RELFORGE_DIRECTOR_USERNAME")]
    username: String,

    /// Director password
    #[arg(long, env = "RELFORGE_DIRECTOR_PASSWORD", hide_env_values = true)]
    password: String,

    /// Path to the release tarball to compile
    #[arg(long)]
    release_tarball: PathBuf,

    /// Path to the stemcell tarball to compile against
    #[arg(long)]
    stemcell_tarball: PathBuf,

    /// Directory the compiled release tarball is written into
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Accept invalid director TLS certificates
    #[arg(long)]
    insecure: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = DirectorConfig::new(&cli.director_url, &cli.username, &cli.password);
    if cli.insecure {
        config = config.with_insecure_tls();
    }
    let director =
        DirectorClient::new(config).context("failed to construct director client")?;

    let compiler = Compiler {
        release_tarball: cli.release_tarball,
        stemcell_tarball: cli.stemcell_tarball,
        output_dir: cli.output_dir,
        director: Arc::new(director),
        manifest_generator: ManifestGenerator::new(),
        token_generator: Box::new(UuidTokenGenerator::new()),
        reporter: Arc::new(TracingReporter::new()),
    };

    let output_path = compiler.run().await?;
    info!(path = %output_path.display(), "compiled release written");

    Ok(())
}
