use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::{debug, error, info};

mod artifact;
mod engine;
mod env;
mod error;
mod manifest;
mod storage;
mod util;

use artifact::{Arch, Platform, UploadRequest};
use engine::state::ManifestStatus;
use error::PublishError;
use manifest::MANIFEST_KEY;
use storage::S3Store;

const AFTER_HELP: &str = "\
Examples:
  # Upload macOS ARM64 build (signed and notarized)
  upload-to-r2 --file dist/Ami-1.0.0-macos-arm64.dmg --version 1.0.0 \\
    --platform macos --arch arm64 --signed --notarized

  # Upload Windows build (unsigned)
  upload-to-r2 --file dist/Ami-1.0.0-windows-x64.zip --version 1.0.0 \\
    --platform windows --arch x64

Environment variables required:
  R2_ACCESS_KEY_ID
  R2_SECRET_ACCESS_KEY
  R2_ENDPOINT
  R2_BUCKET

Optional:
  R2_PUBLIC_URL   public base URL used for the printed download links
  RUST_LOG        log filter (default: info)";

#[derive(Parser, Debug)]
#[command(
    name = "upload-to-r2",
    author,
    about = "Upload build artifacts to Cloudflare R2 and update the release manifest",
    disable_version_flag = true,
    after_help = AFTER_HELP
)]
struct Cli {
    /// Path to the file to upload.
    #[arg(long)]
    file: PathBuf,

    /// Release version, e.g. 1.0.0.
    #[arg(long)]
    version: String,

    #[arg(long, value_enum)]
    platform: Platform,

    #[arg(long, value_enum)]
    arch: Arch,

    /// The binary is code-signed.
    #[arg(long)]
    signed: bool,

    /// The macOS app is notarized (ignored for other platforms).
    #[arg(long)]
    notarized: bool,

    /// Git commit the build was made from.
    #[arg(long)]
    commit_sha: Option<String>,

    /// Product prefix for the "latest" file name.
    #[arg(long, default_value = "Ami")]
    product_name: String,
}

impl From<Cli> for UploadRequest {
    fn from(cli: Cli) -> Self {
        Self {
            file: cli.file,
            version: cli.version,
            platform: cli.platform,
            arch: cli.arch,
            signed: cli.signed,
            notarized: cli.notarized,
            commit_sha: cli.commit_sha,
            product_name: cli.product_name,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let request = UploadRequest::from(Cli::parse());
    match engine::publish(&request, |name| std::env::var(name).ok(), S3Store::connect).await {
        Ok(outcome) => {
            debug!("stages: {:?}", outcome.stages);
            info!("upload complete");
            println!();
            println!("Published {} ({})", request.file_name(), outcome.content_type);
            println!("   sha256:    {}", outcome.digest.sha256);
            println!("   versioned: {}", outcome.keys.versioned);
            println!("   latest:    {}", outcome.keys.latest);
            match &outcome.manifest {
                ManifestStatus::Updated { platforms } => {
                    println!("   manifest:  {MANIFEST_KEY} ({platforms} platforms)");
                }
                ManifestStatus::Failed(reason) => {
                    println!("   manifest:  not updated ({reason})");
                }
            }
            println!();
            println!("Download URLs:");
            println!("   Versioned: {}", outcome.hints.versioned);
            println!("   Latest:    {}", outcome.hints.latest);
            if !outcome.hints.from_public_url {
                println!();
                println!(
                    "Configure R2 public access or a custom domain (R2_PUBLIC_URL) to enable direct downloads"
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", failure_report(&err));
            ExitCode::FAILURE
        }
    }
}

/// One-line failure message. The error's own text already carries its cause.
fn failure_report(err: &PublishError) -> String {
    format!("upload failed during '{}': {err}", err.stage())
}
