//! armature — compile a CAD assembly into a robot description.
//!
//! Exit codes: 0 success, 2 configuration error, 3 upstream error,
//! 4 compile error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use armature_client::{
    ClientError, Credentials, Document, PassthroughStl, SnapshotClient,
};
use armature_compile::{compile, CompileError, CompileOptions};
use armature_robot::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "armature", version, about = "Compile a CAD assembly into URDF or MJCF")]
struct Args {
    /// Assembly document URL:
    /// https://<host>/documents/{did}/{w|v|m}/{wid}/e/{eid}
    url: String,

    /// Robot name; also the artifact file stem.
    #[arg(long)]
    name: String,

    /// Depth at which sub-assemblies collapse into rigid links.
    #[arg(long, default_value_t = 0)]
    max_depth: usize,

    /// Root the tree at a user-fixed occurrence when one exists.
    #[arg(long)]
    use_user_defined_root: bool,

    /// Output format: urdf or mjcf.
    #[arg(long, default_value = "urdf")]
    output_type: String,

    /// Pre-fetched assembly snapshot (JSON); compiles offline.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Skip mesh downloads.
    #[arg(long)]
    no_assets: bool,
}

const EXIT_CONFIG: u8 = 2;
const EXIT_UPSTREAM: u8 = 3;
const EXIT_COMPILE: u8 = 4;

fn exit_code_for(error: &CompileError) -> u8 {
    match error {
        CompileError::Client(_) => EXIT_UPSTREAM,
        _ => EXIT_COMPILE,
    }
}

async fn run(args: Args) -> Result<(), u8> {
    let document = Document::from_url(&args.url).map_err(|e| {
        error!("{e}");
        EXIT_CONFIG
    })?;

    let Some(format) = OutputFormat::parse(&args.output_type) else {
        error!("unknown output type {:?} (expected urdf or mjcf)", args.output_type);
        return Err(EXIT_CONFIG);
    };

    let options = CompileOptions {
        max_depth: args.max_depth,
        use_user_defined_root: args.use_user_defined_root,
    };

    // The REST client is an external collaborator wired in behind the
    // CadClient trait; this driver operates on snapshot documents.
    let client = match &args.snapshot {
        Some(path) => SnapshotClient::from_file(path).map_err(|e| {
            error!("failed to load snapshot {}: {e}", path.display());
            EXIT_CONFIG
        })?,
        None => {
            if Credentials::from_env().is_none() {
                error!("ACCESS_KEY / SECRET_KEY not set and no --snapshot given");
            } else {
                error!("no CAD client is wired into this build; pass --snapshot");
            }
            return Err(EXIT_CONFIG);
        }
    };

    let robot = compile(&client, &document, &args.name, options)
        .await
        .map_err(|e| {
            error!("{e}");
            if let CompileError::Client(ClientError::Throttled { retry_after }) = &e {
                warn!(?retry_after, "the CAD service asked to retry later");
            }
            exit_code_for(&e)
        })?;

    let out_dir = std::env::current_dir().map_err(|e| {
        error!("{e}");
        EXIT_CONFIG
    })?;
    let path = robot
        .save(&out_dir, format, !args.no_assets, &client, &PassthroughStl)
        .await
        .map_err(|e| {
            error!("{e}");
            EXIT_COMPILE
        })?;

    info!(path = %path.display(), "compiled {} links, {} joints", robot.links.len(), robot.joints.len());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}
