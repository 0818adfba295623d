#![forbid(unsafe_code)]

//! Operator CLI over the resource stores: schema install, read-only
//! inspection and owner-grant reconciliation.

use clap::{Args, Parser, Subcommand};
use cms_core::ids::{DomainId, ResourceUuid, SubjectId};
use cms_storage::{ManagerConfig, RequestContext, Resource, ResourceManager};
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cms-admin", version)]
#[command(about = "Inspect and repair the resource, blob and policy stores", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `storage_dir` from the configuration and environment.
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the storage directory, databases and blob root
    Init,
    /// List every resource a subject owns
    List(Caller),
    /// Show one resource
    Show {
        #[command(flatten)]
        caller: Caller,
        uuid: String,
    },
    /// Re-grant missing owner tuples and revoke tuples of deleted resources
    Reconcile,
    /// Show a subject's profile
    Profile {
        #[arg(long)]
        subject: i64,
    },
}

#[derive(Args)]
struct Caller {
    #[arg(long)]
    subject: i64,
    #[arg(long)]
    domain: i64,
}

impl Caller {
    fn context(&self) -> Result<RequestContext, String> {
        let subject = SubjectId::try_new(self.subject).map_err(|err| err.message().to_string())?;
        let domain = DomainId::try_new(self.domain).map_err(|err| err.message().to_string())?;
        Ok(RequestContext::new(subject, domain))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = ManagerConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = dir;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut manager = ResourceManager::open(config)?;
    let output = match cli.command {
        Command::Init => serde_json::json!({
            "storage_dir": manager.config().storage_dir.display().to_string(),
            "database": manager.config().database_path().display().to_string(),
            "policies": manager.config().policy_path().display().to_string(),
            "blob_root": manager.config().blob_root().display().to_string(),
        }),
        Command::List(caller) => {
            let ctx = caller.context()?;
            let resources = manager.list(&ctx)?;
            serde_json::Value::Array(resources.iter().map(render_resource).collect::<Result<_, _>>()?)
        }
        Command::Show { caller, uuid } => {
            let ctx = caller.context()?;
            let uuid = ResourceUuid::parse(&uuid).map_err(|err| err.message().to_string())?;
            render_resource(&manager.get(&ctx, &uuid)?)?
        }
        Command::Reconcile => serde_json::to_value(manager.reconcile()?)?,
        Command::Profile { subject } => {
            let subject = SubjectId::try_new(subject).map_err(|err| err.message().to_string())?;
            serde_json::to_value(manager.get_profile(subject)?)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn render_resource(resource: &Resource) -> Result<serde_json::Value, serde_json::Error> {
    let mut value = serde_json::to_value(resource)?;
    if let Some(object) = value.as_object_mut() {
        object.insert(
            "created_at".to_string(),
            ts_ms_to_rfc3339(resource.created_at_ms).into(),
        );
        object.insert(
            "updated_at".to_string(),
            ts_ms_to_rfc3339(resource.updated_at_ms).into(),
        );
    }
    Ok(value)
}

fn ts_ms_to_rfc3339(ts_ms: i64) -> String {
    let nanos = (ts_ms as i128) * 1_000_000i128;
    let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    dt.format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
