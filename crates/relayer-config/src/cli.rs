use std::path::PathBuf;

use anyhow::Context;
use directories_next::ProjectDirs;
use structopt::StructOpt;

use crate::BridgeRelayerConfig;

/// Qualifier, organization and application the default config and
/// database directories are derived from when the CLI does not override
/// them.
const PROJECT_DIRS: (&str, &str, &str) =
    ("network", "bridgeworks", "bridge-relayer");

/// The Bridge Relayer Command-line tool
///
/// Start the relayer from a config directory:
///
/// $ bridge-relayer -vvv -c <CONFIG_DIR_PATH>
#[derive(Debug, StructOpt)]
#[structopt(name = "Bridge Relayer")]
pub struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: i32,
    /// Directory that contains configration files.
    #[structopt(
        short = "c",
        long = "config-dir",
        value_name = "PATH",
        parse(from_os_str)
    )]
    pub config_dir: Option<PathBuf>,
    /// Where to keep the database. Defaults to the OS data directory.
    #[structopt(
        long = "db-path",
        value_name = "PATH",
        parse(from_os_str),
        conflicts_with = "tmp"
    )]
    pub db_path: Option<PathBuf>,
    /// Keep the database in a temporary directory instead, deleted when
    /// the process exits.
    #[structopt(long)]
    pub tmp: bool,
}

fn project_dirs() -> anyhow::Result<ProjectDirs> {
    let (qualifier, organization, application) = PROJECT_DIRS;
    ProjectDirs::from(qualifier, organization, application)
        .context("failed to resolve the project directories")
}

impl Opts {
    /// The directory configuration is loaded from: the `--config-dir`
    /// flag, or the OS config directory for this package.
    pub fn config_dir(&self) -> anyhow::Result<PathBuf> {
        let dir = match &self.config_dir {
            Some(dir) => dir.clone(),
            None => project_dirs()?.config_dir().to_path_buf(),
        };
        anyhow::ensure!(dir.is_dir(), "{} is not a directory", dir.display());
        Ok(dir)
    }

    /// Where the database lives: the `--db-path` flag, or a `db`
    /// directory under the OS local data directory for this package.
    pub fn db_path(&self) -> anyhow::Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_local_dir().join("db")),
        }
    }
}

/// Loads and verifies the configuration selected by the CLI options.
pub fn load_config(opts: &Opts) -> anyhow::Result<BridgeRelayerConfig> {
    let dir = opts.config_dir()?;
    tracing::trace!("Loading Config from {} ..", dir.display());
    let config = crate::utils::load(dir)?;
    tracing::trace!("Config loaded..");
    Ok(config)
}

/// Opens the database store selected by the CLI options.
pub fn create_store(
    opts: &Opts,
) -> anyhow::Result<bridge_relayer_store::SledStore> {
    if opts.tmp {
        tracing::debug!("Using temp dir for store");
        return Ok(bridge_relayer_store::SledStore::temporary()?);
    }
    Ok(bridge_relayer_store::SledStore::open(opts.db_path()?)?)
}

/// Sets up the logger for the relayer, based on the verbosity level
/// passed in.
///
/// Verbosity maps the `-v` occurrences onto the bridge crates only;
/// everything else stays at `warn` unless `RUST_LOG` overrides it.
pub fn setup_logger(verbosity: i32) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("warn".parse()?);
    let bridge_targets = [
        "bridge_relayer",
        "bridge_swap_relay",
        "bridge_evm_chain",
        "bridge_dts_client",
        "bridge_rpc_dispatch",
        "bridge_probe",
    ];
    for target in bridge_targets {
        filter = filter.add_directive(format!("{target}={level}").parse()?);
    }
    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(filter)
        .pretty()
        .init();
    Ok(())
}
