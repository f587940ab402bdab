//! Argument parsing and subcommand dispatch.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ferry_convert::{
    ConvertOptions, Engine, EngineBuilder, EngineConfig, Overrides, PluginGroup, Target,
};
use ferry_core::{DefaultPlugins, TracingFormat, TracingPlugin};
use ferry_remote::Connector;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

/// Moves tabular data between local files, remote hosts and memory.
#[derive(Parser, Debug)]
#[command(name = "ferry", version)]
#[command(about = "Convert data between formats and hosts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Maximum log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: Level,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Local staging directory for temporaries
    #[arg(long, global = true)]
    pub temp_dir: Option<PathBuf>,

    /// Remote staging directory for temporaries
    #[arg(long, global = true)]
    pub remote_temp_dir: Option<String>,

    /// Port assumed for remote hosts given without one
    #[arg(long, global = true)]
    pub default_port: Option<u16>,
}

/// Log output format.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,
    /// One line per event
    Compact,
    /// JSON lines
    Json,
}

impl From<LogFormat> for TracingFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
            LogFormat::Json => Self::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert SOURCE into TARGET, overwriting TARGET
    Convert {
        /// Source identifier (path, glob, or [ssh://][user@]host[:port]:path)
        source: String,
        /// Target identifier
        target: String,
        /// Codec parameter, repeatable (e.g. delimiter=;)
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,
        #[command(flatten)]
        overrides: TargetArgs,
    },
    /// Print the schema of a resource
    Discover {
        /// Resource identifier
        uri: String,
    },
    /// Delete a resource; succeeds if it is already gone
    Drop {
        /// Resource identifier
        uri: String,
    },
    /// Print the edges a conversion would run, without running them
    Plan {
        /// Source identifier
        from: String,
        /// Target identifier
        to: String,
        #[command(flatten)]
        overrides: TargetArgs,
    },
}

/// Fields that override what the target identifier says.
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Target host; makes the target remote
    #[arg(long)]
    pub host: Option<String>,
    /// Target username
    #[arg(long)]
    pub user: Option<String>,
    /// Target port
    #[arg(long)]
    pub port: Option<u16>,
    /// Target private key file
    #[arg(long)]
    pub key_file: Option<PathBuf>,
    /// Target format, by name or extension
    #[arg(long)]
    pub format: Option<String>,
    /// Treat the target as a directory
    #[arg(long)]
    pub directory: bool,
}

impl TargetArgs {
    fn overrides(&self) -> Overrides {
        let mut overrides = Overrides::new();
        if let Some(host) = &self.host {
            overrides = overrides.hostname(host);
        }
        if let Some(user) = &self.user {
            overrides = overrides.username(user);
        }
        if let Some(port) = self.port {
            overrides = overrides.port(port);
        }
        if let Some(key_file) = &self.key_file {
            overrides = overrides.key_file(key_file);
        }
        if let Some(format) = &self.format {
            overrides = overrides.format(format);
        }
        if self.directory {
            overrides = overrides.directory(true);
        }
        overrides
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

impl Cli {
    /// Builds the engine these arguments describe, dialing through `connector`.
    pub fn engine(&self, connector: Arc<dyn Connector>) -> Engine {
        let mut config = EngineConfig::from_env();
        if let Some(dir) = &self.temp_dir {
            config = config.with_temp_dir(dir);
        }
        if let Some(dir) = &self.remote_temp_dir {
            config = config.with_remote_temp_dir(dir);
        }
        if let Some(port) = self.default_port {
            config = config.with_default_port(port);
        }

        let tracing = TracingPlugin::new()
            .with_level(self.log_level)
            .with_format(self.log_format.into());
        EngineBuilder::new()
            .with_config(config)
            .with_connector(connector)
            .add_plugins(
                DefaultPlugins
                    .build()
                    .disable::<TracingPlugin>()
                    .add(tracing),
            )
            .build()
    }
}

impl Command {
    /// Runs the subcommand, writing its report to `out`.
    pub fn run(&self, engine: &Engine, out: &mut impl Write) -> Result<()> {
        match self {
            Self::Convert {
                source,
                target,
                params,
                overrides,
            } => {
                let source = engine
                    .resource(source)
                    .with_context(|| format!("resolving source '{source}'"))?;
                let target = engine
                    .resource_with(target, &overrides.overrides())
                    .with_context(|| format!("resolving target '{target}'"))?;
                let options = params
                    .iter()
                    .fold(ConvertOptions::new(), |options, (key, value)| {
                        options.with_param(key, value)
                    });
                let result = engine.convert(Target::Existing(target), &source, &options)?;
                writeln!(out, "{result}")?;
            }
            Self::Discover { uri } => {
                let resource = engine
                    .resource(uri)
                    .with_context(|| format!("resolving '{uri}'"))?;
                writeln!(out, "{}", engine.discover(&resource)?)?;
            }
            Self::Drop { uri } => {
                engine.drop_uri(uri)?;
            }
            Self::Plan { from, to, overrides } => {
                let from = engine
                    .resource(from)
                    .with_context(|| format!("resolving source '{from}'"))?;
                let to = engine
                    .resource_with(to, &overrides.overrides())
                    .with_context(|| format!("resolving target '{to}'"))?;
                let plan = engine.plan(from.resource_type(), to.resource_type())?;
                writeln!(out, "{plan}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_convert::EngineError;
    use ferry_remote::LoopbackConnector;
    use std::fs;

    struct Harness {
        dir: tempfile::TempDir,
        connector: Arc<LoopbackConnector>,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let connector = Arc::new(LoopbackConnector::with_root(dir.path().join("remote")));
            Self { dir, connector }
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).display().to_string()
        }

        fn run(&self, args: &[&str]) -> Result<String> {
            let staging = self.path("staging");
            let mut argv = vec!["ferry", "--temp-dir", staging.as_str()];
            argv.extend_from_slice(args);
            let cli = Cli::try_parse_from(argv)?;
            let engine = cli.engine(self.connector.clone());
            let mut out = Vec::new();
            let result = cli.command.run(&engine, &mut out);
            engine.shutdown();
            result.map(|()| String::from_utf8_lossy(&out).into_owned())
        }
    }

    #[test]
    fn params_need_a_key() {
        assert_eq!(
            parse_param("delimiter=;"),
            Ok(("delimiter".to_string(), ";".to_string()))
        );
        assert_eq!(parse_param("a=b=c").unwrap().1, "b=c");
        assert!(parse_param("=x").is_err());
        assert!(parse_param("novalue").is_err());
    }

    #[test]
    fn global_flags_parse() {
        let cli = Cli::try_parse_from([
            "ferry",
            "discover",
            "x.csv",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--default-port",
            "2222",
        ])
        .unwrap();
        assert_eq!(cli.log_level, Level::DEBUG);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.default_port, Some(2222));
        assert!(Cli::try_parse_from(["ferry", "discover", "x.csv", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn convert_discover_and_drop() {
        let h = Harness::new();
        let source = h.path("in.csv");
        fs::write(&source, "name;balance\nAlice;100\n").unwrap();
        let target = h.path("out/in.json");

        let report = h
            .run(&["convert", &source, &target, "-p", "delimiter=;"])
            .unwrap();
        assert!(report.contains("out/in.json"));
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            r#"[{"name":"Alice","balance":100}]"#
        );

        let schema = h.run(&["discover", &target]).unwrap();
        assert_eq!(schema.trim(), "{name: string, balance: int64}");

        h.run(&["drop", &target]).unwrap();
        h.run(&["drop", &target]).unwrap();
        assert!(!PathBuf::from(&target).exists());
    }

    #[test]
    fn convert_to_a_remote_host_by_override() {
        let h = Harness::new();
        let source = h.path("in.csv");
        fs::write(&source, "a\n1\n").unwrap();

        h.run(&[
            "convert",
            &source,
            "/data/out.jsonl",
            "--host",
            "localhost",
        ])
        .unwrap();
        let uploaded = fs::read_to_string(h.connector.resolve("/data/out.jsonl")).unwrap();
        assert_eq!(uploaded.trim(), r#"{"a":1}"#);
    }

    #[test]
    fn plan_prints_edges() {
        let h = Harness::new();
        let report = h
            .run(&["plan", "a.csv", "b.data", "--format", "json"])
            .unwrap();
        assert_eq!(
            report.trim(),
            "csv -[read csv]-> memory(records) -[write json]-> json"
        );
    }

    #[test]
    fn errors_keep_their_category() {
        let h = Harness::new();
        let err = h.run(&["discover", "notes.txt"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::UnknownFormat(_))
        ));
    }
}
