//! The network-facing binary: HTTP routing, configuration loading, logging
//! setup, and CLI argument parsing: the thing that is actually deployed.

extern crate log;
extern crate error_chain;
extern crate serde;
extern crate serde_json;
extern crate serde_yaml;
extern crate clap;

extern crate executor;
extern crate registry;
extern crate sandbox;

mod cli;
mod config;
mod routes;

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use log::info;

use executor::{Executor, ExecutorConfig};
use registry::{LanguageConfig, Registry, RegistryConfig};

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::routes::AppState;

error_chain::error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    foreign_links {
        Io(::std::io::Error);
        Yaml(::serde_yaml::Error);
        LogError(::log::SetLoggerError);
        Addr(::std::net::AddrParseError);
    }

    errors {
        InvalidConfigFile {
            description("invalid config file")
        }
    }
}

/// The two languages the service ships runtime support for, mirroring the
/// original's hardcoded `RuntimeManager.SUPPORTED_LANGUAGES` table.
fn default_language_registry(config: &AppConfig) -> Registry {
    let mut languages = HashMap::new();
    languages.insert(
        "python".to_owned(),
        LanguageConfig::new("python", vec!["python3".to_owned(), "python".to_owned()]),
    );
    languages.insert(
        "node".to_owned(),
        LanguageConfig::new("node", vec!["node".to_owned()]),
    );

    Registry::new(RegistryConfig {
        package_root: config.packages_dir.clone(),
        languages,
    })
}

fn init_log(log_config_file: Option<&std::path::Path>, log_level: &str) -> Result<()> {
    if let Some(path) = log_config_file {
        info!("initializing logging from file: {}", path.display());
        log4rs::init_file(path, log4rs::config::Deserializers::default())
            .map_err(|e| Error::from(e.to_string()))?;
        return Ok(());
    }

    let level = log_level.parse().unwrap_or(log::LevelFilter::Info);
    let stdout = log4rs::append::console::ConsoleAppender::builder().build();
    let log_config = log4rs::config::Config::builder()
        .appender(log4rs::config::Appender::builder().build("stdout", Box::new(stdout)))
        .build(log4rs::config::Root::builder().appender("stdout").build(level))
        .expect("log4rs default config is well-formed");
    log4rs::init_config(log_config)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut app_config = AppConfig::load(&cli.config)?;
    app_config.apply_env_overrides();
    if let Some(host) = &cli.host {
        app_config.host = host.clone();
    }
    if let Some(port) = cli.port {
        app_config.port = port;
    }

    init_log(cli.log_config.as_deref(), &app_config.log_level)?;
    info!("starting {} {}", app_config.api_title, app_config.api_version);

    let registry = default_language_registry(&app_config);
    let executor_config = ExecutorConfig {
        packages_dir: app_config.packages_dir.clone(),
        use_bubblewrap: app_config.use_bubblewrap,
        max_output_size: app_config.max_output_size,
        max_stderr_size: app_config.max_stderr_size,
    };
    let executor = Executor::new(registry, executor_config);

    let state = AppState {
        config: Arc::new(app_config.clone()),
        executor: Arc::new(executor),
    };

    let app = routes::build_router(state);

    let addr: std::net::SocketAddr = format!("{}:{}", app_config.host, app_config.port)
        .parse()
        .map_err(Error::from)?;
    info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(Error::from)?;
    axum::serve(listener, app).await.map_err(Error::from)?;

    Ok(())
}
