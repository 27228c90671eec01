use anyhow::Result;
use clap::{App, Arg};
use runestone::config::Config;
use runestone::serve;
use runestone::store::Store;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "runestone.yaml";

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let matches = App::new("runestone")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Serves Markdown articles through Go-style templates")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Load config from file")
                .takes_value(true)
                .default_value(DEFAULT_CONFIG),
        )
        .get_matches();

    let config_file = matches.value_of("config").unwrap_or(DEFAULT_CONFIG);
    if let Err(e) = run(Path::new(config_file)) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(config_file: &Path) -> Result<()> {
    let config = Config::from_file(config_file)?;
    let store = Store::new(&config.content_dir, config.reload_cooldown())?;
    serve::serve(&config, Arc::new(store))
}
