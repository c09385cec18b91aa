//! acc: a minimal XMPP chat client for the terminal.

mod console;

use std::path::{Path, PathBuf};

use {
    acc_config::AccountConfig,
    clap::{Parser, error::ErrorKind},
    tracing::{debug, error},
    tracing_subscriber::EnvFilter,
};

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "warn,acc=info,acc_config=info,acc_xmpp=info";

#[derive(Parser)]
#[command(name = "acc", version, about = "Minimal XMPP chat client")]
struct Cli {
    /// Configuration profile: the config file section to use on top of the
    /// global keys.
    profile: Option<String>,

    /// Path to the INI configuration file.
    #[arg(short, long, env = "ACC_CONFIG", default_value = "config.ini")]
    config: PathBuf,

    /// Print the resolved configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

/// Parse arguments; any usage error exits with status 1.
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        },
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Validate `config`, reporting the problem once on stderr if it cannot be
/// used to connect.
fn is_usable(config: &AccountConfig, path: &Path) -> bool {
    match config.validate() {
        Ok(()) => true,
        Err(e) => {
            error!(path = %path.display(), "unusable configuration: {e}");
            false
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_args();
    init_tracing();

    let config = AccountConfig::load(&cli.config, cli.profile.as_deref());
    debug!(path = %cli.config.display(), profile = ?cli.profile, ?config, "configuration loaded");

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if !is_usable(&config, &cli.config) {
        std::process::exit(1);
    }

    console::run(config).await
}

#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn profile_is_optional() {
        let cli = Cli::try_parse_from(["acc"]).unwrap();
        assert!(cli.profile.is_none());
        assert!(!cli.print_config);

        let cli = Cli::try_parse_from(["acc", "work", "-c", "/etc/acc.ini"]).unwrap();
        assert_eq!(cli.profile.as_deref(), Some("work"));
        assert_eq!(cli.config, PathBuf::from("/etc/acc.ini"));
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = Cli::try_parse_from(["acc", "--bogus"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn incomplete_config_is_not_usable() {
        let path = Path::new("config.ini");
        assert!(!is_usable(&AccountConfig::default(), path));

        let source = acc_config::ConfigSource::from_reader(std::io::Cursor::new(
            "user = bot@example.com\npass = hunter2\n",
        ));
        let config = AccountConfig::from_source(source, None);
        assert!(is_usable(&config, path));
    }

    #[test]
    fn extra_positional_is_rejected() {
        assert!(Cli::try_parse_from(["acc", "one", "two"]).is_err());
    }
}
