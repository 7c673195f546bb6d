use moody::logger::*;
use moody::settings::parse_settings;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    let config = LogConfig {
        filter: "debug".to_string(),
    };
    logger.reload_from_config(&config)?;
    trace!("application trace log");
    debug!("application debug log");
    info!("application info log");

    let settings = parse_settings(Some("settings/release.toml"))?;
    logger.reload_from_config(&LogConfig::from(&settings.log))?;
    debug!("hidden by the release filter");
    info!(filter = %settings.log.filter, "release filter applied");

    Ok(())
}
