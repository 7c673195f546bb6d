use moody::settings::*;

fn main() -> anyhow::Result<()> {
    // Load settings from the default location
    let project_settings = parse_settings(None)?;
    println!("Loaded settings: {:?}", project_settings);

    // Attempt to load from an invalid path (expected to fail)
    let is_err = parse_settings(Some("")).is_err();
    println!("Error on invalid path: {:?}", is_err);

    // $ cargo run --bin settings_demo -- --settings=settings/release.toml
    // $ MOODY__STORE__BACKEND=mysql cargo run --bin settings_demo
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    println!(
        "store={} auth={} address={}",
        project_settings.store.backend, project_settings.auth.backend, project_settings.http.address
    );

    Ok(())
}
