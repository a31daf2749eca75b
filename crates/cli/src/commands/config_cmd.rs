//! `chainloom config`: print configuration as TOML.

use chainloom_config::AppConfig;

pub fn run(config: &AppConfig, effective: bool) -> anyhow::Result<()> {
    let rendered = if effective {
        toml::to_string_pretty(config)?
    } else {
        AppConfig::default_toml()
    };
    print!("{rendered}");
    Ok(())
}
