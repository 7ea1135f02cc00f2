use crate::config::Config;

/// Installs `env_logger` with the configured level. `RUST_LOG` wins when set.
/// Safe to call more than once.
pub fn init_logging(config: &Config) {
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = Config::test_config();
        init_logging(&config);
        init_logging(&config);
        log::debug!("logging initialised twice without panicking");
    }
}
