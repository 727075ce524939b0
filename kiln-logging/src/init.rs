use anyhow::Result;
use kiln_core::LogLevel;
use tracing_subscriber::EnvFilter;

/// Build an env filter for a level, letting `RUST_LOG` refine it
pub fn env_filter_for(level: LogLevel) -> EnvFilter {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => {
            EnvFilter::try_new(format!("{},{}", level, directives))
                .unwrap_or_else(|_| EnvFilter::new(level.as_str()))
        }
        _ => EnvFilter::new(level.as_str()),
    }
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Use try_init to avoid panic if global subscriber already set
    if tracing_subscriber::fmt().with_env_filter(env_filter).try_init().is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize tracing inside a worker process.
///
/// Output goes to stderr; stdout and stdin belong to the launch protocol.
pub fn init_worker_tracing(level: LogLevel) -> Result<()> {
    let initialized = tracing_subscriber::fmt()
        .with_env_filter(env_filter_for(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    if initialized.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    tracing::debug!("Worker tracing initialized at level {}", level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_initialization_is_harmless() {
        assert!(init_worker_tracing(LogLevel::Debug).is_ok());
        assert!(init_worker_tracing(LogLevel::Error).is_ok());
        assert!(init_simple_tracing("warn").is_ok());
    }

    #[test]
    fn test_env_filter_for_level() {
        let filter = env_filter_for(LogLevel::Warn);
        assert!(filter.to_string().contains("warn"));
    }
}
