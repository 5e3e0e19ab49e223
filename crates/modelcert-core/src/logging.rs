use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global fmt subscriber writing to stderr.
///
/// `level` is an `EnvFilter` directive such as `info` or `modelcert_core=debug`;
/// an invalid directive falls back to `info`. Returns `false` if a global
/// subscriber was already set.
pub fn init_logging(level: &str, json: bool) -> bool {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .try_init()
            .is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(event = "modelcert.logging.init", level = %level, json = json);
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_rejected() {
        let _ = init_logging("not a valid [directive", true);
        assert!(!init_logging("info", false));
    }
}
