use crate::error::{CliError, Result};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    pub verbosity: u8,
    pub quiet: bool,
    pub log_file: Option<PathBuf>,
    /// Emit an event with the busy and idle time of each span when it closes.
    pub profile: bool,
}

impl LoggingOptions {
    pub fn level_filter(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::OFF;
        }
        match (self.verbosity, self.profile) {
            (0, false) => LevelFilter::WARN,
            // Span close events are emitted at INFO.
            (0, true) | (1, _) => LevelFilter::INFO,
            (2, _) => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.profile { FmtSpan::CLOSE } else { FmtSpan::NONE }
    }
}

pub fn setup_logging(options: &LoggingOptions) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_span_events(options.span_events())
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(options.level_filter())
        .with(stderr_layer);

    if let Some(path) = &options.log_file {
        let file = File::create(path).map_err(CliError::Io)?;

        // Accelerated kernels run on named device threads.
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_names(true)
            .with_target(true)
            .with_span_events(options.span_events());

        subscriber.with(file_layer).init();
    } else {
        subscriber.init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Mutex;
    use tracing::{debug, info_span};

    #[test]
    fn level_filter_follows_verbosity_and_quiet() {
        let mut options = LoggingOptions::default();
        assert_eq!(options.level_filter(), LevelFilter::WARN);
        options.profile = true;
        assert_eq!(options.level_filter(), LevelFilter::INFO);
        options.verbosity = 2;
        assert_eq!(options.level_filter(), LevelFilter::DEBUG);
        options.verbosity = 7;
        assert_eq!(options.level_filter(), LevelFilter::TRACE);
        options.quiet = true;
        assert_eq!(options.level_filter(), LevelFilter::OFF);
    }

    #[test]
    #[serial]
    fn profile_layer_records_span_timings() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("profile.log");
        let file = File::create(&log_path).unwrap();

        let options = LoggingOptions {
            profile: true,
            ..Default::default()
        };
        let file_layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_span_events(options.span_events());
        let subscriber = tracing_subscriber::registry()
            .with(options.level_filter())
            .with(file_layer);

        tracing::subscriber::with_default(subscriber, || {
            let span = info_span!("pair_compute", timestep = 3);
            let _guard = span.enter();
            debug!("filtered out at INFO");
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("pair_compute"));
        assert!(content.contains("close"));
        assert!(content.contains("time.busy"));
        assert!(!content.contains("filtered out"));
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let options = LoggingOptions {
                log_file: Some(invalid_path),
                ..Default::default()
            };
            let result = setup_logging(&options);
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
