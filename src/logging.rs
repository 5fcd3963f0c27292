use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// `ACADEME_LOG` overrides the verbosity-derived filter. Logs go to stderr
/// unless `log_dir` is given, in which case they roll daily into
/// `academe.log` there. Keep the returned guard alive until exit so buffered
/// lines are flushed.
pub fn init(verbosity: u8, log_dir: Option<&Path>) -> Result<WorkerGuard> {
  let filter = EnvFilter::try_from_env("ACADEME_LOG").unwrap_or_else(|_| match verbosity {
    0 => EnvFilter::new("warn"),
    1 => EnvFilter::new("info"),
    2 => EnvFilter::new("debug"),
    _ => EnvFilter::new("trace"),
  });

  let (writer, guard) = match log_dir {
    Some(dir) => {
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "academe.log"))
    }
    None => tracing_appender::non_blocking(std::io::stderr()),
  };

  fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(log_dir.is_none())
    .try_init()
    .map_err(|e| eyre!("Failed to install logger: {}", e))?;

  Ok(guard)
}
