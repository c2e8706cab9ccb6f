use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use env_logger::{Builder, Env, Target};

/// Any value forces debug logging, for development setups.
pub const DEV_ENV: &str = "SVAROG_DEV";

fn default_filter(configured: &str, dev: bool) -> &str {
    if dev {
        "debug"
    } else if configured.trim().is_empty() {
        "info"
    } else {
        configured
    }
}

/// Sets up `env_logger` with the configured level, which `RUST_LOG` overrides.
/// Logs go to stderr unless a file is given, which is appended to.
pub fn init(level: &str, file: Option<&Path>) -> std::io::Result<()> {
    let dev = std::env::var_os(DEV_ENV).is_some();
    let filter = default_filter(level, dev).to_lowercase();

    let mut builder = Builder::from_env(Env::default().default_filter_or(filter.as_str()));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {:>7}: {}",
            chrono::Local::now().format("%H:%M:%S"),
            record.level(),
            record.args()
        )
    });

    if let Some(path) = file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let target = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(target)));
    }

    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
    log::debug!("Logging at {} to {}", filter, file.map_or("stderr".into(), |p| p.display().to_string()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_mode_forces_debug() {
        assert_eq!(default_filter("warn", true), "debug");
        assert_eq!(default_filter("warn", false), "warn");
        assert_eq!(default_filter("", false), "info");
    }
}
