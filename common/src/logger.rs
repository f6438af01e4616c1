use std::io::Write;

use env_logger::{Builder, WriteStyle};
use log::LevelFilter;

pub fn output_level() -> log::LevelFilter {
    //TODO: read the level from the driver's launch environment
    log::LevelFilter::Info
}

/// Configures logging for a single driver.
///
/// Records are written to stderr, prefixed with `category/subcategory/name`. `RUST_LOG` may
/// lower or raise `output_level` at runtime, but never past the level the driver was compiled
/// with.
pub fn setup_logging(category: &str, subcategory: &str, name: &str, output_level: LevelFilter) {
    let prefix = format!("{category}/{subcategory}/{name}");

    let result = Builder::new()
        .filter_level(output_level)
        .parse_default_env()
        .write_style(WriteStyle::Auto)
        .format(move |buf, record| {
            writeln!(
                buf,
                "{} {} {}: {}",
                prefix,
                record.level(),
                record.module_path().unwrap_or("?"),
                record.args()
            )
        })
        .try_init();

    if let Err(error) = result {
        eprintln!("Failed to set default logger for {category}/{subcategory}/{name}: {error}");
    }
}
