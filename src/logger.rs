use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

/// Line-oriented progress output: `2024-01-31 12:00:00 [INFO] - message`.
/// `level` is the default; `RUST_LOG` still wins when set.
pub fn init(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);

    let result = Builder::new()
        .format(|buf, record| {
            writeln!(buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, filter)
        .parse_default_env()
        .try_init();

    if result.is_ok() {
        log::debug!("Logger initialized at {}.", filter);
    }
}
