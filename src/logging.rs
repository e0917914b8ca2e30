//! Logging setup: `env_logger` reading `RUST_LOG`, with a formatter that
//! keeps the level, target and `file:line` on every record so the lock
//! table's `debug!` chatter is easy to trace back to the call site.

use std::io::Write;

use env_logger::Builder;
use once_cell::sync::OnceCell;

static INIT: OnceCell<()> = OnceCell::new();

/// Initializes the global logger from `RUST_LOG`. Every test calls this at
/// the top of its setup; the `OnceCell` keeps the actual builder call to a
/// single execution per process no matter how many tests call it.
pub fn init() {
    INIT.get_or_init(|| {
        let _ = Builder::from_default_env()
            .format_timestamp_secs()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} - {}] [{}:{}] {}",
                    record.level(),
                    record.target(),
                    record.file().unwrap_or("?"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .is_test(true)
            .try_init();
    });
}
