use std::io::Write;
use std::sync::Once;
use std::thread;

use env_logger::Builder;
use log::LevelFilter;

static INIT: Once = Once::new();

const CRATE_TARGET: &str = "thrpool";
const SLOT_POOL_TARGET: &str = "thrpool::storage::disk::thrpool::slot_pool";

pub fn initialize_logger() {
    initialize_logger_at(LevelFilter::Info);
}

/// Installs the global logger once, with `level` for this crate's modules.
///
/// Records carry the emitting thread's name, so lines from the
/// `thrpool-worker-N` threads can be told apart from the caller's. Per-slot
/// movement in the slot pool is traced only when `RUST_LOG` asks for it.
/// `RUST_LOG` is applied last and overrides both defaults.
pub fn initialize_logger_at(level: LevelFilter) {
    INIT.call_once_force(|_| {
        let mut builder = Builder::new();

        builder
            .filter_level(LevelFilter::Warn)
            .filter_module(CRATE_TARGET, level)
            .filter_module(SLOT_POOL_TARGET, level.min(LevelFilter::Debug))
            .format(|buf, record| {
                let current = thread::current();
                writeln!(
                    buf,
                    "{} {:<5} [{}] {}: {}",
                    buf.timestamp_millis(),
                    record.level(),
                    current.name().unwrap_or("unnamed"),
                    record.target(),
                    record.args()
                )
            })
            .parse_default_env();

        // Another logger may already be installed by the embedding program.
        let _ = builder.try_init();
    });
}
