use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Routes `log` records to `log.txt` next to the executable, or stderr when the
/// file cannot be opened. `RUST_LOG` overrides the default `info` filter.
pub fn init() {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(buf, "[{}] {:<5} {}: {}", buf.timestamp_millis(), record.level(), record.target(), record.args())
    });

    let path = exe_dir().join("log.txt");
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(mut f) => {
            let _ = writeln!(f, "===== neontrans start =====");
            builder.target(env_logger::Target::Pipe(Box::new(f)));
        }
        Err(e) => eprintln!("neontrans: cannot open {}: {e}", path.display()),
    }

    if builder.try_init().is_err() {
        log::debug!("Logger already initialised");
    }
}
