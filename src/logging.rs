use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialise logging. Debug logging starts at `debug` and lets `RUST_LOG`
/// override the level; otherwise the level is forced to `info`.
/// With `log_file` set, output is also appended to that file.
pub fn init(debug: bool, log_file: Option<&Path>) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let Some((dir, file_name)) = log_file.and_then(split_log_path) else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        return;
    };

    if let Err(err) = std::fs::create_dir_all(&dir) {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        tracing::warn!(?err, dir = %dir.display(), "log directory unavailable; logging to stderr only");
        return;
    }

    let appender = tracing_appender::rolling::never(&dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr.and(file_writer))
        .try_init()
        .is_ok();
    if installed {
        let _ = FILE_GUARD.set(guard);
    }
}

fn split_log_path(path: &Path) -> Option<(std::path::PathBuf, std::ffi::OsString)> {
    let file_name = path.file_name()?.to_os_string();
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| std::path::PathBuf::from("."), Path::to_path_buf);
    Some((dir, file_name))
}
