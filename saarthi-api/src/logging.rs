//! Log file output
//!
//! When `[logging] file` is set, events go to stderr and are also appended
//! (without ANSI colours) to that file.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::registry::LookupSpan;

/// Formatting layer over the log file
pub type FileLayer<S> = fmt::Layer<S, DefaultFields, Format, File>;

/// Open `path` for appending, creating it and its parent folder if needed
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Plain-text layer writing to the configured log file, if any
pub fn file_layer<S>(path: Option<&Path>) -> io::Result<Option<FileLayer<S>>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let Some(path) = path else {
        return Ok(None);
    };
    let file = open_log_file(path)?;
    Ok(Some(
        fmt::layer()
            .with_writer(file)
            .with_target(true)
            .with_ansi(false),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn open_log_file_creates_parent_folders() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/nested/saarthi.log");

        let file = open_log_file(&path).unwrap();

        drop(file);
        assert!(path.is_file());
    }

    #[test]
    fn open_log_file_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saarthi.log");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn file_layer_writes_events_without_ansi() {
        use tracing_subscriber::layer::SubscriberExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saarthi.log");

        let layer = file_layer(Some(&path)).unwrap();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(sessions = 3, "Session registry loaded");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Session registry loaded"));
        assert!(contents.contains("sessions=3"));
        assert!(!contents.contains('\u{1b}'));
    }

    #[test]
    fn no_path_means_no_layer() {
        let layer = file_layer::<tracing_subscriber::Registry>(None).unwrap();
        assert!(layer.is_none());
    }
}
