use crate::domain::provisioning::{LogLevel, RunLogSink};
use chrono::{DateTime, Local};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// The installation log: one append-only file per run, never rotated.
///
/// Every leveled line is mirrored to the console through `tracing`; raw
/// command output only goes to the file.
pub struct FileRunLog {
    path: Option<PathBuf>,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl FileRunLog {
    /// `<product>-installation_<YYYYMMDD_HHMMSS>.log`
    pub fn file_name(product: &str, started_at: &DateTime<Local>) -> String {
        format!(
            "{product}-installation_{}.log",
            started_at.format("%Y%m%d_%H%M%S")
        )
    }

    pub fn create(dir: &Path, product: &str, started_at: &DateTime<Local>) -> io::Result<Self> {
        let name = Self::file_name(product, started_at);
        let path = dir.join(&name);
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(name)
            .build(dir)
            .map_err(io::Error::other)?;
        Ok(Self {
            path: Some(path),
            writer: Mutex::new(Box::new(appender)),
        })
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            path: None,
            writer: Mutex::new(Box::new(writer)),
        }
    }

    fn write_line(&self, line: &str) {
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let written = writeln!(writer, "{line}");
        if let Err(e) = written.and_then(|_| writer.flush()) {
            warn!("Failed to write to the installation log: {}", e);
        }
    }
}

impl RunLogSink for FileRunLog {
    fn record(&self, level: LogLevel, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        self.write_line(&format!("[{timestamp}] [{}] {message}", level.tag()));

        match level {
            LogLevel::Info => info!("{}", message),
            LogLevel::Warn => warn!("{}", message),
            LogLevel::Fail => error!("{}", message),
            LogLevel::Ok => info!(status = "ok", "{}", message),
        }
    }

    fn append_raw(&self, line: &str) {
        self.write_line(line);
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_file_name_embeds_start_time() {
        let started = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            FileRunLog::file_name("yunohost", &started),
            "yunohost-installation_20240309_070501.log"
        );
    }

    #[test]
    fn test_lines_are_leveled_and_raw_output_is_verbatim() {
        let buffer = SharedBuffer::default();
        let log = FileRunLog::from_writer(buffer.clone());

        log.info("starting");
        log.append_raw("Reading package lists... Done");
        log.warn("degraded");
        log.fail("broken");
        log.ok("done");

        let text = buffer.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with('[') && lines[0].ends_with("] [INFO] starting"));
        assert_eq!(lines[1], "Reading package lists... Done");
        assert!(lines[2].ends_with("[WARN] degraded"));
        assert!(lines[3].ends_with("[FAIL] broken"));
        assert!(lines[4].ends_with("[ OK ] done"));
        assert!(log.path().is_none());
    }

    #[test]
    fn test_create_appends_to_a_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let started = Local::now();
        let log_dir = dir.path().join("logs");

        let log = FileRunLog::create(&log_dir, "yunohost", &started).unwrap();
        log.info("first");
        log.ok("second");

        let path = log.path().unwrap().to_path_buf();
        assert_eq!(path.parent().unwrap(), log_dir);
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("[INFO] first"));
        assert!(content.contains("[ OK ] second"));
        assert_eq!(fs::read_dir(&log_dir).unwrap().count(), 1);
    }

    #[test]
    fn test_create_reports_unusable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();

        let result = FileRunLog::create(&blocker.join("logs"), "yunohost", &Local::now());
        assert!(result.is_err());
    }
}
