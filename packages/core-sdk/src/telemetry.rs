use std::{fs::OpenOptions, io::Write, path::PathBuf};

use anyhow::Result;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::warn;

use crate::config::Settings;

/** \brief 事件日志文件名，位于遥测目录下。 */
pub const LOG_FILE: &str = "chatrelay.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Error => "ERROR",
        }
    }
}

/**
 * \brief 追加式事件日志。由 `Settings` 构造，关闭时所有记录都是空操作。
 *
 * 文件写入放在 blocking 线程池里执行，不占用请求所在的 worker。
 */
#[derive(Debug, Clone)]
pub struct Telemetry {
    log_path: Option<PathBuf>,
}

impl Telemetry {
    pub fn from_settings(settings: &Settings) -> Self {
        let log_path = settings
            .telemetry_enabled
            .then(|| PathBuf::from(&settings.telemetry_dir).join(LOG_FILE));
        Self { log_path }
    }

    pub fn is_enabled(&self) -> bool {
        self.log_path.is_some()
    }

    /** \brief 记录常规事件。不得写入凭据或消息正文。 */
    pub async fn log_event(&self, category: &str, message: &str) {
        self.record(Level::Info, category, message).await;
    }

    pub async fn log_error(&self, category: &str, message: &str) {
        self.record(Level::Error, category, message).await;
    }

    async fn record(&self, level: Level, category: &str, message: &str) {
        let Some(path) = self.log_path.clone() else {
            return;
        };
        let line = match format_line(OffsetDateTime::now_utc(), level, category, message) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "telemetry format failed");
                return;
            }
        };
        match tokio::task::spawn_blocking(move || append_line(&path, &line)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "telemetry write failed"),
            Err(err) => warn!(error = %err, "telemetry task failed"),
        }
    }
}

/// One log line: `<rfc3339> [<level>] <category> - <message>`.
fn format_line(
    timestamp: OffsetDateTime,
    level: Level,
    category: &str,
    message: &str,
) -> Result<String> {
    Ok(format!(
        "{} [{}] {} - {}",
        timestamp.format(&Rfc3339)?,
        level.as_str(),
        category,
        message
    ))
}

fn append_line(path: &std::path::Path, line: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}
