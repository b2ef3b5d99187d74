use std::sync::Arc;

use clap::{Args, Parser};
use tracing::warn;

use crate::llm::DEFAULT_BASE_URL;

/** \brief 默认允许的前端开发地址。 */
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173";

pub const DEFAULT_TELEMETRY_DIR: &str = "logs";

/**
 * \brief 进程级配置：启动时构造一次，之后只读，通过 `Arc` 句柄共享。
 */
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /** \brief 服务端默认 API Key，可为空（此时只能使用请求自带的 Key） */
    #[arg(long, env = "ANTHROPIC_API_KEY", default_value = "", hide_env_values = true)]
    pub anthropic_api_key: String,

    /** \brief 允许跨域访问的来源列表，逗号分隔或 JSON 数组 */
    #[arg(long, env = "CORS_ORIGINS", default_value = DEFAULT_CORS_ORIGINS)]
    pub cors_origins: String,

    /** \brief 上游 API 基地址 */
    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub anthropic_base_url: String,

    /** \brief 是否写入本地遥测日志 */
    #[arg(long = "telemetry", env = "TELEMETRY_ENABLED", default_value_t = false)]
    pub telemetry_enabled: bool,

    /** \brief 遥测日志目录 */
    #[arg(long, env = "TELEMETRY_DIR", default_value = DEFAULT_TELEMETRY_DIR)]
    pub telemetry_dir: String,
}

#[derive(Parser, Debug)]
#[command(name = "chatrelay")]
struct EnvOnly {
    #[command(flatten)]
    settings: Settings,
}

impl Settings {
    /**
     * \brief 仅从环境变量构造配置（不解析命令行参数）。
     */
    pub fn from_env() -> Result<Self, clap::Error> {
        EnvOnly::try_parse_from(["chatrelay"]).map(|p| p.settings)
    }

    /**
     * \brief 转换为共享句柄，HTTP 层与聊天服务持有同一实例。
     */
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /** \brief 是否配置了非空的默认 Key。 */
    pub fn anthropic_configured(&self) -> bool {
        !self.anthropic_api_key.is_empty()
    }

    /** \brief 解析后的跨域来源列表。 */
    pub fn allowed_origins(&self) -> Vec<String> {
        parse_origin_list(&self.cors_origins)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            cors_origins: DEFAULT_CORS_ORIGINS.to_string(),
            anthropic_base_url: DEFAULT_BASE_URL.to_string(),
            telemetry_enabled: false,
            telemetry_dir: DEFAULT_TELEMETRY_DIR.to_string(),
        }
    }
}

/// Parse an origin list, trimming whitespace and dropping empties.
///
/// Accepts either `a,b` or a JSON array such as `["a","b"]`.
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(list) => {
                return list
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            Err(e) => {
                warn!(error = %e, "CORS_ORIGINS is not a JSON string array, splitting on commas")
            }
        }
    }
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["chatrelay"];
        argv.extend_from_slice(args);
        EnvOnly::try_parse_from(argv).expect("parse settings").settings
    }

    #[test]
    fn test_parse_origin_list_trims_and_filters() {
        assert_eq!(
            parse_origin_list(" http://a.test ,,http://b.test, "),
            vec!["http://a.test", "http://b.test"]
        );
        assert!(parse_origin_list(", ,").is_empty());
    }

    #[test]
    fn test_parse_origin_list_accepts_json_array() {
        assert_eq!(
            parse_origin_list(r#" ["http://a.test", " http://b.test ", ""] "#),
            vec!["http://a.test", "http://b.test"]
        );
        assert!(parse_origin_list("[]").is_empty());
    }

    #[test]
    fn test_from_env_reads_key_and_origins() {
        std::env::set_var("ANTHROPIC_API_KEY", "sk-env");
        std::env::set_var("CORS_ORIGINS", "http://a.test, http://b.test");
        let settings = Settings::from_env().expect("settings from env");
        assert_eq!(settings.anthropic_api_key, "sk-env");
        assert!(settings.anthropic_configured());
        assert_eq!(
            settings.allowed_origins(),
            vec!["http://a.test", "http://b.test"]
        );

        std::env::set_var("CORS_ORIGINS", r#"["http://c.test","http://d.test"]"#);
        let settings = Settings::from_env().expect("settings from env");
        assert_eq!(
            settings.allowed_origins(),
            vec!["http://c.test", "http://d.test"]
        );

        std::env::remove_var("ANTHROPIC_API_KEY");
        std::env::remove_var("CORS_ORIGINS");
    }

    #[test]
    fn test_default_origin_is_local_dev_server() {
        let settings = Settings::default();
        assert_eq!(settings.allowed_origins(), vec!["http://localhost:5173"]);
        assert!(!settings.anthropic_configured());
    }

    #[test]
    fn test_flags_populate_settings() {
        let settings = parse(&[
            "--anthropic-api-key",
            "sk-test",
            "--cors-origins",
            "http://x.test,http://y.test",
            "--anthropic-base-url",
            "http://127.0.0.1:9",
            "--telemetry",
        ]);
        assert!(settings.anthropic_configured());
        assert_eq!(settings.allowed_origins().len(), 2);
        assert_eq!(settings.anthropic_base_url, "http://127.0.0.1:9");
        assert!(settings.telemetry_enabled);
    }

    #[test]
    fn test_empty_key_is_accepted() {
        let settings = parse(&["--anthropic-api-key", ""]);
        assert!(!settings.anthropic_configured());
    }

    #[test]
    fn test_shared_handle_is_single_instance() {
        let shared = Settings::default().into_shared();
        let a = Arc::clone(&shared);
        let b = Arc::clone(&shared);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
