pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod server;
pub mod service;
pub mod telemetry;

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::error::ChatError;
    pub use crate::models::{ChatRequest, ChatResponse, Message, ModelInfo, UsageInfo};
    pub use crate::server;
    pub use crate::service::ChatService;
    pub use crate::telemetry;
}
