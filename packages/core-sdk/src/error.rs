use thiserror::Error;

use crate::llm::UpstreamError;

/**
 * \brief 聊天服务错误；HTTP 层统一映射为 500。
 */
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("No API key provided and no default key configured")]
    MissingCredential,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
