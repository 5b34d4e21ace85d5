/// 服务发现客户端错误类型
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid registry URL: {0}")]
    InvalidRegistryUrl(String),
    #[error("Registry returned status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },
    #[error("Service instance is not registered")]
    NotRegistered,
    #[error("No instances available for service: {0}")]
    NoCandidates(String),
}
