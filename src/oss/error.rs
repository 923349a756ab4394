use std::error::Error as StdError;
use std::fmt::Display;

use thiserror::Error;

use crate::oss::{FileRecord, Headers};

/// 对象存储（store handle）层错误
///
/// 只描述传输、配置等“调用没能完成”的失败；HTTP 状态码的解释交给适配器。
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("网络错误: {0}")]
    Network(String),

    #[error("无效参数: {0}")]
    InvalidInput(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("响应解析失败: {0}")]
    InvalidResponse(String),

    #[error("厂商错误 [{provider}]: {message}")]
    Provider {
        provider: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl ObjectStoreError {
    /// 从厂商 SDK / HTTP 客户端错误转换
    pub fn from_provider<E>(err: E, provider: &str, context: &str) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ObjectStoreError::Provider {
            provider: provider.to_string(),
            message: context.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// 错误类别名，作为 `WriteError::name`
    pub fn kind(&self) -> &'static str {
        match self {
            ObjectStoreError::Network(_) => "Network",
            ObjectStoreError::InvalidInput(_) => "InvalidInput",
            ObjectStoreError::Configuration(_) => "Configuration",
            ObjectStoreError::InvalidResponse(_) => "InvalidResponse",
            ObjectStoreError::Provider { .. } => "Provider",
            ObjectStoreError::Io(_) => "Io",
        }
    }
}

/// 适配器操作（read / remove / list）返回的错误
#[derive(Error, Debug)]
pub enum AdapterError {
    /// 远端返回了非成功状态码
    #[error("{message} (status {status})")]
    Status {
        status: u16,
        headers: Headers,
        message: String,
    },

    /// store handle 抛出的错误，原样透传
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
}

impl AdapterError {
    pub(crate) fn status(status: u16, headers: Headers, message: impl Into<String>) -> Self {
        AdapterError::Status {
            status,
            headers,
            message: message.into(),
        }
    }

    /// 非成功状态码时返回状态码，传输错误返回 None
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AdapterError::Status { status, .. } => Some(*status),
            AdapterError::Store(_) => None,
        }
    }

    /// 非成功状态码时的响应头
    pub fn headers(&self) -> Option<&Headers> {
        match self {
            AdapterError::Status { headers, .. } => Some(headers),
            AdapterError::Store(_) => None,
        }
    }
}

/// 上传失败时的错误码
pub const E_WRITE: &str = "E_WRITE";

/// Receiver 写入单个文件失败
///
/// `incoming` 是失败文件的原始记录，`code` 固定为 [`E_WRITE`]。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {name}: {message}")]
pub struct WriteError {
    pub incoming: FileRecord,
    pub code: &'static str,
    pub name: String,
    pub message: String,
    pub stack: String,
}

impl WriteError {
    /// 从 store 错误构造，`name` 为错误类别，`stack` 为错误的 source 链
    pub fn from_error(incoming: FileRecord, err: &ObjectStoreError) -> Self {
        let mut stack = vec![err.to_string()];
        let mut source = StdError::source(err);
        while let Some(cause) = source {
            stack.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        Self {
            incoming,
            code: E_WRITE,
            name: err.kind().to_string(),
            message: err.to_string(),
            stack: stack.join("\n"),
        }
    }

    /// 从普通值构造：`name` 和 `message` 都取该值本身，`stack` 现场合成
    pub fn from_value<V: Display>(incoming: FileRecord, value: V) -> Self {
        let value = value.to_string();
        Self {
            incoming,
            code: E_WRITE,
            stack: format!("Error: {}", value),
            name: value.clone(),
            message: value,
        }
    }
}
