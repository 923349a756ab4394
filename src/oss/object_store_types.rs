use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use smart_default::SmartDefault;
use tokio::io::AsyncRead;

use crate::oss::ObjectStoreError;

/// 响应头，key 统一为小写
pub type Headers = BTreeMap<String, String>;

/// 上传数据源
pub type ByteReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// 下载数据流
pub type ByteStream = BoxStream<'static, Result<Bytes, ObjectStoreError>>;

/// 对象元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// 只有状态码和响应头的响应（DELETE / HEAD）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectResponse {
    pub status: u16,
    pub headers: Headers,
}

/// 流式下载响应
pub struct GetStreamResponse {
    pub status: u16,
    pub headers: Headers,
    pub stream: ByteStream,
}

impl std::fmt::Debug for GetStreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetStreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("stream", &"...")
            .finish()
    }
}

/// 前缀列举响应
///
/// `objects` 为 None 表示响应里没有对象字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResponse {
    pub status: u16,
    pub headers: Headers,
    pub objects: Option<Vec<ObjectMeta>>,
}

/// 流式上传响应
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutStreamResponse {
    pub status: u16,
    pub headers: Headers,
    /// 对象 key
    pub name: String,
    /// 对象的公开访问地址
    pub url: String,
}

/// 流式上传选项
#[derive(Debug, Clone, SmartDefault, PartialEq, Eq)]
pub struct PutStreamOptions {
    /// MIME 类型
    #[default = "application/octet-stream"]
    pub content_type: String,
    /// 已知长度时携带 Content-Length，否则使用 chunked 编码
    pub content_length: Option<u64>,
}

/// 判断状态码是否为 2xx
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// 上游传入的一个文件
pub struct UpstreamFile {
    /// 目标对象 key
    pub fd: String,
    /// 文件内容
    pub reader: ByteReader,
    /// 文件大小（可选）
    pub size: Option<u64>,
}

impl UpstreamFile {
    pub fn new(fd: impl Into<String>, reader: ByteReader) -> Self {
        Self {
            fd: fd.into(),
            reader,
            size: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// 内存数据构造，主要用于测试和小文件
    pub fn from_bytes(fd: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        let size = data.len() as u64;
        Self::new(fd, Box::new(std::io::Cursor::new(data))).with_size(size)
    }

    /// 不含数据流的描述部分
    pub fn record(&self) -> FileRecord {
        FileRecord {
            fd: self.fd.clone(),
            size: self.size,
        }
    }
}

impl std::fmt::Debug for UpstreamFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamFile")
            .field("fd", &self.fd)
            .field("reader", &"...")
            .field("size", &self.size)
            .finish()
    }
}

/// 上游文件的描述信息（失败时作为 `incoming` 返回）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub fd: String,
    pub size: Option<u64>,
}

/// 上传完成后的文件记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// 原始 fd
    pub filename: String,
    /// PUT 返回的公开地址
    pub fd: String,
    /// HEAD 返回的响应头
    pub extra: Headers,
    /// HEAD 返回的 content-length
    pub byte_count: u64,
}

/// 上传完成回调（`writefile` 事件）
pub trait WriteFileListener: Send + Sync {
    fn on_write_file(&self, file: &UploadedFile);
}

impl<F> WriteFileListener for F
where
    F: Fn(&UploadedFile) + Send + Sync,
{
    fn on_write_file(&self, file: &UploadedFile) {
        self(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success() {
        assert!(is_success(200));
        assert!(is_success(204));
        assert!(!is_success(304));
        assert!(!is_success(404));
        assert!(!is_success(199));
    }

    #[test]
    fn test_put_stream_options_default() {
        let options = PutStreamOptions::default();
        assert_eq!(options.content_type, "application/octet-stream");
        assert_eq!(options.content_length, None);
    }

    #[test]
    fn test_upstream_file_record() {
        let file = UpstreamFile::from_bytes("docs/readme.txt", "hello");
        assert_eq!(
            file.record(),
            FileRecord {
                fd: "docs/readme.txt".to_string(),
                size: Some(5),
            }
        );
    }
}
