use std::collections::HashMap;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::oss::{
    is_success, AliOssConfig, FileRecord, ObjectStore, PutStreamOptions, StoreConnector,
    UploadedFile, UpstreamFile, WriteError, WriteFileListener,
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// `receive` 的选项，未设置的字段取适配器配置
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReceiveOptions {
    pub key: Option<String>,
    pub secret: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub secure: Option<bool>,
    pub headers: Option<HashMap<String, String>>,
    pub gc_failed_uploads: Option<bool>,
}

impl ReceiveOptions {
    /// 合并到默认配置之上
    pub fn merge_over(self, defaults: &AliOssConfig) -> AliOssConfig {
        let mut config = defaults.clone();
        if let Some(key) = self.key {
            config.key = key;
        }
        if let Some(secret) = self.secret {
            config.secret = secret;
        }
        if let Some(bucket) = self.bucket {
            config.bucket = bucket;
        }
        if let Some(region) = self.region {
            config.region = Some(region);
        }
        if let Some(endpoint) = self.endpoint {
            config.endpoint = Some(endpoint);
        }
        if let Some(secure) = self.secure {
            config.secure = secure;
        }
        if let Some(headers) = self.headers {
            config.headers = headers;
        }
        if let Some(gc) = self.gc_failed_uploads {
            config.gc_failed_uploads = gc;
        }
        config
    }
}

/// 上传接收端
///
/// 逐个接收上游文件并流式上传到 OSS。`write` 需要 `&mut self`，
/// 所以同一个 Receiver 同一时刻最多只有一个文件在上传，文件按到达顺序处理。
///
/// 每个文件：PUT 成功后再 HEAD 同一路径，拿到最终的元信息，
/// 通知所有 [`WriteFileListener`] 后返回 [`UploadedFile`]。
pub struct Receiver {
    config: AliOssConfig,
    connector: Arc<dyn StoreConnector>,
    listeners: Vec<Arc<dyn WriteFileListener>>,
}

// PUT 是否已经发出，决定失败后是否需要清理
enum Stage {
    Pending,
    Put,
}

impl Receiver {
    pub(crate) fn new(config: AliOssConfig, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            config,
            connector,
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &AliOssConfig {
        &self.config
    }

    /// 注册上传完成回调（`writefile` 事件）
    pub fn on_write_file<L>(&mut self, listener: L) -> &mut Self
    where
        L: WriteFileListener + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// 上传文件的 MIME 类型：优先使用 `content-type` 选项，否则按 fd 推断
    pub fn content_type(&self, fd: &str) -> String {
        self.config
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| {
                mime_guess::from_path(fd)
                    .first()
                    .map(|mime| mime.to_string())
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
            })
    }

    /// 上传单个文件
    pub async fn write(&mut self, file: UpstreamFile) -> Result<UploadedFile, WriteError> {
        let incoming = file.record();

        let store = self
            .connector
            .connect(&self.config)
            .map_err(|e| WriteError::from_error(incoming.clone(), &e))?;

        let mut stage = Stage::Pending;
        match self.upload(store.as_ref(), file, &incoming, &mut stage).await {
            Ok(uploaded) => {
                tracing::info!(
                    bucket = %self.config.bucket,
                    filename = %uploaded.filename,
                    byte_count = uploaded.byte_count,
                    "file uploaded"
                );
                for listener in &self.listeners {
                    listener.on_write_file(&uploaded);
                }
                Ok(uploaded)
            }
            Err(err) => {
                tracing::warn!(
                    bucket = %self.config.bucket,
                    fd = %incoming.fd,
                    error = %err,
                    "file upload failed"
                );
                if matches!(stage, Stage::Put) && self.config.gc_failed_uploads {
                    self.discard(store.as_ref(), &incoming.fd).await;
                }
                Err(err)
            }
        }
    }

    /// 按顺序上传所有文件，遇到第一个失败即停止
    pub async fn write_all<S>(&mut self, files: S) -> Result<Vec<UploadedFile>, WriteError>
    where
        S: Stream<Item = UpstreamFile>,
    {
        futures::pin_mut!(files);
        let mut uploaded = Vec::new();
        while let Some(file) = files.next().await {
            uploaded.push(self.write(file).await?);
        }
        Ok(uploaded)
    }

    async fn upload(
        &self,
        store: &dyn ObjectStore,
        file: UpstreamFile,
        incoming: &FileRecord,
        stage: &mut Stage,
    ) -> Result<UploadedFile, WriteError> {
        let UpstreamFile { fd, reader, size } = file;
        let options = PutStreamOptions {
            content_type: self.content_type(&fd),
            content_length: size,
        };

        *stage = Stage::Put;
        let put = store
            .put_stream(&fd, reader, options)
            .await
            .map_err(|e| WriteError::from_error(incoming.clone(), &e))?;
        if !is_success(put.status) {
            return Err(WriteError::from_value(
                incoming.clone(),
                format!("PUT {} returned status {}", fd, put.status),
            ));
        }

        let head = store
            .head(&fd)
            .await
            .map_err(|e| WriteError::from_error(incoming.clone(), &e))?;
        if !is_success(head.status) {
            return Err(WriteError::from_value(
                incoming.clone(),
                format!("HEAD {} returned status {}", fd, head.status),
            ));
        }

        let byte_count = head
            .headers
            .get("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                WriteError::from_value(
                    incoming.clone(),
                    format!("HEAD {} returned no content-length", fd),
                )
            })?;

        Ok(UploadedFile {
            filename: fd,
            fd: put.url,
            extra: head.headers,
            byte_count,
        })
    }

    // 尽力删除可能残留的对象，失败只记日志
    async fn discard(&self, store: &dyn ObjectStore, fd: &str) {
        match store.delete(fd).await {
            Ok(response) if is_success(response.status) => {
                tracing::debug!(bucket = %self.config.bucket, fd, "discarded failed upload");
            }
            Ok(response) => {
                tracing::warn!(
                    bucket = %self.config.bucket,
                    fd,
                    status = response.status,
                    "failed to discard failed upload"
                );
            }
            Err(e) => {
                tracing::warn!(
                    bucket = %self.config.bucket,
                    fd,
                    error = %e,
                    "failed to discard failed upload"
                );
            }
        }
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oss::AliOssConnector;

    fn defaults() -> AliOssConfig {
        AliOssConfig {
            key: "global-ak".to_string(),
            secret: "global-sk".to_string(),
            bucket: "global-bucket".to_string(),
            region: Some("oss-cn-beijing".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_over_defaults() {
        let options = ReceiveOptions {
            bucket: Some("uploads".to_string()),
            region: Some("oss-cn-shenzhen".to_string()),
            ..Default::default()
        };
        let config = options.merge_over(&defaults());

        assert_eq!(config.key, "global-ak");
        assert_eq!(config.secret, "global-sk");
        assert_eq!(config.bucket, "uploads");
        assert_eq!(config.region.as_deref(), Some("oss-cn-shenzhen"));
        assert!(config.secure);
    }

    #[test]
    fn test_merge_empty_options_keeps_defaults() {
        assert_eq!(ReceiveOptions::default().merge_over(&defaults()), defaults());
    }

    #[test]
    fn test_content_type() {
        let receiver = Receiver::new(defaults(), Arc::new(AliOssConnector));
        assert_eq!(receiver.content_type("a/b.png"), "image/png");
        assert_eq!(receiver.content_type("notes.txt"), "text/plain");
        assert_eq!(receiver.content_type("blob"), "application/octet-stream");

        let mut config = defaults();
        config
            .headers
            .insert("Content-Type".to_string(), "application/x-custom".to_string());
        let receiver = Receiver::new(config, Arc::new(AliOssConnector));
        assert_eq!(receiver.content_type("a/b.png"), "application/x-custom");
    }

    #[tokio::test]
    async fn test_connect_failure_is_e_write() {
        let mut receiver = Receiver::new(AliOssConfig::default(), Arc::new(AliOssConnector));
        let err = receiver
            .write(UpstreamFile::from_bytes("a.txt", "abc"))
            .await
            .unwrap_err();

        assert_eq!(err.code, "E_WRITE");
        assert_eq!(err.name, "Configuration");
        assert_eq!(err.incoming.fd, "a.txt");
    }
}
