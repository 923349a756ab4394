use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::oneshot;

use crate::oss::read_stream::ReadForwarder;
use crate::oss::{
    is_success, AdapterError, AliOssConfig, AliOssConnector, ObjectStore, ReadCallback, ReadError,
    ReadStream, ReceiveOptions, Receiver, StoreConnector,
};

/// 读取非成功状态时的错误信息
pub const NON_200_READ_MESSAGE: &str =
    "Non-200 status code returned from Aliyun for requested file.";

// 除 200 外也接受 204：OSS DeleteObject 成功时实际返回 204 No Content，
// 删除不存在的对象同样返回 204。其他状态码（包括其他 2xx）都是错误。
const DELETE_OK: [u16; 2] = [200, 204];

/// OSS 存储适配器
///
/// 提供 `read` / `remove` / `list` / `receive` 四个操作。每个操作都通过
/// [`StoreConnector`] 新建一个 store handle，用完即丢，不在操作之间共享。
///
/// # 示例
///
/// ```rust,no_run
/// use oss_adapter::oss::{AliOssConfig, OssAdapter};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let adapter = OssAdapter::new(AliOssConfig {
///     key: "ak".to_string(),
///     secret: "sk".to_string(),
///     bucket: "my-bucket".to_string(),
///     ..Default::default()
/// });
///
/// let names = adapter.list("/avatars").await?;
/// let data = adapter.read_to_bytes("avatars/a.png").await?;
/// adapter.remove("avatars/a.png").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OssAdapter {
    config: AliOssConfig,
    connector: Arc<dyn StoreConnector>,
}

impl OssAdapter {
    pub fn new(config: AliOssConfig) -> Self {
        Self::with_connector(config, AliOssConnector)
    }

    /// 使用自定义 connector（例如测试用的内存存储）
    pub fn with_connector<C>(config: AliOssConfig, connector: C) -> Self
    where
        C: StoreConnector + 'static,
    {
        Self {
            config,
            connector: Arc::new(connector),
        }
    }

    pub fn config(&self) -> &AliOssConfig {
        &self.config
    }

    fn connect(&self) -> Result<Box<dyn ObjectStore>, AdapterError> {
        Ok(self.connector.connect(&self.config)?)
    }

    /// 流式读取对象
    ///
    /// 立即返回 [`ReadStream`]，GET 在后台任务中执行，需要在 tokio runtime 内调用。
    /// 状态码 < 300 时原样转发数据，否则流中只有一个 [`AdapterError::Status`] 错误。
    pub fn read(&self, fd: &str) -> ReadStream {
        self.spawn_read(fd, None)
    }

    /// 流式读取对象，同时缓存完整内容并回调一次
    ///
    /// 回调只会被调用一次：错误或完整内容，先发生的为准。
    /// 不需要流时可以直接丢弃返回值，回调仍会收到完整内容。
    pub fn read_with<F>(&self, fd: &str, callback: F) -> ReadStream
    where
        F: FnOnce(Result<Bytes, ReadError>) + Send + 'static,
    {
        self.spawn_read(fd, Some(Box::new(callback)))
    }

    /// 读取对象的完整内容
    pub async fn read_to_bytes(&self, fd: &str) -> Result<Bytes, ReadError> {
        let (tx, rx) = oneshot::channel();
        drop(self.read_with(fd, move |result| {
            let _ = tx.send(result);
        }));
        match rx.await {
            Ok(result) => result,
            // 后台任务在回调前退出（runtime 关闭）
            Err(_) => Err(Arc::new(AdapterError::Store(
                crate::oss::ObjectStoreError::Network("read task cancelled".to_string()),
            ))),
        }
    }

    fn spawn_read(&self, fd: &str, callback: Option<ReadCallback>) -> ReadStream {
        let (forwarder, stream) = ReadStream::channel(callback);
        let adapter = self.clone();
        let fd = fd.to_string();
        tokio::spawn(async move {
            adapter.forward(&fd, forwarder).await;
        });
        stream
    }

    async fn forward(&self, fd: &str, mut forwarder: ReadForwarder) {
        tracing::debug!(bucket = %self.config.bucket, fd, "read");

        let store = match self.connect() {
            Ok(store) => store,
            Err(e) => return forwarder.fail(e).await,
        };
        let response = match store.get_stream(fd).await {
            Ok(response) => response,
            Err(e) => return forwarder.fail(e.into()).await,
        };

        if response.status >= 300 {
            return forwarder
                .fail(AdapterError::status(
                    response.status,
                    response.headers,
                    NON_200_READ_MESSAGE,
                ))
                .await;
        }

        let mut stream = response.stream;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => forwarder.push(chunk).await,
                Err(e) => return forwarder.fail(e.into()).await,
            }
        }
        forwarder.finish();
    }

    /// 删除对象
    ///
    /// 成功状态之外的响应返回 [`AdapterError::Status`]，传输错误原样返回。
    pub async fn remove(&self, fd: &str) -> Result<(), AdapterError> {
        tracing::debug!(bucket = %self.config.bucket, fd, "remove");

        let store = self.connect()?;
        let response = store.delete(fd).await?;
        if DELETE_OK.contains(&response.status) {
            Ok(())
        } else {
            Err(AdapterError::status(
                response.status,
                response.headers,
                format!("Non-200 status code returned from Aliyun deleting {}", fd),
            ))
        }
    }

    /// 列举目录下的对象名
    ///
    /// `dirname` 开头的一个 `/` 会被去掉后作为前缀。
    pub async fn list(&self, dirname: &str) -> Result<Vec<String>, AdapterError> {
        let prefix = dirname.strip_prefix('/').unwrap_or(dirname);
        tracing::debug!(bucket = %self.config.bucket, prefix, "list");

        let store = self.connect()?;
        let response = store.list(prefix).await?;
        if !is_success(response.status) {
            return Err(AdapterError::status(
                response.status,
                response.headers,
                format!("Non-200 status code returned from Aliyun listing {}", prefix),
            ));
        }

        Ok(response
            .objects
            .unwrap_or_default()
            .into_iter()
            .map(|object| object.key)
            .collect())
    }

    /// 创建上传接收端，`options` 覆盖适配器配置
    pub fn receive(&self, options: ReceiveOptions) -> Receiver {
        Receiver::new(
            options.merge_over(&self.config),
            Arc::clone(&self.connector),
        )
    }
}

impl std::fmt::Debug for OssAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OssAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
