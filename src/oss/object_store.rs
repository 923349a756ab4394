use async_trait::async_trait;

use crate::oss::{
    AliOssConfig, AliOssObjectStore, ByteReader, GetStreamResponse, ListResponse, ObjectResponse,
    ObjectStoreError, PutStreamOptions, PutStreamResponse,
};

/// 对象存储客户端接口（store handle）
///
/// 只有传输、配置等失败才返回 `Err`；远端的非 2xx 状态通过响应里的 `status` 返回，
/// 由调用方解释。
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 流式下载
    async fn get_stream(&self, key: &str) -> Result<GetStreamResponse, ObjectStoreError>;

    /// 删除对象
    async fn delete(&self, key: &str) -> Result<ObjectResponse, ObjectStoreError>;

    /// 前缀列举，返回前缀下的全部对象
    async fn list(&self, prefix: &str) -> Result<ListResponse, ObjectStoreError>;

    /// 流式上传
    async fn put_stream(
        &self,
        key: &str,
        reader: ByteReader,
        options: PutStreamOptions,
    ) -> Result<PutStreamResponse, ObjectStoreError>;

    /// 获取对象元信息
    async fn head(&self, key: &str) -> Result<ObjectResponse, ObjectStoreError>;
}

/// 根据配置创建 store handle
///
/// 适配器每次操作都调用一次 `connect`，handle 不会跨操作复用。
pub trait StoreConnector: Send + Sync {
    fn connect(&self, config: &AliOssConfig) -> Result<Box<dyn ObjectStore>, ObjectStoreError>;
}

impl<F> StoreConnector for F
where
    F: Fn(&AliOssConfig) -> Result<Box<dyn ObjectStore>, ObjectStoreError> + Send + Sync,
{
    fn connect(&self, config: &AliOssConfig) -> Result<Box<dyn ObjectStore>, ObjectStoreError> {
        self(config)
    }
}

/// 默认 connector，创建 [`AliOssObjectStore`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AliOssConnector;

impl StoreConnector for AliOssConnector {
    fn connect(&self, config: &AliOssConfig) -> Result<Box<dyn ObjectStore>, ObjectStoreError> {
        let store = AliOssObjectStore::new(config.clone())?;
        Ok(Box::new(store).into())
    }
}
