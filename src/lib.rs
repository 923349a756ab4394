//! oss-adapter - 阿里云 OSS 存储适配器
//!
//! 把上传中间件的流式接口接到阿里云 OSS 上：流式上传、流式读取、列举和删除。
//!
//! ## 模块
//!
//! - **oss**: 适配器（`read` / `remove` / `list` / `receive`）和 OSS 客户端
//! - **cfg**: 配置加载（JSON5 / YAML / TOML，支持环境变量替换）
//! - **log**: tracing_subscriber 初始化
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use oss_adapter::oss::{AliOssConfig, OssAdapter, ReceiveOptions, UploadedFile, UpstreamFile};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config: AliOssConfig = oss_adapter::cfg::load_config("oss.yaml")?;
//!     let adapter = OssAdapter::new(config);
//!
//!     let mut receiver = adapter.receive(ReceiveOptions::default());
//!     receiver.on_write_file(|file: &UploadedFile| {
//!         println!("{} -> {} ({} bytes)", file.filename, file.fd, file.byte_count);
//!     });
//!     receiver
//!         .write(UpstreamFile::from_bytes("docs/hello.txt", "hello"))
//!         .await?;
//!
//!     let data = adapter.read_to_bytes("docs/hello.txt").await?;
//!     assert_eq!(&data[..], b"hello");
//!     Ok(())
//! }
//! ```

pub mod cfg;
pub mod log;
pub mod oss;

// 重新导出主要的公共 API
pub use oss::{
    AdapterError, AliOssConfig, AliOssConnector, AliOssObjectStore, ObjectStore,
    ObjectStoreError, OssAdapter, ReceiveOptions, Receiver, StoreConnector, UploadedFile,
    UpstreamFile, WriteError,
};
