// API 文档参考：
// 阿里云 OSS 文档: https://help.aliyun.com/zh/oss
// 阿里云 OSS API 参考: https://help.aliyun.com/zh/oss/developer-reference/api-reference

use std::collections::HashMap;

use aliyun_oss_rust_sdk::oss::OSS;
use aliyun_oss_rust_sdk::request::{RequestBuilder, RequestType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{StreamExt, TryStreamExt};
use garde::Validate;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use tokio_util::io::ReaderStream;

use crate::oss::{
    ByteReader, GetStreamResponse, Headers, ListResponse, ObjectMeta, ObjectResponse, ObjectStore,
    ObjectStoreError, PutStreamOptions, PutStreamResponse,
};

const PROVIDER: &str = "Aliyun OSS";
const DEFAULT_REGION: &str = "oss-cn-hangzhou";
// 单页最多 1000 个对象（OSS 限制）
const LIST_PAGE_SIZE: usize = 1000;
const OSS_SECURITY_TOKEN_HEADER: &str = "x-oss-security-token";

// 本模块用到的 HTTP 方法
#[derive(Debug, Clone, Copy)]
enum Verb {
    Get,
    Put,
    Delete,
    Head,
}

impl Verb {
    fn method(self) -> reqwest::Method {
        match self {
            Verb::Get => reqwest::Method::GET,
            Verb::Put => reqwest::Method::PUT,
            Verb::Delete => reqwest::Method::DELETE,
            Verb::Head => reqwest::Method::HEAD,
        }
    }

    fn request_type(self) -> RequestType {
        match self {
            Verb::Get => RequestType::Get,
            Verb::Put => RequestType::Put,
            Verb::Delete => RequestType::Delete,
            Verb::Head => RequestType::Head,
        }
    }
}

// 阿里云 OSS ListObjects (v1) 响应结构
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    next_marker: Option<String>,
    #[serde(default)]
    contents: Vec<ObjectContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectContent {
    key: String,
    #[serde(default)]
    size: u64,
    last_modified: Option<String>,
    #[serde(rename = "ETag")]
    etag: Option<String>,
}

impl From<ObjectContent> for ObjectMeta {
    fn from(content: ObjectContent) -> Self {
        ObjectMeta {
            key: content.key,
            size: content.size,
            last_modified: content
                .last_modified
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            // OSS 返回的 ETag 包含引号，需要去掉
            etag: content.etag.map(|s| s.trim_matches('"').to_string()),
        }
    }
}

/// 阿里云 OSS 配置
///
/// 适配器级别的默认配置，`receive` 时可以被 [`ReceiveOptions`](crate::oss::ReceiveOptions) 覆盖。
///
/// 访问地址：
/// - 设置了 `endpoint` 时直接使用（可带 `http://` / `https://` 前缀）
/// - 否则为 `{region}.aliyuncs.com`，`region` 缺省为 `oss-cn-hangzhou`
#[derive(Deserialize, Serialize, SmartDefault, Clone, Validate, PartialEq)]
#[serde(default)]
pub struct AliOssConfig {
    /// Access Key ID
    #[garde(length(min = 1))]
    pub key: String,

    /// Access Key Secret
    #[garde(length(min = 1))]
    pub secret: String,

    /// 存储桶名称
    #[garde(length(min = 1))]
    pub bucket: String,

    /// 区域，如 oss-cn-hangzhou（也接受 cn-hangzhou）
    #[garde(skip)]
    pub region: Option<String>,

    /// 自定义端点，优先于 region
    #[garde(skip)]
    pub endpoint: Option<String>,

    /// 是否使用 HTTPS
    #[garde(skip)]
    #[default = true]
    pub secure: bool,

    /// 使用 path-style 地址（`endpoint/bucket/key`），用于兼容服务和本地测试
    #[garde(skip)]
    pub path_style: bool,

    /// STS 临时凭证的 security token
    #[garde(skip)]
    pub security_token: Option<String>,

    /// 上传时的默认请求头，目前只识别 `content-type`
    #[garde(skip)]
    pub headers: HashMap<String, String>,

    /// 上传失败后是否尝试删除可能残留的对象
    #[garde(skip)]
    #[default = true]
    pub gc_failed_uploads: bool,
}

impl std::fmt::Debug for AliOssConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliOssConfig")
            .field("key", &self.key)
            .field("secret", &"***")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("secure", &self.secure)
            .field("path_style", &self.path_style)
            .field("security_token", &self.security_token.as_ref().map(|_| "***"))
            .field("headers", &self.headers)
            .field("gc_failed_uploads", &self.gc_failed_uploads)
            .finish()
    }
}

impl AliOssConfig {
    /// 不带协议的主机名（含端口）
    pub fn host(&self) -> String {
        if let Some(endpoint) = self.endpoint.as_deref().filter(|e| !e.is_empty()) {
            return endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string();
        }

        let region = self
            .region
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REGION);
        if region.starts_with("oss-") {
            format!("{}.aliyuncs.com", region)
        } else {
            format!("oss-{}.aliyuncs.com", region)
        }
    }

    fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// 存储桶根地址，以 `/` 结尾
    pub fn bucket_url(&self) -> String {
        if self.path_style {
            format!("{}://{}/{}/", self.scheme(), self.host(), self.bucket)
        } else {
            format!("{}://{}.{}/", self.scheme(), self.bucket, self.host())
        }
    }

    /// 对象的公开访问地址
    pub fn object_url(&self, key: &str) -> String {
        format!("{}{}", self.bucket_url(), encode_key(key))
    }
}

// 按路径段编码，保留 `/`
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_headers(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}

/// 阿里云 OSS 实现
///
/// 一个实例就是一次操作的 store handle，由 [`AliOssConnector`](crate::oss::AliOssConnector) 按需创建。
pub struct AliOssObjectStore {
    // 只用于生成签名
    oss: OSS,
    client: reqwest::Client,
    config: AliOssConfig,
}

impl AliOssObjectStore {
    /// 唯一的构造方法
    pub fn new(config: AliOssConfig) -> Result<Self, ObjectStoreError> {
        // 使用 garde 验证配置
        if let Err(errors) = config.validate() {
            return Err(ObjectStoreError::Configuration(format!("{}", errors)));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ObjectStoreError::Configuration(format!("创建 HTTP 客户端失败: {}", e)))?;

        let oss = OSS::new(&config.key, &config.secret, &config.host(), &config.bucket);

        Ok(Self {
            oss,
            client,
            config,
        })
    }

    pub fn config(&self) -> &AliOssConfig {
        &self.config
    }

    /// 构建带签名的请求：签名由 SDK 生成，请求由 reqwest 发送，保留原始状态码和响应头
    fn request(
        &self,
        verb: Verb,
        url: &str,
        key: &str,
        content_type: &str,
    ) -> Result<reqwest::RequestBuilder, ObjectStoreError> {
        let mut signing = RequestBuilder::new();
        signing.method = verb.request_type();
        if !content_type.is_empty() {
            signing = signing.with_content_type(content_type);
        }
        if let Some(token) = &self.config.security_token {
            signing = signing.oss_header_put(OSS_SECURITY_TOKEN_HEADER, token.as_str());
        }

        // 获取签名的 headers
        let resource = format!("/{}", key);
        let (_signed_url, signed) = self
            .oss
            .build_request(&resource, signing)
            .map_err(|e| ObjectStoreError::Configuration(format!("Failed to build request: {}", e)))?;
        let signed_header = |name: &str| {
            signed
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| ObjectStoreError::Configuration(format!("签名结果缺少 {} 头", name)))
        };

        let mut builder = self
            .client
            .request(verb.method(), url)
            .header("Authorization", signed_header("Authorization")?)
            .header("Date", signed_header("date")?);
        if !content_type.is_empty() {
            builder = builder.header(CONTENT_TYPE, content_type);
        }

        // 添加 STS token（如果有）
        if let Some(token) = &self.config.security_token {
            builder = builder.header(OSS_SECURITY_TOKEN_HEADER, token);
        }
        Ok(builder)
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<reqwest::Response, ObjectStoreError> {
        builder
            .send()
            .await
            .map_err(|e| ObjectStoreError::from_provider(e, PROVIDER, context))
    }

    // 分页列举: ListObjects (v1)，通过 marker 翻页
    async fn list_page(
        &self,
        prefix: &str,
        marker: Option<&str>,
    ) -> Result<(ObjectResponse, Option<ListBucketResult>), ObjectStoreError> {
        let mut query = vec![
            ("prefix", prefix.to_string()),
            ("max-keys", LIST_PAGE_SIZE.to_string()),
        ];
        if let Some(marker) = marker {
            query.push(("marker", marker.to_string()));
        }
        let query_string = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}?{}", self.config.bucket_url(), query_string);

        let response = self
            .send(self.request(Verb::Get, &url, "", "")?, "list")
            .await?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let meta = ObjectResponse { status, headers };

        if !crate::oss::is_success(status) {
            return Ok((meta, None));
        }

        let xml_text = response
            .text()
            .await
            .map_err(|e| ObjectStoreError::from_provider(e, PROVIDER, "list"))?;
        let result: ListBucketResult = quick_xml::de::from_str(&xml_text)
            .map_err(|e| ObjectStoreError::InvalidResponse(format!("解析 ListBucketResult 失败: {}", e)))?;

        Ok((meta, Some(result)))
    }
}

#[async_trait]
impl ObjectStore for AliOssObjectStore {
    // GetObject: https://help.aliyun.com/zh/oss/developer-reference/getobject
    async fn get_stream(&self, key: &str) -> Result<GetStreamResponse, ObjectStoreError> {
        let url = self.config.object_url(key);
        tracing::debug!(bucket = %self.config.bucket, key, "oss get_stream");

        let response = self
            .send(self.request(Verb::Get, &url, key, "")?, "get_stream")
            .await?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let stream = response
            .bytes_stream()
            .map_err(|e| ObjectStoreError::from_provider(e, PROVIDER, "get_stream"))
            .boxed();

        Ok(GetStreamResponse {
            status,
            headers,
            stream,
        })
    }

    // DeleteObject: https://help.aliyun.com/zh/oss/developer-reference/deleteobject
    async fn delete(&self, key: &str) -> Result<ObjectResponse, ObjectStoreError> {
        let url = self.config.object_url(key);
        tracing::debug!(bucket = %self.config.bucket, key, "oss delete");

        let response = self
            .send(self.request(Verb::Delete, &url, key, "")?, "delete")
            .await?;
        Ok(ObjectResponse {
            status: response.status().as_u16(),
            headers: collect_headers(response.headers()),
        })
    }

    // 循环调用分页 API，直到没有更多数据
    async fn list(&self, prefix: &str) -> Result<ListResponse, ObjectStoreError> {
        tracing::debug!(bucket = %self.config.bucket, prefix, "oss list");

        let mut objects: Option<Vec<ObjectMeta>> = None;
        let mut marker: Option<String> = None;

        loop {
            let (meta, page) = self.list_page(prefix, marker.as_deref()).await?;
            let page = match page {
                Some(page) => page,
                None => {
                    return Ok(ListResponse {
                        status: meta.status,
                        headers: meta.headers,
                        objects: None,
                    })
                }
            };

            let last_key = page.contents.last().map(|c| c.key.clone());
            if !page.contents.is_empty() {
                objects
                    .get_or_insert_with(Vec::new)
                    .extend(page.contents.into_iter().map(ObjectMeta::from));
            }

            // NextMarker 只在指定 delimiter 时返回，缺失时用本页最后一个 key
            marker = page
                .next_marker
                .filter(|m| !m.is_empty())
                .or(last_key);

            if !page.is_truncated || marker.is_none() {
                return Ok(ListResponse {
                    status: meta.status,
                    headers: meta.headers,
                    objects,
                });
            }
        }
    }

    // PutObject: https://help.aliyun.com/zh/oss/developer-reference/putobject
    async fn put_stream(
        &self,
        key: &str,
        reader: ByteReader,
        options: PutStreamOptions,
    ) -> Result<PutStreamResponse, ObjectStoreError> {
        let url = self.config.object_url(key);
        tracing::debug!(
            bucket = %self.config.bucket,
            key,
            content_type = %options.content_type,
            "oss put_stream"
        );

        let body = reqwest::Body::wrap_stream(ReaderStream::new(reader));
        let mut builder = self
            .request(Verb::Put, &url, key, &options.content_type)?
            .body(body);
        if let Some(length) = options.content_length {
            builder = builder.header(CONTENT_LENGTH, length);
        }

        let response = self.send(builder, "put_stream").await?;
        Ok(PutStreamResponse {
            status: response.status().as_u16(),
            headers: collect_headers(response.headers()),
            name: key.to_string(),
            url,
        })
    }

    // HeadObject: https://help.aliyun.com/zh/oss/developer-reference/headobject
    async fn head(&self, key: &str) -> Result<ObjectResponse, ObjectStoreError> {
        let url = self.config.object_url(key);
        tracing::debug!(bucket = %self.config.bucket, key, "oss head");

        let response = self
            .send(self.request(Verb::Head, &url, key, "")?, "head")
            .await?;
        Ok(ObjectResponse {
            status: response.status().as_u16(),
            headers: collect_headers(response.headers()),
        })
    }
}

impl From<Box<AliOssObjectStore>> for Box<dyn ObjectStore> {
    fn from(store: Box<AliOssObjectStore>) -> Self {
        store as Box<dyn ObjectStore>
    }
}
