// 测试用内存对象存储
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use oss_adapter::oss::{
    AliOssConfig, ByteReader, GetStreamResponse, Headers, ListResponse, ObjectMeta,
    ObjectResponse, ObjectStore, ObjectStoreError, OssAdapter, PutStreamOptions,
    PutStreamResponse,
};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
struct State {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    events: Vec<String>,
    offline: bool,
    fail_head: bool,
    delete_status: Option<u16>,
}

/// 多个 store handle 共享的后端
#[derive(Clone, Default)]
pub struct MemoryOss {
    state: Arc<Mutex<State>>,
    connects: Arc<AtomicUsize>,
}

impl MemoryOss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adapter(&self, bucket: &str) -> OssAdapter {
        let oss = self.clone();
        OssAdapter::with_connector(
            config(bucket),
            move |config: &AliOssConfig| -> Result<Box<dyn ObjectStore>, ObjectStoreError> {
                oss.connects.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(MemoryStore {
                    oss: oss.clone(),
                    bucket: config.bucket.clone(),
                }))
            },
        )
    }

    pub fn insert(&self, bucket: &str, key: &str, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                StoredObject {
                    data: Bytes::copy_from_slice(data),
                    content_type: "application/octet-stream".to_string(),
                },
            );
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state
            .lock()
            .unwrap()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// 删除已存在对象时返回的状态码，默认 200
    pub fn set_delete_status(&self, status: u16) {
        self.state.lock().unwrap().delete_status = Some(status);
    }

    pub fn set_fail_head(&self, fail_head: bool) {
        self.state.lock().unwrap().fail_head = fail_head;
    }
}

pub fn config(bucket: &str) -> AliOssConfig {
    AliOssConfig {
        key: "test-ak".to_string(),
        secret: "test-sk".to_string(),
        bucket: bucket.to_string(),
        ..Default::default()
    }
}

pub fn object_url(bucket: &str, key: &str) -> String {
    format!("https://{}.memory/{}", bucket, key)
}

struct MemoryStore {
    oss: MemoryOss,
    bucket: String,
}

impl MemoryStore {
    fn event(&self, event: String) -> Result<(), ObjectStoreError> {
        let mut state = self.oss.state.lock().unwrap();
        state.events.push(event);
        if state.offline {
            return Err(ObjectStoreError::Network("store offline".to_string()));
        }
        Ok(())
    }

    fn object(&self, key: &str) -> Option<StoredObject> {
        self.oss.get(&self.bucket, key)
    }

    fn store(&self, key: &str, object: StoredObject) {
        self.oss
            .state
            .lock()
            .unwrap()
            .buckets
            .entry(self.bucket.clone())
            .or_default()
            .insert(key.to_string(), object);
    }
}

fn status(status: u16) -> ObjectResponse {
    ObjectResponse {
        status,
        headers: Headers::new(),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_stream(&self, key: &str) -> Result<GetStreamResponse, ObjectStoreError> {
        self.event(format!("get:{}", key))?;
        match self.object(key) {
            Some(object) => {
                // 拆成小块，模拟分多次到达的数据
                let chunks: Vec<Result<Bytes, ObjectStoreError>> = object
                    .data
                    .chunks(4)
                    .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                    .collect();
                Ok(GetStreamResponse {
                    status: 200,
                    headers: Headers::new(),
                    stream: stream::iter(chunks).boxed(),
                })
            }
            None => {
                let mut headers = Headers::new();
                headers.insert("x-oss-ec".to_string(), "0026-00000001".to_string());
                Ok(GetStreamResponse {
                    status: 404,
                    headers,
                    stream: stream::empty().boxed(),
                })
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<ObjectResponse, ObjectStoreError> {
        self.event(format!("delete:{}", key))?;
        let mut state = self.oss.state.lock().unwrap();
        let removed = state
            .buckets
            .get_mut(&self.bucket)
            .and_then(|objects| objects.remove(key));
        Ok(status(match removed {
            Some(_) => state.delete_status.unwrap_or(200),
            None => 404,
        }))
    }

    async fn list(&self, prefix: &str) -> Result<ListResponse, ObjectStoreError> {
        self.event(format!("list:{}", prefix))?;
        let state = self.oss.state.lock().unwrap();
        let objects: Vec<ObjectMeta> = state
            .buckets
            .get(&self.bucket)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|(key, _)| key.starts_with(prefix))
                    .map(|(key, object)| ObjectMeta {
                        key: key.clone(),
                        size: object.data.len() as u64,
                        last_modified: None,
                        etag: None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ListResponse {
            status: 200,
            headers: Headers::new(),
            objects: if objects.is_empty() { None } else { Some(objects) },
        })
    }

    async fn put_stream(
        &self,
        key: &str,
        mut reader: ByteReader,
        options: PutStreamOptions,
    ) -> Result<PutStreamResponse, ObjectStoreError> {
        self.event(format!("put:{}", key))?;

        let mut data = Vec::new();
        let mut chunk = vec![0u8; 4];
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
            // 已经到达的部分会留在远端
            self.store(
                key,
                StoredObject {
                    data: Bytes::from(data.clone()),
                    content_type: options.content_type.clone(),
                },
            );
        }
        self.store(
            key,
            StoredObject {
                data: Bytes::from(data),
                content_type: options.content_type,
            },
        );

        Ok(PutStreamResponse {
            status: 200,
            headers: Headers::new(),
            name: key.to_string(),
            url: object_url(&self.bucket, key),
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectResponse, ObjectStoreError> {
        self.event(format!("head:{}", key))?;
        if self.oss.state.lock().unwrap().fail_head {
            return Err(ObjectStoreError::Network("head timed out".to_string()));
        }
        match self.object(key) {
            Some(object) => {
                let mut headers = Headers::new();
                headers.insert("content-length".to_string(), object.data.len().to_string());
                headers.insert("content-type".to_string(), object.content_type);
                headers.insert("etag".to_string(), "\"memory\"".to_string());
                Ok(ObjectResponse {
                    status: 200,
                    headers,
                })
            }
            None => Ok(status(404)),
        }
    }
}

/// 先吐出一段数据，然后报错的 reader
pub struct FailingReader {
    sent: bool,
}

impl FailingReader {
    pub fn new() -> Self {
        Self { sent: false }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.sent {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        self.sent = true;
        buf.put_slice(b"part");
        Poll::Ready(Ok(()))
    }
}
