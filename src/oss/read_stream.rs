use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::sync::mpsc;

use crate::oss::AdapterError;

/// 读取流里的错误在流和回调之间共享
pub type ReadError = Arc<AdapterError>;

/// 读取完成回调
pub type ReadCallback = Box<dyn FnOnce(Result<Bytes, ReadError>) + Send + 'static>;

// 没有回调时的转发通道容量（以 chunk 计）
const CHANNEL_CAPACITY: usize = 16;

type ReadItem = Result<Bytes, ReadError>;

// 有回调时用无界通道：回调需要完整内容，不能因为没人消费流而停住
enum ChunkSender {
    Bounded(mpsc::Sender<ReadItem>),
    Unbounded(mpsc::UnboundedSender<ReadItem>),
}

impl ChunkSender {
    // 接收端已丢弃时直接忽略
    async fn send(&self, item: ReadItem) {
        match self {
            ChunkSender::Bounded(tx) => {
                let _ = tx.send(item).await;
            }
            ChunkSender::Unbounded(tx) => {
                let _ = tx.send(item);
            }
        }
    }
}

enum ChunkReceiver {
    Bounded(mpsc::Receiver<ReadItem>),
    Unbounded(mpsc::UnboundedReceiver<ReadItem>),
}

/// `OssAdapter::read` 返回的字节流
///
/// 在远端请求完成之前就已返回，数据和错误随后异步到达。
pub struct ReadStream {
    rx: ChunkReceiver,
}

impl ReadStream {
    pub(crate) fn channel(callback: Option<ReadCallback>) -> (ReadForwarder, ReadStream) {
        let (tx, rx) = if callback.is_some() {
            let (tx, rx) = mpsc::unbounded_channel();
            (ChunkSender::Unbounded(tx), ChunkReceiver::Unbounded(rx))
        } else {
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
            (ChunkSender::Bounded(tx), ChunkReceiver::Bounded(rx))
        };
        let forwarder = ReadForwarder {
            tx,
            buffer: callback.as_ref().map(|_| BytesMut::new()),
            callback,
        };
        (forwarder, ReadStream { rx })
    }
}

impl Stream for ReadStream {
    type Item = ReadItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.rx {
            ChunkReceiver::Bounded(rx) => rx.poll_recv(cx),
            ChunkReceiver::Unbounded(rx) => rx.poll_recv(cx),
        }
    }
}

impl std::fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStream").finish_non_exhaustive()
    }
}

/// 转发端：把远端数据推给 [`ReadStream`]，有回调时同时缓存完整内容
///
/// 回调保存在 `Option` 里，第一次交付（错误或完整内容）时取走，之后的结果被忽略。
/// 有回调时转发不会等待流的消费者，回调的触发与流是否被读取无关。
pub(crate) struct ReadForwarder {
    tx: ChunkSender,
    buffer: Option<BytesMut>,
    callback: Option<ReadCallback>,
}

impl ReadForwarder {
    pub async fn push(&mut self, chunk: Bytes) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.extend_from_slice(&chunk);
        }
        self.tx.send(Ok(chunk)).await;
    }

    pub async fn fail(mut self, err: AdapterError) {
        let err = Arc::new(err);
        if let Some(callback) = self.callback.take() {
            callback(Err(Arc::clone(&err)));
        }
        self.tx.send(Err(err)).await;
    }

    pub fn finish(mut self) {
        if let Some(callback) = self.callback.take() {
            let data = self.buffer.take().unwrap_or_default().freeze();
            callback(Ok(data));
        }
    }
}
