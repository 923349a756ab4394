mod adapter;
mod ali_oss_object_store;
mod error;
mod object_store;
mod object_store_types;
mod read_stream;
mod receiver;

pub use adapter::{OssAdapter, NON_200_READ_MESSAGE};
pub use ali_oss_object_store::{AliOssConfig, AliOssObjectStore};
pub use error::{AdapterError, ObjectStoreError, WriteError, E_WRITE};
pub use object_store::{AliOssConnector, ObjectStore, StoreConnector};
pub use object_store_types::{
    is_success, ByteReader, ByteStream, FileRecord, GetStreamResponse, Headers, ListResponse,
    ObjectMeta, ObjectResponse, PutStreamOptions, PutStreamResponse, UploadedFile, UpstreamFile,
    WriteFileListener,
};
pub use read_stream::{ReadCallback, ReadError, ReadStream};
pub use receiver::{ReceiveOptions, Receiver};
