mod http;
mod storage;

pub use http::{DEFAULT_TIMEOUT, FetchRequest, FetchResponse, HttpFetch, ReqwestFetch};
pub use storage::{BlobStore, LocalBlobStore};
