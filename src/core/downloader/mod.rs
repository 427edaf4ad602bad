pub mod batch;
pub mod source;

pub use batch::{
    check_file, file_sha1, sha1_hex, ArtifactFetcher, Batch, CancelFlag, DownloadProgress,
    DownloadTask,
};
pub use source::{fetch_bytes, fetch_json, ArtifactSource, HttpSource};
