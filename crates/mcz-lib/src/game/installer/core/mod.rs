pub mod archive;
pub mod downloader;
pub mod library;
pub mod traits;
