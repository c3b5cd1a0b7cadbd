//! Reference audio download and probing.

mod downloader;

pub use downloader::{probe_duration, FixedDownloader, MediaDownloader, YtDlpDownloader};
