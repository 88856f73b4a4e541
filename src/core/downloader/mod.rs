pub mod client;

pub use client::{BatchReport, DownloadEntry, Downloader};
