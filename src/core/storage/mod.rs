//! On-disk storage for downloadable audio

pub mod temp_files;

pub use temp_files::{
    DOWNLOAD_PREFIX, TempFileConfig, TempFileError, TempFileResult, TempFileWriter,
    cleanup_temp_files, resolve_download,
};
