//! Upload context: staging → device copies on the transfer queue

pub mod upload_context;

pub use upload_context::{CopyCallback, UploadContext, UploadFlush, UploadStats};
