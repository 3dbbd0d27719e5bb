//! Client side of the defect inference service: local pre-flight validation
//! of upload candidates, then the HTTP calls themselves.

pub mod http;
pub mod validate;

pub use http::{DETECT_TIMEOUT, DetectClient, DetectError, PING_TIMEOUT};
pub use validate::{
    ImageKind, MAX_BATCH_FILES, MAX_IMAGE_BYTES, UploadImage, ValidationError, check_batch_size,
    is_supported_extension, validate_bytes,
};
