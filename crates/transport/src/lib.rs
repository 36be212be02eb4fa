//! # screenpilot transport
//!
//! Everything between the step loop and a model backend:
//!
//! - [`retry`]: exponential backoff for transient failures
//! - [`BoundedCache`]: O(1) LRU used for resolved images
//! - [`ImageResolver`]: fetches URL screenshots and inlines them as base64
//! - [`PayloadBudget`]: per-model-family image-count / byte ceilings
//! - [`TransportGuard`]: the above, applied to every outbound request

pub mod budget;
pub mod guard;
pub mod image;
pub mod lru;
pub mod retry;

pub use budget::{
    FamilyRules, ModelFamily, PayloadBudget, cap_images, limit_image_count, limit_payload_bytes,
};
pub use guard::TransportGuard;
pub use image::{FetchedImage, HttpImageFetcher, ImageFetcher, ImageResolver};
pub use lru::BoundedCache;
pub use retry::{RetryPolicy, retry};
