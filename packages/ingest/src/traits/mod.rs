//! Trait abstractions over storage and fetching backends.

pub mod fetch;
pub mod objects;
pub mod store;

pub use fetch::{FetchedImage, HttpImageFetcher, ImageFetcher};
pub use objects::ObjectStore;
pub use store::CatalogStore;
