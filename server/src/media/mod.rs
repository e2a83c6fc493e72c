pub mod data_uri;
pub mod processing;
pub mod storage;

pub use storage::{remove, store_bytes, store_image_field, AVATARS_DIR, RECIPE_IMAGES_DIR};
