pub mod entity;
pub mod error;
pub mod id;
pub mod value;

// Re-export commonly used types
pub use entity::{annotation_key_spec, Entity, EntitySpec, EntityType, ANNOTATION_KEY_NAME};
pub use error::CoreError;
pub use id::EntityId;
pub use value::{Annotation, Value};
