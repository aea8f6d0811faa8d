mod get_entities;
mod get_entity;
mod get_explain;
mod get_health;
mod get_schema;

pub use get_entities::get_entities;
pub use get_entity::get_entity;
pub use get_explain::get_explain;
pub use get_health::get_health;
pub use get_schema::get_schema;
