pub mod api;
pub mod editor;
pub mod events;
pub mod explorer;
pub mod model;
pub mod picker;
pub mod render;
pub mod reorder;
pub mod store;

pub use api::{ApiClient, ApiError, CollectionApi};
pub use editor::{BlockEditor, FocusRequest, FocusTarget, Session};
pub use store::ContentStore;
