//! HTTP API handlers for mts-server
//!
//! Every JSON route also answers on its trailing-slash form.

pub mod download;
pub mod health;
pub mod models;
pub mod notes;
pub mod transcribe;
pub mod ui;
pub mod upload;

pub use download::download_routes;
pub use health::health_routes;
pub use models::model_routes;
pub use notes::notes_routes;
pub use transcribe::transcribe_routes;
pub use ui::ui_routes;
pub use upload::upload_routes;
