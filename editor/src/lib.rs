//! Edit session engine.
//!
//! Turns a document plus a find/replace request or a list of suggested
//! corrections into reviewable candidates, walks a reviewer (or an
//! auto-apply policy) through them, and commits accepted edits while keeping
//! untouched runs intact.

pub mod actors;
pub mod candidates;
pub mod config;
pub mod document;
pub mod reconcile;
pub mod segmenter;
pub mod session;
pub mod session_store;
pub mod suggestions;

pub use config::EditorConfig;
pub use document::{Document, DocumentError, Paragraph, Run, RunStyle};
pub use session::{EditSession, SessionError, Strategy};
pub use session_store::SessionStore;
