//! # issuemirror-renderer
//!
//! Turns remote items into Markdown documents and back.
//!
//! - [`template`]: the `{name}` / `{name:content}` mini-language.
//! - [`context`]: the variable set built from one item.
//! - [`filename`]: filename rendering and number recovery.
//! - [`document`]: header composition and the built-in templates.
//! - [`persist`]: extraction and merging of user-owned persist blocks.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use issuemirror_core::{ItemKind, RemoteItem, RepoId, UpdateMode};
//! use issuemirror_renderer::{filename, DocumentRenderer, RenderInput};
//!
//! fn render(repo: &RepoId, item: &RemoteItem) -> (String, String) {
//!     let input = RenderInput {
//!         repo,
//!         item,
//!         comments: None,
//!         date_format: None,
//!         update_mode: UpdateMode::Update,
//!         allow_delete: false,
//!     };
//!     let name = filename::render_filename("Issue - {number}", &input.context());
//!     let doc = DocumentRenderer::builtin(ItemKind::Issue).render(&input);
//!     (name, doc)
//! }
//! ```

pub mod context;
pub mod document;
pub mod error;
pub mod filename;
pub mod persist;
pub mod template;

pub use context::TemplateContext;
pub use document::{DocumentRenderer, RenderInput};
pub use error::RenderError;
pub use persist::PersistBlock;
