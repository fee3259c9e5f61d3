//! Local web front-end: a single page plus a JSON download endpoint.
//!
//! - `GET /` serves the form
//! - `POST /download` takes `{"url": "...", "folder": "..."}` and answers with
//!   `{"success": true, "message": "..."}` or `{"success": false, "error": "...", "kind": "..."}`

pub mod models;
pub mod server;

pub use server::{router, run, WebState};
