//! fnlab HTTP API Server
//!
//! JSON/form endpoints over the [`fnlab_core::Workbench`]:
//!
//! - `POST /code`: decompose source into a session
//! - `POST /analyze`: transform one function of a session
//! - `POST /test`: run transformed code with form values and uploads
//! - `GET /health`, `/swagger-ui`, `/api-docs/openapi.json`

pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{AppState, ServerConfig, build_app, start_server};
