// Session runtime for timed, resumable, optionally adaptive quizzes.
// The binary in main.rs layers the terminal front-end (app, event, ui) on top
// of these modules; benchmarks and integration tests import them directly.

pub mod config;
pub mod engine;
pub mod error;
pub mod service;
pub mod session;
pub mod store;
