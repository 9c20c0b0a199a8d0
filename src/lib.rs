//! Asynchronous image classification pipeline.
//!
//! Clients submit an image over HTTP; the submission service normalizes it,
//! persists it to blob storage, records a pending task, and enqueues a
//! processing message. A pool of workers consumes the queue, runs object
//! detection, and writes the detected labels back to the task record, which
//! clients poll by task id.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
pub mod worker;
