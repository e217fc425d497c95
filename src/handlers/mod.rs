//! HTTP request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Root and health endpoints
//! - `speech` - OpenAI-compatible text-to-speech
//! - `download` - Finalized temp file downloads
//! - `models` - OpenAI model listing
//! - `voices` - Voice listing and combination
//! - `dev` - Phonemization and phoneme-driven synthesis

pub mod api;
pub mod dev;
pub mod download;
pub mod models;
pub mod speech;
pub mod voices;
