//! # TextSleuth
//!
//! AI-generated text detection and plagiarism checking backed by an
//! external language model.
//!
//! Both tools accept pasted text or an uploaded document (plain text, PDF,
//! DOCX). Documents are reduced to plain text, the text is sent to the
//! model with a fixed prompt and output schema, and the structured result
//! is normalized into a display view. Successful analyses are appended to a
//! persisted history.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌────────────┐   ┌──────────┐   ┌───────────┐
//! │ Text / File │──▶│  Extract   │──▶│ Dispatch │──▶│  Present  │
//! │ InputSource │   │txt/pdf/docx│   │ LLM call │   │ view/html │
//! └─────────────┘   └────────────┘   └────┬─────┘   └───────────┘
//!                                         │
//!                                         ▼
//!                                    ┌──────────┐
//!                                    │ History  │
//!                                    │ (SQLite) │
//!                                    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sleuth init                          # create database
//! sleuth detect "Some pasted text"     # AI detection
//! sleuth plagiarism --file essay.pdf   # plagiarism check on a document
//! sleuth history list
//! sleuth serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the input selector |
//! | [`extract`] | Document text extraction |
//! | [`prompts`] | Prompt templates and output schemas |
//! | [`llm`] | Model provider abstraction |
//! | [`dispatch`] | Validation, provider call, error folding |
//! | [`present`] | Result normalization and rendering |
//! | [`history`] | Analysis history store |
//! | [`progress`] | CLI progress reporting |
//! | [`server`] | JSON HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod dispatch;
pub mod extract;
pub mod history;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod present;
pub mod progress;
pub mod prompts;
pub mod server;
