#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

//! purrtainer library — the pieces behind the `purrtainer` binary.
//!
//! - `terminal` — interactive container attach over a WebSocket
//! - `client` — typed HTTP client for the Portainer REST API
//! - `models` — REST response types
//! - `filter` — client-side list filtering
//! - `credentials` — persisted server address and tokens
//! - `prefs` — persisted hidden-stacks preference
//! - `config` — TOML + env-var configuration
//! - `demux` — Docker multiplexed stream decoding

pub mod client;
pub mod config;
pub mod credentials;
pub mod demux;
pub mod filter;
pub mod models;
pub mod prefs;
pub mod terminal;
pub mod util;

pub use client::{ClientError, PortainerClient};
pub use config::Config;
pub use credentials::{CredentialStore, Credentials};
pub use prefs::HiddenStacks;
pub use terminal::{SessionController, TerminalError};
