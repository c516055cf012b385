//! # LLM Harness
//!
//! Bounded client pooling and self-correcting structured decoding for
//! text-completion APIs.
//!
//! The crate covers two things that sit around a remote completion model:
//!
//! - **[`ClientPool`]**: a fixed set of [`Client`] handles shared by many
//!   concurrent tasks. At most `size` requests are in flight; everyone else
//!   waits in [`acquire`](ClientPool::acquire). Handles return to the pool
//!   when their [`PooledClient`] guard drops.
//! - **[`RetryParser`]**: decodes the model's last turn into a typed value.
//!   On a decode failure it shows the model the error, seeds a fresh
//!   assistant turn with the expected prefix, and asks again, up to a fixed
//!   budget. Service errors are never retried by the parser.
//!
//! Around them:
//!
//! - **[`Conversation`]** / **[`Turn`]**: the role-tagged history sent to the
//!   model and extended by the parser.
//! - **[`Decode`]**: the one-method contract a target type implements;
//!   [`decode::xml`], [`decode::json`] and (feature `yaml`) `decode::yaml`
//!   provide serde-backed helpers.
//! - **[`backend`]**: the [`Backend`](backend::Backend) trait, the Anthropic
//!   Messages API implementation, a [`MockBackend`] for tests, and transport
//!   backoff.
//! - **[`Cancellation`]**, **[`events`]**, **[`config`]** and
//!   **[`logging`]**: cancellation, observer hooks, environment settings and
//!   `tracing` setup.
//!
//! ## Quick Start
//!
//! ```no_run
//! use llm_harness::conversation::{Conversation, Turn};
//! use llm_harness::decode::{xml, Decode, DecodeError};
//! use llm_harness::{ClientPool, RetryConfig, RetryParser, Settings};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Item {
//!     name: String,
//!     quantity: String,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct ShoppingList {
//!     #[serde(rename = "item", default)]
//!     items: Vec<Item>,
//! }
//!
//! impl Decode for ShoppingList {
//!     fn decode(text: &str) -> Result<Self, DecodeError> {
//!         xml::from_markup_rooted(text, "shopping-list")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let pool = ClientPool::new(&settings.api_key, settings.pool_size, settings.client_config())?;
//!     let client = pool.acquire().await?;
//!
//!     let mut convo = Conversation::new()
//!         .with(Turn::human("List the ingredients for pimento cheese as <shopping-list> markup."))
//!         .with(Turn::assistant("<shopping-list>"));
//!     let reply = client.complete(&convo, 1000, 0.0, None).await?;
//!     convo.extend_last(&reply.text);
//!
//!     let parser = RetryParser::<ShoppingList>::new(RetryConfig::default());
//!     let list = parser.parse(&client, &mut convo, "<shopping-list>").await?;
//!     for item in &list.items {
//!         println!("{}: {}", item.name, item.quantity);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cancel;
pub mod client;
pub mod config;
pub mod conversation;
pub mod decode;
pub mod error;
pub mod events;
pub mod logging;
pub mod pool;
pub mod retry;

pub use backend::{AnthropicBackend, BackoffConfig, MockBackend};
pub use cancel::Cancellation;
pub use client::{Client, ClientConfig};
pub use config::Settings;
pub use conversation::{Conversation, Role, Turn};
pub use decode::{Decode, DecodeError};
pub use error::{HarnessError, Result};
pub use pool::{ClientPool, PooledClient};
pub use retry::{Parsed, RetryConfig, RetryParser};
