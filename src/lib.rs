//! # Stacklet Provider Core
//!
//! Resource lifecycle engine for managing Stacklet cloud-governance
//! configuration declaratively: cloud accounts, notification channels
//! (e-mail, Jira, Teams, Slack, Symphony) and their embedded credentials.
//!
//! The central problem this crate solves is the write-once secret: the
//! remote accepts credential plaintext on write but only ever echoes back
//! an opaque ciphertext handle, so ordinary read-back diffing cannot work.
//! Instead, each secret travels with a user-asserted version tag, and the
//! engine classifies every slot transition purely from the (prior,
//! proposed) tag pair — plaintext is consumed at most once per apply and
//! never persisted.
//!
//! ## Architecture
//!
//! ```text
//! Resource configs → Planner (classify + replacement policy)
//!        ↓                     ↓
//! Secret slots          Apply / Refresh / Import
//!        ↓                     ↓
//! GraphQL client  ←  RemoteStore implementations
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use stacklet_provider::config::ProviderConfig;
//! use stacklet_provider::api::ApiClient;
//! use stacklet_provider::resources::email::{EmailSettings, EmailStore};
//! use stacklet_provider::{reconcile, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ProviderConfig::from_env()?;
//!     let store = EmailStore::new(ApiClient::new(&config)?);
//!
//!     let settings = EmailSettings {
//!         from_address: "cloud@example.com".into(),
//!         smtp_server: "smtp.example.com".into(),
//!         ..Default::default()
//!     };
//!     let parent = settings.into_parent_config();
//!     let plan = reconcile::plan(None, &parent);
//!     let state = reconcile::apply(None, parent, &plan, &store).await?;
//!     println!("created {}", state.id);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod errors;
pub mod observability;
pub mod reconcile;
pub mod resources;
pub mod secrets;
pub mod state;

// Re-export commonly used types and traits
pub use config::ProviderConfig;
pub use errors::{ProviderError, Result};
pub use observability::{init_logging, LogFormat};
