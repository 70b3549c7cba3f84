//! Client layer for the token-gated chatbot marketplace: wallet connection,
//! contract calls, chatbot creation, avatar normalization and chat sessions,
//! plus the local HTTP/WebSocket API the web UI talks to.

pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod image;
pub mod metadata;
pub mod provider;
pub mod routes;
pub mod state;
pub mod wallet;

pub use error::{CallResult, Envelope, ErrorKind, GatewayError};
pub use gateway::{Access, Gateway};
pub use provider::{HttpProvider, Provider, ProviderError, WalletEvent};
pub use wallet::{WalletConnector, WalletStatus};
