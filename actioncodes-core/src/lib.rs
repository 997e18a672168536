#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Action Codes: short-lived decimal codes bound to a wallet signature.
//!
//! A wallet signs a canonical message for the current time window. The code is derived from
//! that message and the signature, so it cannot be computed from a pubkey and a timestamp alone,
//! and any verifier holding the code and its signature can recompute and check it. Delegation
//! certificates let a second key mint codes on a wallet's behalf. Chain specific signature
//! checks plug in through [`adapter::ChainVerificationContract`].
//!
//! ```rust,no_run
//! use actioncodes_core::protocol::{ActionCodesProtocol, CodeRequest, ValidationTarget};
//! use actioncodes_core::CodeGenerationConfig;
//!
//! # fn sign(_: &[u8]) -> String { unimplemented!() }
//! # fn main() -> actioncodes_core::ProtocolResult<()> {
//! let protocol = ActionCodesProtocol::new(CodeGenerationConfig::default())?;
//! let message = protocol.canonical_message("2wyVpSKgEW1mEHJAGy5gYcR4bFwNLDPzcGVMdMGAQJvf", None)?;
//! let signature = sign(&message);
//! let generated = protocol.generate_code(CodeRequest::Wallet {
//!     canonical_message: &message,
//!     signature: Some(&signature),
//!     secret: None,
//! })?;
//! protocol.validate_code(ValidationTarget::Wallet(generated.action_code()), None)?;
//! # Ok(())
//! # }
//! ```

mod error;
pub use error::*;

mod types;
pub use types::*;

pub mod adapter;
pub mod canonical;
pub mod clock;
pub mod config;
pub mod digest;
/// Bridge from the `log` facade to a host supplied logger.
pub mod logger;
pub mod meta;
pub mod protocol;
pub mod signature;
pub mod strategy;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::CodeGenerationConfig;
pub use meta::ProtocolMetaFields;
pub use protocol::ActionCodesProtocol;
pub use strategy::{CodeGenerationResult, DelegationCodeStrategy, WalletCodeStrategy};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("actioncodes_core");
