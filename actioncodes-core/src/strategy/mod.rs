//! Code generation and validation strategies.
//!
//! [`WalletCodeStrategy`] derives codes from a wallet's signature over a canonical message.
//! [`DelegationCodeStrategy`] lets a certified delegate key mint codes for a wallet.

pub mod delegation;
pub mod wallet;

pub use delegation::DelegationCodeStrategy;
pub use wallet::{CodeGenerationResult, WalletCodeStrategy};
