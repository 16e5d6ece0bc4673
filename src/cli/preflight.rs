//! Pre-flight checks before provider calls.
//!
//! Validates that the active provider has a credential before starting
//! operations that would otherwise fail after doing local work.

use crate::error::{LektError, Result};
use crate::provider::ProviderKind;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Summaries call the provider.
    Summarize,
    /// Asking questions calls the provider.
    Ask,
    /// Class and session management is local only.
    Manage,
}

/// Run pre-flight checks for the given operation against the active provider.
pub fn check(operation: Operation, provider: ProviderKind) -> Result<()> {
    match operation {
        Operation::Summarize | Operation::Ask => check_api_key(provider),
        Operation::Manage => Ok(()),
    }
}

/// Check that the provider's API key is set.
fn check_api_key(provider: ProviderKind) -> Result<()> {
    let var = provider.api_key_env();
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(()),
        Ok(_) => Err(LektError::Authentication {
            provider: provider.to_string(),
            message: format!("{} is empty. Set it with: export {}='...'", var, var),
        }),
        Err(_) => Err(LektError::Authentication {
            provider: provider.to_string(),
            message: format!("{} not set. Set it with: export {}='...'", var, var),
        }),
    }
}
