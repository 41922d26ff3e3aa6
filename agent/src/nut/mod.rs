//! Client side of the Network UPS Tools daemon protocol.
pub mod client;
pub mod protocol;

pub use client::NutClient;
pub use protocol::NutError;

use std::collections::BTreeMap;

/// Raw variables of one unit: variable name to the daemon's string value.
pub type VariableSet = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsDescriptor {
    pub name: String,
    pub description: String,
}

/// Queries the poll cycle needs from a daemon session.
#[allow(async_fn_in_trait)]
pub trait UpsDaemon {
    async fn list_ups(&mut self) -> Result<Vec<UpsDescriptor>, NutError>;

    async fn list_vars(&mut self, ups: &str) -> Result<VariableSet, NutError>;

    async fn logout(&mut self) -> Result<(), NutError> {
        Ok(())
    }
}
