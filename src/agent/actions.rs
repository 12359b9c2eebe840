//! Post-tool hook: tracks token contracts that show up in trade output.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use alloy::primitives::Address;
use regex::Regex;

use crate::store::Database;
use crate::tools::builtin::TRADE_TOOL_NAMES;

static CONTRACT_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b0x[a-fA-F0-9]{40}\b").expect("contract address pattern is valid")
});

/// Extract distinct contract addresses from free text.
pub fn find_contract_addresses(text: &str) -> Vec<Address> {
    CONTRACT_ADDRESS
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<Address>().ok())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Registers token contracts mentioned by trade tools in the `erc20s` table.
pub struct ActionHook {
    store: Arc<dyn Database>,
}

impl ActionHook {
    pub fn new(store: Arc<dyn Database>) -> Self {
        Self { store }
    }

    /// Inspect a tool's output. Returns the number of newly tracked contracts.
    pub async fn handle(&self, tool_name: &str, output: &str) -> usize {
        if !TRADE_TOOL_NAMES.contains(&tool_name) || output.starts_with("Error:") {
            return 0;
        }
        let mut added = 0;
        for address in find_contract_addresses(output) {
            match self.store.add_erc20(&address.to_string()).await {
                Ok(true) => {
                    tracing::info!(contract = %address, "Tracking new ERC-20 contract");
                    added += 1;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(contract = %address, "Failed to track contract: {e}"),
            }
        }
        added
    }
}
