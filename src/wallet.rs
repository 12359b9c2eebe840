//! Agent wallet.
//!
//! The private key lives in a `PrivateKeySigner` plus a `SecretString` copy
//! used only for export. Neither is ever logged.

use std::fmt;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Error;
use crate::store::Database;

/// Row id of the agent wallet in the `wallet` table.
pub const WALLET_ROW_ID: i64 = 1;

/// Where the wallet came from at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletSource {
    Database,
    Environment,
    Generated,
}

/// Exported form stored in the database.
#[derive(Serialize, Deserialize)]
struct WalletExport {
    address: String,
    private_key: String,
}

/// The agent's signing wallet.
pub struct AgentWallet {
    signer: PrivateKeySigner,
    private_key: SecretString,
}

impl AgentWallet {
    /// Build from a hex private key, with or without `0x`.
    pub fn from_hex(key_hex: &str) -> Result<Self, Error> {
        let trimmed = key_hex.trim();
        let bare = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let signer: PrivateKeySigner = bare
            .parse()
            .map_err(|e| Error::Wallet(format!("Invalid private key: {e}")))?;
        Ok(Self::from_signer(signer))
    }

    /// Generate a fresh random key.
    pub fn random() -> Self {
        Self::from_signer(PrivateKeySigner::random())
    }

    fn from_signer(signer: PrivateKeySigner) -> Self {
        let private_key = SecretString::from(signer.to_bytes().to_string());
        Self {
            signer,
            private_key,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// A signer clone for building providers.
    pub fn signer(&self) -> PrivateKeySigner {
        self.signer.clone()
    }

    /// JSON export persisted in the wallet row.
    fn export(&self) -> Result<String, Error> {
        serde_json::to_string(&WalletExport {
            address: self.address().to_string(),
            private_key: self.private_key.expose_secret().to_string(),
        })
        .map_err(|e| Error::Wallet(format!("Failed to export wallet: {e}")))
    }

    fn import(data: &str) -> Result<Self, Error> {
        let export: WalletExport = serde_json::from_str(data)
            .map_err(|e| Error::Wallet(format!("Stored wallet data is malformed: {e}")))?;
        let wallet = Self::from_hex(&export.private_key)?;
        if !wallet
            .address()
            .to_string()
            .eq_ignore_ascii_case(export.address.trim())
        {
            return Err(Error::Wallet(format!(
                "Stored wallet address {} does not match its key",
                export.address
            )));
        }
        Ok(wallet)
    }

    /// Load the wallet: stored row first, then the configured key, otherwise
    /// a new random key. The result is always written back to the store.
    pub async fn resolve(
        db: &dyn Database,
        configured_key: Option<&SecretString>,
    ) -> Result<(Self, WalletSource), Error> {
        let (wallet, source) = match db.get_wallet_info().await? {
            Some(data) if !data.trim().is_empty() => (Self::import(&data)?, WalletSource::Database),
            _ => match configured_key {
                Some(key) => (
                    Self::from_hex(key.expose_secret())?,
                    WalletSource::Environment,
                ),
                None => (Self::random(), WalletSource::Generated),
            },
        };

        db.save_wallet_info(&wallet.export()?).await?;
        info!(address = %wallet.address(), source = ?source, "Agent wallet ready");
        Ok((wallet, source))
    }
}

impl fmt::Debug for AgentWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentWallet")
            .field("address", &self.address())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    // Well-known development key; never funded on a real network.
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[test]
    fn derives_address_from_key() {
        let wallet = AgentWallet::from_hex(TEST_KEY).unwrap();
        assert_eq!(wallet.address().to_string().to_lowercase(), TEST_ADDRESS);

        let bare = AgentWallet::from_hex(TEST_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(bare.address(), wallet.address());
    }

    #[test]
    fn rejects_garbage_key() {
        assert!(matches!(
            AgentWallet::from_hex("0xnope"),
            Err(Error::Wallet(_))
        ));
    }

    #[test]
    fn debug_redacts_key() {
        let wallet = AgentWallet::from_hex(TEST_KEY).unwrap();
        let debug = format!("{wallet:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("ac0974bec"));
    }

    #[tokio::test]
    async fn configured_key_is_used_and_persisted() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let key = SecretString::from(TEST_KEY);

        let (wallet, source) = AgentWallet::resolve(&db, Some(&key)).await.unwrap();
        assert_eq!(source, WalletSource::Environment);

        let stored = db.get_wallet_info().await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(
            json["address"].as_str().unwrap().to_lowercase(),
            TEST_ADDRESS
        );
        assert_eq!(json["private_key"], TEST_KEY);
        assert_eq!(wallet.address().to_string().to_lowercase(), TEST_ADDRESS);
    }

    #[tokio::test]
    async fn stored_wallet_wins_over_configured_key() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let (first, source) = AgentWallet::resolve(&db, None).await.unwrap();
        assert_eq!(source, WalletSource::Generated);

        let other_key = SecretString::from(TEST_KEY);
        let (second, source) = AgentWallet::resolve(&db, Some(&other_key)).await.unwrap();
        assert_eq!(source, WalletSource::Database);
        assert_eq!(second.address(), first.address());
    }

    #[tokio::test]
    async fn mismatched_stored_address_is_rejected() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.save_wallet_info(&format!(
            r#"{{"address":"0x0000000000000000000000000000000000000001","private_key":"{TEST_KEY}"}}"#
        ))
        .await
        .unwrap();
        assert!(AgentWallet::resolve(&db, None).await.is_err());
    }
}
