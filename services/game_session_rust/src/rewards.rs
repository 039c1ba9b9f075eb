//! End-of-session rewards and shop purchases.
//!
//! Both read the wallet and write it back, so every wallet write goes
//! through this ledger and holds `wallet_lock` from fetch to update.

use crate::types::SessionReport;
use anyhow::Result;
use log::{info, warn};
use modsim_rust_core::clients::ProfileStore;
use modsim_rust_core::upgrades::{self, PurchaseReceipt};
use modsim_rust_core::{GameStatsUpdate, Wallet};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

pub struct RewardLedger {
    store: Arc<dyn ProfileStore>,
    settled: Mutex<HashSet<Uuid>>,
    wallet_lock: tokio::sync::Mutex<()>,
}

impl RewardLedger {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            settled: Mutex::new(HashSet::new()),
            wallet_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Persist the session's stats and credit its score.
    ///
    /// Returns the updated wallet, or `None` if this session was already settled.
    pub async fn settle(&self, report: &SessionReport) -> Result<Option<Wallet>> {
        if !self.settled.lock().insert(report.session_id) {
            info!("Rewards for session {} already settled", report.session_id);
            return Ok(None);
        }

        let stats = GameStatsUpdate::from(&report.stats);
        if let Err(e) = self.store.update_user_stats(&stats).await {
            warn!("Failed to update stats for session {}: {:#}", report.session_id, e);
        }

        let _guard = self.wallet_lock.lock().await;
        let wallet = self.store.fetch_wallet().await?;
        let earned = report.stats.score.max(0);
        let money = wallet.money + earned;
        self.store
            .update_user_upgrades(money, &wallet.upgrades)
            .await?;
        info!(
            "Session {} earned {} (balance {})",
            report.session_id, earned, money
        );

        Ok(Some(Wallet {
            money,
            upgrades: wallet.upgrades,
        }))
    }

    /// Buy the next level of `upgrade_id` with the stored money
    pub async fn purchase(&self, upgrade_id: &str) -> Result<PurchaseReceipt> {
        let _guard = self.wallet_lock.lock().await;
        let wallet = self.store.fetch_wallet().await?;
        let receipt = upgrades::purchase(&wallet.upgrades, wallet.money, upgrade_id)?;
        self.store
            .update_user_upgrades(receipt.money, &receipt.upgrades)
            .await?;
        info!(
            "Bought {} level {} for {}",
            receipt.id, receipt.new_level, receipt.price
        );
        Ok(receipt)
    }

    pub fn is_settled(&self, session_id: &Uuid) -> bool {
        self.settled.lock().contains(session_id)
    }
}
