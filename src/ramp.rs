//! Mock fiat on/off-ramp
//!
//! Simulates charging a card when a user buys coins and paying out to a
//! bank account when a user sells them. No real payment provider is called.

use log::info;

use crate::config::RampConfig;

/// Card numbers with this prefix are always declined
pub const DECLINED_CARD_PREFIX: &str = "4000";

#[derive(Debug, Clone)]
pub struct MockRamp {
    coin_per_usd: f64,
}

impl MockRamp {
    pub fn new(config: &RampConfig) -> Self {
        Self {
            coin_per_usd: config.coin_per_usd,
        }
    }

    pub fn coin_per_usd(&self) -> f64 {
        self.coin_per_usd
    }

    pub fn usd_to_coin(&self, usd: f64) -> f64 {
        usd * self.coin_per_usd
    }

    pub fn coin_to_usd(&self, coin: f64) -> f64 {
        coin / self.coin_per_usd
    }

    /// Charges a card; true on success
    pub fn charge_card(&self, card_number: &str, usd: f64) -> bool {
        if card_number.is_empty() || usd <= 0.0 || card_number.starts_with(DECLINED_CARD_PREFIX) {
            return false;
        }

        info!("Charged ${:.2} to card ending {}", usd, last_four(card_number));
        true
    }

    /// Sends a payout to a bank account; true on success
    pub fn send_to_bank(&self, bank_account: &str, usd: f64) -> bool {
        if bank_account.is_empty() || usd <= 0.0 {
            return false;
        }

        info!("Paid out ${:.2} to account ending {}", usd, last_four(bank_account));
        true
    }
}

fn last_four(number: &str) -> &str {
    let start = number
        .char_indices()
        .rev()
        .nth(3)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &number[start..]
}
