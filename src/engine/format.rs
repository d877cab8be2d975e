//! Bitcoin amount rendering

use crate::core::price::DisplayUnit;

pub const SATS_PER_BTC: f64 = 100_000_000.0;

/// Render a BTC amount for display.
///
/// Satoshi mode rounds to whole sats with grouped thousands. Bitcoin mode
/// scales precision inversely with magnitude so small amounts stay
/// distinguishable: 4 decimals at >= 1 BTC, 6 at >= 0.001, 8 below that.
pub fn format_btc(amount: f64, unit: DisplayUnit) -> String {
    match unit {
        DisplayUnit::Satoshi => {
            let sats = (amount * SATS_PER_BTC).round() as i64;
            format!("\u{0180}{} (sats)", group_thousands(sats))
        }
        DisplayUnit::Bitcoin => {
            let precision = if amount >= 1.0 {
                4
            } else if amount >= 0.001 {
                6
            } else {
                8
            };
            format!("\u{20BF}{amount:.precision$}")
        }
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satoshi_rendering() {
        // $1,234.56 at 50_000 USD/BTC
        let amount = 1234.56 / 50000.0;
        assert_eq!(
            format_btc(amount, DisplayUnit::Satoshi),
            "\u{0180}2,469,120 (sats)"
        );
    }

    #[test]
    fn test_satoshi_rounds_to_nearest() {
        assert_eq!(format_btc(0.000000014, DisplayUnit::Satoshi), "\u{0180}1 (sats)");
        assert_eq!(format_btc(0.000000016, DisplayUnit::Satoshi), "\u{0180}2 (sats)");
    }

    #[test]
    fn test_bitcoin_precision_scales_with_magnitude() {
        assert_eq!(format_btc(1.23456789, DisplayUnit::Bitcoin), "\u{20BF}1.2346");
        assert_eq!(
            format_btc(1234.56 / 50000.0, DisplayUnit::Bitcoin),
            "\u{20BF}0.024691"
        );
        assert_eq!(
            format_btc(0.00012345678, DisplayUnit::Bitcoin),
            "\u{20BF}0.00012346"
        );
        // Threshold boundaries
        assert_eq!(format_btc(1.0, DisplayUnit::Bitcoin), "\u{20BF}1.0000");
        assert_eq!(format_btc(0.001, DisplayUnit::Bitcoin), "\u{20BF}0.001000");
    }

    #[test]
    fn test_thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(2_469_120), "2,469,120");
        assert_eq!(group_thousands(100_000_000), "100,000,000");
    }
}
