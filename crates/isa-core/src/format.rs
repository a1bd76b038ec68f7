use rust_decimal::{Decimal, RoundingStrategy};

/// Formats currency amounts for presentation. Never used for computation.
pub trait CurrencyFormatter: Send + Sync {
    fn format_amount(&self, amount: Decimal) -> String;
}

/// Sterling with thousands separators, e.g. `£20,000` or `-£1,250`.
#[derive(Debug, Clone, Copy)]
pub struct PoundFormatter {
    decimals: u32,
}

impl PoundFormatter {
    pub fn new() -> Self {
        Self { decimals: 0 }
    }

    /// Shows `decimals` places instead of whole pounds.
    pub fn with_decimals(decimals: u32) -> Self {
        Self { decimals }
    }
}

impl Default for PoundFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl CurrencyFormatter for PoundFormatter {
    fn format_amount(&self, amount: Decimal) -> String {
        let rounded =
            amount.round_dp_with_strategy(self.decimals, RoundingStrategy::MidpointAwayFromZero);
        let negative = rounded < Decimal::ZERO;
        let text = format!("{:.*}", self.decimals as usize, rounded.abs());
        let (whole, fraction) = match text.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (text.as_str(), None),
        };
        let mut body = group_digits(whole, ',');
        if let Some(fraction) = fraction {
            body.push('.');
            body.push_str(fraction);
        }
        if negative {
            format!("-£{body}")
        } else {
            format!("£{body}")
        }
    }
}

fn group_digits(digits: &str, separator: char) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index != 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(ch);
    }
    grouped
}
