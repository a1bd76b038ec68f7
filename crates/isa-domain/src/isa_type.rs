//! The closed set of ISA wrappers tracked by the engine.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Supported ISA wrappers. Declaration order is the display order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IsaType {
    Cash,
    StocksAndShares,
    Lifetime,
    InnovativeFinance,
}

impl IsaType {
    pub const ALL: [IsaType; 4] = [
        IsaType::Cash,
        IsaType::StocksAndShares,
        IsaType::Lifetime,
        IsaType::InnovativeFinance,
    ];

    /// Lifetime ISAs are never flexible; withdrawals from them cannot be replaced.
    pub fn can_be_flexible(self) -> bool {
        !matches!(self, IsaType::Lifetime)
    }

    /// Short key accepted by the shell and used in logs.
    pub fn key(self) -> &'static str {
        match self {
            IsaType::Cash => "cash",
            IsaType::StocksAndShares => "stocks",
            IsaType::Lifetime => "lifetime",
            IsaType::InnovativeFinance => "ifisa",
        }
    }
}

impl fmt::Display for IsaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IsaType::Cash => "Cash ISA",
            IsaType::StocksAndShares => "Stocks & Shares ISA",
            IsaType::Lifetime => "Lifetime ISA",
            IsaType::InnovativeFinance => "Innovative Finance ISA",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIsaType(pub String);

impl fmt::Display for UnknownIsaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown ISA type `{}` (expected cash, stocks, lifetime or ifisa)",
            self.0
        )
    }
}

impl std::error::Error for UnknownIsaType {}

impl FromStr for IsaType {
    type Err = UnknownIsaType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(IsaType::Cash),
            "stocks" | "ss" | "s&s" | "stocks-and-shares" | "stocksandshares" => {
                Ok(IsaType::StocksAndShares)
            }
            "lifetime" | "lisa" => Ok(IsaType::Lifetime),
            "ifisa" | "innovative" | "innovative-finance" | "innovativefinance" => {
                Ok(IsaType::InnovativeFinance)
            }
            other => Err(UnknownIsaType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_keys_case_insensitively() {
        assert_eq!("LISA".parse::<IsaType>().unwrap(), IsaType::Lifetime);
        assert_eq!("Stocks".parse::<IsaType>().unwrap(), IsaType::StocksAndShares);
        assert_eq!(" ifisa ".parse::<IsaType>().unwrap(), IsaType::InnovativeFinance);
        assert!("pension".parse::<IsaType>().is_err());
    }

    #[test]
    fn keys_round_trip_through_from_str() {
        for isa_type in IsaType::ALL {
            assert_eq!(isa_type.key().parse::<IsaType>().unwrap(), isa_type);
        }
    }

    #[test]
    fn only_lifetime_is_never_flexible() {
        let rigid: Vec<_> = IsaType::ALL
            .into_iter()
            .filter(|kind| !kind.can_be_flexible())
            .collect();
        assert_eq!(rigid, vec![IsaType::Lifetime]);
    }
}
