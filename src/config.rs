// 7.3 config.rs: everything a market is deployed with, in one serializable bundle.
// presets per environment; every bundle is validated before a market is built from it.

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::fixed::UFixed6;
use crate::oracle::KeeperConfig;
use crate::params::{MarketParameter, ParameterError, RiskParameter};

// Complete configuration for one settlement market
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettlementConfig {
    // Human readable market name
    pub name: String,
    pub market: MarketParameter,
    pub risk: RiskParameter,
    // Clock and fee schedule for the keeper-fed provider
    pub keeper: KeeperConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid parameter: {0}")]
    Parameter(#[from] ParameterError),

    #[error("invalid keeper config: {reason}")]
    InvalidKeeper { reason: String },

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
}

impl SettlementConfig {
    pub fn development() -> Self {
        Self {
            name: "ETH-PERP Dev".to_string(),
            ..Self::default()
        }
    }

    // Testnet: no linear fees, cheap keepers
    pub fn testnet() -> Self {
        let mut config = Self::development();
        config.name = "ETH-PERP Testnet".to_string();
        config.market.maker_fee = UFixed6::ZERO;
        config.market.taker_fee = UFixed6::new(dec!(0.0001));
        config.keeper.settlement_fee = UFixed6::new(dec!(0.1));
        config
    }

    // Mainnet with conservative risk settings
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::development();
        config.name = "ETH-PERP".to_string();
        config.risk.margin = UFixed6::new(dec!(0.2));
        config.risk.maintenance = UFixed6::new(dec!(0.1));
        config.risk.stale_after = 600;
        config.market.max_price_deviation = UFixed6::new(dec!(0.05));
        config.keeper.settlement_fee = UFixed6::ONE;
        config.keeper.oracle_fee = UFixed6::new(dec!(0.1));
        config
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.market.validate()?;
        self.risk.validate()?;

        if self.keeper.granularity == 0 {
            return Err(ConfigError::InvalidKeeper {
                reason: "granularity must be positive".to_string(),
            });
        }
        if self.keeper.timeout < self.keeper.granularity {
            return Err(ConfigError::InvalidKeeper {
                reason: "timeout shorter than one granule".to_string(),
            });
        }
        if self.keeper.oracle_fee > UFixed6::ONE {
            return Err(ConfigError::InvalidKeeper {
                reason: "oracle fee exceeds 1".to_string(),
            });
        }
        Ok(())
    }
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> SettlementConfig {
        match self {
            Environment::Development => SettlementConfig::development(),
            Environment::Testnet => SettlementConfig::testnet(),
            Environment::Mainnet => SettlementConfig::mainnet_conservative(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_presets() {
        assert!(Environment::Development.config().validate().is_ok());
        assert!(Environment::Testnet.config().validate().is_ok());
        assert!(Environment::Mainnet.config().validate().is_ok());
    }

    #[test]
    fn test_testnet_has_no_maker_fee() {
        let config = SettlementConfig::testnet();
        assert!(config.market.maker_fee.is_zero());
    }

    #[test]
    fn test_invalid_margin() {
        let mut config = SettlementConfig::default();
        config.risk.margin = UFixed6::new(dec!(0.01));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Parameter(ParameterError::InvalidMargin { .. }))
        ));
    }

    #[test]
    fn test_invalid_keeper() {
        let mut config = SettlementConfig::default();
        config.keeper.granularity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidKeeper { .. })
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = SettlementConfig::mainnet_conservative();
        let json = config.to_json().unwrap();
        let back = SettlementConfig::from_json(&json).unwrap();
        assert_eq!(back.name, config.name);
        assert_eq!(back.market, config.market);
        assert_eq!(back.risk, config.risk);
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            SettlementConfig::from_json("{\"name\": 3}"),
            Err(ConfigError::Json(_))
        ));
    }
}
