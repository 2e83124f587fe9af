//! Stop-loss price calculation.
//!
//! The stop price is derived from the entry price by one of three modes,
//! aligned to the tick grid, and the trigger sits a fixed number of ticks
//! above it (a SELL stop triggers first as price falls).

use crate::error::{RiskError, RiskResult};
use riskctl_core::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the stop-loss parameter is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopLossMode {
    /// Percent below entry.
    Percentage,
    /// Absolute price points below entry.
    Points,
    /// Total loss budget for the whole quantity.
    Price,
}

impl FromStr for StopLossMode {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percentage" => Ok(Self::Percentage),
            "points" => Ok(Self::Points),
            "price" => Ok(Self::Price),
            other => Err(RiskError::InvalidConfiguration(format!(
                "unknown stop-loss mode: {other:?}"
            ))),
        }
    }
}

impl fmt::Display for StopLossMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentage => write!(f, "percentage"),
            Self::Points => write!(f, "points"),
            Self::Price => write!(f, "price"),
        }
    }
}

/// Tick grid and trigger offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopLossConfig {
    #[serde(default = "default_tick_size")]
    pub tick_size: Decimal,
    #[serde(default = "default_trigger_offset_ticks")]
    pub trigger_offset_ticks: u32,
}

fn default_tick_size() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn default_trigger_offset_ticks() -> u32 {
    20
}

impl Default for StopLossConfig {
    fn default() -> Self {
        Self {
            tick_size: default_tick_size(),
            trigger_offset_ticks: default_trigger_offset_ticks(),
        }
    }
}

/// Calculated protective levels, both tick-aligned and rounded to 2 dp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopLossLevels {
    pub stop_price: Price,
    pub trigger_price: Price,
}

/// Deterministic stop-loss calculator.
#[derive(Debug, Clone)]
pub struct StopLossCalculator {
    tick: Price,
    trigger_offset: Price,
}

impl StopLossCalculator {
    /// Rejects a zero or negative tick size.
    pub fn new(config: &StopLossConfig) -> RiskResult<Self> {
        if config.tick_size <= Decimal::ZERO {
            return Err(RiskError::InvalidConfiguration(format!(
                "tick size must be positive, got {}",
                config.tick_size
            )));
        }
        let tick = Price::new(config.tick_size);
        Ok(Self {
            tick,
            trigger_offset: tick * Decimal::from(config.trigger_offset_ticks),
        })
    }

    #[inline]
    pub fn tick(&self) -> Price {
        self.tick
    }

    /// Parse `mode` and calculate. Unknown modes fail with `InvalidConfiguration`.
    pub fn calculate_str(
        &self,
        entry: Price,
        parameter: Decimal,
        mode: &str,
        quantity: u32,
    ) -> RiskResult<StopLossLevels> {
        let mode: StopLossMode = mode.parse()?;
        self.calculate(entry, parameter, mode, quantity)
    }

    pub fn calculate(
        &self,
        entry: Price,
        parameter: Decimal,
        mode: StopLossMode,
        quantity: u32,
    ) -> RiskResult<StopLossLevels> {
        if !entry.is_positive() {
            return Err(RiskError::InvalidInput(format!(
                "entry price must be positive, got {entry}"
            )));
        }
        if parameter.is_sign_negative() && !parameter.is_zero() {
            return Err(RiskError::InvalidInput(format!(
                "stop-loss parameter must not be negative, got {parameter}"
            )));
        }

        let raw_stop = match mode {
            StopLossMode::Percentage => {
                entry * (Decimal::ONE - parameter / Decimal::ONE_HUNDRED)
            }
            StopLossMode::Points => Price::new(entry.inner() - parameter),
            StopLossMode::Price => {
                if quantity == 0 {
                    return Err(RiskError::InvalidInput(
                        "quantity must be non-zero in price mode".to_string(),
                    ));
                }
                let per_unit_loss = (parameter / Decimal::from(quantity)).floor();
                Price::new(entry.inner() - per_unit_loss)
            }
        };

        let aligned = raw_stop.round_to_tick(self.tick);
        if !aligned.is_positive() {
            return Err(RiskError::InvalidInput(format!(
                "stop price {aligned} is not positive (entry {entry}, {mode} {parameter})"
            )));
        }

        Ok(StopLossLevels {
            stop_price: aligned.round_dp(2),
            trigger_price: (aligned + self.trigger_offset).round_dp(2),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn calculator() -> StopLossCalculator {
        StopLossCalculator::new(&StopLossConfig::default()).unwrap()
    }

    fn price(d: Decimal) -> Price {
        Price::new(d)
    }

    #[test]
    fn test_percentage_mode() {
        let levels = calculator()
            .calculate(price(dec!(100.00)), dec!(2), StopLossMode::Percentage, 10)
            .unwrap();

        assert_eq!(levels.stop_price.inner(), dec!(98.00));
        assert_eq!(levels.trigger_price.inner(), dec!(99.00));
    }

    #[test]
    fn test_points_mode() {
        let levels = calculator()
            .calculate(price(dec!(250.40)), dec!(7.5), StopLossMode::Points, 25)
            .unwrap();

        assert_eq!(levels.stop_price.inner(), dec!(242.90));
        assert_eq!(levels.trigger_price.inner(), dec!(243.90));
    }

    #[test]
    fn test_price_mode_divides_budget_by_quantity() {
        let levels = calculator()
            .calculate(price(dec!(100.00)), dec!(50), StopLossMode::Price, 10)
            .unwrap();

        assert_eq!(levels.stop_price.inner(), dec!(95.00));
        assert_eq!(levels.trigger_price.inner(), dec!(96.00));
    }

    #[test]
    fn test_price_mode_floors_per_unit_loss() {
        // 50 / 15 = 3.33 -> 3
        let levels = calculator()
            .calculate(price(dec!(100.00)), dec!(50), StopLossMode::Price, 15)
            .unwrap();

        assert_eq!(levels.stop_price.inner(), dec!(97.00));
    }

    #[test]
    fn test_price_mode_zero_quantity_is_invalid_input() {
        let result = calculator().calculate(price(dec!(100)), dec!(50), StopLossMode::Price, 0);
        assert!(matches!(result, Err(RiskError::InvalidInput(_))));
    }

    #[test]
    fn test_unknown_mode_is_invalid_configuration() {
        let result = calculator().calculate_str(price(dec!(100)), dec!(2), "trailing", 10);
        assert!(matches!(result, Err(RiskError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_stop_is_tick_aligned() {
        // 101.37 * 0.98 = 99.3426 -> 99.35
        let levels = calculator()
            .calculate(price(dec!(101.37)), dec!(2), StopLossMode::Percentage, 1)
            .unwrap();

        assert_eq!(levels.stop_price.inner(), dec!(99.35));
        assert_eq!(levels.trigger_price.inner(), dec!(100.35));
    }

    #[test]
    fn test_deterministic() {
        let calc = calculator();
        let a = calc
            .calculate(price(dec!(412.85)), dec!(1.5), StopLossMode::Percentage, 3)
            .unwrap();
        let b = calc
            .calculate(price(dec!(412.85)), dec!(1.5), StopLossMode::Percentage, 3)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_tick_rejected() {
        let config = StopLossConfig {
            tick_size: Decimal::ZERO,
            trigger_offset_ticks: 20,
        };
        assert!(matches!(
            StopLossCalculator::new(&config),
            Err(RiskError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_stop_below_zero_rejected() {
        let result =
            calculator().calculate(price(dec!(10.00)), dec!(15), StopLossMode::Points, 1);
        assert!(matches!(result, Err(RiskError::InvalidInput(_))));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Percentage".parse::<StopLossMode>().unwrap(), StopLossMode::Percentage);
        assert_eq!(" points ".parse::<StopLossMode>().unwrap(), StopLossMode::Points);
        assert_eq!("price".parse::<StopLossMode>().unwrap(), StopLossMode::Price);
    }
}
