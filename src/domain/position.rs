use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Open holding of a single asset under weighted-average costing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Units still held, always strictly positive while the position exists
    pub quantity: f64,
    /// Blended purchase price of every unit merged into the position
    pub average_unit_cost: f64,
    /// Buy-side commissions paid while this position was open
    pub accumulated_commission: f64,
}

impl Position {
    /// Total cost of the units still held.
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.average_unit_cost
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PositionError {
    #[error("combined quantity {0} is not a positive finite number")]
    InvalidQuantity(f64),

    #[error("average unit cost {0} is not finite")]
    InvalidAverageCost(f64),

    #[error("realized profit {0} is not finite")]
    InvalidProfit(f64),
}

/// Asset -> open position map. Entries are removed as soon as they are fully disposed of.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionBook {
    positions: BTreeMap<String, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, asset: &str) -> Option<&Position> {
        self.positions.get(asset)
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.positions.contains_key(asset)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Position)> {
        self.positions.iter()
    }

    /// Sum of the cost basis of every open position.
    pub fn cost_basis_total(&self) -> f64 {
        self.positions.values().map(Position::cost_basis).sum()
    }

    /// Add purchased units to an asset, re-weighting its average cost.
    ///
    /// A first purchase of zero units opens nothing. Returns the position as it
    /// stands afterwards, if one is open.
    pub fn acquire(
        &mut self,
        asset: &str,
        quantity: f64,
        unit_price: f64,
        commission: f64,
    ) -> Result<Option<&Position>, PositionError> {
        let merged = match self.positions.get(asset) {
            Some(open) => {
                let total_quantity = open.quantity + quantity;
                if !(total_quantity > 0.0 && total_quantity.is_finite()) {
                    return Err(PositionError::InvalidQuantity(total_quantity));
                }
                let total_spent = open.quantity * open.average_unit_cost + quantity * unit_price;
                Position {
                    quantity: total_quantity,
                    average_unit_cost: total_spent / total_quantity,
                    accumulated_commission: open.accumulated_commission + commission,
                }
            }
            None if quantity == 0.0 => return Ok(None),
            None => {
                if !(quantity > 0.0 && quantity.is_finite()) {
                    return Err(PositionError::InvalidQuantity(quantity));
                }
                Position {
                    quantity,
                    average_unit_cost: unit_price,
                    accumulated_commission: commission,
                }
            }
        };

        if !merged.average_unit_cost.is_finite() {
            return Err(PositionError::InvalidAverageCost(merged.average_unit_cost));
        }

        self.positions.insert(asset.to_string(), merged);
        Ok(self.positions.get(asset))
    }

    /// Remove sold units from an asset. The average cost is left as is.
    ///
    /// When nothing is left (or the sale overshoots) the position is dropped
    /// and any shortfall is discarded. Returns true if the position was closed.
    pub fn reduce(&mut self, asset: &str, quantity: f64) -> bool {
        let Some(position) = self.positions.get_mut(asset) else {
            return false;
        };

        position.quantity -= quantity;
        if position.quantity <= 0.0 {
            self.positions.remove(asset);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_acquire_opens_position() {
        let mut book = PositionBook::new();
        let position = *book.acquire("BTC", 10.0, 100.0, 5.0).unwrap().unwrap();

        assert_eq!(position.quantity, 10.0);
        assert_eq!(position.average_unit_cost, 100.0);
        assert_eq!(position.accumulated_commission, 5.0);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_acquire_weights_average_cost() {
        let mut book = PositionBook::new();
        book.acquire("ETH", 3.0, 10.0, 1.0).unwrap();
        let position = *book.acquire("ETH", 1.0, 30.0, 2.0).unwrap().unwrap();

        let expected = (3.0 * 10.0 + 1.0 * 30.0) / 4.0;
        assert!((position.average_unit_cost - expected).abs() < 1e-12);
        assert_eq!(position.quantity, 4.0);
        assert_eq!(position.accumulated_commission, 3.0);
    }

    #[test]
    fn test_zero_quantity_first_acquire_opens_nothing() {
        let mut book = PositionBook::new();
        assert!(book.acquire("XRP", 0.0, 500.0, 0.0).unwrap().is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn test_non_finite_average_is_rejected() {
        let mut book = PositionBook::new();
        book.acquire("BTC", 1.0, 100.0, 0.0).unwrap();

        let result = book.acquire("BTC", 1.0, f64::INFINITY, 0.0);
        assert!(matches!(result, Err(PositionError::InvalidAverageCost(_))));
        // Failed merges leave the position untouched
        assert_eq!(book.get("BTC").unwrap().average_unit_cost, 100.0);
    }

    #[test]
    fn test_non_finite_quantity_is_rejected() {
        let mut book = PositionBook::new();
        let result = book.acquire("BTC", f64::INFINITY, 1.0, 0.0);
        assert!(matches!(result, Err(PositionError::InvalidQuantity(_))));
        assert!(book.is_empty());
    }

    #[test]
    fn test_reduce_keeps_average_and_closes_at_zero() {
        let mut book = PositionBook::new();
        book.acquire("SOL", 4.0, 20.0, 0.0).unwrap();

        assert!(!book.reduce("SOL", 1.5));
        let position = book.get("SOL").unwrap();
        assert_eq!(position.quantity, 2.5);
        assert_eq!(position.average_unit_cost, 20.0);

        assert!(book.reduce("SOL", 2.5));
        assert!(!book.contains("SOL"));
    }

    #[test]
    fn test_reduce_overshoot_discards_shortfall() {
        let mut book = PositionBook::new();
        book.acquire("SOL", 1.0, 20.0, 0.0).unwrap();

        assert!(book.reduce("SOL", 3.0));
        assert!(book.is_empty());
        assert!(!book.reduce("SOL", 1.0));
    }

    #[test]
    fn test_cost_basis_total() {
        let mut book = PositionBook::new();
        book.acquire("A", 2.0, 10.0, 0.0).unwrap();
        book.acquire("B", 3.0, 5.0, 0.0).unwrap();
        assert_eq!(book.cost_basis_total(), 35.0);
    }
}
