/// Ratchet invariant enforcement for the trailing stop
///
/// **Core Rule:** a trailing level may tighten, never loosen.
///
/// - Long positions: the level can only rise
/// - Short positions: the level can only fall
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Side;

/// Ratchet state for a trailing stop level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatchetState {
    /// Current level (high-water mark for longs, low-water mark for shorts)
    current_level: Option<Decimal>,

    /// Position side
    side: Side,
}

impl RatchetState {
    /// Create an unarmed ratchet
    pub fn new(side: Side) -> Self {
        Self {
            current_level: None,
            side,
        }
    }

    /// Create a ratchet with an initial level
    pub fn with_initial_level(side: Side, initial_level: Decimal) -> Self {
        Self {
            current_level: Some(initial_level),
            side,
        }
    }

    /// Apply the ratchet to a proposed level and return the resulting level.
    ///
    /// # Rules
    /// - Long: max of current and proposed
    /// - Short: min of current and proposed
    /// - No current level: initializes to proposed
    ///
    /// # Example
    /// ```
    /// use rust_decimal_macros::dec;
    /// use tradesim_core::domain::Side;
    /// use tradesim_core::risk::RatchetState;
    ///
    /// let mut ratchet = RatchetState::with_initial_level(Side::Long, dec!(95));
    ///
    /// // Tightening: 95 → 100 (allowed)
    /// assert_eq!(ratchet.apply(dec!(100)), dec!(100));
    ///
    /// // Loosening: 100 → 90 (blocked, stays at 100)
    /// assert_eq!(ratchet.apply(dec!(90)), dec!(100));
    /// ```
    pub fn apply(&mut self, proposed: Decimal) -> Decimal {
        let ratcheted = match self.current_level {
            None => proposed,
            Some(current) => match self.side {
                Side::Long => current.max(proposed),
                Side::Short => current.min(proposed),
            },
        };
        self.current_level = Some(ratcheted);
        ratcheted
    }

    /// Current level (if armed)
    pub fn current_level(&self) -> Option<Decimal> {
        self.current_level
    }

    pub fn is_armed(&self) -> bool {
        self.current_level.is_some()
    }

    pub fn side(&self) -> Side {
        self.side
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ratchet_long_tightening_allowed() {
        let mut ratchet = RatchetState::with_initial_level(Side::Long, dec!(95));

        let result = ratchet.apply(dec!(100));
        assert_eq!(result, dec!(100));
        assert_eq!(ratchet.current_level(), Some(dec!(100)));
    }

    #[test]
    fn test_ratchet_long_loosening_blocked() {
        let mut ratchet = RatchetState::with_initial_level(Side::Long, dec!(100));

        let result = ratchet.apply(dec!(90));
        assert_eq!(result, dec!(100));
        assert_eq!(ratchet.current_level(), Some(dec!(100)));
    }

    #[test]
    fn test_ratchet_short_tightening_allowed() {
        let mut ratchet = RatchetState::with_initial_level(Side::Short, dec!(105));

        let result = ratchet.apply(dec!(100));
        assert_eq!(result, dec!(100));
    }

    #[test]
    fn test_ratchet_short_loosening_blocked() {
        let mut ratchet = RatchetState::with_initial_level(Side::Short, dec!(100));

        let result = ratchet.apply(dec!(110));
        assert_eq!(result, dec!(100)); // Stays at 100
    }

    #[test]
    fn test_ratchet_initialization() {
        let mut ratchet = RatchetState::new(Side::Long);
        assert!(!ratchet.is_armed());

        // First apply arms the level
        assert_eq!(ratchet.apply(dec!(95)), dec!(95));
        assert!(ratchet.is_armed());
    }
}
