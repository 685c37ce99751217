//! Position registry.
//!
//! Sole owner of the pool's [`Position`] records. Enforces the fixed cohort
//! size, dense 0-indexed ids and one seat per owner.

use serde::{Deserialize, Serialize};
use spiral_pool_core::{Address, Amount, PoolError, Position, PositionId, Rate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRegistry {
    total_positions: u32,
    total_cycles: u32,
    positions: Vec<Position>,
}

impl PositionRegistry {
    #[must_use]
    pub fn new(total_positions: u32, total_cycles: u32) -> Self {
        Self {
            total_positions,
            total_cycles,
            positions: Vec::with_capacity(total_positions as usize),
        }
    }

    /// Seats a new position and returns its id.
    ///
    /// # Errors
    ///
    /// - [`PoolError::CohortFull`] when every seat is taken
    /// - [`PoolError::AlreadyActed`] when `owner` already holds a position
    pub fn register(
        &mut self,
        owner: Address,
        amount_collateral: Amount,
        join_rate: Rate,
    ) -> Result<PositionId, PoolError> {
        if self.is_full() {
            return Err(PoolError::CohortFull {
                total_positions: self.total_positions,
            });
        }
        if let Some(existing) = self.find_by_owner(&owner) {
            return Err(PoolError::already_acted(
                "join",
                format!("{owner} already holds position {}", existing.id),
            ));
        }

        let id = self.filled();
        self.positions.push(Position::new(
            id,
            owner,
            amount_collateral,
            join_rate,
            self.total_cycles,
        ));
        Ok(id)
    }

    /// Number of seats taken.
    #[must_use]
    pub fn filled(&self) -> u32 {
        u32::try_from(self.positions.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.filled() >= self.total_positions
    }

    #[must_use]
    pub fn find_by_owner(&self, owner: &Address) -> Option<&Position> {
        self.positions.iter().find(|p| &p.owner == owner)
    }

    /// # Errors
    ///
    /// Returns [`PoolError::UnknownPosition`] for ids that were never assigned.
    pub fn get(&self, position_id: PositionId) -> Result<&Position, PoolError> {
        self.positions
            .get(position_id as usize)
            .ok_or(PoolError::UnknownPosition { position_id })
    }

    /// # Errors
    ///
    /// Returns [`PoolError::UnknownPosition`] for ids that were never assigned.
    pub fn get_mut(&mut self, position_id: PositionId) -> Result<&mut Position, PoolError> {
        self.positions
            .get_mut(position_id as usize)
            .ok_or(PoolError::UnknownPosition { position_id })
    }

    #[must_use]
    pub fn all(&self) -> &[Position] {
        &self.positions
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Position> {
        self.positions.iter_mut()
    }

    /// Positions that have neither won nor been redeemed, in id order.
    pub fn active(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PositionRegistry {
        PositionRegistry::new(2, 2)
    }

    #[test]
    fn ids_are_dense_in_join_order() {
        let mut reg = registry();
        assert_eq!(reg.register(Address::from("a"), 10, Rate::ONE).unwrap(), 0);
        assert_eq!(reg.register(Address::from("b"), 10, Rate::ONE).unwrap(), 1);
        assert_eq!(reg.filled(), 2);
        assert!(reg.is_full());
    }

    #[test]
    fn full_cohort_rejects_join() {
        let mut reg = registry();
        reg.register(Address::from("a"), 10, Rate::ONE).unwrap();
        reg.register(Address::from("b"), 10, Rate::ONE).unwrap();
        assert_eq!(
            reg.register(Address::from("c"), 10, Rate::ONE),
            Err(PoolError::CohortFull { total_positions: 2 })
        );
    }

    #[test]
    fn owner_cannot_take_two_seats() {
        let mut reg = registry();
        reg.register(Address::from("a"), 10, Rate::ONE).unwrap();
        assert!(matches!(
            reg.register(Address::from("a"), 10, Rate::ONE),
            Err(PoolError::AlreadyActed { .. })
        ));
        assert_eq!(reg.filled(), 1);
    }

    #[test]
    fn unknown_id_is_reported() {
        let reg = registry();
        assert_eq!(
            reg.get(5).unwrap_err(),
            PoolError::UnknownPosition { position_id: 5 }
        );
    }

    #[test]
    fn active_skips_winners() {
        let mut reg = registry();
        reg.register(Address::from("a"), 10, Rate::ONE).unwrap();
        reg.register(Address::from("b"), 10, Rate::ONE).unwrap();
        reg.get_mut(0).unwrap().assign_win(1).unwrap();
        let active: Vec<_> = reg.active().map(|p| p.id).collect();
        assert_eq!(active, vec![1]);
    }
}
