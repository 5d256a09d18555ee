use std::collections::VecDeque;

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::FifoError;

/// An open purchase lot.
#[derive(Clone, Debug, Getters, PartialEq)]
pub struct Lot {
    quantity: Decimal,
    price: Decimal,
    unit_cost: Decimal,
    cost: Decimal,
    date: NaiveDateTime,
}

/// Result of matching a sale against the open lots.
#[derive(Clone, Copy, Debug, Default, Getters, PartialEq, new)]
pub struct SellOutcome {
    cost_basis: Decimal,
    consumed: Decimal,
    shortfall: Decimal,
}

impl SellOutcome {
    pub fn is_oversell(&self) -> bool {
        self.shortfall > Decimal::ZERO
    }
}

#[derive(Clone, Debug, Getters, PartialEq, Serialize, new)]
pub struct Position {
    quantity: Decimal,
    total_cost: Decimal,
    average_buy_price: Decimal,
    first_purchase_date: Option<NaiveDateTime>,
    last_transaction_date: Option<NaiveDateTime>,
}

/// FIFO lot matching for a single (account, asset) pair. Lots are consumed
/// strictly in insertion order, so callers must feed transactions already
/// sorted by date with a stable tie-break.
#[derive(Clone, Debug, Default)]
pub struct FifoCalculator {
    lots: VecDeque<Lot>,
    last_transaction_date: Option<NaiveDateTime>,
}

impl FifoCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lots(&self) -> &VecDeque<Lot> {
        &self.lots
    }

    pub fn add_buy(
        &mut self,
        date: NaiveDateTime,
        quantity: Decimal,
        price: Decimal,
        total_cost: Decimal,
    ) -> Result<(), FifoError> {
        if quantity <= Decimal::ZERO {
            return Err(FifoError::NonPositiveQuantity(quantity));
        }

        let unit_cost = total_cost.checked_div(quantity).ok_or(FifoError::Overflow)?;
        // Open totals must stay representable; sells only ever shrink them
        let open_totals = self.lots.iter().try_fold((quantity, total_cost), |(held, cost), lot| {
            Some((held.checked_add(lot.quantity)?, cost.checked_add(lot.cost)?))
        });
        if open_totals.is_none() {
            return Err(FifoError::Overflow);
        }

        self.lots.push_back(Lot {
            quantity,
            price,
            unit_cost,
            cost: total_cost,
            date,
        });
        self.touch(date);

        Ok(())
    }

    /// Units received at no cost. They dilute the average buy price.
    pub fn add_reward(&mut self, date: NaiveDateTime, quantity: Decimal) -> Result<(), FifoError> {
        self.add_buy(date, quantity, Decimal::ZERO, Decimal::ZERO)
    }

    /// Removes `quantity` units from the oldest lots and returns the cost
    /// basis taken out. Selling more than is held consumes everything and
    /// reports the remainder as shortfall.
    pub fn add_sell(&mut self, quantity: Decimal, date: NaiveDateTime) -> SellOutcome {
        let mut remaining = quantity.abs();
        let mut cost_basis = Decimal::ZERO;
        let mut consumed = Decimal::ZERO;

        while remaining > Decimal::ZERO {
            let Some(lot) = self.lots.front_mut() else {
                break;
            };

            if lot.quantity <= remaining {
                remaining -= lot.quantity;
                consumed += lot.quantity;
                cost_basis += lot.cost;
                self.lots.pop_front();
            } else {
                // Partial lot: take cost at unit cost, keep the residue on the lot
                let taken = lot.unit_cost * remaining;
                lot.quantity -= remaining;
                lot.cost -= taken;
                consumed += remaining;
                cost_basis += taken;
                remaining = Decimal::ZERO;
            }
        }

        self.touch(date);

        SellOutcome::new(cost_basis, consumed, remaining)
    }

    pub fn get_current_position(&self) -> Position {
        let quantity = self
            .lots
            .iter()
            .fold(Decimal::ZERO, |sum, lot| sum + lot.quantity);
        let total_cost = self
            .lots
            .iter()
            .fold(Decimal::ZERO, |sum, lot| sum + lot.cost);
        let average_buy_price = if quantity.is_zero() {
            Decimal::ZERO
        } else {
            total_cost / quantity
        };
        let first_purchase_date = self.lots.iter().map(|lot| lot.date).min();

        Position::new(
            quantity,
            total_cost,
            average_buy_price,
            first_purchase_date,
            self.last_transaction_date,
        )
    }

    fn touch(&mut self, date: NaiveDateTime) {
        self.last_transaction_date = Some(match self.last_transaction_date {
            Some(last) if last > date => last,
            _ => date,
        });
    }
}
