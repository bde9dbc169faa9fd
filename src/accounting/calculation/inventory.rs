use std::collections::VecDeque;

use crate::accounting::Lot;

/// Cost released by a withdrawal, plus whatever could not be covered.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Withdrawal {
    pub cost: f64,
    pub shortfall: f64,
}

/// Lots of a single symbol, oldest at the front.
#[derive(Clone, Debug)]
pub struct Inventory {
    layers: VecDeque<Lot>,
    precision: f64,
}

impl Inventory {
    pub fn new(precision: f64) -> Inventory {
        Inventory {
            layers: VecDeque::new(),
            precision,
        }
    }

    pub fn deposit(&mut self, lot: Lot) {
        self.layers.push_back(lot);
    }

    pub fn withdraw(&mut self, mut amount_to_withdraw: f64) -> Withdrawal {
        let mut cost = 0f64;

        // withdraw layer by layer, oldest first
        while amount_to_withdraw > self.precision {
            let layer = match self.layers.front_mut() {
                Some(layer) => layer,
                None => break,
            };

            if layer.quantity <= amount_to_withdraw + self.precision {
                // take the whole layer
                cost += layer.total_cost;
                amount_to_withdraw -= layer.quantity;
                self.layers.pop_front();
            } else {
                // take part of the layer, keep the remainder in place
                let removed = layer.cost_per_unit * amount_to_withdraw;
                cost += removed;
                *layer = Lot::new(
                    layer.quantity - amount_to_withdraw,
                    layer.total_cost - removed,
                );
                amount_to_withdraw = 0f64;
            }
        }

        Withdrawal {
            cost,
            shortfall: if amount_to_withdraw > self.precision {
                amount_to_withdraw
            } else {
                0f64
            },
        }
    }

    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.layers.iter()
    }

    pub fn quantity(&self) -> f64 {
        self.layers.iter().map(|lot| lot.quantity).sum()
    }

    pub fn total_cost(&self) -> f64 {
        self.layers.iter().map(|lot| lot.total_cost).sum()
    }
}
