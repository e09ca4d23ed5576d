use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// A demand unit: `demand` pieces of width `width` have to be cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    /// Resource consumption of one piece.
    pub width: usize,
    /// Minimum number of pieces the master has to cover.
    pub demand: usize,
}

/// Input of a cutting-stock problem: stock rolls of width `capacity` are cut into items.
///
/// Validated on construction, so every instance in circulation has
/// - at least one item,
/// - as many demands as widths,
/// - a positive capacity,
/// - positive widths that fit into a roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawInstance", into = "RawInstance")]
pub struct CuttingStockInstance {
    items: Vec<Item>,
    capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInstance {
    widths: Vec<usize>,
    demands: Vec<usize>,
    capacity: usize,
}

impl CuttingStockInstance {
    /// Creates a validated instance.
    ///
    /// # Arguments
    ///
    /// * `widths` - Width of each item type.
    /// * `demands` - Demand of each item type, in the same order as `widths`.
    /// * `capacity` - Width of a stock roll.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the data violates one of the rules listed on the type.
    pub fn new(widths: &[usize], demands: &[usize], capacity: usize) -> Result<Self> {
        if widths.len() != demands.len() {
            return Err(Error::InvalidInput(format!(
                "{} widths but {} demands",
                widths.len(),
                demands.len()
            )));
        }
        if widths.is_empty() {
            return Err(Error::InvalidInput("instance has no items".to_string()));
        }
        if capacity == 0 {
            return Err(Error::InvalidInput("capacity must be positive".to_string()));
        }
        if let Some(i) = widths.iter().position(|&w| w == 0 || w > capacity) {
            return Err(Error::InvalidInput(format!(
                "item {i} has width {} which does not lie in 1..={capacity}",
                widths[i]
            )));
        }

        let items = widths
            .iter()
            .zip(demands)
            .map(|(&width, &demand)| Item { width, demand })
            .collect();
        Ok(CuttingStockInstance { items, capacity })
    }

    /// Decodes and validates an instance from a JSON document of the form
    /// `{"widths": [..], "demands": [..], "capacity": ..}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Like [`CuttingStockInstance::from_json_str`], reading from any `Read` source.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Returns the items in input order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns the number of item types.
    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    /// Returns the stock roll width.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the item widths in input order.
    pub fn widths(&self) -> Vec<usize> {
        self.items.iter().map(|item| item.width).collect()
    }

    /// Returns `Σ width_i * demand_i / capacity`, the material bound no cutting plan can beat.
    pub fn material_lower_bound(&self) -> f64 {
        let material: usize = self.items.iter().map(|i| i.width * i.demand).sum();
        material as f64 / self.capacity as f64
    }
}

impl TryFrom<RawInstance> for CuttingStockInstance {
    type Error = Error;

    fn try_from(raw: RawInstance) -> Result<Self> {
        CuttingStockInstance::new(&raw.widths, &raw.demands, raw.capacity)
    }
}

impl From<CuttingStockInstance> for RawInstance {
    fn from(instance: CuttingStockInstance) -> Self {
        RawInstance {
            widths: instance.widths(),
            demands: instance.items.iter().map(|item| item.demand).collect(),
            capacity: instance.capacity,
        }
    }
}
