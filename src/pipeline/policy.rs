use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Money, SellerId};

/// Bound violated by a proposed price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitBound {
    Min,
    Max,
}

impl LimitBound {
    pub const fn label(self) -> &'static str {
        match self {
            LimitBound::Min => "min",
            LimitBound::Max => "max",
        }
    }
}

/// Rejection detail returned when a price falls outside a seller's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("price {offered} violates the configured {} bound of {limit}", bound.label())]
pub struct LimitViolation {
    pub bound: LimitBound,
    pub limit: Money,
    pub offered: Money,
}

/// Outcome of a value-limit consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    Accepted,
    Rejected(LimitViolation),
}

/// Allowed price window for a course category; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueBounds {
    pub min: Option<Money>,
    pub max: Option<Money>,
}

impl ValueBounds {
    pub const fn between(min: Money, max: Money) -> Self {
        ValueBounds {
            min: Some(min),
            max: Some(max),
        }
    }

    fn check(&self, offered: Money) -> Result<(), LimitViolation> {
        if let Some(min) = self.min {
            if offered < min {
                return Err(LimitViolation {
                    bound: LimitBound::Min,
                    limit: min,
                    offered,
                });
            }
        }
        if let Some(max) = self.max {
            if offered > max {
                return Err(LimitViolation {
                    bound: LimitBound::Max,
                    limit: max,
                    offered,
                });
            }
        }
        Ok(())
    }
}

/// Per-seller pricing policy: category windows with a global fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerLimits {
    pub seller_id: SellerId,
    pub global: ValueBounds,
    pub categories: BTreeMap<String, ValueBounds>,
}

impl SellerLimits {
    pub fn new(seller_id: SellerId) -> Self {
        SellerLimits {
            seller_id,
            global: ValueBounds::default(),
            categories: BTreeMap::new(),
        }
    }

    pub fn with_global(mut self, bounds: ValueBounds) -> Self {
        self.global = bounds;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>, bounds: ValueBounds) -> Self {
        self.categories.insert(category.into(), bounds);
        self
    }

    /// Category-specific window when configured, otherwise the seller's
    /// global window.
    fn bounds_for(&self, category: Option<&str>) -> ValueBounds {
        category
            .and_then(|name| self.categories.get(name).copied())
            .unwrap_or(self.global)
    }

    /// Pure consultation: no side effects, safe from any call site.
    pub fn check(&self, category: Option<&str>, offered: Money) -> Result<(), LimitViolation> {
        self.bounds_for(category).check(offered)
    }
}

/// Catalogue of seller limit configurations, owned by sales administration
/// and consulted read-only here.
#[derive(Debug, Clone, Default)]
pub struct LimitCatalogue {
    sellers: BTreeMap<SellerId, SellerLimits>,
}

impl LimitCatalogue {
    pub fn with_seller(mut self, limits: SellerLimits) -> Self {
        self.sellers.insert(limits.seller_id.clone(), limits);
        self
    }

    pub fn seller(&self, id: &SellerId) -> Option<&SellerLimits> {
        self.sellers.get(id)
    }
}
