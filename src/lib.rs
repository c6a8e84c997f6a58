//! costing-core: curtain, blind and track quotation core library
//!
//! This crate provides the measurement-to-cost calculation shared between
//! native callers and the TypeScript web front end: unit conversion,
//! rounding policies, per-category quantity calculators, tariff lookups,
//! totals and the deep-costing session.
//!
//! Compiles to both native (rlib) and WebAssembly (cdylib via wasm-pack).

pub mod error;
pub mod units;
pub mod rounding;
pub mod tariff;
pub mod model;
pub mod parse;
pub mod calculation;
pub mod forest;
pub mod somfy;
pub mod totals;
pub mod validation;
pub mod pipeline;

// Re-exports for convenience
pub use error::{StoreError, TariffError};
pub use units::{from_inches, to_inches, to_meters, Unit};
pub use rounding::{minimum_floor, quarter_step, round2, strict_threshold};
pub use tariff::{CatalogKey, Tariff, TARIFF};
pub use model::{
    CalculationRow, Category, CategorySet, Costing, Dimensions, FabricCosting, LineItem,
    QuantityField, RateField, RowKey, Toggle, Variant,
};
pub use calculation::{blinds, fabric_for_kg, local, motor_kg, roman, LocalOptions};
pub use forest::{track_price, ForestCosting, PriceField};
pub use somfy::{GpwCosting, SomfyCosting};
pub use totals::{category_total, grand_total, row_total, GstSplit};
pub use validation::{validate_line_item, validate_line_items, ValidationIssue};
pub use pipeline::{CalculationStore, CostingSession, Edit, SavePayload};
