//! Forest motorised track costing
//!
//! A Forest row bills three independent lines, each with GST:
//!   track  = tierPrice(rft, finish) + rft * runnerRate + tapeMeters * tapeRate
//!   motor  = bundle price of the selected motor
//!   remote = price of the selected remote
//!
//! `rft = strict(w / 12)`; tape meters are `strict(strict(w / 21) * 1.38)`.

use serde::{Deserialize, Serialize};

use crate::calculation::{fabric_for_kg, motor_kg, CHANNEL_WIDTH_IN, PANNA_WIDTH_IN};
use crate::model::{Dimensions, QuantityField};
use crate::parse::{lenient_f64, lenient_key, non_negative};
use crate::rounding::strict_threshold;
use crate::tariff::{ForestMotor, ForestRemote, ForestTariff, Runner, Tape, Tariff, TrackFinish};
use crate::totals::GstSplit;

/// Tape meters per panel.
pub const TAPE_METERS_PER_PANEL: f64 = 1.38;

/// Track price for a run of `rft` feet in the given finish.
///
/// The first tier whose upper bound covers `rft` wins; beyond the last tier
/// every extra foot is charged at the finish's excess rate.
pub fn track_price(tariff: &ForestTariff, rft: f64, finish: TrackFinish) -> f64 {
    if rft <= 0.0 || !rft.is_finite() {
        return 0.0;
    }
    if let Some(tier) = tariff.track_tiers.iter().find(|t| rft <= t.max_rft) {
        return tier.prices.get(finish);
    }
    match tariff.track_tiers.last() {
        Some(last) => {
            last.prices.get(finish) + (rft - last.max_rft) * tariff.excess_rates.get(finish)
        }
        None => 0.0,
    }
}

pub fn runner_price(tariff: &ForestTariff, rft: f64, runner: Option<Runner>) -> f64 {
    match runner {
        Some(r) if rft > 0.0 => rft * tariff.runner_rates.get(r),
        _ => 0.0,
    }
}

/// Heading tape meters for a track width in inches.
pub fn tape_meters(width_in: f64) -> f64 {
    let panels = strict_threshold(width_in / PANNA_WIDTH_IN);
    strict_threshold(panels * TAPE_METERS_PER_PANEL)
}

pub fn tape_price(tariff: &ForestTariff, width_in: f64, tape: Option<Tape>) -> f64 {
    match tape {
        Some(t) => tape_meters(width_in) * tariff.tape_rates.get(t),
        None => 0.0,
    }
}

pub fn motor_price(tariff: &ForestTariff, motor: Option<ForestMotor>) -> f64 {
    motor.map_or(0.0, |m| tariff.motor_parts.price(m))
}

pub fn remote_price(tariff: &ForestTariff, remote: Option<ForestRemote>) -> f64 {
    remote.map_or(0.0, |r| tariff.remote_prices.get(r))
}

/// A component price the user may override on a motorised row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PriceField {
    Track,
    Runner,
    Tape,
    Motor,
    Remote,
}

fn default_finish() -> Option<TrackFinish> {
    Some(TrackFinish::White)
}

fn default_runner() -> Option<Runner> {
    Some(Runner::FesBaseFlexHook)
}

fn default_tape() -> Option<Tape> {
    Some(Tape::FlexTapeTransparent)
}

/// Forest (Auto) row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForestCosting {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rft: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub gsm: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fabric_qty: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub motor_kg: f64,

    #[serde(default = "default_finish", deserialize_with = "lenient_key")]
    pub finish: Option<TrackFinish>,
    #[serde(default = "default_runner", deserialize_with = "lenient_key")]
    pub runner: Option<Runner>,
    #[serde(default = "default_tape", deserialize_with = "lenient_key")]
    pub tape: Option<Tape>,
    #[serde(default, deserialize_with = "lenient_key")]
    pub motor: Option<ForestMotor>,
    #[serde(default, deserialize_with = "lenient_key")]
    pub remote: Option<ForestRemote>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub track_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub runner_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tape_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub motor_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub remote_price: f64,

    #[serde(default)]
    pub track_gst: GstSplit,
    #[serde(default)]
    pub motor_gst: GstSplit,
    #[serde(default)]
    pub remote_gst: GstSplit,
}

impl ForestCosting {
    /// A new row: white track, FES runner, flex tape, no motor or remote.
    pub fn new(dims: &Dimensions, gsm: f64, area_name: &str, tariff: &Tariff) -> Self {
        let mut row = Self {
            rft: 0.0,
            gsm,
            fabric_qty: 0.0,
            motor_kg: 0.0,
            finish: default_finish(),
            runner: default_runner(),
            tape: default_tape(),
            motor: None,
            remote: None,
            track_price: 0.0,
            runner_price: 0.0,
            tape_price: 0.0,
            motor_price: 0.0,
            remote_price: 0.0,
            track_gst: GstSplit::default(),
            motor_gst: GstSplit::default(),
            remote_gst: GstSplit::default(),
        };
        row.recompute(dims, area_name, tariff);
        row
    }

    /// Re-derive every price from the measurement and selections.
    pub fn recompute(&mut self, dims: &Dimensions, area_name: &str, tariff: &Tariff) {
        self.motor_price = motor_price(&tariff.forest, self.motor);
        self.remote_price = remote_price(&tariff.forest, self.remote);
        self.apply_dimensions(dims, area_name, tariff);
    }

    /// Re-derive the length-dependent prices; motor and remote are kept.
    pub fn apply_dimensions(&mut self, dims: &Dimensions, area_name: &str, tariff: &Tariff) {
        let width_in = dims.width_in();
        self.rft = strict_threshold(width_in / CHANNEL_WIDTH_IN);
        self.track_price = self.finish.map_or(0.0, |f| track_price(&tariff.forest, self.rft, f));
        self.runner_price = runner_price(&tariff.forest, self.rft, self.runner);
        self.tape_price = if width_in > 0.0 {
            tape_price(&tariff.forest, width_in, self.tape)
        } else {
            0.0
        };
        self.fabric_qty = fabric_for_kg(dims);
        self.motor_kg = motor_kg(self.gsm, self.fabric_qty, area_name);
        self.refresh_gst(tariff.gst_rate);
    }

    pub fn set_finish(&mut self, finish: Option<TrackFinish>, tariff: &Tariff) {
        self.finish = finish;
        self.track_price = finish.map_or(0.0, |f| track_price(&tariff.forest, self.rft, f));
        self.refresh_gst(tariff.gst_rate);
    }

    pub fn set_runner(&mut self, runner: Option<Runner>, tariff: &Tariff) {
        self.runner = runner;
        self.runner_price = runner_price(&tariff.forest, self.rft, runner);
        self.refresh_gst(tariff.gst_rate);
    }

    pub fn set_tape(&mut self, tape: Option<Tape>, dims: &Dimensions, tariff: &Tariff) {
        self.tape = tape;
        self.tape_price = tape_price(&tariff.forest, dims.width_in(), tape);
        self.refresh_gst(tariff.gst_rate);
    }

    pub fn set_motor(&mut self, motor: Option<ForestMotor>, tariff: &Tariff) {
        self.motor = motor;
        self.motor_price = motor_price(&tariff.forest, motor);
        self.refresh_gst(tariff.gst_rate);
    }

    pub fn set_remote(&mut self, remote: Option<ForestRemote>, tariff: &Tariff) {
        self.remote = remote;
        self.remote_price = remote_price(&tariff.forest, remote);
        self.refresh_gst(tariff.gst_rate);
    }

    /// Manual running-feet override; track and runner follow it.
    pub fn set_rft(&mut self, rft: f64, tariff: &Tariff) {
        self.rft = non_negative(rft);
        self.track_price = self.finish.map_or(0.0, |f| track_price(&tariff.forest, self.rft, f));
        self.runner_price = runner_price(&tariff.forest, self.rft, self.runner);
        self.refresh_gst(tariff.gst_rate);
    }

    pub fn set_quantity(&mut self, field: QuantityField, value: f64, tariff: &Tariff) -> bool {
        match field {
            QuantityField::Rft => {
                self.set_rft(value, tariff);
                true
            }
            _ => false,
        }
    }

    /// Manual price override.
    pub fn set_price(&mut self, field: PriceField, value: f64, gst_rate: f64) {
        let slot = match field {
            PriceField::Track => &mut self.track_price,
            PriceField::Runner => &mut self.runner_price,
            PriceField::Tape => &mut self.tape_price,
            PriceField::Motor => &mut self.motor_price,
            PriceField::Remote => &mut self.remote_price,
        };
        *slot = non_negative(value);
        self.refresh_gst(gst_rate);
    }

    pub fn refresh_gst(&mut self, gst_rate: f64) {
        let basic = self.track_price + self.runner_price + self.tape_price;
        self.track_gst = GstSplit::of(basic, gst_rate);
        self.motor_gst = GstSplit::of(self.motor_price, gst_rate);
        self.remote_gst = GstSplit::of(self.remote_price, gst_rate);
    }

    pub fn total(&self) -> f64 {
        self.track_gst.total + self.motor_gst.total + self.remote_gst.total
    }
}
