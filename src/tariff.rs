//! tariff.json parser and typed price tables
//!
//! Embeds tariff.json at compile time via `include_str!` and provides the
//! single source of truth for every price the calculators consult: Forest
//! track tiers, runner/tape rates, motor and remote catalogs, GPW rates,
//! Somfy brackets and the default rates of newly created rows.
//!
//! Catalogs with a fixed set of options are keyed by enums and stored as
//! structs with one field per option, so every lookup is an exhaustive
//! `match`. Only the Somfy SKU catalogs stay as lists keyed by vendor code.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TariffError};
use crate::model::{BlindsRates, FabricRates};

/// Raw JSON embedded at compile time
const TARIFF_JSON: &str = include_str!("../tariff.json");

/// Parsed tariff.json (singleton)
pub static TARIFF: LazyLock<Tariff> = LazyLock::new(|| {
    Tariff::from_json(TARIFF_JSON).expect("Failed to parse embedded tariff.json")
});

// ─── Catalog keys ────────────────────────────────────────────────────

/// An option of a closed catalog, persisted by its string id.
pub trait CatalogKey: Sized + Copy + 'static {
    /// Resolve a persisted id (trimmed, case-insensitive, legacy aliases).
    fn from_id(id: &str) -> Option<Self>;
    /// Id written back when a row is saved.
    fn id(&self) -> &'static str;
}

macro_rules! catalog_key {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $id:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl $crate::tariff::CatalogKey for $name {
            fn from_id(id: &str) -> Option<Self> {
                let id = id.trim();
                $(
                    if id.eq_ignore_ascii_case($id) $(|| id.eq_ignore_ascii_case($alias))* {
                        return Some($name::$variant);
                    }
                )+
                None
            }

            fn id(&self) -> &'static str {
                match self {
                    $($name::$variant => $id),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::tariff::CatalogKey::id(self))
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(
                &self,
                serializer: S,
            ) -> ::std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str($crate::tariff::CatalogKey::id(self))
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> ::std::result::Result<Self, D::Error> {
                let raw = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                <$name as $crate::tariff::CatalogKey>::from_id(&raw).ok_or_else(|| {
                    <D::Error as ::serde::de::Error>::custom(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        raw
                    ))
                })
            }
        }
    };
}
pub(crate) use catalog_key;

catalog_key! {
    /// Forest track finish.
    TrackFinish {
        White => "white",
        Black => "black",
        FmsPlus => "fmsPlus",
        FmsPlusRecessWhite => "fmsPlusRecessWhite" | "fmsPlusConceal",
        FmsPlusRecessBlack => "fmsPlusRecessBlack",
        DsXlLed => "dsXlLed",
        Dual => "dual",
    }
}

catalog_key! {
    /// Forest runner and hook set, priced per running foot.
    Runner {
        FesBaseFlexHook => "FES BASE AND FLEX HOOK",
        EasyWaveEndHook => "EASY WAVE AND END HOOK",
        EasyWaveWaveHook => "EASY WAVE AND WAVE HOOK",
        FesBaseSnap => "FES BASE AND SNAP",
    }
}

catalog_key! {
    /// Forest heading tape, priced per meter.
    Tape {
        FlexTapeTransparent => "FLEX TAPE TRANSPARENT",
        EasyFoldTapeWhite => "EASY FOLD TAPE WHITE",
    }
}

catalog_key! {
    /// Forest motor bundle.
    ForestMotor {
        MStd => "m_std",
        MAuto => "m_auto",
        LWhiteStd => "l_white_std",
        LWhiteAuto => "l_white_auto",
        LBlackStd => "l_black_std",
        LBlackAuto => "l_black_auto",
        AcMotor => "ac_motor",
        IonMotor => "ion_motor",
    }
}

catalog_key! {
    /// Forest remote or controller.
    ForestRemote {
        EasyTouch6 => "easy_touch_6",
        Diamond => "diamond",
        WallSwitch2 => "wall_switch_2",
        WifiDongle => "wifi_dongle",
        AcControl => "ac_control",
    }
}

catalog_key! {
    /// GPW channel family.
    GpwType {
        Gravel => "Gravel",
        Pulse => "Pulse",
        Weave => "Weave",
    }
}

catalog_key! {
    /// Somfy track profile.
    SomfyTrack {
        Ripple => "Ripple",
        Traditional => "Traditional",
    }
}

catalog_key! {
    /// Somfy track duty rating.
    SomfyDuty {
        Medium => "Medium",
        Heavy => "Heavy",
        Silent => "Silent",
    }
}

impl ForestMotor {
    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            ForestMotor::MStd => "Shuttle 'M' 70 KG (Std)",
            ForestMotor::MAuto => "Shuttle 'M' 70 KG (Auto)",
            ForestMotor::LWhiteStd => "Shuttle 'L' White 40 KG (Std)",
            ForestMotor::LWhiteAuto => "Shuttle 'L' White 40 KG (Auto)",
            ForestMotor::LBlackStd => "Shuttle 'L' Black 40 KG (Std)",
            ForestMotor::LBlackAuto => "Shuttle 'L' Black 40 KG (Auto)",
            ForestMotor::AcMotor => "Shuttle AC Motor (Bundle)",
            ForestMotor::IonMotor => "Shuttle 'ION' (Battery)",
        }
    }
}

impl ForestRemote {
    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            ForestRemote::EasyTouch6 => "Easy Touch (6 Ch)",
            ForestRemote::Diamond => "Diamond Sense",
            ForestRemote::WallSwitch2 => "Wall Switch (2 Ch)",
            ForestRemote::WifiDongle => "Wifi Dongle",
            ForestRemote::AcControl => "AC Control Set",
        }
    }
}

// ─── Tables ──────────────────────────────────────────────────────────

/// Top-level tariff
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Tariff {
    pub version: String,
    /// GST multiplier added to motorised subtotals (0.18)
    pub gst_rate: f64,
    pub forest: ForestTariff,
    pub gpw: GpwTariff,
    pub somfy: SomfyTariff,
    pub default_rates: DefaultRates,
}

/// Forest track, runner, tape, motor and remote prices
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ForestTariff {
    pub track_tiers: Vec<TrackPricingTier>,
    /// Per-foot rate beyond the last tier
    pub excess_rates: FinishPrices,
    pub runner_rates: RunnerRates,
    pub tape_rates: TapeRates,
    pub motor_parts: MotorParts,
    pub remote_prices: RemotePrices,
}

/// One RFT range of the Forest track table
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TrackPricingTier {
    pub label: String,
    /// Inclusive upper bound in running feet
    pub max_rft: f64,
    pub prices: FinishPrices,
}

/// A price per track finish
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct FinishPrices {
    pub white: f64,
    pub black: f64,
    pub fms_plus: f64,
    pub fms_plus_recess_white: f64,
    pub fms_plus_recess_black: f64,
    pub ds_xl_led: f64,
    pub dual: f64,
}

impl FinishPrices {
    pub fn get(&self, finish: TrackFinish) -> f64 {
        match finish {
            TrackFinish::White => self.white,
            TrackFinish::Black => self.black,
            TrackFinish::FmsPlus => self.fms_plus,
            TrackFinish::FmsPlusRecessWhite => self.fms_plus_recess_white,
            TrackFinish::FmsPlusRecessBlack => self.fms_plus_recess_black,
            TrackFinish::DsXlLed => self.ds_xl_led,
            TrackFinish::Dual => self.dual,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct RunnerRates {
    pub fes_base_flex_hook: f64,
    pub easy_wave_end_hook: f64,
    pub easy_wave_wave_hook: f64,
    pub fes_base_snap: f64,
}

impl RunnerRates {
    pub fn get(&self, runner: Runner) -> f64 {
        match runner {
            Runner::FesBaseFlexHook => self.fes_base_flex_hook,
            Runner::EasyWaveEndHook => self.easy_wave_end_hook,
            Runner::EasyWaveWaveHook => self.easy_wave_wave_hook,
            Runner::FesBaseSnap => self.fes_base_snap,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct TapeRates {
    pub flex_tape_transparent: f64,
    pub easy_fold_tape_white: f64,
}

impl TapeRates {
    pub fn get(&self, tape: Tape) -> f64 {
        match tape {
            Tape::FlexTapeTransparent => self.flex_tape_transparent,
            Tape::EasyFoldTapeWhite => self.easy_fold_tape_white,
        }
    }
}

/// Component prices that Forest motor bundles are assembled from
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct MotorParts {
    pub motor_m: f64,
    pub motor_l_white: f64,
    pub motor_l_black: f64,
    pub motor_ac: f64,
    pub motor_ion: f64,
    pub adapter: f64,
    pub relay: f64,
    pub surge: f64,
}

impl MotorParts {
    /// Bundle price: "auto" variants add a relay, the M motor needs an
    /// adapter and the AC motor ships with a surge protector.
    pub fn price(&self, motor: ForestMotor) -> f64 {
        match motor {
            ForestMotor::MStd => self.motor_m + self.adapter,
            ForestMotor::MAuto => self.motor_m + self.adapter + self.relay,
            ForestMotor::LWhiteStd => self.motor_l_white,
            ForestMotor::LWhiteAuto => self.motor_l_white + self.relay,
            ForestMotor::LBlackStd => self.motor_l_black,
            ForestMotor::LBlackAuto => self.motor_l_black + self.relay,
            ForestMotor::AcMotor => self.motor_ac + self.surge,
            ForestMotor::IonMotor => self.motor_ion,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct RemotePrices {
    pub easy_touch6: f64,
    pub diamond: f64,
    pub wall_switch2: f64,
    pub wifi_dongle: f64,
    pub ac_control: f64,
}

impl RemotePrices {
    pub fn get(&self, remote: ForestRemote) -> f64 {
        match remote {
            ForestRemote::EasyTouch6 => self.easy_touch6,
            ForestRemote::Diamond => self.diamond,
            ForestRemote::WallSwitch2 => self.wall_switch2,
            ForestRemote::WifiDongle => self.wifi_dongle,
            ForestRemote::AcControl => self.ac_control,
        }
    }
}

/// Gravel / Pulse / Weave rates
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct GpwTariff {
    pub gravel: GpwRates,
    pub pulse: GpwRates,
    pub weave: GpwRates,
}

impl GpwTariff {
    pub fn get(&self, kind: GpwType) -> &GpwRates {
        match kind {
            GpwType::Gravel => &self.gravel,
            GpwType::Pulse => &self.pulse,
            GpwType::Weave => &self.weave,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GpwRates {
    /// Per running foot
    pub track_rate: f64,
    pub motor_base: f64,
    pub remote_base: f64,
}

/// Somfy meter brackets and SKU catalogs
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SomfyTariff {
    /// Whole meters billed when the fraction does not round up
    pub minimum_meters: f64,
    pub ripple: Vec<SomfyTrackTier>,
    pub traditional: Vec<SomfyTrackTier>,
    pub motors: Vec<CatalogEntry>,
    pub remotes: Vec<CatalogEntry>,
}

impl SomfyTariff {
    pub fn table(&self, track: SomfyTrack) -> &[SomfyTrackTier] {
        match track {
            SomfyTrack::Ripple => &self.ripple,
            SomfyTrack::Traditional => &self.traditional,
        }
    }

    /// Motor by vendor code or catalog name.
    pub fn motor(&self, key: &str) -> Option<&CatalogEntry> {
        find_entry(&self.motors, key)
    }

    /// Remote by vendor code or catalog name.
    pub fn remote(&self, key: &str) -> Option<&CatalogEntry> {
        find_entry(&self.remotes, key)
    }
}

fn find_entry<'a>(entries: &'a [CatalogEntry], key: &str) -> Option<&'a CatalogEntry> {
    let key = key.trim();
    entries
        .iter()
        .find(|e| e.code == key)
        .or_else(|| entries.iter().find(|e| e.name == key))
}

/// One meter bracket of a Somfy track table
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SomfyTrackTier {
    pub label: String,
    pub max_meters: f64,
    pub medium: f64,
    pub heavy: f64,
    pub silent: f64,
}

impl SomfyTrackTier {
    pub fn price(&self, duty: SomfyDuty) -> f64 {
        match duty {
            SomfyDuty::Medium => self.medium,
            SomfyDuty::Heavy => self.heavy,
            SomfyDuty::Silent => self.silent,
        }
    }
}

/// Vendor SKU
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CatalogEntry {
    pub code: String,
    pub name: String,
    pub price: f64,
}

/// Rates given to a row the first time it is generated
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct DefaultRates {
    pub local: FabricRates,
    pub roman: FabricRates,
    pub blinds: BlindsRates,
}

// ─── Loading ─────────────────────────────────────────────────────────

impl Tariff {
    /// Parse and validate a tariff document.
    pub fn from_json(json: &str) -> Result<Self> {
        let tariff: Tariff = serde_json::from_str(json)?;
        tariff.validate()?;
        tracing::debug!(version = %tariff.version, "tariff loaded");
        Ok(tariff)
    }

    /// Check the invariants the lookups rely on.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.gst_rate) {
            return Err(TariffError::InvalidGstRate(self.gst_rate));
        }
        check_ascending(
            "forest.trackTiers",
            self.forest.track_tiers.iter().map(|t| t.max_rft),
        )?;
        check_ascending("somfy.ripple", self.somfy.ripple.iter().map(|t| t.max_meters))?;
        check_ascending(
            "somfy.traditional",
            self.somfy.traditional.iter().map(|t| t.max_meters),
        )?;
        Ok(())
    }

    /// `amount` with GST added.
    pub fn with_gst(&self, amount: f64) -> f64 {
        amount + amount * self.gst_rate
    }
}

fn check_ascending(table: &'static str, uppers: impl Iterator<Item = f64>) -> Result<()> {
    let mut previous: Option<f64> = None;
    let mut count = 0usize;
    for (index, upper) in uppers.enumerate() {
        count += 1;
        let ordered = upper.is_finite() && previous.map_or(true, |p| upper > p);
        if !ordered {
            return Err(TariffError::UnorderedTier {
                table,
                index,
                upper,
            });
        }
        previous = Some(upper);
    }
    if count == 0 {
        return Err(TariffError::EmptyTable { table });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tariff_parses() {
        let t = &*TARIFF;
        assert_eq!(t.version, "2025.1");
        assert_eq!(t.forest.track_tiers.len(), 9);
        assert!((t.gst_rate - 0.18).abs() < f64::EPSILON);
    }

    #[test]
    fn test_track_tiers_ascending_to_19ft() {
        let tiers = &TARIFF.forest.track_tiers;
        assert!((tiers[0].max_rft - 6.5).abs() < f64::EPSILON);
        assert!((tiers[8].max_rft - 19.0).abs() < f64::EPSILON);
        assert!(tiers.windows(2).all(|w| w[0].max_rft < w[1].max_rft));
    }

    #[test]
    fn test_every_finish_has_a_price() {
        for finish in TrackFinish::ALL {
            assert!(TARIFF.forest.track_tiers[0].prices.get(*finish) > 0.0);
            assert!(TARIFF.forest.excess_rates.get(*finish) > 0.0);
        }
    }

    #[test]
    fn test_catalog_ids_round_trip() {
        for finish in TrackFinish::ALL {
            assert_eq!(TrackFinish::from_id(finish.id()), Some(*finish));
        }
        for motor in ForestMotor::ALL {
            assert_eq!(ForestMotor::from_id(motor.id()), Some(*motor));
        }
        assert_eq!(Runner::from_id(" fes base and snap "), Some(Runner::FesBaseSnap));
        assert_eq!(SomfyDuty::from_id("heavy"), Some(SomfyDuty::Heavy));
        assert_eq!(TrackFinish::from_id("chrome"), None);
    }

    #[test]
    fn test_legacy_conceal_finish() {
        assert_eq!(
            TrackFinish::from_id("fmsPlusConceal"),
            Some(TrackFinish::FmsPlusRecessWhite)
        );
        // Written back under the current id
        assert_eq!(TrackFinish::FmsPlusRecessWhite.id(), "fmsPlusRecessWhite");
    }

    #[test]
    fn test_motor_bundles() {
        let parts = &TARIFF.forest.motor_parts;
        assert!((parts.price(ForestMotor::MStd) - 63310.0).abs() < f64::EPSILON);
        assert!((parts.price(ForestMotor::MAuto) - 67280.0).abs() < f64::EPSILON);
        assert!((parts.price(ForestMotor::LBlackAuto) - 49700.0).abs() < f64::EPSILON);
        assert!((parts.price(ForestMotor::AcMotor) - 34620.0).abs() < f64::EPSILON);
        assert!((parts.price(ForestMotor::IonMotor) - 50250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_somfy_catalog_lookup_by_code_or_name() {
        let somfy = &TARIFF.somfy;
        assert!((somfy.motor("1240437").unwrap().price - 21744.0).abs() < f64::EPSILON);
        assert!((somfy.remote("Situo RTS").unwrap().price - 6626.0).abs() < f64::EPSILON);
        assert!(somfy.motor("none").is_none());
    }

    #[test]
    fn test_default_rates() {
        let d = &TARIFF.default_rates;
        assert!((d.local.channel - 285.0).abs() < f64::EPSILON);
        assert!((d.roman.channel).abs() < f64::EPSILON);
        assert!((d.blinds.labour - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_unordered_tiers() {
        let mut value: serde_json::Value = serde_json::from_str(TARIFF_JSON).unwrap();
        value["forest"]["trackTiers"][3]["maxRft"] = serde_json::json!(7.0);
        let err = Tariff::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(
            err,
            TariffError::UnorderedTier { table: "forest.trackTiers", index: 3, .. }
        ));
    }

    #[test]
    fn test_rejects_empty_table_and_bad_gst() {
        let mut value: serde_json::Value = serde_json::from_str(TARIFF_JSON).unwrap();
        value["somfy"]["ripple"] = serde_json::json!([]);
        let err = Tariff::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, TariffError::EmptyTable { table: "somfy.ripple" }));

        let mut value: serde_json::Value = serde_json::from_str(TARIFF_JSON).unwrap();
        value["gstRate"] = serde_json::json!(1.5);
        let err = Tariff::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, TariffError::InvalidGstRate(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(Tariff::from_json("{"), Err(TariffError::Parse(_))));
    }
}
