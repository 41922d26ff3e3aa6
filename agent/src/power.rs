//! Derived real power (watts) for one unit.
use crate::normalize::NormalizedValue;
use std::collections::BTreeMap;

pub const OUTPUT_CURRENT: &str = "output.current";
pub const OUTPUT_VOLTAGE: &str = "output.voltage";
pub const UPS_LOAD: &str = "ups.load";

/// Real power from the unit's variables.
///
/// Load percentage against the configured wattage wins over the
/// current × voltage product when both are available.
pub fn derive_real_power(
    vars: &BTreeMap<String, NormalizedValue>,
    max_watts: Option<u32>,
) -> Option<NormalizedValue> {
    from_load(vars, max_watts).or_else(|| from_current_and_voltage(vars))
}

fn from_current_and_voltage(vars: &BTreeMap<String, NormalizedValue>) -> Option<NormalizedValue> {
    match (vars.get(OUTPUT_CURRENT)?, vars.get(OUTPUT_VOLTAGE)?) {
        (NormalizedValue::Int(a), NormalizedValue::Int(v)) => a.checked_mul(*v).map(NormalizedValue::Int),
        (current, voltage) => {
            let watts = current.as_f64()? * voltage.as_f64()?;
            watts.is_finite().then(|| NormalizedValue::from_f64(watts))
        }
    }
}

fn from_load(vars: &BTreeMap<String, NormalizedValue>, max_watts: Option<u32>) -> Option<NormalizedValue> {
    let max_watts = f64::from(max_watts?);
    let load = vars.get(UPS_LOAD)?.as_f64()?;
    let watts = round_half_up(load * max_watts / 100.0, 2);
    watts.is_finite().then(|| NormalizedValue::from_f64(watts))
}

/// Digits kept before rounding, enough to absorb binary noise such as
/// `288.04499999999996` standing for `288.045`.
const SNAP_DECIMALS: usize = 9;

/// Round to `places` decimals, ties away from zero, on the decimal form of
/// `value` so `1.005` rounds to `1.01`.
pub fn round_half_up(value: f64, places: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let text = format!("{:.*}", SNAP_DECIMALS.max(places + 1), value.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), ""));
    if frac.len() <= places {
        return value;
    }
    let Ok(mut scaled) = format!("{whole}{}", &frac[..places]).parse::<u128>() else {
        return value;
    };
    if frac.as_bytes()[places] >= b'5' {
        scaled += 1;
    }
    let rounded = scaled as f64 / 10f64.powi(places as i32);
    rounded.copysign(value)
}
