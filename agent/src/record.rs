use crate::normalize::NormalizedValue;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use tracing::warn;

/// Record type label sent with every unit's metrics.
pub const RECORD_TYPE: &str = "nut_ups";

/// Synthesized field names start with this; NUT variable names never do.
pub const RESERVED_PREFIX: char = '_';
pub const UPS_NAME_FIELD: &str = "_ups_name";
pub const RECORD_TYPE_FIELD: &str = "_record_type";
pub const REAL_POWER_FIELD: &str = "_real_power";

/// Normalized telemetry of one unit for one cycle.
///
/// Serializes as a flat JSON object: the unit's variables followed by the
/// synthesized `_ups_name`, `_record_type` and optional `_real_power`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    ups_name: String,
    variables: BTreeMap<String, NormalizedValue>,
    real_power: Option<NormalizedValue>,
}

pub type MetricBatch = Vec<MetricRecord>;

impl MetricRecord {
    pub fn new(ups_name: impl Into<String>, mut variables: BTreeMap<String, NormalizedValue>) -> Self {
        let ups_name = ups_name.into();
        variables.retain(|key, _| {
            let keep = !key.starts_with(RESERVED_PREFIX);
            if !keep {
                warn!(ups = %ups_name, variable = %key, "dropping variable that shadows a reserved field");
            }
            keep
        });
        Self {
            ups_name,
            variables,
            real_power: None,
        }
    }

    pub fn with_real_power(mut self, real_power: Option<NormalizedValue>) -> Self {
        self.real_power = real_power;
        self
    }

    pub fn ups_name(&self) -> &str {
        &self.ups_name
    }

    pub fn record_type(&self) -> &'static str {
        RECORD_TYPE
    }

    pub fn variables(&self) -> &BTreeMap<String, NormalizedValue> {
        &self.variables
    }

    pub fn real_power(&self) -> Option<&NormalizedValue> {
        self.real_power.as_ref()
    }
}

impl Serialize for MetricRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = 2 + usize::from(self.real_power.is_some());
        let mut map = serializer.serialize_map(Some(self.variables.len() + extra))?;
        for (key, value) in &self.variables {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(UPS_NAME_FIELD, &self.ups_name)?;
        map.serialize_entry(RECORD_TYPE_FIELD, RECORD_TYPE)?;
        if let Some(watts) = &self.real_power {
            map.serialize_entry(REAL_POWER_FIELD, watts)?;
        }
        map.end()
    }
}
