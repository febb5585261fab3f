use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Ordered name → value map, the shape live readings arrive in.
pub type FieldMap = IndexMap<String, f64>;

/// The four sensor channels, in the order the model is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    VoltageOutput,
    CurrentDraw,
    InternalCoolantTemp,
    CoolantPumpRpm,
}

impl Feature {
    /// All features in canonical (trained) order.
    pub const ALL: [Feature; 4] = [
        Feature::VoltageOutput,
        Feature::CurrentDraw,
        Feature::InternalCoolantTemp,
        Feature::CoolantPumpRpm,
    ];

    /// Column / field name used in corpus files and live field maps.
    pub fn name(&self) -> &'static str {
        match self {
            Feature::VoltageOutput => "voltage_output",
            Feature::CurrentDraw => "current_draw",
            Feature::InternalCoolantTemp => "internal_coolant_temp",
            Feature::CoolantPumpRpm => "coolant_pump_rpm",
        }
    }

    /// Human-readable label for dashboards.
    pub fn label(&self) -> &'static str {
        match self {
            Feature::VoltageOutput => "Voltage Output",
            Feature::CurrentDraw => "Current Draw",
            Feature::InternalCoolantTemp => "Internal Coolant Temp",
            Feature::CoolantPumpRpm => "Coolant Pump Rpm",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Feature::VoltageOutput => 0,
            Feature::CurrentDraw => 1,
            Feature::InternalCoolantTemp => 2,
            Feature::CoolantPumpRpm => 3,
        }
    }
}

/// Canonical feature names in trained order.
pub const FEATURES: [&str; 4] = [
    "voltage_output",
    "current_draw",
    "internal_coolant_temp",
    "coolant_pump_rpm",
];

/// One complete multivariate sample from the charging station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Volts.
    pub voltage_output: f64,
    /// Amperes.
    pub current_draw: f64,
    /// Degrees Celsius.
    pub internal_coolant_temp: f64,
    /// Revolutions per minute.
    pub coolant_pump_rpm: f64,
}

impl SensorReading {
    pub fn new(
        voltage_output: f64,
        current_draw: f64,
        internal_coolant_temp: f64,
        coolant_pump_rpm: f64,
    ) -> Self {
        Self {
            voltage_output,
            current_draw,
            internal_coolant_temp,
            coolant_pump_rpm,
        }
    }

    /// Values in canonical feature order.
    pub fn to_array(&self) -> [f64; 4] {
        [
            self.voltage_output,
            self.current_draw,
            self.internal_coolant_temp,
            self.coolant_pump_rpm,
        ]
    }

    pub fn from_array(values: [f64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.to_array()[feature.index()]
    }

    /// Validate a field map and pull out the four canonical fields.
    ///
    /// Extra fields are ignored. A missing field or a NaN/infinite value
    /// is a `SchemaError`.
    pub fn from_fields(fields: &FieldMap) -> Result<Self, SchemaError> {
        let mut values = [0.0; 4];
        for feature in Feature::ALL {
            let name = feature.name();
            let value = *fields
                .get(name)
                .ok_or_else(|| SchemaError::MissingField(name.to_string()))?;
            if !value.is_finite() {
                return Err(SchemaError::NonFinite {
                    field: name.to_string(),
                    value,
                });
            }
            values[feature.index()] = value;
        }
        Ok(Self::from_array(values))
    }

    /// Field map in canonical order.
    pub fn to_fields(&self) -> FieldMap {
        Feature::ALL
            .iter()
            .map(|f| (f.name().to_string(), self.get(*f)))
            .collect()
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_map() -> FieldMap {
        SensorReading::new(480.0, 30.0, 70.0, 1500.0).to_fields()
    }

    #[test]
    fn feature_names_match_canonical_order() {
        let names: Vec<&str> = Feature::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(names, FEATURES);
        for (i, f) in Feature::ALL.iter().enumerate() {
            assert_eq!(f.index(), i);
        }
    }

    #[test]
    fn from_fields_accepts_complete_map() {
        let reading = SensorReading::from_fields(&full_map()).unwrap();
        assert_eq!(reading.to_array(), [480.0, 30.0, 70.0, 1500.0]);
    }

    #[test]
    fn from_fields_ignores_extra_fields() {
        let mut map = full_map();
        map.insert("ambient_humidity".to_string(), 45.0);
        map.shift_insert(0, "station_uptime_h".to_string(), 1234.0);
        let reading = SensorReading::from_fields(&map).unwrap();
        assert_eq!(reading.coolant_pump_rpm, 1500.0);
    }

    #[test]
    fn from_fields_accepts_any_field_order() {
        let mut map = FieldMap::new();
        map.insert("coolant_pump_rpm".into(), 1500.0);
        map.insert("internal_coolant_temp".into(), 70.0);
        map.insert("current_draw".into(), 30.0);
        map.insert("voltage_output".into(), 480.0);
        let reading = SensorReading::from_fields(&map).unwrap();
        assert_eq!(reading.to_array(), [480.0, 30.0, 70.0, 1500.0]);
    }

    #[test]
    fn every_missing_field_is_reported() {
        for name in FEATURES {
            let mut map = full_map();
            map.shift_remove(name);
            let err = SensorReading::from_fields(&map).unwrap_err();
            assert_eq!(err, SchemaError::MissingField(name.to_string()));
        }
    }

    #[test]
    fn empty_map_is_rejected() {
        let err = SensorReading::from_fields(&FieldMap::new()).unwrap_err();
        assert_eq!(err, SchemaError::MissingField("voltage_output".into()));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut map = full_map();
        map.insert("internal_coolant_temp".into(), f64::NAN);
        assert!(matches!(
            SensorReading::from_fields(&map),
            Err(SchemaError::NonFinite { ref field, .. }) if field == "internal_coolant_temp"
        ));

        let mut map = full_map();
        map.insert("coolant_pump_rpm".into(), f64::INFINITY);
        assert!(SensorReading::from_fields(&map).is_err());
    }

    #[test]
    fn to_fields_preserves_order() {
        let keys: Vec<String> = full_map().keys().cloned().collect();
        assert_eq!(keys, FEATURES);
    }
}
