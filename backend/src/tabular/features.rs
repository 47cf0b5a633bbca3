use ndarray::Array2;
use serde::Deserialize;

pub const DEFAULT_PH: f64 = 6.2;
pub const DEFAULT_TEMP: f64 = 21.0;
pub const DEFAULT_EC: f64 = 2.0;
pub const DEFAULT_TDS: f64 = 140.0;

/// Column order the classifier was trained on.
pub const FEATURE_NAMES: [&str; 4] = ["ph", "temp", "ec", "tds"];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FeatureError {
    #[error("could not convert {field} value {value:?} to float")]
    NotNumeric { field: &'static str, value: String },
    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },
}

/// A single measurement as sent by the dashboard. Sensors report numbers,
/// but hand-written requests sometimes quote them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Measurement {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl Measurement {
    fn to_f64(&self, field: &'static str) -> Result<f64, FeatureError> {
        let value = match self {
            Measurement::Number(n) => *n,
            Measurement::Flag(b) => f64::from(u8::from(*b)),
            Measurement::Text(s) => s.trim().parse::<f64>().map_err(|_| FeatureError::NotNumeric {
                field,
                value: s.clone(),
            })?,
        };
        if !value.is_finite() {
            return Err(FeatureError::NotFinite { field, value });
        }
        Ok(value)
    }
}

/// Sensor readings posted to `/predict_ml`. Absent or `null` fields take the
/// documented defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SensorReading {
    pub ph: Option<Measurement>,
    pub temp: Option<Measurement>,
    pub ec: Option<Measurement>,
    pub tds: Option<Measurement>,
}

impl SensorReading {
    pub fn to_features(&self) -> Result<FeatureVector, FeatureError> {
        Ok(FeatureVector {
            ph: resolve(&self.ph, FEATURE_NAMES[0], DEFAULT_PH)?,
            temp: resolve(&self.temp, FEATURE_NAMES[1], DEFAULT_TEMP)?,
            ec: resolve(&self.ec, FEATURE_NAMES[2], DEFAULT_EC)?,
            tds: resolve(&self.tds, FEATURE_NAMES[3], DEFAULT_TDS)?,
        })
    }
}

fn resolve(
    value: &Option<Measurement>,
    field: &'static str,
    default: f64,
) -> Result<f64, FeatureError> {
    match value {
        Some(measurement) => measurement.to_f64(field),
        None => Ok(default),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub ph: f64,
    pub temp: f64,
    pub ec: f64,
    pub tds: f64,
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self {
            ph: DEFAULT_PH,
            temp: DEFAULT_TEMP,
            ec: DEFAULT_EC,
            tds: DEFAULT_TDS,
        }
    }
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; 4] {
        [self.ph, self.temp, self.ec, self.tds]
    }

    /// One-row matrix in training column order.
    pub fn to_row(&self) -> Array2<f64> {
        Array2::from_shape_fn((1, FEATURE_NAMES.len()), |(_, col)| self.to_array()[col])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(value: serde_json::Value) -> SensorReading {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_reading_uses_all_defaults() {
        let features = SensorReading::default().to_features().unwrap();
        assert_eq!(features.to_array(), [6.2, 21.0, 2.0, 140.0]);
        assert_eq!(features, FeatureVector::default());
    }

    #[test]
    fn partial_reading_fills_only_missing_fields() {
        let features = reading(json!({ "ph": 5.8, "tds": 300 })).to_features().unwrap();
        assert_eq!(features.to_array(), [5.8, 21.0, 2.0, 300.0]);
    }

    #[test]
    fn null_field_is_treated_as_absent() {
        let features = reading(json!({ "temp": null })).to_features().unwrap();
        assert_eq!(features.temp, DEFAULT_TEMP);
    }

    #[test]
    fn numeric_strings_and_flags_convert() {
        let features = reading(json!({ "ph": " 6.5 ", "ec": true }))
            .to_features()
            .unwrap();
        assert_eq!(features.ph, 6.5);
        assert_eq!(features.ec, 1.0);
    }

    #[test]
    fn non_numeric_string_is_rejected() {
        let err = reading(json!({ "ph": "acidic" })).to_features().unwrap_err();
        assert_eq!(
            err,
            FeatureError::NotNumeric {
                field: "ph",
                value: "acidic".to_string()
            }
        );
    }

    #[test]
    fn non_finite_string_is_rejected() {
        let err = reading(json!({ "tds": "inf" })).to_features().unwrap_err();
        assert!(matches!(err, FeatureError::NotFinite { field: "tds", .. }));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let features = reading(json!({ "humidity": 80, "ph": 7 })).to_features().unwrap();
        assert_eq!(features.ph, 7.0);
    }

    #[test]
    fn row_keeps_training_column_order() {
        let row = FeatureVector {
            ph: 1.0,
            temp: 2.0,
            ec: 3.0,
            tds: 4.0,
        }
        .to_row();
        assert_eq!(row.shape(), &[1, 4]);
        assert_eq!(row.row(0).to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
