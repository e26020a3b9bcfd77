//! `GeographicCoordinate`: latitude, longitude and altitude attached to a
//! Dataset. Deliberately drops an editor-UI `removable` flag some CSDM
//! implementations carry alongside these fields — there is no interactive
//! editing surface here.

use crate::errors::CsdmError;
use crate::units::Scalar;
use crate::value::Mapping;

#[derive(Debug, Clone, PartialEq)]
pub struct GeographicCoordinate {
    pub latitude: Scalar,
    pub longitude: Scalar,
    pub altitude: Option<Scalar>,
    pub metadata: Mapping,
}

impl GeographicCoordinate {
    pub fn new(latitude: Scalar, longitude: Scalar, altitude: Option<Scalar>) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            metadata: Mapping::new(),
        }
    }

    pub fn to_dictionary(&self) -> Mapping {
        let mut map = Mapping::new();
        map.insert(
            "latitude".to_string(),
            serde_json::Value::String(self.latitude.to_string()),
        );
        map.insert(
            "longitude".to_string(),
            serde_json::Value::String(self.longitude.to_string()),
        );
        if let Some(alt) = &self.altitude {
            map.insert("altitude".to_string(), serde_json::Value::String(alt.to_string()));
        }
        map.insert("metadata".to_string(), serde_json::Value::Object(self.metadata.clone()));
        map
    }

    pub fn from_dictionary(map: &Mapping) -> Result<Self, CsdmError> {
        let parse = |v: &serde_json::Value| -> Result<Scalar, CsdmError> {
            let s = v.as_str().ok_or_else(|| CsdmError::TypeMismatch {
                msg: "expected scalar expression string".to_string(),
            })?;
            let mut parts = s.trim().splitn(2, char::is_whitespace);
            let value: f64 = parts.next().unwrap_or("").parse().map_err(|_| CsdmError::Decode {
                msg: format!("could not parse scalar value from '{}'", s),
            })?;
            let unit = crate::units::Unit::parse(parts.next().unwrap_or("dimensionless").trim())?;
            Ok(Scalar::new(value, unit))
        };
        let latitude = map
            .get("latitude")
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: "geographic_coordinate.latitude missing".to_string(),
            })
            .and_then(parse)?;
        let longitude = map
            .get("longitude")
            .ok_or_else(|| CsdmError::InvalidArgument {
                msg: "geographic_coordinate.longitude missing".to_string(),
            })
            .and_then(parse)?;
        let altitude = map.get("altitude").map(parse).transpose()?;
        let metadata = map
            .get("metadata")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        Ok(Self {
            latitude,
            longitude,
            altitude,
            metadata,
        })
    }
}
