//! Parameter shapes shared by several commands.

use pcb_board::units::{LengthUnit, to_internal, to_mm};
use pcb_board::{Board, Point};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{CommandError, CommandResult};

/// Decode a command's `params` object into its typed form.
pub fn parse<T: DeserializeOwned>(params: Value) -> CommandResult<T> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(params)
        .map_err(|e| CommandError::InvalidParameter(format!("Invalid parameters: {e}")))
}

/// `{x, y, unit?}`; the unit defaults to millimetres.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PointParam {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

impl PointParam {
    pub fn mm(x: f64, y: f64) -> Self {
        Self { x, y, unit: None }
    }

    pub fn length_unit(&self) -> CommandResult<LengthUnit> {
        Ok(self
            .unit
            .as_deref()
            .map(str::parse::<LengthUnit>)
            .transpose()?
            .unwrap_or_default())
    }

    pub fn to_point(&self) -> CommandResult<Point> {
        let unit = self.length_unit()?;
        Ok(Point::new(to_internal(self.x, unit), to_internal(self.y, unit)))
    }
}

/// A route endpoint: a literal point or a pad on a placed component.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    Pad {
        #[serde(rename = "componentRef", alias = "component")]
        component: String,
        #[serde(deserialize_with = "string_or_number")]
        pad: String,
    },
    Point(PointParam),
}

impl Endpoint {
    pub fn resolve(&self, board: &Board) -> CommandResult<Point> {
        match self {
            Endpoint::Point(p) => p.to_point(),
            Endpoint::Pad { component, pad } => {
                let footprint = board.footprint(component).ok_or_else(|| {
                    CommandError::NotFound(format!("Component not found: {component}"))
                })?;
                footprint.pad_position(pad).ok_or_else(|| {
                    CommandError::NotFound(format!("Pad {pad} not found on {component}"))
                })
            }
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a pad name, got {other}"
        ))),
    }
}

/// A board position reported back in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub unit: &'static str,
}

impl From<Point> for Position {
    fn from(p: Point) -> Self {
        Self {
            x: to_mm(p.x),
            y: to_mm(p.y),
            unit: "mm",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcb_board::units::mm;
    use serde_json::json;

    #[test]
    fn point_units() {
        let p: PointParam =
            serde_json::from_value(json!({"x": 1, "y": 0.5, "unit": "inch"})).unwrap();
        assert_eq!(p.to_point().unwrap(), Point::new(25_400_000, 12_700_000));
        let p: PointParam = serde_json::from_value(json!({"x": 1.5, "y": -2})).unwrap();
        assert_eq!(p.to_point().unwrap(), Point::new(mm(1.5), mm(-2.0)));
        let p: PointParam =
            serde_json::from_value(json!({"x": 1, "y": 1, "unit": "furlong"})).unwrap();
        assert!(matches!(p.to_point(), Err(CommandError::InvalidParameter(_))));
    }

    #[test]
    fn endpoints() {
        let pad: Endpoint =
            serde_json::from_value(json!({"componentRef": "R1", "pad": 2})).unwrap();
        assert_eq!(
            pad,
            Endpoint::Pad {
                component: "R1".into(),
                pad: "2".into()
            }
        );
        let point: Endpoint = serde_json::from_value(json!({"x": 3, "y": 4})).unwrap();
        assert_eq!(point, Endpoint::Point(PointParam::mm(3.0, 4.0)));
        assert!(matches!(
            pad.resolve(&Board::new()),
            Err(CommandError::NotFound(_))
        ));
    }

    #[test]
    fn null_params_are_empty() {
        #[derive(Deserialize)]
        struct Empty {
            #[serde(default)]
            name: Option<String>,
        }
        let parsed: Empty = parse(Value::Null).unwrap();
        assert!(parsed.name.is_none());
        assert!(matches!(
            parse::<PointParam>(json!({"x": "left"})),
            Err(CommandError::InvalidParameter(_))
        ));
    }
}
