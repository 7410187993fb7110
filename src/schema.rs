// Structural description of the JSON a generative model must return.
// Used twice: to validate a parsed response, and to synthesize an example document that
// anchors the model on the expected shape.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Schema violation at {path}: {message}")]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    String {
        allowed: Option<Vec<String>>,
    },
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
    Boolean,
    Array {
        items: Box<Schema>,
        min_items: usize,
    },
    Object {
        fields: Vec<Field>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

impl Field {
    pub fn required(name: &str, schema: Schema) -> Self {
        Self {
            name: name.to_string(),
            schema,
            required: true,
        }
    }

    pub fn optional(name: &str, schema: Schema) -> Self {
        Self {
            name: name.to_string(),
            schema,
            required: false,
        }
    }
}

impl Schema {
    pub fn string() -> Self {
        Schema::String { allowed: None }
    }

    pub fn one_of(values: &[&str]) -> Self {
        Schema::String {
            allowed: Some(values.iter().map(|v| v.to_string()).collect()),
        }
    }

    pub fn number() -> Self {
        Schema::Number {
            minimum: None,
            maximum: None,
        }
    }

    pub fn non_negative() -> Self {
        Schema::Number {
            minimum: Some(0.0),
            maximum: None,
        }
    }

    pub fn integer() -> Self {
        Schema::Integer {
            minimum: None,
            maximum: None,
        }
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array {
            items: Box::new(items),
            min_items: 0,
        }
    }

    pub fn object(fields: Vec<Field>) -> Self {
        Schema::Object { fields }
    }

    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), SchemaViolation> {
        let violation = |message: String| SchemaViolation {
            path: path.to_string(),
            message,
        };

        match self {
            Schema::String { allowed } => {
                let s = value
                    .as_str()
                    .ok_or_else(|| violation(format!("expected string, got {}", kind(value))))?;
                if let Some(allowed) = allowed {
                    if !allowed.iter().any(|a| a == s) {
                        return Err(violation(format!("{:?} is not one of {:?}", s, allowed)));
                    }
                }
            }
            Schema::Number { minimum, maximum } => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| violation(format!("expected number, got {}", kind(value))))?;
                check_range(n, *minimum, *maximum).map_err(violation)?;
            }
            Schema::Integer { minimum, maximum } => {
                let n = value
                    .as_i64()
                    .ok_or_else(|| violation(format!("expected integer, got {}", kind(value))))?;
                check_range(
                    n as f64,
                    minimum.map(|m| m as f64),
                    maximum.map(|m| m as f64),
                )
                .map_err(violation)?;
            }
            Schema::Boolean => {
                if !value.is_boolean() {
                    return Err(violation(format!("expected boolean, got {}", kind(value))));
                }
            }
            Schema::Array { items, min_items } => {
                let elements = value
                    .as_array()
                    .ok_or_else(|| violation(format!("expected array, got {}", kind(value))))?;
                if elements.len() < *min_items {
                    return Err(violation(format!(
                        "expected at least {} items, got {}",
                        min_items,
                        elements.len()
                    )));
                }
                for (i, element) in elements.iter().enumerate() {
                    items.validate_at(element, &format!("{}[{}]", path, i))?;
                }
            }
            Schema::Object { fields } => {
                let object = value
                    .as_object()
                    .ok_or_else(|| violation(format!("expected object, got {}", kind(value))))?;
                for field in fields {
                    let field_path = format!("{}.{}", path, field.name);
                    match object.get(&field.name) {
                        Some(Value::Null) | None if field.required => {
                            return Err(SchemaViolation {
                                path: field_path,
                                message: "missing required field".to_string(),
                            });
                        }
                        Some(Value::Null) | None => {}
                        Some(v) => field.schema.validate_at(v, &field_path)?,
                    }
                }
            }
        }
        Ok(())
    }

    // Representative document for this schema, with placeholders picked from field names
    pub fn example(&self) -> Value {
        self.example_for(None)
    }

    fn example_for(&self, field_name: Option<&str>) -> Value {
        let name = field_name.unwrap_or_default().to_lowercase();
        match self {
            Schema::String { allowed: Some(allowed) } if !allowed.is_empty() => {
                Value::String(allowed[0].clone())
            }
            Schema::String { .. } => Value::String(example_string(&name).to_string()),
            Schema::Number { minimum, maximum } => {
                let n = clamp(example_number(&name), *minimum, *maximum);
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
            Schema::Integer { minimum, maximum } => {
                let base = if ["count", "nights", "guests", "adults", "quantity"]
                    .iter()
                    .any(|k| name.contains(k))
                {
                    2
                } else {
                    1
                };
                let n = minimum.map_or(base, |m| base.max(m));
                Value::from(maximum.map_or(n, |m| n.min(m)))
            }
            Schema::Boolean => Value::Bool(true),
            Schema::Array { items, min_items } => {
                let element = items.example_for(field_name);
                Value::Array(vec![element; (*min_items).max(1)])
            }
            Schema::Object { fields } => {
                let mut object = Map::new();
                for field in fields {
                    object.insert(field.name.clone(), field.schema.example_for(Some(&field.name)));
                }
                Value::Object(object)
            }
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_range(n: f64, minimum: Option<f64>, maximum: Option<f64>) -> Result<(), String> {
    if let Some(min) = minimum {
        if n < min {
            return Err(format!("{} is below minimum {}", n, min));
        }
    }
    if let Some(max) = maximum {
        if n > max {
            return Err(format!("{} is above maximum {}", n, max));
        }
    }
    Ok(())
}

fn clamp(n: f64, minimum: Option<f64>, maximum: Option<f64>) -> f64 {
    let n = minimum.map_or(n, |m| n.max(m));
    maximum.map_or(n, |m| n.min(m))
}

fn example_string(name: &str) -> &'static str {
    if name.ends_with("_id") || (name.ends_with("id") && name.len() <= 8) {
        "HOTEL123"
    } else if name.contains("email") {
        "guest@example.com"
    } else if name.contains("date") {
        "2024-06-01"
    } else if name.contains("url") || name.contains("photo") || name.contains("image") {
        "https://example.com/photo.jpg"
    } else if name.contains("currency") {
        "USD"
    } else if name.contains("city") || name.contains("location") || name.contains("address") {
        "New York, NY"
    } else if name.contains("name") || name.contains("title") {
        "Example Hotel"
    } else if name.contains("description") || name.contains("reason") || name.contains("summary") {
        "Brief explanation of the estimate"
    } else {
        "example"
    }
}

fn example_number(name: &str) -> f64 {
    if name.contains("emission") || name.contains("kg") || name.contains("co2") {
        12.5
    } else if name.contains("price") || name.contains("amount") || name.contains("cost") {
        99.99
    } else if name.contains("lat") {
        40.7128
    } else if name.contains("lon") || name.contains("lng") {
        -74.006
    } else if name.contains("score") || name.contains("confidence") {
        0.8
    } else {
        1.0
    }
}
