use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};

use crate::constants::{MAX_NAME_LENGTH, MAX_PRICE_DIGITS, PRICE_DECIMAL_PLACES};

use super::{
    error::{ApiError, FieldErrors, NON_FIELD_ERRORS},
    schema::{Operation, Recipe, RecipeFields},
};

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const NULL: &str = "This field may not be null.";
const NOT_A_STRING: &str = "Not a valid string.";
const INVALID_INTEGER: &str = "A valid integer is required.";
const INVALID_NUMBER: &str = "A valid number is required.";

/// Parses a JSON request body. An empty body reads as `{}`.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };

    serde_json::from_slice(body)
        .map_err(|e| ApiError::validation(NON_FIELD_ERRORS, format!("JSON parse error - {e}")))
}

/// Parses a boolean-like query flag such as `assigned_only`.
pub fn parse_flag(key: &str, value: Option<&str>) -> Result<bool, ApiError> {
    let Some(value) = value.map(str::trim) else {
        return Ok(false);
    };

    if let Ok(number) = value.parse::<i64>() {
        return Ok(number != 0);
    }

    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ApiError::validation(
            key,
            format!("\"{value}\" is not a valid boolean."),
        )),
    }
}

/// Trims a name and checks it fits a name column.
pub fn clean_name(name: Option<&str>) -> Result<String, String> {
    let name = name.ok_or_else(|| String::from(REQUIRED))?.trim();

    if name.is_empty() {
        return Err(String::from(BLANK));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(max_length_message());
    }

    Ok(name.to_string())
}

fn max_length_message() -> String {
    format!("Ensure this field has no more than {MAX_NAME_LENGTH} characters.")
}

/// JSON type names as they appear in error messages.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Numbers are accepted as their decimal text.
fn text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Err(String::from(NULL)),
        _ => Err(String::from(NOT_A_STRING)),
    }
}

fn name(value: Option<&Value>) -> Result<String, String> {
    match value {
        Some(value) => clean_name(Some(&text(value)?)),
        None => clean_name(None),
    }
}

/// `"12"` and `"12.0"` both read as 12.
fn whole_number(s: &str) -> Option<i64> {
    let digits = match s.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole,
        Some(_) => return None,
        None => s,
    };

    digits.parse().ok()
}

fn integer(value: &Value) -> Result<i32, String> {
    let number = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => whole_number(s.trim()),
        Value::Null => return Err(String::from(NULL)),
        _ => None,
    }
    .ok_or_else(|| String::from(INVALID_INTEGER))?;

    i32::try_from(number).map_err(|_| {
        if number > 0 {
            format!("Ensure this value is less than or equal to {}.", i32::MAX)
        } else {
            format!("Ensure this value is greater than or equal to {}.", i32::MIN)
        }
    })
}

fn decimal(value: &Value) -> Result<Decimal, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Null => return Err(String::from(NULL)),
        _ => return Err(String::from(INVALID_NUMBER)),
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| String::from(INVALID_NUMBER))
}

/// Converts `data[key]` when present, recording a failure under `key`.
fn convert<T>(
    data: &Map<String, Value>,
    key: &str,
    errors: &mut FieldErrors,
    parse: impl FnOnce(&Value) -> Result<T, String>,
) -> Option<T> {
    match parse(data.get(key)?) {
        Ok(value) => Some(value),
        Err(e) => {
            push(errors, key, &e);
            None
        }
    }
}

/// A tag or ingredient body such as `{"name": "Vegan"}`.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(transparent)]
pub struct LabelPayload(Map<String, Value>);

impl LabelPayload {
    /// `None` means a partial update that leaves the name as it is.
    pub fn validate(self, operation: Operation) -> Result<Option<String>, ApiError> {
        let value = self.0.get("name");
        if value.is_none() && !operation.is_full_write() {
            return Ok(None);
        }

        name(value)
            .map(Some)
            .map_err(|e| ApiError::validation("name", e))
    }
}

/// A recipe body. Keys are converted one by one in `validate`, so a value of
/// the wrong type is reported under its own key. Unknown keys are ignored.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(transparent)]
pub struct RecipePayload(Map<String, Value>);

/// A validated recipe write. `None` label lists leave associations untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeInput {
    pub fields: RecipeFields,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

impl RecipePayload {
    /// Validates the payload for `operation`. Fields the payload omits keep
    /// their `current` value, or the column default when creating.
    pub fn validate(
        self,
        operation: Operation,
        current: Option<&Recipe>,
    ) -> Result<RecipeInput, ApiError> {
        let data = self.0;
        let mut errors = FieldErrors::new();
        let mut fields = current.map(RecipeFields::from).unwrap_or(RecipeFields {
            title: String::new(),
            description: String::new(),
            time_minutes: 0,
            price: Decimal::ZERO,
            link: String::new(),
        });

        if operation.is_full_write() {
            for key in ["title", "time_minutes", "price"] {
                if !data.contains_key(key) {
                    push(&mut errors, key, REQUIRED);
                }
            }
        }

        if let Some(title) = convert(&data, "title", &mut errors, |v| name(Some(v))) {
            fields.title = title;
        }
        if let Some(description) = convert(&data, "description", &mut errors, text) {
            fields.description = description;
        }
        if let Some(time_minutes) = convert(&data, "time_minutes", &mut errors, integer) {
            fields.time_minutes = time_minutes;
        }
        if let Some(price) = convert(&data, "price", &mut errors, |v| clean_price(decimal(v)?)) {
            fields.price = price;
        }
        if let Some(link) = convert(&data, "link", &mut errors, |v| clean_link(&text(v)?)) {
            fields.link = link;
        }

        let tags = clean_names(data.get("tags"), "tags", &mut errors);
        let ingredients = clean_names(data.get("ingredients"), "ingredients", &mut errors);

        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        Ok(RecipeInput {
            fields,
            tags,
            ingredients,
        })
    }
}

fn push(errors: &mut FieldErrors, key: &str, message: &str) {
    errors
        .entry(key.to_string())
        .or_default()
        .push(message.to_string());
}

/// A label list must be a list of `{"name": ...}` objects. `null` is refused
/// rather than read as "leave unchanged"; omit the key for that.
fn clean_names(
    value: Option<&Value>,
    key: &str,
    errors: &mut FieldErrors,
) -> Option<Vec<String>> {
    let items = match value? {
        Value::Array(items) => items,
        Value::Null => {
            push(errors, key, NULL);
            return None;
        }
        other => {
            push(
                errors,
                key,
                &format!(
                    "Expected a list of items but got type \"{}\".",
                    type_name(other)
                ),
            );
            return None;
        }
    };

    let mut names = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(item) => match name(item.get("name")) {
                Ok(name) => names.push(name),
                Err(e) => push(errors, key, &format!("name: {e}")),
            },
            other => push(
                errors,
                key,
                &format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    type_name(other)
                ),
            ),
        }
    }

    Some(names)
}

fn clean_link(link: &str) -> Result<String, String> {
    let link = link.trim();
    if link.chars().count() > MAX_NAME_LENGTH {
        return Err(max_length_message());
    }

    Ok(link.to_string())
}

/// Prices are `NUMERIC(5, 2)`: stored with exactly two decimal places.
fn clean_price(price: Decimal) -> Result<Decimal, String> {
    let normalized = price.normalize();

    if normalized.scale() > PRICE_DECIMAL_PLACES {
        return Err(format!(
            "Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."
        ));
    }

    let whole_digits = MAX_PRICE_DIGITS - PRICE_DECIMAL_PLACES;
    if normalized.abs() >= Decimal::from(10_i64.pow(whole_digits)) {
        return Err(format!(
            "Ensure that there are no more than {whole_digits} digits before the decimal point."
        ));
    }

    let mut price = normalized;
    price.rescale(PRICE_DECIMAL_PLACES);
    Ok(price)
}
