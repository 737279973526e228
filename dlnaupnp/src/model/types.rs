//! Types de données UPnP des variables d'état et validation des valeurs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Type UPnP d'une variable d'état (`<dataType>` d'un SCPD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Ui1,
    Ui2,
    Ui4,
    Ui8,
    I1,
    I2,
    I4,
    I8,
    Int,
    R4,
    R8,
    Number,
    Fixed14_4,
    Float,
    Char,
    String,
    Date,
    DateTime,
    DateTimeTz,
    Time,
    TimeTz,
    Boolean,
    BinBase64,
    BinHex,
    Uri,
    Uuid,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Ui1 => "ui1",
            DataType::Ui2 => "ui2",
            DataType::Ui4 => "ui4",
            DataType::Ui8 => "ui8",
            DataType::I1 => "i1",
            DataType::I2 => "i2",
            DataType::I4 => "i4",
            DataType::I8 => "i8",
            DataType::Int => "int",
            DataType::R4 => "r4",
            DataType::R8 => "r8",
            DataType::Number => "number",
            DataType::Fixed14_4 => "fixed.14.4",
            DataType::Float => "float",
            DataType::Char => "char",
            DataType::String => "string",
            DataType::Date => "date",
            DataType::DateTime => "dateTime",
            DataType::DateTimeTz => "dateTime.tz",
            DataType::Time => "time",
            DataType::TimeTz => "time.tz",
            DataType::Boolean => "boolean",
            DataType::BinBase64 => "bin.base64",
            DataType::BinHex => "bin.hex",
            DataType::Uri => "uri",
            DataType::Uuid => "uuid",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Ui1
                | DataType::Ui2
                | DataType::Ui4
                | DataType::Ui8
                | DataType::I1
                | DataType::I2
                | DataType::I4
                | DataType::I8
                | DataType::Int
                | DataType::R4
                | DataType::R8
                | DataType::Number
                | DataType::Fixed14_4
                | DataType::Float
        )
    }

    /// Valeur par défaut d'une variable de ce type.
    pub fn default_value(&self) -> &'static str {
        match self {
            DataType::Boolean => "0",
            t if t.is_numeric() => "0",
            _ => "",
        }
    }

    /// Vérifie une valeur reçue et la ramène à sa forme canonique.
    ///
    /// Les booléens acceptent `1/0`, `true/false`, `yes/no` et sont normalisés
    /// en `1`/`0`. Les entiers sont vérifiés contre les bornes de leur type.
    pub fn normalize(&self, raw: &str) -> Result<String, String> {
        let value = raw.trim();
        let invalid = || format!("'{}' is not a valid {}", raw, self.as_str());

        match self {
            DataType::Ui1 => check_unsigned(value, u8::MAX as u64).ok_or_else(invalid),
            DataType::Ui2 => check_unsigned(value, u16::MAX as u64).ok_or_else(invalid),
            DataType::Ui4 => check_unsigned(value, u32::MAX as u64).ok_or_else(invalid),
            DataType::Ui8 => check_unsigned(value, u64::MAX).ok_or_else(invalid),
            DataType::I1 => check_signed(value, i8::MIN as i64, i8::MAX as i64).ok_or_else(invalid),
            DataType::I2 => {
                check_signed(value, i16::MIN as i64, i16::MAX as i64).ok_or_else(invalid)
            }
            DataType::I4 | DataType::Int => {
                check_signed(value, i32::MIN as i64, i32::MAX as i64).ok_or_else(invalid)
            }
            DataType::I8 => check_signed(value, i64::MIN, i64::MAX).ok_or_else(invalid),
            DataType::R4
            | DataType::R8
            | DataType::Number
            | DataType::Fixed14_4
            | DataType::Float => value
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|_| value.to_string())
                .ok_or_else(invalid),
            DataType::Char => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(_), None) => Ok(raw.to_string()),
                    _ => Err(invalid()),
                }
            }
            DataType::String => Ok(raw.to_string()),
            DataType::Boolean => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok("1".to_string()),
                "0" | "false" | "no" => Ok("0".to_string()),
                _ => Err(invalid()),
            },
            DataType::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|_| value.to_string())
                .map_err(|_| invalid()),
            DataType::DateTime => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| {
                    NaiveDate::parse_from_str(value, "%Y-%m-%d")
                        .map(|d| d.and_time(NaiveTime::MIN))
                })
                .map(|_| value.to_string())
                .map_err(|_| invalid()),
            DataType::DateTimeTz => DateTime::parse_from_rfc3339(value)
                .map(|_| value.to_string())
                .or_else(|_| DataType::DateTime.normalize(value))
                .map_err(|_| invalid()),
            DataType::Time => NaiveTime::parse_from_str(value, "%H:%M:%S")
                .map(|_| value.to_string())
                .map_err(|_| invalid()),
            DataType::TimeTz => {
                let time_part = value
                    .find(['+', '-', 'Z'])
                    .map(|idx| &value[..idx])
                    .unwrap_or(value);
                NaiveTime::parse_from_str(time_part, "%H:%M:%S")
                    .map(|_| value.to_string())
                    .map_err(|_| invalid())
            }
            DataType::BinBase64 => {
                let ok = value.len() % 4 == 0
                    && value
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=');
                if ok { Ok(value.to_string()) } else { Err(invalid()) }
            }
            DataType::BinHex => {
                let ok = value.len() % 2 == 0 && value.chars().all(|c| c.is_ascii_hexdigit());
                if ok { Ok(value.to_string()) } else { Err(invalid()) }
            }
            DataType::Uri => url::Url::parse(value)
                .map(|_| value.to_string())
                .map_err(|_| invalid()),
            DataType::Uuid => uuid::Uuid::parse_str(value.strip_prefix("uuid:").unwrap_or(value))
                .map(|_| value.to_string())
                .map_err(|_| invalid()),
        }
    }
}

fn check_unsigned(value: &str, max: u64) -> Option<String> {
    let n = value.strip_prefix('+').unwrap_or(value).parse::<u64>().ok()?;
    (n <= max).then(|| n.to_string())
}

fn check_signed(value: &str, min: i64, max: i64) -> Option<String> {
    let n = value.strip_prefix('+').unwrap_or(value).parse::<i64>().ok()?;
    (n >= min && n <= max).then(|| n.to_string())
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = match s.trim() {
            "ui1" => DataType::Ui1,
            "ui2" => DataType::Ui2,
            "ui4" => DataType::Ui4,
            "ui8" => DataType::Ui8,
            "i1" => DataType::I1,
            "i2" => DataType::I2,
            "i4" => DataType::I4,
            "i8" => DataType::I8,
            "int" => DataType::Int,
            "r4" => DataType::R4,
            "r8" => DataType::R8,
            "number" => DataType::Number,
            "fixed.14.4" => DataType::Fixed14_4,
            "float" => DataType::Float,
            "char" => DataType::Char,
            "string" => DataType::String,
            "date" => DataType::Date,
            "dateTime" => DataType::DateTime,
            "dateTime.tz" => DataType::DateTimeTz,
            "time" => DataType::Time,
            "time.tz" => DataType::TimeTz,
            "boolean" => DataType::Boolean,
            "bin.base64" => DataType::BinBase64,
            "bin.hex" => DataType::BinHex,
            "uri" => DataType::Uri,
            "uuid" => DataType::Uuid,
            other => return Err(format!("Unknown UPnP data type: {}", other)),
        };
        Ok(t)
    }
}

/// Intervalle autorisé d'une variable numérique (`<allowedValueRange>`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllowedRange {
    pub minimum: f64,
    pub maximum: f64,
    pub step: Option<f64>,
}

impl AllowedRange {
    pub fn new(minimum: f64, maximum: f64) -> Self {
        Self {
            minimum,
            maximum,
            step: None,
        }
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn contains(&self, value: f64) -> bool {
        if value < self.minimum || value > self.maximum {
            return false;
        }
        match self.step {
            Some(step) if step > 0.0 => {
                let steps = (value - self.minimum) / step;
                (steps - steps.round()).abs() < 1e-9
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_bounds() {
        assert_eq!(DataType::Ui1.normalize("255"), Ok("255".into()));
        assert!(DataType::Ui1.normalize("256").is_err());
        assert!(DataType::Ui4.normalize("-1").is_err());
        assert_eq!(DataType::I2.normalize("-32768"), Ok("-32768".into()));
        assert_eq!(DataType::I4.normalize(" +12 "), Ok("12".into()));
        assert!(DataType::I4.normalize("twelve").is_err());
    }

    #[test]
    fn test_boolean_normalization() {
        assert_eq!(DataType::Boolean.normalize("true"), Ok("1".into()));
        assert_eq!(DataType::Boolean.normalize("YES"), Ok("1".into()));
        assert_eq!(DataType::Boolean.normalize("0"), Ok("0".into()));
        assert!(DataType::Boolean.normalize("maybe").is_err());
    }

    #[test]
    fn test_other_types() {
        assert!(DataType::Uri.normalize("http://10.0.0.1/a").is_ok());
        assert!(DataType::Uri.normalize("not a uri").is_err());
        assert!(DataType::Date.normalize("2024-02-29").is_ok());
        assert!(DataType::Date.normalize("2023-02-29").is_err());
        assert!(DataType::Time.normalize("12:30:00").is_ok());
        assert!(DataType::Char.normalize("ab").is_err());
        assert!(DataType::BinHex.normalize("0aF3").is_ok());
        assert!(DataType::R8.normalize("NaN").is_err());
    }

    #[test]
    fn test_parse_data_type() {
        assert_eq!("dateTime.tz".parse::<DataType>(), Ok(DataType::DateTimeTz));
        assert_eq!(DataType::Fixed14_4.to_string(), "fixed.14.4");
        assert!("ui16".parse::<DataType>().is_err());
    }

    #[test]
    fn test_allowed_range() {
        let range = AllowedRange::new(0.0, 100.0).with_step(5.0);
        assert!(range.contains(0.0));
        assert!(range.contains(55.0));
        assert!(!range.contains(56.0));
        assert!(!range.contains(105.0));
    }
}
