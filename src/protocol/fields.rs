//! Strict `KEY:value|KEY:value` segment reader shared by every content kind.

use std::str::FromStr;

use crate::error::ProtocolError;
use crate::model::Location;

pub(super) const SEGMENT_SEP: char = '|';
pub(super) const KEY_SEP: char = ':';
pub(super) const LIST_SEP: char = ',';
pub(super) const PAIR_SEP: char = ';';

/// Characters that cannot appear inside a name.
const RESERVED: [char; 4] = [SEGMENT_SEP, KEY_SEP, LIST_SEP, PAIR_SEP];

/// Values of a content string, checked against a fixed key set.
pub(super) struct Fields<'a> {
    entries: Vec<(&'static str, &'a str)>,
}

impl<'a> Fields<'a> {
    /// Splits `raw` into segments and requires exactly the keys in `expected`.
    pub(super) fn parse(raw: &'a str, expected: &[&'static str]) -> Result<Self, ProtocolError> {
        let mut entries: Vec<(&'static str, &'a str)> = Vec::with_capacity(expected.len());

        for segment in raw.split(SEGMENT_SEP) {
            let (key, value) =
                segment
                    .split_once(KEY_SEP)
                    .ok_or_else(|| ProtocolError::MalformedSegment {
                        segment: segment.to_string(),
                    })?;
            let known = expected.iter().copied().find(|k| *k == key).ok_or_else(|| {
                ProtocolError::UnexpectedField {
                    field: key.to_string(),
                }
            })?;
            if entries.iter().any(|(k, _)| *k == known) {
                return Err(ProtocolError::DuplicateField {
                    field: key.to_string(),
                });
            }
            entries.push((known, value));
        }

        if let Some(missing) = expected
            .iter()
            .copied()
            .find(|k| !entries.iter().any(|(e, _)| e == k))
        {
            return Err(ProtocolError::MissingField { field: missing });
        }
        Ok(Self { entries })
    }

    pub(super) fn text(&self, key: &'static str) -> Result<&'a str, ProtocolError> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or(ProtocolError::MissingField { field: key })
    }

    /// A non-empty name without reserved characters.
    pub(super) fn name(&self, key: &'static str) -> Result<String, ProtocolError> {
        let raw = self.text(key)?;
        if raw.is_empty() {
            return Err(invalid(key, raw));
        }
        Ok(raw.to_string())
    }

    pub(super) fn number<T: FromStr>(&self, key: &'static str) -> Result<T, ProtocolError> {
        let raw = self.text(key)?;
        raw.parse().map_err(|_| invalid(key, raw))
    }

    pub(super) fn float(&self, key: &'static str) -> Result<f64, ProtocolError> {
        let raw = self.text(key)?;
        parse_float(key, raw)
    }

    /// Comma-separated non-empty list.
    pub(super) fn list<T, F>(&self, key: &'static str, mut item: F) -> Result<Vec<T>, ProtocolError>
    where
        F: FnMut(&'a str) -> Result<T, ProtocolError>,
    {
        let raw = self.text(key)?;
        if raw.is_empty() {
            return Err(invalid(key, raw));
        }
        raw.split(LIST_SEP).map(&mut item).collect()
    }

    /// `x,y;x,y;...` pairs.
    pub(super) fn coords(&self, key: &'static str) -> Result<Vec<Location>, ProtocolError> {
        let raw = self.text(key)?;
        if raw.is_empty() {
            return Err(invalid(key, raw));
        }
        raw.split(PAIR_SEP)
            .map(|pair| -> Result<Location, ProtocolError> {
                let (x, y) = pair.split_once(LIST_SEP).ok_or_else(|| invalid(key, pair))?;
                Ok(Location::new(parse_float(key, x)?, parse_float(key, y)?))
            })
            .collect()
    }
}

pub(super) fn invalid(field: &'static str, value: &str) -> ProtocolError {
    ProtocolError::InvalidValue {
        field,
        value: value.to_string(),
    }
}

fn parse_float(key: &'static str, raw: &str) -> Result<f64, ProtocolError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(key, raw)),
    }
}

/// Rejects names that would break the segment structure once encoded.
pub(super) fn check_name<'v>(field: &'static str, value: &'v str) -> Result<&'v str, ProtocolError> {
    if value.is_empty() {
        return Err(invalid(field, value));
    }
    if value.contains(RESERVED) {
        return Err(ProtocolError::ReservedCharacter {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// Free text may contain anything but the segment separator.
pub(super) fn check_text<'v>(field: &'static str, value: &'v str) -> Result<&'v str, ProtocolError> {
    if value.contains(SEGMENT_SEP) {
        return Err(ProtocolError::ReservedCharacter {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// Shortest round-trip rendering with a mandatory fractional part (`1000.0`).
pub(super) fn exact_float(v: f64) -> String {
    format!("{v:?}")
}

/// Two-decimal rendering used for positions and distances.
pub(super) fn fixed_float(v: f64) -> String {
    format!("{v:.2}")
}
