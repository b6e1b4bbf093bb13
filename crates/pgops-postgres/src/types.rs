//! Conversion between [`Value`] and PostgreSQL wire values.
//!
//! Parameters are encoded for the type the server inferred for each
//! placeholder, so a `Value::BigInt` bound against an `int4` column is sent
//! as `int4` and numeric text bound against `numeric` is sent as `numeric`.
//! Result columns are decoded by column type; types without a mapping come
//! back as their raw binary form.

use std::error::Error as StdError;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use pgops_core::{ColumnInfo, Result, Row, Value};
use postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};

use crate::error::from_pg;

type BoxError = Box<dyn StdError + Sync + Send>;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// A bind parameter borrowed from a [`Value`].
#[derive(Debug)]
pub struct PgParam<'a>(pub &'a Value);

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        encode(self.0, ty, out)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!(
        "cannot bind {} value {value} to a parameter of type {ty}",
        value.type_name()
    )
    .into()
}

fn encode(value: &Value, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    if value.is_null() {
        return Ok(IsNull::Yes);
    }
    match *ty {
        Type::BOOL => value
            .as_bool()
            .ok_or_else(|| mismatch(value, ty))?
            .to_sql(ty, out),
        Type::INT2 => i16::try_from(integer(value, ty)?)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(integer(value, ty)?)?.to_sql(ty, out),
        Type::INT8 => integer(value, ty)?.to_sql(ty, out),
        Type::OID => u32::try_from(integer(value, ty)?)?.to_sql(ty, out),
        Type::FLOAT4 => (float(value, ty)? as f32).to_sql(ty, out),
        Type::FLOAT8 => float(value, ty)?.to_sql(ty, out),
        Type::NUMERIC => encode_numeric(&numeric_text(value, ty)?, out),
        Type::BYTEA => match value {
            Value::Bytes(b) => b.as_slice().to_sql(ty, out),
            Value::Text(s) => s.as_bytes().to_sql(ty, out),
            _ => Err(mismatch(value, ty)),
        },
        Type::JSON | Type::JSONB => json(value).to_sql(ty, out),
        Type::BOOL_ARRAY
        | Type::INT2_ARRAY
        | Type::INT4_ARRAY
        | Type::INT8_ARRAY
        | Type::FLOAT4_ARRAY
        | Type::FLOAT8_ARRAY
        | Type::TEXT_ARRAY
        | Type::VARCHAR_ARRAY => encode_array(value, ty, out),
        _ if <&str as ToSql>::accepts(ty) => text(value, ty)?.as_str().to_sql(ty, out),
        _ => Err(mismatch(value, ty)),
    }
}

fn integer(value: &Value, ty: &Type) -> std::result::Result<i64, BoxError> {
    match value {
        Value::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        Value::Double(f) if f.fract() == 0.0 => Ok(*f as i64),
        other => other.as_i64().ok_or_else(|| mismatch(value, ty)),
    }
}

fn float(value: &Value, ty: &Type) -> std::result::Result<f64, BoxError> {
    value.as_f64().ok_or_else(|| mismatch(value, ty))
}

fn numeric_text(value: &Value, ty: &Type) -> std::result::Result<String, BoxError> {
    match value {
        Value::SmallInt(v) => Ok(v.to_string()),
        Value::Int(v) => Ok(v.to_string()),
        Value::BigInt(v) => Ok(v.to_string()),
        Value::Float(v) => Ok(v.to_string()),
        Value::Double(v) => Ok(v.to_string()),
        Value::Text(s) => Ok(s.clone()),
        Value::Json(serde_json::Value::Number(n)) => Ok(n.to_string()),
        _ => Err(mismatch(value, ty)),
    }
}

fn text(value: &Value, ty: &Type) -> std::result::Result<String, BoxError> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::SmallInt(v) => Ok(v.to_string()),
        Value::Int(v) => Ok(v.to_string()),
        Value::BigInt(v) => Ok(v.to_string()),
        Value::Float(v) => Ok(v.to_string()),
        Value::Double(v) => Ok(v.to_string()),
        Value::Json(serde_json::Value::String(s)) => Ok(s.clone()),
        Value::Json(j) => Ok(j.to_string()),
        Value::Array(_) => Ok(value.to_json().to_string()),
        Value::Bytes(b) => String::from_utf8(b.clone()).map_err(|_| mismatch(value, ty)),
        Value::Null => Err(mismatch(value, ty)),
    }
}

fn json(value: &Value) -> serde_json::Value {
    match value {
        Value::Json(j) => j.clone(),
        Value::Text(s) => {
            serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.clone()))
        }
        other => other.to_json(),
    }
}

fn encode_array(value: &Value, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    let Value::Array(items) = value else {
        return Err(mismatch(value, ty));
    };
    // The driver encodes each element against the array's member type.
    let elements: Vec<PgParam<'_>> = items.iter().map(PgParam).collect();
    elements.to_sql(ty, out)
}

fn put_numeric_header(out: &mut BytesMut, ndigits: i16, weight: i16, sign: u16, dscale: u16) {
    out.put_i16(ndigits);
    out.put_i16(weight);
    out.put_u16(sign);
    out.put_u16(dscale);
}

/// Encode a decimal string in the binary `numeric` format.
pub(crate) fn encode_numeric(text: &str, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    let text = text.trim();
    match text.to_ascii_lowercase().as_str() {
        "nan" => {
            put_numeric_header(out, 0, 0, NUMERIC_NAN, 0);
            return Ok(IsNull::No);
        }
        "infinity" | "inf" => {
            put_numeric_header(out, 0, 0, NUMERIC_PINF, 0);
            return Ok(IsNull::No);
        }
        "-infinity" | "-inf" => {
            put_numeric_header(out, 0, 0, NUMERIC_NINF, 0);
            return Ok(IsNull::No);
        }
        _ => {}
    }

    // Exponent notation goes through f64 and back to plain decimal.
    let plain;
    let text = if text.contains(['e', 'E']) {
        let parsed: f64 = text
            .parse()
            .map_err(|_| format!("invalid numeric value '{text}'"))?;
        plain = parsed.to_string();
        plain.as_str()
    } else {
        text
    };

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = int_part
        .bytes()
        .chain(frac_part.bytes())
        .all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits {
        return Err(format!("invalid numeric value '{text}'").into());
    }

    let int_part = int_part.trim_start_matches('0');
    let dscale = u16::try_from(frac_part.len())?;

    let mut padded = "0".repeat((4 - int_part.len() % 4) % 4);
    padded.push_str(int_part);
    let int_groups = padded.len() / 4;
    padded.push_str(frac_part);
    padded.push_str(&"0".repeat((4 - frac_part.len() % 4) % 4));

    let mut groups: Vec<i16> = padded
        .as_bytes()
        .chunks(4)
        .map(|chunk| chunk.iter().fold(0_i16, |acc, b| acc * 10 + i16::from(b - b'0')))
        .collect();
    let mut weight = int_groups as i32 - 1;

    let leading = groups.iter().take_while(|g| **g == 0).count();
    groups.drain(..leading);
    weight -= leading as i32;
    while groups.last() == Some(&0) {
        groups.pop();
    }
    if groups.is_empty() {
        weight = 0;
    }

    let sign = if negative && !groups.is_empty() {
        NUMERIC_NEG
    } else {
        NUMERIC_POS
    };
    put_numeric_header(
        out,
        i16::try_from(groups.len())?,
        i16::try_from(weight)?,
        sign,
        dscale,
    );
    for group in groups {
        out.put_i16(group);
    }
    Ok(IsNull::No)
}

/// Decode a binary `numeric` into its decimal text.
pub(crate) fn decode_numeric(raw: &[u8]) -> std::result::Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("numeric value too short".into());
    }
    let read_i16 = |at: usize| i16::from_be_bytes([raw[at], raw[at + 1]]);
    let ndigits = usize::try_from(read_i16(0))?;
    let weight = i32::from(read_i16(2));
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = usize::from(u16::from_be_bytes([raw[6], raw[7]]));

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }
    if raw.len() < 8 + ndigits * 2 {
        return Err("numeric value truncated".into());
    }
    let digits: Vec<i16> = (0..ndigits).map(|i| read_i16(8 + i * 2)).collect();
    let digit_at = |i: i32| -> i16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                out.push_str(&digit_at(i).to_string());
            } else {
                out.push_str(&format!("{:04}", digit_at(i)));
            }
        }
    }
    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", digit_at(i)));
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Ok(out)
}

struct NumericText(String);

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        decode_numeric(raw).map(NumericText)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Any column, kept as the bytes the server sent.
struct RawBytes(Vec<u8>);

impl<'a> FromSql<'a> for RawBytes {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(RawBytes(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn get<'a, T: FromSql<'a>>(
    row: &'a postgres::Row,
    idx: usize,
    wrap: impl FnOnce(T) -> Value,
) -> Result<Value> {
    let value: Option<T> = row.try_get(idx).map_err(from_pg)?;
    Ok(value.map_or(Value::Null, wrap))
}

fn array<'a, T: FromSql<'a>>(
    row: &'a postgres::Row,
    idx: usize,
    wrap: impl Fn(T) -> Value,
) -> Result<Value> {
    get(row, idx, |items: Vec<Option<T>>| {
        Value::Array(
            items
                .into_iter()
                .map(|item| item.map_or(Value::Null, &wrap))
                .collect(),
        )
    })
}

/// Decode one column of a result row.
pub fn decode_column(row: &postgres::Row, idx: usize) -> Result<Value> {
    let ty = row.columns()[idx].type_();
    match *ty {
        Type::BOOL => get(row, idx, Value::Bool),
        Type::INT2 => get(row, idx, Value::SmallInt),
        Type::INT4 => get(row, idx, Value::Int),
        Type::INT8 => get(row, idx, Value::BigInt),
        Type::OID => get(row, idx, |v: u32| Value::BigInt(i64::from(v))),
        Type::FLOAT4 => get(row, idx, Value::Float),
        Type::FLOAT8 => get(row, idx, Value::Double),
        Type::NUMERIC => get(row, idx, |v: NumericText| Value::Text(v.0)),
        Type::BYTEA => get(row, idx, Value::Bytes),
        Type::JSON | Type::JSONB => get(row, idx, Value::Json),
        Type::BOOL_ARRAY => array(row, idx, Value::Bool),
        Type::INT2_ARRAY => array(row, idx, Value::SmallInt),
        Type::INT4_ARRAY => array(row, idx, Value::Int),
        Type::INT8_ARRAY => array(row, idx, Value::BigInt),
        Type::FLOAT4_ARRAY => array(row, idx, Value::Float),
        Type::FLOAT8_ARRAY => array(row, idx, Value::Double),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::NAME_ARRAY => {
            array(row, idx, Value::Text)
        }
        _ if <String as FromSql>::accepts(ty) => get(row, idx, Value::Text),
        _ => get(row, idx, |v: RawBytes| Value::Bytes(v.0)),
    }
}

/// Decode driver rows, sharing one column list across all of them.
pub fn decode_rows(rows: &[postgres::Row]) -> Result<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns = Arc::new(ColumnInfo::new(
        first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    ));
    rows.iter()
        .map(|row| {
            let values = (0..row.len())
                .map(|idx| decode_column(row, idx))
                .collect::<Result<Vec<_>>>()?;
            Ok(Row::with_columns(Arc::clone(&columns), values))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_roundtrip(text: &str) -> String {
        let mut buf = BytesMut::new();
        encode_numeric(text, &mut buf).unwrap();
        decode_numeric(&buf).unwrap()
    }

    fn numeric_words(text: &str) -> Vec<i16> {
        let mut buf = BytesMut::new();
        encode_numeric(text, &mut buf).unwrap();
        buf.chunks(2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn numeric_binary_layout() {
        // ndigits, weight, sign, dscale, digits...
        assert_eq!(numeric_words("123.45"), vec![2, 0, 0, 2, 123, 4500]);
        assert_eq!(numeric_words("10000"), vec![1, 1, 0, 0, 1]);
        assert_eq!(numeric_words("0.00001"), vec![1, -2, 0, 5, 1000]);
        assert_eq!(numeric_words("0"), vec![0, 0, 0, 0]);
        assert_eq!(numeric_words("-7"), vec![1, 0, 0x4000, 0, 7]);
    }

    #[test]
    fn numeric_text_survives_encoding() {
        for text in ["12.15", "-0.5", "100", "0.0001", "123456789.000001", "0"] {
            assert_eq!(numeric_roundtrip(text), text);
        }
        assert_eq!(numeric_roundtrip("+3.50"), "3.50");
        assert_eq!(numeric_roundtrip("1.5e3"), "1500");
        assert_eq!(numeric_roundtrip("NaN"), "NaN");
    }

    #[test]
    fn numeric_rejects_garbage() {
        let mut buf = BytesMut::new();
        assert!(encode_numeric("12,5", &mut buf).is_err());
        assert!(encode_numeric("", &mut buf).is_err());
        assert!(encode_numeric("-", &mut buf).is_err());
        assert!(decode_numeric(&[0, 1]).is_err());
    }

    #[test]
    fn params_coerce_to_server_type() {
        let mut buf = BytesMut::new();
        PgParam(&Value::BigInt(7)).to_sql(&Type::INT4, &mut buf).unwrap();
        assert_eq!(&buf[..], &7_i32.to_be_bytes());

        let mut buf = BytesMut::new();
        PgParam(&Value::Text("3".into()))
            .to_sql(&Type::INT8, &mut buf)
            .unwrap();
        assert_eq!(&buf[..], &3_i64.to_be_bytes());

        let mut buf = BytesMut::new();
        PgParam(&Value::Int(2)).to_sql(&Type::FLOAT8, &mut buf).unwrap();
        assert_eq!(&buf[..], &2.0_f64.to_be_bytes());

        let mut buf = BytesMut::new();
        PgParam(&Value::Double(12.5))
            .to_sql(&Type::TEXT, &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"12.5");
    }

    #[test]
    fn null_and_mismatches() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            PgParam(&Value::Null).to_sql(&Type::INT4, &mut buf),
            Ok(IsNull::Yes)
        ));
        assert!(PgParam(&Value::BigInt(1 << 40)).to_sql(&Type::INT4, &mut buf).is_err());
        assert!(PgParam(&Value::Text("x".into())).to_sql(&Type::INT4, &mut buf).is_err());
        assert!(PgParam(&Value::Int(1)).to_sql(&Type::DATE, &mut buf).is_err());
    }

    #[test]
    fn json_params() {
        let mut buf = BytesMut::new();
        PgParam(&Value::Text("{\"a\":1}".into()))
            .to_sql(&Type::JSON, &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"{\"a\":1}");
    }
}
