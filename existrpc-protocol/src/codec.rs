//! Encoder and decoder for XML-RPC values and envelopes.
//!
//! | value      | element                              |
//! |------------|--------------------------------------|
//! | `Int`      | `<int>` (also reads `<i4>`, `<i8>`)  |
//! | `Double`   | `<double>`                           |
//! | `Bool`     | `<boolean>` as `1` / `0`             |
//! | `String`   | `<string>`                           |
//! | `Base64`   | `<base64>`, standard alphabet        |
//! | `DateTime` | `<dateTime.iso8601>`, UTC            |
//! | `Nil`      | `<nil/>`                             |
//! | `Array`    | `<array><data><value>..</data></array>` |
//! | `Struct`   | `<struct><member><name>..</struct>`  |

use crate::error::{DecodeError, EncodeError};
use crate::message::{Fault, FaultCode, MethodCall, MethodResponse};
use crate::value::{Struct, Value};
use crate::xml::{self, escape, Element};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

const XML_DECLARATION: &str = "<?xml version=\"1.0\"?>";

/// Naive timestamp layouts accepted after RFC 3339 fails; read as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 3] = [
    "%Y%m%dT%H:%M:%S",
    "%Y%m%dT%H%M%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Encodes calls, responses and values to XML-RPC.
pub struct Encoder;

impl Encoder {
    /// Encodes a request envelope after checking every parameter with
    /// [`Encoder::validate`].
    pub fn try_encode_call(call: &MethodCall) -> Result<Bytes, EncodeError> {
        call.params.iter().try_for_each(Self::validate)?;
        Ok(Self::encode_call(call))
    }

    /// Rejects values XML-RPC has no representation for: NaN and infinite doubles.
    pub fn validate(value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Double(d) if !d.is_finite() => Err(EncodeError::NonFiniteDouble(*d)),
            Value::Array(items) => items.iter().try_for_each(Self::validate),
            Value::Struct(members) => members.iter().try_for_each(|(_, v)| Self::validate(v)),
            _ => Ok(()),
        }
    }

    /// Encodes a request envelope, XML declaration included.
    ///
    /// Does not validate: non-finite doubles are written as `NaN` or `inf`,
    /// which peers reject. Use [`Encoder::try_encode_call`] for untrusted values.
    pub fn encode_call(call: &MethodCall) -> Bytes {
        let mut out = String::with_capacity(128);
        out.push_str(XML_DECLARATION);
        out.push_str("<methodCall><methodName>");
        out.push_str(&escape(&call.method_name));
        out.push_str("</methodName><params>");
        for param in &call.params {
            out.push_str("<param>");
            write_value(&mut out, param);
            out.push_str("</param>");
        }
        out.push_str("</params></methodCall>");
        Bytes::from(out)
    }

    /// Encodes a response envelope. Used by servers and test doubles.
    pub fn encode_response(response: &MethodResponse) -> Bytes {
        let mut out = String::with_capacity(128);
        out.push_str(XML_DECLARATION);
        out.push_str("<methodResponse>");
        match response {
            MethodResponse::Success(value) => {
                out.push_str("<params><param>");
                write_value(&mut out, value);
                out.push_str("</param></params>");
            }
            MethodResponse::Fault(fault) => {
                out.push_str("<fault>");
                write_value(&mut out, &Value::Struct(fault.to_struct()));
                out.push_str("</fault>");
            }
        }
        out.push_str("</methodResponse>");
        Bytes::from(out)
    }

    /// Encodes the typed element for a value, without the `<value>` wrapper.
    pub fn encode_value(value: &Value) -> String {
        let mut out = String::new();
        write_typed(&mut out, value);
        out
    }
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    write_typed(out, value);
    out.push_str("</value>");
}

fn write_typed(out: &mut String, value: &Value) {
    match value {
        Value::Int(i) => {
            out.push_str("<int>");
            out.push_str(&i.to_string());
            out.push_str("</int>");
        }
        Value::Double(d) => {
            out.push_str("<double>");
            out.push_str(&d.to_string());
            out.push_str("</double>");
        }
        Value::Bool(b) => out.push_str(if *b {
            "<boolean>1</boolean>"
        } else {
            "<boolean>0</boolean>"
        }),
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s));
            out.push_str("</string>");
        }
        Value::Base64(bytes) => {
            out.push_str("<base64>");
            out.push_str(&STANDARD.encode(bytes));
            out.push_str("</base64>");
        }
        Value::DateTime(dt) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true));
            out.push_str("</dateTime.iso8601>");
        }
        Value::Nil => out.push_str("<nil/>"),
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, item) in members.iter() {
                out.push_str("<member><name>");
                out.push_str(&escape(name));
                out.push_str("</name>");
                write_value(out, item);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
}

/// Decodes XML-RPC envelopes and values.
pub struct Decoder;

impl Decoder {
    /// Decodes a `<methodResponse>` body into a success value or a fault.
    pub fn decode_response(body: &[u8]) -> Result<MethodResponse, DecodeError> {
        let root = parse_body(body)?;
        if root.name != "methodResponse" {
            return Err(DecodeError::NotMethodResponse(root.name));
        }

        if let Some(fault) = root.child("fault") {
            if root.child("params").is_some() {
                return Err(DecodeError::ParamsAndFault);
            }
            if let Some(value) = fault.child("value") {
                return decode_fault(value).map(MethodResponse::Fault);
            }
        }

        root.child("params")
            .and_then(|p| p.child("param"))
            .and_then(|p| p.child("value"))
            .ok_or(DecodeError::NoParamsOrFault)
            .and_then(Self::decode_value)
            .map(MethodResponse::Success)
    }

    /// Decodes a `<methodCall>` body. Used by servers and test doubles.
    pub fn decode_call(body: &[u8]) -> Result<MethodCall, DecodeError> {
        let root = parse_body(body)?;
        if root.name != "methodCall" {
            return Err(DecodeError::NotMethodCall(root.name));
        }

        let method_name = root
            .child("methodName")
            .ok_or(DecodeError::MissingElement("methodName"))?
            .text
            .trim()
            .to_string();

        let mut params = Vec::new();
        if let Some(list) = root.child("params") {
            for param in list.children_named("param") {
                let value = param
                    .child("value")
                    .ok_or(DecodeError::MissingElement("value"))?;
                params.push(Self::decode_value(value)?);
            }
        }

        Ok(MethodCall {
            method_name,
            params,
        })
    }

    /// Decodes a `<value>` element.
    ///
    /// A `<value>` without a typed child yields its raw text as a string.
    pub fn decode_value(element: &Element) -> Result<Value, DecodeError> {
        match element.children.as_slice() {
            [] => Ok(Value::String(element.text.clone())),
            [typed] => decode_typed(typed),
            [_, extra, ..] => Err(DecodeError::UnexpectedElement {
                parent: "value",
                found: extra.name.clone(),
            }),
        }
    }
}

fn parse_body(body: &[u8]) -> Result<Element, DecodeError> {
    let text = std::str::from_utf8(body).map_err(|_| DecodeError::InvalidUtf8)?;
    Ok(xml::parse(text)?)
}

fn invalid(element: &Element) -> DecodeError {
    DecodeError::InvalidScalar {
        tag: element.name.clone(),
        text: element.text.clone(),
    }
}

fn decode_typed(element: &Element) -> Result<Value, DecodeError> {
    let text = element.text.trim();
    match element.name.as_str() {
        "int" | "i4" | "i8" => text
            .parse()
            .map(Value::Int)
            .map_err(|_| invalid(element)),
        "double" => text
            .parse()
            .map(Value::Double)
            .map_err(|_| invalid(element)),
        "boolean" => match text {
            "1" | "true" => Ok(Value::Bool(true)),
            "0" | "false" => Ok(Value::Bool(false)),
            _ => Err(invalid(element)),
        },
        "string" => Ok(Value::String(element.text.clone())),
        "base64" => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD
                .decode(compact)
                .map(Value::Base64)
                .map_err(|_| invalid(element))
        }
        "dateTime.iso8601" => parse_datetime(text)
            .map(Value::DateTime)
            .ok_or_else(|| invalid(element)),
        "nil" => Ok(Value::Nil),
        "array" => {
            let data = element
                .child("data")
                .ok_or(DecodeError::MissingElement("data"))?;
            data.children
                .iter()
                .map(|item| {
                    if item.name != "value" {
                        return Err(DecodeError::UnexpectedElement {
                            parent: "data",
                            found: item.name.clone(),
                        });
                    }
                    Decoder::decode_value(item)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "struct" => {
            let mut members = Struct::new();
            for member in &element.children {
                if member.name != "member" {
                    return Err(DecodeError::UnexpectedElement {
                        parent: "struct",
                        found: member.name.clone(),
                    });
                }
                match (member.child("name"), member.child("value")) {
                    (Some(name), Some(value)) => {
                        members.insert(name.text.clone(), Decoder::decode_value(value)?);
                    }
                    _ => return Err(DecodeError::MalformedMember),
                }
            }
            Ok(Value::Struct(members))
        }
        other => Err(DecodeError::UnknownType(other.to_string())),
    }
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = text.strip_suffix('Z').unwrap_or(text);
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
}

fn decode_fault(value: &Element) -> Result<Fault, DecodeError> {
    let members = match Decoder::decode_value(value)? {
        Value::Struct(members) => members,
        _ => return Err(DecodeError::InvalidFault),
    };

    let code = match members.get("faultCode") {
        Some(Value::Int(i)) => FaultCode::Int(*i),
        Some(Value::String(s)) => FaultCode::Text(s.clone()),
        _ => return Err(DecodeError::InvalidFault),
    };
    let message = match members.get("faultString") {
        Some(Value::String(s)) => s.clone(),
        _ => return Err(DecodeError::InvalidFault),
    };

    Ok(Fault { code, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, ParseErrorKind};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn wrap(typed: &str) -> Value {
        let el = xml::parse(&format!("<value>{}</value>", typed)).unwrap();
        Decoder::decode_value(&el).unwrap()
    }

    fn roundtrip(value: &Value) -> Value {
        let xml = format!("<value>{}</value>", Encoder::encode_value(value));
        let el = xml::parse(&xml).unwrap();
        Decoder::decode_value(&el).unwrap()
    }

    fn sample_struct() -> Value {
        Value::Struct(
            Struct::new()
                .with("zeta", 1)
                .with("alpha", "a&b")
                .with("nested", Value::Array(vec![Value::Nil, Value::Bool(false)])),
        )
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(Encoder::encode_value(&Value::Int(-42)), "<int>-42</int>");
        assert_eq!(Encoder::encode_value(&Value::Double(1.5)), "<double>1.5</double>");
        assert_eq!(Encoder::encode_value(&Value::Bool(true)), "<boolean>1</boolean>");
        assert_eq!(Encoder::encode_value(&Value::Bool(false)), "<boolean>0</boolean>");
        assert_eq!(
            Encoder::encode_value(&Value::from("<a & 'b'>")),
            "<string>&lt;a &amp; &apos;b&apos;&gt;</string>"
        );
        assert_eq!(
            Encoder::encode_value(&Value::Base64(b"hello".to_vec())),
            "<base64>aGVsbG8=</base64>"
        );
        assert_eq!(Encoder::encode_value(&Value::Nil), "<nil/>");
    }

    #[test]
    fn test_encode_datetime_utc() {
        let dt = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            Encoder::encode_value(&Value::DateTime(dt)),
            "<dateTime.iso8601>2023-01-02T03:04:05Z</dateTime.iso8601>"
        );
    }

    #[test]
    fn test_encode_composites() {
        let v = Value::Array(vec![Value::Int(1), Value::from("x")]);
        assert_eq!(
            Encoder::encode_value(&v),
            "<array><data><value><int>1</int></value><value><string>x</string></value></data></array>"
        );

        let encoded = Encoder::encode_value(&sample_struct());
        let zeta = encoded.find("zeta").unwrap();
        let alpha = encoded.find("alpha").unwrap();
        assert!(zeta < alpha, "struct members must keep insertion order");
        assert!(encoded.starts_with("<struct><member><name>zeta</name><value><int>1</int>"));
    }

    #[test]
    fn test_encode_call_envelope() {
        let call = MethodCall::new("query").with_params(vec![Value::from("1+1"), Value::Int(1)]);
        let body = Encoder::encode_call(&call);
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            "<?xml version=\"1.0\"?><methodCall><methodName>query</methodName><params>\
             <param><value><string>1+1</string></value></param>\
             <param><value><int>1</int></value></param></params></methodCall>"
        );
    }

    #[test]
    fn test_encode_call_without_params() {
        let body = Encoder::encode_call(&MethodCall::new("sync"));
        assert!(std::str::from_utf8(&body)
            .unwrap()
            .ends_with("<methodName>sync</methodName><params></params></methodCall>"));
    }

    #[test]
    fn test_roundtrip_every_type() {
        let dt = Utc.with_ymd_and_hms(2021, 12, 31, 23, 59, 58).unwrap()
            + chrono::Duration::milliseconds(123);
        let values = vec![
            Value::Int(i64::MAX),
            Value::Int(-7),
            Value::Double(0.1),
            Value::Double(-12345.678),
            Value::Bool(true),
            Value::from(""),
            Value::from("  spaced <xml> & \"quotes\"  "),
            Value::Base64(vec![0, 255, 10, 13, 128]),
            Value::Base64(Vec::new()),
            Value::DateTime(dt),
            Value::Nil,
            Value::Array(vec![]),
            sample_struct(),
            Value::Struct(Struct::new()),
        ];
        for v in values {
            assert_eq!(roundtrip(&v), v);
        }
    }

    #[test]
    fn test_untyped_value_decodes_as_string() {
        assert_eq!(wrap("42"), Value::from("42"));
        assert_eq!(wrap(""), Value::from(""));
        assert_eq!(wrap("a &amp; b"), Value::from("a & b"));
    }

    #[test]
    fn test_decode_integer_aliases() {
        assert_eq!(wrap("<i4> 12 </i4>"), Value::Int(12));
        assert_eq!(wrap("<i8>9007199254740993</i8>"), Value::Int(9007199254740993));
    }

    #[test]
    fn test_decode_boolean_words() {
        assert_eq!(wrap("<boolean>true</boolean>"), Value::Bool(true));
        assert_eq!(wrap("<boolean>0</boolean>"), Value::Bool(false));
    }

    #[test]
    fn test_decode_wrapped_base64() {
        assert_eq!(
            wrap("<base64>aGVs\n  bG8=\n</base64>"),
            Value::Base64(b"hello".to_vec())
        );
    }

    #[test]
    fn test_decode_compact_datetime() {
        let expected = Value::DateTime(Utc.with_ymd_and_hms(1998, 7, 17, 14, 8, 55).unwrap());
        assert_eq!(wrap("<dateTime.iso8601>19980717T14:08:55</dateTime.iso8601>"), expected);
        assert_eq!(wrap("<dateTime.iso8601>19980717T140855</dateTime.iso8601>"), expected);
        assert_eq!(
            wrap("<dateTime.iso8601>1998-07-17T16:08:55+02:00</dateTime.iso8601>"),
            expected
        );
    }

    #[test]
    fn test_decode_pretty_printed_struct() {
        let v = wrap(
            "\n  <struct>\n    <member>\n      <name>a</name>\n      <value><int>1</int></value>\n    </member>\n  </struct>\n",
        );
        assert_eq!(v, Value::Struct(Struct::new().with("a", 1)));
    }

    #[test]
    fn test_decode_untyped_member_value() {
        let v = wrap("<struct><member><name>k</name><value>raw</value></member></struct>");
        assert_eq!(v, Value::Struct(Struct::new().with("k", "raw")));
    }

    #[test]
    fn test_decode_unknown_type() {
        let el = xml::parse("<value><float>1</float></value>").unwrap();
        let err = Decoder::decode_value(&el).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownType(ref t) if t == "float"));
    }

    #[test]
    fn test_decode_invalid_scalars() {
        for bad in [
            "<int>abc</int>",
            "<double>x</double>",
            "<boolean>yes</boolean>",
            "<base64>!!</base64>",
            "<dateTime.iso8601>yesterday</dateTime.iso8601>",
        ] {
            let el = xml::parse(&format!("<value>{}</value>", bad)).unwrap();
            assert!(
                matches!(
                    Decoder::decode_value(&el),
                    Err(DecodeError::InvalidScalar { .. })
                ),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_decode_array_requires_data() {
        let el = xml::parse("<value><array></array></value>").unwrap();
        assert!(matches!(
            Decoder::decode_value(&el),
            Err(DecodeError::MissingElement("data"))
        ));
    }

    #[test]
    fn test_decode_struct_member_without_parts() {
        let el = xml::parse("<value><struct><member></member></struct></value>").unwrap();
        assert!(matches!(
            Decoder::decode_value(&el),
            Err(DecodeError::MalformedMember)
        ));

        let el = xml::parse("<value><struct><member><name>x</name></member></struct></value>")
            .unwrap();
        assert!(matches!(
            Decoder::decode_value(&el),
            Err(DecodeError::MalformedMember)
        ));
    }

    #[test]
    fn test_decode_value_with_two_children() {
        let el = xml::parse("<value><int>1</int><int>2</int></value>").unwrap();
        assert!(matches!(
            Decoder::decode_value(&el),
            Err(DecodeError::UnexpectedElement { parent: "value", .. })
        ));
    }

    #[test]
    fn test_decode_fault_response() {
        let body = b"<methodResponse><fault><value><struct>\
            <member><name>faultCode</name><value><int>1</int></value></member>\
            <member><name>faultString</name><value><string>boom</string></value></member>\
            </struct></value></fault></methodResponse>";
        let response = Decoder::decode_response(body).unwrap();
        assert_eq!(response, MethodResponse::Fault(Fault::new(1, "boom")));
    }

    #[test]
    fn test_decode_fault_with_string_code() {
        let body = Encoder::encode_response(&MethodResponse::Fault(Fault::new(
            "org.exist.PermissionDenied",
            "no",
        )));
        match Decoder::decode_response(&body).unwrap() {
            MethodResponse::Fault(f) => {
                assert_eq!(f.code, FaultCode::Text("org.exist.PermissionDenied".into()));
                assert_eq!(f.message, "no");
            }
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_fault_missing_members() {
        let body = b"<methodResponse><fault><value><struct>\
            <member><name>faultCode</name><value><int>1</int></value></member>\
            </struct></value></fault></methodResponse>";
        assert!(matches!(
            Decoder::decode_response(body),
            Err(DecodeError::InvalidFault)
        ));
    }

    #[test]
    fn test_decode_success_response() {
        let body = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<methodResponse>\n<params>\n<param>\n<value><int>3</int></value>\n</param>\n</params>\n</methodResponse>\n";
        assert_eq!(
            Decoder::decode_response(body).unwrap(),
            MethodResponse::Success(Value::Int(3))
        );
    }

    #[test]
    fn test_decode_response_without_params_or_fault() {
        let err = Decoder::decode_response(b"<methodResponse></methodResponse>").unwrap_err();
        assert!(matches!(err, DecodeError::NoParamsOrFault));

        let err = Decoder::decode_response(b"<methodResponse><params></params></methodResponse>")
            .unwrap_err();
        assert!(matches!(err, DecodeError::NoParamsOrFault));
    }

    #[test]
    fn test_decode_response_with_params_and_fault() {
        let body = b"<methodResponse><params><param><value><int>1</int></value></param></params>\
<fault><value><struct><member><name>faultCode</name><value><int>1</int></value></member>\
<member><name>faultString</name><value>boom</value></member></struct></value></fault>\
</methodResponse>";
        let err = Decoder::decode_response(body).unwrap_err();
        assert!(matches!(err, DecodeError::ParamsAndFault));
    }

    /// A response holding `<int>1</int>` inside `levels` nested arrays.
    fn nested_array_response(levels: usize) -> String {
        format!(
            "<methodResponse><params><param><value>{}<int>1</int>{}</value></param></params>\
             </methodResponse>",
            "<array><data><value>".repeat(levels),
            "</value></data></array>".repeat(levels),
        )
    }

    #[test]
    fn test_decode_response_too_deep() {
        let levels = 200_000;
        let body = nested_array_response(levels);
        let err = Decoder::decode_response(body.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Parse(ParseError {
                kind: ParseErrorKind::TooDeep(xml::MAX_DEPTH),
                ..
            })
        ));
    }

    #[test]
    fn test_decode_response_moderate_nesting() {
        let levels = 100;
        let body = nested_array_response(levels);
        let mut value = match Decoder::decode_response(body.as_bytes()).unwrap() {
            MethodResponse::Success(v) => v,
            other => panic!("unexpected {:?}", other),
        };
        for _ in 0..levels {
            value = value.as_array().unwrap()[0].clone();
        }
        assert_eq!(value, Value::Int(1));
    }

    #[test]
    fn test_validate_rejects_non_finite_doubles() {
        assert_eq!(
            Encoder::validate(&Value::Double(f64::INFINITY)),
            Err(EncodeError::NonFiniteDouble(f64::INFINITY))
        );
        let nested = Value::Struct(
            Struct::new().with("xs", Value::Array(vec![Value::Double(f64::NEG_INFINITY)])),
        );
        assert!(Encoder::validate(&nested).is_err());
        assert!(matches!(
            Encoder::validate(&Value::Double(f64::NAN)),
            Err(EncodeError::NonFiniteDouble(d)) if d.is_nan()
        ));
        assert_eq!(Encoder::validate(&sample_struct()), Ok(()));

        let call = MethodCall::new("m").with_param(f64::NAN);
        assert!(Encoder::try_encode_call(&call).is_err());
        let call = MethodCall::new("m").with_param(2.5);
        assert_eq!(
            Encoder::try_encode_call(&call).unwrap(),
            Encoder::encode_call(&call)
        );
    }

    #[test]
    fn test_decode_response_wrong_root() {
        let err = Decoder::decode_response(b"<html><body>401</body></html>").unwrap_err();
        assert!(matches!(err, DecodeError::NotMethodResponse(ref t) if t == "html"));
    }

    #[test]
    fn test_decode_response_malformed_xml() {
        let err = Decoder::decode_response(b"<methodResponse><params>").unwrap_err();
        assert!(matches!(err, DecodeError::Parse(_)));
    }

    #[test]
    fn test_decode_response_invalid_utf8() {
        let err = Decoder::decode_response(&[0x3c, 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_call_roundtrip() {
        let call = MethodCall::new("retrieve").with_params(vec![
            Value::Int(5),
            Value::Int(0),
            Value::Struct(Struct::new()),
        ]);
        let decoded = Decoder::decode_call(&Encoder::encode_call(&call)).unwrap();
        assert_eq!(decoded, call);
    }

    #[test]
    fn test_decode_call_requires_method_name() {
        let err = Decoder::decode_call(b"<methodCall><params/></methodCall>").unwrap_err();
        assert!(matches!(err, DecodeError::MissingElement("methodName")));
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            any::<i64>().prop_map(Value::Int),
            any::<bool>().prop_map(Value::Bool),
            "\\PC*".prop_map(Value::String),
            proptest::collection::vec(any::<u8>(), 0..32).prop_map(Value::Base64),
            Just(Value::Nil),
            (-1.0e12f64..1.0e12f64).prop_map(Value::Double),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                proptest::collection::vec(("[a-z]{1,6}", inner), 0..4)
                    .prop_map(|members| Value::Struct(members.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_value_roundtrip(v in arb_value()) {
            prop_assert_eq!(roundtrip(&v), v);
        }
    }
}
