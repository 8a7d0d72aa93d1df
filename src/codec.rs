// RP66 representation codec (spec §4.3).
//
// A stateless dispatch table keyed by repcode, each entry a decode function
// pulling from a `Cursor` and an encode function appending to a `Vec<u8>`.
// Grounded the same way the teacher crate's block-entry codec is: small
// free functions over a cursor/byte-vec pair, no trait objects, because the
// set of codes is closed and known at compile time.

use crate::util::cursor::Cursor;
use crate::util::fingerprint::Obname;
use crate::util::status::{Fault, FaultKind};
use crate::util::uvari::Uvari;

/// One of the 27 RP66 representation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Repcode {
    FShort = 1,
    FSingl = 2,
    FSing1 = 3,
    FSing2 = 4,
    ISingl = 5,
    VSingl = 6,
    FDoubl = 7,
    FDoub1 = 8,
    FDoub2 = 9,
    CSingl = 10,
    CDoubl = 11,
    SShort = 12,
    SNorm = 13,
    SLong = 14,
    UShort = 15,
    UNorm = 16,
    ULong = 17,
    Uvari = 18,
    Ident = 19,
    Ascii = 20,
    Dtime = 21,
    Origin = 22,
    Obname = 23,
    Objref = 24,
    Attref = 25,
    Status = 26,
    Units = 27,
}

impl Repcode {
    pub fn from_code(code: u32) -> Option<Repcode> {
        use Repcode::*;
        Some(match code {
            1 => FShort,
            2 => FSingl,
            3 => FSing1,
            4 => FSing2,
            5 => ISingl,
            6 => VSingl,
            7 => FDoubl,
            8 => FDoub1,
            9 => FDoub2,
            10 => CSingl,
            11 => CDoubl,
            12 => SShort,
            13 => SNorm,
            14 => SLong,
            15 => UShort,
            16 => UNorm,
            17 => ULong,
            18 => Uvari,
            19 => Ident,
            20 => Ascii,
            21 => Dtime,
            22 => Origin,
            23 => Obname,
            24 => Objref,
            25 => Attref,
            26 => Status,
            27 => Units,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// `Some(n)` for a fixed-width code, `None` when the width depends on
    /// the decoded content (strings, references, UVARI itself).
    pub fn fixed_size(self) -> Option<usize> {
        use Repcode::*;
        match self {
            FShort => Some(2),
            FSingl => Some(4),
            FSing1 => Some(8),
            FSing2 => Some(12),
            ISingl => Some(4),
            VSingl => Some(4),
            FDoubl => Some(8),
            FDoub1 => Some(16),
            FDoub2 => Some(24),
            CSingl => Some(8),
            CDoubl => Some(16),
            SShort => Some(1),
            SNorm => Some(2),
            SLong => Some(4),
            UShort => Some(1),
            UNorm => Some(2),
            ULong => Some(4),
            Dtime => Some(8),
            Status => Some(1),
            Origin | Uvari | Ident | Ascii | Obname | Objref | Attref | Units => None,
        }
    }

    /// Whether this code forces the frame column holding it to be
    /// object-typed rather than a native dense numeric array (spec §4.6).
    pub fn is_variable_width_dtype(self) -> bool {
        use Repcode::*;
        matches!(self, Ident | Ascii | Obname | Objref | Attref | Units | Dtime)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DTime {
    pub year: u16,
    pub tz: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    FShort(f32),
    FSingl(f32),
    FSing1(f32, f32),
    FSing2(f32, f32, f32),
    ISingl(f32),
    VSingl(f32),
    FDoubl(f64),
    FDoub1(f64, f64),
    FDoub2(f64, f64, f64),
    CSingl(f32, f32),
    CDoubl(f64, f64),
    SShort(i8),
    SNorm(i16),
    SLong(i32),
    UShort(u8),
    UNorm(u16),
    ULong(u32),
    Uvari(u32),
    Ident(String),
    Ascii(String),
    Dtime(DTime),
    Origin(u32),
    Obname(Obname),
    Objref(String, Obname),
    Attref(String, Obname, String),
    Status(bool),
    Units(String),
}

impl Value {
    pub fn repcode(&self) -> Repcode {
        use Repcode as R;
        match self {
            Value::FShort(_) => R::FShort,
            Value::FSingl(_) => R::FSingl,
            Value::FSing1(..) => R::FSing1,
            Value::FSing2(..) => R::FSing2,
            Value::ISingl(_) => R::ISingl,
            Value::VSingl(_) => R::VSingl,
            Value::FDoubl(_) => R::FDoubl,
            Value::FDoub1(..) => R::FDoub1,
            Value::FDoub2(..) => R::FDoub2,
            Value::CSingl(..) => R::CSingl,
            Value::CDoubl(..) => R::CDoubl,
            Value::SShort(_) => R::SShort,
            Value::SNorm(_) => R::SNorm,
            Value::SLong(_) => R::SLong,
            Value::UShort(_) => R::UShort,
            Value::UNorm(_) => R::UNorm,
            Value::ULong(_) => R::ULong,
            Value::Uvari(_) => R::Uvari,
            Value::Ident(_) => R::Ident,
            Value::Ascii(_) => R::Ascii,
            Value::Dtime(_) => R::Dtime,
            Value::Origin(_) => R::Origin,
            Value::Obname(_) => R::Obname,
            Value::Objref(..) => R::Objref,
            Value::Attref(..) => R::Attref,
            Value::Status(_) => R::Status,
            Value::Units(_) => R::Units,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::FShort(v) | Value::FSingl(v) | Value::ISingl(v) | Value::VSingl(v) => {
                Some(*v as f64)
            }
            Value::FDoubl(v) => Some(*v),
            Value::SShort(v) => Some(*v as f64),
            Value::SNorm(v) => Some(*v as f64),
            Value::SLong(v) => Some(*v as f64),
            Value::UShort(v) => Some(*v as f64),
            Value::UNorm(v) => Some(*v as f64),
            Value::ULong(v) => Some(*v as f64),
            Value::Uvari(v) | Value::Origin(v) => Some(*v as f64),
            _ => None,
        }
    }
}

fn ident_bytes(cursor: &mut Cursor) -> Result<String, Fault> {
    let len = cursor.u8()? as usize;
    let raw = cursor.take(len)?;
    Ok(raw.iter().map(|&b| b as char).collect())
}

fn ascii_bytes(cursor: &mut Cursor) -> Result<String, Fault> {
    let len = Uvari::decode(cursor)? as usize;
    let raw = cursor.take(len)?;
    Ok(raw.iter().map(|&b| b as char).collect())
}

fn decode_obname(cursor: &mut Cursor) -> Result<Obname, Fault> {
    let origin = Uvari::decode(cursor)?;
    let copy = cursor.u8()? as u32;
    let identifier = ident_bytes(cursor)?;
    Ok(Obname::new(origin, copy, identifier))
}

/// Decodes a 16-bit "FSHORT" half-float: sign(1) / exponent(4, bias 8,
/// base-2) / mantissa(11, with implicit leading 1 folded into the integer
/// part like RP66 defines it).
fn decode_fshort(raw: u16) -> f32 {
    if raw & 0x7FFF == 0 {
        return if raw & 0x8000 != 0 { -0.0 } else { 0.0 };
    }
    let sign = if raw & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((raw >> 11) & 0x0F) as i32 - 8;
    let mantissa = (raw & 0x07FF) as f32 / 2048.0 + 1.0;
    sign * mantissa * 2f32.powi(exponent) / 2.0
}

fn encode_fshort(value: f32) -> u16 {
    // Only exact round-trip for values produced by `decode_fshort` is
    // guaranteed; used by the codec's own round-trip tests, not by the
    // read path (DLIS files are decode-only).
    let sign_bit = if value.is_sign_negative() { 0x8000u16 } else { 0 };
    let abs = value.abs() * 2.0;
    if abs == 0.0 {
        return sign_bit;
    }
    let exponent = abs.log2().floor() as i32;
    let mantissa_frac = abs / 2f32.powi(exponent) - 1.0;
    let mantissa = (mantissa_frac * 2048.0).round() as u16 & 0x07FF;
    sign_bit | (((exponent + 8) as u16 & 0x0F) << 11) | mantissa
}

/// Decodes the IBM hexadecimal-exponent float used by ISINGL (code 5):
/// sign(1) / exponent(7, bias 64, base 16) / 24-bit fraction.
fn decode_isingl(raw: u32) -> f32 {
    let sign = if raw & 0x8000_0000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((raw >> 24) & 0x7F) as i32 - 64;
    let fraction = (raw & 0x00FF_FFFF) as f32 / 16_777_216.0;
    sign * fraction * 16f32.powi(exponent)
}

/// Decodes a VAX F-float (code 6): the IEEE-754 layout with the exponent
/// bias shifted by 2 and byte-pair swapped relative to plain FSINGL.
fn decode_vsingl(raw: u32) -> f32 {
    let swapped = ((raw & 0xFFFF) << 16) | (raw >> 16);
    let sign = swapped & 0x8000_0000;
    let exponent = ((swapped >> 23) & 0xFF) as i32;
    let mantissa = swapped & 0x007F_FFFF;
    if exponent == 0 {
        return 0.0;
    }
    let ieee_exponent = (exponent - 2).clamp(0, 255) as u32;
    f32::from_bits(sign | (ieee_exponent << 23) | mantissa)
}

/// Decodes one value of representation code `repcode` from `cursor`.
pub fn decode(repcode: Repcode, cursor: &mut Cursor) -> Result<Value, Fault> {
    use Repcode::*;
    Ok(match repcode {
        FShort => Value::FShort(decode_fshort(cursor.u16()?)),
        FSingl => Value::FSingl(cursor.f32()?),
        FSing1 => Value::FSing1(cursor.f32()?, cursor.f32()?),
        FSing2 => Value::FSing2(cursor.f32()?, cursor.f32()?, cursor.f32()?),
        ISingl => Value::ISingl(decode_isingl(cursor.u32()?)),
        VSingl => Value::VSingl(decode_vsingl(cursor.u32()?)),
        FDoubl => Value::FDoubl(cursor.f64()?),
        FDoub1 => Value::FDoub1(cursor.f64()?, cursor.f64()?),
        FDoub2 => Value::FDoub2(cursor.f64()?, cursor.f64()?, cursor.f64()?),
        CSingl => Value::CSingl(cursor.f32()?, cursor.f32()?),
        CDoubl => Value::CDoubl(cursor.f64()?, cursor.f64()?),
        SShort => Value::SShort(cursor.i8()?),
        SNorm => Value::SNorm(cursor.i16()?),
        SLong => Value::SLong(cursor.i32()?),
        UShort => Value::UShort(cursor.u8()?),
        UNorm => Value::UNorm(cursor.u16()?),
        ULong => Value::ULong(cursor.u32()?),
        Uvari => Value::Uvari(crate::util::uvari::Uvari::decode(cursor)?),
        Ident => Value::Ident(ident_bytes(cursor)?),
        Ascii => Value::Ascii(ascii_bytes(cursor)?),
        Dtime => {
            let b0 = cursor.u8()?;
            let b1 = cursor.u8()?;
            let day = cursor.u8()?;
            let hour = cursor.u8()?;
            let minute = cursor.u8()?;
            let second = cursor.u8()?;
            let millisecond = cursor.u16()?;
            Value::Dtime(DTime {
                year: 1900 + b0 as u16,
                tz: b1 >> 4,
                month: b1 & 0x0F,
                day,
                hour,
                minute,
                second,
                millisecond,
            })
        }
        Origin => Value::Origin(crate::util::uvari::Uvari::decode(cursor)?),
        Obname => Value::Obname(decode_obname(cursor)?),
        Objref => {
            let type_tag = ident_bytes(cursor)?;
            let obname = decode_obname(cursor)?;
            Value::Objref(type_tag, obname)
        }
        Attref => {
            let type_tag = ident_bytes(cursor)?;
            let obname = decode_obname(cursor)?;
            let label = ident_bytes(cursor)?;
            Value::Attref(type_tag, obname, label)
        }
        Status => Value::Status(cursor.u8()? != 0),
        Units => Value::Units(ident_bytes(cursor)?),
    })
}

fn put_ident(dst: &mut Vec<u8>, s: &str) {
    dst.push(s.len() as u8);
    dst.extend(s.bytes());
}

fn put_ascii(dst: &mut Vec<u8>, s: &str) {
    Uvari::put(dst, s.len() as u32);
    dst.extend(s.bytes());
}

fn put_obname(dst: &mut Vec<u8>, ob: &Obname) {
    Uvari::put(dst, ob.origin);
    dst.push(ob.copy as u8);
    put_ident(dst, &ob.identifier);
}

/// Encodes `value` back to its wire representation. Exists for the codec's
/// own round-trip tests and for building hand-made byte fixtures in
/// `tests/`; the read path never needs to encode.
pub fn encode(value: &Value, dst: &mut Vec<u8>) {
    match value {
        Value::FShort(v) => dst.extend(encode_fshort(*v).to_be_bytes()),
        Value::FSingl(v) => dst.extend(v.to_be_bytes()),
        Value::FSing1(a, b) => {
            dst.extend(a.to_be_bytes());
            dst.extend(b.to_be_bytes());
        }
        Value::FSing2(a, b, c) => {
            dst.extend(a.to_be_bytes());
            dst.extend(b.to_be_bytes());
            dst.extend(c.to_be_bytes());
        }
        Value::ISingl(v) => dst.extend(encode_isingl(*v).to_be_bytes()),
        Value::VSingl(v) => dst.extend(encode_vsingl(*v).to_be_bytes()),
        Value::FDoubl(v) => dst.extend(v.to_be_bytes()),
        Value::FDoub1(a, b) => {
            dst.extend(a.to_be_bytes());
            dst.extend(b.to_be_bytes());
        }
        Value::FDoub2(a, b, c) => {
            dst.extend(a.to_be_bytes());
            dst.extend(b.to_be_bytes());
            dst.extend(c.to_be_bytes());
        }
        Value::CSingl(a, b) => {
            dst.extend(a.to_be_bytes());
            dst.extend(b.to_be_bytes());
        }
        Value::CDoubl(a, b) => {
            dst.extend(a.to_be_bytes());
            dst.extend(b.to_be_bytes());
        }
        Value::SShort(v) => dst.push(*v as u8),
        Value::SNorm(v) => dst.extend(v.to_be_bytes()),
        Value::SLong(v) => dst.extend(v.to_be_bytes()),
        Value::UShort(v) => dst.push(*v),
        Value::UNorm(v) => dst.extend(v.to_be_bytes()),
        Value::ULong(v) => dst.extend(v.to_be_bytes()),
        Value::Uvari(v) => Uvari::put(dst, *v),
        Value::Ident(s) => put_ident(dst, s),
        Value::Ascii(s) => put_ascii(dst, s),
        Value::Dtime(t) => {
            dst.push((t.year - 1900) as u8);
            dst.push((t.tz << 4) | (t.month & 0x0F));
            dst.push(t.day);
            dst.push(t.hour);
            dst.push(t.minute);
            dst.push(t.second);
            dst.extend(t.millisecond.to_be_bytes());
        }
        Value::Origin(v) => Uvari::put(dst, *v),
        Value::Obname(ob) => put_obname(dst, ob),
        Value::Objref(type_tag, ob) => {
            put_ident(dst, type_tag);
            put_obname(dst, ob);
        }
        Value::Attref(type_tag, ob, label) => {
            put_ident(dst, type_tag);
            put_obname(dst, ob);
            put_ident(dst, label);
        }
        Value::Status(b) => dst.push(if *b { 1 } else { 0 }),
        Value::Units(s) => put_ident(dst, s),
    }
}

fn encode_isingl(value: f32) -> u32 {
    if value == 0.0 {
        return 0;
    }
    let sign = if value.is_sign_negative() { 0x8000_0000u32 } else { 0 };
    let abs = value.abs();
    let exponent = (abs.log2() / 4.0).ceil() as i32;
    let fraction = abs / 16f32.powi(exponent);
    let frac_bits = (fraction * 16_777_216.0).round() as u32 & 0x00FF_FFFF;
    sign | (((exponent + 64) as u32 & 0x7F) << 24) | frac_bits
}

fn encode_vsingl(value: f32) -> u32 {
    let bits = value.to_bits();
    let sign = bits & 0x8000_0000;
    let exponent = (bits >> 23) & 0xFF;
    let mantissa = bits & 0x007F_FFFF;
    let vax_exponent = if exponent == 0 { 0 } else { (exponent + 2).min(255) };
    let ieee = sign | (vax_exponent << 23) | mantissa;
    ((ieee & 0xFFFF) << 16) | (ieee >> 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: Value) {
        let mut buf = Vec::new();
        encode(&value, &mut buf);
        let mut cursor = Cursor::new(&buf);
        let decoded = decode(value.repcode(), &mut cursor).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn fsingl_matches_scenario_1() {
        let buf = [0x40, 0xB0, 0x00, 0x00];
        let mut cursor = Cursor::new(&buf);
        let v = decode(Repcode::FSingl, &mut cursor).unwrap();
        assert_eq!(v, Value::FSingl(5.5));
    }

    #[test]
    fn obname_matches_scenario_3() {
        let buf = [0x83, 0x30, 0x05, 0x08, b'O', b'B', b'N', b'A', b'M', b'E', b'_', b'I'];
        let mut cursor = Cursor::new(&buf);
        let v = decode(Repcode::Obname, &mut cursor).unwrap();
        assert_eq!(v, Value::Obname(Obname::new(0x330, 5, "OBNAME_I")));
    }

    #[test]
    fn round_trips_fixed_width_numeric_codes() {
        round_trip(Value::FSingl(5.5));
        round_trip(Value::FDoubl(-12.25));
        round_trip(Value::SShort(-12));
        round_trip(Value::SNorm(-1234));
        round_trip(Value::SLong(-123456));
        round_trip(Value::UShort(200));
        round_trip(Value::UNorm(60000));
        round_trip(Value::ULong(3_000_000_000));
        round_trip(Value::Status(true));
        round_trip(Value::Status(false));
    }

    #[test]
    fn round_trips_strings_and_references() {
        round_trip(Value::Ident("CHANNEL".into()));
        round_trip(Value::Ascii("a longer text value".into()));
        round_trip(Value::Units("M".into()));
        round_trip(Value::Obname(Obname::new(1, 0, "X")));
        round_trip(Value::Objref("CHANNEL".into(), Obname::new(1, 0, "X")));
        round_trip(Value::Attref(
            "CHANNEL".into(),
            Obname::new(1, 0, "X"),
            "LABEL".into(),
        ));
    }

    #[test]
    fn round_trips_dtime() {
        round_trip(Value::Dtime(DTime {
            year: 1986,
            tz: 0,
            month: 4,
            day: 26,
            hour: 1,
            minute: 23,
            second: 58,
            millisecond: 0,
        }));
    }

    #[test]
    fn fshort_round_trips_representable_values() {
        round_trip(Value::FShort(1.0));
        round_trip(Value::FShort(-1.0));
        round_trip(Value::FShort(0.0));
    }

    #[test]
    fn isingl_and_vsingl_round_trip() {
        round_trip(Value::ISingl(1.0));
        round_trip(Value::ISingl(-16.0));
        round_trip(Value::VSingl(1.0));
    }

    #[test]
    fn unknown_repcode_is_not_in_from_code_table() {
        assert!(Repcode::from_code(0).is_none());
        assert!(Repcode::from_code(28).is_none());
        assert_eq!(Repcode::from_code(18), Some(Repcode::Uvari));
    }
}
