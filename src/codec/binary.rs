//! Binary bundle framing (spec §4.1): `<4-byte signature><2-byte BE
//! version><4-byte BE length><payload>`, and the element-envelope
//! encoding used inside an `MD` payload:
//! `<1-byte type code><2-byte BE length><element payload>`.

use std::convert::TryInto;
use std::io::Cursor;

use binread::{BinRead, BinReaderExt};

use crate::err_at;
use crate::error::{Error, Result};
use crate::metadata::{DataFormat, Metadata, Note, Reftime, Source};
use crate::summary::Summary;
use crate::time::Time;
use crate::types::{Area, Code, Item, Level, Origin, Proddef, Product, Quantity, Run, Task, Timerange, Value};

pub const VERSION: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    Md,
    Deleted,
    Group,
    Summary,
    Matcher,
}

impl Signature {
    fn bytes(&self) -> [u8; 4] {
        match self {
            Signature::Md => *b"MD\0\0",
            Signature::Deleted => *b"!D\0\0",
            Signature::Group => *b"MG\0\0",
            Signature::Summary => *b"SU\0\0",
            Signature::Matcher => *b"MS\0\0",
        }
    }

    fn from_bytes(b: [u8; 4]) -> Result<Signature> {
        Ok(match &b {
            b"MD\0\0" => Signature::Md,
            b"!D\0\0" => Signature::Deleted,
            b"MG\0\0" => Signature::Group,
            b"SU\0\0" => Signature::Summary,
            b"MS\0\0" => Signature::Matcher,
            _ => return err_at!(Codec, "BadSignature {:?}", b),
        })
    }
}

#[derive(Debug, Clone)]
pub enum Bundle {
    Md(Metadata),
    /// A tombstoned record: present on disk but skipped on read.
    Deleted,
    Group(Vec<Bundle>),
    Summary(Summary),
    Matcher(String),
}

#[derive(BinRead)]
#[br(big)]
struct RawHeader {
    signature: [u8; 4],
    version: u16,
    length: u32,
}

/// Encode one bundle, framed and ready to append to a carrier stream.
pub fn encode_bundle(bundle: &Bundle) -> Result<Vec<u8>> {
    let (signature, payload) = match bundle {
        Bundle::Md(md) => (Signature::Md, encode_metadata(md)),
        Bundle::Deleted => (Signature::Deleted, Vec::new()),
        Bundle::Group(items) => {
            let mut inner = Vec::new();
            for b in items {
                inner.extend(encode_bundle(b)?);
            }
            let mut payload = Vec::with_capacity(inner.len() + 4);
            payload.extend_from_slice(&(inner.len() as u32).to_be_bytes());
            // default GroupCodec: identity (store uncompressed). Real LZO
            // interop with arkimet's own MG bundles is an open question,
            // see DESIGN.md.
            payload.extend_from_slice(&inner);
            (Signature::Group, payload)
        }
        Bundle::Summary(summary) => (Signature::Summary, summary.encode()),
        Bundle::Matcher(text) => (Signature::Matcher, text.as_bytes().to_vec()),
    };

    if payload.len() > u32::MAX as usize {
        return err_at!(Codec, "bundle payload too large: {} bytes", payload.len());
    }

    let mut out = Vec::with_capacity(payload.len() + 10);
    out.extend_from_slice(&signature.bytes());
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode one bundle from the front of `buf`, returning it along with
/// the number of bytes consumed so callers can step through a carrier
/// stream record by record.
pub fn decode_bundle(buf: &[u8]) -> Result<(Bundle, usize)> {
    if buf.len() < 10 {
        return err_at!(Codec, "ShortRead: need 10 header bytes, got {}", buf.len());
    }
    let mut cursor = Cursor::new(&buf[..10]);
    let header: RawHeader = cursor
        .read_be()
        .map_err(|e| Error::Codec(format!("MalformedEnvelope: {}", e)))?;
    let signature = Signature::from_bytes(header.signature)?;
    if header.version != VERSION {
        return err_at!(Codec, "UnknownVersion {}", header.version);
    }
    let length = header.length as usize;
    if buf.len() < 10 + length {
        return err_at!(
            Codec,
            "ShortRead: need {} payload bytes, got {}",
            length,
            buf.len() - 10
        );
    }
    let payload = &buf[10..10 + length];
    let consumed = 10 + length;

    let bundle = match signature {
        Signature::Md => Bundle::Md(decode_metadata(payload)?),
        Signature::Deleted => Bundle::Deleted,
        Signature::Group => {
            if payload.len() < 4 {
                return err_at!(Codec, "ShortRead: group size prefix");
            }
            let uncompressed_size = u32::from_be_bytes(payload[..4].try_into().unwrap()) as usize;
            let inner = &payload[4..];
            if inner.len() != uncompressed_size {
                return err_at!(
                    Codec,
                    "group payload length mismatch: expected {}, got {}",
                    uncompressed_size,
                    inner.len()
                );
            }
            let mut bundles = Vec::new();
            let mut off = 0;
            while off < inner.len() {
                let (b, n) = decode_bundle(&inner[off..])?;
                bundles.push(b);
                off += n;
            }
            Bundle::Group(bundles)
        }
        Signature::Summary => Bundle::Summary(Summary::decode(payload)?),
        Signature::Matcher => Bundle::Matcher(
            std::str::from_utf8(payload)
                .map_err(|e| Error::Codec(format!("{}", e)))?
                .to_string(),
        ),
    };
    Ok((bundle, consumed))
}

// --- element envelopes -----------------------------------------------

pub(crate) fn write_envelope(out: &mut Vec<u8>, code: Code, payload: &[u8]) {
    out.push(code as u8);
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
}

pub(crate) fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

pub(crate) fn read_str(buf: &[u8], off: &mut usize) -> Result<String> {
    if buf.len() < *off + 2 {
        return err_at!(Codec, "ShortRead: string length prefix");
    }
    let n = u16::from_be_bytes(buf[*off..*off + 2].try_into().unwrap()) as usize;
    *off += 2;
    if buf.len() < *off + n {
        return err_at!(Codec, "ShortRead: string payload");
    }
    let s = std::str::from_utf8(&buf[*off..*off + n])
        .map_err(|e| Error::Codec(format!("{}", e)))?
        .to_string();
    *off += n;
    Ok(s)
}

pub(crate) fn write_time(out: &mut Vec<u8>, t: &Time) {
    out.extend_from_slice(&t.year.to_be_bytes());
    out.push(t.month as u8);
    out.push(t.day as u8);
    out.push(t.hour as u8);
    out.push(t.minute as u8);
    out.push(t.second as u8);
}

pub(crate) fn read_time(buf: &[u8], off: &mut usize) -> Result<Time> {
    if buf.len() < *off + 9 {
        return err_at!(Codec, "ShortRead: time");
    }
    let year = i32::from_be_bytes(buf[*off..*off + 4].try_into().unwrap());
    let t = Time::new(
        year,
        buf[*off + 4] as u32,
        buf[*off + 5] as u32,
        buf[*off + 6] as u32,
        buf[*off + 7] as u32,
        buf[*off + 8] as u32,
    );
    *off += 9;
    Ok(t)
}

fn encode_reftime(r: &Reftime) -> Vec<u8> {
    let mut out = Vec::new();
    match r {
        Reftime::Position(t) => {
            out.push(0);
            write_time(&mut out, t);
        }
        Reftime::Period(a, b) => {
            out.push(1);
            write_time(&mut out, a);
            write_time(&mut out, b);
        }
    }
    out
}

fn decode_reftime(payload: &[u8]) -> Result<Reftime> {
    if payload.is_empty() {
        return err_at!(Codec, "ShortRead: reftime style tag");
    }
    let mut off = 1;
    match payload[0] {
        0 => Ok(Reftime::Position(read_time(payload, &mut off)?)),
        1 => {
            let a = read_time(payload, &mut off)?;
            let b = read_time(payload, &mut off)?;
            Ok(Reftime::Period(a, b))
        }
        n => err_at!(Codec, "unknown reftime style tag {}", n),
    }
}

fn encode_source(s: &Source) -> Vec<u8> {
    let mut out = Vec::new();
    match s {
        Source::Blob {
            format,
            root,
            relpath,
            offset,
            size,
        } => {
            out.push(0);
            write_str(&mut out, format.as_str());
            write_str(&mut out, &root.to_string_lossy());
            write_str(&mut out, &relpath.to_string_lossy());
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(&size.to_be_bytes());
        }
        Source::Inline { format, size } => {
            out.push(1);
            write_str(&mut out, format.as_str());
            out.extend_from_slice(&size.to_be_bytes());
        }
        Source::Url { format, url } => {
            out.push(2);
            write_str(&mut out, format.as_str());
            write_str(&mut out, url.as_str());
        }
    }
    out
}

fn decode_source(payload: &[u8]) -> Result<Source> {
    if payload.is_empty() {
        return err_at!(Codec, "ShortRead: source style tag");
    }
    let mut off = 1;
    let parse_format = |s: &str| {
        DataFormat::from_str(s).ok_or_else(|| Error::Codec(format!("unknown format {:?}", s)))
    };
    match payload[0] {
        0 => {
            let format = parse_format(&read_str(payload, &mut off)?)?;
            let root = read_str(payload, &mut off)?.into();
            let relpath = read_str(payload, &mut off)?.into();
            if payload.len() < off + 16 {
                return err_at!(Codec, "ShortRead: blob offset/size");
            }
            let offset = u64::from_be_bytes(payload[off..off + 8].try_into().unwrap());
            let size = u64::from_be_bytes(payload[off + 8..off + 16].try_into().unwrap());
            Ok(Source::Blob {
                format,
                root,
                relpath,
                offset,
                size,
            })
        }
        1 => {
            let format = parse_format(&read_str(payload, &mut off)?)?;
            if payload.len() < off + 8 {
                return err_at!(Codec, "ShortRead: inline size");
            }
            let size = u64::from_be_bytes(payload[off..off + 8].try_into().unwrap());
            Ok(Source::Inline { format, size })
        }
        2 => {
            let format = parse_format(&read_str(payload, &mut off)?)?;
            let url_str = read_str(payload, &mut off)?;
            let url = url::Url::parse(&url_str).map_err(|e| Error::Codec(format!("{}", e)))?;
            Ok(Source::Url { format, url })
        }
        n => err_at!(Codec, "unknown source style tag {}", n),
    }
}

fn encode_note(n: &Note) -> Vec<u8> {
    let mut out = Vec::new();
    write_time(&mut out, &n.time);
    write_str(&mut out, &n.text);
    out
}

fn decode_note(payload: &[u8]) -> Result<Note> {
    let mut off = 0;
    let time = read_time(payload, &mut off)?;
    let text = read_str(payload, &mut off)?;
    Ok(Note::new(time, text))
}

pub(crate) fn encode_item_payload(item: &Item) -> Vec<u8> {
    let mut out = Vec::new();
    match item {
        Item::Origin(v) => encode_origin(v, &mut out),
        Item::Product(v) => encode_product(v, &mut out),
        Item::Level(v) => encode_level(v, &mut out),
        Item::Timerange(v) => encode_timerange(v, &mut out),
        Item::Area(v) => encode_keyed("grib_or_odim", v, &mut out),
        Item::Proddef(v) => encode_keyed_proddef(v, &mut out),
        Item::Run(v) => out.extend_from_slice(&v.minute.to_be_bytes()),
        Item::Task(v) => write_str(&mut out, &v.0),
        Item::Quantity(v) => {
            out.extend_from_slice(&(v.0.len() as u16).to_be_bytes());
            for s in &v.0 {
                write_str(&mut out, s);
            }
        }
        Item::Value(v) => write_str(&mut out, &v.0),
    }
    out
}

fn encode_origin(v: &Origin, out: &mut Vec<u8>) {
    match v {
        Origin::Grib1 {
            centre,
            subcentre,
            process,
        } => {
            out.push(0);
            out.extend_from_slice(&[*centre, *subcentre, *process]);
        }
        Origin::Grib2 {
            centre,
            subcentre,
            process_type,
            bg_process,
            process,
        } => {
            out.push(1);
            out.extend_from_slice(&centre.to_be_bytes());
            out.extend_from_slice(&subcentre.to_be_bytes());
            out.extend_from_slice(&[*process_type, *bg_process, *process]);
        }
        Origin::Bufr { centre, subcentre } => {
            out.push(2);
            out.extend_from_slice(&centre.to_be_bytes());
            out.extend_from_slice(&subcentre.to_be_bytes());
        }
        Origin::Odimh5 { wmo, rad, plc } => {
            out.push(3);
            write_str(out, wmo);
            write_str(out, rad);
            write_str(out, plc);
        }
    }
}

fn decode_origin(payload: &[u8]) -> Result<Origin> {
    if payload.is_empty() {
        return err_at!(Codec, "ShortRead: origin style tag");
    }
    let mut off = 1;
    match payload[0] {
        0 => {
            if payload.len() < 4 {
                return err_at!(Codec, "ShortRead: origin grib1");
            }
            Ok(Origin::Grib1 {
                centre: payload[1],
                subcentre: payload[2],
                process: payload[3],
            })
        }
        1 => {
            if payload.len() < off + 2 {
                return err_at!(Codec, "ShortRead: origin grib2 centre");
            }
            let centre = u16::from_be_bytes(payload[off..off + 2].try_into().unwrap());
            off += 2;
            let subcentre = u16::from_be_bytes(payload[off..off + 2].try_into().unwrap());
            off += 2;
            if payload.len() < off + 3 {
                return err_at!(Codec, "ShortRead: origin grib2 trailer");
            }
            Ok(Origin::Grib2 {
                centre,
                subcentre,
                process_type: payload[off],
                bg_process: payload[off + 1],
                process: payload[off + 2],
            })
        }
        2 => {
            if payload.len() < off + 4 {
                return err_at!(Codec, "ShortRead: origin bufr");
            }
            let centre = u16::from_be_bytes(payload[off..off + 2].try_into().unwrap());
            let subcentre = u16::from_be_bytes(payload[off + 2..off + 4].try_into().unwrap());
            Ok(Origin::Bufr { centre, subcentre })
        }
        3 => {
            let wmo = read_str(payload, &mut off)?;
            let rad = read_str(payload, &mut off)?;
            let plc = read_str(payload, &mut off)?;
            Ok(Origin::Odimh5 { wmo, rad, plc })
        }
        n => err_at!(Codec, "unknown origin style tag {}", n),
    }
}

fn encode_product(v: &Product, out: &mut Vec<u8>) {
    match v {
        Product::Grib1 {
            origin,
            table,
            product,
        } => {
            out.push(0);
            out.extend_from_slice(&[*origin, *table, *product]);
        }
        Product::Grib2 {
            centre,
            discipline,
            category,
            number,
        } => {
            out.push(1);
            out.extend_from_slice(&centre.to_be_bytes());
            out.extend_from_slice(&[*discipline, *category, *number]);
        }
        Product::Bufr {
            ty,
            subtype,
            localsubtype,
        } => {
            out.push(2);
            out.extend_from_slice(&[*ty, *subtype, *localsubtype]);
        }
        Product::Odimh5 { obj, product } => {
            out.push(3);
            write_str(out, obj);
            write_str(out, product);
        }
        Product::Vm2 { variable } => {
            out.push(4);
            out.extend_from_slice(&variable.to_be_bytes());
        }
    }
}

fn decode_product(payload: &[u8]) -> Result<Product> {
    if payload.is_empty() {
        return err_at!(Codec, "ShortRead: product style tag");
    }
    let mut off = 1;
    match payload[0] {
        0 => {
            if payload.len() < 4 {
                return err_at!(Codec, "ShortRead: product grib1");
            }
            Ok(Product::Grib1 {
                origin: payload[1],
                table: payload[2],
                product: payload[3],
            })
        }
        1 => {
            if payload.len() < off + 2 {
                return err_at!(Codec, "ShortRead: product grib2 centre");
            }
            let centre = u16::from_be_bytes(payload[off..off + 2].try_into().unwrap());
            off += 2;
            if payload.len() < off + 3 {
                return err_at!(Codec, "ShortRead: product grib2 trailer");
            }
            Ok(Product::Grib2 {
                centre,
                discipline: payload[off],
                category: payload[off + 1],
                number: payload[off + 2],
            })
        }
        2 => {
            if payload.len() < 4 {
                return err_at!(Codec, "ShortRead: product bufr");
            }
            Ok(Product::Bufr {
                ty: payload[1],
                subtype: payload[2],
                localsubtype: payload[3],
            })
        }
        3 => {
            let obj = read_str(payload, &mut off)?;
            let product = read_str(payload, &mut off)?;
            Ok(Product::Odimh5 { obj, product })
        }
        4 => {
            if payload.len() < off + 4 {
                return err_at!(Codec, "ShortRead: product vm2");
            }
            let variable = u32::from_be_bytes(payload[off..off + 4].try_into().unwrap());
            Ok(Product::Vm2 { variable })
        }
        n => err_at!(Codec, "unknown product style tag {}", n),
    }
}

fn encode_level(v: &Level, out: &mut Vec<u8>) {
    match v {
        Level::Grib1 { ltype, l1, l2 } => {
            out.push(0);
            out.push(*ltype);
            out.extend_from_slice(&l1.to_be_bytes());
            out.extend_from_slice(&l2.to_be_bytes());
        }
        Level::Grib2s { ltype, scale, value } => {
            out.push(1);
            out.push(*ltype);
            out.extend_from_slice(&scale.to_be_bytes());
            out.extend_from_slice(&value.to_be_bytes());
        }
        Level::Grib2d {
            ltype1,
            scale1,
            value1,
            ltype2,
            scale2,
            value2,
        } => {
            out.push(2);
            out.push(*ltype1);
            out.extend_from_slice(&scale1.to_be_bytes());
            out.extend_from_slice(&value1.to_be_bytes());
            out.push(*ltype2);
            out.extend_from_slice(&scale2.to_be_bytes());
            out.extend_from_slice(&value2.to_be_bytes());
        }
        Level::Odimh5 { range, elevation } => {
            out.push(3);
            out.extend_from_slice(&range.to_be_bytes());
            out.extend_from_slice(&elevation.to_be_bytes());
        }
    }
}

fn decode_level(payload: &[u8]) -> Result<Level> {
    if payload.is_empty() {
        return err_at!(Codec, "ShortRead: level style tag");
    }
    match payload[0] {
        0 => {
            if payload.len() < 9 {
                return err_at!(Codec, "ShortRead: level grib1");
            }
            Ok(Level::Grib1 {
                ltype: payload[1],
                l1: u16::from_be_bytes(payload[2..4].try_into().unwrap()),
                l2: u16::from_be_bytes(payload[4..6].try_into().unwrap()),
            })
        }
        1 => {
            if payload.len() < 13 {
                return err_at!(Codec, "ShortRead: level grib2s");
            }
            Ok(Level::Grib2s {
                ltype: payload[1],
                scale: i32::from_be_bytes(payload[2..6].try_into().unwrap()),
                value: i64::from_be_bytes(payload[6..14].try_into().unwrap()),
            })
        }
        2 => {
            if payload.len() < 27 {
                return err_at!(Codec, "ShortRead: level grib2d");
            }
            Ok(Level::Grib2d {
                ltype1: payload[1],
                scale1: i32::from_be_bytes(payload[2..6].try_into().unwrap()),
                value1: i64::from_be_bytes(payload[6..14].try_into().unwrap()),
                ltype2: payload[14],
                scale2: i32::from_be_bytes(payload[15..19].try_into().unwrap()),
                value2: i64::from_be_bytes(payload[19..27].try_into().unwrap()),
            })
        }
        3 => {
            if payload.len() < 17 {
                return err_at!(Codec, "ShortRead: level odimh5");
            }
            Ok(Level::Odimh5 {
                range: i64::from_be_bytes(payload[1..9].try_into().unwrap()),
                elevation: i64::from_be_bytes(payload[9..17].try_into().unwrap()),
            })
        }
        n => err_at!(Codec, "unknown level style tag {}", n),
    }
}

fn encode_timerange(v: &Timerange, out: &mut Vec<u8>) {
    match v {
        Timerange::Grib1 { ttype, unit, p1, p2 } => {
            out.push(0);
            out.push(*ttype);
            out.push(*unit);
            out.extend_from_slice(&p1.to_be_bytes());
            out.extend_from_slice(&p2.to_be_bytes());
        }
        Timerange::Timedef {
            step_len,
            step_unit,
            stat_type,
            stat_len,
            stat_unit,
        } => {
            out.push(1);
            out.extend_from_slice(&step_len.to_be_bytes());
            out.push(*step_unit);
            out.push(*stat_type);
            out.extend_from_slice(&stat_len.to_be_bytes());
            out.push(*stat_unit);
        }
    }
}

fn decode_timerange(payload: &[u8]) -> Result<Timerange> {
    if payload.is_empty() {
        return err_at!(Codec, "ShortRead: timerange style tag");
    }
    match payload[0] {
        0 => {
            if payload.len() < 11 {
                return err_at!(Codec, "ShortRead: timerange grib1");
            }
            Ok(Timerange::Grib1 {
                ttype: payload[1],
                unit: payload[2],
                p1: u32::from_be_bytes(payload[3..7].try_into().unwrap()),
                p2: u32::from_be_bytes(payload[7..11].try_into().unwrap()),
            })
        }
        1 => {
            if payload.len() < 11 {
                return err_at!(Codec, "ShortRead: timerange timedef");
            }
            Ok(Timerange::Timedef {
                step_len: u32::from_be_bytes(payload[1..5].try_into().unwrap()),
                step_unit: payload[5],
                stat_type: payload[6],
                stat_len: u32::from_be_bytes(payload[7..11].try_into().unwrap()),
                stat_unit: payload[11],
            })
        }
        n => err_at!(Codec, "unknown timerange style tag {}", n),
    }
}

fn encode_keyed(_tag: &str, v: &Area, out: &mut Vec<u8>) {
    let (style, kv): (u8, &std::collections::BTreeMap<String, String>) = match v {
        Area::Grib(kv) => (0, kv),
        Area::Odimh5(kv) => (1, kv),
        Area::Vm2 { station_id } => {
            out.push(2);
            out.extend_from_slice(&station_id.to_be_bytes());
            return;
        }
    };
    out.push(style);
    out.extend_from_slice(&(kv.len() as u16).to_be_bytes());
    for (k, val) in kv.iter() {
        write_str(out, k);
        write_str(out, val);
    }
}

fn decode_area(payload: &[u8]) -> Result<Area> {
    if payload.is_empty() {
        return err_at!(Codec, "ShortRead: area style tag");
    }
    match payload[0] {
        2 => {
            if payload.len() < 5 {
                return err_at!(Codec, "ShortRead: area vm2");
            }
            Ok(Area::Vm2 {
                station_id: u32::from_be_bytes(payload[1..5].try_into().unwrap()),
            })
        }
        style @ (0 | 1) => {
            let kv = decode_keyed_map(payload)?;
            Ok(if style == 0 { Area::Grib(kv) } else { Area::Odimh5(kv) })
        }
        n => err_at!(Codec, "unknown area style tag {}", n),
    }
}

fn decode_keyed_map(payload: &[u8]) -> Result<std::collections::BTreeMap<String, String>> {
    let mut off = 1;
    if payload.len() < off + 2 {
        return err_at!(Codec, "ShortRead: keyed map count");
    }
    let count = u16::from_be_bytes(payload[off..off + 2].try_into().unwrap());
    off += 2;
    let mut map = std::collections::BTreeMap::new();
    for _ in 0..count {
        let k = read_str(payload, &mut off)?;
        let v = read_str(payload, &mut off)?;
        map.insert(k, v);
    }
    Ok(map)
}

fn encode_keyed_proddef(v: &Proddef, out: &mut Vec<u8>) {
    let (style, kv) = match v {
        Proddef::Grib(kv) => (0u8, kv),
        Proddef::Vm2(kv) => (1u8, kv),
    };
    out.push(style);
    out.extend_from_slice(&(kv.len() as u16).to_be_bytes());
    for (k, val) in kv.iter() {
        write_str(out, k);
        write_str(out, val);
    }
}

fn decode_proddef(payload: &[u8]) -> Result<Proddef> {
    if payload.is_empty() {
        return err_at!(Codec, "ShortRead: proddef style tag");
    }
    let kv = decode_keyed_map(payload)?;
    Ok(if payload[0] == 0 {
        Proddef::Grib(kv)
    } else {
        Proddef::Vm2(kv)
    })
}

pub(crate) fn decode_item(code: Code, payload: &[u8]) -> Result<Item> {
    Ok(match code {
        Code::Origin => Item::Origin(decode_origin(payload)?),
        Code::Product => Item::Product(decode_product(payload)?),
        Code::Level => Item::Level(decode_level(payload)?),
        Code::Timerange => Item::Timerange(decode_timerange(payload)?),
        Code::Area => Item::Area(decode_area(payload)?),
        Code::Proddef => Item::Proddef(decode_proddef(payload)?),
        Code::Run => {
            if payload.len() < 4 {
                return err_at!(Codec, "ShortRead: run");
            }
            Item::Run(Run {
                minute: u32::from_be_bytes(payload[..4].try_into().unwrap()),
            })
        }
        Code::Task => {
            let mut off = 0;
            Item::Task(Task(read_str(payload, &mut off)?))
        }
        Code::Quantity => {
            if payload.len() < 2 {
                return err_at!(Codec, "ShortRead: quantity count");
            }
            let count = u16::from_be_bytes(payload[0..2].try_into().unwrap());
            let mut off = 2;
            let mut v = Vec::new();
            for _ in 0..count {
                v.push(read_str(payload, &mut off)?);
            }
            Item::Quantity(Quantity(v))
        }
        Code::Value => {
            let mut off = 0;
            Item::Value(Value(read_str(payload, &mut off)?))
        }
        other => return err_at!(Codec, "UnknownTypeCode {:?}", other),
    })
}

/// Encode a full record's payload: reftime, source, notes, then the
/// generic item set, each as its own element envelope.
pub fn encode_metadata(md: &Metadata) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(reftime) = md.reftime() {
        write_envelope(&mut out, Code::Reftime, &encode_reftime(reftime));
    }
    if let Some(source) = md.source() {
        write_envelope(&mut out, Code::Source, &encode_source(source));
    }
    for note in md.notes() {
        write_envelope(&mut out, Code::Note, &encode_note(note));
    }
    for item in md.items() {
        write_envelope(&mut out, item.code(), &encode_item_payload(item));
    }
    out
}

/// Decode a record's payload. Unknown type codes are skipped (recoverable
/// per spec §4.1) as long as the envelope length lets us step past them.
pub fn decode_metadata(buf: &[u8]) -> Result<Metadata> {
    let mut md = Metadata::new();
    let mut off = 0;
    while off < buf.len() {
        if buf.len() < off + 3 {
            return err_at!(Codec, "MalformedEnvelope: truncated header");
        }
        let code_byte = buf[off];
        let len = u16::from_be_bytes(buf[off + 1..off + 3].try_into().unwrap()) as usize;
        off += 3;
        if buf.len() < off + len {
            return err_at!(Codec, "MalformedEnvelope: truncated payload");
        }
        let payload = &buf[off..off + len];
        off += len;

        let code = match code_from_u8(code_byte) {
            Some(c) => c,
            None => continue, // UnknownTypeCode: pass through
        };
        match code {
            Code::Reftime => md.set_reftime(decode_reftime(payload)?),
            Code::Source => md.set_source(decode_source(payload)?),
            Code::Note => md.add_note(decode_note(payload)?),
            other => md.set(decode_item(other, payload)?),
        }
    }
    Ok(md)
}

pub(crate) fn code_from_u8(b: u8) -> Option<Code> {
    Some(match b {
        1 => Code::Origin,
        2 => Code::Product,
        3 => Code::Level,
        4 => Code::Timerange,
        5 => Code::Reftime,
        6 => Code::Note,
        7 => Code::Source,
        8 => Code::Area,
        9 => Code::Proddef,
        10 => Code::Run,
        11 => Code::Task,
        12 => Code::Quantity,
        13 => Code::Value,
        _ => return None,
    })
}

#[path = "binary_test.rs"]
#[cfg(test)]
mod binary_test;
