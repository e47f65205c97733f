//! The human-readable `Key: value` text form (spec §4.1): one line per
//! item, blank line between records. Used for `arki-dump`-style output
//! and config fixtures; round-trips through the same [`Item`] types the
//! binary codec uses.

use std::fmt::Write as _;

use lazy_static::lazy_static;
use regex::Regex;

use crate::err_at;
use crate::error::{Error, Result};
use crate::metadata::{DataFormat, Metadata, Note, Reftime, Source};
use crate::time::Time;
use crate::types::{Area, Code, Item, Level, Origin, Proddef, Product, Quantity, Run, Task, Timerange, Value};

lazy_static! {
    static ref STYLE_ARGS: Regex = Regex::new(r"^([A-Za-z0-9]+)\(([^)]*)\)$").unwrap();
    static ref TIME_RE: Regex =
        Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})Z$").unwrap();
}

pub(crate) fn split_style(s: &str) -> Result<(&str, Vec<&str>)> {
    let caps = STYLE_ARGS
        .captures(s)
        .ok_or_else(|| Error::Codec(format!("cannot parse style expression {:?}", s)))?;
    let style = caps.get(1).unwrap().as_str();
    let args_str = caps.get(2).unwrap().as_str();
    let args = if args_str.trim().is_empty() {
        Vec::new()
    } else {
        args_str.split(',').map(|a| a.trim()).collect()
    };
    Ok((style, args))
}

fn parse_num<T: std::str::FromStr>(s: &str, field: &str) -> Result<T> {
    s.parse()
        .map_err(|_| Error::Codec(format!("cannot parse {} {:?}", field, s)))
}

pub(crate) fn parse_time(s: &str) -> Result<Time> {
    let caps = TIME_RE
        .captures(s.trim())
        .ok_or_else(|| Error::Codec(format!("cannot parse time {:?}", s)))?;
    let field = |i: usize| -> Result<i64> {
        caps.get(i)
            .unwrap()
            .as_str()
            .parse()
            .map_err(|_| Error::Codec(format!("cannot parse time field in {:?}", s)))
    };
    Ok(Time::new(
        field(1)? as i32,
        field(2)? as u32,
        field(3)? as u32,
        field(4)? as u32,
        field(5)? as u32,
        field(6)? as u32,
    ))
}

pub(crate) fn parse_origin(value: &str) -> Result<Origin> {
    let (style, args) = split_style(value)?;
    Ok(match style {
        "GRIB1" if args.len() == 3 => Origin::Grib1 {
            centre: parse_num(args[0], "origin centre")?,
            subcentre: parse_num(args[1], "origin subcentre")?,
            process: parse_num(args[2], "origin process")?,
        },
        "GRIB2" if args.len() == 5 => Origin::Grib2 {
            centre: parse_num(args[0], "origin centre")?,
            subcentre: parse_num(args[1], "origin subcentre")?,
            process_type: parse_num(args[2], "origin process_type")?,
            bg_process: parse_num(args[3], "origin bg_process")?,
            process: parse_num(args[4], "origin process")?,
        },
        "BUFR" if args.len() == 2 => Origin::Bufr {
            centre: parse_num(args[0], "origin centre")?,
            subcentre: parse_num(args[1], "origin subcentre")?,
        },
        "ODIMH5" if args.len() == 3 => Origin::Odimh5 {
            wmo: args[0].to_string(),
            rad: args[1].to_string(),
            plc: args[2].to_string(),
        },
        _ => return err_at!(Codec, "unrecognized Origin style {:?}", value),
    })
}

pub(crate) fn parse_product(value: &str) -> Result<Product> {
    let (style, args) = split_style(value)?;
    Ok(match style {
        "GRIB1" if args.len() == 3 => Product::Grib1 {
            origin: parse_num(args[0], "product origin")?,
            table: parse_num(args[1], "product table")?,
            product: parse_num(args[2], "product product")?,
        },
        "GRIB2" if args.len() == 4 => Product::Grib2 {
            centre: parse_num(args[0], "product centre")?,
            discipline: parse_num(args[1], "product discipline")?,
            category: parse_num(args[2], "product category")?,
            number: parse_num(args[3], "product number")?,
        },
        "BUFR" if args.len() == 3 => Product::Bufr {
            ty: parse_num(args[0], "product type")?,
            subtype: parse_num(args[1], "product subtype")?,
            localsubtype: parse_num(args[2], "product localsubtype")?,
        },
        "ODIMH5" if args.len() == 2 => Product::Odimh5 {
            obj: args[0].to_string(),
            product: args[1].to_string(),
        },
        "VM2" if args.len() == 1 => Product::Vm2 {
            variable: parse_num(args[0], "product variable")?,
        },
        _ => return err_at!(Codec, "unrecognized Product style {:?}", value),
    })
}

pub(crate) fn parse_level(value: &str) -> Result<Level> {
    let (style, args) = split_style(value)?;
    Ok(match style {
        "GRIB1" if args.len() == 3 => Level::Grib1 {
            ltype: parse_num(args[0], "level ltype")?,
            l1: parse_num(args[1], "level l1")?,
            l2: parse_num(args[2], "level l2")?,
        },
        "GRIB2S" if args.len() == 3 => Level::Grib2s {
            ltype: parse_num(args[0], "level ltype")?,
            scale: parse_num(args[1], "level scale")?,
            value: parse_num(args[2], "level value")?,
        },
        "GRIB2D" if args.len() == 6 => Level::Grib2d {
            ltype1: parse_num(args[0], "level ltype1")?,
            scale1: parse_num(args[1], "level scale1")?,
            value1: parse_num(args[2], "level value1")?,
            ltype2: parse_num(args[3], "level ltype2")?,
            scale2: parse_num(args[4], "level scale2")?,
            value2: parse_num(args[5], "level value2")?,
        },
        "ODIMH5" if args.len() == 2 => Level::Odimh5 {
            range: parse_num(args[0], "level range")?,
            elevation: parse_num(args[1], "level elevation")?,
        },
        _ => return err_at!(Codec, "unrecognized Level style {:?}", value),
    })
}

pub(crate) fn parse_timerange(value: &str) -> Result<Timerange> {
    let (style, args) = split_style(value)?;
    Ok(match style {
        "GRIB1" if args.len() == 4 => Timerange::Grib1 {
            ttype: parse_num(args[0], "timerange ttype")?,
            unit: parse_num(args[1], "timerange unit")?,
            p1: parse_num(args[2], "timerange p1")?,
            p2: parse_num(args[3], "timerange p2")?,
        },
        "Timedef" if args.len() == 5 => Timerange::Timedef {
            step_len: parse_num(args[0], "timerange step_len")?,
            step_unit: parse_num(args[1], "timerange step_unit")?,
            stat_type: parse_num(args[2], "timerange stat_type")?,
            stat_len: parse_num(args[3], "timerange stat_len")?,
            stat_unit: parse_num(args[4], "timerange stat_unit")?,
        },
        _ => return err_at!(Codec, "unrecognized Timerange style {:?}", value),
    })
}

fn parse_keyed(args_str: &str) -> Result<std::collections::BTreeMap<String, String>> {
    // "{\"k\": \"v\", ...}" as produced by the Debug impl of BTreeMap.
    let mut map = std::collections::BTreeMap::new();
    let trimmed = args_str.trim().trim_start_matches('{').trim_end_matches('}');
    if trimmed.trim().is_empty() {
        return Ok(map);
    }
    for pair in trimmed.split(',') {
        let mut kv = pair.splitn(2, ':');
        let k = kv
            .next()
            .ok_or_else(|| Error::Codec("missing key in keyed value set".into()))?
            .trim()
            .trim_matches('"');
        let v = kv
            .next()
            .ok_or_else(|| Error::Codec("missing value in keyed value set".into()))?
            .trim()
            .trim_matches('"');
        map.insert(k.to_string(), v.to_string());
    }
    Ok(map)
}

pub(crate) fn parse_area(value: &str) -> Result<Area> {
    let (style, args) = split_style(value)?;
    Ok(match style {
        "GRIB" => Area::Grib(parse_keyed(&args.join(","))?),
        "ODIMH5" => Area::Odimh5(parse_keyed(&args.join(","))?),
        "VM2" if args.len() == 1 => Area::Vm2 {
            station_id: parse_num(args[0], "area station_id")?,
        },
        _ => return err_at!(Codec, "unrecognized Area style {:?}", value),
    })
}

pub(crate) fn parse_proddef(value: &str) -> Result<Proddef> {
    let (style, args) = split_style(value)?;
    Ok(match style {
        "GRIB" => Proddef::Grib(parse_keyed(&args.join(","))?),
        "VM2" => Proddef::Vm2(parse_keyed(&args.join(","))?),
        _ => return err_at!(Codec, "unrecognized Proddef style {:?}", value),
    })
}

pub(crate) fn parse_run(value: &str) -> Result<Run> {
    let (style, args) = split_style(value)?;
    if style != "MINUTE" || args.len() != 1 {
        return err_at!(Codec, "unrecognized Run style {:?}", value);
    }
    Ok(Run {
        minute: parse_num(args[0], "run minute")?,
    })
}

pub(crate) fn parse_reftime(value: &str) -> Result<Reftime> {
    if let Some((a, b)) = value.split_once(" to ") {
        Ok(Reftime::Period(parse_time(a)?, parse_time(b)?))
    } else {
        Ok(Reftime::Position(parse_time(value)?))
    }
}

fn parse_source(value: &str) -> Result<Source> {
    let (style, args) = split_style(value)?;
    Ok(match style {
        "BLOB" if args.len() == 4 => Source::Blob {
            format: DataFormat::from_str(args[0])
                .ok_or_else(|| Error::Codec(format!("unknown format {:?}", args[0])))?,
            root: args[1].into(),
            relpath: args[2].into(),
            offset: parse_num(args[3].split(':').next().unwrap_or(args[3]), "source offset")?,
            size: parse_num(
                args[3].split(':').nth(1).unwrap_or("0"),
                "source size",
            )?,
        },
        "INLINE" if args.len() == 2 => Source::Inline {
            format: DataFormat::from_str(args[0])
                .ok_or_else(|| Error::Codec(format!("unknown format {:?}", args[0])))?,
            size: parse_num(args[1], "source size")?,
        },
        "URL" if args.len() == 2 => Source::Url {
            format: DataFormat::from_str(args[0])
                .ok_or_else(|| Error::Codec(format!("unknown format {:?}", args[0])))?,
            url: url::Url::parse(args[1]).map_err(|e| Error::Codec(format!("{}", e)))?,
        },
        _ => return err_at!(Codec, "unrecognized Source style {:?}", value),
    })
}

fn encode_source_line(s: &Source) -> String {
    match s {
        Source::Blob {
            format,
            root,
            relpath,
            offset,
            size,
        } => format!(
            "BLOB({}, {}, {}, {}:{})",
            format,
            root.display(),
            relpath.display(),
            offset,
            size
        ),
        Source::Inline { format, size } => format!("INLINE({}, {})", format, size),
        Source::Url { format, url } => format!("URL({}, {})", format, url),
    }
}

/// Render one record as `Key: value` lines (no trailing blank line).
pub fn encode_record(md: &Metadata) -> String {
    let mut out = String::new();
    if let Some(reftime) = md.reftime() {
        let _ = writeln!(out, "Reftime: {}", reftime);
    }
    for note in md.notes() {
        let _ = writeln!(out, "Note: {}: {}", note.time, note.text);
    }
    if let Some(source) = md.source() {
        let _ = writeln!(out, "Source: {}", encode_source_line(source));
    }
    for item in md.items() {
        let _ = writeln!(out, "{}: {}", capitalize(item.code().name()), item);
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
        None => String::new(),
    }
}

/// Parse one record's `Key: value` lines (no blank lines inside).
pub fn decode_record(text: &str) -> Result<Metadata> {
    let mut md = Metadata::new();
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(": ")
            .ok_or_else(|| Error::Codec(format!("malformed text line {:?}", line)))?;
        match Code::from_name(&key.to_lowercase()) {
            Some(Code::Origin) => md.set(Item::Origin(parse_origin(value)?)),
            Some(Code::Product) => md.set(Item::Product(parse_product(value)?)),
            Some(Code::Level) => md.set(Item::Level(parse_level(value)?)),
            Some(Code::Timerange) => md.set(Item::Timerange(parse_timerange(value)?)),
            Some(Code::Area) => md.set(Item::Area(parse_area(value)?)),
            Some(Code::Proddef) => md.set(Item::Proddef(parse_proddef(value)?)),
            Some(Code::Run) => md.set(Item::Run(parse_run(value)?)),
            Some(Code::Task) => md.set(Item::Task(Task(value.to_string()))),
            Some(Code::Quantity) => {
                md.set(Item::Quantity(Quantity(
                    value.split(',').map(|s| s.trim().to_string()).collect(),
                )));
            }
            Some(Code::Value) => md.set(Item::Value(Value(value.to_string()))),
            Some(Code::Reftime) => md.set_reftime(parse_reftime(value)?),
            Some(Code::Source) => md.set_source(parse_source(value)?),
            Some(Code::Note) => {
                let (time_str, text) = value
                    .split_once(": ")
                    .ok_or_else(|| Error::Codec(format!("malformed Note line {:?}", value)))?;
                md.add_note(Note::new(parse_time(time_str)?, text));
            }
            None => return err_at!(Codec, "unknown text key {:?}", key),
        }
    }
    Ok(md)
}

/// Encode several records, blank-line separated, as produced by
/// `arki-dump`-style bulk output.
pub fn encode_records(records: &[Metadata]) -> String {
    records
        .iter()
        .map(encode_record)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split on blank lines and decode each chunk.
pub fn decode_records(text: &str) -> Result<Vec<Metadata>> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(decode_record)
        .collect()
}

#[path = "text_test.rs"]
#[cfg(test)]
mod text_test;
