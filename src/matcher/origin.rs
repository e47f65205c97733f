//! The `origin:` clause: unlike the other item types, `Origin` supports
//! partial specification — an empty or `-` field means "any value here"
//! (spec §4.3).

use std::fmt;

use crate::codec::text::split_style;
use crate::err_at;
use crate::error::{Error, Result};
use crate::types::Origin;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginMatch {
    Grib1 {
        centre: Option<u8>,
        subcentre: Option<u8>,
        process: Option<u8>,
    },
    Grib2 {
        centre: Option<u16>,
        subcentre: Option<u16>,
        process_type: Option<u8>,
        bg_process: Option<u8>,
        process: Option<u8>,
    },
    Bufr {
        centre: Option<u16>,
        subcentre: Option<u16>,
    },
    Odimh5 {
        wmo: Option<String>,
        rad: Option<String>,
        plc: Option<String>,
    },
}

fn wild<T: std::str::FromStr>(s: &str, field: &str) -> Result<Option<T>> {
    if s.is_empty() || s == "-" {
        return Ok(None);
    }
    Ok(Some(
        s.parse()
            .map_err(|_| Error::Matcher(format!("cannot parse {} {:?}", field, s)))?,
    ))
}

fn wild_str(s: &str) -> Option<String> {
    if s.is_empty() || s == "-" {
        None
    } else {
        Some(s.to_string())
    }
}

impl OriginMatch {
    pub fn parse(expr: &str) -> Result<OriginMatch> {
        let (style, args) = split_style(expr)?;
        Ok(match style {
            "GRIB1" if args.len() == 3 => OriginMatch::Grib1 {
                centre: wild(args[0], "centre")?,
                subcentre: wild(args[1], "subcentre")?,
                process: wild(args[2], "process")?,
            },
            "GRIB2" if args.len() == 5 => OriginMatch::Grib2 {
                centre: wild(args[0], "centre")?,
                subcentre: wild(args[1], "subcentre")?,
                process_type: wild(args[2], "process_type")?,
                bg_process: wild(args[3], "bg_process")?,
                process: wild(args[4], "process")?,
            },
            "BUFR" if args.len() == 2 => OriginMatch::Bufr {
                centre: wild(args[0], "centre")?,
                subcentre: wild(args[1], "subcentre")?,
            },
            "ODIMH5" if args.len() == 3 => OriginMatch::Odimh5 {
                wmo: wild_str(args[0]),
                rad: wild_str(args[1]),
                plc: wild_str(args[2]),
            },
            _ => return err_at!(Matcher, "unrecognized origin match expression {:?}", expr),
        })
    }

    pub fn parse_alternatives(expr: &str) -> Result<Vec<OriginMatch>> {
        expr.split(" or ").map(|alt| OriginMatch::parse(alt.trim())).collect()
    }

    pub fn matches(&self, origin: &Origin) -> bool {
        match (self, origin) {
            (
                OriginMatch::Grib1 {
                    centre,
                    subcentre,
                    process,
                },
                Origin::Grib1 {
                    centre: c,
                    subcentre: s,
                    process: p,
                },
            ) => field_ok(centre, c) && field_ok(subcentre, s) && field_ok(process, p),
            (
                OriginMatch::Grib2 {
                    centre,
                    subcentre,
                    process_type,
                    bg_process,
                    process,
                },
                Origin::Grib2 {
                    centre: c,
                    subcentre: s,
                    process_type: pt,
                    bg_process: bp,
                    process: p,
                },
            ) => {
                field_ok(centre, c)
                    && field_ok(subcentre, s)
                    && field_ok(process_type, pt)
                    && field_ok(bg_process, bp)
                    && field_ok(process, p)
            }
            (OriginMatch::Bufr { centre, subcentre }, Origin::Bufr { centre: c, subcentre: s }) => {
                field_ok(centre, c) && field_ok(subcentre, s)
            }
            (OriginMatch::Odimh5 { wmo, rad, plc }, Origin::Odimh5 { wmo: w, rad: r, plc: p }) => {
                str_field_ok(wmo, w) && str_field_ok(rad, r) && str_field_ok(plc, p)
            }
            _ => false,
        }
    }
}

fn field_ok<T: PartialEq>(want: &Option<T>, have: &T) -> bool {
    want.as_ref().map_or(true, |w| w == have)
}

fn str_field_ok(want: &Option<String>, have: &str) -> bool {
    want.as_ref().map_or(true, |w| w == have)
}

impl fmt::Display for OriginMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fmt_opt = |v: &Option<impl fmt::Display>| v.as_ref().map_or("-".to_string(), |v| v.to_string());
        match self {
            OriginMatch::Grib1 {
                centre,
                subcentre,
                process,
            } => write!(f, "GRIB1({}, {}, {})", fmt_opt(centre), fmt_opt(subcentre), fmt_opt(process)),
            OriginMatch::Grib2 {
                centre,
                subcentre,
                process_type,
                bg_process,
                process,
            } => write!(
                f,
                "GRIB2({}, {}, {}, {}, {})",
                fmt_opt(centre),
                fmt_opt(subcentre),
                fmt_opt(process_type),
                fmt_opt(bg_process),
                fmt_opt(process)
            ),
            OriginMatch::Bufr { centre, subcentre } => {
                write!(f, "BUFR({}, {})", fmt_opt(centre), fmt_opt(subcentre))
            }
            OriginMatch::Odimh5 { wmo, rad, plc } => {
                write!(f, "ODIMH5({}, {}, {})", fmt_opt(wmo), fmt_opt(rad), fmt_opt(plc))
            }
        }
    }
}

#[path = "origin_test.rs"]
#[cfg(test)]
mod origin_test;
