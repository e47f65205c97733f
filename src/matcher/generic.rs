//! Per-type clauses for every metadata type other than `origin` and
//! `reftime` (spec §4.3: "Other types are analogous"): product, level,
//! timerange, area, proddef, run, task, quantity, value. Each is a
//! disjunction of style-specific atoms with optional wildcard fields,
//! mirroring [`crate::matcher::origin`].

use std::collections::BTreeMap;
use std::fmt;

use crate::codec::text::split_style;
use crate::err_at;
use crate::error::{Error, Result};
use crate::types::{Area, Code, Item, Level, Proddef, Product, Run, Task, Timerange, Value};

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

fn field_ok<T: PartialEq>(want: &Option<T>, have: &T) -> bool {
    want.as_ref().map_or(true, |w| w == have)
}

fn str_field_ok(want: &Option<String>, have: &str) -> bool {
    want.as_ref().map_or(true, |w| w == have)
}

fn fmt_opt(v: &Option<impl fmt::Display>) -> String {
    v.as_ref().map_or("-".to_string(), |v| v.to_string())
}

/// Any specified key must be present in the item's keyed-value map with
/// the matching value; unspecified keys in the item are ignored.
fn keyed_subset_ok(want: &BTreeMap<String, String>, have: &BTreeMap<String, String>) -> bool {
    want.iter().all(|(k, v)| have.get(k) == Some(v))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Atom {
    ProductGrib1 { origin: Option<u8>, table: Option<u8>, product: Option<u8> },
    ProductGrib2 { centre: Option<u16>, discipline: Option<u8>, category: Option<u8>, number: Option<u8> },
    ProductBufr { ty: Option<u8>, subtype: Option<u8>, localsubtype: Option<u8> },
    ProductOdimh5 { obj: Option<String>, product: Option<String> },
    ProductVm2 { variable: Option<u32> },

    LevelGrib1 { ltype: Option<u8>, l1: Option<u16>, l2: Option<u16> },
    LevelGrib2s { ltype: Option<u8>, scale: Option<i32>, value: Option<i64> },
    LevelGrib2d {
        ltype1: Option<u8>,
        scale1: Option<i32>,
        value1: Option<i64>,
        ltype2: Option<u8>,
        scale2: Option<i32>,
        value2: Option<i64>,
    },
    LevelOdimh5 { range: Option<i64>, elevation: Option<i64> },

    TimerangeGrib1 { ttype: Option<u8>, unit: Option<u8>, p1: Option<u32>, p2: Option<u32> },
    TimerangeTimedef {
        step_len: Option<u32>,
        step_unit: Option<u8>,
        stat_type: Option<u8>,
        stat_len: Option<u32>,
        stat_unit: Option<u8>,
    },

    AreaGrib(BTreeMap<String, String>),
    AreaOdimh5(BTreeMap<String, String>),
    AreaVm2 { station_id: Option<u32> },

    ProddefGrib(BTreeMap<String, String>),
    ProddefVm2(BTreeMap<String, String>),

    Run { minute: Option<u32> },
    Task(Option<String>),
    Quantity(Vec<String>),
    Value(Option<String>),
}

impl Atom {
    fn parse(code: Code, expr: &str) -> Result<Atom> {
        if code == Code::Task || code == Code::Value {
            // plain wildcard-or-exact string, no Style(args) wrapper.
            return Ok(match code {
                Code::Task => Atom::Task(wild_str(expr)),
                Code::Value => Atom::Value(wild_str(expr)),
                _ => unreachable!(),
            });
        }
        if code == Code::Quantity {
            return Ok(Atom::Quantity(
                expr.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            ));
        }
        if code == Code::Run {
            let (style, args) = split_style(expr)?;
            if style != "MINUTE" || args.len() != 1 {
                return err_at!(Matcher, "unrecognized Run match expression {:?}", expr);
            }
            return Ok(Atom::Run { minute: wild(args[0], "run minute")? });
        }

        let (style, args) = split_style(expr)?;
        Ok(match (code, style, args.len()) {
            (Code::Product, "GRIB1", 3) => Atom::ProductGrib1 {
                origin: wild(args[0], "product origin")?,
                table: wild(args[1], "product table")?,
                product: wild(args[2], "product product")?,
            },
            (Code::Product, "GRIB2", 4) => Atom::ProductGrib2 {
                centre: wild(args[0], "product centre")?,
                discipline: wild(args[1], "product discipline")?,
                category: wild(args[2], "product category")?,
                number: wild(args[3], "product number")?,
            },
            (Code::Product, "BUFR", 3) => Atom::ProductBufr {
                ty: wild(args[0], "product type")?,
                subtype: wild(args[1], "product subtype")?,
                localsubtype: wild(args[2], "product localsubtype")?,
            },
            (Code::Product, "ODIMH5", 2) => Atom::ProductOdimh5 {
                obj: wild_str(args[0]),
                product: wild_str(args[1]),
            },
            (Code::Product, "VM2", 1) => Atom::ProductVm2 {
                variable: wild(args[0], "product variable")?,
            },

            (Code::Level, "GRIB1", 3) => Atom::LevelGrib1 {
                ltype: wild(args[0], "level ltype")?,
                l1: wild(args[1], "level l1")?,
                l2: wild(args[2], "level l2")?,
            },
            (Code::Level, "GRIB2S", 3) => Atom::LevelGrib2s {
                ltype: wild(args[0], "level ltype")?,
                scale: wild(args[1], "level scale")?,
                value: wild(args[2], "level value")?,
            },
            (Code::Level, "GRIB2D", 6) => Atom::LevelGrib2d {
                ltype1: wild(args[0], "level ltype1")?,
                scale1: wild(args[1], "level scale1")?,
                value1: wild(args[2], "level value1")?,
                ltype2: wild(args[3], "level ltype2")?,
                scale2: wild(args[4], "level scale2")?,
                value2: wild(args[5], "level value2")?,
            },
            (Code::Level, "ODIMH5", 2) => Atom::LevelOdimh5 {
                range: wild(args[0], "level range")?,
                elevation: wild(args[1], "level elevation")?,
            },

            (Code::Timerange, "GRIB1", 4) => Atom::TimerangeGrib1 {
                ttype: wild(args[0], "timerange ttype")?,
                unit: wild(args[1], "timerange unit")?,
                p1: wild(args[2], "timerange p1")?,
                p2: wild(args[3], "timerange p2")?,
            },
            (Code::Timerange, "Timedef", 5) => Atom::TimerangeTimedef {
                step_len: wild(args[0], "timerange step_len")?,
                step_unit: wild(args[1], "timerange step_unit")?,
                stat_type: wild(args[2], "timerange stat_type")?,
                stat_len: wild(args[3], "timerange stat_len")?,
                stat_unit: wild(args[4], "timerange stat_unit")?,
            },

            (Code::Area, "GRIB", _) => Atom::AreaGrib(parse_keyed(&args)?),
            (Code::Area, "ODIMH5", _) => Atom::AreaOdimh5(parse_keyed(&args)?),
            (Code::Area, "VM2", 1) => Atom::AreaVm2 {
                station_id: wild(args[0], "area station_id")?,
            },

            (Code::Proddef, "GRIB", _) => Atom::ProddefGrib(parse_keyed(&args)?),
            (Code::Proddef, "VM2", _) => Atom::ProddefVm2(parse_keyed(&args)?),

            _ => return err_at!(Matcher, "unrecognized {} match expression {:?}", code.name(), expr),
        })
    }

    fn matches(&self, item: &Item) -> bool {
        match (self, item) {
            (
                Atom::ProductGrib1 { origin, table, product },
                Item::Product(Product::Grib1 { origin: o, table: t, product: p }),
            ) => field_ok(origin, o) && field_ok(table, t) && field_ok(product, p),
            (
                Atom::ProductGrib2 { centre, discipline, category, number },
                Item::Product(Product::Grib2 { centre: c, discipline: d, category: cat, number: n }),
            ) => field_ok(centre, c) && field_ok(discipline, d) && field_ok(category, cat) && field_ok(number, n),
            (
                Atom::ProductBufr { ty, subtype, localsubtype },
                Item::Product(Product::Bufr { ty: t, subtype: s, localsubtype: l }),
            ) => field_ok(ty, t) && field_ok(subtype, s) && field_ok(localsubtype, l),
            (
                Atom::ProductOdimh5 { obj, product },
                Item::Product(Product::Odimh5 { obj: o, product: p }),
            ) => str_field_ok(obj, o) && str_field_ok(product, p),
            (Atom::ProductVm2 { variable }, Item::Product(Product::Vm2 { variable: v })) => {
                field_ok(variable, v)
            }

            (
                Atom::LevelGrib1 { ltype, l1, l2 },
                Item::Level(Level::Grib1 { ltype: t, l1: a, l2: b }),
            ) => field_ok(ltype, t) && field_ok(l1, a) && field_ok(l2, b),
            (
                Atom::LevelGrib2s { ltype, scale, value },
                Item::Level(Level::Grib2s { ltype: t, scale: s, value: v }),
            ) => field_ok(ltype, t) && field_ok(scale, s) && field_ok(value, v),
            (
                Atom::LevelGrib2d { ltype1, scale1, value1, ltype2, scale2, value2 },
                Item::Level(Level::Grib2d {
                    ltype1: t1,
                    scale1: s1,
                    value1: v1,
                    ltype2: t2,
                    scale2: s2,
                    value2: v2,
                }),
            ) => {
                field_ok(ltype1, t1)
                    && field_ok(scale1, s1)
                    && field_ok(value1, v1)
                    && field_ok(ltype2, t2)
                    && field_ok(scale2, s2)
                    && field_ok(value2, v2)
            }
            (
                Atom::LevelOdimh5 { range, elevation },
                Item::Level(Level::Odimh5 { range: r, elevation: e }),
            ) => field_ok(range, r) && field_ok(elevation, e),

            (
                Atom::TimerangeGrib1 { ttype, unit, p1, p2 },
                Item::Timerange(Timerange::Grib1 { ttype: t, unit: u, p1: a, p2: b }),
            ) => field_ok(ttype, t) && field_ok(unit, u) && field_ok(p1, a) && field_ok(p2, b),
            (
                Atom::TimerangeTimedef { step_len, step_unit, stat_type, stat_len, stat_unit },
                Item::Timerange(Timerange::Timedef {
                    step_len: sl,
                    step_unit: su,
                    stat_type: st,
                    stat_len: tl,
                    stat_unit: tu,
                }),
            ) => {
                field_ok(step_len, sl)
                    && field_ok(step_unit, su)
                    && field_ok(stat_type, st)
                    && field_ok(stat_len, tl)
                    && field_ok(stat_unit, tu)
            }

            (Atom::AreaGrib(want), Item::Area(Area::Grib(have))) => keyed_subset_ok(want, have),
            (Atom::AreaOdimh5(want), Item::Area(Area::Odimh5(have))) => keyed_subset_ok(want, have),
            (Atom::AreaVm2 { station_id }, Item::Area(Area::Vm2 { station_id: s })) => field_ok(station_id, s),

            (Atom::ProddefGrib(want), Item::Proddef(Proddef::Grib(have))) => keyed_subset_ok(want, have),
            (Atom::ProddefVm2(want), Item::Proddef(Proddef::Vm2(have))) => keyed_subset_ok(want, have),

            (Atom::Run { minute }, Item::Run(Run { minute: m })) => field_ok(minute, m),
            (Atom::Task(want), Item::Task(Task(have))) => str_field_ok(want, have),
            (Atom::Quantity(want), Item::Quantity(crate::types::Quantity(have))) => {
                want.iter().all(|w| have.contains(w))
            }
            (Atom::Value(want), Item::Value(Value(have))) => str_field_ok(want, have),

            _ => false,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Atom::ProductGrib1 { origin, table, product } => {
                write!(f, "GRIB1({}, {}, {})", fmt_opt(origin), fmt_opt(table), fmt_opt(product))
            }
            Atom::ProductGrib2 { centre, discipline, category, number } => write!(
                f,
                "GRIB2({}, {}, {}, {})",
                fmt_opt(centre),
                fmt_opt(discipline),
                fmt_opt(category),
                fmt_opt(number)
            ),
            Atom::ProductBufr { ty, subtype, localsubtype } => {
                write!(f, "BUFR({}, {}, {})", fmt_opt(ty), fmt_opt(subtype), fmt_opt(localsubtype))
            }
            Atom::ProductOdimh5 { obj, product } => write!(f, "ODIMH5({}, {})", fmt_opt(obj), fmt_opt(product)),
            Atom::ProductVm2 { variable } => write!(f, "VM2({})", fmt_opt(variable)),

            Atom::LevelGrib1 { ltype, l1, l2 } => {
                write!(f, "GRIB1({}, {}, {})", fmt_opt(ltype), fmt_opt(l1), fmt_opt(l2))
            }
            Atom::LevelGrib2s { ltype, scale, value } => {
                write!(f, "GRIB2S({}, {}, {})", fmt_opt(ltype), fmt_opt(scale), fmt_opt(value))
            }
            Atom::LevelGrib2d { ltype1, scale1, value1, ltype2, scale2, value2 } => write!(
                f,
                "GRIB2D({}, {}, {}, {}, {}, {})",
                fmt_opt(ltype1),
                fmt_opt(scale1),
                fmt_opt(value1),
                fmt_opt(ltype2),
                fmt_opt(scale2),
                fmt_opt(value2)
            ),
            Atom::LevelOdimh5 { range, elevation } => {
                write!(f, "ODIMH5({}, {})", fmt_opt(range), fmt_opt(elevation))
            }

            Atom::TimerangeGrib1 { ttype, unit, p1, p2 } => {
                write!(f, "GRIB1({}, {}, {}, {})", fmt_opt(ttype), fmt_opt(unit), fmt_opt(p1), fmt_opt(p2))
            }
            Atom::TimerangeTimedef { step_len, step_unit, stat_type, stat_len, stat_unit } => write!(
                f,
                "Timedef({}, {}, {}, {}, {})",
                fmt_opt(step_len),
                fmt_opt(step_unit),
                fmt_opt(stat_type),
                fmt_opt(stat_len),
                fmt_opt(stat_unit)
            ),

            Atom::AreaGrib(kv) => write!(f, "GRIB({:?})", kv),
            Atom::AreaOdimh5(kv) => write!(f, "ODIMH5({:?})", kv),
            Atom::AreaVm2 { station_id } => write!(f, "VM2({})", fmt_opt(station_id)),

            Atom::ProddefGrib(kv) => write!(f, "GRIB({:?})", kv),
            Atom::ProddefVm2(kv) => write!(f, "VM2({:?})", kv),

            Atom::Run { minute } => write!(f, "MINUTE({})", fmt_opt(minute)),
            Atom::Task(v) => write!(f, "{}", fmt_opt(v)),
            Atom::Quantity(v) => write!(f, "{}", v.join(",")),
            Atom::Value(v) => write!(f, "{}", fmt_opt(v)),
        }
    }
}

fn parse_keyed(args: &[&str]) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for arg in args {
        let (k, v) = arg
            .split_once('=')
            .ok_or_else(|| Error::Matcher(format!("malformed keyed value {:?}", arg)))?;
        map.insert(k.trim().to_string(), v.trim().to_string());
    }
    Ok(map)
}

/// A parsed clause for one of the "generic" metadata types: a
/// disjunction of style-specific atoms.
#[derive(Debug, Clone)]
pub struct GenericMatch {
    code: Code,
    alternatives: Vec<Atom>,
}

impl GenericMatch {
    pub fn parse(code: Code, expr: &str) -> Result<GenericMatch> {
        let alternatives = expr
            .split(" or ")
            .map(|alt| Atom::parse(code, alt.trim()))
            .collect::<Result<Vec<_>>>()?;
        Ok(GenericMatch { code, alternatives })
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.alternatives.iter().any(|a| a.matches(item))
    }
}

impl fmt::Display for GenericMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            self.alternatives.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(" or ")
        )
    }
}

#[path = "generic_test.rs"]
#[cfg(test)]
mod generic_test;
