//! Typed, style-discriminated metadata items (spec §3, §9.1).
//!
//! Each arkimet metadata type (`Origin`, `Product`, `Level`, ...) is
//! expressed here as a Rust enum whose variants are the item's
//! *styles* (`GRIB1`, `GRIB2`, `BUFR`, `ODIMH5`, `VM2`, ...), each
//! carrying its own style-specific scalar fields — a tagged variant per
//! type code, as called for in spec §9, replacing the source's deep
//! inheritance hierarchy with plain data-oriented values. All types are
//! value-typed, `Clone`, and totally ordered so they can be used as
//! `BTreeMap`/`BTreeSet` keys by the index and the interning tables in
//! [`crate::metadata`].

use std::collections::BTreeMap;
use std::fmt;

/// Discriminates which typed item an [`crate::codec::binary`] envelope
/// or a `Key: value` text line carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Code {
    Origin = 1,
    Product = 2,
    Level = 3,
    Timerange = 4,
    Reftime = 5,
    Note = 6,
    Source = 7,
    Area = 8,
    Proddef = 9,
    Run = 10,
    Task = 11,
    Quantity = 12,
    Value = 13,
}

impl Code {
    pub fn name(&self) -> &'static str {
        match self {
            Code::Origin => "origin",
            Code::Product => "product",
            Code::Level => "level",
            Code::Timerange => "timerange",
            Code::Reftime => "reftime",
            Code::Note => "note",
            Code::Source => "source",
            Code::Area => "area",
            Code::Proddef => "proddef",
            Code::Run => "run",
            Code::Task => "task",
            Code::Quantity => "quantity",
            Code::Value => "value",
        }
    }

    pub fn from_name(name: &str) -> Option<Code> {
        Some(match name {
            "origin" => Code::Origin,
            "product" => Code::Product,
            "level" => Code::Level,
            "timerange" => Code::Timerange,
            "reftime" => Code::Reftime,
            "note" => Code::Note,
            "source" => Code::Source,
            "area" => Code::Area,
            "proddef" => Code::Proddef,
            "run" => Code::Run,
            "task" => Code::Task,
            "quantity" => Code::Quantity,
            "value" => Code::Value,
            _ => return None,
        })
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Key-ordered bag of string attributes, the representation shared by
/// the loosely-structured types (`Area`, `Proddef`) whose fields vary
/// per format rather than being a small fixed tuple.
pub type KeyedValues = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Origin {
    Grib1 {
        centre: u8,
        subcentre: u8,
        process: u8,
    },
    Grib2 {
        centre: u16,
        subcentre: u16,
        process_type: u8,
        bg_process: u8,
        process: u8,
    },
    Bufr {
        centre: u16,
        subcentre: u16,
    },
    Odimh5 {
        wmo: String,
        rad: String,
        plc: String,
    },
}

impl Origin {
    pub fn style(&self) -> &'static str {
        match self {
            Origin::Grib1 { .. } => "GRIB1",
            Origin::Grib2 { .. } => "GRIB2",
            Origin::Bufr { .. } => "BUFR",
            Origin::Odimh5 { .. } => "ODIMH5",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Origin::Grib1 {
                centre,
                subcentre,
                process,
            } => write!(f, "GRIB1({}, {}, {})", centre, subcentre, process),
            Origin::Grib2 {
                centre,
                subcentre,
                process_type,
                bg_process,
                process,
            } => write!(
                f,
                "GRIB2({}, {}, {}, {}, {})",
                centre, subcentre, process_type, bg_process, process
            ),
            Origin::Bufr { centre, subcentre } => write!(f, "BUFR({}, {})", centre, subcentre),
            Origin::Odimh5 { wmo, rad, plc } => write!(f, "ODIMH5({}, {}, {})", wmo, rad, plc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Product {
    Grib1 { origin: u8, table: u8, product: u8 },
    Grib2 { centre: u16, discipline: u8, category: u8, number: u8 },
    Bufr { ty: u8, subtype: u8, localsubtype: u8 },
    Odimh5 { obj: String, product: String },
    Vm2 { variable: u32 },
}

impl Product {
    pub fn style(&self) -> &'static str {
        match self {
            Product::Grib1 { .. } => "GRIB1",
            Product::Grib2 { .. } => "GRIB2",
            Product::Bufr { .. } => "BUFR",
            Product::Odimh5 { .. } => "ODIMH5",
            Product::Vm2 { .. } => "VM2",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Product::Grib1 {
                origin,
                table,
                product,
            } => write!(f, "GRIB1({}, {}, {})", origin, table, product),
            Product::Grib2 {
                centre,
                discipline,
                category,
                number,
            } => write!(f, "GRIB2({}, {}, {}, {})", centre, discipline, category, number),
            Product::Bufr {
                ty,
                subtype,
                localsubtype,
            } => write!(f, "BUFR({}, {}, {})", ty, subtype, localsubtype),
            Product::Odimh5 { obj, product } => write!(f, "ODIMH5({}, {})", obj, product),
            Product::Vm2 { variable } => write!(f, "VM2({})", variable),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Grib1 { ltype: u8, l1: u16, l2: u16 },
    Grib2s { ltype: u8, scale: i32, value: i64 },
    Grib2d { ltype1: u8, scale1: i32, value1: i64, ltype2: u8, scale2: i32, value2: i64 },
    Odimh5 { range: i64, elevation: i64 },
}

impl Level {
    pub fn style(&self) -> &'static str {
        match self {
            Level::Grib1 { .. } => "GRIB1",
            Level::Grib2s { .. } => "GRIB2S",
            Level::Grib2d { .. } => "GRIB2D",
            Level::Odimh5 { .. } => "ODIMH5",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Level::Grib1 { ltype, l1, l2 } => write!(f, "GRIB1({}, {}, {})", ltype, l1, l2),
            Level::Grib2s { ltype, scale, value } => {
                write!(f, "GRIB2S({}, {}, {})", ltype, scale, value)
            }
            Level::Grib2d {
                ltype1,
                scale1,
                value1,
                ltype2,
                scale2,
                value2,
            } => write!(
                f,
                "GRIB2D({}, {}, {}, {}, {}, {})",
                ltype1, scale1, value1, ltype2, scale2, value2
            ),
            Level::Odimh5 { range, elevation } => write!(f, "ODIMH5({}, {})", range, elevation),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timerange {
    Grib1 { ttype: u8, unit: u8, p1: u32, p2: u32 },
    Timedef { step_len: u32, step_unit: u8, stat_type: u8, stat_len: u32, stat_unit: u8 },
}

impl Timerange {
    pub fn style(&self) -> &'static str {
        match self {
            Timerange::Grib1 { .. } => "GRIB1",
            Timerange::Timedef { .. } => "Timedef",
        }
    }
}

impl fmt::Display for Timerange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Timerange::Grib1 { ttype, unit, p1, p2 } => {
                write!(f, "GRIB1({}, {}, {}, {})", ttype, unit, p1, p2)
            }
            Timerange::Timedef {
                step_len,
                step_unit,
                stat_type,
                stat_len,
                stat_unit,
            } => write!(
                f,
                "Timedef({}, {}, {}, {}, {})",
                step_len, step_unit, stat_type, stat_len, stat_unit
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Area {
    Grib(KeyedValues),
    Odimh5(KeyedValues),
    Vm2 { station_id: u32 },
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Area::Grib(kv) => write!(f, "GRIB({:?})", kv),
            Area::Odimh5(kv) => write!(f, "ODIMH5({:?})", kv),
            Area::Vm2 { station_id } => write!(f, "VM2({})", station_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Proddef {
    Grib(KeyedValues),
    Vm2(KeyedValues),
}

impl fmt::Display for Proddef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Proddef::Grib(kv) => write!(f, "GRIB({:?})", kv),
            Proddef::Vm2(kv) => write!(f, "VM2({:?})", kv),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Run {
    pub minute: u32,
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MINUTE({})", self.minute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Task(pub String);

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(pub Vec<String>);

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Value(pub String);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single typed metadata item, tagged by [`Code`].
///
/// `Reftime`, `Note` and `Source` are modelled separately
/// ([`crate::metadata`]) since the data model treats them as top-level
/// record fields rather than members of the generic item set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Item {
    Origin(Origin),
    Product(Product),
    Level(Level),
    Timerange(Timerange),
    Area(Area),
    Proddef(Proddef),
    Run(Run),
    Task(Task),
    Quantity(Quantity),
    Value(Value),
}

impl Item {
    pub fn code(&self) -> Code {
        match self {
            Item::Origin(_) => Code::Origin,
            Item::Product(_) => Code::Product,
            Item::Level(_) => Code::Level,
            Item::Timerange(_) => Code::Timerange,
            Item::Area(_) => Code::Area,
            Item::Proddef(_) => Code::Proddef,
            Item::Run(_) => Code::Run,
            Item::Task(_) => Code::Task,
            Item::Quantity(_) => Code::Quantity,
            Item::Value(_) => Code::Value,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Item::Origin(v) => write!(f, "{}", v),
            Item::Product(v) => write!(f, "{}", v),
            Item::Level(v) => write!(f, "{}", v),
            Item::Timerange(v) => write!(f, "{}", v),
            Item::Area(v) => write!(f, "{}", v),
            Item::Proddef(v) => write!(f, "{}", v),
            Item::Run(v) => write!(f, "{}", v),
            Item::Task(v) => write!(f, "{}", v),
            Item::Quantity(v) => write!(f, "{}", v),
            Item::Value(v) => write!(f, "{}", v),
        }
    }
}
