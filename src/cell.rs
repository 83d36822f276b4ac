use crate::throw::{Throw, Wres, Wres1};
use crate::word::Xt;

pub type Wint = i64;
pub type Wuint = u64;
pub type Wflt = f64;
pub type Wstr = arcstr::ArcStr;
pub type Wsubstr = arcstr::Substr;

/// One stack slot or dictionary datum. Signed and unsigned integers share
/// the `Int` variant and are reinterpreted per operation, `Addr` indexes
/// dictionary data space, `Xt` is an execution token.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Int(Wint),
    Flt(Wflt),
    Str(Wstr),
    Addr(usize),
    Xt(Xt),
}

pub const ZERO: Cell = Cell::Int(0);
pub const ONE: Cell = Cell::Int(1);
pub const TRUE: Cell = Cell::Int(-1);
pub const FALSE: Cell = Cell::Int(0);

impl Cell {
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Int(_) => "int",
            Cell::Flt(_) => "float",
            Cell::Str(_) => "string",
            Cell::Addr(_) => "addr",
            Cell::Xt(_) => "xt",
        }
    }

    pub fn to_int(&self) -> Wres1<Wint> {
        match self {
            Cell::Int(n) => Ok(*n),
            _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
        }
    }

    pub fn to_uint(&self) -> Wres1<Wuint> {
        match self {
            Cell::Int(n) => Ok(*n as Wuint),
            _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
        }
    }

    pub fn to_flt(&self) -> Wres1<Wflt> {
        match self {
            Cell::Flt(r) => Ok(*r),
            _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
        }
    }

    /// Numeric view for mixed int/float arithmetic.
    pub fn to_flt_coerce(&self) -> Wres1<Wflt> {
        match self {
            Cell::Int(n) => Ok(*n as Wflt),
            Cell::Flt(r) => Ok(*r),
            _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
        }
    }

    pub fn to_str(&self) -> Wres1<Wstr> {
        match self {
            Cell::Str(s) => Ok(s.clone()),
            _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
        }
    }

    pub fn to_xt(&self) -> Wres1<Xt> {
        match self {
            Cell::Xt(xt) => Ok(*xt),
            _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
        }
    }

    pub fn to_addr(&self) -> Wres1<usize> {
        match self {
            Cell::Addr(a) => Ok(*a),
            _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
        }
    }

    /// Non-negative count, for pick/roll/allot style arguments.
    pub fn to_usize(&self) -> Wres1<usize> {
        match self {
            Cell::Int(n) if *n >= 0 => Ok(*n as usize),
            Cell::Int(_) => Err(Throw::RESULT_OUT_OF_RANGE),
            _ => Err(Throw::ARGUMENT_TYPE_MISMATCH),
        }
    }

    /// Forth truth: zero is false, everything else is true.
    pub fn flag(&self) -> bool {
        match self {
            Cell::Int(n) => *n != 0,
            Cell::Flt(r) => *r != 0.0,
            _ => true,
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Cell::Int(_))
    }

    /// Render for `.` and `.s` in the given radix.
    pub fn to_text(&self, base: u32) -> String {
        match self {
            Cell::Int(n) => fmt_int(*n, base),
            Cell::Flt(r) => fmt_flt(*r),
            Cell::Str(s) => s.to_string(),
            Cell::Addr(a) => format!("addr#{}", a),
            Cell::Xt(_) => "xt".to_string(),
        }
    }
}

pub fn bool_cell(f: bool) -> Cell {
    if f {
        TRUE
    } else {
        FALSE
    }
}

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Signed render in an arbitrary radix 2..=36, sign ahead of the digits.
pub fn fmt_int(n: Wint, base: u32) -> String {
    if !(2..=36).contains(&base) || base == 10 {
        return n.to_string();
    }
    let neg = n < 0;
    let mut m = n.unsigned_abs();
    let mut buf = [0u8; 70];
    let mut at = buf.len();
    loop {
        at -= 1;
        buf[at] = DIGITS[(m % base as Wuint) as usize];
        m /= base as Wuint;
        if m == 0 {
            break;
        }
    }
    let mut s = String::with_capacity(buf.len() - at + 1);
    if neg {
        s.push('-');
    }
    s.push_str(std::str::from_utf8(&buf[at..]).unwrap_or_default());
    s
}

pub fn fmt_uint(n: Wuint, base: u32) -> String {
    if !(2..=36).contains(&base) || base == 10 {
        return n.to_string();
    }
    let mut m = n;
    let mut buf = [0u8; 70];
    let mut at = buf.len();
    loop {
        at -= 1;
        buf[at] = DIGITS[(m % base as Wuint) as usize];
        m /= base as Wuint;
        if m == 0 {
            break;
        }
    }
    std::str::from_utf8(&buf[at..]).unwrap_or_default().to_string()
}

fn fmt_flt(r: Wflt) -> String {
    if r == r.trunc() && r.is_finite() && r.abs() < 1e15 {
        format!("{:.1}", r)
    } else {
        format!("{}", r)
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.to_text(10))
    }
}

impl From<Wint> for Cell {
    fn from(n: Wint) -> Self {
        Cell::Int(n)
    }
}

impl From<i32> for Cell {
    fn from(n: i32) -> Self {
        Cell::Int(n as Wint)
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Cell::Int(n as Wint)
    }
}

impl From<bool> for Cell {
    fn from(f: bool) -> Self {
        bool_cell(f)
    }
}

impl From<Wflt> for Cell {
    fn from(r: Wflt) -> Self {
        Cell::Flt(r)
    }
}

impl From<Wstr> for Cell {
    fn from(s: Wstr) -> Self {
        Cell::Str(s)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Str(Wstr::from(s))
    }
}

impl From<Xt> for Cell {
    fn from(xt: Xt) -> Self {
        Cell::Xt(xt)
    }
}

impl From<Throw> for Cell {
    fn from(t: Throw) -> Self {
        Cell::Int(t.0)
    }
}

/// Restore a `throw` code carried through the data stack.
pub fn cell_to_throw(c: &Cell) -> Wres1<Throw> {
    Ok(Throw(c.to_int()?))
}

pub fn check_base(base: Wint) -> Wres {
    if (2..=36).contains(&base) {
        Ok(())
    } else {
        Err(Throw::RESULT_OUT_OF_RANGE)
    }
}
