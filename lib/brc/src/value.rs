use std::fmt;

/// A one-decimal value stored as an integer times 10 (`-12.3` is `Scaled(-123)`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scaled(pub i64);

impl fmt::Display for Scaled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

/// Largest magnitude a record may carry, in scaled units (3276.7). Keeps the
/// `i64` sum exact for up to 2^48 records.
pub const MAX_SCALED: i64 = i16::MAX as i64;

/// Parse `-?\d+\.\d` into a scaled integer. The last byte is the fractional
/// digit and the byte before it must be the decimal point; the remaining
/// digits (after an optional `-`) form the integer part. Magnitudes above
/// [`MAX_SCALED`] are rejected.
pub fn parse_scaled(raw: &[u8]) -> Result<Scaled, &'static str> {
    let (negative, digits) = match raw.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, raw),
    };
    if digits.len() < 3 {
        return Err("value too short, expected -?D+.D");
    }
    let (int_part, tail) = digits.split_at(digits.len() - 2);
    if tail[0] != b'.' {
        return Err("missing decimal point before the last digit");
    }
    let mut acc: i64 = 0;
    for &b in int_part.iter().chain(std::iter::once(&tail[1])) {
        if !b.is_ascii_digit() {
            return Err("non-digit character in value");
        }
        acc = acc * 10 + (b - b'0') as i64;
        if acc > MAX_SCALED {
            return Err("value out of range");
        }
    }
    Ok(Scaled(if negative { -acc } else { acc }))
}

/// Running count/min/max/sum for one key. `merge` is commutative and associative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stats {
    pub count: u64,
    pub min: Scaled,
    pub max: Scaled,
    pub sum: i64,
}

impl Stats {
    pub fn single(v: Scaled) -> Self {
        Self { count: 1, min: v, max: v, sum: v.0 }
    }

    pub fn add(&mut self, v: Scaled) {
        self.count += 1;
        self.sum += v.0;
        if v < self.min {
            self.min = v;
        }
        if v > self.max {
            self.max = v;
        }
    }

    pub fn merge(&mut self, other: &Stats) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }
}
