//! Stateless unit conversions used by the sensor dispatch.
//! Outputs are in the imperial units the Ecowitt report format expects.

/// Marker for "no valid data" in every published field.
pub const SENTINEL: f64 = -9999.0;

/// Round half away from zero to `n` decimals.
pub fn round_to(v: f64, n: u32) -> f64 {
    let f = 10f64.powi(n as i32);
    (v * f).round() / f
}

pub fn c_to_f(c: f64, n: u32) -> f64 {
    round_to(c * 9.0 / 5.0 + 32.0, n)
}

pub fn hpa_to_inhg(hpa: f64, n: u32) -> f64 {
    round_to(hpa / 33.87, n)
}

pub fn ms_to_mph(ms: f64, n: u32) -> f64 {
    round_to(ms * 2.23694, n)
}

pub fn mm_to_in(mm: f64, n: u32) -> f64 {
    round_to(mm / 25.4, n)
}

/// Parse a raw payload as a finite float, tolerating surrounding whitespace.
pub fn parse_f64(raw: &str) -> anyhow::Result<f64> {
    let t = raw.trim();
    let v = t
        .parse::<f64>()
        .map_err(|e| anyhow::anyhow!("not a number: {t:?} ({e})"))?;
    if !v.is_finite() {
        anyhow::bail!("not a finite number: {t:?}");
    }
    Ok(v)
}

/// Like [`parse_f64`], for quantities that can only grow (gauge amounts,
/// strike counters).
pub fn parse_non_negative(raw: &str) -> anyhow::Result<f64> {
    let v = parse_f64(raw)?;
    if v < 0.0 {
        anyhow::bail!("negative reading: {v}");
    }
    Ok(v)
}
