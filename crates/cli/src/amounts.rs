//! Conversions between raw fixed-point amounts and human-readable decimals.

use anyhow::{anyhow, bail, Context, Result};
use chrono::DateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use spiral_pool_core::{Amount, Rate, Timestamp};
use std::str::FromStr;

/// Rate decimals (WAD).
const RATE_DECIMALS: u8 = 18;

fn scale(decimals: u8) -> Result<Decimal> {
    let factor = 10u64
        .checked_pow(u32::from(decimals))
        .ok_or_else(|| anyhow!("unsupported decimals: {decimals}"))?;
    Ok(Decimal::from(factor))
}

/// Parses `"12.5"` into raw units of an asset with `decimals` places.
///
/// # Errors
/// Returns an error for malformed, negative or over-precise input.
pub fn parse_amount(text: &str, decimals: u8) -> Result<Amount> {
    let value = Decimal::from_str(text.trim()).with_context(|| format!("invalid amount '{text}'"))?;
    if value.is_sign_negative() {
        bail!("amount '{text}' is negative");
    }
    let raw = value
        .checked_mul(scale(decimals)?)
        .ok_or_else(|| anyhow!("amount '{text}' is too large"))?;
    if !raw.fract().is_zero() {
        bail!("amount '{text}' has more than {decimals} decimal places");
    }
    raw.to_u128()
        .ok_or_else(|| anyhow!("amount '{text}' does not fit"))
}

/// Parses a rate such as `"1.05"` (base per YBT).
///
/// # Errors
/// Returns an error for malformed input.
pub fn parse_rate(text: &str) -> Result<Rate> {
    parse_amount(text, RATE_DECIMALS).map(Rate::from_wad)
}

/// Converts raw units to a decimal with the asset's precision.
///
/// Returns `None` when the value exceeds what `Decimal` can hold (96 bits).
#[must_use]
pub fn to_decimal(amount: Amount, decimals: u8) -> Option<Decimal> {
    i128::try_from(amount)
        .ok()
        .and_then(|raw| Decimal::try_from_i128_with_scale(raw, u32::from(decimals)).ok())
        .map(|d| d.normalize())
}

/// Places the decimal point in the integer's digits directly.
fn render_raw(amount: Amount, decimals: u8) -> String {
    let digits = amount.to_string();
    let scale = usize::from(decimals);
    if scale == 0 {
        return digits;
    }
    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (whole, fraction) = padded.split_at(padded.len() - scale);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

fn render(amount: Amount, decimals: u8) -> String {
    to_decimal(amount, decimals)
        .map_or_else(|| render_raw(amount, decimals), |d| d.to_string())
}

#[must_use]
pub fn format_amount(amount: Amount, decimals: u8, symbol: &str) -> String {
    format!("{} {symbol}", render(amount, decimals))
}

#[must_use]
pub fn format_rate(rate: Rate) -> String {
    render(rate.wad(), RATE_DECIMALS)
}

#[must_use]
pub fn format_time(timestamp: Timestamp) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map_or_else(
            || timestamp.to_string(),
            |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
}

/// Parses an RFC 3339 time or raw epoch seconds.
///
/// # Errors
/// Returns an error if neither form parses or the time is before 1970.
pub fn parse_time(text: &str) -> Result<Timestamp> {
    if let Ok(secs) = text.trim().parse::<u64>() {
        return Ok(secs);
    }
    let parsed = DateTime::parse_from_rfc3339(text.trim())
        .with_context(|| format!("invalid time '{text}', expected RFC 3339 or epoch seconds"))?;
    u64::try_from(parsed.timestamp()).map_err(|_| anyhow!("time '{text}' is before 1970"))
}
