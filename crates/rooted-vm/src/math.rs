// SPDX-License-Identifier: AGPL-3.0-only
//! Integer math shared by the AMM and the launch contracts.
//!
//! No floating point anywhere: every ratio is `a * b / c` with a 256-bit
//! intermediate, truncating toward zero.

use crate::VmError;
use ruint::aliases::U256;

/// Basis point denominator (100% = 10_000).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Integer square root by Newton's method. Returns floor(√n).
pub fn isqrt(n: u128) -> u128 {
    if n == 0 {
        return 0;
    }
    let mut x = n;
    let mut y = x.div_ceil(2);
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

/// floor(√(a·b)) without overflowing for any pair of u128 inputs.
pub fn sqrt_product(a: u128, b: u128) -> u128 {
    if let Some(product) = a.checked_mul(b) {
        return isqrt(product);
    }
    let n = U256::from(a) * U256::from(b);
    let mut x = n;
    let mut y = (x + U256::from(1u8)) / U256::from(2u8);
    while y < x {
        x = y;
        y = (x + n / x) / U256::from(2u8);
    }
    // √(2^256) = 2^128, so the root of any product of two u128 fits.
    u128::try_from(x).unwrap_or(u128::MAX)
}

/// floor(a · b / c) with a 256-bit intermediate product.
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128, VmError> {
    if c == 0 {
        return Err(VmError::DivisionByZero);
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / c);
    }
    let wide = U256::from(a) * U256::from(b) / U256::from(c);
    u128::try_from(wide).map_err(|_| VmError::Overflow)
}

/// `amount * bps / 10_000`, truncating.
pub fn bps_of(amount: u128, bps: u128) -> Result<u128, VmError> {
    mul_div(amount, bps, BPS_DENOMINATOR)
}

/// Deduct fee from input amount. Returns (after_fee, fee).
pub fn deduct_fee(amount: u128, fee_bps: u128) -> Result<(u128, u128), VmError> {
    let fee = bps_of(amount, fee_bps)?;
    Ok((amount - fee, fee))
}

/// Constant-product swap output.
/// `amount_out = (amount_in * reserve_out) / (reserve_in + amount_in)`
pub fn compute_output(amount_in: u128, reserve_in: u128, reserve_out: u128) -> Result<u128, VmError> {
    if reserve_in == 0 || reserve_out == 0 || amount_in == 0 {
        return Ok(0);
    }
    let denominator = reserve_in.checked_add(amount_in).ok_or(VmError::Overflow)?;
    mul_div(amount_in, reserve_out, denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(1_000_000), 1_000);
        assert_eq!(isqrt(u128::MAX), 18_446_744_073_709_551_615);
    }

    #[test]
    fn test_sqrt_product_wide() {
        assert_eq!(sqrt_product(4, 9), 6);
        // 2^100 · 2^100 overflows u128; root is 2^100.
        assert_eq!(sqrt_product(1u128 << 100, 1u128 << 100), 1u128 << 100);
        assert_eq!(sqrt_product(u128::MAX, u128::MAX), u128::MAX);
    }

    #[test]
    fn test_mul_div() {
        assert_eq!(mul_div(10, 20, 3).unwrap(), 66);
        assert_eq!(mul_div(u128::MAX, 2, 4).unwrap(), u128::MAX / 2);
        assert_eq!(mul_div(1, 1, 0).unwrap_err(), VmError::DivisionByZero);
        assert_eq!(mul_div(u128::MAX, 2, 1).unwrap_err(), VmError::Overflow);
    }

    #[test]
    fn test_bps_of_truncates() {
        assert_eq!(bps_of(100, 900).unwrap(), 9);
        assert_eq!(bps_of(99, 900).unwrap(), 8);
        assert_eq!(bps_of(1, 10_000).unwrap(), 1);
    }

    #[test]
    fn test_deduct_fee() {
        assert_eq!(deduct_fee(10_000, 30).unwrap(), (9_970, 30));
        assert_eq!(deduct_fee(10, 30).unwrap(), (10, 0));
    }

    #[test]
    fn test_compute_output_constant_product() {
        // 1000 in against 10_000/10_000 → 10_000_000 / 11_000 = 909
        assert_eq!(compute_output(1_000, 10_000, 10_000).unwrap(), 909);
        assert_eq!(compute_output(0, 10_000, 10_000).unwrap(), 0);
        assert_eq!(compute_output(1_000, 0, 10_000).unwrap(), 0);
    }
}
