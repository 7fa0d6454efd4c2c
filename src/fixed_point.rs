// gemmlowp/TFLite rounding: Q31 multiplier plus a power-of-two shift

/// `round(a * b / 2^31)` with ties away from zero, saturating the single overflow case.
#[inline]
pub fn saturating_rounding_doubling_high_mul(a: i32, b: i32) -> i32 {
    if a == i32::MIN && b == i32::MIN {
        return i32::MAX;
    }
    let ab = a as i64 * b as i64;
    let nudge: i64 = if ab >= 0 { 1 << 30 } else { 1 - (1 << 30) };
    // i64 division truncates toward zero, same as the reference.
    ((ab + nudge) / (1i64 << 31)) as i32
}

/// Arithmetic right shift by `exponent`, rounding half away from zero.
#[inline]
pub fn rounding_divide_by_pot(x: i32, exponent: i32) -> i32 {
    debug_assert!((0..=31).contains(&exponent), "exponent {exponent} out of range");
    let mask = ((1i64 << exponent) - 1) as i32;
    let remainder = x & mask;
    let threshold = (mask >> 1) + i32::from(x < 0);
    (x >> exponent) + i32::from(remainder > threshold)
}

/// Scales a 32-bit accumulator by `multiplier * 2^shift`. Exact while `x << shift`
/// fits in i32; past that the pre-shift saturates.
#[inline]
pub fn multiply_by_quantized_multiplier(x: i32, multiplier: i32, shift: i32) -> i32 {
    debug_assert!((-31..=30).contains(&shift), "shift {shift} out of range");
    let left_shift = shift.max(0);
    let right_shift = (-shift).max(0);
    rounding_divide_by_pot(
        saturating_rounding_doubling_high_mul(x.saturating_mul(1 << left_shift), multiplier),
        right_shift,
    )
}

/// 64-bit accumulator variant: the multiplier is reduced to 16 bits and a single
/// rounding step is applied.
#[inline]
pub fn multiply_by_quantized_multiplier_i64(x: i64, multiplier: i32, shift: i32) -> i32 {
    debug_assert!(multiplier >= 0);
    debug_assert!((-31..8).contains(&shift), "shift {shift} out of range");
    debug_assert!((-(1i64 << 47)..(1i64 << 47)).contains(&x));
    let reduced: i64 = if multiplier < 0x7FFF_0000 { ((multiplier + (1 << 15)) >> 16) as i64 } else { 0x7FFF };
    let total_shift = 15 - shift as i64;
    let round = 1i64 << (total_shift - 1);
    let result = (x * reduced + round) >> total_shift;
    debug_assert!(result >= i32::MIN as i64 && result <= i32::MAX as i64);
    result as i32
}

/// Decomposes a real scale into a Q31 mantissa and a power-of-two shift.
pub fn quantize_multiplier(real: f64) -> (i32, i32) {
    if real == 0.0 {
        return (0, 0);
    }
    let (q, mut shift) = frexp(real);
    let mut q_fixed = (q * (1i64 << 31) as f64).round() as i64;
    assert!(q_fixed <= 1i64 << 31);
    if q_fixed == 1i64 << 31 {
        q_fixed /= 2;
        shift += 1;
    }
    if shift < -31 {
        shift = 0;
        q_fixed = 0;
    }
    (q_fixed as i32, shift)
}

fn frexp(x: f64) -> (f64, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let exp = ((bits >> 52) & 0x7ff) as i32;
    if exp == 0 {
        // Subnormal: scale into the normal range first.
        let (m, e) = frexp(x * f64::from_bits(0x4350_0000_0000_0000)); // 2^54
        return (m, e - 54);
    }
    let mantissa = f64::from_bits((bits & !(0x7ffu64 << 52)) | (1022u64 << 52));
    (mantissa, exp - 1022)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_mul_halves_with_q30() {
        assert_eq!(saturating_rounding_doubling_high_mul(190, 1 << 30), 95);
        assert_eq!(saturating_rounding_doubling_high_mul(191, 1 << 30), 96);
        // Negative ties round toward zero in the high-mul step.
        assert_eq!(saturating_rounding_doubling_high_mul(-191, 1 << 30), -95);
        assert_eq!(saturating_rounding_doubling_high_mul(i32::MIN, i32::MIN), i32::MAX);
    }

    #[test]
    fn divide_by_pot_rounds_half_away() {
        assert_eq!(rounding_divide_by_pot(5, 1), 3);
        assert_eq!(rounding_divide_by_pot(-5, 1), -3);
        assert_eq!(rounding_divide_by_pot(4, 1), 2);
        assert_eq!(rounding_divide_by_pot(509, 3), 64);
        assert_eq!(rounding_divide_by_pot(500, 3), 63);
        assert_eq!(rounding_divide_by_pot(-12, 3), -2);
        assert_eq!(rounding_divide_by_pot(7, 0), 7);
    }

    #[test]
    fn frexp_matches_libm() {
        assert_eq!(frexp(1.0), (0.5, 1));
        assert_eq!(frexp(0.75), (0.75, 0));
        assert_eq!(frexp(0.1).1, -3);
        assert_eq!(frexp(-6.0), (-0.75, 3));
    }

    #[test]
    fn quantize_multiplier_examples() {
        assert_eq!(quantize_multiplier(0.5), (1 << 30, 0));
        assert_eq!(quantize_multiplier(0.25), (1 << 30, -1));
        assert_eq!(quantize_multiplier(1.0), (1 << 30, 1));
        assert_eq!(quantize_multiplier(0.0), (0, 0));
    }
}
