//! # tiller-math
//!
//! Scaled-integer arithmetic for the reward accumulator.
//!
//! The per-share accumulator is stored at [`SCALE`] (1e12) fixed-point
//! precision so that dividing a small reward by a large staked supply does
//! not truncate to zero. All operations are checked: overflow is reported
//! as an error, never wrapped, because a wrapped accumulator silently
//! corrupts every position in the pool.
//!
//! ## Formulas
//!
//! ```text
//! acc_delta    = reward * SCALE / total_staked
//! scaled_share = amount * acc / SCALE
//! pool_reward  = elapsed * rate * weight / total_weight
//! ```

/// Fixed-point scale for the per-share accumulator (1e12).
pub const SCALE: u128 = 1_000_000_000_000;

/// Error types for fixed-point arithmetic.
#[derive(Debug, thiserror::Error)]
pub enum MathError {
    /// Intermediate product exceeded u128.
    #[error("arithmetic overflow")]
    Overflow,

    /// Division by a zero denominator.
    #[error("division by zero")]
    DivisionByZero,
}

/// Convenience result type for math operations.
pub type Result<T> = std::result::Result<T, MathError>;

/// Compute `a * b / d` with a checked product and truncating division.
///
/// Truncation toward zero is deliberate: the engine reproduces the small
/// systematic under-distribution of the integer-division accounting it
/// models.
///
/// # Errors
///
/// - [`MathError::Overflow`] if `a * b` exceeds `u128`
/// - [`MathError::DivisionByZero`] if `d` is zero
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128> {
    if d == 0 {
        return Err(MathError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(MathError::Overflow)?;
    Ok(product / d)
}

/// Accumulator increment for distributing `reward` over `total_staked`.
///
/// `reward * SCALE / total_staked`.
///
/// # Errors
///
/// - [`MathError::DivisionByZero`] if `total_staked` is zero (callers
///   must short-circuit empty pools before settling)
/// - [`MathError::Overflow`] on an oversized product
pub fn acc_delta(reward: u64, total_staked: u64) -> Result<u128> {
    mul_div(reward as u128, SCALE, total_staked as u128)
}

/// Scale a staked amount by the accumulator: `amount * acc / SCALE`.
///
/// This is both the reward-debt formula and the gross entitlement used
/// by the pending-reward read.
///
/// # Errors
///
/// - [`MathError::Overflow`] on an oversized product
pub fn scaled_share(amount: u64, acc: u128) -> Result<u128> {
    mul_div(amount as u128, acc, SCALE)
}

/// Reward attributable to one pool for an elapsed interval.
///
/// `elapsed * rate * weight / total_weight`, truncating. The result is
/// checked back into `u64` because it funds a token transfer.
///
/// # Errors
///
/// - [`MathError::DivisionByZero`] if `total_weight` is zero
/// - [`MathError::Overflow`] if the product or the quotient does not fit
pub fn pool_reward(elapsed: u64, rate: u64, weight: u64, total_weight: u64) -> Result<u64> {
    let emitted = (elapsed as u128)
        .checked_mul(rate as u128)
        .ok_or(MathError::Overflow)?;
    let share = mul_div(emitted, weight as u128, total_weight as u128)?;
    u64::try_from(share).map_err(|_| MathError::Overflow)
}
