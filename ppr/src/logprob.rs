/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Arithmetic on probabilities stored as natural logarithms.
//!
//! All PageRank mass in this crate is kept in log space, so that the tiny
//! probabilities arising on large graphs neither underflow nor lose
//! precision. The only aggregation primitive is [`add_log_probs`], which
//! computes ln(*e*ᵃ + *e*ᵇ) without leaving log space:
//!
//! > ln(*e*ᵃ + *e*ᵇ) = max(*a*, *b*) + ln(1 + *e*^(min(*a*, *b*) − max(*a*, *b*)))
//!
//! Probability zero is represented by −∞, which is the exact identity of the
//! operator. Every mass accumulation (per destination, per partition, across
//! partitions) is a fold over [`add_log_probs`] starting from −∞; since the
//! operator is commutative, the order in which partial contributions arrive
//! does not matter beyond floating-point rounding.

/// The logarithm of probability zero.
pub const LOG_ZERO: f64 = f64::NEG_INFINITY;

/// Adds two probabilities given as natural logarithms.
///
/// If either operand is −∞ the other one is returned unchanged; otherwise the
/// result is computed as max + ln_1p(exp(min − max)). The operation is exactly
/// commutative.
///
/// # Examples
///
/// ```
/// use webgraph_ppr::logprob::{add_log_probs, LOG_ZERO};
///
/// let half = 0.5_f64.ln();
/// assert!((add_log_probs(half, half)).abs() < 1E-15);
/// assert_eq!(add_log_probs(half, LOG_ZERO), half);
/// ```
#[inline]
pub fn add_log_probs(a: f64, b: f64) -> f64 {
    if a == LOG_ZERO {
        return b;
    }
    if b == LOG_ZERO {
        return a;
    }
    if a < b {
        b + (a - b).exp().ln_1p()
    } else {
        a + (b - a).exp().ln_1p()
    }
}

/// Returns a vector of `len` log-probabilities equal to −∞.
pub fn neg_inf_vec(len: usize) -> Vec<f64> {
    vec![LOG_ZERO; len]
}

/// Adds column-wise `values` to `acc`, both given as log-probabilities.
#[inline]
pub fn add_assign_log_probs(acc: &mut [f64], values: &[f64]) {
    debug_assert_eq!(acc.len(), values.len());
    for (a, &v) in acc.iter_mut().zip(values) {
        *a = add_log_probs(*a, v);
    }
}

/// Sums a sequence of log-probabilities.
pub fn log_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().fold(LOG_ZERO, add_log_probs)
}
