/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Map-side pre-aggregation of mass messages.
//!
//! Since mass is folded with [`add_log_probs`](crate::logprob::add_log_probs),
//! which is associative and commutative, the mass messages a map task sends
//! to the same vertex can be folded into a single message before the
//! shuffle. The final result changes only by the reordering of the
//! floating-point sums, and the shuffle gets lighter.

use crate::counters::Counters;
use crate::logprob::{add_assign_log_probs, neg_inf_vec};
use crate::record::Message;
use std::collections::BTreeMap;

/// Folds the mass messages addressed to the same vertex into a single
/// message; structure messages pass through unchanged.
///
/// Returns the combined messages and the number of messages saved.
pub fn combine_messages(
    messages: impl IntoIterator<Item = Message>,
    num_sources: usize,
) -> (Vec<Message>, u64) {
    let mut combined = Vec::new();
    let mut mass: Option<Vec<f64>> = None;
    let mut mass_messages: u64 = 0;

    for message in messages {
        match message {
            Message::Structure(_) => combined.push(message),
            Message::Mass(rank) => {
                add_assign_log_probs(
                    mass.get_or_insert_with(|| neg_inf_vec(num_sources)),
                    &rank,
                );
                mass_messages += 1;
            }
        }
    }

    if let Some(mass) = mass {
        combined.push(Message::Mass(mass));
    }

    (combined, mass_messages.saturating_sub(1))
}

/// Combines a map-output bucket, keeping messages sorted by key.
pub fn combine_bucket(
    bucket: Vec<(u64, Message)>,
    num_sources: usize,
    counters: &mut Counters,
) -> Vec<(u64, Message)> {
    let mut groups: BTreeMap<u64, Vec<Message>> = BTreeMap::new();
    for (key, message) in bucket {
        groups.entry(key).or_default().push(message);
    }

    let mut combined = Vec::with_capacity(groups.len());
    for (key, messages) in groups {
        let (messages, saved) = combine_messages(messages, num_sources);
        counters.mass_messages_saved += saved;
        combined.extend(messages.into_iter().map(|message| (key, message)));
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logprob::LOG_ZERO;

    #[test]
    fn test_combine_messages() {
        let (combined, saved) = combine_messages(
            [
                Message::Mass(vec![0.25_f64.ln(), LOG_ZERO]),
                Message::Structure(vec![4, 5]),
                Message::Mass(vec![0.25_f64.ln(), 0.5_f64.ln()]),
                Message::Mass(vec![LOG_ZERO, 0.25_f64.ln()]),
            ],
            2,
        );
        assert_eq!(saved, 2);
        assert_eq!(combined.len(), 2);
        assert_eq!(combined[0], Message::Structure(vec![4, 5]));
        let Message::Mass(rank) = &combined[1] else {
            panic!("Expected a mass message");
        };
        assert!((rank[0].exp() - 0.5).abs() < 1E-12);
        assert!((rank[1].exp() - 0.75).abs() < 1E-12);
    }

    #[test]
    fn test_single_message_is_unchanged() {
        let rank = vec![-0.3, LOG_ZERO, -7.25];
        let (combined, saved) = combine_messages([Message::Mass(rank.clone())], 3);
        assert_eq!(saved, 0);
        assert_eq!(combined, vec![Message::Mass(rank)]);
    }

    #[test]
    fn test_structure_only() {
        let (combined, saved) = combine_messages([Message::Structure(vec![])], 1);
        assert_eq!(saved, 0);
        assert_eq!(combined, vec![Message::Structure(vec![])]);
    }

    #[test]
    fn test_combine_bucket() {
        let mut counters = Counters::default();
        let bucket = vec![
            (6, Message::Mass(vec![-1.0])),
            (2, Message::Mass(vec![-2.0])),
            (6, Message::Mass(vec![-1.0])),
            (2, Message::Structure(vec![6])),
        ];
        let combined = combine_bucket(bucket, 1, &mut counters);
        assert_eq!(counters.mass_messages_saved, 1);
        assert_eq!(
            combined.iter().map(|(k, m)| (*k, m.kind())).collect::<Vec<_>>(),
            vec![
                (2, crate::record::RecordKind::Structure),
                (2, crate::record::RecordKind::Mass),
                (6, crate::record::RecordKind::Mass),
            ]
        );
        let Message::Mass(rank) = &combined[2].1 else {
            panic!("Expected a mass message");
        };
        assert!((rank[0] - (-1.0 + 2.0_f64.ln())).abs() < 1E-12);
    }
}
