/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_pub)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]
#![allow(clippy::type_complexity)]

pub mod combine;
pub mod counters;
pub mod distribute;
pub mod driver;
pub mod error;
pub mod jump;
pub mod logprob;
pub mod missing;
pub mod norm;
pub mod preds;
pub mod record;
pub mod shuffle;
pub mod sources;
pub mod store;

pub mod prelude {
    pub use crate::counters::Counters;
    pub use crate::driver::{IterationReport, PersonalizedPageRank, State};
    pub use crate::error::{IterationError, PprError};
    pub use crate::logprob::add_log_probs;
    pub use crate::preds::{L1Norm, MaxIter, PredParams};
    pub use crate::record::{Message, Node, RecordKind};
    pub use crate::sources::SourceSet;
    pub use crate::store::{
        DirGraphStore, DirLedgerStore, GraphStore, LedgerStore, MemoryGraphStore,
        MemoryLedgerStore,
    };
}
