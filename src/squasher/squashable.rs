// src/squasher/squashable.rs

use std::fmt;

use tracing::{Span, debug, info, warn};

use crate::block::{Range, Ranges};
use crate::context::RunContext;
use crate::errors::SquashError;
use crate::store::{Notifier, Store};

/// Merge state of one store.
///
/// `ranges` holds partials received but not merged yet, split at
/// `store_save_interval` boundaries, sorted and never overlapping. Only the
/// range starting exactly at `next_expected_start_block` can be merged next.
#[derive(Debug)]
pub struct Squashable<S: Store> {
    name: String,
    store: S,
    ranges: Ranges,
    store_save_interval: u64,
    target_exclusive_block: u64,
    next_expected_start_block: u64,
    /// Block the squashable was seeded at (module initial block, or the
    /// checkpoint it was loaded from).
    store_initial_block: u64,
    target_reached: bool,
}

impl<S: Store> Squashable<S> {
    pub fn new(
        initial_store: S,
        target_exclusive_block: u64,
        store_save_interval: u64,
        next_expected_start_block: u64,
    ) -> Self {
        Self {
            name: initial_store.name().to_string(),
            store: initial_store,
            ranges: Ranges::new(),
            store_save_interval: store_save_interval.max(1),
            target_exclusive_block,
            next_expected_start_block,
            store_initial_block: next_expected_start_block,
            target_reached: next_expected_start_block >= target_exclusive_block,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ranges(&self) -> &Ranges {
        &self.ranges
    }

    pub fn next_expected_start_block(&self) -> u64 {
        self.next_expected_start_block
    }

    pub fn target_reached(&self) -> bool {
        self.target_reached
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub(crate) async fn squash(
        &mut self,
        ctx: &RunContext,
        span: &Span,
        range: Range,
        notifier: Option<&dyn Notifier>,
    ) -> Result<(), SquashError> {
        info!(
            parent: span,
            module = %self.name,
            request_range = %range,
            "cumulating squash request range"
        );

        self.cumulate_range(span, range)?;
        self.merge_available_partials(ctx, span, notifier).await
    }

    fn cumulate_range(&mut self, span: &Span, range: Range) -> Result<(), SquashError> {
        let module_initial_block = self.store.module_initial_block();

        for chunk in range.split(self.store_save_interval) {
            if chunk.start_block < module_initial_block {
                return Err(SquashError::BeforeInitialBlock {
                    module: self.name.clone(),
                    start_block: chunk.start_block,
                    initial_block: module_initial_block,
                });
            }

            // Already covered by the checkpoint we were seeded from; keeping
            // it would stall merging, since only the first range is checked
            // for contiguity.
            if chunk.exclusive_end_block <= self.store_initial_block {
                debug!(
                    parent: span,
                    module = %self.name,
                    %chunk,
                    "dropping range below store initial block"
                );
                continue;
            }

            if let Some(existing) = self.ranges.find_overlap(&chunk) {
                return Err(SquashError::OverlappingRange {
                    module: self.name.clone(),
                    range: chunk,
                    existing: *existing,
                });
            }

            debug!(
                parent: span,
                module = %self.name,
                split_block_range = %chunk,
                "appending range"
            );
            self.ranges.insert(chunk);
        }

        Ok(())
    }

    async fn merge_available_partials(
        &mut self,
        ctx: &RunContext,
        span: &Span,
        notifier: Option<&dyn Notifier>,
    ) -> Result<(), SquashError> {
        debug!(parent: span, module = %self.name, "squashing");

        loop {
            if let Some(err) = ctx.err() {
                return Err(err.into());
            }

            let Some(&next) = self.ranges.first() else {
                break;
            };

            if next.start_block < self.next_expected_start_block {
                return Err(SquashError::NonContiguous {
                    module: self.name.clone(),
                    expected: self.next_expected_start_block,
                    got: next.start_block,
                    ranges: self.ranges.to_string(),
                });
            }
            if next.start_block != self.next_expected_start_block {
                break;
            }

            debug!(
                parent: span,
                squashable = %self,
                squashable_range = %next,
                "found range to merge"
            );

            let partial = self
                .store
                .load_from(&next)
                .await
                .map_err(|source| SquashError::Load {
                    module: self.name.clone(),
                    range: next,
                    source,
                })?;

            self.store
                .merge(&partial)
                .map_err(|source| SquashError::Merge {
                    module: self.name.clone(),
                    range: next,
                    source,
                })?;

            self.next_expected_start_block = next.exclusive_end_block;

            if next.exclusive_end_block % self.store_save_interval == 0 {
                self.store
                    .write_state(next.exclusive_end_block)
                    .await
                    .map_err(|source| SquashError::WriteState {
                        module: self.name.clone(),
                        block: next.exclusive_end_block,
                        source,
                    })?;
            } else if let Err(err) = partial.delete_store(next.exclusive_end_block).await {
                warn!(parent: span, module = %self.name, error = %err, "deleting partial file");
            }

            self.ranges.pop_first();

            if next.exclusive_end_block == self.target_exclusive_block {
                self.target_reached = true;
            }

            if let Some(notifier) = notifier {
                notifier.notify(&self.name, next.exclusive_end_block);
            }
        }

        Ok(())
    }
}

impl<S: Store> fmt::Display for Squashable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reached = if self.target_reached { " (target reached)" } else { "" };
        write!(f, "{}{}: {}", self.name, reached, self.ranges)
    }
}
