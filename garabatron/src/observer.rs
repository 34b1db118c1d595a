//! Collection event hooks.
//!
//! The heap reports what a collection did through a [`GcObserver`] instead
//! of printing anything itself. Correctness never depends on an observer
//! being installed.

pub trait GcObserver {
    /// A collection is about to mark, `live_before` nodes are registered.
    fn on_collection_start(&mut self, live_before: usize) {
        let _ = live_before;
    }

    /// A node was reclaimed. `sequence` counts from 1 within one sweep.
    fn on_node_reclaimed(&mut self, sequence: usize) {
        let _ = sequence;
    }

    fn on_collection_end(&mut self, reclaimed: usize, live_after: usize) {
        let _ = (reclaimed, live_after);
    }
}

/// Forwards collection events to the `log` facade.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogObserver;

impl GcObserver for LogObserver {
    fn on_collection_start(&mut self, live_before: usize) {
        log::info!("collecting garbage, {live_before} objects live");
    }

    fn on_node_reclaimed(&mut self, sequence: usize) {
        log::debug!("reclaimed object #{sequence}");
    }

    fn on_collection_end(&mut self, reclaimed: usize, live_after: usize) {
        log::info!("collected {reclaimed} objects, {live_after} remaining");
    }
}
