use biometrics::{Collector, Counter, Moments};

pub(crate) static TREE_NAVIGATIONS: Counter = Counter::new("chatbranch.tree.navigations");
pub(crate) static TREE_NAVIGATION_NOOPS: Counter = Counter::new("chatbranch.tree.navigation_noops");
pub(crate) static TREE_DEFAULT_SELECTIONS: Counter =
    Counter::new("chatbranch.tree.default_selections");
pub(crate) static TREE_ORPHANS: Counter = Counter::new("chatbranch.tree.orphans");
pub(crate) static TREE_DUPLICATES: Counter = Counter::new("chatbranch.tree.duplicates");

pub(crate) static SEGMENT_RESCANS: Counter = Counter::new("chatbranch.segment.rescans");
pub(crate) static SEGMENT_RESETS: Counter = Counter::new("chatbranch.segment.resets");
pub(crate) static SEGMENT_SPANS_COMMITTED: Counter =
    Counter::new("chatbranch.segment.spans_committed");
pub(crate) static SEGMENT_RESCAN_BYTES: Moments = Moments::new("chatbranch.segment.rescan_bytes");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("chatbranch.stream.chunks");
pub(crate) static STREAM_BYTES: Counter = Counter::new("chatbranch.stream.bytes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("chatbranch.stream.errors");
pub(crate) static STREAM_CANCELLATIONS: Counter = Counter::new("chatbranch.stream.cancellations");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&TREE_NAVIGATIONS);
    collector.register_counter(&TREE_NAVIGATION_NOOPS);
    collector.register_counter(&TREE_DEFAULT_SELECTIONS);
    collector.register_counter(&TREE_ORPHANS);
    collector.register_counter(&TREE_DUPLICATES);

    collector.register_counter(&SEGMENT_RESCANS);
    collector.register_counter(&SEGMENT_RESETS);
    collector.register_counter(&SEGMENT_SPANS_COMMITTED);
    collector.register_moments(&SEGMENT_RESCAN_BYTES);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_CANCELLATIONS);
}
