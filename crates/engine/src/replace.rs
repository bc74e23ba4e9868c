//! Replacement execution: the ordered strategy chain.
//!
//! Strategies are tried in a fixed priority order behind one trait.
//! Which strategies exist for the connected host comes from its
//! capability description, never from probing at the call site. The
//! host offers no transactional rollback, so every attempt is logged
//! with enough detail to reconstruct the run afterwards.
//!
//! Delete-and-reinsert at the same frame is deliberately absent from the
//! chain: deleting mid-job invalidates the handles of every other item
//! and corrupts timelines. A slot whose strategies are exhausted is
//! reported failed and left alone.

use std::path::Path;

use conform_common::error::ConformResult;
use conform_host::{HostBackend, HostCapabilities, MediaId, TimelineItemSnapshot};
use conform_job_model::{SlotPosition, StrategyKind};

use crate::resolve::resolve_slot;

/// Everything a strategy needs to act on one resolved slot.
pub struct ReplacementRequest<'a> {
    pub slot: u32,
    pub position: &'a SlotPosition,
    /// Snapshot from this slot's own resolution pass.
    pub item: &'a TimelineItemSnapshot,
    pub media: &'a MediaId,
    pub media_path: &'a Path,
    /// Display name the imported media carries in the pool; used by the
    /// post-replacement check.
    pub media_display: &'a str,
}

/// One way of making a timeline item's effective source equal the job's
/// clip. `Ok(false)` is a clean refusal (try the next strategy);
/// `Err` is a transport failure.
pub trait ReplaceStrategy {
    fn kind(&self) -> StrategyKind;
    fn available(&self, caps: &HostCapabilities) -> bool;
    fn execute(
        &self,
        host: &mut dyn HostBackend,
        request: &ReplacementRequest<'_>,
    ) -> ConformResult<bool>;
}

/// Swap the item's media reference in place. Preferred: non-destructive,
/// keeps per-item trims and effects.
struct DirectReplace;

impl ReplaceStrategy for DirectReplace {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectReplace
    }

    fn available(&self, caps: &HostCapabilities) -> bool {
        caps.direct_item_replace
    }

    fn execute(
        &self,
        host: &mut dyn HostBackend,
        request: &ReplacementRequest<'_>,
    ) -> ConformResult<bool> {
        host.replace_item_media(&request.item.id, request.media)
    }
}

/// Add the media as a take, select it, and finalize so the change is
/// permanent rather than reversible.
struct TakeReplace;

impl ReplaceStrategy for TakeReplace {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TakeReplace
    }

    fn available(&self, caps: &HostCapabilities) -> bool {
        caps.takes
    }

    fn execute(
        &self,
        host: &mut dyn HostBackend,
        request: &ReplacementRequest<'_>,
    ) -> ConformResult<bool> {
        let item = &request.item.id;
        if !host.add_take(item, request.media)? {
            return Ok(false);
        }
        let count = host.take_count(item)?;
        if !host.select_take(item, count)? {
            tracing::warn!(slot = request.slot, "Added take could not be selected");
            return Ok(false);
        }
        if !host.finalize_take(item)? {
            tracing::warn!(
                slot = request.slot,
                "Take selected but not finalized; item left with extra take"
            );
            return Ok(false);
        }
        Ok(true)
    }
}

/// Repoint the pool asset's backing file. Every timeline reference to
/// that asset follows, which is exactly why it only runs when the asset
/// is exclusive to this slot's item.
struct SourceSwap {
    enabled: bool,
}

impl ReplaceStrategy for SourceSwap {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SourceSwap
    }

    fn available(&self, caps: &HostCapabilities) -> bool {
        self.enabled && caps.source_swap
    }

    fn execute(
        &self,
        host: &mut dyn HostBackend,
        request: &ReplacementRequest<'_>,
    ) -> ConformResult<bool> {
        let usage = host.item_pool_usage(&request.item.id)?;
        if usage != 1 {
            tracing::warn!(
                slot = request.slot,
                usage,
                "Pool asset shared by other timeline items; refusing source swap"
            );
            return Ok(false);
        }
        host.swap_pool_source(&request.item.id, request.media_path)
    }
}

/// The fixed-priority chain for one host configuration.
pub fn strategy_chain(allow_source_swap: bool) -> Vec<Box<dyn ReplaceStrategy>> {
    vec![
        Box::new(DirectReplace),
        Box::new(TakeReplace),
        Box::new(SourceSwap {
            enabled: allow_source_swap,
        }),
    ]
}

/// Try every applicable strategy in order; return the first that both
/// reports success and survives the post-replacement check.
pub fn replace_slot(
    host: &mut dyn HostBackend,
    caps: &HostCapabilities,
    allow_source_swap: bool,
    request: &ReplacementRequest<'_>,
) -> ConformResult<Option<StrategyKind>> {
    let before = request.item.media_name.clone();

    for strategy in strategy_chain(allow_source_swap) {
        let kind = strategy.kind();
        if !strategy.available(caps) {
            tracing::debug!(slot = request.slot, strategy = %kind, "Strategy unavailable, skipping");
            continue;
        }

        tracing::info!(
            slot = request.slot,
            frame = request.position.start_frame,
            strategy = %kind,
            from = %before,
            to = %request.media_display,
            "Attempting replacement"
        );

        match strategy.execute(host, request) {
            Ok(true) => {
                if confirm_replaced(host, request, &before)? {
                    tracing::info!(slot = request.slot, strategy = %kind, "Slot replaced");
                    return Ok(Some(kind));
                }
                tracing::warn!(
                    slot = request.slot,
                    strategy = %kind,
                    "Strategy reported success but item name is unchanged"
                );
            }
            Ok(false) => {
                tracing::info!(slot = request.slot, strategy = %kind, "Strategy refused");
            }
            Err(e) => {
                tracing::warn!(slot = request.slot, strategy = %kind, error = %e, "Strategy failed");
            }
        }
    }

    tracing::error!(
        slot = request.slot,
        frame = request.position.start_frame,
        file = %request.media_path.display(),
        "All replacement strategies exhausted"
    );
    Ok(None)
}

/// Post-replacement check: re-scan the track (old handles are stale after
/// a mutation) and require the item at the anchor to display a new name.
fn confirm_replaced(
    host: &mut dyn HostBackend,
    request: &ReplacementRequest<'_>,
    before: &str,
) -> ConformResult<bool> {
    match resolve_slot(host, request.position)? {
        Some(item) => Ok(item.media_name != before || item.media_name == request.media_display),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHost;
    use conform_host::ItemId;
    use std::path::PathBuf;

    fn position(slot: u32, frame: i64) -> SlotPosition {
        SlotPosition {
            slot,
            track: 3,
            start_frame: frame,
            duration_frames: 24,
        }
    }

    fn run(
        host: &mut MockHost,
        allow_source_swap: bool,
        pos: &SlotPosition,
    ) -> Option<StrategyKind> {
        let caps = host.capabilities;
        let item = {
            let items = crate::resolve::resolve_slot(host, pos).unwrap();
            items.unwrap()
        };
        let media = host.register_media("slot_1_new");
        let path = PathBuf::from("/clips/slot_1_new.mp4");
        let request = ReplacementRequest {
            slot: pos.slot,
            position: pos,
            item: &item,
            media: &media,
            media_path: &path,
            media_display: "slot_1_new",
        };
        replace_slot(host, &caps, allow_source_swap, &request).unwrap()
    }

    #[test]
    fn test_direct_replace_wins_when_supported() {
        let mut host = MockHost::new();
        host.capabilities.direct_item_replace = true;
        host.add_item(3, 100, 140, "placeholder");

        let strategy = run(&mut host, false, &position(1, 100));
        assert_eq!(strategy, Some(StrategyKind::DirectReplace));
        assert_eq!(host.item_name_at(3, 100), "slot_1_new");
        assert!(host.takes_added.is_empty());
    }

    #[test]
    fn test_falls_back_to_takes_when_direct_unsupported() {
        let mut host = MockHost::new();
        host.capabilities.direct_item_replace = false;
        host.add_item(3, 100, 140, "placeholder");

        let strategy = run(&mut host, false, &position(1, 100));
        assert_eq!(strategy, Some(StrategyKind::TakeReplace));
        assert_eq!(host.item_name_at(3, 100), "slot_1_new");
        assert_eq!(host.takes_added.len(), 1);
        assert_eq!(host.finalized_takes, 1);
    }

    #[test]
    fn test_falls_back_when_direct_refuses() {
        let mut host = MockHost::new();
        host.capabilities.direct_item_replace = true;
        host.fail_direct_replace = true;
        host.add_item(3, 100, 140, "placeholder");

        let strategy = run(&mut host, false, &position(1, 100));
        assert_eq!(strategy, Some(StrategyKind::TakeReplace));
    }

    #[test]
    fn test_source_swap_disabled_by_default() {
        let mut host = MockHost::new();
        host.capabilities.direct_item_replace = false;
        host.capabilities.takes = false;
        host.add_item(3, 100, 140, "placeholder");

        assert_eq!(run(&mut host, false, &position(1, 100)), None);
        assert_eq!(host.item_name_at(3, 100), "placeholder");
    }

    #[test]
    fn test_source_swap_used_as_last_resort_when_enabled() {
        let mut host = MockHost::new();
        host.capabilities.direct_item_replace = false;
        host.capabilities.takes = false;
        host.add_item(3, 100, 140, "placeholder");

        let strategy = run(&mut host, true, &position(1, 100));
        assert_eq!(strategy, Some(StrategyKind::SourceSwap));
        assert_eq!(host.item_name_at(3, 100), "slot_1_new");
    }

    #[test]
    fn test_source_swap_refuses_shared_pool_asset() {
        let mut host = MockHost::new();
        host.capabilities.direct_item_replace = false;
        host.capabilities.takes = false;
        host.add_shared_item(3, 100, 140, "placeholder", 3);

        assert_eq!(run(&mut host, true, &position(1, 100)), None);
        assert_eq!(host.item_name_at(3, 100), "placeholder");
    }

    #[test]
    fn test_post_check_rejects_silent_noop() {
        let mut host = MockHost::new();
        host.capabilities.direct_item_replace = false;
        // Takes report success but never change the displayed name.
        host.takes_finalize_noop = true;
        host.add_item(3, 100, 140, "placeholder");

        assert_eq!(run(&mut host, false, &position(1, 100)), None);
    }

    #[test]
    fn test_unavailable_strategy_never_touches_host() {
        let mut host = MockHost::new();
        host.capabilities.direct_item_replace = false;
        host.capabilities.takes = true;
        host.add_item(3, 100, 140, "placeholder");

        run(&mut host, false, &position(1, 100));
        assert_eq!(host.direct_replace_calls, 0);
    }

    #[test]
    fn test_stale_item_id_is_a_host_error() {
        let mut host = MockHost::new();
        host.add_item(3, 100, 140, "placeholder");
        let stale = {
            let items = host.track_items(3).unwrap();
            items[0].id.clone()
        };
        host.bump_epoch();
        assert!(host.item_media_name(&stale).is_err());
        assert!(host.item_media_name(&ItemId("nonsense".into())).is_err());
    }
}
