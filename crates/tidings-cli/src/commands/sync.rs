use std::sync::Arc;

use tidings_scheduler::InMemoryDispatcher;
use tracing::info;

use super::{Context, print_records};

/// Reconcile the store against `live`, waiting up to the configured timeout.
pub fn sync(ctx: &Context, live: Vec<String>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let store = ctx.store_with(Arc::new(InMemoryDispatcher::with_live(live)));

    let timeout = ctx.config.sync_timeout();
    let active = store
        .sync_all_pending_schedules_blocking(runtime.handle(), timeout)
        .ok_or_else(|| anyhow::anyhow!("reconciliation did not finish within {timeout:?}"))?;

    info!(active = active.len(), "reconciliation complete");
    print_records(active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tidings_scheduler::ScheduleRecord;

    #[test]
    fn sync_prunes_ids_missing_from_live_list() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::load(None, Some(dir.path().join("cli.redb"))).unwrap();
        let store = ctx.store();
        for id in [1, 2, 3] {
            store.save_schedule(&ScheduleRecord::new(id), UNIX_EPOCH + Duration::from_secs(10));
        }

        sync(&ctx, vec!["2".to_string()]).unwrap();

        let remaining: Vec<i64> = ctx
            .store()
            .list_schedules()
            .iter()
            .filter_map(ScheduleRecord::id)
            .collect();
        assert_eq!(remaining, vec![2]);
    }
}
