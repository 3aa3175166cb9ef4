use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tidings_scheduler::ScheduleRecord;

use super::{Context, print_records};

pub fn list(ctx: &Context) -> anyhow::Result<()> {
    print_records(ctx.store().list_schedules())
}

pub fn pending(ctx: &Context, at: Option<u64>) -> anyhow::Result<()> {
    let reference = at.map_or_else(SystemTime::now, unix_secs);
    print_records(ctx.store().list_pending_schedules(reference))
}

pub fn show(ctx: &Context, id: i64) -> anyhow::Result<()> {
    let record = ctx
        .store()
        .get_schedule_by_key(id)
        .ok_or_else(|| anyhow::anyhow!("schedule {id} not found"))?;
    print_records(vec![record])
}

pub fn save(ctx: &Context, id: i64, at: u64, fields: &[String]) -> anyhow::Result<()> {
    let mut record = ScheduleRecord::new(id);
    for field in fields {
        let (name, value) = parse_field(field)?;
        record = record.with_field(name, value);
    }
    // Field arguments must not silently change the key.
    record.set_id(id);

    ctx.store().save_schedule(&record, unix_secs(at));
    println!("✓ Saved schedule {id}");
    Ok(())
}

pub fn remove(ctx: &Context, id: i64) -> anyhow::Result<()> {
    if ctx.store().remove_schedule(id) {
        println!("✓ Removed schedule {id}");
    } else {
        println!("Schedule {id} did not exist");
    }
    Ok(())
}

pub fn clear(ctx: &Context) -> anyhow::Result<()> {
    ctx.store().cancel_all_schedules();
    println!("✓ Cleared all schedules");
    Ok(())
}

fn unix_secs(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// Split `key=value`, reading the value as JSON when it parses.
fn parse_field(field: &str) -> anyhow::Result<(String, Value)> {
    let (name, raw) = field
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("field must be key=value, got {field:?}"))?;
    if name.is_empty() {
        anyhow::bail!("field name must not be empty");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}
