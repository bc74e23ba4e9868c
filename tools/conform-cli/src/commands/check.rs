//! Verify host connectivity and template integrity without mutating
//! anything.

use conform_common::config::AppConfig;
use conform_engine::{check_template, open_template};
use conform_host::HostSession;
use conform_job_model::SlotTable;

pub fn run(config: AppConfig) -> anyhow::Result<()> {
    println!("Conform System Check");
    println!("{}", "=".repeat(50));

    config.validate()?;
    println!("[OK] Configuration valid");

    let table = SlotTable::load(&config.template.slot_table)?;
    println!(
        "[OK] Slot table: {} slots (version {})",
        table.positions.len(),
        table.version
    );

    let mut session = HostSession::connect(&config.host, &config.polling)?;
    println!("[OK] Connected to host");

    let caps = session.capabilities();
    println!(
        "     direct replace: {}, takes: {}, source swap: {}",
        caps.direct_item_replace, caps.takes, caps.source_swap
    );
    println!(
        "     render status query: {}, render active query: {}",
        caps.render_job_status, caps.render_active_query
    );

    open_template(session.backend(), &config.template, None)?;
    let open_name = session.backend().current_project_name()?;
    println!(
        "[OK] Template '{}' opened, timeline '{}' current",
        open_name, config.template.timeline_name
    );

    let report = check_template(session.backend(), &table)?;
    for (track, frame) in &report.extra {
        println!("[WARN] Track {track}: item at frame {frame} has no slot table entry");
    }
    if report.is_intact() {
        println!("[OK] All {} anchor frames present", table.positions.len());
        println!();
        println!("System is ready to process jobs.");
        Ok(())
    } else {
        for missing in &report.missing {
            println!(
                "[FAIL] Slot {} anchor missing (track {}, frame {})",
                missing.slot, missing.track, missing.frame
            );
        }
        println!();
        anyhow::bail!("template integrity check failed; recalibrate the slot table")
    }
}
