//! History command implementation.

use anyhow::Result;

use warpdrop_core::file::format_size;
use warpdrop_core::history::HistoryStore;

use super::HistoryArgs;

/// Run the history command.
pub fn run(args: &HistoryArgs) -> Result<()> {
    let mut store = HistoryStore::load()?;

    if args.clear {
        store.clear()?;
        println!("History cleared.");
        return Ok(());
    }

    let records = store.list(args.limit);

    if args.json {
        let output = serde_json::to_string_pretty(records)?;
        println!("{output}");
        return Ok(());
    }

    if records.is_empty() {
        println!("No transfers recorded yet.");
        return Ok(());
    }

    for record in records {
        let outcome = if record.success { "ok" } else { "failed" };
        println!(
            "  {}  {:>8}  {:>10}  {}  {}",
            record.formatted_timestamp(),
            record.direction,
            format_size(record.file_size),
            outcome,
            record.file_name,
        );
        if let Some(message) = &record.error_message {
            println!("      {message}");
        }
    }

    Ok(())
}
