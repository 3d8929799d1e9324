use crate::statefile::StateFile;
use crate::ui;
use anyhow::Result;

pub fn execute() -> Result<()> {
    let state_path = StateFile::default_path()?;

    if !state_path.exists() {
        ui::info("No state file found; nothing has been applied yet.");
        return Ok(());
    }

    let state = StateFile::load(&state_path)?;
    ui::info(format!(
        "State file {} ({} step(s) recorded)",
        state_path.display(),
        state.len()
    ));

    for receipt in state.receipts() {
        let mut line = format!("{:12} {} ({})", receipt.id, receipt.detail, receipt.applied_at);
        if let Some(digest) = &receipt.digest {
            line.push_str(&format!("\nsha256 {digest}"));
        }
        ui::success("Applied", line);
    }

    Ok(())
}
