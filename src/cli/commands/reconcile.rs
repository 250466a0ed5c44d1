//! `gscp reconcile` — force a full reconcile pass outside the TTL.

use console::style;

use crate::error::Result;
use crate::reconciler::Reconciler;

pub async fn execute(reconciler: &Reconciler) -> Result<()> {
    reconciler.reconcile().await?;
    println!("{} Reconciled local state against the cloud.", style("✓").green().bold());
    Ok(())
}
