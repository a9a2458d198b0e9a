//! Guest-to-account migration of cart and favorites entries.
//!
//! Run once when a guest signs in. Every guest entry is pushed to the
//! server in order, one request at a time. A rejected entry is logged and
//! skipped; the caller clears the guest collection afterwards whatever the
//! outcome, so skipped entries are lost.

use basket_core::{LocalItem, ProductId};
use tracing::{info, warn};

use crate::remote::RemoteStore;

/// Outcome of pushing guest entries to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Entries the server accepted.
    pub pushed: usize,
    /// Products whose push failed, in push order.
    pub failed: Vec<ProductId>,
}

impl ReconcileReport {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Push each item to `remote`, sequentially, swallowing per-item failures.
pub async fn push_items<R: RemoteStore>(
    label: &'static str,
    items: &[LocalItem],
    remote: &R,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for item in items {
        match remote.add(item.product_id, item.quantity).await {
            Ok(()) => report.pushed += 1,
            Err(e) => {
                warn!(
                    collection = label,
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    error = %e,
                    "Dropping guest entry the server rejected"
                );
                report.failed.push(item.product_id);
            }
        }
    }

    info!(
        collection = label,
        pushed = report.pushed,
        failed = report.failed.len(),
        "Guest entries pushed"
    );
    report
}
