use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::StatusCount;
use crate::registry::{REGISTRY_FILE, Registry};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args.cache_root.join(REGISTRY_FILE);
    info!(cache_root = %args.cache_root.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "registry missing");
        return Ok(());
    }

    let registry = Registry::open(&db_path)?;
    let counts = status_counts(&registry)?;
    for entry in &counts {
        info!(status = %entry.status, count = entry.count, "representations");
    }

    let total: i64 = counts.iter().map(|entry| entry.count).sum();
    info!(
        path = %db_path.display(),
        acts = registry.act_count()?,
        representations = total,
        "registry status"
    );

    Ok(())
}

pub fn status_counts(registry: &Registry) -> Result<Vec<StatusCount>> {
    Ok(registry
        .counts()?
        .into_iter()
        .map(|(status, count)| StatusCount {
            status: status.to_string(),
            count,
        })
        .collect())
}
