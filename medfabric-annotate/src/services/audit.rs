//! Audit observer: appends every committed event to a JSON Lines file

use std::path::{Path, PathBuf};

use medfabric_common::events::{EventBus, MedFabricEvent};
use medfabric_common::Result;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;

/// Subscribe now and keep appending until the bus is dropped
pub fn spawn_audit_observer(event_bus: &EventBus, path: PathBuf) -> JoinHandle<()> {
    let rx = event_bus.subscribe();
    tokio::spawn(async move {
        tracing::info!(path = %path.display(), "Audit observer started");
        run(rx, &path).await;
        tracing::info!("Audit observer stopped");
    })
}

async fn run(mut rx: Receiver<MedFabricEvent>, path: &Path) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(e) = append_event(path, &event).await {
                    tracing::error!(error = %e, event_type = event.event_type(), "Failed to write audit record");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Audit observer lagged; events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

pub async fn append_event(path: &Path, event: &MedFabricEvent) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut line = serde_json::to_string(event)
        .map_err(|e| medfabric_common::Error::Internal(format!("Audit serialization failed: {}", e)))?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_observer_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("audit.jsonl");
        let bus = EventBus::new(16);
        let handle = spawn_audit_observer(&bus, path.clone());

        let session_id = Uuid::new_v4();
        bus.emit_lossy(MedFabricEvent::SessionClosed {
            session_id,
            timestamp: chrono::Utc::now(),
        });
        bus.emit_lossy(MedFabricEvent::ConflictScanCompleted {
            inserted: 1,
            reopened: 0,
            resolved: 0,
            flags_changed: 1,
            timestamp: chrono::Utc::now(),
        });
        drop(bus);
        handle.await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "SessionClosed");
        assert_eq!(lines[0]["session_id"], session_id.to_string());
        assert_eq!(lines[1]["inserted"], 1);
    }
}
