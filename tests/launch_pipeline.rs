//! Onboarding path: façade task creation through Launcher dispatch.

mod common;

use common::{inventory_host, Rig};
use hostpool_core::error::PoolError;
use hostpool_core::models::TaskPhase;
use hostpool_core::state_machine::HostPhase;
use hostpool_core::store::{HostQuery, Page};
use hostpool_core::PoolStore;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn launch_three_hosts_end_to_end() -> anyhow::Result<()> {
    let rig = Rig::new();
    for id in ["h-1", "h-2", "h-3"] {
        rig.inventory.seed(inventory_host(id, "D1", 1, 0));
    }

    let task_id = rig
        .facade
        .create_launch_task("ops", vec!["h-1".into(), "h-2".into(), "h-3".into()])
        .await?;

    let task = rig.store.get_launch_task(task_id).await?.unwrap();
    assert_eq!(task.status.phase, TaskPhase::Init);
    assert_eq!(task.status.total, 3);
    assert_eq!(task.status.pending, 3);

    rig.launcher.dispatch(task_id).await?;

    let task = rig.store.get_launch_task(task_id).await?.unwrap();
    assert_eq!(task.status.phase, TaskPhase::Success);
    assert_eq!(task.status.success, 3);
    assert_eq!(task.status.pending, 0);

    let idle = rig
        .store
        .find_hosts(
            &HostQuery::default().with_phase(HostPhase::Idle),
            Page::all(),
        )
        .await?;
    assert_eq!(idle.len(), 3);
    assert!(idle.iter().all(|h| h.status.launch_task == Some(task_id)));

    // One batch transfer into the pool's idle module.
    let transfers = rig.inventory.transfers.lock().clone();
    assert_eq!(transfers.len(), 1);
    let (from_biz, ref ids, to_biz, to_module) = transfers[0];
    assert_eq!(from_biz, rig.config.inventory.resource_biz);
    assert_eq!(ids.len(), 3);
    assert_eq!(to_biz, rig.config.inventory.pool_biz);
    assert_eq!(to_module, rig.config.inventory.idle_module);
    Ok(())
}

#[tokio::test]
async fn launch_skips_unresolvable_hosts() -> anyhow::Result<()> {
    let rig = Rig::new();
    rig.inventory.seed(inventory_host("h-1", "D1", 1, 0));
    // D9 has no grade mapping, h-missing is not in inventory at all.
    rig.inventory.seed(inventory_host("h-2", "D9", 1, 0));

    let task_id = rig
        .facade
        .create_launch_task("ops", vec!["h-1".into(), "h-2".into(), "h-missing".into()])
        .await?;

    let task = rig.store.get_launch_task(task_id).await?.unwrap();
    assert_eq!(task.host_ids, vec!["h-1".to_string()]);
    assert_eq!(task.status.total, 1);
    Ok(())
}

#[tokio::test]
async fn launch_rejects_when_nothing_resolves() {
    let rig = Rig::new();
    let result = rig
        .facade
        .create_launch_task("ops", vec!["ghost".into()])
        .await;
    assert!(matches!(result, Err(PoolError::Validation(_))));

    let result = rig.facade.create_launch_task("ops", Vec::new()).await;
    assert!(matches!(result, Err(PoolError::Validation(_))));
}

#[tokio::test]
async fn launch_transfer_failure_marks_task_failed() -> anyhow::Result<()> {
    let rig = Rig::new();
    rig.inventory.seed(inventory_host("h-1", "D1", 1, 0));
    let task_id = rig
        .facade
        .create_launch_task("ops", vec!["h-1".into()])
        .await?;

    rig.inventory.fail_transfer.store(true, Ordering::SeqCst);
    assert!(rig.launcher.dispatch(task_id).await.is_err());

    let task = rig.store.get_launch_task(task_id).await?.unwrap();
    assert_eq!(task.status.phase, TaskPhase::Failed);
    assert!(!task.status.message.is_empty());
    // No pool-host row was persisted for the failed batch.
    assert_eq!(
        rig.store.count_hosts(&HostQuery::default()).await?,
        0
    );
    Ok(())
}
