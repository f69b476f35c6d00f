use anyhow::Result;
use anyhow::bail;
use mysmap_core::InstallOutcome;
use mysmap_core::MapError;
use mysmap_core::TransferKind;
use mysmap_core::TransferReport;
use mysmap_test_support::CountingRenderer;
use mysmap_test_support::FakeTransfer;
use mysmap_test_support::MapFixture;
use mysmap_test_support::RecordingSink;
use mysmap_test_support::fill_map_dir;
use mysmap_test_support::responses::mirror_ok;
use mysmap_test_support::responses::mirror_status;
use mysmap_test_support::responses::mount_mirror;
use mysmap_test_support::responses::start_mock_server;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;

async fn finish(outcome: InstallOutcome) -> Result<TransferReport> {
    match outcome {
        InstallOutcome::Started(handle) => Ok(handle.await?),
        other => bail!("expected a started transfer, got {other:?}"),
    }
}

#[tokio::test]
async fn complete_corpus_short_circuits_install() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::new(&server);
    fixture.populate_primary(600);
    let transfer = Arc::new(FakeTransfer::succeeding(600));
    let ctx = fixture.context(transfer.clone(), Arc::new(CountingRenderer::default()));

    let sink = RecordingSink::new();
    let outcome = ctx.installer.install(sink.clone()).await?;

    assert!(matches!(outcome, InstallOutcome::AlreadyInstalled));
    assert_eq!(sink.texts(), vec!["地图资源包已安装!".to_string()]);
    assert_eq!(transfer.clones(), 0);
    assert!(!ctx.installer.is_installing());
    Ok(())
}

#[tokio::test]
async fn concurrent_install_reports_in_progress() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::new(&server);
    let gate = Arc::new(Notify::new());
    let transfer = Arc::new(FakeTransfer::succeeding(600).gated(gate.clone()));
    let ctx = fixture.context(transfer.clone(), Arc::new(CountingRenderer::default()));

    let sink = RecordingSink::new();
    let first = ctx.installer.install(sink.clone()).await?;
    assert!(ctx.installer.is_installing());

    let second = ctx.installer.install(sink.clone()).await?;
    let third = ctx.installer.update(sink.clone()).await?;
    assert!(matches!(second, InstallOutcome::AlreadyInProgress));
    assert!(matches!(third, InstallOutcome::AlreadyInProgress));

    gate.notify_one();
    let report = finish(first).await?;

    assert_eq!(report.kind, TransferKind::Install);
    assert!(report.result.is_ok());
    assert_eq!(transfer.clones(), 1);
    assert_eq!(transfer.pulls(), 0);
    assert!(!ctx.installer.is_installing());
    assert_eq!(ctx.layout.primary_entry_count().await?, 600);
    assert_eq!(ctx.layout.corpus_version().await?, "20240202");
    assert_eq!(
        sink.texts(),
        vec![
            "开始安装地图资源包，请耐心等待~".to_string(),
            "地图资源包安装中...".to_string(),
            "地图资源包更新中...".to_string(),
            "地图资源包安装成功！".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn failed_install_cleans_up_and_releases_flag() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::new(&server);
    let transfer = Arc::new(FakeTransfer::failing(128, "fatal: repository not found"));
    let ctx = fixture.context(transfer.clone(), Arc::new(CountingRenderer::default()));

    let sink = RecordingSink::new();
    let report = finish(ctx.installer.install(sink.clone()).await?).await?;

    assert!(matches!(
        report.result,
        Err(MapError::Transfer { code: Some(128), .. })
    ));
    assert!(report.bootstrap.is_none());
    assert!(!ctx.layout.staging_dir().exists());
    assert!(!ctx.layout.images_dir().exists());
    assert!(!ctx.installer.is_installing());

    let failure = sink.last_text().expect("failure reply");
    assert!(failure.starts_with("地图资源包安装失败！"), "{failure}");
    assert!(failure.contains("Error code: 128"));

    let retry = ctx.installer.install(sink.clone()).await?;
    finish(retry).await?;
    assert_eq!(transfer.clones(), 2);
    Ok(())
}

#[tokio::test]
async fn install_replaces_under_populated_corpus() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::new(&server);
    fixture.populate_primary(42);
    let transfer = Arc::new(FakeTransfer::succeeding(650));
    let ctx = fixture.context(transfer.clone(), Arc::new(CountingRenderer::default()));

    let report = finish(ctx.installer.install(RecordingSink::new()).await?).await?;

    assert!(report.result.is_ok());
    assert_eq!(ctx.layout.primary_entry_count().await?, 650);
    Ok(())
}

#[tokio::test]
async fn update_is_noop_when_probe_reports_current() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::installed(&server);
    mount_mirror(&server, "2", 2, mirror_ok(1, "/img/2.jpg", 3, json!({})), 1).await;
    let transfer = Arc::new(FakeTransfer::default());
    let ctx = fixture.context(transfer.clone(), Arc::new(CountingRenderer::default()));

    let sink = RecordingSink::new();
    let outcome = ctx.installer.update(sink.clone()).await?;

    assert!(matches!(outcome, InstallOutcome::AlreadyLatest));
    assert_eq!(sink.texts(), vec!["地图资源包已是最新!".to_string()]);
    assert_eq!(transfer.pulls(), 0);
    assert!(!ctx.installer.is_installing());
    Ok(())
}

#[tokio::test]
async fn update_pulls_when_probe_reports_change() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::installed(&server);
    mount_mirror(&server, "2", 2, mirror_status(-4, "version changed"), 1).await;
    let transfer = Arc::new(FakeTransfer::default());
    let ctx = fixture.context(transfer.clone(), Arc::new(CountingRenderer::default()));

    let sink = RecordingSink::new();
    let report = finish(ctx.installer.update(sink.clone()).await?).await?;

    assert_eq!(report.kind, TransferKind::Update);
    assert!(report.result.is_ok());
    assert_eq!(transfer.pulls(), 1);
    assert_eq!(
        sink.texts(),
        vec![
            "开始更新地图资源包，请耐心等待~".to_string(),
            "地图资源包更新成功！".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn failed_update_leaves_corpus_in_place() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::installed(&server);
    mount_mirror(&server, "2", 2, mirror_status(-4, "version changed"), 1).await;
    let transfer = Arc::new(FakeTransfer::failing(1, "merge conflict"));
    let ctx = fixture.context(transfer.clone(), Arc::new(CountingRenderer::default()));

    let sink = RecordingSink::new();
    let report = finish(ctx.installer.update(sink.clone()).await?).await?;

    assert!(report.result.is_err());
    assert!(!ctx.installer.is_installing());
    assert_eq!(ctx.layout.primary_entry_count().await?, 300);
    let failure = sink.last_text().expect("failure reply");
    assert!(failure.starts_with("地图资源包更新失败！"), "{failure}");
    Ok(())
}

#[tokio::test]
async fn update_without_corpus_asks_for_install() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::new(&server);
    fill_map_dir(&fixture.layout().map_dir(7), 1);
    let transfer = Arc::new(FakeTransfer::default());
    let ctx = fixture.context(transfer.clone(), Arc::new(CountingRenderer::default()));

    let sink = RecordingSink::new();
    let outcome = ctx.installer.update(sink.clone()).await?;

    assert!(matches!(outcome, InstallOutcome::NotInstalled));
    assert_eq!(sink.texts(), vec![MapError::NotInstalled.user_message()]);
    assert_eq!(transfer.pulls(), 0);
    Ok(())
}
