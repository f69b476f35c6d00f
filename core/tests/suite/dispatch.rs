use anyhow::Result;
use mysmap_core::Dispatch;
use mysmap_core::Inbound;
use mysmap_core::MapError;
use mysmap_core::dispatch::HELP_TEXT;
use mysmap_test_support::CountingRenderer;
use mysmap_test_support::FakeTransfer;
use mysmap_test_support::MapFixture;
use mysmap_test_support::RecordingSink;
use mysmap_test_support::responses::LABEL_TREE_PATH;
use mysmap_test_support::responses::label_tree;
use mysmap_test_support::responses::start_mock_server;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

#[tokio::test]
async fn help_is_static() -> Result<()> {
    let server = start_mock_server().await;
    let ctx = MapFixture::new(&server).default_context();

    let sink = RecordingSink::new();
    assert!(ctx.handle(&Inbound::text("#地图帮助"), sink.clone()).await);
    assert_eq!(sink.texts(), vec![HELP_TEXT.to_string()]);
    Ok(())
}

#[tokio::test]
async fn unknown_label_suggests_resource_list() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::installed(&server);
    fixture.write_aliases("abcd: [清心]\n");
    let ctx = fixture.default_context();

    let sink = RecordingSink::new();
    assert!(ctx.handle(&Inbound::text("层岩巨渊夜泊石在哪"), sink.clone()).await);

    let expected = MapError::NotFound {
        map: "层岩巨渊".to_string(),
        label: "夜泊石".to_string(),
    };
    assert_eq!(sink.texts(), vec![expected.user_message()]);
    Ok(())
}

#[tokio::test]
async fn package_commands_need_privilege() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::new(&server);
    let transfer = Arc::new(FakeTransfer::succeeding(600));
    let ctx = fixture.context(transfer.clone(), Arc::new(CountingRenderer::default()));

    let sink = RecordingSink::new();
    assert!(!ctx.handle(&Inbound::text("#安装地图资源包"), sink.clone()).await);
    assert!(sink.messages().is_empty());
    assert_eq!(transfer.clones(), 0);

    assert!(ctx.handle(&Inbound::text("#安装地图资源包").privileged(), sink.clone()).await);
    assert_eq!(sink.texts(), vec!["开始安装地图资源包，请耐心等待~".to_string()]);
    Ok(())
}

#[tokio::test]
async fn update_probe_failure_is_reported() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::installed(&server);
    let ctx = fixture.default_context();

    let sink = RecordingSink::new();
    assert!(ctx.handle(&Inbound::text("#更新地图资源包").privileged(), sink.clone()).await);

    let reply = sink.last_text().expect("probe failure reply");
    assert!(reply.starts_with("地图服务暂时不可用"), "{reply}");
    assert!(!ctx.installer.is_installing());
    Ok(())
}

#[tokio::test]
async fn unrelated_text_is_not_consumed() -> Result<()> {
    let server = start_mock_server().await;
    let ctx = MapFixture::installed(&server).default_context();

    let sink = RecordingSink::new();
    assert!(!ctx.handle(&Inbound::text("今天天气不错"), sink.clone()).await);
    assert!(sink.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn install_dispatch_hands_back_transfer_with_catalog_refresh() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::new(&server);
    Mock::given(method("GET"))
        .and(path(LABEL_TREE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(label_tree(json!([
                    { "id": 1, "name": "区域特产", "icon": "", "children": [
                        { "id": "abcd", "name": "清心", "icon": "" },
                    ] },
                ])))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let ctx = fixture.context(
        Arc::new(FakeTransfer::succeeding(600)),
        Arc::new(CountingRenderer::default()),
    );

    let sink = RecordingSink::new();
    let dispatch = ctx
        .dispatch(&Inbound::text("#安装地图资源包").privileged(), sink.clone())
        .await;
    let Dispatch::Transfer(handle) = dispatch else {
        panic!("expected a running transfer, got {dispatch:?}");
    };
    let report = handle.await?;

    assert!(report.result.is_ok());
    let stats = report.bootstrap.expect("catalog refreshed after install");
    assert_eq!(stats.aliases_added, 1);
    let layout = fixture.layout();
    assert!(layout.label_tree_file().exists());
    assert!(layout.alias_file().exists());
    assert_eq!(
        sink.texts(),
        vec![
            "开始安装地图资源包，请耐心等待~".to_string(),
            "地图资源包安装成功！".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn handled_commands_without_transfer_dispatch_as_handled() -> Result<()> {
    let server = start_mock_server().await;
    let fixture = MapFixture::new(&server);
    fixture.populate_primary(600);
    let ctx = fixture.default_context();

    let dispatch = ctx
        .dispatch(&Inbound::text("#安装地图资源包").privileged(), RecordingSink::new())
        .await;
    assert!(matches!(dispatch, Dispatch::Handled), "{dispatch:?}");

    let dispatch = ctx.dispatch(&Inbound::text("#安装地图资源包"), RecordingSink::new()).await;
    assert!(matches!(dispatch, Dispatch::Declined), "{dispatch:?}");
    Ok(())
}
