//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 表单完成 -> 聚合器 -> sinks 的完整链路
//! - 上传代理经由事件绑定的链路
//! - 配置加载后对 HTTP sinks 的提交（wiremock 模拟）
//! - MongoDB 文档存储 (testcontainers，需要 docker，默认忽略)

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(contracts::UNIQUENESS_FIELD, "email");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use aggregator::{
        handle_survey_submission, HttpConnector, MemoryConnector, SubmissionAggregator,
    };
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        DispatchPolicy, DocumentFilter, DocumentStore, DocumentStoreConfig, SinkConfig,
        SpreadsheetConfig, SubmissionError, SubmissionOptions,
    };
    use form_binding::{
        channels, completion, Builtins, EventOptions, FileBlob, FormBinding, FormInstance,
        HandlerMap, UploadCallback, UploadEvent, UploadStatus,
    };
    use serde_json::json;
    use tokio::sync::oneshot;
    use url::Url;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type Outcomes = Arc<Mutex<Vec<Result<usize, String>>>>;

    fn sink_config() -> SinkConfig {
        SinkConfig {
            policy: DispatchPolicy::BestEffortAll,
            document_store: Some(DocumentStoreConfig::new("memory://e2e").with_uniqueness()),
            spreadsheet: Some(SpreadsheetConfig {
                spreadsheet_id: "sheet-1".to_string(),
                range: "Responses".to_string(),
                api_key: "key".to_string(),
                access_token: None,
            }),
            object_store: None,
        }
    }

    /// Bind a form whose completion submits through `aggregator`
    fn bind_form(
        aggregator: Arc<SubmissionAggregator<MemoryConnector>>,
        outcomes: Outcomes,
    ) -> (Arc<FormInstance>, FormBinding) {
        let form = FormInstance::with_standard_channels();
        let config = Arc::new(sink_config());

        let on_complete = completion(move |payload| {
            let aggregator = Arc::clone(&aggregator);
            let config = Arc::clone(&config);
            let outcomes = Arc::clone(&outcomes);
            async move {
                let outcome = aggregator
                    .submit(&payload, &config)
                    .await
                    .map(|r| r.succeeded())
                    .map_err(|e| e.to_string());
                outcomes.lock().unwrap().push(outcome);
            }
        });

        let mut binding = FormBinding::new();
        binding.render(
            &form,
            Builtins::default().on_complete(on_complete),
            HandlerMap::new(),
        );
        (form, binding)
    }

    /// End-to-end test: form completion -> aggregator -> both sinks
    #[tokio::test]
    async fn test_e2e_form_completion_submits() {
        let aggregator = Arc::new(SubmissionAggregator::new(MemoryConnector::new()));
        let outcomes = Outcomes::default();
        let (form, _binding) = bind_form(Arc::clone(&aggregator), Arc::clone(&outcomes));

        form.change_value("name", "Ann").await.unwrap();
        form.change_value("email", "a@x.com").await.unwrap();
        form.complete().await.unwrap();

        // completion is awaited by the channel
        assert_eq!(*outcomes.lock().unwrap(), vec![Ok(2)]);

        let connector = aggregator.context().connector();
        let store = connector.memory().get("e2e").unwrap();
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data.get("name"), Some(&json!("Ann")));
        assert_eq!(
            connector.sheets().rows(),
            vec![vec![json!("Ann"), json!("a@x.com")]]
        );
    }

    /// Second respondent with the same email is rejected before any sink write
    #[tokio::test]
    async fn test_e2e_duplicate_respondent_rejected() {
        let aggregator = Arc::new(SubmissionAggregator::new(MemoryConnector::new()));
        let outcomes = Outcomes::default();

        for _ in 0..2 {
            let (form, _binding) = bind_form(Arc::clone(&aggregator), Arc::clone(&outcomes));
            form.set_value("name", "Ann");
            form.set_value("email", "a@x.com");
            form.complete().await.unwrap();
        }

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes[0], Ok(2));
        assert!(outcomes[1].as_ref().unwrap_err().contains("duplicate"));

        let connector = aggregator.context().connector();
        let store = connector.memory().get("e2e").unwrap();
        assert_eq!(
            store
                .count_documents(&DocumentFilter::by_email("a@x.com"))
                .await
                .unwrap(),
            1
        );
        assert_eq!(connector.sheets().rows().len(), 1);
    }

    /// Upload event fired by the form reaches the endpoint through the proxy
    #[tokio::test]
    async fn test_e2e_upload_through_binding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "fileId": "f-1", "content": "https://cdn.example.com/f-1" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let config = ConfigLoader::load_from_str(
            &format!(
                r#"
[form]
upload_url = "{}/api/files"

[form.css_classes]
root = "sv-root--compact"
"#,
                server.uri()
            ),
            ConfigFormat::Toml,
        )
        .unwrap();

        let form = FormInstance::with_standard_channels();
        let mut binding = FormBinding::new();
        binding.render(&form, Builtins::from_config(&config.form), HandlerMap::new());

        let (tx, rx) = oneshot::channel();
        let callback = UploadCallback::new(move |status| {
            let _ = tx.send(status);
        });
        let mut options = EventOptions::UploadFiles(UploadEvent::new(
            vec![FileBlob::new("cv.pdf", "application/pdf", b"%PDF".to_vec())],
            callback,
        ));
        form.fire(channels::UPLOAD_FILES, &mut options).await.unwrap();
        drop(options);

        let status = tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .unwrap()
            .unwrap();
        match status {
            UploadStatus::Success(files) => assert_eq!(files[0].file_id, "f-1"),
            UploadStatus::Error => panic!("expected upload success"),
        }
    }

    /// Config file -> HTTP connector: file-backed document store plus a
    /// mocked Sheets endpoint
    #[tokio::test]
    async fn test_e2e_config_to_http_sinks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-1/values/Responses:append"))
            .and(body_json(json!({ "values": [["Ann", "a@x.com", "[\"a\",\"b\"]"]] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "updates": { "updatedRange": "Responses!A2:C2", "updatedRows": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let records = dir.path().join("records.jsonl");
        let config = ConfigLoader::load_from_str(
            &format!(
                r#"
[sinks]
policy = "abort_on_first_failure"

[sinks.document_store]
uri = "file://{}"
enforce_uniqueness = true

[sinks.spreadsheet]
spreadsheet_id = "sheet-1"
range = "Responses"
api_key = "key"
"#,
                records.display()
            ),
            ConfigFormat::Toml,
        )
        .unwrap();

        let connector = HttpConnector::new(reqwest::Client::new())
            .unwrap()
            .with_sheets_base(Url::parse(&server.uri()).unwrap());
        let aggregator = SubmissionAggregator::new(connector);

        let payload = contracts::ResponsePayload::new()
            .with("name", "Ann")
            .with("email", "a@x.com")
            .with("tags", json!(["a", "b"]));
        let result = aggregator.submit(&payload, &config.sinks).await.unwrap();
        assert_eq!(result.succeeded(), 2);

        let written = std::fs::read_to_string(&records).unwrap();
        assert_eq!(written.lines().count(), 1);

        // the duplicate check reads the file written above
        let err = aggregator.submit(&payload, &config.sinks).await.unwrap_err();
        assert!(matches!(err, SubmissionError::DuplicateSubmission { .. }));
    }

    /// Request-level entry point with a failing spreadsheet aborts
    #[tokio::test]
    async fn test_e2e_entry_point_propagates_sink_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
            .mount(&server)
            .await;

        let connector = HttpConnector::new(reqwest::Client::new())
            .unwrap()
            .with_sheets_base(Url::parse(&server.uri()).unwrap());
        let aggregator = SubmissionAggregator::new(connector);

        let options: SubmissionOptions = serde_json::from_value(json!({
            "mongo": true,
            "mongoUri": "memory://entry",
            "googleSheet": { "spreadsheetId": "sheet-1", "range": "Responses", "apiKey": "key" }
        }))
        .unwrap();
        let payload = contracts::ResponsePayload::new().with("email", "a@x.com");

        let err = handle_survey_submission(&aggregator, &payload, &options)
            .await
            .unwrap_err();
        match err {
            SubmissionError::SinkWrite { sink, message } => {
                assert_eq!(sink, "spreadsheet");
                assert!(message.contains("500"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // document store ran first and keeps its record
        let store = aggregator.context().connector().memory().get("entry").unwrap();
        assert_eq!(store.len(), 1);
    }
}

#[cfg(test)]
mod mongo_tests {
    use aggregator::{handle_survey_submission, HttpConnector, SubmissionAggregator};
    use contracts::{ResponsePayload, SubmissionError, SubmissionOptions};
    use testcontainers::core::{IntoContainerPort, WaitFor};
    use testcontainers::runners::AsyncRunner;
    use testcontainers::{ContainerAsync, GenericImage};

    async fn mongo_container() -> (ContainerAsync<GenericImage>, String) {
        let container = GenericImage::new("mongo", "7")
            .with_exposed_port(27017.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Waiting for connections"))
            .start()
            .await
            .expect("Failed to start MongoDB container");
        let host = container.get_host().await.expect("container host");
        let port = container
            .get_host_port_ipv4(27017)
            .await
            .expect("container port");
        (container, format!("mongodb://{host}:{port}/survey"))
    }

    #[tokio::test]
    #[ignore = "starts a MongoDB container"]
    async fn test_entry_point_against_mongodb() {
        let (_container, uri) = mongo_container().await;
        let aggregator =
            SubmissionAggregator::new(HttpConnector::new(reqwest::Client::new()).unwrap());
        let options = SubmissionOptions {
            mongo: true,
            mongo_uri: Some(uri),
            check_duplicate: true,
            survey_id: Some("s1".to_string()),
            ..SubmissionOptions::default()
        };
        let data = ResponsePayload::new()
            .with("name", "Ann")
            .with("email", "ann@x.com");

        let outcome = handle_survey_submission(&aggregator, &data, &options)
            .await
            .unwrap();
        let record = outcome.mongo.unwrap();
        assert_eq!(record.email.as_deref(), Some("ann@x.com"));
        assert_eq!(record.survey_id.as_deref(), Some("s1"));
        assert!(outcome.sheets.is_none());

        let again = handle_survey_submission(&aggregator, &data, &options).await;
        assert!(matches!(again, Err(SubmissionError::DuplicateSubmission { .. })));

        let other = ResponsePayload::new().with("email", "bob@x.com");
        assert!(handle_survey_submission(&aggregator, &other, &options)
            .await
            .is_ok());
    }
}
