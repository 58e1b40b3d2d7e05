//! End-to-end experiment builds against the mock service.

use crate::mock_server::{serve_key_check_once, treatment, MockServerFixture, BUILD_PATH, TEST_KEY};
use intura_ai::registry::FactoryTable;
use intura_ai::types::{ChatModel, Message, ModelConfig};
use intura_ai::{
    BuildOutcome, BuildRequest, ChatModelExperiment, ClientConfig, ConversationMessage, Error,
    ModelHandle,
};
use serde_json::json;
use std::collections::HashMap;

/// Stand-in provider client that keeps the configuration it was built with.
struct FakeChat {
    provider: &'static str,
    config: ModelConfig,
}

fn openai(config: ModelConfig) -> anyhow::Result<Box<dyn ChatModel>> {
    Ok(Box::new(FakeChat {
        provider: "openai",
        config,
    }))
}

fn google(config: ModelConfig) -> anyhow::Result<Box<dyn ChatModel>> {
    Ok(Box::new(FakeChat {
        provider: "google",
        config,
    }))
}

fn broken(_: ModelConfig) -> anyhow::Result<Box<dyn ChatModel>> {
    Err(anyhow::anyhow!("constructor rejected configuration"))
}

/// OpenAI and Google are installed; Anthropic is not.
fn providers() -> FactoryTable {
    FactoryTable::new()
        .register_fn("langchain_openai", "ChatOpenAI", openai)
        .register_fn("langchain_google_genai", "ChatGoogleGenerativeAI", google)
        .register_fn("broken_sdk", "ChatBroken", broken)
}

fn openai_arm(id: u64, model: &str) -> serde_json::Value {
    treatment(id, "openai", "langchain_openai", "ChatOpenAI", model)
}

fn google_arm(id: u64, model: &str) -> serde_json::Value {
    treatment(id, "google", "langchain_google_genai", "ChatGoogleGenerativeAI", model)
}

fn anthropic_arm(id: u64, model: &str) -> serde_json::Value {
    treatment(id, "anthropic", "langchain_anthropic", "ChatAnthropic", model)
}

fn experiment(fixture: &mut MockServerFixture) -> (ChatModelExperiment, mockito::Mock) {
    let (client, key) = fixture.fetch();
    (ChatModelExperiment::new(client, providers()).unwrap(), key)
}

fn fake(handle: &ModelHandle) -> &FakeChat {
    handle.downcast_ref::<FakeChat>().expect("FakeChat")
}

fn session_of(handle: &ModelHandle) -> String {
    fake(handle).config.metadata().unwrap()["session_id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_single_model_build() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let _build = fixture.mock_build(vec![openai_arm(1, "gpt-4o"), google_arm(2, "gemini-pro")]);

    let request = BuildRequest::new("exp-1")
        .session_id("session-1")
        .api_key("sk-provider")
        .messages(vec![
            ConversationMessage::human("hi"),
            ConversationMessage::ai("hello"),
        ]);
    let outcome = experiment.build(&request).unwrap().unwrap();
    let handle = match outcome {
        BuildOutcome::Single(handle) => handle,
        BuildOutcome::Many(_) => panic!("expected a single handle"),
    };

    assert_eq!(handle.model_name, "gpt-4o");
    assert_eq!(handle.treatment_id, "1");
    assert_eq!(handle.treatment_name, "arm-1");
    assert_eq!(
        handle.template,
        vec![
            Message::system("You are assistant 1"),
            Message::user("hi"),
            Message::assistant("hello"),
        ]
    );

    let model = fake(&handle);
    assert_eq!(model.provider, "openai");
    assert_eq!(model.config.api_key(), Some("sk-provider"));
    assert_eq!(model.config.get("temperature"), Some(&json!(0.2)));
    assert!(model.config.get("max_tokens").is_none());
    assert_eq!(model.config.callbacks.len(), 1);
    let meta = model.config.metadata().unwrap();
    assert_eq!(meta["experiment_id"], "exp-1");
    assert_eq!(meta["treatment_id"], "1");
    assert_eq!(meta["session_id"], "session-1");

    assert_eq!(experiment.chosen_model().as_deref(), Some("gpt-4o"));
    assert_eq!(experiment.data().len(), 2);
}

#[test]
fn test_missing_provider_is_skipped() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let _build = fixture.mock_build(vec![
        anthropic_arm(1, "claude-3"),
        openai_arm(2, "gpt-4o"),
        google_arm(3, "gemini-pro"),
    ]);

    let outcome = experiment
        .build(&BuildRequest::new("exp-1").max_models(2))
        .unwrap()
        .unwrap();
    let handles = match outcome {
        BuildOutcome::Many(handles) => handles,
        BuildOutcome::Single(_) => panic!("expected a list"),
    };
    let names: Vec<_> = handles.iter().map(|h| h.model_name.as_str()).collect();
    assert_eq!(names, ["gpt-4o", "gemini-pro"]);
    assert!(!experiment
        .registry()
        .is_cached("anthropic", &intura_ai::types::SdkConfig::new("langchain_anthropic", "ChatAnthropic")));
}

#[test]
fn test_max_models_caps_results() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let _build = fixture.mock_build(vec![
        openai_arm(1, "gpt-4o"),
        openai_arm(2, "gpt-4o-mini"),
        google_arm(3, "gemini-pro"),
    ]);

    let outcome = experiment
        .build(&BuildRequest::new("exp-1").max_models(2))
        .unwrap()
        .unwrap();
    assert_eq!(outcome.len(), 2);
    assert_eq!(experiment.registry().cached_count(), 1);
}

#[test]
fn test_chosen_model_is_first_treatment() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let _build = fixture.mock_build(vec![anthropic_arm(1, "claude-3"), openai_arm(2, "gpt-4o")]);

    let handle = experiment
        .build(&BuildRequest::new("exp-1"))
        .unwrap()
        .unwrap()
        .into_single()
        .unwrap();
    assert_eq!(handle.model_name, "gpt-4o");
    assert_eq!(experiment.chosen_model().as_deref(), Some("claude-3"));
}

#[test]
fn test_every_provider_missing_yields_none() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let _build = fixture.mock_build(vec![anthropic_arm(1, "claude-3"), anthropic_arm(2, "claude-2")]);

    assert!(experiment.build(&BuildRequest::new("exp-1")).unwrap().is_none());
}

#[test]
fn test_invalid_messages_short_circuit() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let build = fixture
        .server
        .mock("POST", BUILD_PATH)
        .with_status(200)
        .expect(0)
        .create();

    let request = BuildRequest::new("exp-1").raw_messages(vec![
        json!({"role": "human", "content": "hi"}),
        json!({"role": "ai", "content": "x", "extra": 1}),
    ]);
    assert!(experiment.build(&request).unwrap().is_none());

    let only_ai = BuildRequest::new("exp-1").message(ConversationMessage::ai("hello"));
    assert!(experiment.build(&only_ai).unwrap().is_none());
    build.assert();
}

#[test]
fn test_empty_data_yields_none() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let _build = fixture.mock_build(vec![]);

    assert!(experiment.build(&BuildRequest::new("exp-1")).unwrap().is_none());
    assert!(experiment.data().is_empty());
}

#[test]
fn test_service_failure_yields_none() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let _build = fixture.mock_json("POST", BUILD_PATH, 500, &json!({"error": "down"}));

    assert!(experiment.build(&BuildRequest::new("exp-1")).unwrap().is_none());
}

#[test]
fn test_session_ids_are_fresh_per_build() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let _build = fixture
        .server
        .mock("POST", BUILD_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"data": [openai_arm(1, "gpt-4o"), google_arm(2, "gemini-pro")]}).to_string())
        .expect(2)
        .create();

    let request = BuildRequest::new("exp-1").max_models(2);
    let first = experiment.build(&request).unwrap().unwrap().into_vec();
    let second = experiment.build(&request).unwrap().unwrap().into_vec();

    // One session per build, shared by its handles.
    assert_eq!(session_of(&first[0]), session_of(&first[1]));
    assert_ne!(session_of(&first[0]), session_of(&second[0]));
}

#[test]
fn test_api_key_mapping() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let _build = fixture.mock_build(vec![openai_arm(1, "gpt-4o"), google_arm(2, "gemini-pro")]);

    let mapping = HashMap::from([("gemini-pro".to_string(), "g-key".to_string())]);
    let outcome = experiment
        .build(&BuildRequest::new("exp-1").max_models(2).api_key_mapping(mapping))
        .unwrap()
        .unwrap()
        .into_vec();

    // gpt-4o has no mapped key and is skipped.
    assert_eq!(outcome.len(), 1);
    assert_eq!(outcome[0].model_name, "gemini-pro");
    assert_eq!(fake(&outcome[0]).config.api_key(), Some("g-key"));
}

#[test]
fn test_additional_configs_win() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let _build = fixture.mock_build(vec![openai_arm(1, "gpt-4o")]);

    let request = BuildRequest::new("exp-1")
        .api_key("sk-provider")
        .additional_config("temperature", json!(0.9))
        .additional_config("streaming", json!(true));
    let handle = experiment.build(&request).unwrap().unwrap().into_single().unwrap();
    let config = &fake(&handle).config;
    assert_eq!(config.get("temperature"), Some(&json!(0.9)));
    assert_eq!(config.get("streaming"), Some(&json!(true)));
    assert_eq!(config.model_name(), Some("gpt-4o"));
}

#[test]
fn test_failing_constructor_and_missing_model_are_skipped() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let mut no_model = openai_arm(2, "unused");
    no_model["model_configuration"] = json!({"temperature": 0.5});
    let _build = fixture.mock_build(vec![
        treatment(1, "broken", "broken_sdk", "ChatBroken", "broken-1"),
        no_model,
        google_arm(3, "gemini-pro"),
    ]);

    let handle = experiment
        .build(&BuildRequest::new("exp-1"))
        .unwrap()
        .unwrap()
        .into_single()
        .unwrap();
    assert_eq!(handle.model_name, "gemini-pro");
}

#[test]
fn test_create_model_handle_reports_bad_message() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let arm: intura_ai::TreatmentConfiguration =
        serde_json::from_value(openai_arm(1, "gpt-4o")).unwrap();

    let request = BuildRequest::new("exp-1").raw_messages(vec![
        json!({"role": "human", "content": "hi"}),
        json!({"role": "ai", "content": "x", "extra": 1}),
    ]);
    let err = experiment
        .create_model_handle(&arm, &request, "session-1")
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    let text = err.to_string();
    assert!(text.contains("Message 1") && text.contains("'extra'"), "{text}");
}

#[test]
fn test_malformed_treatment_is_skipped() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let mut no_locator = openai_arm(1, "gpt-4o");
    no_locator.as_object_mut().unwrap().remove("sdk_config");
    let _build = fixture.mock_build(vec![no_locator, google_arm(2, "gemini-pro")]);

    let handle = experiment
        .build(&BuildRequest::new("exp-1"))
        .unwrap()
        .unwrap()
        .into_single()
        .unwrap();
    assert_eq!(handle.model_name, "gemini-pro");
    assert_eq!(handle.treatment_id, "2");
    assert_eq!(experiment.data().len(), 2);
    assert_eq!(experiment.chosen_model().as_deref(), Some("gpt-4o"));
}

#[test]
fn test_null_prompt_builds_empty_system_turn() {
    let mut fixture = MockServerFixture::new();
    let (experiment, _key) = experiment(&mut fixture);
    let mut arm = openai_arm(1, "gpt-4o");
    arm["prompt"] = serde_json::Value::Null;
    let _build = fixture.mock_build(vec![arm]);

    let handle = experiment
        .build(&BuildRequest::new("exp-1").message(ConversationMessage::human("hi")))
        .unwrap()
        .unwrap()
        .into_single()
        .unwrap();
    assert_eq!(handle.template, vec![Message::system(""), Message::user("hi")]);
}

#[test]
fn test_unreachable_service_during_build_is_transport_error() {
    let (base_url, server) = serve_key_check_once();
    let config = ClientConfig::new()
        .with_api_key(TEST_KEY)
        .with_base_url(base_url);
    let experiment = ChatModelExperiment::with_config(config, providers()).unwrap();
    server.join().unwrap();

    let err = experiment
        .build(&BuildRequest::new("exp-1"))
        .err()
        .expect("transport failure propagates");
    assert!(matches!(err, Error::Transport(_)), "{err}");
    assert!(experiment.data().is_empty());
    assert!(experiment.chosen_model().is_none());
}
