use super::*;

#[test]
fn accept_trims_answer() {
    assert_eq!(accept_interpretation("  A circle and a square.\n").unwrap(), "A circle and a square.");
}

#[test]
fn accept_rejects_empty() {
    assert!(matches!(accept_interpretation("   "), Err(LlmError::EmptyResponse(_))));
}

#[test]
fn accept_rejects_short_answers() {
    assert!(matches!(accept_interpretation("too short"), Err(LlmError::EmptyResponse(_))));
    assert!(accept_interpretation("exactly10!").is_ok());
}

#[test]
fn client_builds_from_config() {
    let cfg = config::LlmConfig::from_lookup(|key| (key == "OPENAI_API_KEY").then(|| "k".to_string())).unwrap();
    let client = LlmClient::from_config(cfg).unwrap();
    assert_eq!(client.model(), "gpt-4o");
}

#[test]
fn prompts_steer_format_choice() {
    assert!(INTERPRET_PROMPT.contains("Mermaid"));
    assert!(INTERPRET_PROMPT.contains("LaTeX"));
    assert!(SYSTEM_PROMPT.contains("actually see"));
}
