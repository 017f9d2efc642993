//! Integration tests exercising the Expect Loop end-to-end against the
//! in-memory scripted `Transport`.

use std::sync::Arc;

use cliexpect::actions::ActionRegistry;
use cliexpect::cache::NullCache;
use cliexpect::device::{path, where_am_i, Device, Location};
use cliexpect::driver::{Driver, Registry};
use cliexpect::error::SessionError;
use cliexpect::plugin::ResolverChain;
use cliexpect::test_support::{Script, ScriptedTransport};
use cliexpect::transport::Connector;

struct StaticConnector(Option<ScriptedTransport>);

impl Connector<ScriptedTransport> for StaticConnector {
    async fn connect(&mut self, _command: &str) -> Result<ScriptedTransport, SessionError> {
        Ok(self.0.take().expect("connector used only once in these tests"))
    }
}

fn registry_with(name: &str, driver: Arc<Driver>) -> Registry {
    let registry = Registry::new();
    let mut map = std::collections::HashMap::new();
    map.insert(name.to_string(), driver);
    registry.install(map);
    registry
}

fn telnet_driver() -> Arc<Driver> {
    Arc::new(
        Driver::new("telnet")
            .with_event("username_prompt", "Username: $", Some("send_username"), "GROUND", "")
            .with_event("password_prompt", "password: $", Some("send_password"), "GROUND", "")
            .with_event("shell_prompt", r"router> $", None, "*", "ENABLE")
            .with_event("paging", r" -- More -- \r\n", None, "*", ""),
    )
}

#[tokio::test]
async fn paging_without_final_prompt_times_out() {
    let registry = registry_with("telnet", telnet_driver());
    let actions: ActionRegistry<ScriptedTransport> = ActionRegistry::new();
    let mut device = Device::new("telnet://u:p@router/telnet", &registry, &actions).unwrap();

    let transport = ScriptedTransport::new(vec![
        Script::Say("Username: "),
        Script::Say("password: "),
        Script::Say("router> "),
        Script::Say("line1\r\n -- More -- \r\nline2\r\n -- More -- \r\n"),
    ]);
    let mut connector = StaticConnector(Some(transport));
    let resolvers: ResolverChain<ScriptedTransport> = ResolverChain::new();

    let err = device
        .send(&mut connector, &resolvers, &NullCache, "show version")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ConnectionTimedOut { .. }));
    assert!(!device.is_connected());
}

fn discovery_driver() -> Arc<Driver> {
    let mut driver = Driver::new("discovery").with_transition("prompt-match", None, "GROUND", "ENABLE");
    driver.discover_prompt = Some(true);
    Arc::new(driver)
}

#[tokio::test]
async fn prompt_discovery_confirms_and_reuses_prompt() {
    let registry = registry_with("discovery", discovery_driver());
    let actions: ActionRegistry<ScriptedTransport> = ActionRegistry::new();
    let mut device = Device::new("ssh://admin@box/discovery", &registry, &actions).unwrap();

    // Round 1 has no tentative prompt installed yet, so `expect` is called
    // with an empty pattern list and drains the whole queued response before
    // timing out; round 2 matches the tentative prompt literally against
    // whatever is left in the transport's buffer (not re-queued).
    let transport = ScriptedTransport::new(vec![Script::Say("\r\nfoo# ")]);
    let mut connector = StaticConnector(Some(transport));
    let resolvers: ResolverChain<ScriptedTransport> = ResolverChain::new();

    device.login(&mut connector, &resolvers, &NullCache).await.unwrap();

    assert!(device.is_connected());
    let prompt = device.prompt.get("GROUND").expect("prompt discovered for GROUND");
    assert!(prompt.is_final());
    assert_eq!(prompt.value, "foo# ");
}

fn fixed_prompt_driver() -> Arc<Driver> {
    let mut driver = Driver::new("fixed").with_transition("prompt-match", None, "GROUND", "ENABLE");
    driver.prompt_pattern = Some(r"box# $".to_string());
    Arc::new(driver)
}

#[tokio::test]
async fn login_uses_fixed_prompt_pattern_without_discovery() {
    let registry = registry_with("fixed", fixed_prompt_driver());
    let actions: ActionRegistry<ScriptedTransport> = ActionRegistry::new();
    let mut device = Device::new("ssh://admin@box/fixed", &registry, &actions).unwrap();

    // A driver-declared `promptPattern` should be matched directly, with no
    // empty-line round-trip ever sent (unlike `discover_prompt`'s round).
    let transport = ScriptedTransport::new(vec![Script::Say("box# ")]);
    let mut connector = StaticConnector(Some(transport));
    let resolvers: ResolverChain<ScriptedTransport> = ResolverChain::new();

    device.login(&mut connector, &resolvers, &NullCache).await.unwrap();

    assert!(device.is_connected());
    let prompt = device.prompt.get("GROUND").expect("fixed prompt installed for GROUND");
    assert!(prompt.is_final());
    assert_eq!(prompt.value, "box# $");
}

fn regexp_hint_driver() -> Arc<Driver> {
    let mut driver = Driver::new("regexp-hint").with_transition("prompt-match", None, "GROUND", "ENABLE");
    driver.discover_prompt = Some(true);
    driver.prompt_regexp = Some(r"box# $".to_string());
    Arc::new(driver)
}

#[tokio::test]
async fn prompt_regexp_hint_derives_tentative_from_matched_region() {
    let registry = registry_with("regexp-hint", regexp_hint_driver());
    let actions: ActionRegistry<ScriptedTransport> = ActionRegistry::new();
    let mut device = Device::new("ssh://admin@box/regexp-hint", &registry, &actions).unwrap();

    // A banner precedes the first prompt. Unless the driver's promptRegexp
    // hint is actually installed as a live pattern, discovery can only fall
    // back to deriving the tentative prompt from the banner's before-text
    // instead of the matched region.
    let transport = ScriptedTransport::new(vec![
        Script::Say("Welcome to box\r\nbox# "),
        Script::Say("\r\nbox# "),
    ]);
    let mut connector = StaticConnector(Some(transport));
    let resolvers: ResolverChain<ScriptedTransport> = ResolverChain::new();

    device.login(&mut connector, &resolvers, &NullCache).await.unwrap();

    assert!(device.is_connected());
    let prompt = device.prompt.get("GROUND").expect("prompt discovered for GROUND");
    assert!(prompt.is_final());
    assert_eq!(prompt.value, "box# ");
}

fn complete_check_driver() -> Arc<Driver> {
    let mut driver = Driver::new("complete")
        .with_event("shell_prompt", r"box# $", None, "*", "ENABLE");
    driver.check_if_output_complete = Some(true);
    Arc::new(driver)
}

#[tokio::test]
async fn check_if_output_complete_does_not_duplicate_text() {
    let registry = registry_with("complete", complete_check_driver());
    let actions: ActionRegistry<ScriptedTransport> = ActionRegistry::new();
    let mut device = Device::new("ssh://admin@box/complete", &registry, &actions).unwrap();

    let transport = ScriptedTransport::new(vec![
        Script::Say("box# "),
        Script::Say("result line\r\nbox# "),
    ]);
    let mut connector = StaticConnector(Some(transport));
    let resolvers: ResolverChain<ScriptedTransport> = ResolverChain::new();

    let out = device
        .send(&mut connector, &resolvers, &NullCache, "do-thing")
        .await
        .unwrap();

    assert_eq!(out.matches("result line").count(), 1);
}

fn hop_driver() -> Arc<Driver> {
    Arc::new(Driver::new("hop").with_event("shell_prompt", r"\$ $", None, "*", "ENABLE"))
}

#[tokio::test]
async fn hop_chain_relays_through_a_single_open_transport() {
    let registry = registry_with("hop", hop_driver());
    let actions: ActionRegistry<ScriptedTransport> = ActionRegistry::new();

    let jump = Device::new("ssh://u@jump/hop", &registry, &actions).unwrap();
    let target = Device::new("ssh://u@target/hop", &registry, &actions).unwrap();
    let mut target = path(vec![jump, target]);

    let transport = ScriptedTransport::new(vec![
        Script::Say("jump$ "),
        Script::Say("target$ "),
        Script::Say("target\r\ntarget$ "),
    ]);
    let mut connector = StaticConnector(Some(transport));
    let resolvers: ResolverChain<ScriptedTransport> = ResolverChain::new();

    let out = target
        .send(&mut connector, &resolvers, &NullCache, "hostname")
        .await
        .unwrap();
    assert!(out.contains("target"));

    match where_am_i(&target) {
        Location::Device(d) => assert_eq!(d.name, "target"),
        Location::SourceHost => panic!("target should be connected"),
    }
}
