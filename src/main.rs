use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use grant_coordinator::{
    logging, AnchorRuntime, AuthorityEvent, CapabilityAuthority, CoordinatorConfig, EventSender,
    PromptRequest, RequestCoordinator,
};

/// Answers every prompt at once through the event channel
struct AutoAuthority {
    allowed: HashSet<String>,
    events: EventSender,
}

impl CapabilityAuthority for AutoAuthority {
    fn is_granted(&self, _name: &str) -> bool {
        false
    }

    fn is_revoked_by_policy(&self, _name: &str) -> bool {
        false
    }

    fn should_show_rationale(&self, name: &str) -> bool {
        !self.allowed.contains(name)
    }

    fn prompt(&self, request: PromptRequest) {
        let granted = request
            .names
            .iter()
            .map(|name| self.allowed.contains(name))
            .collect();
        let event = AuthorityEvent::delivered(request.request_code, request.names, granted);
        if let Err(e) = self.events.try_send(event) {
            tracing::error!(error = %e, "Failed to deliver prompt answer");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::var("GRANT_COORDINATOR_CONFIG") {
        Ok(path) => CoordinatorConfig::from_file(path)?,
        Err(_) => CoordinatorConfig::default(),
    }
    .with_env_overrides()?;

    // Keep the guard alive so file output is flushed on exit
    let _guard = logging::init_logging(&config.logging)?;

    // Names prefixed with '!' are denied by the demo host
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        anyhow::bail!(
            "usage: grant-coordinator <CAPABILITY>... (prefix a name with '!' to deny it)"
        );
    }
    let allowed: HashSet<String> = args.iter().filter(|a| !a.starts_with('!')).cloned().collect();
    let names: Vec<String> = args
        .iter()
        .map(|a| a.trim_start_matches('!').to_string())
        .collect();

    let runtime = AnchorRuntime::with_config(config.clone());
    let (anchor, events) = runtime.spawn().await;
    anchor.attach(Arc::new(AutoAuthority { allowed, events }))?;

    tracing::info!(anchor_id = %anchor.id(), capabilities = ?names, "Requesting capabilities");

    let coordinator = RequestCoordinator::with_config(anchor, &config);
    let mut results = coordinator.request_each(names)?;
    while let Some(result) = results.next().await {
        println!("{}", result);
    }

    runtime.destroy_all().await;
    Ok(())
}
