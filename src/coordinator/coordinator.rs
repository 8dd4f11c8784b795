//! RequestCoordinator - Caller-facing capability requests
//!
//! Splits each requested set into names the host already answers, names that
//! are already pending, and names that need a new prompt, then hands back a
//! [`ResultAggregator`] over all of them. Trigger-gated variants rerun that
//! split every time the trigger fires.

use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use std::future::Future;

use crate::config::{CoordinatorConfig, TRIGGER_BUFFER};
use crate::core::{CapabilityResult, CoordinatorError, CoordinatorResult};
use crate::runtime::LifecycleAnchor;

use super::aggregator::{ResultAggregator, ResultStream};

/// Issues capability requests against a lifecycle anchor
///
/// Cheap to clone; clones share the anchor.
///
/// # Example
///
/// ```ignore
/// let anchor = LifecycleAnchor::new();
/// anchor.attach(Arc::new(MyAuthority::new()))?;
///
/// let coordinator = RequestCoordinator::new(anchor);
/// if coordinator.request_combined(["CAMERA", "MIC"]).await? {
///     start_recording();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequestCoordinator {
    anchor: LifecycleAnchor,
    trigger_buffer: usize,
}

impl RequestCoordinator {
    /// Create a coordinator with default settings
    pub fn new(anchor: LifecycleAnchor) -> Self {
        Self {
            anchor,
            trigger_buffer: TRIGGER_BUFFER,
        }
    }

    /// Create a coordinator from configuration
    pub fn with_config(anchor: LifecycleAnchor, config: &CoordinatorConfig) -> Self {
        Self {
            anchor,
            trigger_buffer: config.trigger_buffer.max(1),
        }
    }

    /// Get the anchor this coordinator requests against
    pub fn anchor(&self) -> &LifecycleAnchor {
        &self.anchor
    }

    // ===== One-shot Requests =====

    /// Request a set of capabilities
    ///
    /// Names the host already grants or has revoked are answered at once.
    /// Names already pending join the existing request. All other names go
    /// out in a single prompt. Fails with `EmptyRequest` for an empty set.
    pub fn request<I, S>(&self, names: I) -> CoordinatorResult<ResultAggregator>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = collect_names(names)?;
        self.request_names(&names)
    }

    fn request_names(&self, names: &[String]) -> CoordinatorResult<ResultAggregator> {
        let answers = self.anchor.request(names)?;
        Ok(ResultAggregator::new(answers))
    }

    /// Request a set of capabilities and report whether all were granted
    pub async fn request_combined<I, S>(&self, names: I) -> CoordinatorResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request(names)?
            .all_granted()
            .await
            .ok_or(CoordinatorError::ChannelClosed)
    }

    /// Request a set of capabilities and stream each result in order
    pub fn request_each<I, S>(&self, names: I) -> CoordinatorResult<ResultStream<CapabilityResult>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.request(names)?.each())
    }

    /// Request a set of capabilities and merge the results into one
    pub async fn request_each_combined<I, S>(&self, names: I) -> CoordinatorResult<CapabilityResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request(names)?
            .combined()
            .await
            .ok_or(CoordinatorError::ChannelClosed)
    }

    // ===== Trigger-gated Requests =====

    /// Request on every trigger firing and report whether all were granted
    ///
    /// The stream ends when the trigger ends. A firing that can't be
    /// registered (no host, destroyed anchor) yields an error item.
    pub fn ensure<T, I, S>(
        &self,
        trigger: T,
        names: I,
    ) -> CoordinatorResult<ResultStream<CoordinatorResult<bool>>>
    where
        T: Stream + Send + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = collect_names(names)?;
        Ok(self.gate(trigger, names, ResultAggregator::all_granted))
    }

    /// Request on every trigger firing and stream each result
    ///
    /// The results of one firing are emitted together, in requested order.
    pub fn ensure_each<T, I, S>(
        &self,
        trigger: T,
        names: I,
    ) -> CoordinatorResult<ResultStream<CoordinatorResult<CapabilityResult>>>
    where
        T: Stream + Send + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = collect_names(names)?;
        let batches = self.gate(trigger, names, |aggregator| {
            aggregator.settled().map(Some)
        });

        Ok(Box::pin(batches.flat_map(|batch| {
            let items: Vec<CoordinatorResult<CapabilityResult>> = match batch {
                Ok(results) => results.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            futures::stream::iter(items)
        })))
    }

    /// Request on every trigger firing and emit one merged result per firing
    pub fn ensure_each_combined<T, I, S>(
        &self,
        trigger: T,
        names: I,
    ) -> CoordinatorResult<ResultStream<CoordinatorResult<CapabilityResult>>>
    where
        T: Stream + Send + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = collect_names(names)?;
        Ok(self.gate(trigger, names, ResultAggregator::combined))
    }

    /// Register `names` each time `trigger` fires and shape the answers
    ///
    /// Registration happens as soon as the firing is pulled, not after the
    /// previous firing resolved, so a firing while a name is still pending
    /// joins the pending entry. Up to `trigger_buffer` firings may be
    /// outstanding; their outputs keep firing order.
    fn gate<T, F, Fut, O>(
        &self,
        trigger: T,
        names: Vec<String>,
        shape: F,
    ) -> ResultStream<CoordinatorResult<O>>
    where
        T: Stream + Send + 'static,
        F: Fn(ResultAggregator) -> Fut + Send + 'static,
        Fut: Future<Output = Option<O>> + Send + 'static,
        O: Send + 'static,
    {
        let coordinator = self.clone();
        let buffer = self.trigger_buffer;

        let answers = trigger
            .map(move |_| {
                tracing::debug!(capabilities = ?names, "Trigger fired");
                coordinator.request_names(&names)
            })
            .map(move |registered| -> BoxFuture<'static, Option<CoordinatorResult<O>>> {
                match registered {
                    Ok(aggregator) => shape(aggregator).map(|shaped| shaped.map(Ok)).boxed(),
                    Err(e) => futures::future::ready(Some(Err(e))).boxed(),
                }
            })
            .buffered(buffer)
            .filter_map(futures::future::ready);

        Box::pin(answers)
    }

    // ===== Queries =====

    /// Check if the host currently grants a capability
    pub fn is_granted(&self, name: &str) -> CoordinatorResult<bool> {
        Ok(self.anchor.authority()?.is_granted(name))
    }

    /// Check if a policy has revoked a capability
    pub fn is_revoked(&self, name: &str) -> CoordinatorResult<bool> {
        Ok(self.anchor.authority()?.is_revoked_by_policy(name))
    }

    /// Check whether a justification should be shown before requesting
    ///
    /// False as soon as one name is neither granted nor eligible for a
    /// rationale, otherwise true.
    pub fn should_show_rationale<I, S>(&self, names: I) -> CoordinatorResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = collect_names(names)?;
        let authority = self.anchor.authority()?;
        Ok(names
            .iter()
            .all(|name| authority.is_granted(name) || authority.should_show_rationale(name)))
    }
}

fn collect_names<I, S>(names: I) -> CoordinatorResult<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    if names.is_empty() {
        return Err(CoordinatorError::EmptyRequest);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::CapabilityAuthority;
    use crate::core::PromptRequest;
    use futures::channel::mpsc;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeAuthority {
        granted: HashSet<String>,
        rationale: HashSet<String>,
        prompts: Mutex<Vec<PromptRequest>>,
    }

    impl FakeAuthority {
        fn granting(names: &[&str]) -> Self {
            Self {
                granted: names.iter().map(|n| n.to_string()).collect(),
                ..Default::default()
            }
        }

        fn prompts(&self) -> Vec<PromptRequest> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl CapabilityAuthority for FakeAuthority {
        fn is_granted(&self, name: &str) -> bool {
            self.granted.contains(name)
        }

        fn is_revoked_by_policy(&self, _name: &str) -> bool {
            false
        }

        fn should_show_rationale(&self, name: &str) -> bool {
            self.rationale.contains(name)
        }

        fn prompt(&self, request: PromptRequest) {
            self.prompts.lock().unwrap().push(request);
        }
    }

    fn setup(authority: FakeAuthority) -> (RequestCoordinator, Arc<FakeAuthority>) {
        let anchor = LifecycleAnchor::new();
        let authority = Arc::new(authority);
        anchor.attach(authority.clone()).unwrap();
        (RequestCoordinator::new(anchor), authority)
    }

    #[test]
    fn test_empty_request_fails() {
        let (coordinator, authority) = setup(FakeAuthority::default());

        let err = coordinator.request(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, CoordinatorError::EmptyRequest));
        assert!(matches!(
            coordinator.ensure(futures::stream::empty::<()>(), Vec::<String>::new()),
            Err(CoordinatorError::EmptyRequest)
        ));
        assert!(authority.prompts().is_empty());
        assert_eq!(coordinator.anchor().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_granted_names_skip_prompt() {
        let (coordinator, authority) = setup(FakeAuthority::granting(&["CAMERA"]));

        assert!(coordinator.request_combined(["CAMERA"]).await.unwrap());
        assert!(authority.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_request_each_combined() {
        let (coordinator, authority) = setup(FakeAuthority::granting(&["CAMERA"]));

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.request_each_combined(["CAMERA", "MIC"]).await })
        };

        tokio::time::timeout(Duration::from_secs(1), async {
            while authority.prompts().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let prompt = authority.prompts()[0].clone();
        assert_eq!(prompt.names, vec!["MIC".to_string()]);
        coordinator
            .anchor()
            .on_result(prompt.request_code, prompt.names, vec![false])
            .unwrap();

        let combined = task.await.unwrap().unwrap();
        assert_eq!(combined, CapabilityResult::new("CAMERA, MIC", false, false));
    }

    #[tokio::test]
    async fn test_request_each_streams_in_order() {
        let (coordinator, authority) = setup(FakeAuthority::default());

        let stream = coordinator.request_each(["A", "B"]).unwrap();
        let code = authority.prompts()[0].request_code;
        coordinator
            .anchor()
            .on_result(code, vec!["B".into(), "A".into()], vec![true, false])
            .unwrap();

        let results: Vec<_> = stream.collect().await;
        assert_eq!(
            results,
            vec![CapabilityResult::denied("A"), CapabilityResult::granted("B")]
        );
    }

    #[tokio::test]
    async fn test_ensure_runs_per_firing_and_ends_with_trigger() {
        let (coordinator, authority) = setup(FakeAuthority::granting(&["CAMERA"]));
        let (fire, rx) = mpsc::unbounded();

        let mut stream = coordinator.ensure(rx, ["CAMERA"]).unwrap();

        // Nothing until the trigger fires
        let idle = tokio::time::timeout(Duration::from_millis(10), stream.next()).await;
        assert!(idle.is_err());

        fire.unbounded_send(()).unwrap();
        assert!(stream.next().await.unwrap().unwrap());
        fire.unbounded_send(()).unwrap();
        assert!(stream.next().await.unwrap().unwrap());

        drop(fire);
        assert!(stream.next().await.is_none());
        assert!(authority.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_registers_at_firing_time() {
        let (coordinator, authority) = setup(FakeAuthority::default());
        let (fire, rx) = mpsc::unbounded();
        let mut stream = coordinator.ensure_each(rx, ["MIC"]).unwrap();

        fire.unbounded_send(()).unwrap();
        fire.unbounded_send(()).unwrap();

        // Both firings register while the first is still unanswered
        let idle = tokio::time::timeout(Duration::from_millis(10), stream.next()).await;
        assert!(idle.is_err());
        assert_eq!(authority.prompts().len(), 1);

        let prompt = authority.prompts()[0].clone();
        coordinator
            .anchor()
            .on_result(prompt.request_code, prompt.names, vec![true])
            .unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), CapabilityResult::granted("MIC"));
        assert_eq!(stream.next().await.unwrap().unwrap(), CapabilityResult::granted("MIC"));
    }

    #[tokio::test]
    async fn test_ensure_yields_error_without_host() {
        let (coordinator, _authority) = setup(FakeAuthority::default());
        coordinator.anchor().detach();

        let mut stream = coordinator
            .ensure_each_combined(futures::stream::iter([()]), ["MIC"])
            .unwrap();
        assert!(matches!(
            stream.next().await,
            Some(Err(CoordinatorError::HostDetached))
        ));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_should_show_rationale() {
        let authority = FakeAuthority {
            granted: ["CAMERA".to_string()].into_iter().collect(),
            rationale: ["MIC".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let (coordinator, _) = setup(authority);

        assert!(coordinator.should_show_rationale(["CAMERA", "MIC"]).unwrap());
        assert!(!coordinator.should_show_rationale(["MIC", "SMS"]).unwrap());
        assert!(matches!(
            coordinator.should_show_rationale(Vec::<String>::new()),
            Err(CoordinatorError::EmptyRequest)
        ));
    }

    #[test]
    fn test_queries_require_host() {
        let (coordinator, _) = setup(FakeAuthority::granting(&["CAMERA"]));
        assert!(coordinator.is_granted("CAMERA").unwrap());
        assert!(!coordinator.is_revoked("CAMERA").unwrap());

        coordinator.anchor().detach();
        assert!(matches!(
            coordinator.is_granted("CAMERA"),
            Err(CoordinatorError::HostDetached)
        ));
    }
}
