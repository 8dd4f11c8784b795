//! ResultAggregator - Fan-in of one logical request
//!
//! Holds one [`Answer`] per requested name, in requested order, and turns
//! them into the shape the caller asked for: a stream of per-capability
//! results, a single merged result, or a plain "all granted" flag.

use std::pin::Pin;

use futures::Stream;

use crate::core::CapabilityResult;
use crate::registry::Answer;

/// Boxed stream returned by the coordinator
pub type ResultStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Answers for one logical request
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    answers: Vec<Answer>,
}

impl ResultAggregator {
    pub(crate) fn new(answers: Vec<Answer>) -> Self {
        Self { answers }
    }

    /// Get the requested names, in order
    pub fn names(&self) -> Vec<String> {
        self.answers.iter().map(|a| a.name().to_string()).collect()
    }

    /// Get the number of requested names
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    /// Check if the request named nothing
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Get every result if all of them are already known
    pub fn try_results(&self) -> Option<Vec<CapabilityResult>> {
        self.answers.iter().map(Answer::try_result).collect()
    }

    /// Stream each result in requested order as it becomes available
    ///
    /// A capability whose slot closed without an answer is skipped.
    pub fn each(self) -> ResultStream<CapabilityResult> {
        let answers = self.answers;
        Box::pin(async_stream::stream! {
            for answer in answers {
                let name = answer.name().to_string();
                match answer.wait().await {
                    Ok(result) => yield result,
                    Err(e) => {
                        tracing::warn!(
                            capability = %name,
                            error = %e,
                            "Capability closed without an answer"
                        );
                    }
                }
            }
        })
    }

    /// Wait for every answer and return the ones that arrived, in order
    pub async fn settled(self) -> Vec<CapabilityResult> {
        let mut results = Vec::with_capacity(self.answers.len());
        for answer in self.answers {
            let name = answer.name().to_string();
            match answer.wait().await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!(
                        capability = %name,
                        error = %e,
                        "Capability closed without an answer"
                    );
                }
            }
        }
        results
    }

    /// Wait for every answer
    ///
    /// Returns `None` unless every requested capability was answered.
    pub async fn results(self) -> Option<Vec<CapabilityResult>> {
        let expected = self.answers.len();
        let results = self.settled().await;
        (results.len() == expected).then_some(results)
    }

    /// Wait for every answer and AND the grants
    pub async fn all_granted(self) -> Option<bool> {
        self.results()
            .await
            .map(|results| results.iter().all(|r| r.granted))
    }

    /// Wait for every answer and merge them into one result
    ///
    /// The merged name joins the requested names with `", "`.
    pub async fn combined(self) -> Option<CapabilityResult> {
        self.results()
            .await
            .map(|results| CapabilityResult::combine(&results))
    }
}
