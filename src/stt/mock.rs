//! Scripted provider for tests, benchmarks and dry runs.
//!
//! Replies are keyed by segment index, parsed from the upload file name
//! (`segment-007.wav` is segment 7). Each segment has a queue of steps; every
//! call pops one, and the last step is repeated once the queue runs dry, so
//! "fail once, then succeed" is just two steps.

use crate::error::ProviderError;
use crate::stt::provider::{ProviderTranscript, SpeechProvider, TranscriptionOptions};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// One scripted provider reaction.
#[derive(Debug, Clone, PartialEq)]
pub enum MockStep {
    Reply(ProviderTranscript),
    Fail(ProviderError),
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub segment: Option<usize>,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: usize,
    pub options: TranscriptionOptions,
}

#[derive(Debug)]
pub struct MockProvider {
    name: String,
    default: MockStep,
    steps: Mutex<HashMap<usize, VecDeque<MockStep>>>,
    delays: HashMap<usize, Duration>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockProvider {
    /// Provider that answers every call with `"mock transcription"`.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            default: MockStep::Reply(ProviderTranscript::new("mock transcription")),
            steps: Mutex::new(HashMap::new()),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Reaction for segments without a scripted step.
    pub fn with_default(mut self, transcript: ProviderTranscript) -> Self {
        self.default = MockStep::Reply(transcript);
        self
    }

    pub fn with_default_failure(mut self, error: ProviderError) -> Self {
        self.default = MockStep::Fail(error);
        self
    }

    /// Queue a successful reply for `segment`.
    pub fn with_reply(self, segment: usize, transcript: ProviderTranscript) -> Self {
        self.push(segment, MockStep::Reply(transcript))
    }

    /// Queue a failure for `segment`.
    pub fn with_failure(self, segment: usize, error: ProviderError) -> Self {
        self.push(segment, MockStep::Fail(error))
    }

    /// Delay every reply for `segment`, to simulate slow responses.
    pub fn with_delay(mut self, segment: usize, delay: Duration) -> Self {
        self.delays.insert(segment, delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock_calls().clone()
    }

    /// Segment indices in the order the calls were issued.
    pub fn called_segments(&self) -> Vec<Option<usize>> {
        self.lock_calls().iter().map(|c| c.segment).collect()
    }

    fn push(self, segment: usize, step: MockStep) -> Self {
        self.steps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(segment)
            .or_default()
            .push_back(step);
        self
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<MockCall>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_step(&self, segment: Option<usize>) -> MockStep {
        let mut steps = self
            .steps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let queue = segment.and_then(|index| steps.get_mut(&index));
        match queue {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| self.default.clone()),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| self.default.clone()),
            None => self.default.clone(),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract `7` from `segment-007.wav`.
pub fn segment_index(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix("segment-")?
        .split('.')
        .next()?
        .parse()
        .ok()
}

#[async_trait]
impl SpeechProvider for MockProvider {
    async fn transcribe(
        &self,
        audio: &[u8],
        file_name: &str,
        mime_type: &str,
        options: &TranscriptionOptions,
    ) -> Result<ProviderTranscript, ProviderError> {
        let segment = segment_index(file_name);
        self.lock_calls().push(MockCall {
            segment,
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            bytes: audio.len(),
            options: options.clone(),
        });

        let step = self.next_step(segment);
        if let Some(delay) = segment.and_then(|index| self.delays.get(&index)) {
            tokio::time::sleep(*delay).await;
        }

        match step {
            MockStep::Reply(transcript) => Ok(transcript),
            MockStep::Fail(error) => Err(error),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
