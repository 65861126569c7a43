//! Adapts async-openai chat completion chunks into [`StreamEvent`]s.

use futures_util::StreamExt;

use async_openai::types::chat::{ChatCompletionResponseStream, FinishReason};

use relay_core::llm::provider::EventStream;
use relay_types::llm::{LlmError, StopReason, StreamEvent};

/// `Connected` first, `Done` last, and in between whatever each chunk's
/// choices carry. A transport error ends the stream with `LlmError::Stream`.
pub fn map_openai_stream(mut chunks: ChatCompletionResponseStream) -> EventStream {
    Box::pin(async_stream::try_stream! {
        yield StreamEvent::Connected;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| LlmError::Stream(e.to_string()))?;
            for choice in chunk.choices {
                for event in choice_events(choice.delta.content, choice.finish_reason) {
                    yield event;
                }
            }
        }

        yield StreamEvent::Done;
    })
}

/// Events for one streamed choice. Empty content is dropped.
fn choice_events(content: Option<String>, finish: Option<FinishReason>) -> Vec<StreamEvent> {
    let text = content
        .filter(|t| !t.is_empty())
        .map(|text| StreamEvent::TextDelta { text });
    let stop = finish.map(|reason| StreamEvent::MessageDelta {
        stop_reason: stop_reason_for(&reason),
    });
    text.into_iter().chain(stop).collect()
}

pub(crate) fn stop_reason_for(finish_reason: &FinishReason) -> StopReason {
    match finish_reason {
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ContentFilter => StopReason::ContentFilter,
        FinishReason::Stop | FinishReason::ToolCalls | FinishReason::FunctionCall => {
            StopReason::EndTurn
        }
    }
}
