use crate::types::{CompletionRequest, ComplexityLevel, RequestPriority, TaskType};

/// Per-request routing context derived from the request itself.
#[derive(Clone, Copy, Debug)]
pub struct RoutingContext {
    pub task_type: TaskType,
    pub complexity: ComplexityLevel,
    pub priority: RequestPriority,
    pub requires_streaming: bool,
    pub requires_function_calling: bool,
    /// Rough prompt size estimate (chars / 4).
    pub estimated_tokens: u32,
}

impl RoutingContext {
    pub fn from_request(request: &CompletionRequest, streaming: bool) -> Self {
        Self {
            task_type: infer_task_type(request),
            complexity: estimate_complexity(request),
            priority: request.priority,
            requires_streaming: streaming,
            requires_function_calling: !request.functions.is_empty(),
            estimated_tokens: (request.total_chars() / 4) as u32,
        }
    }
}

/// Keyword detection on the last user message.
fn infer_task_type(request: &CompletionRequest) -> TaskType {
    let Some(message) = request.last_user_message() else {
        return TaskType::General;
    };
    let lowered = message.to_lowercase();
    if lowered.contains("plan") || lowered.contains("steps") {
        TaskType::Planning
    } else if lowered.contains("code") || lowered.contains("implement") {
        TaskType::CodeGeneration
    } else if lowered.contains("extract") || lowered.contains("scrape") {
        TaskType::Extraction
    } else if lowered.contains("heal") || lowered.contains("fix") {
        TaskType::Healing
    } else {
        TaskType::General
    }
}

fn estimate_complexity(request: &CompletionRequest) -> ComplexityLevel {
    match request.total_chars() {
        0..=500 => ComplexityLevel::Low,
        501..=2_000 => ComplexityLevel::Medium,
        2_001..=8_000 => ComplexityLevel::High,
        _ => ComplexityLevel::Expert,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    fn request_with(text: &str) -> CompletionRequest {
        CompletionRequest::new(vec![ChatMessage::user(text)])
    }

    #[test]
    fn task_type_keywords() {
        assert_eq!(
            RoutingContext::from_request(&request_with("plan the login steps"), false).task_type,
            TaskType::Planning
        );
        assert_eq!(
            RoutingContext::from_request(&request_with("implement a parser"), false).task_type,
            TaskType::CodeGeneration
        );
        assert_eq!(
            RoutingContext::from_request(&request_with("extract all prices"), false).task_type,
            TaskType::Extraction
        );
        assert_eq!(
            RoutingContext::from_request(&request_with("heal this selector"), false).task_type,
            TaskType::Healing
        );
        assert_eq!(
            RoutingContext::from_request(&request_with("hello there"), false).task_type,
            TaskType::General
        );
    }

    #[test]
    fn complexity_scales_with_size() {
        assert_eq!(
            RoutingContext::from_request(&request_with("short"), false).complexity,
            ComplexityLevel::Low
        );
        let long = "x".repeat(9_000);
        assert_eq!(
            RoutingContext::from_request(&request_with(&long), false).complexity,
            ComplexityLevel::Expert
        );
    }

    #[test]
    fn function_requirements_follow_declared_schemas() {
        let mut request = request_with("do something");
        request.functions.push(serde_json::json!({"name": "f"}));
        let ctx = RoutingContext::from_request(&request, true);
        assert!(ctx.requires_function_calling);
        assert!(ctx.requires_streaming);
    }
}
