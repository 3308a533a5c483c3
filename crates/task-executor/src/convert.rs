use webrunner_core_types::{CorrelationId, TaskId, ToolCall};

use crate::errors::TaskError;
use crate::model::{ActionType, AgentStep};

/// Deterministic AgentStep -> ToolCall mapping.
///
/// | action          | tool                    | params                  |
/// |-----------------|-------------------------|-------------------------|
/// | Navigate        | `navigate`              | url                     |
/// | Click           | `click`                 | selector                |
/// | Type            | `type`                  | selector, text          |
/// | Select          | `select_option`         | selector, value         |
/// | WaitForElement  | `wait_for_element`      | selector, timeout_ms    |
/// | Screenshot      | `take_screenshot`       | -                       |
/// | ExtractText     | `get_text`              | selector                |
/// | Verify          | `verify_element_exists` | selector                |
pub fn step_to_tool_call(
    step: &AgentStep,
    task_id: &TaskId,
    correlation_id: &CorrelationId,
) -> Result<ToolCall, TaskError> {
    let missing = |field: &str| TaskError::StepConversion {
        step_number: step.step_number,
        reason: format!("{:?} requires a {field}", step.action.action_type),
    };

    let target = || step.action.target.clone().ok_or_else(|| missing("target"));
    let value = || step.action.value.clone().ok_or_else(|| missing("value"));

    let mut call = match step.action.action_type {
        ActionType::Navigate => ToolCall::new("navigate").with_param("url", target()?),
        ActionType::Click => ToolCall::new("click").with_param("selector", target()?),
        ActionType::Type => ToolCall::new("type")
            .with_param("selector", target()?)
            .with_param("text", value()?),
        ActionType::Select => ToolCall::new("select_option")
            .with_param("selector", target()?)
            .with_param("value", value()?),
        ActionType::WaitForElement => ToolCall::new("wait_for_element")
            .with_param("selector", target()?)
            .with_param("timeout_ms", step.action.timeout_ms.unwrap_or(10_000)),
        ActionType::Screenshot => ToolCall::new("take_screenshot"),
        ActionType::ExtractText => ToolCall::new("get_text").with_param("selector", target()?),
        ActionType::Verify => {
            ToolCall::new("verify_element_exists").with_param("selector", target()?)
        }
    };

    call = call
        .with_task_id(task_id.clone())
        .with_correlation_id(correlation_id.clone());
    if let Some(reasoning) = &step.reasoning {
        call = call.with_reasoning(reasoning.clone());
    }
    Ok(call)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StepAction;

    fn ids() -> (TaskId, CorrelationId) {
        (TaskId::new(), CorrelationId::from_value("corr"))
    }

    #[test]
    fn navigate_maps_url() {
        let (task_id, corr) = ids();
        let step = AgentStep::new(1, StepAction::navigate("https://example.com"));
        let call = step_to_tool_call(&step, &task_id, &corr).unwrap();
        assert_eq!(call.tool, "navigate");
        assert_eq!(call.param_str("url"), Some("https://example.com"));
        assert_eq!(call.correlation_id, corr);
    }

    #[test]
    fn type_maps_selector_and_text() {
        let (task_id, corr) = ids();
        let step = AgentStep::new(2, StepAction::type_text("#q", "rust"));
        let call = step_to_tool_call(&step, &task_id, &corr).unwrap();
        assert_eq!(call.tool, "type");
        assert_eq!(call.param_str("selector"), Some("#q"));
        assert_eq!(call.param_str("text"), Some("rust"));
    }

    #[test]
    fn wait_for_element_defaults_its_timeout() {
        let (task_id, corr) = ids();
        let step = AgentStep::new(3, StepAction::verify("h1"));
        assert_eq!(
            step_to_tool_call(&step, &task_id, &corr).unwrap().tool,
            "verify_element_exists"
        );

        let step = AgentStep::new(
            4,
            StepAction {
                action_type: ActionType::WaitForElement,
                target: Some("h1".into()),
                value: None,
                timeout_ms: None,
            },
        );
        let call = step_to_tool_call(&step, &task_id, &corr).unwrap();
        assert_eq!(call.param_int("timeout_ms"), Some(10_000));
    }

    #[test]
    fn missing_target_is_a_conversion_error() {
        let (task_id, corr) = ids();
        let step = AgentStep::new(
            5,
            StepAction {
                action_type: ActionType::Click,
                target: None,
                value: None,
                timeout_ms: None,
            },
        );
        match step_to_tool_call(&step, &task_id, &corr) {
            Err(TaskError::StepConversion { step_number, .. }) => assert_eq!(step_number, 5),
            other => panic!("expected StepConversion, got {other:?}"),
        }
    }
}
