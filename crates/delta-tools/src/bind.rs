//! Parameter binding: turn `(tool_definition, arguments)` into argv +
//! stdin + env.

use std::collections::HashMap;

use delta_core::config::{InjectAs, ToolDefinition};
use serde_json::Value;

use crate::error::ToolError;

/// The result of binding a tool call's arguments into a runnable
/// command.
#[derive(Debug, Clone)]
pub struct BoundCommand {
    pub argv: Vec<String>,
    pub stdin: Option<String>,
    pub env: HashMap<String, String>,
}

fn value_to_arg(tool: &str, param: &str, value: &Value) -> Result<String, ToolError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ToolError::TypeMismatch(tool.to_string(), param.to_string())),
    }
}

/// Bind `args` (the LLM-supplied tool-call arguments, keyed by
/// parameter name) against `tool`'s injection slots, substituting
/// `${AGENT_HOME}`/`${CWD}` in every argv element and exporting
/// `AGENT_HOME` into the child environment.
pub fn bind(
    tool: &ToolDefinition,
    args: &Value,
    agent_home: &str,
    cwd: &str,
) -> Result<BoundCommand, ToolError> {
    let substitute = |s: &str| {
        s.replace("${AGENT_HOME}", agent_home)
            .replace("${CWD}", cwd)
    };

    let mut argv: Vec<String> = tool.command.iter().map(|t| substitute(t)).collect();
    let mut stdin = None;

    for param in &tool.parameters {
        let value = args.get(&param.name).ok_or_else(|| ToolError::MissingParameter {
            tool: tool.name.clone(),
            param: param.name.clone(),
        })?;
        let as_string = value_to_arg(&tool.name, &param.name, value)?;

        match param.inject_as {
            InjectAs::Argument => argv.push(substitute(&as_string)),
            InjectAs::Option => {
                let option_name = param.option_name.as_deref().unwrap_or_default();
                argv.push(substitute(option_name));
                argv.push(substitute(&as_string));
            }
            InjectAs::Stdin => stdin = Some(as_string),
        }
    }

    let mut env = HashMap::new();
    env.insert("AGENT_HOME".to_string(), agent_home.to_string());

    Ok(BoundCommand { argv, stdin, env })
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_core::config::{ParamType, ToolParameter};
    use serde_json::json;

    fn param(name: &str, inject_as: InjectAs, option_name: Option<&str>) -> ToolParameter {
        ToolParameter {
            name: name.to_string(),
            param_type: ParamType::String,
            inject_as,
            option_name: option_name.map(str::to_string),
        }
    }

    #[test]
    fn argument_params_append_in_definition_order() {
        let tool = ToolDefinition {
            name: "echo".into(),
            command: vec!["echo".into()],
            parameters: vec![param("msg", InjectAs::Argument, None)],
        };
        let bound = bind(&tool, &json!({"msg": "hello"}), "/agent", "/ws").unwrap();
        assert_eq!(bound.argv, vec!["echo", "hello"]);
        assert!(bound.stdin.is_none());
    }

    #[test]
    fn option_params_append_option_name_then_value() {
        let tool = ToolDefinition {
            name: "grep".into(),
            command: vec!["grep".into()],
            parameters: vec![param("pattern", InjectAs::Option, Some("-e"))],
        };
        let bound = bind(&tool, &json!({"pattern": "foo"}), "/agent", "/ws").unwrap();
        assert_eq!(bound.argv, vec!["grep", "-e", "foo"]);
    }

    #[test]
    fn stdin_param_is_buffered_not_appended_to_argv() {
        let tool = ToolDefinition {
            name: "cat".into(),
            command: vec!["cat".into()],
            parameters: vec![param("input", InjectAs::Stdin, None)],
        };
        let bound = bind(&tool, &json!({"input": "piped"}), "/agent", "/ws").unwrap();
        assert_eq!(bound.argv, vec!["cat"]);
        assert_eq!(bound.stdin.as_deref(), Some("piped"));
    }

    #[test]
    fn missing_parameter_is_an_error() {
        let tool = ToolDefinition {
            name: "echo".into(),
            command: vec!["echo".into()],
            parameters: vec![param("msg", InjectAs::Argument, None)],
        };
        let err = bind(&tool, &json!({}), "/agent", "/ws").unwrap_err();
        assert!(matches!(err, ToolError::MissingParameter { .. }));
    }

    #[test]
    fn agent_home_is_substituted_in_template_and_exported_to_env() {
        let tool = ToolDefinition {
            name: "build".into(),
            command: vec!["${AGENT_HOME}/build.sh".into()],
            parameters: vec![],
        };
        let bound = bind(&tool, &json!({}), "/agents/demo", "/ws").unwrap();
        assert_eq!(bound.argv, vec!["/agents/demo/build.sh"]);
        assert_eq!(bound.env.get("AGENT_HOME").map(String::as_str), Some("/agents/demo"));
    }

    #[test]
    fn cwd_is_substituted_in_argument_values() {
        let tool = ToolDefinition {
            name: "cat".into(),
            command: vec!["cat".into()],
            parameters: vec![param("path", InjectAs::Argument, None)],
        };
        let bound = bind(&tool, &json!({"path": "${CWD}/file.txt"}), "/agent", "/ws").unwrap();
        assert_eq!(bound.argv, vec!["cat", "/ws/file.txt"]);
    }
}
