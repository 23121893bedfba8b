//! Subcommand implementations

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};

use promptrun_config::Config;
use promptrun_engine::{ExecutionRequest, ExecutionResponse};

use super::args::RunArgs;
use crate::app;

pub(super) async fn execute_run_command(args: RunArgs, config: &Config) -> Result<()> {
    let executor = app::build_executor(config)?;

    let mut request = ExecutionRequest::new(&args.prompt_id);
    for (name, value) in args.vars {
        request = request.system_var(name, value);
    }
    for (name, value) in args.user_vars {
        request = request.user_var(name, value);
    }
    if let Some(prompt) = args.user_prompt {
        request = request.user_prompt(prompt);
    }
    if let Some(id) = args.request_id {
        request = request.request_id(id);
    }

    let response = executor.execute(request).await?;

    if args.json {
        let text = serde_json::to_string_pretty(&response)
            .context("Failed to serialize execution response")?;
        println!("{text}");
    } else {
        println!("{}", response.response.content);
        eprintln!("{}", summary_line(&response));
    }
    Ok(())
}

fn summary_line(response: &ExecutionResponse) -> String {
    let validation = match response.validation_passed {
        Some(true) => "passed",
        Some(false) => "failed",
        None => "skipped",
    };
    format!(
        "✓ attempts={} llm_calls={} tool_calls={} validation={} trace={}",
        response.attempts,
        response.llm_call_count,
        response.tool_call_count,
        validation,
        response.trace_id
    )
}

pub(super) fn execute_prompts_command(config: &Config, json: bool) -> Result<()> {
    let library = app::load_library(config)?;

    if json {
        let rows: Vec<Value> = library
            .prompts
            .iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "name": p.name,
                    "status": p.status,
                    "tool_ids": p.tool_ids,
                    "activity_ids": p.activity_ids,
                    "workflow_ids": p.workflow_ids,
                    "validation_required": p.validation_required,
                    "validation_gate": p.validation_gate,
                    "execution_count": p.execution_count,
                    "avg_response_time_ms": p.avg_response_time_ms,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if library.prompts.is_empty() {
        println!("No prompts in {}", config.library_path().display());
        return Ok(());
    }
    for prompt in &library.prompts {
        let callables =
            prompt.tool_ids.len() + prompt.activity_ids.len() + prompt.workflow_ids.len();
        let gate = if prompt.gated() { " gated" } else { "" };
        println!(
            "{:<24} {:<10} callables={} runs={} avg_ms={:.0}{}",
            prompt.id,
            prompt.status.to_string(),
            callables,
            prompt.execution_count,
            prompt.avg_response_time_ms,
            gate
        );
    }
    Ok(())
}

pub(super) fn execute_config_command(config: &Config, json: bool) -> Result<()> {
    let effective = config.effective_config();

    if json {
        let mut object = Map::new();
        for (key, (value, source)) in &effective {
            object.insert(key.clone(), json!({ "value": value, "source": source }));
        }
        println!("{}", serde_json::to_string_pretty(&Value::Object(object))?);
        return Ok(());
    }

    println!("Effective configuration:");
    for (key, (value, source)) in &effective {
        println!("  {key} = {value}  ({source})");
    }
    Ok(())
}
