//! `models list`.
//!
//! Concrete provider HTTP clients are out of scope here; this reports the
//! static catalog of providers the core is built to drive, annotated with
//! whether `<config-root>/auth.json` holds a key for each.

use crate::context::Context;
use crate::output::print_json;
use anyhow::Result;
use serde_json::json;
use std::collections::HashMap;

struct ModelInfo {
    provider: &'static str,
    model: &'static str,
    supports_tools: bool,
    supports_streaming: bool,
    max_tokens: u64,
    context_window: u64,
}

const CATALOG: &[ModelInfo] = &[
    ModelInfo {
        provider: "openai",
        model: "gpt-4o",
        supports_tools: true,
        supports_streaming: true,
        max_tokens: 16_384,
        context_window: 128_000,
    },
    ModelInfo {
        provider: "anthropic",
        model: "claude-3-5-sonnet",
        supports_tools: true,
        supports_streaming: true,
        max_tokens: 8_192,
        context_window: 200_000,
    },
    ModelInfo {
        provider: "deepseek",
        model: "deepseek-chat",
        supports_tools: true,
        supports_streaming: true,
        max_tokens: 8_192,
        context_window: 64_000,
    },
];

fn auth_keys(config_root: &std::path::Path) -> HashMap<String, String> {
    let path = config_root.join("auth.json");
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

pub(crate) fn run_list(_ctx: &Context, json_mode: bool) -> Result<()> {
    let root = codepunk_core::config_root()?;
    let keys = auth_keys(&root);

    let models: Vec<_> = CATALOG
        .iter()
        .map(|m| {
            json!({
                "provider": m.provider,
                "model": m.model,
                "hasKey": keys.contains_key(m.provider),
                "supportsTools": m.supports_tools,
                "supportsStreaming": m.supports_streaming,
                "maxTokens": m.max_tokens,
                "contextWindow": m.context_window,
            })
        })
        .collect();

    if json_mode {
        print_json(&json!({
            "schema": "models.list.v1",
            "models": models,
        }))?;
    } else {
        for m in &models {
            println!(
                "{}/{}  hasKey={}  streaming={}",
                m["provider"].as_str().unwrap_or_default(),
                m["model"].as_str().unwrap_or_default(),
                m["hasKey"],
                m["supportsStreaming"],
            );
        }
    }
    Ok(())
}
