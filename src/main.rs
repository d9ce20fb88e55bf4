//! cvagent 命令行入口
//!
//! 用法：`cvagent [--config <file>] [--context <json>] <task...>`（clap 解析，未知参数报错）
//! 加载配置、初始化日志，用配置中的 LLM（无 Key 时为 Mock）与 echo 工具跑一个周期，结果以 JSON 打印。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cvagent::config::load_config;
use cvagent::core::AgentManager;
use cvagent::llm::create_llm_from_config;
use cvagent::tools::EchoTool;
use cvagent::{observability, Agent, TaskContext};

#[derive(Parser, Debug)]
#[command(name = "cvagent", version, about = "Run one Reason / Act / Learn / Reflect cycle")]
struct Cli {
    /// Extra config file layered over config/default.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Task context as a JSON object
    #[arg(long, value_parser = parse_context)]
    context: Option<TaskContext>,

    /// Task text
    #[arg(required = true, trailing_var_arg = true)]
    task: Vec<String>,
}

fn parse_context(raw: &str) -> Result<TaskContext, String> {
    serde_json::from_str(raw).map_err(|e| format!("not a JSON object: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let task = cli.task.join(" ");
    let cfg = load_config(cli.config).context("Failed to load config")?;
    observability::init(&cfg.app.log_level);

    let name = cfg.app.name.clone().unwrap_or_else(|| "cv-analysis".to_string());
    let llm = create_llm_from_config(&cfg.llm);
    let agent = Agent::builder(name.clone())
        .description("CV analysis agent")
        .capabilities(["analyze", "parse", "match", "evaluate"])
        .config(cfg.clone())
        .llm(Arc::clone(&llm))
        .tool("echo", EchoTool)
        .build();

    let manager = AgentManager::new(cfg.manager.clone());
    manager
        .register_agent(agent)
        .await
        .context("Failed to register agent")?;

    let outcome = manager
        .run(&name, &task, cli.context.unwrap_or_default())
        .await;
    manager.shutdown();

    let result = outcome.context("Agent run failed")?;
    let json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
    println!("{json}");

    let (prompt, completion, total) = llm.token_usage();
    tracing::info!(prompt, completion, total, "token usage");
    Ok(())
}
