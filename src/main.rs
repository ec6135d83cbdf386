//! Wayfarer - Rust 旅行助手智能体
//!
//! 入口：加载 .env 与配置、初始化日志、构建 Orchestrator，并运行命令行对话循环。
//! 命令：quit / exit / q 退出，reset 开启新的对话线程；Ctrl-C 取消当前轮次，空闲时按下则退出。

use std::future::Future;
use std::path::PathBuf;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wayfarer::config::load_config;
use wayfarer::core::{AgentBuilder, AgentError, TurnOptions};
use wayfarer::memory::new_thread_id;
use wayfarer::react::TurnEvent;

fn print_event(event: &TurnEvent) {
    match event {
        TurnEvent::ToolCall { tool, args, .. } => println!("  -> {} {}", tool, args),
        TurnEvent::ToolResult { tool, preview, .. } => println!("  <- {}: {}", tool, preview),
        TurnEvent::UnknownTool { tool, .. } => println!("  !! unknown tool '{}'", tool),
        TurnEvent::RoundLimit { max_rounds } => println!("  !! round limit ({}) reached", max_rounds),
        TurnEvent::RoundStarted { .. } | TurnEvent::Answer { .. } | TurnEvent::Cancelled => {}
    }
}

/// 读取下一行输入；interrupt 先完成（轮次之间的 Ctrl-C）或输入结束时返回 None
async fn next_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> anyhow::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    // next_line 可安全取消
    tokio::select! {
        line = lines.next_line() => line.context("Failed to read input"),
        _ = interrupt => Ok(None),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 凭据可放在 .env 中
    let _ = dotenvy::dotenv();
    wayfarer::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load configuration")?;
    let app_name = cfg.app.name.clone();
    let show_trace = cfg.app.show_tool_trace;

    let orchestrator = AgentBuilder::new(cfg).build().context("Failed to build agent")?;
    let info = orchestrator.model_info();

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(
            format!(
                "{} ready (model: {}, tools: {}). Type 'reset' for a new conversation, 'quit' to leave.\n",
                app_name,
                info.model,
                info.tools.join(", ")
            )
            .as_bytes(),
        )
        .await?;

    let mut thread_id = new_thread_id();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let interrupt = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        let Some(line) = next_input(&mut lines, interrupt).await? else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input.to_lowercase().as_str() {
            "quit" | "exit" | "q" => break,
            "reset" => {
                thread_id = new_thread_id();
                println!("Started a new conversation.");
                continue;
            }
            _ => {}
        }

        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let options = TurnOptions {
            cancel: Some(cancel),
            events: show_trace.then_some(tx),
        };

        let result = orchestrator.run_turn(&thread_id, input, options).await;
        watcher.abort();
        while let Ok(event) = rx.try_recv() {
            print_event(&event);
        }

        match result {
            Ok(report) => println!("{}\n", report.answer),
            Err(AgentError::Cancelled) => println!("(cancelled)\n"),
            Err(e) => eprintln!("Error: {}\n", e),
        }
    }

    let (prompt, completion, total) = orchestrator.token_usage();
    if total > 0 {
        println!("Tokens used: {} prompt + {} completion = {}", prompt, completion, total);
    }
    Ok(())
}
