//! SeniorAssist 终端对话
//!
//! 入口：初始化日志、按配置构建编排器，然后逐行读取用户输入。
//! 命令：`/recordatorios` 列出已保存的提醒，`/salir` 退出。

use anyhow::Context;
use senior_assist::{core::create_assistant, observability, TurnRequest};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let orchestrator = create_assistant(None).context("Failed to create assistant")?;
    let user_id = std::env::var("ASSIST_USER").unwrap_or_else(|_| "local".to_string());

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all("Hola, soy tu asistente. Escribe /salir para terminar.\n".as_bytes())
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/salir" => break,
            "/recordatorios" => {
                let reminders = orchestrator
                    .stores()
                    .reminders
                    .reminders(&user_id)
                    .await
                    .context("Failed to list reminders")?;
                if reminders.is_empty() {
                    stdout.write_all("No tienes recordatorios.\n".as_bytes()).await?;
                }
                for r in reminders {
                    let line = format!("- {} ({})\n", r.text, r.due_at.format("%d/%m/%Y %H:%M"));
                    stdout.write_all(line.as_bytes()).await?;
                }
            }
            _ => match orchestrator
                .handle_turn(TurnRequest::new(user_id.as_str(), input))
                .await
            {
                Ok(resp) => {
                    stdout.write_all(format!("{}\n", resp.reply).as_bytes()).await?;
                }
                Err(e) => {
                    tracing::error!("turn failed: {}", e);
                    stdout
                        .write_all("Ocurrió un error interno en el chat.\n".as_bytes())
                        .await?;
                }
            },
        }
    }

    Ok(())
}
