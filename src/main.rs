//! mailbee - 邮件分拣智能体
//!
//! 入口：初始化日志、加载配置，按子命令运行一次 Agent 或仅运行会议信息抽取。

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mailbee::{
    agent::create_services_from_config,
    config::load_config,
    core::{Clock, Orchestrator, SystemClock},
    llm::create_llm_from_config,
    mail::{Email, Task},
    observability,
    scheduling::{parse_instant, MeetingExtractor},
};

#[derive(Parser)]
#[command(name = "mailbee")]
#[command(author, version, about = "Email triage agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(long, global = true, env = "MAILBEE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// 对一封邮件运行 Agent，输出 AgentResult（JSON）
    Run {
        /// 邮件 JSON 文件
        #[arg(long)]
        email: PathBuf,

        /// 用户 id
        #[arg(long)]
        user: String,

        /// 上一次挂起时问题的回答
        #[arg(long)]
        answer: Option<String>,
    },

    /// 只运行会议信息抽取
    Extract {
        #[arg(long)]
        text: String,

        /// 参考时刻（ISO 8601），默认当前时间
        #[arg(long)]
        now: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.clone()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run { email, user, answer } => {
            let raw = std::fs::read_to_string(&email)
                .with_context(|| format!("Failed to read {}", email.display()))?;
            let email: Email = serde_json::from_str(&raw).context("Invalid email JSON")?;

            let services = create_services_from_config(&cfg, Some(&user)).await?;
            services
                .store
                .upsert_email(email.clone())
                .await
                .context("Failed to store email")?;

            let mut task = Task::from_email(&email, &user);
            if let Some(answer) = answer {
                task = task.with_user_input(answer);
            }
            let orchestrator = Orchestrator::new(services, cfg.agent.clone());
            let result = orchestrator.run(&task).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Extract { text, now } => {
            let now = match now {
                Some(s) => parse_instant(&s).with_context(|| format!("Invalid --now value: {s}"))?,
                None => SystemClock.now(),
            };
            let extractor = MeetingExtractor::new(create_llm_from_config(&cfg));
            let details = extractor.extract(&text, now).await;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
    }

    Ok(())
}
