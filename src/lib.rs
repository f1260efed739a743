//! mailbee - 邮件分拣智能体
//!
//! 模块划分：
//! - **agent**: 服务装配与默认工具集
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、时钟、编排器
//! - **llm**: 推理引擎客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）、嵌入
//! - **mail**: 邮件、任务、分类、摘要与回复、写作风格、持久化
//! - **memory**: 消息、token 预算、向量检索与上下文组装
//! - **observability**: 日志初始化
//! - **react**: 决策解析、ReAct 主循环、补充信息标记、推理记录
//! - **scheduling**: 会议信息抽取、日历平台、调度服务
//! - **tools**: 工具注册表、执行器与五个邮件工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod mail;
pub mod memory;
pub mod observability;
pub mod react;
pub mod scheduling;
pub mod tools;
