//! Handle 快速上手：注册部署、推送副本、通过句柄调用绑定方法。
//!
//! # 使用方法
//! ```bash
//! cargo run --bin handle_quickstart -- --config crates/serve-examples/config/router.toml --replicas 3
//! ```
//! - `--config`：可选，TOML 格式的路由器配置；
//! - `--replicas`：可选，进程内副本数量，默认 1。
//!
//! # 流程（How）
//! 1. 在进程内部署若干副本，每个副本暴露 `get_deployment_name`、`check_health`、`whoami`；
//! 2. 构造路由器（Tokio 执行器）并注册到控制面代理，代理以进程内部署作为健康检查；
//! 3. 推送副本名集合，签发绑定 `get_deployment_name` 的句柄并调用，校验返回部署名；
//! 4. 用 `whoami` 轮询一圈，打印每次命中的副本。

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail, ensure};
use serve_core::prelude::*;
use serve_examples::InProcessDeployment;
use serve_router::{ControllerProxy, ReplicaSnapshot, Router, TokioExecutor};
use tracing::info;

const DEPLOYMENT: &str = "HandleQuickstart";
const VERSION: &str = "v1";

struct Options {
    config: Option<PathBuf>,
    replicas: usize,
}

fn parse_args() -> anyhow::Result<Options> {
    let mut options = Options {
        config: None,
        replicas: 1,
    };
    let mut args = env::args().skip(1);
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--config" => {
                let value = args.next().context("--config 之后必须提供文件路径")?;
                options.config = Some(PathBuf::from(value));
            }
            "--replicas" => {
                let value = args.next().context("--replicas 之后必须提供数量")?;
                options.replicas = value
                    .parse()
                    .with_context(|| format!("无法解析副本数量: {value}"))?;
            }
            unknown => bail!("未知参数: {unknown}"),
        }
    }
    ensure!(options.replicas > 0, "副本数量必须大于 0");
    Ok(options)
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RouterConfig> {
    let Some(path) = path else {
        return Ok(RouterConfig::default());
    };
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置失败: {}", path.display()))?;
    RouterConfig::from_toml_str(&source).with_context(|| format!("解析配置失败: {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    serve_telemetry::install().context("安装 tracing 失败")?;
    let options = parse_args()?;
    let config = load_config(options.config.as_ref())?;

    let replicas = Arc::new(InProcessDeployment::new(DEPLOYMENT));
    let names = replicas.scale_to(options.replicas);

    let router = Router::builder(DEPLOYMENT, replicas.clone())
        .version(DeploymentVersion::new(VERSION))
        .config(config)
        .executor(Arc::new(TokioExecutor::current()?))
        .build()?;
    let proxy = ControllerProxy::new().with_health_check(replicas.clone());
    proxy.register(router);

    let deployment = DeploymentName::new(DEPLOYMENT);
    let handle = proxy
        .get_handle(&deployment)?
        .with_method("get_deployment_name");
    let push = proxy.push_membership(
        &deployment,
        &DeploymentVersion::new(VERSION),
        ReplicaSnapshot::from_names(names.iter().cloned()),
    )?;
    info!(
        serve.membership.revision = push.update.revision,
        excluded = push.excluded_unhealthy.len(),
        "membership pushed"
    );

    let reply = handle.remote(Bytes::new())?.await?;
    ensure!(
        reply.as_ref() == DEPLOYMENT.as_bytes(),
        "句柄返回了意外的部署名: {:?}",
        reply
    );
    println!("get_deployment_name -> {}", String::from_utf8_lossy(&reply));

    let whoami = handle.with_method("whoami");
    for _ in 0..names.len() {
        let reply = whoami.remote(Bytes::new())?.await?;
        println!("whoami -> {}", String::from_utf8_lossy(&reply));
    }

    let stats = handle.router().stats();
    info!(
        dispatched = stats.dispatched,
        completed = stats.completed,
        failed = stats.failed,
        "quickstart finished"
    );
    Ok(())
}
