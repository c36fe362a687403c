use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use pixdet_config::{AppConfig, ConfigReader};
use pixdet_core::DetectorModel;
use pixdet_engine::ConstructionPlan;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// 读取探测器模型文件并输出其派生几何与构建计划概要。
#[derive(Debug, Parser)]
#[command(name = "pixdet", version)]
struct Args {
    /// 模型文件路径，或在搜索路径中查找的模型名称
    model: String,
    /// 探测器实例名称，默认取模型名称
    #[arg(long)]
    name: Option<String>,
    /// 应用配置文件
    #[arg(long)]
    config: Option<PathBuf>,
    /// 以 JSON 输出完整构建计划
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = load_configuration(args.config.as_deref());
    init_logging(&config);
    info!("启动像素探测器几何工具");

    if let Err(err) = run(&args, &config) {
        error!(error = %format!("{err:#}"), "处理模型失败");
        std::process::exit(1);
    }
}

fn run(args: &Args, config: &AppConfig) -> Result<()> {
    let path = resolve_model(&args.model, config)?;
    let model_type = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(args.model.as_str())
        .to_string();
    debug!(path = %path.display(), model_type, "读取模型文件");

    let reader = ConfigReader::from_file(&path)
        .with_context(|| format!("无法读取模型文件 {}", path.display()))?;
    let model = DetectorModel::new(&model_type, reader)
        .with_context(|| format!("模型 {model_type} 无效"))?;

    let name = args.name.as_deref().unwrap_or(model_type.as_str());
    let plan = ConstructionPlan::build(name, &model);
    plan.verify_materials(config.models.known_materials.as_slice())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_summary(&model, &plan);
    }
    Ok(())
}

fn resolve_model(model: &str, config: &AppConfig) -> Result<PathBuf> {
    let direct = Path::new(model);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }
    match config.models.locate(model) {
        Some(path) => Ok(path),
        None => bail!("找不到模型 `{model}`，请检查路径或 models.search_paths"),
    }
}

fn print_summary(model: &DetectorModel, plan: &ConstructionPlan) {
    println!("模型：{} ({})", model.model_type(), model.kind().as_str());
    println!(
        "  像素：{} x {}，间距 {:?}",
        model.n_pixels().x,
        model.n_pixels().y,
        model.pixel_size()
    );
    println!("  传感器尺寸：{:?}", model.sensor_size());
    println!("  芯片尺寸：{:?}", model.chip_size());
    println!("  包络尺寸：{:?}", model.size());
    println!("  几何中心：{:?}", model.geometrical_center());
    for (index, layer) in model.support_layers().iter().enumerate() {
        println!(
            "  支撑层 {index}：{} / {}，中心 {:?}",
            layer.location(),
            layer.material(),
            layer.center()
        );
    }
    println!("构建计划 {}：", plan.name);
    for (part, material) in plan.materials() {
        println!("  - {part}: {material}");
    }
}

fn load_configuration(override_path: Option<&Path>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => AppConfig::discover().unwrap_or_else(|err| {
            warn!(error = %err, "加载默认配置失败，使用内建默认值");
            AppConfig::default()
        }),
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    if fmt().with_env_filter(filter).try_init().is_err() {
        // 已初始化，忽略
    }
}
