//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与开发辅助命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `cov-runtime`: 运行 motion-runtime 覆盖率
//! - `motion-check`: 用动效配置检查动画描述符文件

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use motion_runtime::device::{adapt_for_scale, classify_width, scale_for};
use motion_runtime::{
    AnimationDescriptor, Breakpoints, DeviceTier, MotionConfig, MotionConfigOverride, Violation,
    validator,
};
use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "开发辅助工具")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 输出调试日志（重复使用提高级别）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行 fmt、clippy、test 门禁检查
    CheckAll,

    /// 运行 motion-runtime 覆盖率报告
    CovRuntime,

    /// 检查动画描述符文件
    ///
    /// 读取目录下所有 .json 文件（单个描述符或描述符数组），
    /// 按视口宽度对应的档位适配后逐个校验。
    MotionCheck {
        /// 文件或目录（默认：assets/motion）
        path: Option<PathBuf>,

        /// 动效配置覆盖文件（JSON）
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// 视口宽度（px）；缺省按桌面处理
        #[arg(short, long)]
        width: Option<f32>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = real_main(cli.command) {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn real_main(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::CheckAll => check_all(),
        Commands::CovRuntime => cov_runtime(),
        Commands::MotionCheck {
            path,
            config,
            width,
        } => motion_check(path.as_deref(), config.as_deref(), width),
    }
}

fn check_all() -> anyhow::Result<()> {
    let sh = Shell::new()?;

    eprintln!("\n==> cargo fmt --all -- --check");
    cmd!(sh, "cargo fmt --all -- --check").run()?;

    eprintln!("\n==> cargo clippy --workspace --all-targets");
    cmd!(sh, "cargo clippy --workspace --all-targets").run()?;

    eprintln!("\n==> cargo test --workspace");
    cmd!(sh, "cargo test --workspace").run()?;
    Ok(())
}

fn cov_runtime() -> anyhow::Result<()> {
    let sh = Shell::new()?;
    if cmd!(sh, "cargo llvm-cov --version").quiet().run().is_err() {
        anyhow::bail!(
            "cargo llvm-cov 不可用。\n\
请先安装：\n\
  - cargo install cargo-llvm-cov\n\
  - rustup component add llvm-tools-preview\n\
然后重试。"
        );
    }

    eprintln!("\n==> cargo llvm-cov -p motion-runtime --html");
    cmd!(sh, "cargo llvm-cov -p motion-runtime --html").run()?;
    eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
    Ok(())
}

//=============================================================================
// motion-check 命令实现
//=============================================================================

/// 描述符文件：单个描述符或数组
#[derive(Deserialize)]
#[serde(untagged)]
enum DescriptorFile {
    Many(Vec<AnimationDescriptor>),
    One(Box<AnimationDescriptor>),
}

impl DescriptorFile {
    fn into_vec(self) -> Vec<AnimationDescriptor> {
        match self {
            Self::Many(descriptors) => descriptors,
            Self::One(descriptor) => vec![*descriptor],
        }
    }
}

/// 单个描述符的检查结果
enum Outcome {
    Passed,
    /// 当前档位不做动画，直接渲染结束状态
    Static,
    Failed(Vec<Violation>),
}

#[derive(Default)]
struct MotionCheckReport {
    files_checked: usize,
    read_errors: usize,
    passed: usize,
    static_count: usize,
    failed: usize,
}

impl MotionCheckReport {
    fn has_errors(&self) -> bool {
        self.read_errors > 0 || self.failed > 0
    }
}

fn motion_check(
    path: Option<&Path>,
    config_path: Option<&Path>,
    width: Option<f32>,
) -> anyhow::Result<()> {
    let overrides = match config_path {
        Some(p) => MotionConfigOverride::load(p)?,
        None => MotionConfigOverride::default(),
    };
    let mut config = MotionConfig::merged(&overrides);
    config.validate().context("动效配置无效")?;

    let tier = classify_width(width, &Breakpoints::default());
    config.device_tier = tier;
    info!(%tier, scale = scale_for(tier), "按档位检查");

    let root = path.unwrap_or_else(|| Path::new("assets/motion"));
    if !root.exists() {
        anyhow::bail!(
            "路径不存在: {}\n请在 workspace 根目录运行，或指定描述符路径",
            root.display()
        );
    }
    let files = collect_descriptor_files(root)?;
    if files.is_empty() {
        eprintln!("未找到描述符文件（.json）");
        return Ok(());
    }

    eprintln!("==> 检查 {} 个描述符文件（{tier}）...\n", files.len());

    let mut report = MotionCheckReport::default();
    for file in &files {
        report.files_checked += 1;
        let descriptors = match read_descriptors(file) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                eprintln!("[ERROR] {}: {e:#}", file.display());
                report.read_errors += 1;
                continue;
            }
        };

        for descriptor in &descriptors {
            match check_descriptor(descriptor, &config, tier) {
                Outcome::Passed => report.passed += 1,
                Outcome::Static => {
                    debug!(id = %descriptor.id, "档位不做动画");
                    report.static_count += 1;
                }
                Outcome::Failed(violations) => {
                    report.failed += 1;
                    for violation in violations {
                        eprintln!("[ERROR] {}#{}: {violation}", file.display(), descriptor.id);
                    }
                }
            }
        }
    }

    print_report(&report);
    if report.has_errors() {
        anyhow::bail!("描述符检查发现错误");
    }
    Ok(())
}

fn collect_descriptor_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn read_descriptors(file: &Path) -> anyhow::Result<Vec<AnimationDescriptor>> {
    let content = std::fs::read_to_string(file).context("无法读取文件")?;
    parse_descriptors(&content)
}

fn parse_descriptors(content: &str) -> anyhow::Result<Vec<AnimationDescriptor>> {
    let parsed: DescriptorFile = serde_json::from_str(content).context("描述符格式错误")?;
    Ok(parsed.into_vec())
}

/// 先按档位适配再校验，与运行时绑定的顺序一致
fn check_descriptor(
    descriptor: &AnimationDescriptor,
    config: &MotionConfig,
    tier: DeviceTier,
) -> Outcome {
    let adapted = adapt_for_scale(descriptor, scale_for(tier));
    if adapted.duration == Some(0) {
        return Outcome::Static;
    }
    let violations = validator::check(&adapted, config);
    if violations.is_empty() {
        Outcome::Passed
    } else {
        Outcome::Failed(violations)
    }
}

fn print_report(report: &MotionCheckReport) {
    eprintln!("─────────────────────────────────────────────────────");
    eprintln!("检查完成: {} 个文件", report.files_checked);
    eprintln!();

    let error_count = report.read_errors + report.failed;
    if error_count > 0 {
        eprintln!(
            "❌ {} 个错误, {} 个通过, {} 个静态",
            error_count, report.passed, report.static_count
        );
    } else {
        eprintln!(
            "✅ 检查通过: {} 个动画, {} 个静态",
            report.passed, report.static_count
        );
    }
}
