use crate::util::config::LoggingConfig;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::fmt::{layer, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter::EnvFilter, Layer, Registry};

/// 访问日志使用的目标，由请求日志中间件写入
pub const ACCESS_TARGET: &str = "http.server";

const CRATE_TARGET: &str = "caption_server";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// 日志写入守卫，drop 时刷新缓冲
#[must_use]
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
    pub directory: Option<PathBuf>,
}

/// 按配置初始化日志：控制台 + 按天滚动的主日志 + 独立访问日志
pub fn log_init_with_config(file_prefix: &str, config: &LoggingConfig) -> Result<LogGuard> {
    let level_filter = parse_level(&config.level);
    let filter_expression = build_env_filter_expression(level_filter, &config.overrides);
    let use_json = config.structured;

    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(
        io::stdout,
        use_json,
        true,
        env_filter(&filter_expression, level_filter),
    )];
    let mut guards = Vec::new();
    let mut directory = None;

    if config.file.enabled {
        let log_dir = resolve_log_dir(&config.file.directory);
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("创建日志目录失败: {}", log_dir.display()))?;

        let (main_writer, main_guard) =
            tracing_appender::non_blocking(daily(&log_dir, format!("{}-info", file_prefix)));
        let (access_writer, access_guard) =
            tracing_appender::non_blocking(daily(&log_dir, format!("{}-access", file_prefix)));

        let main_expr = format!("{},{}=off", filter_expression, ACCESS_TARGET);
        let access_expr = format!("{}={}", ACCESS_TARGET, level_filter_to_str(level_filter));

        layers.push(fmt_layer(
            main_writer,
            use_json,
            false,
            env_filter(&main_expr, level_filter),
        ));
        layers.push(fmt_layer(
            access_writer,
            use_json,
            false,
            env_filter(&access_expr, level_filter),
        ));
        guards.push(main_guard);
        guards.push(access_guard);
        directory = Some(log_dir);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .context("日志系统已初始化")?;

    tracing::info!(
        event = "log.init",
        level = %config.level,
        console = true,
        file = config.file.enabled,
        directory = %directory.as_deref().map(|d| d.display().to_string()).unwrap_or_default(),
        rotation = "daily",
        structured = use_json,
        access_file = %format!("{}-access", file_prefix)
    );
    if let (true, Some(retention)) = (config.file.enabled, config.file.retention_days) {
        tracing::info!(event = "log.retention", days = retention);
    }

    Ok(LogGuard {
        _guards: guards,
        directory,
    })
}

fn fmt_layer<W>(writer: W, json: bool, ansi: bool, filter: EnvFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        layer()
            .json()
            .with_target(true)
            .with_ansi(ansi)
            .with_writer(writer)
            .with_filter(filter)
            .boxed()
    } else {
        layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_ansi(ansi)
            .with_writer(writer)
            .with_filter(filter)
            .boxed()
    }
}

fn env_filter(expression: &str, fallback: LevelFilter) -> EnvFilter {
    EnvFilter::try_new(expression).unwrap_or_else(|_| EnvFilter::new(level_filter_to_str(fallback)))
}

/// 相对路径基于工作目录；在 bin/ 下运行时基于上级目录
fn resolve_log_dir(directory: &str) -> PathBuf {
    let path = Path::new(directory);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match current_dir.parent() {
        Some(parent) if current_dir.file_name() == Some(std::ffi::OsStr::new("bin")) => {
            parent.join(directory)
        }
        _ => current_dir.join(directory),
    }
}

/// 删除超过保留天数的日志文件，返回删除数量
pub fn cleanup_old_logs(log_dir: &Path, file_prefix: &str, retention_days: u32) -> Result<usize> {
    if !log_dir.exists() {
        tracing::debug!("日志目录不存在: {}", log_dir.display());
        return Ok(0);
    }

    let retention = Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);
    let cutoff = SystemTime::now()
        .checked_sub(retention)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut deleted_count = 0;
    let mut error_count = 0;

    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");

        // 只处理本服务的日志文件
        if !file_name.ends_with(".log") && !file_name.starts_with(file_prefix) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .or_else(|_| metadata.created())
            .unwrap_or_else(|_| SystemTime::now());

        if modified < cutoff {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    deleted_count += 1;
                    tracing::debug!("已删除过期日志: {}", path.display());
                }
                Err(e) => {
                    error_count += 1;
                    tracing::warn!("删除日志文件失败: {} - {}", path.display(), e);
                }
            }
        }
    }

    if deleted_count > 0 {
        tracing::info!("已清理 {} 个过期日志文件", deleted_count);
    }
    if error_count > 0 {
        tracing::warn!("有 {} 个文件清理失败", error_count);
    }

    Ok(deleted_count)
}

fn parse_level(level: &str) -> LevelFilter {
    match normalize_level_str(level) {
        Some("trace") => LevelFilter::TRACE,
        Some("debug") => LevelFilter::DEBUG,
        Some("warn") => LevelFilter::WARN,
        Some("error") => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

fn build_env_filter_expression(
    default_level: LevelFilter,
    overrides: &HashMap<String, String>,
) -> String {
    let mut directives = vec![level_filter_to_str(default_level).to_string()];

    let mut targets: Vec<_> = overrides.iter().collect();
    targets.sort();
    for (target, level_str) in targets {
        if let Some(level) = normalize_level_str(level_str) {
            directives.push(format!("{}={level}", normalize_directive_target(target)));
        }
    }

    directives.join(",")
}

fn normalize_level_str(level: &str) -> Option<&'static str> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

fn level_filter_to_str(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::OFF => "off",
        LevelFilter::ERROR => "error",
        LevelFilter::WARN => "warn",
        LevelFilter::INFO => "info",
        LevelFilter::DEBUG => "debug",
        LevelFilter::TRACE => "trace",
    }
}

/// `target:xxx` 原样作为目标；`a.b` 映射为模块路径 `caption_server::a::b`
fn normalize_directive_target(target: &str) -> String {
    if let Some(raw) = target.strip_prefix("target:") {
        raw.to_string()
    } else if target.contains("::") {
        target.to_string()
    } else {
        format!("{}::{}", CRATE_TARGET, target.replace('.', "::"))
    }
}
