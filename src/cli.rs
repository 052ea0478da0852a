use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};
use tokio::signal;

use ruscenario::runner::{
    BUILTIN_VARIABLES, CancelToken, IterationReport, IterationSummary, ScenarioReporter,
    TransactionRunner,
};
use ruscenario::scenario::{BodyTemplate, FailurePolicy, Scenario, ScenarioLoader};
use ruscenario::variable::{ConfigLoader, VariableConfig, VariableScope};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser)]
#[command(author, version, about = "Correlated HTTP transaction runner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 运行场景
    Run(RunArgs),
    /// 检查场景定义和变量引用，不发送请求
    Check(ContextArgs),
}

/// 变量来源参数
#[derive(Args, Debug, Clone)]
pub struct ContextArgs {
    /// 场景文件 (.toml)
    pub scenario: PathBuf,

    /// 环境名称（ruscenario.toml 中的 [environments.<name>]）
    #[arg(short, long)]
    pub env: Option<String>,

    /// 指定环境配置文件，默认向上查找 ruscenario.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 变量覆盖，格式 key=value，可重复
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    /// 顺序执行的迭代次数
    #[arg(short = 'n', long, default_value_t = 1)]
    pub iterations: usize,

    /// 虚拟用户编号，以 {vuserId} 提供给场景
    #[arg(long, default_value_t = 1)]
    pub vuser_id: u64,

    /// 跳过思考时间
    #[arg(long)]
    pub no_think_time: bool,

    /// 以 JSON Lines 格式追加迭代报告
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    ConfigLoader::parse_cli_var(s).ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

impl ContextArgs {
    fn load(&self) -> Result<(Scenario, VariableScope)> {
        let scenario = ScenarioLoader::load_from_path(&self.scenario)
            .with_context(|| format!("Failed to load scenario {}", self.scenario.display()))?;

        let config = match &self.config {
            Some(path) => ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ConfigLoader::find_and_load().unwrap_or_default(),
        };
        if let Some(env) = &self.env
            && config.get_environment(env).is_none()
        {
            bail!(
                "Environment '{}' not found (available: {})",
                env,
                available_environments(&config)
            );
        }

        let parameters = ConfigLoader::build_context(&config, self.env.as_deref(), &self.vars);
        Ok((scenario, parameters))
    }
}

fn available_environments(config: &VariableConfig) -> String {
    let mut names: Vec<&str> = config.environments.keys().map(String::as_str).collect();
    names.sort_unstable();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// 执行 run 子命令，返回是否全部通过
pub async fn run(args: RunArgs, verbose: bool) -> Result<bool> {
    let (scenario, parameters) = args.context.load()?;

    let mut runner = TransactionRunner::for_scenario(&scenario)?;
    if args.no_think_time {
        runner = runner.without_think_time();
    }

    let cancel = CancelToken::new();
    let listener = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            eprintln!("Received Ctrl-C, cancelling...");
            listener.cancel();
        }
    });

    let reporter = ScenarioReporter::new(verbose);
    reporter.print_header(
        &scenario,
        &args.context.scenario.display().to_string(),
        args.iterations,
    );

    let mut reports = Vec::with_capacity(args.iterations);
    for iteration in 1..=args.iterations {
        if cancel.is_cancelled() {
            break;
        }
        let iteration_parameters =
            TransactionRunner::iteration_parameters(&parameters, args.vuser_id, iteration);
        let report = runner
            .run_scenario_with_cancel(&scenario, iteration_parameters, &cancel)
            .await;
        reporter.print_report(iteration, &report);

        if let Some(path) = &args.report {
            append_report(path, &report)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
        }
        reports.push(report);
    }

    let summary = IterationSummary::from_reports(&reports);
    reporter.print_summary(&summary);
    Ok(summary.total > 0 && summary.all_passed())
}

/// 追加一行 JSON
fn append_report(path: &Path, report: &IterationReport) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(report)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// 执行 check 子命令，返回是否没有未解析的引用
pub fn check(args: ContextArgs) -> Result<bool> {
    let (scenario, parameters) = args.load()?;

    println!("{}", plan_table(&scenario));

    let unresolved =
        scenario.unresolved_references(parameters.names().chain(BUILTIN_VARIABLES));
    if unresolved.is_empty() {
        println!("{} all variable references resolve", "✓".green());
        return Ok(true);
    }

    println!(
        "{} {} unresolved reference(s):",
        "✗".red(),
        unresolved.len()
    );
    for reference in &unresolved {
        println!("   {}", reference);
    }
    Ok(false)
}

fn plan_table(scenario: &Scenario) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "#", "Step", "Method", "URL", "Expect", "On failure", "Extracts",
    ]);

    for (index, step) in scenario.steps.iter().enumerate() {
        let expect: Vec<String> = step.expected_status.iter().map(u16::to_string).collect();
        let extracts: Vec<&str> = step
            .extractions
            .iter()
            .map(|rule| rule.variable.as_str())
            .collect();
        let policy = match step.on_failure {
            FailurePolicy::Abort => Cell::new("abort").fg(Color::Red),
            FailurePolicy::Continue => Cell::new("continue").fg(Color::Yellow),
        };
        let mut url = step.request.url.clone();
        if matches!(step.request.body, Some(BodyTemplate::Json(_))) {
            url.push_str(" (json)");
        }
        if let Some(repeat) = &step.repeat {
            url.push_str(&format!(" x{} [{}]", repeat.values.len(), repeat.variable));
        }

        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(&step.name),
            Cell::new(step.request.method),
            Cell::new(url).add_attribute(Attribute::Dim),
            Cell::new(expect.join(", ")),
            policy,
            Cell::new(extracts.join(", ")),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("bookerEmail=load@example.com").unwrap(),
            ("bookerEmail".to_string(), "load@example.com".to_string())
        );
        assert!(parse_var("novalue").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "ruscenario",
            "run",
            "booking.toml",
            "--env",
            "dev",
            "--var",
            "a=1",
            "--var",
            "b=2",
            "-n",
            "3",
            "--no-think-time",
            "--vuser-id",
            "4",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.context.scenario, PathBuf::from("booking.toml"));
                assert_eq!(args.context.env.as_deref(), Some("dev"));
                assert_eq!(args.context.vars.len(), 2);
                assert_eq!(args.iterations, 3);
                assert!(args.no_think_time);
                assert_eq!(args.vuser_id, 4);
                assert!(args.report.is_none());
            }
            Commands::Check(_) => panic!("expected run"),
        }
    }

    #[test]
    fn test_plan_table_lists_steps() {
        let scenario = ScenarioLoader::parse(
            r#"
name = "plan"
[[steps]]
name = "T01_Login"
method = "POST"
url = "{api}/auth/login"
on_failure = "continue"
extract = [{ var = "sessionToken", json = "$.token" }]
"#,
        )
        .unwrap();
        let rendered = plan_table(&scenario).to_string();
        assert!(rendered.contains("T01_Login"));
        assert!(rendered.contains("sessionToken"));
        assert!(rendered.contains("continue"));
    }

    #[test]
    fn test_append_report_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.jsonl");
        append_report(&path, &IterationReport::new("a")).unwrap();
        append_report(&path, &IterationReport::new("b")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["scenario"], "b");
    }
}
