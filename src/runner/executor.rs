use std::time::Instant;

use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::Result;
use crate::http::{Client, Request, Response};
use crate::runner::cancel::CancelToken;
use crate::runner::types::{
    ExtractionMiss, IterationOutcome, IterationReport, NotExecuted, SkipReason, StepFailure,
    TransactionResult,
};
use crate::scenario::{FailurePolicy, Scenario, Step};
use crate::variable::VariableScope;

/// 迭代序号变量，从 1 开始
pub const ITERATION_VAR: &str = "iteration";
/// 虚拟用户编号变量
pub const VUSER_ID_VAR: &str = "vuserId";
/// 执行器为每次迭代注入的变量名
pub const BUILTIN_VARIABLES: [&str; 2] = [ITERATION_VAR, VUSER_ID_VAR];

/// 关联事务执行器
///
/// 内部共享一个带连接池的 HTTP 客户端，clone 后可在多个任务中并发运行迭代；
/// 每次迭代独占自己的变量作用域
#[derive(Debug, Clone)]
pub struct TransactionRunner {
    client: Client,
    think_time: bool,
}

impl TransactionRunner {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(Client::new()?))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            think_time: true,
        }
    }

    /// 按场景设置的连接/响应超时创建执行器
    pub fn for_scenario(scenario: &Scenario) -> Result<Self> {
        let client = Client::with_timeouts(
            scenario.settings.connect_timeout,
            scenario.settings.response_timeout,
        )?;
        Ok(Self::with_client(client))
    }

    /// 关闭思考时间（调试或测试时使用）
    pub fn without_think_time(mut self) -> Self {
        self.think_time = false;
        self
    }

    /// 为一次迭代注入虚拟用户编号和迭代序号
    ///
    /// 已显式提供的同名参数保持不变
    pub fn iteration_parameters(
        parameters: &VariableScope,
        vuser_id: u64,
        iteration: usize,
    ) -> VariableScope {
        let mut scope = parameters.clone();
        if !scope.contains(VUSER_ID_VAR) {
            scope.insert(VUSER_ID_VAR, vuser_id as i64);
        }
        if !scope.contains(ITERATION_VAR) {
            scope.insert(ITERATION_VAR, iteration as i64);
        }
        scope
    }

    /// 执行一次完整迭代
    pub async fn run_scenario(
        &self,
        scenario: &Scenario,
        parameters: VariableScope,
    ) -> IterationReport {
        self.run_scenario_with_cancel(scenario, parameters, &CancelToken::new())
            .await
    }

    /// 执行一次迭代，收到取消信号后立即停止
    ///
    /// 进行中的请求或思考时间会被放弃，所有未完成的步骤记为未执行
    pub async fn run_scenario_with_cancel(
        &self,
        scenario: &Scenario,
        parameters: VariableScope,
        cancel: &CancelToken,
    ) -> IterationReport {
        let mut report = IterationReport::new(&scenario.name);
        let span = info_span!("iteration", scenario = %scenario.name, id = %report.id);

        async {
            let started = Instant::now();
            let mut scope = scenario.initial_scope(parameters);
            let mut stopped: Option<SkipReason> = None;
            let mut abort_step_failed = false;

            for (index, step) in scenario.steps.iter().enumerate() {
                if stopped.is_none() && cancel.is_cancelled() {
                    stopped = Some(SkipReason::Cancelled);
                }
                if let Some(reason) = stopped {
                    report.not_executed.push(NotExecuted {
                        step: step.name.clone(),
                        reason,
                    });
                    continue;
                }

                let executed = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    result = self.run_step(scenario, step, &mut scope) => Some(result),
                };
                let Some(result) = executed else {
                    info!(step = %step.name, "iteration cancelled while step in flight");
                    stopped = Some(SkipReason::Cancelled);
                    report.not_executed.push(NotExecuted {
                        step: step.name.clone(),
                        reason: SkipReason::Cancelled,
                    });
                    continue;
                };

                match &result.failure {
                    Some(StepFailure::Configuration { message }) => {
                        report.config_error = Some(format!("{}: {}", step.name, message));
                        stopped = Some(SkipReason::ConfigurationError);
                    }
                    Some(_) if step.on_failure == FailurePolicy::Abort => {
                        abort_step_failed = true;
                        stopped = Some(SkipReason::Aborted);
                    }
                    _ => {}
                }
                report.results.push(result);

                let is_last = index + 1 == scenario.steps.len();
                if stopped.is_none() && !is_last {
                    self.think(scenario, step, cancel).await;
                }
            }

            report.elapsed = started.elapsed();
            report.outcome = if stopped == Some(SkipReason::Cancelled) {
                IterationOutcome::Cancelled
            } else if abort_step_failed || report.config_error.is_some() {
                IterationOutcome::Fail
            } else {
                IterationOutcome::Pass
            };

            info!(
                outcome = %report.outcome,
                executed = report.results.len(),
                not_executed = report.not_executed.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "iteration finished"
            );
        }
        .instrument(span)
        .await;

        report
    }

    async fn think(&self, scenario: &Scenario, step: &Step, cancel: &CancelToken) {
        if !self.think_time {
            return;
        }
        let Some(think_time) = scenario.think_time_for(step) else {
            return;
        };
        let delay = think_time.sample();
        if delay.is_zero() {
            return;
        }

        debug!(delay_ms = delay.as_millis() as u64, "think time");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    /// 执行单个步骤，重复步骤内部会发出多个请求
    async fn run_step(
        &self,
        scenario: &Scenario,
        step: &Step,
        scope: &mut VariableScope,
    ) -> TransactionResult {
        let span = info_span!("step", name = %step.name);

        async {
            let started = Instant::now();
            let bindings: Vec<Option<&String>> = match &step.repeat {
                Some(repeat) => repeat.values.iter().map(Some).collect(),
                None => vec![None],
            };
            if bindings.is_empty() {
                error!(step = %step.name, "repeat has no values, request not sent");
                return TransactionResult::configuration_error(
                    &step.name,
                    "repeat has no values",
                    started.elapsed(),
                );
            }

            let mut requests = 0;
            let mut status = None;
            let mut failure = None;
            let mut misses = Vec::new();

            for value in bindings {
                if let (Some(repeat), Some(value)) = (&step.repeat, value) {
                    scope.insert(repeat.variable.clone(), value.clone());
                }

                let request = match Self::prepare(scenario, step, scope) {
                    Ok(request) => request,
                    Err(e) => {
                        error!(step = %step.name, error = %e, "configuration error, request not sent");
                        return TransactionResult::configuration_error(
                            &step.name,
                            e.to_string(),
                            started.elapsed(),
                        )
                        .with_requests(requests)
                        .with_misses(misses);
                    }
                };

                debug!(
                    method = %request.method,
                    url = %request.url,
                    body = request.body.as_deref().unwrap_or(""),
                    "sending request"
                );
                requests += 1;

                match self.client.execute(request).await {
                    Ok(response) => {
                        debug!(
                            status = %response.status,
                            elapsed_ms = response.duration.as_millis() as u64,
                            "response received"
                        );
                        let code = response.status.code();
                        status = Some(code);
                        let accepted = step.accepts(code);

                        if !accepted {
                            error!(
                                step = %step.name,
                                status = code,
                                expected = ?step.expected_status,
                                "unexpected status"
                            );
                            if failure.is_none() {
                                failure = Some(StepFailure::UnexpectedStatus {
                                    actual: code,
                                    expected: step.expected_status.iter().copied().collect(),
                                });
                            }
                        }

                        if accepted || step.on_failure == FailurePolicy::Continue {
                            misses.extend(Self::extract(step, &response, scope));
                        }
                    }
                    Err(e) => {
                        warn!(step = %step.name, error = %e, "transport error");
                        if failure.is_none() {
                            failure = Some(StepFailure::Transport {
                                message: e.to_string(),
                            });
                        }
                    }
                }

                if failure.is_some() && step.on_failure == FailurePolicy::Abort {
                    break;
                }
            }

            let elapsed = started.elapsed();
            let result = match (failure, status) {
                (None, Some(code)) => TransactionResult::passed(&step.name, code, elapsed),
                (Some(failure), status) => {
                    TransactionResult::failed(&step.name, status, elapsed, failure)
                }
                (None, None) => TransactionResult::configuration_error(
                    &step.name,
                    "no request was sent",
                    elapsed,
                ),
            }
            .with_requests(requests)
            .with_misses(misses);

            info!(
                step = %step.name,
                status = ?result.status,
                elapsed_ms = elapsed.as_millis() as u64,
                pass = result.is_pass(),
                "transaction finished"
            );
            result
        }
        .instrument(span)
        .await
    }

    /// 执行赋值并渲染请求
    fn prepare(scenario: &Scenario, step: &Step, scope: &mut VariableScope) -> Result<Request> {
        for assignment in &step.assignments {
            assignment.apply(scope)?;
        }
        step.request.render(scope, &scenario.headers)
    }

    /// 按顺序应用提取规则；命中则覆盖变量，未命中时保持原样
    fn extract(step: &Step, response: &Response, scope: &mut VariableScope) -> Vec<ExtractionMiss> {
        let mut misses = Vec::new();
        for rule in &step.extractions {
            match rule.apply(response) {
                Ok(value) => {
                    debug!(variable = %rule.variable, value = %value, "variable stored");
                    scope.insert(rule.variable.clone(), value);
                }
                Err(e) => {
                    warn!(step = %step.name, variable = %rule.variable, error = %e, "extraction miss");
                    misses.push(ExtractionMiss {
                        variable: rule.variable.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_parameters_seed_builtins() {
        let mut parameters = VariableScope::new();
        parameters.insert("api", "http://localhost:3000/api");

        let scope = TransactionRunner::iteration_parameters(&parameters, 3, 2);
        assert_eq!(scope.get_string("vuserId").as_deref(), Some("3"));
        assert_eq!(scope.get_string("iteration").as_deref(), Some("2"));
        assert_eq!(scope.len(), 3);
        assert!(!parameters.contains("iteration"));
    }

    #[test]
    fn test_iteration_parameters_keep_explicit_values() {
        let mut parameters = VariableScope::new();
        parameters.insert("vuserId", "load-7");

        let scope = TransactionRunner::iteration_parameters(&parameters, 1, 5);
        assert_eq!(scope.get_string("vuserId").as_deref(), Some("load-7"));
        assert_eq!(scope.get_string("iteration").as_deref(), Some("5"));
    }
}
