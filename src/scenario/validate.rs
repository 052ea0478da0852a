use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::scenario::types::Scenario;
use crate::variable::VariableResolver;

/// 在任何生产者之前被引用的变量
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    pub step: String,
    pub variable: String,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {{{}}}", self.step, self.variable)
    }
}

impl Scenario {
    /// 静态检查变量引用
    ///
    /// 按步骤顺序跟踪可能已定义的名称：初始参数、场景默认变量、
    /// 重复变量、赋值以及之前步骤的提取目标。
    /// 每个变量只在第一次引用处报告一次。
    /// 提取可能失败，因此结果为空并不保证运行时不会出现配置错误
    pub fn unresolved_references<'a, I>(&self, initial: I) -> Vec<UnresolvedReference>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut known: HashSet<String> = initial.into_iter().map(str::to_string).collect();
        known.extend(self.variables.names().map(str::to_string));

        let mut unresolved: Vec<UnresolvedReference> = Vec::new();
        let mut report = |step: &str, name: String, known: &HashSet<String>| {
            let entry = UnresolvedReference {
                step: step.to_string(),
                variable: name,
            };
            let reported = unresolved
                .iter()
                .any(|r| r.variable == entry.variable);
            if !known.contains(&entry.variable) && !reported {
                unresolved.push(entry);
            }
        };

        for (_, value) in &self.headers {
            for name in VariableResolver::placeholders(value) {
                if let Some(step) = self.steps.first() {
                    report(&step.name, name, &known);
                }
            }
        }

        for step in &self.steps {
            if let Some(repeat) = &step.repeat {
                known.insert(repeat.variable.clone());
            }
            for assignment in &step.assignments {
                for name in assignment.placeholders() {
                    report(&step.name, name, &known);
                }
                known.insert(assignment.variable().to_string());
            }
            for name in step.request.placeholders() {
                report(&step.name, name, &known);
            }
            for rule in &step.extractions {
                known.insert(rule.variable.clone());
            }
        }

        unresolved
    }
}
