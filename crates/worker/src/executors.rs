use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use taskfarm_domain::{Task, TaskId, TaskSpec};
use taskfarm_errors::{WorkerError, WorkerResult};
use tracing::{debug, warn};

/// 任务执行器：按任务类型解释 `TaskSpec` 的参数并完成计算
///
/// `execute` 在执行池的阻塞线程上调用。
pub trait TaskExecutor: Send + Sync {
    fn task_type(&self) -> &str;
    fn execute(&self, spec: &TaskSpec) -> WorkerResult<Value>;
}

fn parse_params<T: for<'de> Deserialize<'de>>(spec: &TaskSpec) -> WorkerResult<T> {
    serde_json::from_value(spec.parameters.clone()).map_err(|e| {
        WorkerError::task_execution(format!(
            "invalid parameters for {} task {}: {e}",
            spec.task_type, spec.id
        ))
    })
}

/// 原样返回参数
#[derive(Debug, Default)]
pub struct EchoExecutor;

impl TaskExecutor for EchoExecutor {
    fn task_type(&self) -> &str {
        "echo"
    }

    fn execute(&self, spec: &TaskSpec) -> WorkerResult<Value> {
        Ok(spec.parameters.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct SleepTaskParams {
    pub duration_ms: u64,
}

/// 占用执行槽位指定时长，用于模拟耗时计算
#[derive(Debug, Default)]
pub struct SleepExecutor;

impl TaskExecutor for SleepExecutor {
    fn task_type(&self) -> &str {
        "sleep"
    }

    fn execute(&self, spec: &TaskSpec) -> WorkerResult<Value> {
        let params: SleepTaskParams = parse_params(spec)?;
        std::thread::sleep(Duration::from_millis(params.duration_ms));
        Ok(json!({ "slept_ms": params.duration_ms }))
    }
}

#[derive(Debug, Deserialize)]
pub struct SumTaskParams {
    pub values: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct SumExecutor;

impl TaskExecutor for SumExecutor {
    fn task_type(&self) -> &str {
        "sum"
    }

    fn execute(&self, spec: &TaskSpec) -> WorkerResult<Value> {
        let params: SumTaskParams = parse_params(spec)?;
        let mut total = 0.0;
        for (index, value) in params.values.iter().enumerate() {
            let number = value.as_f64().ok_or_else(|| {
                WorkerError::task_execution(format!("values[{index}] is not a number: {value}"))
            })?;
            total += number;
        }
        Ok(json!({ "sum": total }))
    }
}

/// 执行器注册表
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn TaskExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 包含内置的 echo / sleep / sum 执行器
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EchoExecutor));
        registry.register(Arc::new(SleepExecutor));
        registry.register(Arc::new(SumExecutor));
        registry
    }

    pub fn register(&mut self, executor: Arc<dyn TaskExecutor>) {
        let task_type = executor.task_type().to_string();
        if self.executors.insert(task_type.clone(), executor).is_some() {
            warn!("Executor for task type '{}' replaced", task_type);
        } else {
            debug!("Registered executor for task type '{}'", task_type);
        }
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.executors.contains_key(task_type)
    }

    pub fn list_executors(&self) -> Vec<String> {
        let mut types: Vec<String> = self.executors.keys().cloned().collect();
        types.sort();
        types
    }

    /// 将任务描述转换为可执行任务
    ///
    /// 未知类型同样返回任务，执行时失败，协调器因此能收到失败结果。
    pub fn resolve(&self, spec: TaskSpec) -> Box<dyn Task> {
        let executor = self.executors.get(&spec.task_type).cloned();
        if executor.is_none() {
            warn!(
                "No executor for task type '{}' (task {})",
                spec.task_type, spec.id
            );
        }
        Box::new(RegisteredTask { spec, executor })
    }
}

struct RegisteredTask {
    spec: TaskSpec,
    executor: Option<Arc<dyn TaskExecutor>>,
}

impl Task for RegisteredTask {
    fn id(&self) -> TaskId {
        self.spec.id
    }

    fn run(self: Box<Self>) -> WorkerResult<Value> {
        match self.executor {
            Some(executor) => executor.execute(&self.spec),
            None => Err(WorkerError::UnsupportedTaskType(self.spec.task_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(task_type: &str, parameters: Value) -> TaskSpec {
        TaskSpec {
            id: TaskId(1),
            task_type: task_type.to_string(),
            parameters,
        }
    }

    #[test]
    fn test_builtin_executors_registered() {
        let registry = ExecutorRegistry::with_builtin();
        assert_eq!(registry.list_executors(), vec!["echo", "sleep", "sum"]);
        assert!(registry.contains("sum"));
        assert!(!registry.contains("shell"));
    }

    #[test]
    fn test_echo_returns_parameters() {
        let registry = ExecutorRegistry::with_builtin();
        let task = registry.resolve(spec("echo", json!({"a": [1, 2]})));
        assert_eq!(task.id(), TaskId(1));
        assert_eq!(task.run().unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_sum_adds_numbers() {
        let registry = ExecutorRegistry::with_builtin();
        let task = registry.resolve(spec("sum", json!({"values": [1, 2.5, -0.5]})));
        assert_eq!(task.run().unwrap(), json!({"sum": 3.0}));
    }

    #[test]
    fn test_sum_rejects_non_numbers() {
        let registry = ExecutorRegistry::with_builtin();
        let task = registry.resolve(spec("sum", json!({"values": [1, "two"]})));
        let err = task.run().unwrap_err();
        assert!(matches!(err, WorkerError::TaskExecution(_)));
    }

    #[test]
    fn test_sleep_requires_duration() {
        let registry = ExecutorRegistry::with_builtin();
        let err = registry.resolve(spec("sleep", json!({}))).run().unwrap_err();
        assert!(matches!(err, WorkerError::TaskExecution(_)));

        let value = registry
            .resolve(spec("sleep", json!({"duration_ms": 5})))
            .run()
            .unwrap();
        assert_eq!(value, json!({"slept_ms": 5}));
    }

    #[test]
    fn test_unknown_type_fails_when_run() {
        let registry = ExecutorRegistry::with_builtin();
        let err = registry.resolve(spec("python", Value::Null)).run().unwrap_err();
        assert!(matches!(err, WorkerError::UnsupportedTaskType(ref t) if t == "python"));
    }
}
