use serde::{Deserialize, Serialize};

use crate::{ClientType, PerformanceSnapshot, TaskId, TaskOutcome, TaskSpec, WorkerId};

/// Worker与协调器之间的线协议消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    SyncRequest(SyncRequestMessage),
    SyncReply(SyncReplyMessage),
    Result(ResultMessage),
    Stats(StatsMessage),
    Task(TaskMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequestMessage {
    /// 自荐ID，协调器可以忽略
    pub proposed_id: Option<WorkerId>,
    pub listening_port: u16,
    pub client_type: ClientType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReplyMessage {
    pub assigned_id: WorkerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub worker_id: WorkerId,
    pub task_id: TaskId,
    pub outcome: TaskOutcome,
    pub cpu_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsMessage {
    pub worker_id: WorkerId,
    pub snapshot: PerformanceSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub spec: TaskSpec,
}

impl Message {
    pub fn sync_request(proposed_id: Option<WorkerId>, listening_port: u16) -> Self {
        Self::SyncRequest(SyncRequestMessage {
            proposed_id,
            listening_port,
            client_type: ClientType::Worker,
        })
    }

    pub fn sync_reply(assigned_id: WorkerId) -> Self {
        Self::SyncReply(SyncReplyMessage { assigned_id })
    }

    pub fn result(worker_id: WorkerId, task_id: TaskId, outcome: TaskOutcome, cpu_share: f64) -> Self {
        Self::Result(ResultMessage {
            worker_id,
            task_id,
            outcome,
            cpu_share,
        })
    }

    pub fn stats(worker_id: WorkerId, snapshot: PerformanceSnapshot) -> Self {
        Self::Stats(StatsMessage {
            worker_id,
            snapshot,
        })
    }

    pub fn task(spec: TaskSpec) -> Self {
        Self::Task(TaskMessage { spec })
    }

    /// 消息类型标签，与线上 `kind` 字段取值一致
    pub fn kind(&self) -> &'static str {
        match self {
            Message::SyncRequest(_) => "SYNC_REQUEST",
            Message::SyncReply(_) => "SYNC_REPLY",
            Message::Result(_) => "RESULT",
            Message::Stats(_) => "STATS",
            Message::Task(_) => "TASK",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sync_request_wire_shape() {
        let message = Message::sync_request(None, 7071);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "SYNC_REQUEST",
                "proposed_id": null,
                "listening_port": 7071,
                "client_type": "worker"
            })
        );
        assert_eq!(message.kind(), "SYNC_REQUEST");
    }

    #[test]
    fn test_sync_reply_parses_from_coordinator_json() {
        let message: Message =
            serde_json::from_str(r#"{"kind":"SYNC_REPLY","assigned_id":17}"#).unwrap();
        assert_eq!(message, Message::sync_reply(WorkerId(17)));
    }

    #[test]
    fn test_result_carries_failed_outcome() {
        let message = Message::result(
            WorkerId(3),
            TaskId(11),
            TaskOutcome::failed("division by zero"),
            0.25,
        );
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["kind"], "RESULT");
        assert_eq!(value["kind"], message.kind());
        assert_eq!(value["worker_id"], 3);
        assert_eq!(value["task_id"], 11);
        assert_eq!(value["outcome"]["status"], "failed");
        assert_eq!(value["outcome"]["error"], "division by zero");
        assert_eq!(value["cpu_share"], 0.25);
    }

    #[test]
    fn test_task_message_defaults_parameters() {
        let message: Message = serde_json::from_str(
            r#"{"kind":"TASK","spec":{"id":5,"task_type":"echo"}}"#,
        )
        .unwrap();
        match message {
            Message::Task(TaskMessage { spec }) => {
                assert_eq!(spec.id, TaskId(5));
                assert_eq!(spec.task_type, "echo");
                assert!(spec.parameters.is_null());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
