use std::fmt;

use serde::{Deserialize, Serialize};

/// 协调器分配的Worker标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub i64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 任务标识，在协调器范围内稳定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Worker,
    Client,
}

/// 协调器地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorEndpoint {
    pub host: String,
    pub port: u16,
}

impl CoordinatorEndpoint {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for CoordinatorEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Worker身份信息
///
/// `registered` 为 true 时 `id` 必然存在；只有注册握手成功时才会修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity {
    id: Option<WorkerId>,
    listening_port: u16,
    registered: bool,
}

impl WorkerIdentity {
    pub fn new(listening_port: u16, proposed_id: Option<WorkerId>) -> Self {
        Self {
            id: proposed_id,
            listening_port,
            registered: false,
        }
    }

    pub fn id(&self) -> Option<WorkerId> {
        self.id
    }

    pub fn listening_port(&self) -> u16 {
        self.listening_port
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// 已注册时返回协调器认可的ID
    pub fn registered_id(&self) -> Option<WorkerId> {
        if self.registered {
            self.id
        } else {
            None
        }
    }

    /// 协调器分配的ID总是权威的，覆盖自荐ID
    pub fn assign(&mut self, assigned: WorkerId) {
        self.id = Some(assigned);
        self.registered = true;
    }
}
