use crate::*;

#[test]
fn test_worker_error_display() {
    let transport = WorkerError::transport("connection refused");
    assert_eq!(transport.to_string(), "网络传输错误: connection refused");

    let timeout = WorkerError::HandshakeTimeout { timeout_ms: 3000 };
    assert_eq!(
        timeout.to_string(),
        "注册握手超时: 3000ms 内未收到协调器应答"
    );

    let frame = WorkerError::FrameTooLarge { len: 10, max: 4 };
    assert_eq!(frame.to_string(), "消息帧过大: 10 字节 (上限 4 字节)");

    let unsupported = WorkerError::UnsupportedTaskType("python".to_string());
    assert_eq!(unsupported.to_string(), "不支持的任务类型: python");

    assert_eq!(
        WorkerError::NotRegistered.to_string(),
        "Worker尚未在协调器注册"
    );
}

#[test]
fn test_transport_classification() {
    assert!(WorkerError::transport("x").is_transport());
    assert!(WorkerError::HandshakeTimeout { timeout_ms: 1 }.is_transport());
    assert!(WorkerError::Serialization("bad json".to_string()).is_transport());
    assert!(WorkerError::FrameTooLarge { len: 2, max: 1 }.is_transport());
    let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
    assert!(WorkerError::from(io).is_transport());

    assert!(!WorkerError::task_execution("boom").is_transport());
    assert!(!WorkerError::NotRegistered.is_transport());
    assert!(!WorkerError::config_error("bad").is_transport());
}

#[test]
fn test_timeout_is_distinguished() {
    assert!(WorkerError::HandshakeTimeout { timeout_ms: 3000 }.is_timeout());
    assert!(!WorkerError::HandshakeRejected("closed".to_string()).is_timeout());
}

#[test]
fn test_retryable_and_fatal() {
    assert!(WorkerError::transport("x").is_retryable());
    assert!(WorkerError::NotRegistered.is_retryable());
    assert!(!WorkerError::task_execution("x").is_retryable());

    assert!(WorkerError::config_error("x").is_fatal());
    assert!(WorkerError::Internal("x".to_string()).is_fatal());
    assert!(!WorkerError::HandshakeTimeout { timeout_ms: 1 }.is_fatal());
}

#[test]
fn test_serde_json_conversion() {
    let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let worker_err: WorkerError = err.into();
    assert!(matches!(worker_err, WorkerError::Serialization(_)));
    assert!(worker_err.is_transport());
}

#[test]
fn test_anyhow_conversion() {
    let worker_err: WorkerError = anyhow::anyhow!("unexpected").into();
    assert!(matches!(worker_err, WorkerError::Internal(ref m) if m == "unexpected"));
}
