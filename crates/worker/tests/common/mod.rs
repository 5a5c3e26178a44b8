#![allow(dead_code)]

use std::time::Duration;

use taskfarm_domain::wire::{self, DEFAULT_MAX_FRAME_BYTES};
use taskfarm_domain::{CoordinatorEndpoint, Message};
use tokio::net::{TcpListener, TcpStream};

/// 测试用协调器：只负责接受连接和收发消息帧
pub struct FakeCoordinator {
    listener: TcpListener,
}

impl FakeCoordinator {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self { listener }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }

    pub fn endpoint(&self) -> CoordinatorEndpoint {
        CoordinatorEndpoint::new("127.0.0.1", self.port())
    }

    /// 接受一条连接并读取第一条消息
    pub async fn accept_message(&self) -> (TcpStream, Message) {
        let (mut stream, _) = tokio::time::timeout(Duration::from_secs(5), self.listener.accept())
            .await
            .expect("no connection from worker")
            .unwrap();
        let message = wire::read_message(&mut stream, DEFAULT_MAX_FRAME_BYTES)
            .await
            .unwrap();
        (stream, message)
    }

    /// 跳过其他消息，直到收到一条 RESULT
    pub async fn next_result(&self) -> Message {
        loop {
            let (_stream, message) = self.accept_message().await;
            if matches!(message, Message::Result(_)) {
                return message;
            }
        }
    }
}

/// 一个当前无人监听的本地端口
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// 等待对端关闭连接，返回是否在期限内观察到EOF
pub async fn wait_for_close(stream: &mut TcpStream, within: Duration) -> bool {
    let mut rest = Vec::new();
    matches!(
        tokio::time::timeout(
            within,
            tokio::io::AsyncReadExt::read_to_end(stream, &mut rest)
        )
        .await,
        Ok(Ok(_))
    )
}
