//! 消息帧编解码
//!
//! 每条消息占一帧：4字节大端长度 + JSON消息体。

use std::io::ErrorKind;

use taskfarm_errors::{WorkerError, WorkerResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::Message;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const LENGTH_PREFIX_BYTES: usize = 4;
const INITIAL_BODY_CAPACITY: usize = 8 * 1024;

pub fn encode(message: &Message) -> WorkerResult<Vec<u8>> {
    let body = serde_json::to_vec(message)?;
    let len = u32::try_from(body.len()).map_err(|_| WorkerError::FrameTooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_BYTES + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub async fn write_message<W>(writer: &mut W, message: &Message) -> WorkerResult<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R>(reader: &mut R, max_frame_bytes: usize) -> WorkerResult<Message>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            return Err(WorkerError::transport("connection closed before a frame arrived"));
        }
        Err(e) => return Err(e.into()),
    };
    if len > max_frame_bytes {
        return Err(WorkerError::FrameTooLarge {
            len,
            max: max_frame_bytes,
        });
    }

    // 按实际到达的字节增长缓冲区，只发了长度头的对端不会占用整帧内存
    let mut body = Vec::with_capacity(len.min(INITIAL_BODY_CAPACITY));
    AsyncReadExt::take(&mut *reader, len as u64)
        .read_to_end(&mut body)
        .await?;
    if body.len() < len {
        return Err(WorkerError::transport(format!(
            "connection closed mid-frame (expected {len} bytes, got {})",
            body.len()
        )));
    }

    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkerId;

    #[tokio::test]
    async fn test_frame_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_message(&mut client, &Message::sync_reply(WorkerId(8)))
            .await
            .unwrap();
        let received = read_message(&mut server, DEFAULT_MAX_FRAME_BYTES)
            .await
            .unwrap();
        assert_eq!(received, Message::sync_reply(WorkerId(8)));
    }

    #[test]
    fn test_encode_prefixes_length() {
        let frame = encode(&Message::sync_request(None, 1)).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - LENGTH_PREFIX_BYTES);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let frame = encode(&Message::sync_request(Some(WorkerId(1)), 7071)).unwrap();
        let mut reader = &frame[..];
        let err = read_message(&mut reader, 8).await.unwrap_err();
        assert!(matches!(err, WorkerError::FrameTooLarge { max: 8, .. }));
    }

    #[tokio::test]
    async fn test_empty_stream_is_transport_failure() {
        let mut reader: &[u8] = &[];
        let err = read_message(&mut reader, DEFAULT_MAX_FRAME_BYTES)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Transport(_)));
    }

    #[tokio::test]
    async fn test_truncated_body_is_transport_failure() {
        let frame = encode(&Message::sync_reply(WorkerId(2))).unwrap();
        let mut reader = &frame[..frame.len() - 3];
        let err = read_message(&mut reader, DEFAULT_MAX_FRAME_BYTES)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Transport(_)));
    }

    #[tokio::test]
    async fn test_large_header_without_body_fails_on_close() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&0x00FF_FFFFu32.to_be_bytes()).await.unwrap();
        drop(client);
        let err = read_message(&mut server, DEFAULT_MAX_FRAME_BYTES)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Transport(_)));
    }

    #[tokio::test]
    async fn test_garbage_body_is_serialization_fault() {
        let mut frame = 5u32.to_be_bytes().to_vec();
        frame.extend_from_slice(b"{oops");
        let mut reader = &frame[..];
        let err = read_message(&mut reader, DEFAULT_MAX_FRAME_BYTES)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Serialization(_)));
        assert!(err.is_transport());
    }
}
